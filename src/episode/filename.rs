// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use sanitize_filename::{Options, sanitize_with_options};

/// Maximum length (in characters) of the title portion of a filename
const MAX_TITLE_LENGTH: usize = 120;

/// Extension of every produced episode file
pub const EPISODE_EXTENSION: &str = "mp3";

/// Separator between show name and episode title
const NAME_SEPARATOR: &str = " - ";

fn strip_illegal(s: &str) -> String {
    sanitize_with_options(
        s,
        Options {
            windows: true,
            truncate: true,
            replacement: "",
        },
    )
}

/// Make a show name safe for use as a filename prefix.
///
/// Spaces are kept so files read naturally on the player.
pub fn sanitize_show_name(name: &str) -> String {
    let sanitized = strip_illegal(name.trim());
    if sanitized.is_empty() {
        "Podcast".to_string()
    } else {
        sanitized
    }
}

/// Sanitize an episode title into a flat filename component.
///
/// Whitespace and path separators become underscores, characters that FAT
/// volumes reject are dropped.
pub fn sanitize_title(title: &str) -> String {
    let mapped: String = title
        .chars()
        .map(|c| {
            if c.is_whitespace() || c == '/' || c == '\\' {
                '_'
            } else {
                c
            }
        })
        .collect();

    let stripped = strip_illegal(&mapped);
    let collapsed = collapse_underscores(&stripped);
    let trimmed = collapsed.trim_matches(|c: char| c == '_' || c == '.');

    let result = if trimmed.chars().count() > MAX_TITLE_LENGTH {
        truncate_at_boundary(trimmed, MAX_TITLE_LENGTH)
    } else {
        trimmed.to_string()
    };

    if result.is_empty() {
        "Untitled".to_string()
    } else {
        result
    }
}

/// Filename prefix shared by every episode of a show
pub fn show_prefix(show_name: &str) -> String {
    format!("{}{}", sanitize_show_name(show_name), NAME_SEPARATOR)
}

/// Whether `file_name` is a finished episode.
///
/// In-progress downloads (`*.partial`) and audio work files
/// (`*.processing`) do not carry the episode extension and are excluded.
pub fn is_episode_file(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && ext == EPISODE_EXTENSION)
}

/// Generate the filename of an episode: `<Show> - <Sanitized_Title>.mp3`
pub fn episode_filename(show_name: &str, episode_title: &str) -> String {
    format!(
        "{}{}.{}",
        show_prefix(show_name),
        sanitize_title(episode_title),
        EPISODE_EXTENSION
    )
}

/// Collapse runs of underscores into one
fn collapse_underscores(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut last_was_underscore = false;

    for c in s.chars() {
        if c == '_' {
            if !last_was_underscore {
                result.push(c);
            }
            last_was_underscore = true;
        } else {
            result.push(c);
            last_was_underscore = false;
        }
    }

    result
}

/// Truncate string at a word boundary
fn truncate_at_boundary(s: &str, max_len: usize) -> String {
    let truncated: String = s.chars().take(max_len).collect();
    let half = truncated.len() / 2;

    if let Some(pos) = truncated.rfind('_')
        && pos > half
    {
        return truncated[..pos].to_string();
    }

    truncated.trim_end_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // === Title sanitization ===

    #[test]
    fn sanitize_replaces_spaces_with_underscores() {
        assert_eq!(sanitize_title("Hello World Again"), "Hello_World_Again");
    }

    #[test]
    fn sanitize_replaces_path_separators() {
        assert_eq!(sanitize_title("a/b\\c"), "a_b_c");
    }

    #[test]
    fn sanitize_drops_fat_illegal_chars() {
        let sanitized = sanitize_title("Episode 12: \"Why?\" <Part|2*>");
        for c in [':', '"', '?', '<', '>', '|', '*'] {
            assert!(!sanitized.contains(c), "{sanitized} contains {c}");
        }
        assert_eq!(sanitized, "Episode_12_Why_Part2");
    }

    #[test]
    fn sanitize_keeps_unicode_letters() {
        assert_eq!(sanitize_title("Café résumé"), "Café_résumé");
    }

    #[test]
    fn sanitize_collapses_whitespace_runs() {
        assert_eq!(sanitize_title("a   b\t\nc"), "a_b_c");
    }

    #[test]
    fn sanitize_trims_leading_trailing_separators() {
        assert_eq!(sanitize_title("  padded title  "), "padded_title");
        assert_eq!(sanitize_title("ends with dot."), "ends_with_dot");
    }

    #[test]
    fn sanitize_never_returns_empty() {
        assert_eq!(sanitize_title(""), "Untitled");
        assert_eq!(sanitize_title("???"), "Untitled");
    }

    #[test]
    fn sanitize_truncates_long_titles_at_boundary() {
        let long = "word ".repeat(60);
        let sanitized = sanitize_title(&long);

        assert!(sanitized.chars().count() <= MAX_TITLE_LENGTH);
        assert!(sanitized.ends_with("word"));
    }

    #[test]
    fn truncate_handles_no_boundaries() {
        let s = "a".repeat(200);
        assert_eq!(truncate_at_boundary(&s, 50).len(), 50);
    }

    // === Filenames ===

    #[test]
    fn filename_joins_show_and_title() {
        assert_eq!(
            episode_filename("FT News Briefing", "Markets rally on rate cut"),
            "FT News Briefing - Markets_rally_on_rate_cut.mp3"
        );
    }

    #[test]
    fn filename_is_flat() {
        let name = episode_filename("Show/With/Slashes", "../../etc/passwd");
        assert!(!name.contains('/'));
        assert!(!name.contains('\\'));
    }

    #[test]
    fn filename_starts_with_show_prefix() {
        let prefix = show_prefix("The Daily Stoic");
        assert_eq!(prefix, "The Daily Stoic - ");
        assert!(episode_filename("The Daily Stoic", "Episode").starts_with(&prefix));
    }

    #[test]
    fn only_finished_episodes_count_as_episode_files() {
        assert!(is_episode_file("Show - Ep.mp3"));
        assert!(is_episode_file(&episode_filename("Show", "v1.processing")));
        assert!(!is_episode_file("Show - Ep.mp3.partial"));
        assert!(!is_episode_file("Show - Ep.mp3.processing"));
        assert!(!is_episode_file("notes.txt"));
        assert!(!is_episode_file(".mp3"));
    }

    #[test]
    fn distinct_titles_give_distinct_filenames() {
        assert_ne!(
            episode_filename("Show", "Part 1"),
            episode_filename("Show", "Part 2")
        );
    }
}
