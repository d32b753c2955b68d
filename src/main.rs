// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use swimcast::config::{DEFAULT_DESTINATION_ROOT, DEFAULT_STAGING_ROOT, DEFAULT_WATERMARK_FALLBACK};
use swimcast::{
    AudioProcessor, FfmpegBackend, IndexCredentials, NoopReporter, ProgressEvent,
    ProgressReporter, ReqwestClient, RunConfig, SharedProgressReporter, SkipReason,
    THROTTLE_WINDOW, WatermarkStore, default_shows, format_duration, is_elevated, load_shows,
    run_pipeline, should_throttle, wait_for_destination,
};

// Emoji with fallback for terminals without Unicode support
static SWIMMER: Emoji<'_, '_> = Emoji("🏊 ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SCISSORS: Emoji<'_, '_> = Emoji("✂️  ", "[/] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "[?] ");
static HOURGLASS: Emoji<'_, '_> = Emoji("⏳ ", "[.] ");
static BROOM: Emoji<'_, '_> = Emoji("🧹 ", "[-] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Poll interval while waiting for the device to appear
const MOUNT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Fetch new podcast episodes, shorten them and put them on a swim headset
#[derive(Parser, Debug)]
#[command(name = "swimcast")]
#[command(about = "Fetch, trim and speed up podcasts for a swim MP3 player")]
#[command(version)]
struct Args {
    /// Mount point of the device
    #[arg(short, long, default_value = DEFAULT_DESTINATION_ROOT)]
    destination: PathBuf,

    /// Local staging directory
    #[arg(long, default_value = DEFAULT_STAGING_ROOT)]
    staging: PathBuf,

    /// Watermark file used while the device is absent
    #[arg(long, default_value = DEFAULT_WATERMARK_FALLBACK)]
    watermark_fallback: PathBuf,

    /// JSON file with the show table (built-in table when omitted)
    #[arg(short, long)]
    shows: Option<PathBuf>,

    /// Seconds to wait for the device to be mounted before starting
    #[arg(short, long, default_value = "0")]
    wait: u64,

    /// Run even if the last run was less than three hours ago
    #[arg(short, long)]
    force: bool,

    /// Podcast Index API key
    #[arg(long, env = "PODCAST_INDEX_API_KEY", hide_env_values = true)]
    index_key: Option<String>,

    /// Podcast Index API secret
    #[arg(long, env = "PODCAST_INDEX_API_SECRET", hide_env_values = true)]
    index_secret: Option<String>,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    download_bar: Mutex<Option<ProgressBar>>,
    main_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .expect("valid template");

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            multi,
            download_bar: Mutex::new(None),
            main_bar,
        }
    }

    fn start_download_bar(&self, length: u64, title: &str) {
        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .expect("valid template")
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(length));
        bar.set_style(style);
        bar.set_message(truncate_title(title, 40));

        let mut current = self.download_bar.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = current.replace(bar) {
            previous.finish_and_clear();
        }
    }

    fn with_download_bar(&self, f: impl FnOnce(&ProgressBar)) {
        let current = self.download_bar.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bar) = current.as_ref() {
            f(bar);
        }
    }

    fn finish_download_bar(&self) {
        let mut current = self.download_bar.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bar) = current.take() {
            bar.finish_and_clear();
        }
    }

    fn line(&self, message: String) {
        let _ = self.multi.println(message);
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::WaitingForDestination {
                path,
                elapsed_secs,
                timeout_secs,
            } => {
                self.main_bar.set_message(format!(
                    "{HOURGLASS}Waiting for {} ({}s of {}s)",
                    path.display().to_string().cyan(),
                    elapsed_secs,
                    timeout_secs
                ));
            }

            ProgressEvent::Throttled { watermark } => {
                self.main_bar.finish_and_clear();
                println!(
                    "{HOURGLASS}Last run was at {}, skipping (use {} to override)",
                    format_timestamp(watermark).yellow(),
                    "--force".bold()
                );
            }

            ProgressEvent::RunStarted {
                watermark,
                show_count,
            } => {
                self.line(format!(
                    "{HEADPHONES}{} shows, new since {}",
                    show_count.to_string().cyan(),
                    format_timestamp(watermark).cyan()
                ));
            }

            ProgressEvent::ListingEpisodes { show, source } => {
                self.main_bar.set_message(format!(
                    "{SEARCH}{} {}",
                    show.bold(),
                    source.dimmed()
                ));
            }

            ProgressEvent::SourceFailed { show, error } => {
                self.line(format!("{FAILURE}{} - {}", show.red(), error.red()));
            }

            ProgressEvent::EpisodeFound {
                show,
                episode_title,
                published_at,
            } => {
                self.main_bar.set_message(format!(
                    "{HEADPHONES}{} • {} {}",
                    show.bold().green(),
                    truncate_title(&episode_title, 50),
                    format_local(published_at).dimmed()
                ));
            }

            ProgressEvent::EpisodeSkipped {
                episode_title,
                reason,
            } => {
                if reason == SkipReason::AlreadyPresent {
                    self.line(format!(
                        "  {} {}",
                        truncate_title(&episode_title, 50).dimmed(),
                        "(already on device)".dimmed()
                    ));
                }
            }

            ProgressEvent::DownloadStarting {
                episode_title,
                content_length,
            } => {
                self.start_download_bar(content_length.unwrap_or(0), &episode_title);
            }

            ProgressEvent::DownloadProgress {
                bytes_downloaded,
                total_bytes,
                ..
            } => {
                self.with_download_bar(|bar| {
                    if let Some(total) = total_bytes {
                        bar.set_length(total);
                    }
                    bar.set_position(bytes_downloaded);
                });
            }

            ProgressEvent::DownloadCompleted { episode_title, .. } => {
                self.finish_download_bar();
                self.line(format!(
                    "  {SUCCESS}{}",
                    truncate_title(&episode_title, 50).green()
                ));
            }

            ProgressEvent::DownloadFailed {
                episode_title,
                error,
            } => {
                self.finish_download_bar();
                self.line(format!(
                    "  {FAILURE}{} - {}",
                    truncate_title(&episode_title, 30).red(),
                    error.red()
                ));
            }

            ProgressEvent::AudioStepStarted { description, .. } => {
                self.main_bar
                    .set_message(format!("{SCISSORS}{}", description.cyan()));
            }

            ProgressEvent::AudioStepFailed {
                description, error, ..
            } => {
                self.line(format!(
                    "  {WARNING}{} failed: {}",
                    description.yellow(),
                    error.dimmed()
                ));
            }

            ProgressEvent::AudioProcessed {
                original_secs,
                final_secs,
                ..
            } => {
                if let (Some(original), Some(done)) = (original_secs, final_secs) {
                    self.line(format!(
                        "  {SCISSORS}{} → {}",
                        format_duration(original).dimmed(),
                        format_duration(done).cyan()
                    ));
                }
            }

            ProgressEvent::DestinationUnavailable { path } => {
                self.line(format!(
                    "{WARNING}{} is not mounted, episodes stay in staging",
                    path.display().to_string().yellow()
                ));
            }

            ProgressEvent::Published { category, count } => {
                if count > 0 {
                    self.line(format!(
                        "{FOLDER}{} {} episode(s)",
                        category.bold().cyan(),
                        count.to_string().green()
                    ));
                }
            }

            ProgressEvent::PublishFailed { category, error } => {
                self.line(format!("{FAILURE}{} - {}", category.red(), error.red()));
            }

            ProgressEvent::Pruned { show, removed } => {
                self.line(format!(
                    "{BROOM}{} - removed {} old episode(s)",
                    show.dimmed(),
                    removed
                ));
            }

            ProgressEvent::WatermarkCommitted { current, .. } => {
                self.line(format!(
                    "{SUCCESS}Next run fetches episodes after {}",
                    format_timestamp(current).cyan()
                ));
            }

            ProgressEvent::WatermarkHeld { .. } => {
                self.line(format!(
                    "{WARNING}{}",
                    "Watermark kept, failed episodes will be retried".yellow()
                ));
            }

            ProgressEvent::RunCompleted {
                downloaded_count,
                skipped_count,
                failed_count,
                published,
            } => {
                self.main_bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} downloaded, {} skipped, {} failed{}",
                    "Run complete:".bold().green(),
                    downloaded_count.to_string().green().bold(),
                    skipped_count.to_string().yellow(),
                    if failed_count > 0 {
                        failed_count.to_string().red().bold()
                    } else {
                        failed_count.to_string().green()
                    },
                    if published { "" } else { " (not published)" }
                );
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let cut: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

fn format_timestamp(timestamp: i64) -> String {
    if timestamp <= 0 {
        return "the beginning".to_string();
    }
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

/// Publication time in the local timezone
fn format_local(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|t| t.with_timezone(&Local).format("%a %d %b %H:%M").to_string())
        .unwrap_or_default()
}

fn init_tracing(args: &Args) {
    let default_directive = if args.verbose {
        "swimcast=debug"
    } else {
        "swimcast=info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            SWIMMER,
            "swimcast".bold().magenta(),
            "- Podcasts for the pool".dimmed()
        );
    }

    let shows = match &args.shows {
        Some(path) => load_shows(path)
            .with_context(|| format!("Failed to load shows from {}", path.display()))?,
        None => default_shows(),
    };

    let index_credentials = match (args.index_key.clone(), args.index_secret.clone()) {
        (Some(key), Some(secret)) => Some(IndexCredentials { key, secret }),
        _ => None,
    };

    let config = RunConfig {
        destination_root: args.destination.clone(),
        staging_root: args.staging.clone(),
        watermark_fallback: args.watermark_fallback.clone(),
        index_credentials,
        ..Default::default()
    };

    let reporter: SharedProgressReporter = if args.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new())
    };

    if args.wait > 0 {
        wait_for_destination(
            &config.destination_root,
            Duration::from_secs(args.wait),
            MOUNT_POLL_INTERVAL,
            &reporter,
        )
        .await;
    }

    if is_elevated() && !args.force {
        let watermark = WatermarkStore::new(&config.destination_root, &config.watermark_fallback)
            .read()
            .context("Failed to read watermark")?;

        if should_throttle(watermark, Utc::now().timestamp(), THROTTLE_WINDOW) {
            tracing::info!(watermark, "Last run too recent, skipping");
            reporter.report(ProgressEvent::Throttled { watermark });
            return Ok(());
        }
    }

    let client = ReqwestClient::new();
    let audio = AudioProcessor::new(FfmpegBackend::new());

    let report = run_pipeline(&client, &audio, &shows, &config, reporter)
        .await
        .context("Failed to run podcast pipeline")?;

    if !args.quiet && !report.failures.is_empty() {
        println!("\n{}", "Failures:".red().bold());
        for (what, error) in &report.failures {
            println!("  {}{} - {}", CROSS, what.yellow(), error.dimmed());
        }
    }

    if !args.quiet && report.destination_available {
        println!(
            "\n{FOLDER}Device: {}\n",
            config.destination_root.display().to_string().cyan()
        );
    }

    if !report.destination_available || (report.failed > 0 && report.downloaded == 0) {
        std::process::exit(1);
    }

    Ok(())
}
