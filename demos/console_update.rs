//! Console update example
//!
//! This example demonstrates the core functionality of app-patcher:
//! - Configuring the updater for the running executable
//! - Observing events to print progress
//! - Checking for, planning and applying an update
//! - Pausing on Ctrl+C so the next launch resumes
//! - Retrying transient network failures
//!
//! Usage: `cargo run --example console_update -- https://updates.example.com/latest.json`

use app_patcher::retry::with_retry;
use app_patcher::{Event, UpdateOutcome, Updater, UpdaterConfig, pause_on_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("app_patcher=info")),
        )
        .init();

    let pointer_url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://updates.example.com/latest.json".to_string());

    let config = UpdaterConfig::for_executable(&std::env::current_exe()?)?;
    let retry = config.retry.clone();
    let updater = Updater::new(config).await?;
    println!("Installed version: {}", updater.installed_version());

    updater.add_observer(|event| match event {
        Event::ReadyToDownload { path } => println!("⬇ {}", path),
        Event::DownloadProgress { path, .. } => {
            if let Some(percent) = event.percent() {
                println!("  {}: {:.1}%", path, percent);
            }
        }
        Event::FileInstalled { path } => println!("✓ Installed {}", path),
        Event::UpdateProgress {
            files_installed,
            files_total,
        } => println!("  {}/{} files", files_installed, files_total),
        Event::PatchCompleted { version } => println!("✓ Now at version {}", version),
        Event::UpdateCompleted => println!("✓ Update complete"),
        Event::ApplicationRestartRequested => println!("↻ Restarting"),
    });

    let check = with_retry(&retry, || updater.check_for_updates(&pointer_url)).await?;
    if !check.update_available {
        println!("Already up to date ({})", check.latest_version);
        return Ok(());
    }
    println!("Version {} is available", check.latest_version);

    let summary = with_retry(&retry, || updater.initialize_update(&check, false)).await?;
    println!(
        "Planned {} files across {} versions{}",
        summary.files_total,
        summary.versions.len(),
        if summary.resumed {
            " (resuming an earlier run)"
        } else {
            ""
        }
    );

    tokio::spawn(pause_on_signal(updater.control()));

    match with_retry(&retry, || updater.start_update()).await? {
        UpdateOutcome::Paused => println!("Paused; run again to resume"),
        UpdateOutcome::Completed | UpdateOutcome::UpToDate => println!("Done"),
        UpdateOutcome::Restarted | UpdateOutcome::AlreadyRunning => {}
    }

    Ok(())
}
