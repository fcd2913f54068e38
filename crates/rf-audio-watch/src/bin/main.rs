//! audio-watch - console front end
//!
//! Usage:
//!   audio-watch                          - check every watch item in config.json / user_config.json
//!   audio-watch --prev 2262400 --curr 2262500
//!   audio-watch --clean-mode             - remove synced files right after analysis

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use rf_audio_watch::{DiffEngine, P4Cli, VersionControl, WatchItem, WatchSetting};

#[derive(Parser)]
#[command(name = "audio-watch", about = "Report audio regressions between two depot stamps")]
struct Cli {
    /// Previous stamp (change id or YYYY/MM/DD:hh:mm:ss) for every watch item
    #[arg(long)]
    prev: Option<String>,

    /// Current stamp for every watch item
    #[arg(long)]
    curr: Option<String>,

    /// Remove local copies right after they are analyzed
    #[arg(long)]
    clean_mode: bool,

    /// Base configuration file
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// User configuration file, applied over the base one
    #[arg(long, default_value = "user_config.json")]
    user_config: PathBuf,

    /// Override the report output directory
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut setting = WatchSetting::load_layered(&[&cli.config, &cli.user_config])
        .context("failed to load watch settings")?;
    setting.override_stamps(cli.prev.as_deref(), cli.curr.as_deref());
    setting.disable_clean_mode = !cli.clean_mode;

    let output_dir = cli
        .output_dir
        .unwrap_or_else(|| PathBuf::from(&setting.output_dir));

    if setting.watch_items.is_empty() {
        log::warn!("No watch items configured");
        return Ok(());
    }

    let p4 = P4Cli::from_setting(&setting);
    for item in &setting.watch_items {
        if let Err(e) = check_item(&p4, &setting, item, &output_dir) {
            log::error!("[Skip] '{}': {:#}", item.name, e);
        }
    }

    Ok(())
}

fn check_item(
    vcs: &dyn VersionControl,
    setting: &WatchSetting,
    item: &WatchItem,
    output_dir: &Path,
) -> Result<()> {
    let query = item
        .query(&setting.file_extension)
        .with_context(|| format!("invalid window for '{}'", item.name))?;

    log::info!("[Start] Start checking '{}'", item.name);

    let mut engine = DiffEngine::with_default_rules(&setting.thresholds(), setting.release_policy());
    engine.accumulate_all(vcs.list_changes(&query));

    let total = engine.len();
    let mut stdout = std::io::stdout().lock();
    for progress in engine.run(vcs) {
        write_progress(&mut stdout, progress.index + 1, total, &progress.path)
            .context("failed to write progress")?;
    }
    if total > 0 {
        writeln!(stdout)?;
    }

    let output_path = engine
        .report()
        .save(output_dir, item)
        .with_context(|| format!("failed to save report to {}", output_dir.display()))?;
    let shown = std::fs::canonicalize(&output_path).unwrap_or(output_path);
    log::info!(
        "[End] Finish checking. Result saved to '{}'",
        shown.display()
    );

    Ok(())
}

/// Overwrite the current console line with `[Checking][done/total]path`
fn write_progress(out: &mut impl Write, done: usize, total: usize, path: &str) -> std::io::Result<()> {
    write!(out, "\r[Checking][{}/{}]{}", done, total, path)?;
    out.flush()
}
