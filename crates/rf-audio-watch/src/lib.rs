//! # rf-audio-watch
//!
//! Audio regression watcher for versioned asset depots.
//!
//! ## Features
//!
//! - **Revision Bracketing**: folds every change touching a watched directory
//!   into one (previous, current) revision pair per file
//! - **Audio Metrics**: per-channel RMS and peak dBFS, channel count
//! - **Check Rules**: pluggable comparisons with configurable thresholds
//! - **Reports**: plain-text CSV sections, one per triggered rule
//! - **Perforce Backend**: `p4` command-line adapter for change listing and sync
//!
//! ## Example
//!
//! ```rust,ignore
//! use rf_audio_watch::{ChangeQuery, DiffEngine, ReleasePolicy, Thresholds, VersionControl};
//!
//! let query = ChangeQuery::new("//depot/Sound", "2262400", "", ".wav")?;
//! let mut engine = DiffEngine::with_default_rules(&Thresholds::default(), ReleasePolicy::Clean);
//! for change in backend.list_changes(&query) {
//!     engine.accumulate(&change);
//! }
//! for progress in engine.run(&backend) {
//!     println!("[{}/{}] {}", progress.index + 1, progress.total, progress.path);
//! }
//! println!("{}", engine.report());
//! ```

pub mod bracket;
pub mod change;
pub mod config;
pub mod engine;
pub mod loader;
pub mod metrics;
pub mod p4;
pub mod report;
pub mod rules;
pub mod snapshot;
pub mod vcs;

pub use bracket::RevisionBracket;
pub use change::{Action, ChangeEvent, ChangeQuery, ChangeSet, Stamp};
pub use config::{Thresholds, WatchItem, WatchSetting};
pub use engine::{CheckRun, DiffEngine, Progress};
pub use loader::AudioData;
pub use metrics::AudioMetrics;
pub use p4::P4Cli;
pub use report::Report;
pub use rules::{default_rules, CheckRule};
pub use snapshot::{Snapshot, SnapshotState};
pub use vcs::{Materialized, ReleasePolicy, VersionControl};

use thiserror::Error;

/// Errors that can occur while watching a depot
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Invalid stamp: '{0}'")]
    InvalidStamp(String),

    #[error("Failed to decode audio file: {0}")]
    Decode(String),

    #[error("Audio data is empty: {0}")]
    EmptyAudio(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version control error: {0}")]
    Backend(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, WatchError>;
