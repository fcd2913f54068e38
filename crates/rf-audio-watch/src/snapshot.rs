//! Audio metrics of one depot file at one revision

use crate::loader::AudioData;
use crate::metrics::AudioMetrics;
use crate::vcs::{Materialized, ReleasePolicy, VersionControl};
use crate::Result;
use std::path::Path;

/// Whether audio could be read at a revision
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotState {
    Available(AudioMetrics),
    /// Missing at this revision, or unreadable
    Unavailable,
}

impl SnapshotState {
    /// Decode a local file. Never fails: decode errors are logged and
    /// degrade to `Unavailable`.
    pub fn from_file(path: &Path) -> Self {
        match Self::try_from_file(path) {
            Ok(state) => state,
            Err(e) => {
                log::warn!("[Load audio] {}", e);
                Self::Unavailable
            }
        }
    }

    fn try_from_file(path: &Path) -> Result<Self> {
        if path.as_os_str().is_empty() || std::fs::metadata(path)?.len() == 0 {
            return Ok(Self::Unavailable);
        }
        let audio = AudioData::load(path)?;
        Ok(Self::Available(AudioMetrics::calculate(&audio)))
    }
}

/// Metrics of `depot_path` at `revision`
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub depot_path: String,
    pub revision: u32,
    pub state: SnapshotState,
}

impl Snapshot {
    pub fn new(depot_path: impl Into<String>, revision: u32, state: SnapshotState) -> Self {
        Self {
            depot_path: depot_path.into(),
            revision,
            state,
        }
    }

    pub fn unavailable(depot_path: impl Into<String>, revision: u32) -> Self {
        Self::new(depot_path, revision, SnapshotState::Unavailable)
    }

    /// Fetch and analyze one revision through the backend.
    ///
    /// Revision 0 is never fetched. The local copy is released according to
    /// `policy` once decoding is done.
    pub fn resolve(
        vcs: &dyn VersionControl,
        depot_path: &str,
        revision: u32,
        policy: ReleasePolicy,
    ) -> Self {
        if revision == 0 {
            return Self::unavailable(depot_path, revision);
        }

        let state = match Materialized::acquire(vcs, depot_path, revision, policy) {
            Some(local) => match SnapshotState::try_from_file(local.local_path()) {
                Ok(SnapshotState::Unavailable) => {
                    log::warn!("[Load audio] {}#{} is empty", depot_path, revision);
                    SnapshotState::Unavailable
                }
                Ok(state) => state,
                Err(e) => {
                    log::warn!(
                        "[Load audio] failed to load {}#{}: {}",
                        depot_path,
                        revision,
                        e
                    );
                    SnapshotState::Unavailable
                }
            },
            None => {
                log::debug!("{}#{} not available locally", depot_path, revision);
                SnapshotState::Unavailable
            }
        };

        Self::new(depot_path, revision, state)
    }

    pub fn metrics(&self) -> Option<&AudioMetrics> {
        match &self.state {
            SnapshotState::Available(metrics) => Some(metrics),
            SnapshotState::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.metrics().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use tempfile::TempDir;

    #[test]
    fn test_zero_length_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("zero.wav");
        std::fs::write(&path, b"").unwrap();

        assert_eq!(SnapshotState::from_file(&path), SnapshotState::Unavailable);
    }

    #[test]
    fn test_empty_path_is_unavailable() {
        assert_eq!(
            SnapshotState::from_file(Path::new("")),
            SnapshotState::Unavailable
        );
    }

    #[test]
    fn test_empty_and_corrupt_are_told_apart() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty.wav");
        std::fs::write(&empty, b"").unwrap();
        let corrupt = dir.path().join("corrupt.wav");
        std::fs::write(&corrupt, vec![0xAB; 128]).unwrap();

        assert!(matches!(
            SnapshotState::try_from_file(&empty),
            Ok(SnapshotState::Unavailable)
        ));
        assert!(SnapshotState::try_from_file(&corrupt).is_err());
    }

    #[test]
    fn test_corrupt_file_degrades() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.wav");
        std::fs::write(&path, vec![0xAB; 128]).unwrap();

        assert_eq!(SnapshotState::from_file(&path), SnapshotState::Unavailable);
    }

    #[test]
    fn test_decodes_wav() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..64 {
            writer.write_sample(0.5f32).unwrap();
            writer.write_sample(-0.5f32).unwrap();
        }
        writer.finalize().unwrap();

        let snapshot = Snapshot::new("//depot/tone.wav", 3, SnapshotState::from_file(&path));
        let metrics = snapshot.metrics().expect("decoded");
        assert_eq!(metrics.channel_count(), 2);
        assert_abs_diff_eq!(metrics.mean_rms_dbfs(), -6.0206, epsilon = 1e-3);
    }
}
