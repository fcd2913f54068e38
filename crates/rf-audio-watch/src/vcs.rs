//! Version control collaborator interface

use crate::change::{ChangeQuery, ChangeSet};
use std::path::{Path, PathBuf};

/// What to do with a local copy once it has been read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleasePolicy {
    /// Remove the local copy right away, bounding disk usage
    #[default]
    Clean,
    /// Leave the workspace synced to head
    Keep,
}

impl ReleasePolicy {
    pub fn from_clean_mode(clean_mode: bool) -> Self {
        if clean_mode { Self::Clean } else { Self::Keep }
    }
}

/// Operations the diff engine needs from a version control backend.
///
/// Backend command failures are handled inside implementations and reported
/// as "no result" (empty list, `None`).
pub trait VersionControl {
    /// Changes touching `query.directory` inside the window, already narrowed
    /// to the directory and extension, in ascending change id order
    fn list_changes(&self, query: &ChangeQuery) -> Vec<ChangeSet>;

    /// Bring `depot_path#revision` into the local workspace, returning the
    /// local file path
    fn materialize(&self, depot_path: &str, revision: u32) -> Option<PathBuf>;

    /// Best-effort cleanup of a materialized file
    fn release(&self, depot_path: &str, policy: ReleasePolicy);
}

/// Local copy of one depot revision, released on drop
pub struct Materialized<'a> {
    vcs: &'a dyn VersionControl,
    depot_path: &'a str,
    local_path: PathBuf,
    policy: ReleasePolicy,
}

impl<'a> Materialized<'a> {
    /// Materialize `depot_path#revision`. Returns `None` when the backend has
    /// nothing for it or the local file is missing; nothing is released then.
    pub fn acquire(
        vcs: &'a dyn VersionControl,
        depot_path: &'a str,
        revision: u32,
        policy: ReleasePolicy,
    ) -> Option<Self> {
        let local_path = vcs.materialize(depot_path, revision)?;
        if local_path.as_os_str().is_empty() || !local_path.exists() {
            return None;
        }
        Some(Self {
            vcs,
            depot_path,
            local_path,
            policy,
        })
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }
}

impl Drop for Materialized<'_> {
    fn drop(&mut self) {
        self.vcs.release(self.depot_path, self.policy);
    }
}
