//! Perforce backend driving the `p4` command-line client
//!
//! Commands run with `-ztag`, so every result is a list of tagged records
//! (`... key value` lines). Command failures are logged and turn into empty
//! results; the engine never sees a backend error.

use crate::change::{Action, ChangeEvent, ChangeQuery, ChangeSet, Stamp};
use crate::config::WatchSetting;
use crate::vcs::{ReleasePolicy, VersionControl};
use crate::{Result, WatchError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;

/// One tagged output record
pub type Record = HashMap<String, String>;

/// `p4` executable plus connection options
#[derive(Debug, Clone)]
pub struct P4Cli {
    program: PathBuf,
    port: Option<String>,
    user: Option<String>,
    client: Option<String>,
    charset: Option<String>,
    password: Option<String>,
}

impl Default for P4Cli {
    fn default() -> Self {
        Self {
            program: PathBuf::from("p4"),
            port: None,
            user: None,
            client: None,
            charset: Some("utf8".into()),
            password: None,
        }
    }
}

impl P4Cli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Server and workspace from the settings; empty values fall back to the
    /// client's own environment (`P4PORT`, `P4CLIENT`, `.p4config`)
    pub fn from_setting(setting: &WatchSetting) -> Self {
        Self {
            port: non_empty(&setting.p4_server),
            client: non_empty(&setting.p4_workspace_name),
            ..Self::default()
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Password or ticket passed as `-P`
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-ztag");
        for (flag, value) in [
            ("-p", &self.port),
            ("-u", &self.user),
            ("-c", &self.client),
            ("-C", &self.charset),
            ("-P", &self.password),
        ] {
            if let Some(value) = value {
                cmd.arg(flag).arg(value);
            }
        }
        cmd.args(args);
        cmd
    }

    /// Run one command and parse its tagged output
    pub fn run(&self, args: &[String]) -> Result<Vec<Record>> {
        log::debug!("p4 {}", args.join(" "));
        let output = self
            .command(args)
            .output()
            .map_err(|e| WatchError::Backend(format!("failed to launch p4: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WatchError::Backend(format!(
                "p4 {} failed ({}): {}",
                args.first().map(String::as_str).unwrap_or_default(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(parse_tagged(&String::from_utf8_lossy(&output.stdout)))
    }

    fn run_logged(&self, args: &[String]) -> Option<Vec<Record>> {
        match self.run(args) {
            Ok(records) => Some(records),
            Err(e) => {
                log::error!("[p4] {}", e);
                None
            }
        }
    }

    /// Describe one submitted change, `None` on backend failure
    pub fn describe(&self, change_id: u64) -> Option<ChangeSet> {
        let records = self.run_logged(&["describe".into(), "-s".into(), change_id.to_string()])?;
        match records.as_slice() {
            [record] => change_from_record(record),
            other => {
                log::error!(
                    "[p4] unexpected describe output for change {}: {} records",
                    change_id,
                    other.len()
                );
                None
            }
        }
    }

    fn sync(&self, spec: String) -> bool {
        self.run_logged(&["sync".into(), spec]).is_some()
    }

    fn local_path(&self, depot_path: &str) -> Option<PathBuf> {
        let records = self.run_logged(&["where".into(), depot_path.into()])?;
        records
            .first()
            .and_then(|r| r.get("path"))
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }
}

impl VersionControl for P4Cli {
    fn list_changes(&self, query: &ChangeQuery) -> Vec<ChangeSet> {
        let Some(records) = self.run_logged(&changes_args(query)) else {
            return Vec::new();
        };

        let mut changes: Vec<ChangeSet> = records
            .iter()
            .filter_map(|r| r.get("change")?.parse::<u64>().ok())
            .filter(|&id| query.accepts_change(id))
            .filter_map(|id| self.describe(id))
            .map(|change| query.narrow(&change))
            .filter(|change| !change.is_empty())
            .collect();

        changes.sort_by_key(ChangeSet::id);
        log::info!(
            "{} changes touch {} in the window",
            changes.len(),
            query.directory
        );
        changes
    }

    fn materialize(&self, depot_path: &str, revision: u32) -> Option<PathBuf> {
        if !self.sync(format!("{}#{}", depot_path, revision)) {
            return None;
        }
        self.local_path(depot_path)
    }

    fn release(&self, depot_path: &str, policy: ReleasePolicy) {
        let spec = match policy {
            // revision 0 removes the local copy
            ReleasePolicy::Clean => format!("{}#0", depot_path),
            ReleasePolicy::Keep => depot_path.to_string(),
        };
        self.sync(spec);
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Arguments of the `changes` command for a query
pub fn changes_args(query: &ChangeQuery) -> Vec<String> {
    let mut args = vec!["changes".to_string()];
    if let Some(Stamp::Change(begin)) = &query.begin {
        args.push("-e".into());
        args.push(begin.to_string());
    }
    let dir = query.directory.replace('\\', "/");
    args.push(format!(
        "{}/...{}",
        dir.trim_end_matches('/'),
        time_range(query)
    ));
    args
}

/// Revision range suffix built from the timestamp bounds of a query
fn time_range(query: &ChangeQuery) -> String {
    let time = |stamp: &Option<Stamp>| match stamp {
        Some(Stamp::Time(t)) => Some(t.clone()),
        _ => None,
    };
    match (time(&query.begin), time(&query.end)) {
        (Some(begin), Some(end)) => format!("@{},{}", begin, end),
        (Some(begin), None) => format!("@{},@now", begin),
        (None, Some(end)) => format!("@{}", end),
        (None, None) => String::new(),
    }
}

/// Parse `-ztag` output into records.
///
/// A record ends where a key repeats. Lines without the `... ` prefix
/// continue the previous value (multi-line descriptions).
pub fn parse_tagged(output: &str) -> Vec<Record> {
    let mut records = Vec::new();
    let mut current = Record::new();
    let mut last_key: Option<String> = None;

    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("... ") {
            let rest = rest.trim_start_matches("... ");
            let (key, value) = rest.split_once(' ').unwrap_or((rest, ""));
            if current.contains_key(key) {
                records.push(finish_record(std::mem::take(&mut current)));
            }
            current.insert(key.to_string(), value.to_string());
            last_key = Some(key.to_string());
        } else if let Some(value) = last_key.as_ref().and_then(|k| current.get_mut(k)) {
            value.push('\n');
            value.push_str(line);
        }
    }
    if !current.is_empty() {
        records.push(finish_record(current));
    }
    records
}

fn finish_record(mut record: Record) -> Record {
    for value in record.values_mut() {
        let trimmed = value.trim_end().len();
        value.truncate(trimmed);
    }
    record
}

/// Build a changeset from a `describe` record (`depotFile0`, `action0`, ...)
pub fn change_from_record(record: &Record) -> Option<ChangeSet> {
    let id = record.get("change")?.parse::<u64>().ok()?;

    let mut events = Vec::new();
    for idx in 0.. {
        let Some(depot_path) = record.get(&format!("depotFile{}", idx)) else {
            break;
        };
        let field = |name: &str| record.get(&format!("{}{}", name, idx));

        let Some(revision) = field("rev").and_then(|r| r.parse::<u32>().ok()) else {
            log::warn!("[p4] change {}: no revision for {}", id, depot_path);
            continue;
        };
        let action = Action::parse(field("action").map(String::as_str).unwrap_or_default());
        let file_type = field("type").cloned().unwrap_or_default();

        events.push(ChangeEvent::new(depot_path.clone(), action, revision).with_file_type(file_type));
    }

    Some(ChangeSet::new(id, events))
}
