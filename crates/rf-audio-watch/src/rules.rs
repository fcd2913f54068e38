//! Check rules comparing two snapshots of the same file

use crate::config::Thresholds;
use crate::metrics::AudioMetrics;
use crate::snapshot::Snapshot;
use std::fmt;

type Predicate = dyn Fn(&Snapshot, &Snapshot) -> Option<String> + Send;

/// Named comparison with its own log of triggered lines
pub struct CheckRule {
    name: String,
    header: String,
    predicate: Box<Predicate>,
    lines: Vec<String>,
}

impl CheckRule {
    /// `header` is written verbatim above the triggered lines and may span
    /// several lines (title plus column names).
    pub fn new<F>(name: impl Into<String>, header: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Snapshot, &Snapshot) -> Option<String> + Send + 'static,
    {
        Self {
            name: name.into(),
            header: header.into(),
            predicate: Box::new(predicate),
            lines: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    /// Lines triggered so far, in check order
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Evaluate the rule for one file, recording a line when it fires
    pub fn check(&mut self, prev: &Snapshot, curr: &Snapshot) -> bool {
        match (self.predicate)(prev, curr) {
            Some(line) => {
                self.lines.push(line);
                true
            }
            None => false,
        }
    }

    /// Forget every triggered line
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Header plus triggered lines, `None` when nothing fired
    pub fn section(&self) -> Option<String> {
        if self.lines.is_empty() {
            return None;
        }
        let mut out = self.header.clone();
        for line in &self.lines {
            out.push('\n');
            out.push_str(line);
        }
        Some(out)
    }
}

impl fmt::Debug for CheckRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckRule")
            .field("name", &self.name)
            .field("lines", &self.lines.len())
            .finish()
    }
}

/// Default rule set, in application order: mean dBFS delta, mean peak dBFS
/// delta, channel count change, existence change
pub fn default_rules(thresholds: &Thresholds) -> Vec<CheckRule> {
    let dbfs = thresholds.dbfs_delta_db;
    let max_dbfs = thresholds.max_dbfs_delta_db;
    vec![
        CheckRule::new(
            "dbfs_delta",
            "[Resource dBFS diff too large]\nPrev dBFS,Curr dBFS,Path",
            move |prev, curr| dbfs_delta(prev, curr, dbfs),
        ),
        CheckRule::new(
            "max_dbfs_delta",
            "[Resource max dBFS diff too large]\nPrev max dBFS,Curr max dBFS,Path",
            move |prev, curr| max_dbfs_delta(prev, curr, max_dbfs),
        ),
        CheckRule::new(
            "channel_count",
            "[Resource channel num changed]\nPrev channel num,Curr channel num,Path",
            channel_count_change,
        ),
        CheckRule::new(
            "existence",
            "[Resource changed]\nAction,OldRev,NewRev,Path",
            existence_change,
        ),
    ]
}

/// Added / Removed / Changed marker. Fires whenever the file exists at
/// either end.
pub fn existence_change(prev: &Snapshot, curr: &Snapshot) -> Option<String> {
    let (action, path) = match (prev.is_available(), curr.is_available()) {
        (false, true) => ("Added", &curr.depot_path),
        (true, false) => ("Removed", &prev.depot_path),
        (false, false) => return None,
        (true, true) => ("Changed", &curr.depot_path),
    };
    Some(format!(
        "{},#{},#{},{}",
        action, prev.revision, curr.revision, path
    ))
}

/// Mean RMS level moved by at least `threshold` dB
pub fn dbfs_delta(prev: &Snapshot, curr: &Snapshot, threshold: f64) -> Option<String> {
    level_delta(prev, curr, threshold, AudioMetrics::mean_rms_dbfs)
}

/// Mean sample peak moved by at least `threshold` dB
pub fn max_dbfs_delta(prev: &Snapshot, curr: &Snapshot, threshold: f64) -> Option<String> {
    level_delta(prev, curr, threshold, AudioMetrics::mean_max_dbfs)
}

fn level_delta(
    prev: &Snapshot,
    curr: &Snapshot,
    threshold: f64,
    level: fn(&AudioMetrics) -> f64,
) -> Option<String> {
    let prev_db = level(prev.metrics()?);
    let curr_db = level(curr.metrics()?);
    if (curr_db - prev_db).abs() >= threshold {
        Some(format!("{:.2},{:.2},{}", prev_db, curr_db, curr.depot_path))
    } else {
        None
    }
}

/// Channel count differs between revisions
pub fn channel_count_change(prev: &Snapshot, curr: &Snapshot) -> Option<String> {
    let prev_channels = prev.metrics()?.channel_count();
    let curr_channels = curr.metrics()?.channel_count();
    if prev_channels != curr_channels {
        Some(format!(
            "{},{},{}",
            prev_channels, curr_channels, curr.depot_path
        ))
    } else {
        None
    }
}
