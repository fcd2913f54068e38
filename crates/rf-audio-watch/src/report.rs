//! Report assembly and persistence

use crate::config::WatchItem;
use crate::rules::CheckRule;
use crate::Result;
use std::fmt;
use std::path::{Path, PathBuf};

/// Text report, one section per rule that fired
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    sections: Vec<String>,
}

impl Report {
    /// Collect the non-empty sections of `rules`, keeping rule order
    pub fn from_rules(rules: &[CheckRule]) -> Self {
        Self {
            sections: rules.iter().filter_map(CheckRule::section).collect(),
        }
    }

    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Sections joined by a single blank line
    pub fn to_text(&self) -> String {
        self.sections.join("\n\n")
    }

    /// Write into `output_dir` (created if missing) and return the file path
    pub fn save(&self, output_dir: &Path, item: &WatchItem) -> Result<PathBuf> {
        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join(report_file_name(item));
        std::fs::write(&path, format!("{}\n", self.to_text()))?;
        Ok(path)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// `<name>_prev_<prev>_curr_<curr>.csv`
pub fn report_file_name(item: &WatchItem) -> String {
    format!(
        "{}_prev_{}_curr_{}.csv",
        item.name,
        sanitize_stamp(&item.prev_stamp),
        sanitize_stamp(&item.curr_stamp)
    )
}

fn sanitize_stamp(stamp: &str) -> String {
    stamp.replace([':', '/'], "_")
}
