//! Watch list and threshold configuration

use crate::change::ChangeQuery;
use crate::vcs::ReleasePolicy;
use crate::{Result, WatchError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Deviation thresholds for the level rules, in dB (inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Mean RMS dBFS delta
    pub dbfs_delta_db: f64,

    /// Mean peak dBFS delta
    pub max_dbfs_delta_db: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            dbfs_delta_db: 3.0,
            max_dbfs_delta_db: 3.0,
        }
    }
}

/// One watched depot directory and its comparison window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchItem {
    /// Display name, also the report file prefix (e.g. `Dev_Normal`)
    pub name: String,

    /// Depot directory
    pub path: String,

    /// Change id (e.g. `2262400`) or time (e.g. `2023/3/16:19:00:00`)
    pub prev_stamp: String,

    pub curr_stamp: String,
}

impl WatchItem {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        prev_stamp: impl Into<String>,
        curr_stamp: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            prev_stamp: prev_stamp.into(),
            curr_stamp: curr_stamp.into(),
        }
    }

    /// Validate stamps and build the change query for this item
    pub fn query(&self, extension: &str) -> Result<ChangeQuery> {
        ChangeQuery::new(&self.path, &self.prev_stamp, &self.curr_stamp, extension)
    }
}

/// Full watcher configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchSetting {
    #[serde(rename = "watch_item_list")]
    pub watch_items: Vec<WatchItem>,

    #[serde(rename = "dbfs_diff_thres")]
    pub dbfs_threshold: f64,

    #[serde(rename = "max_dbfs_diff_thres")]
    pub max_dbfs_threshold: f64,

    pub disable_clean_mode: bool,

    pub p4_server: String,

    pub p4_workspace_name: String,

    pub output_dir: String,

    pub file_extension: String,
}

impl Default for WatchSetting {
    fn default() -> Self {
        Self {
            watch_items: Vec::new(),
            dbfs_threshold: 3.0,
            max_dbfs_threshold: 3.0,
            disable_clean_mode: true,
            p4_server: String::new(),
            p4_workspace_name: String::new(),
            output_dir: "results".into(),
            file_extension: ".wav".into(),
        }
    }
}

/// Keys present in one configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingLayer {
    watch_item_list: Option<Vec<WatchItem>>,
    dbfs_diff_thres: Option<f64>,
    max_dbfs_diff_thres: Option<f64>,
    disable_clean_mode: Option<bool>,
    p4_server: Option<String>,
    p4_workspace_name: Option<String>,
    output_dir: Option<String>,
    file_extension: Option<String>,
}

impl WatchSetting {
    /// Apply each existing file in order; later files override earlier keys
    pub fn load_layered<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut setting = Self::default();
        for path in paths {
            let path = path.as_ref();
            if path.exists() {
                setting.apply_json_file(path)?;
                log::debug!("Loaded settings from {}", path.display());
            }
        }
        Ok(setting)
    }

    pub fn apply_json_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        self.apply_json(&content)
    }

    /// Override only the keys present in `json`
    pub fn apply_json(&mut self, json: &str) -> Result<()> {
        let layer: SettingLayer = serde_json::from_str(json)?;

        if let Some(items) = layer.watch_item_list {
            self.watch_items = items;
        }
        if let Some(v) = layer.dbfs_diff_thres {
            self.dbfs_threshold = v;
        }
        if let Some(v) = layer.max_dbfs_diff_thres {
            self.max_dbfs_threshold = v;
        }
        if let Some(v) = layer.disable_clean_mode {
            self.disable_clean_mode = v;
        }
        if let Some(v) = layer.p4_server {
            self.p4_server = v;
        }
        if let Some(v) = layer.p4_workspace_name {
            self.p4_workspace_name = v;
        }
        if let Some(v) = layer.output_dir {
            self.output_dir = v;
        }
        if let Some(v) = layer.file_extension {
            self.file_extension = v;
        }

        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        for (label, value) in [
            ("dbfs_diff_thres", self.dbfs_threshold),
            ("max_dbfs_diff_thres", self.max_dbfs_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(WatchError::Config(format!(
                    "{} must be a non-negative number, got {}",
                    label, value
                )));
            }
        }
        Ok(())
    }

    /// Write as JSON with 4-space indentation
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        std::fs::write(path, buf)?;
        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            dbfs_delta_db: self.dbfs_threshold,
            max_dbfs_delta_db: self.max_dbfs_threshold,
        }
    }

    pub fn release_policy(&self) -> ReleasePolicy {
        ReleasePolicy::from_clean_mode(!self.disable_clean_mode)
    }

    /// Point every watch item at the given window ends
    pub fn override_stamps(&mut self, prev: Option<&str>, curr: Option<&str>) {
        for item in &mut self.watch_items {
            if let Some(prev) = prev {
                item.prev_stamp = prev.to_string();
            }
            if let Some(curr) = curr {
                item.curr_stamp = curr.to_string();
            }
        }
    }
}
