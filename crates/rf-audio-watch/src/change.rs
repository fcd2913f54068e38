//! Change events, changesets and comparison window stamps

use crate::{Result, WatchError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// `YYYY/MM/DD:hh:mm:ss`, one to four digit year, one or two digit fields
const TIME_STAMP_PATTERN: &str = r"^\d{1,4}/\d{1,2}/\d{1,2}:\d{1,2}:\d{1,2}:\d{1,2}$";

fn time_stamp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TIME_STAMP_PATTERN).expect("static pattern compiles"))
}

/// What a change did to a file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Add,
    Edit,
    Delete,
    Branch,
    Integrate,
    MoveAdd,
    MoveDelete,
    Purge,
    Archive,
    Import,
    Other(String),
}

impl Action {
    pub fn parse(s: &str) -> Self {
        match s {
            "add" => Self::Add,
            "edit" => Self::Edit,
            "delete" => Self::Delete,
            "branch" => Self::Branch,
            "integrate" => Self::Integrate,
            "move/add" => Self::MoveAdd,
            "move/delete" => Self::MoveDelete,
            "purge" => Self::Purge,
            "archive" => Self::Archive,
            "import" => Self::Import,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether the file has content at the revision this action produced
    pub fn exists_after(&self) -> bool {
        !matches!(
            self,
            Self::Delete | Self::MoveDelete | Self::Purge | Self::Archive
        )
    }
}

/// One file mutation inside one change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Depot path, identity key of the file
    pub depot_path: String,

    pub action: Action,

    /// Backend file type (e.g. `binary+F`)
    pub file_type: String,

    /// File revision produced by this change
    pub revision: u32,
}

impl ChangeEvent {
    pub fn new(depot_path: impl Into<String>, action: Action, revision: u32) -> Self {
        Self {
            depot_path: depot_path.into(),
            action,
            file_type: String::new(),
            revision,
        }
    }

    pub fn with_file_type(mut self, file_type: impl Into<String>) -> Self {
        self.file_type = file_type.into();
        self
    }
}

/// All file events of one change transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    id: u64,
    events: Vec<ChangeEvent>,
}

impl ChangeSet {
    pub fn new(id: u64, events: Vec<ChangeEvent>) -> Self {
        Self { id, events }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn events(&self) -> &[ChangeEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Keep only events below `prefix`
    pub fn filter_path(&self, prefix: &str) -> Self {
        self.retain(|e| e.depot_path.starts_with(prefix))
    }

    /// Keep only events whose path ends with `ext`; an empty extension keeps all
    pub fn filter_extension(&self, ext: &str) -> Self {
        if ext.is_empty() {
            return self.clone();
        }
        self.retain(|e| e.depot_path.ends_with(ext))
    }

    fn retain(&self, keep: impl Fn(&ChangeEvent) -> bool) -> Self {
        Self {
            id: self.id,
            events: self.events.iter().filter(|e| keep(e)).cloned().collect(),
        }
    }
}

/// Bound of a comparison window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stamp {
    /// Change transaction id
    Change(u64),
    /// Timestamp in `YYYY/MM/DD:hh:mm:ss` form
    Time(String),
}

impl Stamp {
    /// Parse a user supplied stamp. Empty input means an open bound.
    pub fn parse(s: &str) -> Result<Option<Self>> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(None);
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            return s
                .parse()
                .map(|id| Some(Self::Change(id)))
                .map_err(|_| WatchError::InvalidStamp(s.to_string()));
        }
        if time_stamp_regex().is_match(s) {
            return Ok(Some(Self::Time(s.to_string())));
        }
        Err(WatchError::InvalidStamp(s.to_string()))
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Change(id) => write!(f, "{}", id),
            Self::Time(t) => f.write_str(t),
        }
    }
}

/// Validated request for the changes of one directory inside a window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeQuery {
    pub directory: String,
    pub begin: Option<Stamp>,
    pub end: Option<Stamp>,
    /// File extension filter, e.g. `.wav`; empty keeps every file
    pub extension: String,
}

impl ChangeQuery {
    pub fn new(directory: &str, begin: &str, end: &str, extension: &str) -> Result<Self> {
        Ok(Self {
            directory: directory.to_string(),
            begin: Stamp::parse(begin)?,
            end: Stamp::parse(end)?,
            extension: extension.to_string(),
        })
    }

    /// Whether a change id falls inside the end bound (end ids are exclusive)
    pub fn accepts_change(&self, id: u64) -> bool {
        match self.end {
            Some(Stamp::Change(end)) => id < end,
            _ => true,
        }
    }

    /// Narrow a described change to this query's directory and extension
    pub fn narrow(&self, change: &ChangeSet) -> ChangeSet {
        change
            .filter_path(&self.directory)
            .filter_extension(&self.extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_change() -> ChangeSet {
        ChangeSet::new(
            42,
            vec![
                ChangeEvent::new("//depot/Sound/a.wav", Action::Edit, 3),
                ChangeEvent::new("//depot/Sound/b.ogg", Action::Add, 1),
                ChangeEvent::new("//depot/Music/c.wav", Action::Delete, 7),
            ],
        )
    }

    #[test]
    fn test_stamp_parse() {
        assert_eq!(Stamp::parse("").unwrap(), None);
        assert_eq!(Stamp::parse("2262400").unwrap(), Some(Stamp::Change(2262400)));
        assert_eq!(
            Stamp::parse("2023/3/16:19:00:00").unwrap(),
            Some(Stamp::Time("2023/3/16:19:00:00".into()))
        );
    }

    #[test]
    fn test_stamp_parse_rejects_garbage() {
        for bad in ["yesterday", "2023-03-16", "2023/3/16", "12a", "2023/3/16:19:00:00x"] {
            assert!(
                matches!(Stamp::parse(bad), Err(WatchError::InvalidStamp(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_filters_produce_narrowed_copies() {
        let change = sample_change();

        let sound = change.filter_path("//depot/Sound");
        assert_eq!(sound.id(), 42);
        assert_eq!(sound.len(), 2);

        let wav = sound.filter_extension(".wav");
        assert_eq!(wav.len(), 1);
        assert_eq!(wav.events()[0].depot_path, "//depot/Sound/a.wav");

        // original untouched
        assert_eq!(change.len(), 3);
        assert_eq!(change.filter_extension("").len(), 3);
    }

    #[test]
    fn test_query_end_is_exclusive() {
        let query = ChangeQuery::new("//depot/Sound", "100", "200", ".wav").unwrap();
        assert!(query.accepts_change(199));
        assert!(!query.accepts_change(200));

        let open = ChangeQuery::new("//depot/Sound", "100", "", ".wav").unwrap();
        assert!(open.accepts_change(u64::MAX));
    }

    #[test]
    fn test_query_rejects_bad_stamp() {
        assert!(ChangeQuery::new("//depot", "soon", "", "").is_err());
    }

    #[test]
    fn test_action_existence() {
        assert!(Action::parse("add").exists_after());
        assert!(Action::parse("integrate").exists_after());
        assert!(!Action::parse("delete").exists_after());
        assert!(!Action::parse("move/delete").exists_after());
        assert_eq!(Action::parse("weird"), Action::Other("weird".into()));
    }
}
