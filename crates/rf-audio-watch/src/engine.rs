//! Revision bracketing and rule evaluation over a whole comparison window

use crate::bracket::RevisionBracket;
use crate::change::ChangeSet;
use crate::config::Thresholds;
use crate::report::Report;
use crate::rules::{default_rules, CheckRule};
use crate::snapshot::Snapshot;
use crate::vcs::{ReleasePolicy, VersionControl};
use std::collections::HashMap;

/// Emitted after each file has been checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Zero-based position of the file
    pub index: usize,
    /// Number of files in the run
    pub total: usize,
    pub path: String,
}

/// Folds changesets into per-file brackets and checks every bracketed file
/// against the registered rules.
#[derive(Debug, Default)]
pub struct DiffEngine {
    brackets: Vec<RevisionBracket>,
    by_path: HashMap<String, usize>,
    rules: Vec<CheckRule>,
    policy: ReleasePolicy,
}

impl DiffEngine {
    pub fn new(policy: ReleasePolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub fn with_default_rules(thresholds: &Thresholds, policy: ReleasePolicy) -> Self {
        let mut engine = Self::new(policy);
        engine.add_rules(default_rules(thresholds));
        engine
    }

    /// Register rules; they are applied in registration order
    pub fn add_rules(&mut self, rules: impl IntoIterator<Item = CheckRule>) {
        self.rules.extend(rules);
    }

    pub fn rules(&self) -> &[CheckRule] {
        &self.rules
    }

    pub fn policy(&self) -> ReleasePolicy {
        self.policy
    }

    /// Fold every event of `change` into its file's bracket.
    ///
    /// Changes must be accumulated in ascending id order.
    pub fn accumulate(&mut self, change: &ChangeSet) {
        for event in change.events() {
            let idx = match self.by_path.get(&event.depot_path) {
                Some(&idx) => idx,
                None => {
                    self.brackets.push(RevisionBracket::new(&event.depot_path));
                    self.by_path
                        .insert(event.depot_path.clone(), self.brackets.len() - 1);
                    self.brackets.len() - 1
                }
            };
            self.brackets[idx].fold(event);
        }
    }

    /// Sort by change id, then accumulate each change
    pub fn accumulate_all(&mut self, mut changes: Vec<ChangeSet>) {
        changes.sort_by_key(ChangeSet::id);
        for change in &changes {
            self.accumulate(change);
        }
    }

    /// Brackets in first-seen order
    pub fn brackets(&self) -> &[RevisionBracket] {
        &self.brackets
    }

    pub fn bracket(&self, path: &str) -> Option<&RevisionBracket> {
        self.by_path.get(path).map(|&idx| &self.brackets[idx])
    }

    /// Number of bracketed files
    pub fn len(&self) -> usize {
        self.brackets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brackets.is_empty()
    }

    /// Check files one at a time. Each call to `next` fetches both revisions
    /// of one file, applies every rule and yields its progress.
    ///
    /// Rule logs are cleared when the run is created, so a new run starts
    /// over. Dropping the run early leaves a valid partial report.
    pub fn run<'a>(&'a mut self, vcs: &'a dyn VersionControl) -> CheckRun<'a> {
        for rule in &mut self.rules {
            rule.clear();
        }
        CheckRun {
            engine: self,
            vcs,
            next: 0,
        }
    }

    /// Run to completion, discarding progress
    pub fn run_all(&mut self, vcs: &dyn VersionControl) {
        self.run(vcs).for_each(drop);
    }

    fn check_file(&mut self, idx: usize, vcs: &dyn VersionControl) -> Progress {
        let bracket = &self.brackets[idx];
        let path = bracket.path();

        let prev = Snapshot::resolve(vcs, path, bracket.prev_revision(), self.policy);
        let curr = Snapshot::resolve(vcs, path, bracket.curr_revision(), self.policy);

        for rule in &mut self.rules {
            rule.check(&prev, &curr);
        }

        Progress {
            index: idx,
            total: self.brackets.len(),
            path: path.to_string(),
        }
    }

    /// Sections of every rule that fired so far
    pub fn report(&self) -> Report {
        Report::from_rules(&self.rules)
    }
}

/// In-progress check over all bracketed files, see [`DiffEngine::run`]
pub struct CheckRun<'a> {
    engine: &'a mut DiffEngine,
    vcs: &'a dyn VersionControl,
    next: usize,
}

impl CheckRun<'_> {
    /// Report of the files checked so far
    pub fn report(&self) -> Report {
        self.engine.report()
    }
}

impl Iterator for CheckRun<'_> {
    type Item = Progress;

    fn next(&mut self) -> Option<Progress> {
        if self.next >= self.engine.len() {
            return None;
        }
        let progress = self.engine.check_file(self.next, self.vcs);
        self.next += 1;
        Some(progress)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.engine.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CheckRun<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{Action, ChangeEvent, ChangeQuery};
    use std::cell::RefCell;
    use std::path::PathBuf;

    /// Backend with nothing to sync, recording every request
    #[derive(Default)]
    struct EmptyDepot {
        requests: RefCell<Vec<(String, u32)>>,
    }

    impl VersionControl for EmptyDepot {
        fn list_changes(&self, _query: &ChangeQuery) -> Vec<ChangeSet> {
            Vec::new()
        }

        fn materialize(&self, depot_path: &str, revision: u32) -> Option<PathBuf> {
            self.requests
                .borrow_mut()
                .push((depot_path.to_string(), revision));
            None
        }

        fn release(&self, _depot_path: &str, _policy: ReleasePolicy) {}
    }

    fn change(id: u64, events: &[(&str, u32)]) -> ChangeSet {
        ChangeSet::new(
            id,
            events
                .iter()
                .map(|&(path, rev)| ChangeEvent::new(path, Action::Edit, rev))
                .collect(),
        )
    }

    #[test]
    fn test_accumulate_builds_one_bracket_per_path() {
        let mut engine = DiffEngine::new(ReleasePolicy::Clean);
        engine.accumulate_all(vec![
            change(30, &[("//d/b.wav", 7)]),
            change(10, &[("//d/a.wav", 1), ("//d/b.wav", 5)]),
            change(20, &[("//d/a.wav", 4)]),
        ]);

        assert_eq!(engine.len(), 2);
        let paths: Vec<_> = engine.brackets().iter().map(RevisionBracket::path).collect();
        assert_eq!(paths, ["//d/a.wav", "//d/b.wav"]);

        let a = engine.bracket("//d/a.wav").unwrap();
        assert_eq!((a.prev_revision(), a.curr_revision()), (0, 4));
        let b = engine.bracket("//d/b.wav").unwrap();
        assert_eq!((b.prev_revision(), b.curr_revision()), (4, 7));
    }

    #[test]
    fn test_revision_zero_is_never_fetched() {
        let mut engine = DiffEngine::with_default_rules(&Thresholds::default(), ReleasePolicy::Clean);
        engine.accumulate(&change(1, &[("//d/a.wav", 1)]));

        let depot = EmptyDepot::default();
        let progress: Vec<_> = engine.run(&depot).collect();

        assert_eq!(
            progress,
            vec![Progress {
                index: 0,
                total: 1,
                path: "//d/a.wav".into()
            }]
        );
        assert_eq!(*depot.requests.borrow(), vec![("//d/a.wav".to_string(), 1)]);
        // unavailable at both ends
        assert!(engine.report().is_empty());
    }

    #[test]
    fn test_run_is_incremental() {
        let mut engine = DiffEngine::with_default_rules(&Thresholds::default(), ReleasePolicy::Keep);
        engine.accumulate(&change(1, &[("//d/a.wav", 2), ("//d/b.wav", 3), ("//d/c.wav", 4)]));

        let depot = EmptyDepot::default();
        let mut run = engine.run(&depot);
        assert_eq!(run.len(), 3);

        let first = run.next().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(run.len(), 2);
        assert_eq!(depot.requests.borrow().len(), 2);
        drop(run);

        // a new run starts over
        assert_eq!(engine.run(&depot).count(), 3);
    }
}
