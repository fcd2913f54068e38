//! Per-file (previous, current) revision bracket

use crate::change::ChangeEvent;

/// Revision pair to compare for one depot file.
///
/// `prev` tracks one below the lowest revision seen (floor 0), `curr` the
/// highest. Revision 0 means "before any tracked revision" and always
/// resolves to unavailable audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionBracket {
    path: String,
    prev: Option<u32>,
    curr: Option<u32>,
}

impl RevisionBracket {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            prev: None,
            curr: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Previous revision, 0 while nothing was folded
    pub fn prev_revision(&self) -> u32 {
        self.prev.unwrap_or(0)
    }

    /// Current revision, 0 while nothing was folded
    pub fn curr_revision(&self) -> u32 {
        self.curr.unwrap_or(0)
    }

    /// Fold one event of this file into the bracket
    pub fn fold(&mut self, event: &ChangeEvent) {
        debug_assert_eq!(event.depot_path, self.path);

        let rev = event.revision;
        match self.prev {
            Some(prev) if rev > prev => {}
            _ => self.prev = Some(rev.saturating_sub(1)),
        }
        if self.curr.is_none_or(|curr| rev > curr) {
            self.curr = Some(rev);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::Action;

    fn event(rev: u32) -> ChangeEvent {
        ChangeEvent::new("//depot/a.wav", Action::Edit, rev)
    }

    fn fold_all(revs: &[u32]) -> RevisionBracket {
        let mut bracket = RevisionBracket::new("//depot/a.wav");
        for &rev in revs {
            bracket.fold(&event(rev));
        }
        bracket
    }

    #[test]
    fn test_first_fold() {
        let bracket = fold_all(&[5]);
        assert_eq!(bracket.prev_revision(), 4);
        assert_eq!(bracket.curr_revision(), 5);
    }

    #[test]
    fn test_first_revision_floors_at_zero() {
        let bracket = fold_all(&[0]);
        assert_eq!(bracket.prev_revision(), 0);
        assert_eq!(bracket.curr_revision(), 0);

        let bracket = fold_all(&[1]);
        assert_eq!(bracket.prev_revision(), 0);
        assert_eq!(bracket.curr_revision(), 1);
    }

    #[test]
    fn test_two_transactions() {
        let bracket = fold_all(&[1, 4]);
        assert_eq!(bracket.prev_revision(), 0);
        assert_eq!(bracket.curr_revision(), 4);
    }

    #[test]
    fn test_out_of_order_revisions_track_min_and_max() {
        let bracket = fold_all(&[6, 3, 9, 4, 2, 8]);
        assert_eq!(bracket.prev_revision(), 1);
        assert_eq!(bracket.curr_revision(), 9);
    }

    #[test]
    fn test_min_max_property() {
        let sequences: &[&[u32]] = &[
            &[3],
            &[3, 2],
            &[2, 3],
            &[10, 1, 5],
            &[7, 7, 7],
            &[4, 12, 11, 3, 30, 29],
            &[1, 1, 2, 0],
        ];
        for revs in sequences {
            let bracket = fold_all(revs);
            let min = *revs.iter().min().unwrap();
            let max = *revs.iter().max().unwrap();
            assert_eq!(bracket.curr_revision(), max, "{revs:?}");
            assert_eq!(bracket.prev_revision(), min.saturating_sub(1), "{revs:?}");
        }
    }

    #[test]
    fn test_fold_is_idempotent() {
        let mut bracket = fold_all(&[3, 8]);
        let before = bracket.clone();
        bracket.fold(&event(8));
        assert_eq!(bracket, before);
        bracket.fold(&event(3));
        assert_eq!(bracket, before);
    }
}
