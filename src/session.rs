//! Tracks which selection a load was started for, so a result that arrives
//! after the user moved on is dropped instead of overwriting newer state.

use chrono::NaiveDate;

use crate::engine::AttendanceSheet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket<K> {
    key: K,
    generation: u64,
}

impl<K> Ticket<K> {
    pub fn key(&self) -> &K {
        &self.key
    }
}

#[derive(Debug)]
pub struct LatestRequest<K> {
    generation: u64,
    current: Option<K>,
}

impl<K: Clone + PartialEq> LatestRequest<K> {
    pub fn new() -> Self {
        Self {
            generation: 0,
            current: None,
        }
    }

    /// Start a load for `key`. Any earlier ticket stops being current.
    pub fn begin(&mut self, key: K) -> Ticket<K> {
        self.generation += 1;
        self.current = Some(key.clone());
        Ticket {
            key,
            generation: self.generation,
        }
    }

    pub fn is_current(&self, ticket: &Ticket<K>) -> bool {
        ticket.generation == self.generation && self.current.as_ref() == Some(&ticket.key)
    }

    /// Hand `value` back only if `ticket` is still the latest request.
    pub fn accept<T>(&self, ticket: &Ticket<K>, value: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(value)
        } else {
            log::debug!(
                "dropping stale result (generation {} < {})",
                ticket.generation,
                self.generation
            );
            None
        }
    }
}

impl<K: Clone + PartialEq> Default for LatestRequest<K> {
    fn default() -> Self {
        Self::new()
    }
}

pub type SheetKey = (i64, NaiveDate);

/// State behind the interactive marking flow: one batch and date at a time.
#[derive(Debug)]
pub struct MarkingSession {
    requests: LatestRequest<SheetKey>,
    sheet: Option<(SheetKey, AttendanceSheet)>,
}

impl MarkingSession {
    pub fn new() -> Self {
        Self {
            requests: LatestRequest::new(),
            sheet: None,
        }
    }

    /// Switch to `batch_id` on `date`. The sheet shown so far is discarded.
    pub fn select(&mut self, batch_id: i64, date: NaiveDate) -> Ticket<SheetKey> {
        self.sheet = None;
        self.requests.begin((batch_id, date))
    }

    /// Apply a loaded sheet. Returns false when the load was for an older selection.
    pub fn apply(&mut self, ticket: &Ticket<SheetKey>, sheet: AttendanceSheet) -> bool {
        match self.requests.accept(ticket, sheet) {
            Some(sheet) => {
                self.sheet = Some((*ticket.key(), sheet));
                true
            }
            None => false,
        }
    }

    pub fn selection(&self) -> Option<SheetKey> {
        self.sheet.as_ref().map(|(key, _)| *key)
    }

    pub fn sheet(&self) -> Option<&AttendanceSheet> {
        self.sheet.as_ref().map(|(_, sheet)| sheet)
    }

    pub fn sheet_mut(&mut self) -> Option<&mut AttendanceSheet> {
        self.sheet.as_mut().map(|(_, sheet)| sheet)
    }
}

impl Default for MarkingSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::reconcile::reconcile;
    use crate::models::Student;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    fn roster(ids: &[i64]) -> Vec<Student> {
        ids.iter()
            .map(|&id| Student {
                id,
                name: format!("S{}", id),
                admission_number: id.to_string(),
                phone_number: None,
                remarks: None,
            })
            .collect()
    }

    #[test]
    fn only_latest_ticket_is_accepted() {
        let mut requests = LatestRequest::new();
        let old = requests.begin("a");
        let new = requests.begin("b");
        assert_eq!(requests.accept(&old, 1), None);
        assert_eq!(requests.accept(&new, 2), Some(2));
    }

    #[test]
    fn reselecting_the_same_key_still_invalidates_older_tickets() {
        let mut requests = LatestRequest::new();
        let first = requests.begin(5);
        let second = requests.begin(5);
        assert!(!requests.is_current(&first));
        assert!(requests.is_current(&second));
    }

    #[test]
    fn slow_load_for_old_date_does_not_overwrite_new_one() {
        let mut session = MarkingSession::new();
        let slow = session.select(1, date(1));
        let fast = session.select(1, date(2));

        assert!(session.apply(&fast, reconcile(&roster(&[1, 2]), &[])));
        assert!(!session.apply(&slow, reconcile(&roster(&[1]), &[])));

        assert_eq!(session.selection(), Some((1, date(2))));
        assert_eq!(session.sheet().map(|s| s.entries.len()), Some(2));
    }

    #[test]
    fn selecting_clears_the_previous_sheet() {
        let mut session = MarkingSession::new();
        let t = session.select(1, date(1));
        session.apply(&t, reconcile(&roster(&[1]), &[]));
        session.select(2, date(1));
        assert!(session.sheet().is_none());
    }

    #[test]
    fn default_session_has_nothing_selected() {
        let mut session = MarkingSession::default();
        assert_eq!(session.selection(), None);
        let t = session.select(1, date(4));
        assert!(session.apply(&t, reconcile(&roster(&[1]), &[])));

        let requests: LatestRequest<i64> = LatestRequest::default();
        assert!(!requests.is_current(&Ticket { key: 1, generation: 0 }));
    }

    #[test]
    fn edits_go_through_sheet_mut() {
        let mut session = MarkingSession::new();
        let t = session.select(1, date(3));
        session.apply(&t, reconcile(&roster(&[1, 2]), &[]));
        session.sheet_mut().unwrap().set(2, false);
        assert_eq!(session.sheet().unwrap().present_count(), 1);
    }
}
