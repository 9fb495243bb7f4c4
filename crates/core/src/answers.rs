//! Local, optimistic view of what the student has selected and flagged.
//!
//! Server truth always wins once it arrives; the cache only guards against
//! responses that are older than what it has already applied, and against
//! fetches that were issued before a local mutation they cannot reflect.

use std::collections::HashMap;

use crate::model::{Answer, OptionId, QuestionId};

/// Write state of a locally held selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Matches what the server last reported.
    Confirmed,
    /// A write is in flight.
    Pending,
    /// The last write failed; the selection is kept until server truth replaces it.
    Failed,
}

/// Per-question entry of the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerEntry {
    selected: Option<OptionId>,
    time_spent_seconds: u64,
    marked_for_review: bool,
    sync: SyncState,
    revision: u64,
}

impl AnswerEntry {
    fn from_server(answer: &Answer, revision: u64) -> Self {
        Self {
            selected: answer.selected_option,
            time_spent_seconds: answer.time_spent_seconds,
            marked_for_review: answer.is_marked_for_review,
            sync: SyncState::Confirmed,
            revision,
        }
    }

    #[must_use]
    pub fn selected(&self) -> Option<OptionId> {
        self.selected
    }

    #[must_use]
    pub fn time_spent_seconds(&self) -> u64 {
        self.time_spent_seconds
    }

    /// Server-confirmed review flag.
    #[must_use]
    pub fn marked_for_review(&self) -> bool {
        self.marked_for_review
    }

    #[must_use]
    pub fn sync(&self) -> SyncState {
        self.sync
    }
}

/// Handle returned by [`AnswerCache::begin_fetch`], passed back on reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    seq: u64,
    revision: u64,
}

/// Result of applying a fetched answer list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied { kept_local: usize },
    Stale,
}

#[derive(Debug, Clone, Default)]
pub struct AnswerCache {
    entries: HashMap<QuestionId, AnswerEntry>,
    revision: u64,
    next_seq: u64,
    applied_seq: Option<u64>,
}

impl AnswerCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the cache from answers fetched at session start.
    #[must_use]
    pub fn from_server(answers: &[Answer]) -> Self {
        let mut cache = Self::new();
        for answer in answers {
            cache
                .entries
                .insert(answer.question_id, AnswerEntry::from_server(answer, 0));
        }
        cache
    }

    #[must_use]
    pub fn entry(&self, question: QuestionId) -> Option<&AnswerEntry> {
        self.entries.get(&question)
    }

    #[must_use]
    pub fn selected(&self, question: QuestionId) -> Option<OptionId> {
        self.entries.get(&question).and_then(AnswerEntry::selected)
    }

    #[must_use]
    pub fn is_answered(&self, question: QuestionId) -> bool {
        self.selected(question).is_some()
    }

    /// Server-confirmed review flag; local intent never feeds this.
    #[must_use]
    pub fn is_marked_for_review(&self, question: QuestionId) -> bool {
        self.entries
            .get(&question)
            .is_some_and(AnswerEntry::marked_for_review)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.entries.values().filter(|e| e.selected.is_some()).count()
    }

    #[must_use]
    pub fn marked_count(&self) -> usize {
        self.entries.values().filter(|e| e.marked_for_review).count()
    }

    /// Questions whose last write failed and that no server answer has replaced yet.
    #[must_use]
    pub fn unsynced(&self) -> Vec<QuestionId> {
        let mut ids: Vec<QuestionId> = self
            .entries
            .iter()
            .filter(|(_, e)| e.sync == SyncState::Failed)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QuestionId, &AnswerEntry)> {
        self.entries.iter()
    }

    /// Record a selection locally, replacing any earlier one for the question.
    ///
    /// Returns the revision stamped on the entry; hand it back to
    /// [`confirm`](Self::confirm) or [`mark_failed`](Self::mark_failed).
    pub fn select(&mut self, question: QuestionId, option: OptionId, time_spent_seconds: u64) -> u64 {
        self.revision += 1;
        let revision = self.revision;
        let entry = self.entries.entry(question).or_insert(AnswerEntry {
            selected: None,
            time_spent_seconds: 0,
            marked_for_review: false,
            sync: SyncState::Pending,
            revision,
        });
        entry.selected = Some(option);
        entry.time_spent_seconds = time_spent_seconds;
        entry.sync = SyncState::Pending;
        entry.revision = revision;
        revision
    }

    /// Apply the server's echo of a write made at `revision`.
    ///
    /// Ignored when a newer local selection has been made since.
    pub fn confirm(&mut self, answer: &Answer, revision: u64) -> bool {
        match self.entries.get_mut(&answer.question_id) {
            Some(entry) if entry.revision > revision => false,
            Some(entry) => {
                *entry = AnswerEntry::from_server(answer, entry.revision);
                true
            }
            None => {
                self.entries
                    .insert(answer.question_id, AnswerEntry::from_server(answer, revision));
                true
            }
        }
    }

    /// Flag the write made at `revision` as failed, keeping the selection.
    pub fn mark_failed(&mut self, question: QuestionId, revision: u64) {
        if let Some(entry) = self.entries.get_mut(&question)
            && entry.revision == revision
        {
            entry.sync = SyncState::Failed;
        }
    }

    /// Store a review flag the server has acknowledged.
    pub fn set_review(&mut self, question: QuestionId, marked: bool) {
        self.revision += 1;
        let revision = self.revision;
        let entry = self.entries.entry(question).or_insert(AnswerEntry {
            selected: None,
            time_spent_seconds: 0,
            marked_for_review: false,
            sync: SyncState::Confirmed,
            revision,
        });
        entry.marked_for_review = marked;
        entry.revision = revision;
    }

    /// Stamp an answer-list request before it is sent.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.next_seq += 1;
        FetchTicket {
            seq: self.next_seq,
            revision: self.revision,
        }
    }

    /// Overwrite the local view with a fetched answer list.
    ///
    /// Responses older than the last applied one are discarded. Entries
    /// mutated locally after the ticket was issued are kept, since the fetch
    /// could not have seen them; everything else takes server truth,
    /// including removal of selections the server does not know about.
    pub fn reconcile(&mut self, ticket: FetchTicket, answers: &[Answer]) -> ReconcileOutcome {
        if self.applied_seq.is_some_and(|applied| applied >= ticket.seq) {
            return ReconcileOutcome::Stale;
        }
        self.applied_seq = Some(ticket.seq);

        let mut next: HashMap<QuestionId, AnswerEntry> = answers
            .iter()
            .map(|answer| {
                (
                    answer.question_id,
                    AnswerEntry::from_server(answer, ticket.revision),
                )
            })
            .collect();

        let mut kept_local = 0;
        for (question, entry) in &self.entries {
            if entry.revision > ticket.revision {
                next.insert(*question, entry.clone());
                kept_local += 1;
            }
        }

        self.entries = next;
        ReconcileOutcome::Applied { kept_local }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_answer(question: QuestionId, option: Option<OptionId>, marked: bool) -> Answer {
        Answer {
            is_marked_for_review: marked,
            ..Answer::unscored(question, option, 7)
        }
    }

    #[test]
    fn reselecting_replaces_the_previous_choice() {
        let mut cache = AnswerCache::new();
        let q = QuestionId::generate();
        let (b, a) = (OptionId::generate(), OptionId::generate());

        cache.select(q, b, 3);
        cache.select(q, a, 5);

        assert_eq!(cache.iter().count(), 1);
        assert_eq!(cache.selected(q), Some(a));
        assert_eq!(cache.entry(q).unwrap().time_spent_seconds(), 5);
    }

    #[test]
    fn failed_write_keeps_selection() {
        let mut cache = AnswerCache::new();
        let q = QuestionId::generate();
        let opt = OptionId::generate();

        let rev = cache.select(q, opt, 1);
        cache.mark_failed(q, rev);

        assert_eq!(cache.selected(q), Some(opt));
        assert_eq!(cache.entry(q).unwrap().sync(), SyncState::Failed);
        assert_eq!(cache.unsynced(), vec![q]);
    }

    #[test]
    fn confirm_for_superseded_write_is_ignored() {
        let mut cache = AnswerCache::new();
        let q = QuestionId::generate();
        let (first, second) = (OptionId::generate(), OptionId::generate());

        let rev1 = cache.select(q, first, 1);
        let _rev2 = cache.select(q, second, 2);

        assert!(!cache.confirm(&server_answer(q, Some(first), false), rev1));
        assert_eq!(cache.selected(q), Some(second));
    }

    #[test]
    fn server_truth_replaces_local_state() {
        let mut cache = AnswerCache::new();
        let q = QuestionId::generate();
        let (local, server) = (OptionId::generate(), OptionId::generate());

        let rev = cache.select(q, local, 1);
        cache.mark_failed(q, rev);

        let ticket = cache.begin_fetch();
        let outcome = cache.reconcile(ticket, &[server_answer(q, Some(server), true)]);

        assert_eq!(outcome, ReconcileOutcome::Applied { kept_local: 0 });
        assert_eq!(cache.selected(q), Some(server));
        assert!(cache.is_marked_for_review(q));
        assert!(cache.unsynced().is_empty());
    }

    #[test]
    fn stale_response_is_discarded() {
        let mut cache = AnswerCache::new();
        let q = QuestionId::generate();
        let (old, new) = (OptionId::generate(), OptionId::generate());

        let older = cache.begin_fetch();
        let newer = cache.begin_fetch();

        cache.reconcile(newer, &[server_answer(q, Some(new), false)]);
        let outcome = cache.reconcile(older, &[server_answer(q, Some(old), false)]);

        assert_eq!(outcome, ReconcileOutcome::Stale);
        assert_eq!(cache.selected(q), Some(new));
    }

    #[test]
    fn mutation_after_fetch_survives_reconcile() {
        let mut cache = AnswerCache::new();
        let q = QuestionId::generate();
        let opt = OptionId::generate();

        let ticket = cache.begin_fetch();
        cache.select(q, opt, 4);
        let outcome = cache.reconcile(ticket, &[]);

        assert_eq!(outcome, ReconcileOutcome::Applied { kept_local: 1 });
        assert_eq!(cache.selected(q), Some(opt));
    }

    #[test]
    fn unknown_selection_is_dropped_by_later_fetch() {
        let mut cache = AnswerCache::new();
        let q = QuestionId::generate();

        let rev = cache.select(q, OptionId::generate(), 1);
        cache.mark_failed(q, rev);
        let ticket = cache.begin_fetch();
        cache.reconcile(ticket, &[]);

        assert!(!cache.is_answered(q));
        assert_eq!(cache.answered_count(), 0);
    }

    #[test]
    fn review_flag_counts_separately_from_answers() {
        let mut cache = AnswerCache::new();
        let q = QuestionId::generate();
        cache.set_review(q, true);

        assert!(cache.is_marked_for_review(q));
        assert!(!cache.is_answered(q));
        assert_eq!(cache.marked_count(), 1);
        assert_eq!(cache.answered_count(), 0);
    }
}
