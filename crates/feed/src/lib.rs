#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod filter;

use alloc::collections::{BTreeSet, VecDeque};
use model::{
    event::{QuestionRef, UpvoteUpdate},
    ParticipantTag, Question, QuestionId, QuestionRow, Status,
};

pub use filter::{Counts, Filter};

/// A single change delivered by the live stream.
#[derive(Clone, Debug)]
pub enum Change {
    Created(QuestionRow),
    UpvoteUpdated(UpvoteUpdate),
    Answered(QuestionRef),
    Removed(QuestionRef),
}

/// Outcome of merging a snapshot into the feed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Merge {
    /// Rows that were not yet known and got appended.
    pub inserted: usize,
    /// Rows that matched an entry already in the feed.
    pub enriched: usize,
    /// Entries the server no longer has.
    pub removed: usize,
}

/// Position in the feed's insertion history. Taken when a snapshot fetch is
/// issued so the merge can tell stale entries from ones that arrived later.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(u64);

struct Entry {
    /// Generation in which the entry was inserted.
    arrived: Generation,
    question: Question,
}

/// Canonical list of questions for one active room.
///
/// Iteration order is the display order: live arrivals at the front, session
/// history behind them. Every mutation is idempotent and tolerates unknown ids
/// because the stream may duplicate or drop events around a reconnect.
pub struct Feed {
    /// Local participant, for authorship.
    me: ParticipantTag,
    /// No two entries share an id.
    entries: VecDeque<Entry>,
    /// Bumped on every insertion.
    generation: Generation,
}

impl Feed {
    pub fn new(me: ParticipantTag) -> Self {
        Self { me, entries: VecDeque::new(), generation: Generation::default() }
    }

    /// Present canonical order.
    pub fn current_set(&self) -> impl ExactSizeIterator<Item = &Question> + '_ {
        self.entries.iter().map(|entry| &entry.question)
    }

    pub fn get(&self, id: &QuestionId) -> Option<&Question> {
        self.current_set().find(|q| q.id == *id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Everything inserted so far is at or below the returned generation.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    fn position(&self, id: &QuestionId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.question.id == *id)
    }

    fn find_mut(&mut self, id: &QuestionId) -> Option<&mut Question> {
        self.entries.iter_mut().map(|entry| &mut entry.question).find(|q| q.id == *id)
    }

    fn next_generation(&mut self) -> Generation {
        self.generation.0 += 1;
        self.generation
    }

    /// Merges a snapshot of the room's history into the feed. `since` is the
    /// [`Feed::generation`] observed when the fetch was issued.
    ///
    /// Entries the stream delivered after `since` keep their place at the
    /// front and only absorb what the snapshot knows more about. Entries that
    /// were already present at `since` but are missing from the rows were
    /// removed on the server while the feed was not listening, so they go.
    /// Rows not yet present are appended in snapshot order.
    pub fn load_snapshot<I>(&mut self, rows: I, since: Generation) -> Merge
    where
        I: IntoIterator<Item = QuestionRow>,
    {
        let mut merge = Merge::default();
        let mut listed = BTreeSet::new();
        for row in rows {
            let incoming = row.into_question(&self.me);
            listed.insert(incoming.id.clone());
            match self.position(&incoming.id) {
                Some(index) => {
                    enrich(&mut self.entries[index].question, incoming);
                    merge.enriched += 1;
                }
                None => {
                    let arrived = self.next_generation();
                    self.entries.push_back(Entry { arrived, question: incoming });
                    merge.inserted += 1;
                }
            }
        }

        let before = self.entries.len();
        self.entries.retain(|entry| entry.arrived > since || listed.contains(&entry.question.id));
        merge.removed = before - self.entries.len();

        log::debug!(
            "snapshot merged: {} inserted, {} enriched, {} removed",
            merge.inserted,
            merge.enriched,
            merge.removed,
        );
        merge
    }

    /// Inserts a newly asked question at the front. Returns `false` if the id
    /// is already present, which happens on redelivery after a rejoin and for
    /// the asker's own question.
    pub fn apply_created(&mut self, row: QuestionRow) -> bool {
        if self.position(&row.id).is_some() {
            log::debug!("duplicate question {} ignored", row.id);
            return false;
        }
        log::trace!("question {} created", row.id);
        let question = row.into_question(&self.me);
        let arrived = self.next_generation();
        self.entries.push_front(Entry { arrived, question });
        true
    }

    /// Overwrites the upvote count. The count is authoritative, never added to.
    pub fn apply_upvote_updated(&mut self, id: &QuestionId, upvotes: u32) -> bool {
        let Some(question) = self.find_mut(id) else {
            log::debug!("upvote update for unknown question {id} dropped");
            return false;
        };
        if question.upvotes == upvotes {
            return false;
        }
        log::trace!("question {id} now has {upvotes} upvotes");
        question.upvotes = upvotes;
        true
    }

    /// Marks a question as answered. Answered questions never go back to pending.
    pub fn apply_answered(&mut self, id: &QuestionId) -> bool {
        let Some(question) = self.find_mut(id) else {
            log::debug!("answer for unknown question {id} dropped");
            return false;
        };
        if question.status == Status::Answered {
            return false;
        }
        log::trace!("question {id} answered");
        question.status = Status::Answered;
        true
    }

    pub fn apply_removed(&mut self, id: &QuestionId) -> bool {
        let Some(index) = self.position(id) else {
            log::debug!("removal of unknown question {id} dropped");
            return false;
        };
        log::trace!("question {id} removed");
        self.entries.remove(index);
        true
    }

    /// Applies any stream change. Returns whether the canonical set changed.
    pub fn apply(&mut self, change: Change) -> bool {
        match change {
            Change::Created(row) => self.apply_created(row),
            Change::UpvoteUpdated(UpvoteUpdate { question_id, upvotes }) => {
                self.apply_upvote_updated(&question_id, upvotes)
            }
            Change::Answered(QuestionRef { question_id }) => self.apply_answered(&question_id),
            Change::Removed(QuestionRef { question_id }) => self.apply_removed(&question_id),
        }
    }
}

/// Folds a snapshot row into an entry the stream already delivered. Text and
/// authorship are immutable, so only the mutable fields are reconciled, each
/// in the direction it can legally move.
fn enrich(local: &mut Question, snapshot: Question) {
    local.upvotes = local.upvotes.max(snapshot.upvotes);
    if snapshot.status == Status::Answered {
        local.status = Status::Answered;
    }
    local.reported |= snapshot.reported;
    if local.answer.is_none() {
        local.answer = snapshot.answer;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    const ME: &str = "Student#1111";

    fn row(id: &str, author: &str) -> QuestionRow {
        QuestionRow {
            id: QuestionId::from(id),
            text: format!("question {id}").into_boxed_str(),
            upvotes: 0,
            status: Status::Pending,
            author: author.into(),
            reported: false,
            answer: None,
        }
    }

    fn feed() -> Feed {
        Feed::new(ParticipantTag::from(ME))
    }

    fn ids(feed: &Feed) -> Vec<&str> {
        feed.current_set().map(|q| q.id.as_str()).collect()
    }

    #[test]
    fn duplicate_create_is_ignored() {
        let mut feed = feed();
        assert!(feed.apply_created(row("x", "Student#2")));
        assert!(!feed.apply_created(row("x", "Student#2")));
        assert_eq!(ids(&feed), ["x"]);
    }

    #[test]
    fn creates_are_prepended() {
        let mut feed = feed();
        feed.apply_created(row("a", ME));
        feed.apply_created(row("b", "Student#2"));
        assert_eq!(ids(&feed), ["b", "a"]);
        assert!(feed.get(&QuestionId::from("a")).unwrap().mine);
        assert!(!feed.get(&QuestionId::from("b")).unwrap().mine);
    }

    #[test]
    fn upvotes_overwrite_instead_of_adding() {
        let mut feed = feed();
        feed.apply_created(row("x", ME));
        let id = QuestionId::from("x");
        assert!(feed.apply_upvote_updated(&id, 3));
        assert!(feed.apply_upvote_updated(&id, 1));
        assert_eq!(feed.get(&id).unwrap().upvotes, 1);
    }

    #[test]
    fn upvote_for_unknown_question_is_dropped() {
        let mut feed = feed();
        feed.apply_created(row("x", ME));
        assert!(!feed.apply_upvote_updated(&QuestionId::from("ghost"), 9));
        assert_eq!(feed.get(&QuestionId::from("x")).unwrap().upvotes, 0);
        assert_eq!(feed.len(), 1);
    }

    #[test]
    fn answered_is_terminal_and_idempotent() {
        let mut feed = feed();
        feed.apply_created(row("x", ME));
        let id = QuestionId::from("x");
        assert!(feed.apply_answered(&id));
        assert!(!feed.apply_answered(&id));
        assert_eq!(feed.get(&id).unwrap().status, Status::Answered);
    }

    #[test]
    fn answered_for_unknown_question_leaves_set_unchanged() {
        let mut feed = feed();
        feed.load_snapshot([row("a", ME), row("b", "Student#2")], Generation::default());
        let before: Vec<_> = feed.current_set().cloned().collect();
        assert!(!feed.apply_answered(&QuestionId::from("ghost")));
        let after: Vec<_> = feed.current_set().cloned().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn removal_deletes_exactly_one_entry() {
        let mut feed = feed();
        feed.load_snapshot([row("a", ME), row("b", "Student#2"), row("c", "Student#3")], Generation::default());
        assert!(!feed.apply_removed(&QuestionId::from("ghost")));
        assert_eq!(feed.len(), 3);

        let before: BTreeSet<_> = feed.current_set().cloned().map(|q| q.id).collect();
        assert!(feed.apply_removed(&QuestionId::from("b")));
        let after: BTreeSet<_> = feed.current_set().cloned().map(|q| q.id).collect();
        let gone: Vec<_> = before.difference(&after).collect();
        assert_eq!(gone, [&QuestionId::from("b")]);
        assert_eq!(ids(&feed), ["a", "c"]);
    }

    #[test]
    fn snapshot_on_empty_feed_keeps_snapshot_order() {
        let mut feed = feed();
        let merge = feed.load_snapshot([row("a", ME), row("b", "Student#2"), row("c", ME)], Generation::default());
        assert_eq!(merge, Merge { inserted: 3, enriched: 0, removed: 0 });
        assert_eq!(ids(&feed), ["a", "b", "c"]);
        let mine: Vec<_> = feed.current_set().map(|q| q.mine).collect();
        assert_eq!(mine, [true, false, true]);
    }

    #[test]
    fn late_snapshot_keeps_live_entries_in_front() {
        let mut feed = feed();
        feed.apply_created(row("x", "Student#2"));
        feed.load_snapshot([row("a", ME), row("b", "Student#3")], Generation::default());
        assert_eq!(ids(&feed), ["x", "a", "b"]);
        assert_eq!(feed.current_set().filter(|q| q.id.as_str() == "x").count(), 1);
    }

    #[test]
    fn late_snapshot_enriches_instead_of_duplicating() {
        let mut feed = feed();
        feed.apply_created(row("x", "Student#2"));
        feed.apply_upvote_updated(&QuestionId::from("x"), 5);

        let mut stale = row("x", "Student#2");
        stale.upvotes = 2;
        stale.status = Status::Answered;
        stale.reported = true;
        stale.answer = Some("Yes.".into());

        let merge = feed.load_snapshot([row("a", ME), stale], Generation::default());
        assert_eq!(merge, Merge { inserted: 1, enriched: 1, removed: 0 });
        assert_eq!(ids(&feed), ["x", "a"]);

        let x = feed.get(&QuestionId::from("x")).unwrap();
        assert_eq!(x.upvotes, 5);
        assert_eq!(x.status, Status::Answered);
        assert!(x.reported);
        assert_eq!(x.answer.as_deref(), Some("Yes."));
    }

    #[test]
    fn snapshot_never_reverts_answered() {
        let mut feed = feed();
        feed.apply_created(row("x", ME));
        feed.apply_answered(&QuestionId::from("x"));
        feed.load_snapshot([row("x", ME)], Generation::default());
        assert_eq!(feed.get(&QuestionId::from("x")).unwrap().status, Status::Answered);
    }

    #[test]
    fn snapshot_with_repeated_row_keeps_ids_unique() {
        let mut feed = feed();
        let merge = feed.load_snapshot([row("a", ME), row("a", ME)], Generation::default());
        assert_eq!(merge, Merge { inserted: 1, enriched: 1, removed: 0 });
        assert_eq!(ids(&feed), ["a"]);
    }

    #[test]
    fn refresh_drops_questions_removed_while_disconnected() {
        let mut feed = feed();
        feed.load_snapshot([row("a", ME), row("b", "Student#2")], Generation::default());

        // The removal of `b` was lost; the refresh no longer lists it.
        let since = feed.generation();
        let merge = feed.load_snapshot([row("a", ME)], since);
        assert_eq!(merge, Merge { inserted: 0, enriched: 1, removed: 1 });
        assert_eq!(ids(&feed), ["a"]);
    }

    #[test]
    fn refresh_keeps_questions_created_after_it_was_issued() {
        let mut feed = feed();
        feed.load_snapshot([row("a", ME), row("b", "Student#2")], Generation::default());

        let since = feed.generation();
        feed.apply_created(row("x", "Student#3"));
        let merge = feed.load_snapshot([row("b", "Student#2")], since);
        assert_eq!(merge, Merge { inserted: 0, enriched: 1, removed: 1 });
        assert_eq!(ids(&feed), ["x", "b"]);
    }

    #[test]
    fn generation_only_moves_on_insertion() {
        let mut feed = feed();
        let start = feed.generation();
        feed.apply_created(row("x", ME));
        let created = feed.generation();
        assert!(created > start);

        feed.apply_created(row("x", ME));
        feed.apply_upvote_updated(&QuestionId::from("x"), 4);
        feed.apply_removed(&QuestionId::from("x"));
        assert_eq!(feed.generation(), created);
    }

    #[test]
    fn replayed_stream_converges() {
        let created: QuestionRow = serde_json::from_str(
            r#"{"_id":"q1","questionText":"When is the deadline?","studentTag":"Student#7","upvotes":0}"#,
        )
        .unwrap();
        let upvote: UpvoteUpdate = serde_json::from_str(r#"{"questionId":"q1","upvotes":2}"#).unwrap();
        let answered: QuestionRef = serde_json::from_str(r#"{"questionId":"q1"}"#).unwrap();
        let changes = [
            Change::Created(created),
            Change::UpvoteUpdated(upvote),
            Change::Answered(answered),
        ];

        let mut once = feed();
        for change in changes.iter().cloned() {
            once.apply(change);
        }
        let mut twice = feed();
        for change in changes.iter().cloned().chain(changes.iter().cloned()) {
            twice.apply(change);
        }

        let once: Vec<_> = once.current_set().cloned().collect();
        let twice: Vec<_> = twice.current_set().cloned().collect();
        assert_eq!(once, twice);
        assert_eq!(once[0].upvotes, 2);
        assert_eq!(once[0].status, Status::Answered);
    }
}
