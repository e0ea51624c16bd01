use alloc::boxed::Box;
use serde::{Deserialize, Deserializer, Serialize};

/// Longest question text accepted by the backend, in characters.
pub const MAX_QUESTION_LENGTH: usize = 500;

opaque! {
    /// Backend identifier of a question. Stable across the snapshot and the stream.
    QuestionId
}

opaque! {
    /// Anonymous per-device identifier of a participant. Only ever compared
    /// against the author tag of a question to decide authorship.
    ParticipantTag
}

/// Lifecycle of a question. The only transition is `Pending` to `Answered`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Pending,
    Answered,
}

/// A question as held in the canonical feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Question {
    pub id: QuestionId,
    /// Immutable after creation.
    pub text: Box<str>,
    /// Raw author tag as sent by the backend.
    pub author: Box<str>,
    /// Authoritative count. Updates overwrite rather than increment.
    pub upvotes: u32,
    pub status: Status,
    /// Informational only. Reported questions are still shown.
    pub reported: bool,
    /// Only present once the question has been answered.
    pub answer: Option<Box<str>>,
    /// Whether the local participant asked this question.
    pub mine: bool,
}

/// Wire representation shared by the snapshot rows and the `new-question` event.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct QuestionRow {
    #[serde(rename = "_id", alias = "id")]
    pub id: QuestionId,
    #[serde(rename = "questionText")]
    pub text: Box<str>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub upvotes: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: Status,
    #[serde(rename = "studentTag")]
    pub author: Box<str>,
    #[serde(rename = "isReported", default, deserialize_with = "null_as_default")]
    pub reported: bool,
    #[serde(default)]
    pub answer: Option<Box<str>>,
}

/// Reads an explicit `null` the same way as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl QuestionRow {
    /// Converts the wire row into a feed entry, deriving authorship against `me`.
    pub fn into_question(self, me: &ParticipantTag) -> Question {
        let Self { id, text, upvotes, status, author, reported, answer } = self;
        let mine = author.as_ref() == me.as_str();
        Question { id, text, author, upvotes, status, reported, answer, mine }
    }
}
