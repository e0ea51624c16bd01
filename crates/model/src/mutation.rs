//! Request bodies submitted by the mutation gateway.

use crate::{
    question::ParticipantTag,
    room::{RoomCode, RoomId},
};
use core::{fmt, str::FromStr};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskBody<'a> {
    pub question_text: &'a str,
    pub room_id: &'a RoomId,
    pub room_code: &'a RoomCode,
    pub student_tag: &'a ParticipantTag,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpvoteBody<'a> {
    pub student_tag: &'a ParticipantTag,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportBody<'a> {
    pub reason: ReportReason,
    pub student_tag: &'a ParticipantTag,
}

/// Data returned by a successful upvote.
#[derive(Debug, Deserialize)]
pub struct UpvoteReceipt {
    pub upvotes: u32,
}

/// The closed set of reasons a participant may report a question for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum ReportReason {
    Spam,
    Inappropriate,
    #[serde(rename = "Off-topic")]
    OffTopic,
}

impl ReportReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spam => "Spam",
            Self::Inappropriate => "Inappropriate",
            Self::OffTopic => "Off-topic",
        }
    }
}

impl fmt::Display for ReportReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name any [`ReportReason`].
#[derive(Debug, PartialEq, Eq)]
pub struct UnknownReason;

impl FromStr for ReportReason {
    type Err = UnknownReason;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        [Self::Spam, Self::Inappropriate, Self::OffTopic]
            .into_iter()
            .find(|reason| reason.as_str().eq_ignore_ascii_case(text))
            .ok_or(UnknownReason)
    }
}
