use crate::question::QuestionId;
use serde::{Deserialize, Serialize};

/// Payload of `question-upvote-update`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpvoteUpdate {
    pub question_id: QuestionId,
    pub upvotes: u32,
}

/// Payload of `question-marked-answered` and `question-removed`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRef {
    pub question_id: QuestionId,
}
