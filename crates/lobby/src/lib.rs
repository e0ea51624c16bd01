pub mod error;
pub mod session;
pub mod subscriber;
pub mod transport;

use core::future::Future;
use model::{mutation::ReportReason, ParticipantTag, QuestionId, QuestionRow, RoomCode, RoomId};

pub use session::{Session, Snapshot};
pub use subscriber::{subscribe, Subscription};
pub use transport::{EventName, Hub, Transport};

/// The request-layer calls a [`Session`] needs. Implemented by [`api::Client`].
pub trait Backend: Send + Sync + 'static {
    fn get_questions(
        &self,
        room: &RoomId,
        me: &ParticipantTag,
    ) -> impl Future<Output = api::error::Result<Vec<QuestionRow>>> + Send;

    fn ask_question(
        &self,
        text: &str,
        room: &RoomId,
        code: &RoomCode,
        me: &ParticipantTag,
    ) -> impl Future<Output = api::error::Result<()>> + Send;

    fn upvote_question(&self, id: &QuestionId, me: &ParticipantTag) -> impl Future<Output = api::error::Result<u32>> + Send;

    fn report_question(
        &self,
        id: &QuestionId,
        reason: ReportReason,
        me: &ParticipantTag,
    ) -> impl Future<Output = api::error::Result<()>> + Send;
}

impl Backend for api::Client {
    fn get_questions(
        &self,
        room: &RoomId,
        me: &ParticipantTag,
    ) -> impl Future<Output = api::error::Result<Vec<QuestionRow>>> + Send {
        api::Client::get_questions(self, room, me)
    }

    fn ask_question(
        &self,
        text: &str,
        room: &RoomId,
        code: &RoomCode,
        me: &ParticipantTag,
    ) -> impl Future<Output = api::error::Result<()>> + Send {
        api::Client::ask_question(self, text, room, code, me)
    }

    fn upvote_question(&self, id: &QuestionId, me: &ParticipantTag) -> impl Future<Output = api::error::Result<u32>> + Send {
        api::Client::upvote_question(self, id, me)
    }

    fn report_question(
        &self,
        id: &QuestionId,
        reason: ReportReason,
        me: &ParticipantTag,
    ) -> impl Future<Output = api::error::Result<()>> + Send {
        api::Client::report_question(self, id, reason, me)
    }
}
