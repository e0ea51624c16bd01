pub mod error;
pub mod sse;
pub mod validate;

use error::{Error, Result};
use http_body_util::{BodyExt, Full};
use hyper::{
    body::{Bytes, Incoming},
    header::{HeaderValue, ACCEPT, CONTENT_TYPE},
    Method, Request, Uri,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client as HttpClient},
    rt::TokioExecutor,
};
use model::{
    mutation::{AskBody, ReportBody, ReportReason, UpvoteBody, UpvoteReceipt},
    Envelope, ParticipantTag, QuestionId, QuestionRow, RoomCode, RoomContext, RoomId,
};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::VecDeque;
use url::Url;

pub const APPLICATION_JSON: &str = "application/json";
pub const TEXT_EVENT_STREAM: &str = "text/event-stream";

/// Request layer for one backend. Cheap to clone.
#[derive(Clone)]
pub struct Client {
    http: HttpClient<HttpConnector, Full<Bytes>>,
    /// Always ends with a slash so endpoints append rather than replace.
    base: Url,
}

impl Client {
    pub fn new(base: &str) -> Result<Self> {
        let mut base = Url::parse(base)?;
        if base.cannot_be_a_base() {
            return Err(Error::InvalidUri);
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = HttpClient::builder(TokioExecutor::new()).build_http();
        Ok(Self { http, base })
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint<'s, I>(&self, segments: I) -> Result<Url>
    where
        I: IntoIterator<Item = &'s str>,
    {
        let mut url = self.base.clone();
        url.path_segments_mut().map_err(|_| Error::InvalidUri)?.pop_if_empty().extend(segments);
        Ok(url)
    }

    async fn call<T, B>(&self, method: Method, url: Url, body: Option<&B>) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let uri: Uri = url.as_str().parse()?;
        let mut builder = Request::builder().method(method).uri(uri).header(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));
        let payload = match body {
            Some(body) => {
                builder = builder.header(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
                Bytes::from(serde_json::to_vec(body)?)
            }
            None => Bytes::new(),
        };
        let request = builder.body(Full::new(payload))?;

        let response = self.http.request(request).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        log::debug!("{url} answered {status} with {} bytes", bytes.len());

        // Failures usually still come wrapped in an envelope with a message.
        let envelope = match serde_json::from_slice::<Envelope<T>>(&bytes) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => return Err(Error::Status(status.as_u16())),
            Err(err) => return Err(err.into()),
        };

        match envelope.into_result() {
            Ok(data) if status.is_success() => Ok(data),
            Ok(_) | Err(None) => Err(Error::Status(status.as_u16())),
            Err(Some(message)) => Err(Error::Rejected(message)),
        }
    }

    async fn get<T>(&self, url: Url) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.call::<T, ()>(Method::GET, url, None).await
    }

    async fn post<T, B>(&self, url: Url, body: &B) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        self.call(Method::POST, url, Some(body)).await
    }

    /// Fetches the room's existing questions. The participant tag lets the
    /// backend apply private-room filtering.
    pub async fn get_questions(&self, room: &RoomId, me: &ParticipantTag) -> Result<Vec<QuestionRow>> {
        let mut url = self.endpoint(["questions", "room", room.as_str()])?;
        url.query_pairs_mut().append_pair("studentTag", me.as_str());
        Ok(self.get(url).await?.unwrap_or_default())
    }

    /// Submits a new question. The feed learns about it through the stream.
    pub async fn ask_question(&self, text: &str, room: &RoomId, code: &RoomCode, me: &ParticipantTag) -> Result<()> {
        let text = validate::question_text(text).ok_or(Error::BadInput)?;
        let url = self.endpoint(["questions"])?;
        let body = AskBody { question_text: text, room_id: room, room_code: code, student_tag: me };
        self.post::<serde::de::IgnoredAny, _>(url, &body).await?;
        Ok(())
    }

    /// Upvotes a question and returns the count the backend now reports.
    pub async fn upvote_question(&self, id: &QuestionId, me: &ParticipantTag) -> Result<u32> {
        let url = self.endpoint(["questions", id.as_str(), "upvote"])?;
        let UpvoteReceipt { upvotes } = self.post(url, &UpvoteBody { student_tag: me }).await?.ok_or(Error::Schema)?;
        Ok(upvotes)
    }

    pub async fn report_question(&self, id: &QuestionId, reason: ReportReason, me: &ParticipantTag) -> Result<()> {
        let url = self.endpoint(["questions", id.as_str(), "report"])?;
        self.post::<serde::de::IgnoredAny, _>(url, &ReportBody { reason, student_tag: me }).await?;
        Ok(())
    }

    pub async fn join_room(&self, code: &RoomCode) -> Result<RoomContext> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct JoinBody<'a> {
            room_code: &'a RoomCode,
        }

        let url = self.endpoint(["rooms", "join"])?;
        self.post(url, &JoinBody { room_code: code }).await.map_err(resolution_error)?.ok_or(Error::Schema)
    }

    pub async fn get_room(&self, id: &RoomId) -> Result<RoomContext> {
        let url = self.endpoint(["rooms", id.as_str()])?;
        self.get(url).await.map_err(resolution_error)?.ok_or(Error::Schema)
    }

    /// Resolves a room from whatever the participant has at hand: a short
    /// join code or a full room id.
    pub async fn resolve_room(&self, id_or_code: &str) -> Result<RoomContext> {
        let id_or_code = id_or_code.trim();
        if validate::is_room_code(id_or_code) {
            self.join_room(&RoomCode::from(id_or_code)).await
        } else {
            self.get_room(&RoomId::from(id_or_code)).await
        }
    }

    /// Opens the room's event stream.
    pub async fn events(&self, code: &RoomCode) -> Result<EventStream> {
        let url = self.endpoint(["rooms", code.as_str(), "events"])?;
        let uri: Uri = url.as_str().parse()?;
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(ACCEPT, HeaderValue::from_static(TEXT_EVENT_STREAM))
            .body(Full::new(Bytes::new()))?;

        let response = self.http.request(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status(status.as_u16()));
        }

        Ok(EventStream { body: response.into_body(), parser: sse::Parser::default(), ready: VecDeque::new() })
    }
}

/// Resolution failures end the room view, so they collapse into fewer cases.
fn resolution_error(err: Error) -> Error {
    match err {
        Error::Status(401 | 403 | 404) => Error::NotFound,
        Error::Data | Error::Syntax => Error::Schema,
        other => other,
    }
}

/// An open `text/event-stream` response.
pub struct EventStream {
    body: Incoming,
    parser: sse::Parser,
    ready: VecDeque<sse::Message>,
}

impl EventStream {
    /// Waits for the next complete message. `Ok(None)` means the server
    /// closed the stream.
    pub async fn next(&mut self) -> Result<Option<sse::Message>> {
        loop {
            if let Some(message) = self.ready.pop_front() {
                return Ok(Some(message));
            }
            let Some(frame) = self.body.frame().await else {
                return Ok(None);
            };
            if let Ok(data) = frame?.into_data() {
                self.parser.feed(&data, &mut self.ready);
            }
        }
    }
}
