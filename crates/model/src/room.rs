use alloc::boxed::Box;
use core::fmt::{self, Formatter};
use serde::{
    de::{IgnoredAny, MapAccess, Visitor},
    Deserialize, Deserializer,
};

opaque! {
    /// Backend identifier of a room.
    RoomId
}

opaque! {
    /// Short human-shareable join code. Distinct from the [`RoomId`].
    RoomCode
}

/// Whether participants can see questions they did not ask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Visibility {
    /// Everyone sees every question.
    Public,
    /// Each participant only sees their own questions.
    #[default]
    Private,
}

/// Room lifecycle as reported by the backend. Consumed, never changed, by the feed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RoomStatus {
    Active,
    Closed,
    #[default]
    Unknown,
}

impl RoomStatus {
    fn from_wire(text: &str) -> Self {
        match text {
            "active" | "open" => Self::Active,
            "closed" | "ended" => Self::Closed,
            _ => Self::Unknown,
        }
    }
}

/// The one canonical room shape. The join-by-code and get-by-id endpoints do
/// not agree on how they name the room identifier, so both spellings are
/// accepted here and nowhere else.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomContext {
    pub id: RoomId,
    pub code: RoomCode,
    pub name: Box<str>,
    pub lecturer: Option<Box<str>>,
    pub visibility: Visibility,
    pub status: RoomStatus,
}

struct RoomVisitor;

impl<'de> Visitor<'de> for RoomVisitor {
    type Value = RoomContext;

    fn expecting(&self, formatter: &mut Formatter) -> fmt::Result {
        formatter.write_str("a room object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        use serde::de::Error;

        // `roomId` takes precedence over the raw document `_id`.
        let mut room_id = None::<RoomId>;
        let mut doc_id = None::<RoomId>;
        let mut code = None::<RoomCode>;
        let mut name = None::<Box<str>>;
        let mut lecturer = None::<Box<str>>;
        let mut visible = None::<bool>;
        let mut status = None::<RoomStatus>;

        while let Some(key) = map.next_key::<&str>()? {
            match key {
                "roomId" if room_id.is_some() => return Err(A::Error::duplicate_field("roomId")),
                "_id" if doc_id.is_some() => return Err(A::Error::duplicate_field("_id")),
                "roomCode" if code.is_some() => return Err(A::Error::duplicate_field("roomCode")),
                "roomName" if name.is_some() => return Err(A::Error::duplicate_field("roomName")),
                "questionsVisible" if visible.is_some() => return Err(A::Error::duplicate_field("questionsVisible")),
                "roomId" => room_id = map.next_value()?,
                "_id" => doc_id = map.next_value()?,
                "roomCode" => code = Some(map.next_value()?),
                "roomName" => name = Some(map.next_value()?),
                "lecturerName" => lecturer = map.next_value()?,
                "questionsVisible" => visible = map.next_value()?,
                "status" => status = map.next_value::<Option<&str>>()?.map(RoomStatus::from_wire),
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        let visibility = if visible.unwrap_or(false) { Visibility::Public } else { Visibility::Private };
        Ok(Self::Value {
            id: room_id.or(doc_id).ok_or_else(|| A::Error::missing_field("roomId"))?,
            code: code.ok_or_else(|| A::Error::missing_field("roomCode"))?,
            name: name.ok_or_else(|| A::Error::missing_field("roomName"))?,
            lecturer,
            visibility,
            status: status.unwrap_or_default(),
        })
    }
}

impl<'de> Deserialize<'de> for RoomContext {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(RoomVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_response_uses_room_id() {
        let room: RoomContext = serde_json::from_str(
            r#"{"roomId":"r1","roomCode":"XK42QZ","roomName":"CS 101","lecturerName":"Dr. Rao","questionsVisible":true,"status":"active"}"#,
        )
        .unwrap();
        assert_eq!(room.id.as_str(), "r1");
        assert_eq!(room.code.as_str(), "XK42QZ");
        assert_eq!(room.lecturer.as_deref(), Some("Dr. Rao"));
        assert_eq!(room.visibility, Visibility::Public);
        assert_eq!(room.status, RoomStatus::Active);
    }

    #[test]
    fn details_response_falls_back_to_document_id() {
        let room: RoomContext = serde_json::from_str(
            r#"{"_id":"65f1aa00","roomCode":"XK42QZ","roomName":"CS 101","questionsVisible":false,"status":"closed","lecturerId":"u9","createdAt":"2024-01-01"}"#,
        )
        .unwrap();
        assert_eq!(room.id.as_str(), "65f1aa00");
        assert_eq!(room.visibility, Visibility::Private);
        assert_eq!(room.status, RoomStatus::Closed);
        assert!(room.lecturer.is_none());
    }

    #[test]
    fn room_id_wins_over_document_id() {
        let room: RoomContext =
            serde_json::from_str(r#"{"_id":"doc","roomId":"room","roomCode":"C","roomName":"N"}"#).unwrap();
        assert_eq!(room.id.as_str(), "room");
        assert_eq!(room.status, RoomStatus::Unknown);
    }

    #[test]
    fn rejects_room_without_any_id() {
        assert!(serde_json::from_str::<RoomContext>(r#"{"roomCode":"C","roomName":"N"}"#).is_err());
    }
}
