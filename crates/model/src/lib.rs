#![cfg_attr(not(test), no_std)]

extern crate alloc;

/// Declares an opaque string identifier. These are compared for equality and
/// never interpreted.
macro_rules! opaque {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Deserialize, serde::Serialize)]
        #[serde(transparent)]
        pub struct $name(alloc::boxed::Box<str>);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(text: &str) -> Self {
                Self(text.into())
            }
        }

        impl From<alloc::string::String> for $name {
            fn from(text: alloc::string::String) -> Self {
                Self(text.into_boxed_str())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

pub mod envelope;
pub mod event;
pub mod mutation;
pub mod question;
pub mod room;

pub use envelope::Envelope;
pub use question::{ParticipantTag, Question, QuestionId, QuestionRow, Status};
pub use room::{RoomCode, RoomContext, RoomId, RoomStatus, Visibility};
