use core::fmt::{self, Display};
use serde_json::error::Category;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The configured base URL or a derived endpoint is not a valid URI.
    InvalidUri,
    /// The request never produced a response.
    FailedFetch,
    /// The backend answered with a non-success status and no explanation.
    Status(u16),
    /// JSON syntax error detected.
    Syntax,
    /// Unexpected JSON data types encountered.
    Data,
    /// The backend refused the request and said why.
    Rejected(Box<str>),
    /// The response could not be normalized into the expected shape.
    Schema,
    /// The input was refused before anything was sent.
    BadInput,
    /// The room does not exist or may not be accessed.
    NotFound,
}

impl From<hyper::Error> for Error {
    fn from(_: hyper::Error) -> Self {
        Self::FailedFetch
    }
}

impl From<hyper_util::client::legacy::Error> for Error {
    fn from(_: hyper_util::client::legacy::Error) -> Self {
        Self::FailedFetch
    }
}

impl From<hyper::http::Error> for Error {
    fn from(_: hyper::http::Error) -> Self {
        Self::InvalidUri
    }
}

impl From<hyper::http::uri::InvalidUri> for Error {
    fn from(_: hyper::http::uri::InvalidUri) -> Self {
        Self::InvalidUri
    }
}

impl From<url::ParseError> for Error {
    fn from(_: url::ParseError) -> Self {
        Self::InvalidUri
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        match err.classify() {
            Category::Data => Self::Data,
            Category::Syntax | Category::Eof => Self::Syntax,
            Category::Io => Self::FailedFetch,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUri => f.write_str("Invalid server address."),
            Self::FailedFetch => f.write_str("Cannot reach server. Check your connection."),
            Self::Status(code) => write!(f, "Server error (HTTP {code})."),
            Self::Syntax => f.write_str("Syntax error in server response."),
            Self::Data => f.write_str("Unexpected data types in server response."),
            Self::Rejected(message) => f.write_str(message),
            Self::Schema => f.write_str("Server response is missing required fields."),
            Self::BadInput => f.write_str("Questions must be between 1 and 500 characters."),
            Self::NotFound => f.write_str("Room not found or access denied."),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;
