use core::fmt::{self, Display};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The request layer failed or the backend refused the submission.
    Api(api::error::Error),
    /// The session has already been closed.
    Closed,
}

impl From<api::error::Error> for Error {
    fn from(err: api::error::Error) -> Self {
        Self::Api(err)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api(err) => err.fmt(f),
            Self::Closed => f.write_str("You have already left this room."),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;
