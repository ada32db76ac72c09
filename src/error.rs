//! Error type for message composition

use std::{
    error::Error as StdError,
    fmt::{self, Display, Formatter},
    io,
};

use crate::address::AddressError;

/// Error returned while building or inspecting a [`Message`](crate::Message)
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Neither `Sender` nor `From` is set
    MissingFrom,
    /// A header value is not a valid mailbox
    InvalidAddress {
        /// The offending header value
        value: String,
        /// Why it was rejected
        source: AddressError,
    },
    /// IO error
    Io(io::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingFrom => f.write_str("invalid message, \"From\" field is absent"),
            Error::InvalidAddress { value, source } => {
                write!(f, "invalid address {value:?}: {source}")
            }
            Error::Io(err) => Display::fmt(err, f),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::MissingFrom => None,
            Error::InvalidAddress { source, .. } => Some(source),
            Error::Io(err) => Some(err),
        }
    }
}
