//! Error type for the resolver.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use crate::base::message::{ProtocolError, ReplyError};
use crate::base::name::NameError;
use std::error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Error type for the resolver.
///
/// The first group of variants is returned right away by
/// [`Resolver::resolve`][super::Resolver::resolve] if a request can’t be
/// accepted. The second group is delivered later through a request’s
/// completion callback.
#[derive(Clone, Debug)]
pub enum Error {
    /// The host name is longer than 253 octets.
    NameTooLong,

    /// The host name has an empty or overlong label.
    InvalidName,

    /// A request with the same handle is already outstanding.
    AlreadyInProgress,

    /// All transaction IDs are in use.
    ResourceExhausted,

    /// The reply was malformed or did not match the query.
    Protocol(ProtocolError),

    /// The host does not exist or has no address.
    NoSuchHost,

    /// No reply arrived before the request’s deadline.
    Timeout,

    /// The socket failed or the request could not be sent.
    ///
    /// If the problem was reported by the operating system, the I/O error
    /// is included.
    Transport(Option<Arc<std::io::Error>>),
}

impl From<NameError> for Error {
    fn from(err: NameError) -> Self {
        match err {
            NameError::TooLong => Error::NameTooLong,
            NameError::EmptyLabel | NameError::LongLabel => {
                Error::InvalidName
            }
        }
    }
}

impl From<ReplyError> for Error {
    fn from(err: ReplyError) -> Self {
        match err {
            ReplyError::NoSuchHost => Error::NoSuchHost,
            ReplyError::Protocol(err) => Error::Protocol(err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Transport(Some(Arc::new(err)))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Error::NameTooLong => write!(f, "host name too long"),
            Error::InvalidName => write!(f, "invalid host name"),
            Error::AlreadyInProgress => {
                write!(f, "request for handle already in progress")
            }
            Error::ResourceExhausted => {
                write!(f, "too many outstanding requests")
            }
            Error::Protocol(err) => write!(f, "protocol error: {}", err),
            Error::NoSuchHost => write!(f, "no such host"),
            Error::Timeout => write!(f, "timeout waiting for response"),
            Error::Transport(Some(err)) => {
                write!(f, "transport error: {}", err)
            }
            Error::Transport(None) => write!(f, "transport error"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::NameTooLong => None,
            Error::InvalidName => None,
            Error::AlreadyInProgress => None,
            Error::ResourceExhausted => None,
            Error::Protocol(e) => Some(e),
            Error::NoSuchHost => None,
            Error::Timeout => None,
            Error::Transport(Some(e)) => Some(e.as_ref()),
            Error::Transport(None) => None,
        }
    }
}
