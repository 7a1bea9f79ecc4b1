//! Error and Result types.

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display};
use std::io;

/// A specialized `Result` type used throughout `dbc`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A generic error that represents all the ways an operation against a
/// pooled connection can fail.
///
/// Every fallible operation in this crate returns `Result<T, Error>` rather
/// than panicking or offering a second, panic-based "throwing" surface:
/// `Result` already *is* the non-throwing form the original design
/// distinguishes between.
#[derive(Debug)]
pub enum Error {
    /// The connection URI could not be parsed, or was missing a component
    /// a backend requires (malformed port/db index, unsupported scheme).
    InvalidUri(Box<str>),

    /// No registered driver claims the URI's scheme.
    DriverUnavailable(Box<str>),

    /// Error communicating with the backend over the wire.
    Transport(io::Error),

    /// The backend rejected the supplied credentials.
    Auth(Box<str>),

    /// The backend returned an error reply for a command.
    Command(Box<str>),

    /// [Pool::acquire] was called after [Pool::close].
    PoolClosed,

    /// [Pool::acquire] did not obtain a connection within `max_wait`.
    Timeout,

    /// A connection failed its validation check and could not be replaced.
    ValidationFailed(Box<str>),

    /// An operation was attempted on a connection in the wrong state (e.g.
    /// using a connection after it has been returned to the pool).
    InvalidState(Box<str>),

    /// A value could not be converted to or from the type requested.
    TypeMismatch(Box<str>),

    /// Catch-all for conditions that do not fit another kind.
    Unknown(Box<str>),
}

impl Error {
    /// The stable, `&'static str` discriminant for this error, independent
    /// of any formatted message. Tests and callers should match on this
    /// rather than `Display` output.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidUri(_) => "invalid_uri",
            Error::DriverUnavailable(_) => "driver_unavailable",
            Error::Transport(_) => "transport",
            Error::Auth(_) => "auth",
            Error::Command(_) => "command",
            Error::PoolClosed => "pool_closed",
            Error::Timeout => "timeout",
            Error::ValidationFailed(_) => "validation_failed",
            Error::InvalidState(_) => "invalid_state",
            Error::TypeMismatch(_) => "type_mismatch",
            Error::Unknown(_) => "unknown",
        }
    }

    pub fn invalid_uri(msg: impl Into<String>) -> Self {
        Error::InvalidUri(msg.into().into_boxed_str())
    }

    pub(crate) fn driver_unavailable(scheme: &str) -> Self {
        Error::DriverUnavailable(format!("no driver registered for scheme {scheme:?}").into())
    }

    /// Constructs a [`Error::Command`], for use by backend implementations
    /// (in this crate or downstream) reporting a rejected command.
    pub fn command(msg: impl Into<String>) -> Self {
        Error::Command(msg.into().into_boxed_str())
    }

    /// Constructs a [`Error::InvalidState`], for use by backend
    /// implementations reporting an operation attempted in the wrong state.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into().into_boxed_str())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Transport(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidUri(msg) => write!(f, "invalid connection uri: {msg}"),
            Error::DriverUnavailable(msg) => write!(f, "{msg}"),
            Error::Transport(err) => write!(f, "transport error: {err}"),
            Error::Auth(msg) => write!(f, "authentication failed: {msg}"),
            Error::Command(msg) => write!(f, "command failed: {msg}"),
            Error::PoolClosed => f.write_str("attempted to acquire a connection on a closed pool"),
            Error::Timeout => f.write_str("timed out while waiting for an available connection"),
            Error::ValidationFailed(msg) => write!(f, "connection failed validation: {msg}"),
            Error::InvalidState(msg) => write!(f, "invalid connection state: {msg}"),
            Error::TypeMismatch(msg) => write!(f, "type mismatch: {msg}"),
            Error::Unknown(msg) => write!(f, "{msg}"),
        }
    }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(err: io::Error) -> Self {
        Error::Transport(err)
    }
}

impl From<url::ParseError> for Error {
    #[inline]
    fn from(err: url::ParseError) -> Self {
        Error::InvalidUri(err.to_string().into_boxed_str())
    }
}
