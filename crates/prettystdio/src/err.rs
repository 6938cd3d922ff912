//! Helper module with this crate's error type.
//!
//! Stream errors complement I/O errors by identifying configuration problems,
//! such as unknown encodings or open modes, as well as transcoding failures.
//! They seamlessly convert to and from I/O errors, so that readers and writers
//! can report them through [`std::io::Error`].

use std::borrow::Cow;

/// The enumeration of error kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// An encoding label that does not name a known encoding.
    UnknownEncoding,
    /// An error policy other than strict, replace, or ignore.
    UnknownErrorPolicy,
    /// A name other than stdin, stdout, or stderr.
    UnknownStream,
    /// A malformed or unsupported file open mode.
    InvalidMode,
    /// Bytes that are not valid in the stream's encoding.
    MalformedInput,
    /// A character that cannot be represented in the stream's encoding.
    UnmappableCharacter,
    /// A text wrapper that has already been detached from its stream.
    Detached,
    /// An operation the stream does not support, e.g., writing to stdin.
    Unsupported,
    /// An error reported by the operating system.
    Io,
}

impl ErrorKind {
    /// Turn the error kind into an error message.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownEncoding => "unknown encoding",
            Self::UnknownErrorPolicy => "unknown error policy",
            Self::UnknownStream => "unknown standard stream",
            Self::InvalidMode => "invalid open mode",
            Self::MalformedInput => "malformed input for encoding",
            Self::UnmappableCharacter => "character not representable in encoding",
            Self::Detached => "underlying stream has been detached",
            Self::Unsupported => "unsupported stream operation",
            Self::Io => "I/O error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            kind,
            detail: None,
            source: None,
        }
    }
}

impl From<ErrorKind> for std::io::Error {
    fn from(value: ErrorKind) -> Self {
        Error::from(value).into()
    }
}

/// A stream error.
#[derive(Debug, thiserror::Error)]
#[error("{kind}{}", Detail(.detail))]
pub struct Error {
    kind: ErrorKind,
    detail: Option<Cow<'static, str>>,
    #[source]
    source: Option<std::io::Error>,
}

struct Detail<'a>(&'a Option<Cow<'static, str>>);

impl std::fmt::Display for Detail<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(detail) => write!(f, ": {}", detail),
            None => Ok(()),
        }
    }
}

impl Error {
    /// Create a new error with the given kind and detail.
    pub fn new(kind: ErrorKind, detail: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            detail: Some(detail.into()),
            source: None,
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the detail, if any.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self {
            kind: ErrorKind::Io,
            detail: None,
            source: Some(value),
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(value: Error) -> Self {
        use self::ErrorKind::*;

        match value.kind {
            UnknownEncoding | UnknownErrorPolicy | UnknownStream | InvalidMode => {
                Self::new(std::io::ErrorKind::InvalidInput, value)
            }
            MalformedInput | UnmappableCharacter => {
                Self::new(std::io::ErrorKind::InvalidData, value)
            }
            Detached => Self::new(std::io::ErrorKind::Other, value),
            Unsupported => Self::new(std::io::ErrorKind::Unsupported, value),
            Io => {
                if let Some(error) = value.source {
                    error
                } else {
                    Self::new(std::io::ErrorKind::Other, value)
                }
            }
        }
    }
}

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
