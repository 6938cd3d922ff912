//! Helper module for making streams render ANSI escape sequences.
//!
//! Terminals on Unix interpret ANSI escape sequences natively, whereas the
//! Windows console does so only after enabling virtual terminal processing.
//! [`AnsiWrappers`] does the necessary setup once per stream and remembers the
//! outcome, so that wrapping the same stream again returns the same wrapper.

use std::collections::HashMap;
use std::io::Write;

use parking_lot::Mutex;

use crate::ansi::StripAnsi;
use crate::cache::Shared;
use crate::sys;

/// The identity of a stream.
///
/// Stream identities are derived from the underlying file descriptor or
/// handle. Streams without either may use any other token that is unique for
/// the lifetime of the stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StreamId(usize);

impl StreamId {
    /// Create a new stream identity from a token.
    pub const fn new(token: usize) -> Self {
        Self(token)
    }

    /// Get the token.
    pub const fn token(&self) -> usize {
        self.0
    }
}

#[cfg(target_family = "unix")]
impl StreamId {
    /// Determine the identity of the stream with a file descriptor.
    pub fn of<T: std::os::fd::AsRawFd>(stream: &T) -> Self {
        Self(sys::handle_token(sys::raw_handle(stream)))
    }
}

#[cfg(target_family = "windows")]
impl StreamId {
    /// Determine the identity of the stream with a handle.
    pub fn of<T: std::os::windows::io::AsRawHandle>(stream: &T) -> Self {
        Self(sys::handle_token(sys::raw_handle(stream)))
    }
}

// ------------------------------------------------------------------------------------------------

/// A writer for ANSI escape sequences.
pub enum AnsiWriter {
    /// The console translates escape sequences.
    Console(Box<dyn Write + Send>),
    /// The escape sequences are stripped.
    Stripped(StripAnsi<Box<dyn Write + Send>>),
    /// The stream cannot render escape sequences and writes them unchanged.
    Unchanged(Box<dyn Write + Send>),
}

impl AnsiWriter {
    /// Get a name for the variant.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Console(_) => "console",
            Self::Stripped(_) => "stripped",
            Self::Unchanged(_) => "unchanged",
        }
    }

    /// Determine whether this writer strips escape sequences.
    pub fn is_stripped(&self) -> bool {
        matches!(self, Self::Stripped(_))
    }
}

impl std::fmt::Debug for AnsiWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AnsiWriter").field(&self.as_str()).finish()
    }
}

impl Write for AnsiWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Console(inner) | Self::Unchanged(inner) => inner.write(buf),
            Self::Stripped(inner) => inner.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Console(inner) | Self::Unchanged(inner) => inner.flush(),
            Self::Stripped(inner) => inner.flush(),
        }
    }
}

/// A shared writer for ANSI escape sequences.
pub type AnsiStream = Shared<AnsiWriter>;

/// A table of ANSI writers keyed by stream identity.
#[derive(Debug, Default)]
pub struct AnsiWrappers {
    entries: Mutex<HashMap<StreamId, AnsiStream>>,
}

impl AnsiWrappers {
    /// Create a new, empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap the stream for rendering ANSI escape sequences.
    ///
    /// If the stream with the given identity has been wrapped before, this
    /// method returns the existing wrapper and drops the given stream.
    /// Otherwise, it strips escape sequences if color is turned off and tries
    /// to enable the translation of escape sequences if not. If that fails,
    /// the stream passes through unchanged. In all three cases, the new wrapper
    /// is remembered.
    pub fn wrap<W>(&self, id: StreamId, stream: W, color: Option<bool>) -> AnsiStream
    where
        W: Write + Send + 'static,
    {
        let mut entries = self.entries.lock();
        if let Some(wrapper) = entries.get(&id) {
            return wrapper.clone();
        }

        let stream: Box<dyn Write + Send> = Box::new(stream);
        let writer = if color == Some(false) {
            AnsiWriter::Stripped(StripAnsi::new(stream))
        } else {
            match sys::enable_ansi(sys::token_handle(id.token())) {
                Ok(()) => AnsiWriter::Console(stream),
                Err(error) => {
                    tracing::debug!(token = id.token(), %error, "console does not render ANSI");
                    AnsiWriter::Unchanged(stream)
                }
            }
        };

        tracing::debug!(token = id.token(), writer = writer.as_str(), "wrapped stream for ANSI");
        let wrapper = Shared::new(writer);
        entries.insert(id, wrapper.clone());
        wrapper
    }

    /// Forget the wrapper for the stream with the given identity.
    pub fn release(&self, id: StreamId) -> Option<AnsiStream> {
        self.entries.lock().remove(&id)
    }

    /// Determine whether a wrapper exists for the stream.
    pub fn contains(&self, id: StreamId) -> bool {
        self.entries.lock().contains_key(&id)
    }

    /// Get the number of wrappers.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Determine whether there are no wrappers.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
