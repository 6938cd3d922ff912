//! Helper module with the stream capabilities and standard streams.
//!
//! Streams are described by the [`Stream`] trait, which exposes a stream's
//! declared encoding, its error policy, and whether it is connected to a
//! terminal. [`ReadStream`] and [`WriteStream`] add access to the binary
//! stream underneath a text layer, which [`find_binary_reader`] and
//! [`find_binary_writer`] use to get at raw bytes.

use std::borrow::Cow;
use std::fs::File;
use std::io::{stderr, stdin, stdout, Read, Stderr, Stdin, Stdout, Write};

use crate::encoding::ErrorPolicy;
use crate::err::{Error, ErrorKind, Result};
use crate::sys;

/// A stream's capabilities beyond reading and writing.
pub trait Stream {
    /// Get the label of the stream's declared encoding.
    fn encoding(&self) -> Option<Cow<'_, str>> {
        None
    }

    /// Get the stream's policy for malformed and unmappable characters.
    fn errors(&self) -> Option<ErrorPolicy> {
        None
    }

    /// Determine whether the stream is connected to a terminal.
    fn is_terminal(&self) -> std::io::Result<bool> {
        Ok(false)
    }

    /// Determine whether the stream transfers raw bytes only.
    fn is_binary(&self) -> bool {
        false
    }
}

/// A readable stream that may layer text over a binary stream.
pub trait ReadStream: Stream + Read {
    /// Get the binary stream underneath this stream's text layer.
    ///
    /// The default implementation has no such layer and hands back the stream.
    fn buffer_reader(&mut self) -> std::result::Result<&mut dyn Read, &mut Self>
    where
        Self: Sized,
    {
        Err(self)
    }
}

/// A writable stream that may layer text over a binary stream.
pub trait WriteStream: Stream + Write {
    /// Get the binary stream underneath this stream's text layer.
    ///
    /// The default implementation has no such layer and hands back the stream.
    fn buffer_writer(&mut self) -> std::result::Result<&mut dyn Write, &mut Self>
    where
        Self: Sized,
    {
        Err(self)
    }
}

/// Find the binary reader for the stream.
///
/// If the stream is binary, this function returns the stream. Otherwise, it
/// returns the underlying binary stream if there is one, and the stream itself
/// as a best effort.
pub fn find_binary_reader<S: ReadStream>(stream: &mut S) -> &mut dyn Read {
    if stream.is_binary() {
        return stream;
    }

    match stream.buffer_reader() {
        Ok(buffer) => buffer,
        Err(stream) => stream,
    }
}

/// Find the binary writer for the stream.
///
/// If the stream is binary, this function returns the stream. Otherwise, it
/// returns the underlying binary stream if there is one, and the stream itself
/// as a best effort.
pub fn find_binary_writer<S: WriteStream>(stream: &mut S) -> &mut dyn Write {
    if stream.is_binary() {
        return stream;
    }

    match stream.buffer_writer() {
        Ok(buffer) => buffer,
        Err(stream) => stream,
    }
}

// ------------------------------------------------------------------------------------------------

macro_rules! std_stream {
    ($name:ty, $input:expr) => {
        impl Stream for $name {
            fn encoding(&self) -> Option<Cow<'_, str>> {
                sys::stream_encoding(sys::raw_handle(self), $input)
            }

            fn is_terminal(&self) -> std::io::Result<bool> {
                sys::is_terminal(sys::raw_handle(self))
            }
        }
    };
}

std_stream!(Stdin, true);
std_stream!(Stdout, false);
std_stream!(Stderr, false);

impl ReadStream for Stdin {}
impl WriteStream for Stdout {}
impl WriteStream for Stderr {}

impl Stream for File {
    fn is_terminal(&self) -> std::io::Result<bool> {
        sys::is_terminal(sys::raw_handle(self))
    }

    fn is_binary(&self) -> bool {
        true
    }
}

impl ReadStream for File {}
impl WriteStream for File {}

impl Stream for Vec<u8> {
    fn is_binary(&self) -> bool {
        true
    }
}

impl WriteStream for Vec<u8> {}

/// Get the process's standard input as a binary stream.
#[inline]
pub fn binary_stdin() -> Stdin {
    stdin()
}

/// Get the process's standard output as a binary stream.
#[inline]
pub fn binary_stdout() -> Stdout {
    stdout()
}

/// Get the process's standard error as a binary stream.
#[inline]
pub fn binary_stderr() -> Stderr {
    stderr()
}

/// Get the named standard stream as a binary stream.
#[inline]
pub fn binary_stream(which: StdStream) -> StdHandle {
    StdHandle::open(which)
}

// ------------------------------------------------------------------------------------------------

/// The name of a standard stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StdStream {
    Stdin,
    Stdout,
    Stderr,
}

impl StdStream {
    /// Get the stream's name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdin => "stdin",
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }

    /// Determine whether the stream is standard input.
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Stdin)
    }
}

impl std::fmt::Display for StdStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StdStream {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stdin" => Ok(Self::Stdin),
            "stdout" => Ok(Self::Stdout),
            "stderr" => Ok(Self::Stderr),
            _ => Err(Error::new(ErrorKind::UnknownStream, s.to_string())),
        }
    }
}

/// A handle on one of the process's standard streams.
///
/// Standard input only supports reading, standard output and error only
/// support writing. The unsupported operations fail with
/// [`ErrorKind::Unsupported`].
#[derive(Debug)]
pub enum StdHandle {
    Stdin(Stdin),
    Stdout(Stdout),
    Stderr(Stderr),
}

impl StdHandle {
    /// Open a handle on the named standard stream.
    pub fn open(which: StdStream) -> Self {
        match which {
            StdStream::Stdin => Self::Stdin(stdin()),
            StdStream::Stdout => Self::Stdout(stdout()),
            StdStream::Stderr => Self::Stderr(stderr()),
        }
    }

    /// Open a handle on standard input.
    pub fn stdin() -> Self {
        Self::open(StdStream::Stdin)
    }

    /// Open a handle on standard output.
    pub fn stdout() -> Self {
        Self::open(StdStream::Stdout)
    }

    /// Open a handle on standard error.
    pub fn stderr() -> Self {
        Self::open(StdStream::Stderr)
    }

    /// Get the name of the standard stream.
    pub fn which(&self) -> StdStream {
        match self {
            Self::Stdin(_) => StdStream::Stdin,
            Self::Stdout(_) => StdStream::Stdout,
            Self::Stderr(_) => StdStream::Stderr,
        }
    }

    fn unsupported(&self, operation: &str) -> std::io::Error {
        Error::new(
            ErrorKind::Unsupported,
            format!("cannot {} {}", operation, self.which()),
        )
        .into()
    }
}

impl Stream for StdHandle {
    fn encoding(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Stdin(stream) => stream.encoding(),
            Self::Stdout(stream) => stream.encoding(),
            Self::Stderr(stream) => stream.encoding(),
        }
    }

    fn is_terminal(&self) -> std::io::Result<bool> {
        match self {
            Self::Stdin(stream) => Stream::is_terminal(stream),
            Self::Stdout(stream) => Stream::is_terminal(stream),
            Self::Stderr(stream) => Stream::is_terminal(stream),
        }
    }
}

impl Read for StdHandle {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Stdin(stream) => stream.read(buf),
            _ => Err(self.unsupported("read from")),
        }
    }
}

impl Write for StdHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Stdout(stream) => stream.write(buf),
            Self::Stderr(stream) => stream.write(buf),
            Self::Stdin(_) => Err(self.unsupported("write to")),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(stream) => stream.flush(),
            Self::Stderr(stream) => stream.flush(),
            Self::Stdin(_) => Ok(()),
        }
    }
}

impl ReadStream for StdHandle {}
impl WriteStream for StdHandle {}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::FakeStream;

    #[test]
    fn test_std_stream_names() -> Result<()> {
        for which in [StdStream::Stdin, StdStream::Stdout, StdStream::Stderr] {
            assert_eq!(which.to_string().parse::<StdStream>()?, which);
            assert_eq!(StdHandle::open(which).which(), which);
        }
        assert_eq!(
            "stdjunk".parse::<StdStream>().map_err(|e| e.kind()),
            Err(ErrorKind::UnknownStream)
        );
        Ok(())
    }

    #[test]
    fn test_binary_accessors() {
        assert_eq!(sys::raw_handle(&binary_stdin()), sys::raw_handle(&stdin()));
        assert_eq!(sys::raw_handle(&binary_stdout()), sys::raw_handle(&stdout()));
        assert_eq!(sys::raw_handle(&binary_stderr()), sys::raw_handle(&stderr()));
        assert_eq!(binary_stdin().encoding(), StdHandle::stdin().encoding());

        for which in [StdStream::Stdin, StdStream::Stdout, StdStream::Stderr] {
            assert_eq!(binary_stream(which).which(), which);
        }
    }

    #[test]
    fn test_std_handle_direction() {
        let mut input = StdHandle::stdin();
        let error = input.write(b"boo").unwrap_err();
        assert_eq!(error.kind(), std::io::ErrorKind::Unsupported);
        assert!(input.flush().is_ok());

        let mut output = StdHandle::stderr();
        let mut buffer = [0; 4];
        let error = output.read(&mut buffer).unwrap_err();
        assert_eq!(error.kind(), std::io::ErrorKind::Unsupported);
    }

    #[test]
    fn test_find_binary_writer() {
        // A binary stream is its own binary writer.
        let mut bytes = Vec::new();
        find_binary_writer(&mut bytes).write_all(b"raw").unwrap();
        assert_eq!(bytes, b"raw");

        // A text stream with a buffer yields the buffer.
        let mut text = FakeStream::with_encoding("utf-8").with_buffer();
        find_binary_writer(&mut text).write_all(b"under").unwrap();
        assert_eq!(text.buffer_data(), Some(b"under".as_slice()));
        assert_eq!(text.data(), b"");

        // A text stream without buffer is its own best effort.
        let mut text = FakeStream::with_encoding("utf-8");
        find_binary_writer(&mut text).write_all(b"over").unwrap();
        assert_eq!(text.data(), b"over");
    }

    #[test]
    fn test_find_binary_reader() {
        let mut text = FakeStream::with_input(b"text").with_buffer_input(b"bytes");
        let mut data = String::new();
        find_binary_reader(&mut text).read_to_string(&mut data).unwrap();
        assert_eq!(data, "bytes");

        let mut text = FakeStream::with_input(b"text");
        let mut data = String::new();
        find_binary_reader(&mut text).read_to_string(&mut data).unwrap();
        assert_eq!(data, "text");

        let mut binary = FakeStream::with_input(b"binary").binary();
        let mut data = String::new();
        find_binary_reader(&mut binary).read_to_string(&mut data).unwrap();
        assert_eq!(data, "binary");
    }
}
