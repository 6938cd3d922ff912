//! Helper module with text streams.
//!
//! A stream declaring ASCII as its encoding cannot represent most text. This
//! module guards against such misconfigured streams by layering a
//! [`TextWrapper`] over them, which transcodes between UTF-8 and a usable
//! encoding. Correctly configured streams pass through unchanged.

use std::borrow::Cow;
use std::io::{Read, Write};

use encoding_rs::{CoderResult, Decoder, DecoderResult, Encoder, EncoderResult, Encoding};

use crate::encoding::{best_encoding, is_ascii_encoding, lookup, ErrorPolicy};
use crate::err::{Error, ErrorKind, Result};
use crate::stream::{ReadStream, StdHandle, StdStream, Stream, WriteStream};

/// The size of transcoding buffers.
const CHUNK_SIZE: usize = 1_024;

/// The size of reads from the underlying stream.
const READ_SIZE: usize = 4_096;

/// Determine whether the stream is misconfigured, i.e., declares ASCII as its
/// encoding.
pub fn is_misconfigured<S: Stream + ?Sized>(stream: &S) -> bool {
    is_ascii_encoding(stream.encoding().as_deref().unwrap_or(""))
}

fn is_same_encoding(actual: &str, wanted: &str) -> bool {
    if actual.eq_ignore_ascii_case(wanted) {
        return true;
    }

    match (is_ascii_encoding(actual), is_ascii_encoding(wanted)) {
        (true, true) => true,
        (false, false) => matches!((lookup(actual), lookup(wanted)), (Ok(a), Ok(b)) if a == b),
        _ => false,
    }
}

/// Determine whether the stream's encoding and error policy are compatible
/// with the wanted ones.
///
/// Each attribute is compatible if it equals the wanted value, or if no value
/// is wanted and the stream has one.
pub fn is_compatible_text_stream<S: Stream + ?Sized>(
    stream: &S,
    encoding: Option<&str>,
    errors: Option<ErrorPolicy>,
) -> bool {
    let encoding_ok = match (stream.encoding(), encoding) {
        (actual, None) => actual.is_some(),
        (Some(actual), Some(wanted)) => is_same_encoding(&actual, wanted),
        (None, Some(_)) => false,
    };

    let errors_ok = match (stream.errors(), errors) {
        (actual, None) => actual.is_some(),
        (actual, Some(wanted)) => actual == Some(wanted),
    };

    encoding_ok && errors_ok
}

// ------------------------------------------------------------------------------------------------

/// Encode the text, handling unmappable characters according to the policy.
fn encode(
    encoder: &mut Encoder,
    errors: ErrorPolicy,
    mut text: &str,
    last: bool,
    output: &mut Vec<u8>,
) -> Result<()> {
    let mut chunk = [0; CHUNK_SIZE];

    loop {
        let (result, read, written) =
            encoder.encode_from_utf8_without_replacement(text, &mut chunk, last);
        output.extend_from_slice(&chunk[..written]);
        text = &text[read..];

        match result {
            EncoderResult::InputEmpty => return Ok(()),
            EncoderResult::OutputFull => (),
            EncoderResult::Unmappable(c) => match errors {
                ErrorPolicy::Strict => {
                    return Err(Error::new(
                        ErrorKind::UnmappableCharacter,
                        format!("{:?} in {}", c, encoder.encoding().name()),
                    ))
                }
                ErrorPolicy::Replace => encode(encoder, errors, "?", false, output)?,
                ErrorPolicy::Ignore => (),
            },
        }
    }
}

/// Encode the UTF-8 bytes, handling malformed sequences according to the
/// policy.
///
/// Unless this is the last call, an incomplete UTF-8 sequence at the end of
/// the bytes is left alone. This function returns the number of bytes
/// consumed.
fn encode_utf8(
    encoder: &mut Encoder,
    errors: ErrorPolicy,
    bytes: &[u8],
    last: bool,
    output: &mut Vec<u8>,
) -> Result<usize> {
    let mut rest = bytes;

    loop {
        let error = match std::str::from_utf8(rest) {
            Ok(text) => {
                encode(encoder, errors, text, false, output)?;
                return Ok(bytes.len());
            }
            Err(error) => error,
        };

        let (valid, invalid) = rest.split_at(error.valid_up_to());
        // The prefix is valid UTF-8 and hence borrowed without copying.
        encode(encoder, errors, &String::from_utf8_lossy(valid), false, output)?;

        let length = match error.error_len() {
            Some(length) => length,
            None if last => invalid.len(),
            None => return Ok(bytes.len() - invalid.len()),
        };

        match errors {
            ErrorPolicy::Strict => {
                return Err(Error::new(
                    ErrorKind::MalformedInput,
                    format!("invalid UTF-8 {:02x?}", &invalid[..length]),
                ))
            }
            ErrorPolicy::Replace => encode(encoder, errors, "\u{fffd}", false, output)?,
            ErrorPolicy::Ignore => (),
        }

        rest = &invalid[length..];
    }
}

/// Decode the bytes into UTF-8, handling malformed sequences according to the
/// policy.
fn decode(
    decoder: &mut Decoder,
    errors: ErrorPolicy,
    mut bytes: &[u8],
    last: bool,
    output: &mut Vec<u8>,
) -> Result<()> {
    let mut chunk = [0; CHUNK_SIZE];

    loop {
        if errors == ErrorPolicy::Replace {
            let (result, read, written, _) = decoder.decode_to_utf8(bytes, &mut chunk, last);
            output.extend_from_slice(&chunk[..written]);
            bytes = &bytes[read..];

            if let CoderResult::InputEmpty = result {
                return Ok(());
            }
        } else {
            let (result, read, written) =
                decoder.decode_to_utf8_without_replacement(bytes, &mut chunk, last);
            output.extend_from_slice(&chunk[..written]);
            bytes = &bytes[read..];

            match result {
                DecoderResult::InputEmpty => return Ok(()),
                DecoderResult::OutputFull => (),
                DecoderResult::Malformed(length, _) => {
                    if errors == ErrorPolicy::Strict {
                        return Err(Error::new(
                            ErrorKind::MalformedInput,
                            format!("{} malformed byte(s) for {}", length, decoder.encoding().name()),
                        ));
                    }
                }
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------

/// A text layer over a binary stream.
///
/// Text written to the wrapper is UTF-8, which the wrapper encodes with its
/// encoding before writing it to the underlying stream. Conversely, the wrapper
/// decodes bytes read from the underlying stream into UTF-8. Malformed bytes
/// and unmappable characters are handled according to the wrapper's
/// [`ErrorPolicy`].
///
/// The wrapper does not close the underlying stream. Instead, it detaches from
/// the stream by flushing pending output. Dropping a wrapper detaches it
/// on a best-effort basis, ignoring all errors.
pub struct TextWrapper<S: Write> {
    inner: S,
    encoding: &'static Encoding,
    errors: ErrorPolicy,
    attached: bool,
    encoder: Encoder,
    pending: Vec<u8>,
    decoder: Decoder,
    decoded: Vec<u8>,
    position: usize,
    at_eof: bool,
}

impl<S: Write> TextWrapper<S> {
    /// Create a new text wrapper.
    pub fn new(inner: S, encoding: &'static Encoding, errors: ErrorPolicy) -> Self {
        Self {
            inner,
            encoding,
            errors,
            attached: true,
            encoder: encoding.new_encoder(),
            pending: Vec::new(),
            decoder: encoding.new_decoder_without_bom_handling(),
            decoded: Vec::new(),
            position: 0,
            at_eof: false,
        }
    }

    /// Get the wrapper's encoding.
    pub fn target_encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Get the wrapper's error policy.
    pub fn error_policy(&self) -> ErrorPolicy {
        self.errors
    }

    /// Determine whether the wrapper is still attached to its stream.
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Get a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Get a mutable reference to the underlying stream.
    ///
    /// Writing to the underlying stream directly bypasses any text pending in
    /// the wrapper.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    fn check_attached(&self) -> Result<()> {
        if self.attached {
            Ok(())
        } else {
            Err(ErrorKind::Detached.into())
        }
    }

    /// Detach the wrapper from the underlying stream.
    ///
    /// This method encodes pending text, including an incomplete UTF-8
    /// sequence, and flushes the underlying stream, which stays open. It fails
    /// if the wrapper already is detached.
    pub fn detach(&mut self) -> Result<()> {
        self.check_attached()?;

        let pending = std::mem::take(&mut self.pending);
        let mut output = Vec::new();
        encode_utf8(&mut self.encoder, self.errors, &pending, true, &mut output)?;
        encode(&mut self.encoder, self.errors, "", true, &mut output)?;
        self.encoder = self.encoding.new_encoder();

        self.inner.write_all(&output)?;
        self.inner.flush()?;
        self.attached = false;

        tracing::trace!(encoding = self.encoding.name(), "detached text wrapper");
        Ok(())
    }
}

impl<S: Read + Write> TextWrapper<S> {
    fn fill(&mut self) -> Result<()> {
        self.decoded.clear();
        self.position = 0;

        let mut raw = [0; READ_SIZE];
        let count = loop {
            match self.inner.read(&mut raw) {
                Ok(count) => break count,
                Err(error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(error.into()),
            }
        };

        self.at_eof = count == 0;
        decode(
            &mut self.decoder,
            self.errors,
            &raw[..count],
            self.at_eof,
            &mut self.decoded,
        )
    }
}

impl<S: Write> Drop for TextWrapper<S> {
    fn drop(&mut self) {
        if self.attached {
            let _ = self.detach();
        }
    }
}

impl<S: Write> std::fmt::Debug for TextWrapper<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextWrapper")
            .field("encoding", &self.encoding.name())
            .field("errors", &self.errors)
            .field("attached", &self.attached)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl<S: Write> Write for TextWrapper<S> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.check_attached()?;

        self.pending.extend_from_slice(buf);
        let pending = std::mem::take(&mut self.pending);
        let mut output = Vec::with_capacity(pending.len());
        let consumed = encode_utf8(&mut self.encoder, self.errors, &pending, false, &mut output)?;
        self.pending.extend_from_slice(&pending[consumed..]);

        self.inner.write_all(&output)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.check_attached()?;
        self.inner.flush()
    }
}

impl<S: Read + Write> Read for TextWrapper<S> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.check_attached()?;
        if buf.is_empty() {
            return Ok(0);
        }

        while self.position == self.decoded.len() {
            if self.at_eof {
                return Ok(0);
            }
            self.fill()?;
        }

        let available = &self.decoded[self.position..];
        let count = available.len().min(buf.len());
        buf[..count].copy_from_slice(&available[..count]);
        self.position += count;
        Ok(count)
    }
}

impl<S: Stream + Write> Stream for TextWrapper<S> {
    fn encoding(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.encoding.name()))
    }

    fn errors(&self) -> Option<ErrorPolicy> {
        Some(self.errors)
    }

    fn is_terminal(&self) -> std::io::Result<bool> {
        self.inner.is_terminal()
    }
}

impl<S: Stream + Read + Write> ReadStream for TextWrapper<S> {
    fn buffer_reader(&mut self) -> std::result::Result<&mut dyn Read, &mut Self> {
        Ok(&mut self.inner)
    }
}

impl<S: Stream + Write> WriteStream for TextWrapper<S> {
    fn buffer_writer(&mut self) -> std::result::Result<&mut dyn Write, &mut Self> {
        Ok(&mut self.inner)
    }
}

// ------------------------------------------------------------------------------------------------

/// A text stream that either is the original stream or wraps it.
#[derive(Debug)]
pub enum TextStream<S: Write> {
    /// The original, correctly configured stream.
    Native(S),
    /// A misconfigured stream wrapped with a usable encoding.
    Wrapped(TextWrapper<S>),
}

impl<S: Write> TextStream<S> {
    /// Determine whether the stream has been wrapped.
    pub fn is_wrapped(&self) -> bool {
        matches!(self, Self::Wrapped(_))
    }

    /// Get a reference to the original stream.
    pub fn get_ref(&self) -> &S {
        match self {
            Self::Native(stream) => stream,
            Self::Wrapped(wrapper) => wrapper.get_ref(),
        }
    }
}

impl<S: Write> Write for TextStream<S> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Native(stream) => stream.write(buf),
            Self::Wrapped(wrapper) => wrapper.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Native(stream) => stream.flush(),
            Self::Wrapped(wrapper) => wrapper.flush(),
        }
    }
}

impl<S: Read + Write> Read for TextStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Native(stream) => stream.read(buf),
            Self::Wrapped(wrapper) => wrapper.read(buf),
        }
    }
}

impl<S: Stream + Write> Stream for TextStream<S> {
    fn encoding(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Native(stream) => stream.encoding(),
            Self::Wrapped(wrapper) => wrapper.encoding(),
        }
    }

    fn errors(&self) -> Option<ErrorPolicy> {
        match self {
            Self::Native(stream) => stream.errors(),
            Self::Wrapped(wrapper) => wrapper.errors(),
        }
    }

    fn is_terminal(&self) -> std::io::Result<bool> {
        self.get_ref().is_terminal()
    }

    fn is_binary(&self) -> bool {
        match self {
            Self::Native(stream) => stream.is_binary(),
            Self::Wrapped(_) => false,
        }
    }
}

impl<S: ReadStream + Write> ReadStream for TextStream<S> {
    /// Get the native stream's buffer, falling back on the native stream, or
    /// the stream underneath the wrapper.
    fn buffer_reader(&mut self) -> std::result::Result<&mut dyn Read, &mut Self> {
        match self {
            Self::Native(stream) => Ok(match stream.buffer_reader() {
                Ok(buffer) => buffer,
                Err(stream) => stream,
            }),
            Self::Wrapped(wrapper) => Ok(wrapper.get_mut()),
        }
    }
}

impl<S: WriteStream> WriteStream for TextStream<S> {
    /// Get the native stream's buffer, falling back on the native stream, or
    /// the stream underneath the wrapper.
    fn buffer_writer(&mut self) -> std::result::Result<&mut dyn Write, &mut Self> {
        match self {
            Self::Native(stream) => Ok(match stream.buffer_writer() {
                Ok(buffer) => buffer,
                Err(stream) => stream,
            }),
            Self::Wrapped(wrapper) => Ok(wrapper.get_mut()),
        }
    }
}

// ------------------------------------------------------------------------------------------------

/// Guard against a misconfigured stream.
///
/// This function resolves the encoding, which defaults to the stream's [best
/// encoding](best_encoding), and the error policy, which defaults to
/// [`ErrorPolicy::Replace`]. If the stream is misconfigured, it wraps the
/// stream with a [`TextWrapper`] using both. Otherwise, it returns the stream
/// unchanged.
///
/// # Errors
///
/// This function fails with [`ErrorKind::UnknownEncoding`] if the given
/// encoding label is unknown, even if the stream is correctly configured.
pub fn guard_text_stream<S: Stream + Write>(
    stream: S,
    encoding: Option<&str>,
    errors: Option<ErrorPolicy>,
) -> Result<TextStream<S>> {
    let encoding = match encoding {
        Some(label) => lookup(label)?,
        None => best_encoding(&stream),
    };
    let errors = errors.unwrap_or(ErrorPolicy::Replace);

    if is_misconfigured(&stream) {
        let declared = stream.encoding();
        tracing::debug!(
            declared = declared.as_deref().unwrap_or(""),
            encoding = encoding.name(),
            %errors,
            "wrapping misconfigured stream"
        );
        drop(declared);
        Ok(TextStream::Wrapped(TextWrapper::new(stream, encoding, errors)))
    } else {
        Ok(TextStream::Native(stream))
    }
}

/// Get the named standard stream as a text stream.
pub fn text_stream(
    which: StdStream,
    encoding: Option<&str>,
    errors: Option<ErrorPolicy>,
) -> Result<TextStream<StdHandle>> {
    guard_text_stream(StdHandle::open(which), encoding, errors)
}

/// Get standard input as a text stream.
pub fn text_stdin(
    encoding: Option<&str>,
    errors: Option<ErrorPolicy>,
) -> Result<TextStream<StdHandle>> {
    text_stream(StdStream::Stdin, encoding, errors)
}

/// Get standard output as a text stream.
pub fn text_stdout(
    encoding: Option<&str>,
    errors: Option<ErrorPolicy>,
) -> Result<TextStream<StdHandle>> {
    text_stream(StdStream::Stdout, encoding, errors)
}

/// Get standard error as a text stream.
pub fn text_stderr(
    encoding: Option<&str>,
    errors: Option<ErrorPolicy>,
) -> Result<TextStream<StdHandle>> {
    text_stream(StdStream::Stderr, encoding, errors)
}
