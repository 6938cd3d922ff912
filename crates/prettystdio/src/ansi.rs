//! Helper module for ANSI escape sequences.
//!
//! This module recognizes CSI sequences of the form `ESC [ params letter`,
//! where the parameters are digits, semicolons, and question marks. Those are
//! the sequences commonly used for styling text. It strips such sequences from
//! strings with [`strip_ansi`] and from byte streams with [`StripAnsi`].

use std::borrow::Cow;
use std::io::Write;
use std::sync::OnceLock;

use regex::Regex;

use crate::stream::{binary_stdout, Stream};

/// Get the regular expression matching CSI sequences.
fn ansi_regex() -> &'static Regex {
    static ANSI_REGEX: OnceLock<Regex> = OnceLock::new();
    ANSI_REGEX.get_or_init(|| Regex::new(r"\x1b\[[;?0-9]*[a-zA-Z]").expect("regex is valid"))
}

/// Strip all CSI sequences from the string.
///
/// ```
/// # use prettystdio::strip_ansi;
/// assert_eq!(strip_ansi("\x1b[1;31mError:\x1b[0m oops"), "Error: oops");
/// assert_eq!(strip_ansi("\x1b[?25lhidden"), "hidden");
/// ```
pub fn strip_ansi(value: &str) -> Cow<'_, str> {
    ansi_regex().replace_all(value, "")
}

/// Determine the length of the string in characters, ignoring CSI sequences.
///
/// ```
/// # use prettystdio::term_len;
/// assert_eq!(term_len("\x1b[32mgrün\x1b[0m"), 4);
/// ```
pub fn term_len(value: &str) -> usize {
    strip_ansi(value).chars().count()
}

/// Determine whether the stream is connected to a terminal.
///
/// If no stream is given, this function checks standard output. If checking
/// fails, the stream is not a terminal.
pub fn isatty(stream: Option<&dyn Stream>) -> bool {
    match stream {
        Some(stream) => stream.is_terminal(),
        None => Stream::is_terminal(&binary_stdout()),
    }
    .unwrap_or(false)
}

/// Determine whether to strip ANSI escape sequences from output to the stream.
///
/// If the color is forced on or off, this function returns the opposite.
/// Otherwise, it strips escape sequences unless the stream, or standard output
/// if no stream is given, is a terminal.
pub fn should_strip_ansi(stream: Option<&dyn Stream>, color: Option<bool>) -> bool {
    match color {
        Some(color) => !color,
        None => !isatty(stream),
    }
}

// ------------------------------------------------------------------------------------------------

/// The state of recognizing a CSI sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    CsiParam,
}

/// What to do with a byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    /// Write the byte.
    Print,
    /// Hold the byte as part of a prospective sequence.
    Retain,
    /// Drop the completed sequence including this byte.
    Discard,
    /// Write the retained bytes, then process this byte again from ground.
    AbortThenRetry,
}

const fn transition(state: State, byte: u8) -> (State, Action) {
    use self::Action::*;
    use self::State::*;

    match (state, byte) {
        (Ground, 0x1b) => (Escape, Retain),
        (Ground, _) => (Ground, Print),
        (Escape, b'[') => (CsiParam, Retain),
        (CsiParam, b';' | b'?' | b'0'..=b'9') => (CsiParam, Retain),
        (CsiParam, b'a'..=b'z' | b'A'..=b'Z') => (Ground, Discard),
        (_, _) => (Ground, AbortThenRetry),
    }
}

/// A writer that strips CSI sequences.
///
/// The writer removes the same sequences as [`strip_ansi`], even if they are
/// split across several writes. It holds on to the prefix of a possible
/// sequence until the sequence is complete or turns out not to be one.
/// Dropping the writer writes a held prefix on a best-effort basis.
///
/// ```
/// # use std::io::Write;
/// # use prettystdio::StripAnsi;
/// let mut writer = StripAnsi::new(Vec::new());
/// writer.write_all(b"\x1b[3")?;
/// writer.write_all(b"1mred\x1b[0m")?;
/// assert_eq!(writer.get_ref(), b"red");
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug)]
pub struct StripAnsi<W: Write> {
    inner: W,
    state: State,
    retained: Vec<u8>,
}

impl<W: Write> StripAnsi<W> {
    /// Create a new stripping writer.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            state: State::Ground,
            retained: Vec::new(),
        }
    }

    /// Get a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Get a mutable reference to the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    fn strip(&mut self, buf: &[u8]) -> Vec<u8> {
        let mut output = Vec::with_capacity(buf.len());

        for &byte in buf {
            let mut action;
            (self.state, action) = transition(self.state, byte);

            if action == Action::AbortThenRetry {
                output.append(&mut self.retained);
                (self.state, action) = transition(State::Ground, byte);
            }

            match action {
                Action::Print => output.push(byte),
                Action::Retain => self.retained.push(byte),
                Action::Discard => self.retained.clear(),
                Action::AbortThenRetry => unreachable!("retrying from ground always succeeds"),
            }
        }

        output
    }
}

impl<W: Write> Write for StripAnsi<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let output = self.strip(buf);
        self.inner.write_all(&output)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> Drop for StripAnsi<W> {
    fn drop(&mut self) {
        if !self.retained.is_empty() {
            let _ = self.inner.write_all(&self.retained);
            let _ = self.inner.flush();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::FakeStream;

    const SAMPLES: [&str; 6] = [
        "plain text",
        "\x1b[1m\x1b[31mbold red\x1b[0m and normal",
        "\x1b[?1049h\x1b[2J\x1b[Hscreen",
        "not \x1b]8;;link\x1b\\ a CSI",
        "dangling \x1b[31",
        "ESC ESC \x1b\x1b[0mdone \x1b[;m\x1b[ä",
    ];

    #[test]
    fn test_strip_and_len() {
        for sample in SAMPLES {
            let stripped = strip_ansi(sample);
            assert_eq!(term_len(sample), stripped.chars().count());
            assert!(!ansi_regex().is_match(&stripped));
        }

        assert_eq!(strip_ansi("plain"), Cow::Borrowed("plain"));
        assert_eq!(strip_ansi("dangling \x1b[31"), "dangling \x1b[31");
        assert_eq!(term_len("\x1b[1;4mäöü\x1b[m"), 3);
    }

    #[test]
    fn test_should_strip() {
        let pipe = FakeStream::new();
        let tty = FakeStream::new().terminal(Some(true));
        let broken = FakeStream::new().terminal(None);

        assert!(should_strip_ansi(Some(&pipe), None));
        assert!(!should_strip_ansi(Some(&tty), None));
        assert!(should_strip_ansi(Some(&broken), None));

        for stream in [&pipe, &tty, &broken] {
            assert!(!should_strip_ansi(Some(stream), Some(true)));
            assert!(should_strip_ansi(Some(stream), Some(false)));
        }
        assert!(should_strip_ansi(None, Some(false)));
        assert!(!should_strip_ansi(None, Some(true)));
    }

    #[test]
    fn test_strip_writer() -> std::io::Result<()> {
        for sample in SAMPLES {
            let expected = strip_ansi(sample);
            let bytes = sample.as_bytes();

            for split in 0..=bytes.len() {
                let mut output = Vec::new();
                {
                    let mut writer = StripAnsi::new(&mut output);
                    writer.write_all(&bytes[..split])?;
                    writer.write_all(&bytes[split..])?;
                }
                assert_eq!(output, expected.as_bytes(), "split {} of {:?}", split, sample);
            }
        }
        Ok(())
    }
}
