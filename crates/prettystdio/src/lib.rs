//! # Pretty 🌸 Stdio
//!
//! \[  [**Docs.rs**](https://docs.rs/prettystdio/latest/prettystdio/)
//! | [**Rust Crate**](https://crates.io/crates/prettystdio)
//! | [**Repository**](https://github.com/apparebit/prettypretty)
//! \]
//!
//! This crate provides **well-behaved standard streams** for command line
//! tools. It irons out the differences between operating systems and between
//! correctly and incorrectly configured environments:
//!
//!   * The [best encoding](best_encoding) of a stream is never ASCII. A
//!     stream declaring ASCII is [misconfigured](is_misconfigured) and
//!     transparently wrapped by [`guard_text_stream`] and the text accessors
//!     [`text_stdin`], [`text_stdout`], and [`text_stderr`].
//!   * ANSI escape sequences are [stripped](strip_ansi) from output that does
//!     not go to a terminal, and [`term_len`] measures text without them.
//!   * On Windows, [`AnsiWrappers`] enable the console's support for ANSI
//!     escape sequences, which Unix terminals support natively.
//!   * [`open_stream`] opens files in text or binary mode and maps `-` to
//!     standard input or output. Files may also be written atomically.
//!
//! A [`Context`] owns the caches for text streams and ANSI writers, so that
//! each standard stream is wrapped only once per process.
//!
//! This crate logs through [`tracing`](https://crates.io/crates/tracing) but
//! never installs a subscriber. Transcoding relies on
//! [`encoding_rs`](https://crates.io/crates/encoding_rs).
//!
//!
//! # Example
//!
//! ```
//! # use std::io::Write;
//! # use prettystdio::{guard_text_stream, is_misconfigured};
//! // A byte vector is binary and declares no encoding.
//! let bytes: Vec<u8> = Vec::new();
//! assert!(!is_misconfigured(&bytes));
//!
//! let mut text = guard_text_stream(bytes, None, None)?;
//! assert!(!text.is_wrapped());
//! write!(text, "Hello, wörld!")?;
//! assert_eq!(text.get_ref(), "Hello, wörld!".as_bytes());
//! # Ok::<(), prettystdio::err::Error>(())
//! ```
//!
//! # Windows
//!
//! The Windows console renders ANSI escape sequences only after enabling
//! virtual terminal processing, which is supported by Windows 10 version 1511
//! and later. On earlier versions, [`AnsiWrappers::wrap`] leaves streams
//! unchanged.

mod ansi;
mod cache;
mod console;
mod context;
mod encoding;
pub mod err;
mod open;
pub mod opt;
mod stream;
mod sys;
mod text;

#[cfg(test)]
mod test_util;

pub use ansi::{isatty, should_strip_ansi, strip_ansi, term_len, StripAnsi};
pub use cache::{CachedStream, Shared};
pub use console::{AnsiStream, AnsiWrappers, AnsiWriter, StreamId};
pub use context::{Context, SharedTextStream};
pub use encoding::{
    argv_encoding, best_encoding, default_encoding, is_ascii_encoding, lookup, ErrorPolicy,
    DEFAULT_ENCODING,
};
pub use open::{open_stream, Access, AtomicFile, FileHandle, Handle, OpenMode, Target};
pub use opt::Options;
pub use stream::{
    binary_stderr, binary_stdin, binary_stdout, binary_stream, find_binary_reader,
    find_binary_writer, ReadStream, StdHandle, StdStream, Stream, WriteStream,
};
pub use text::{
    guard_text_stream, is_compatible_text_stream, is_misconfigured, text_stderr, text_stdin,
    text_stdout, text_stream, TextStream, TextWrapper,
};
