//! Helper module for resolving text encodings.
//!
//! Encodings are identified by labels, which are looked up with
//! [`encoding_rs`](https://crates.io/crates/encoding_rs). Since the WHATWG
//! encoding standard implemented by that crate treats ASCII as an alias for
//! windows-1252, detecting ASCII relies on this module's own list of aliases.
//! A stream declaring ASCII almost certainly is misconfigured and gets UTF-8
//! instead.

use std::borrow::Cow;

use encoding_rs::{Encoding, REPLACEMENT, UTF_8};

use crate::err::{Error, ErrorKind, Result};
use crate::stream::{binary_stdin, Stream};

/// The label of the runtime's default encoding.
pub const DEFAULT_ENCODING: &str = "utf-8";

/// The normalized aliases of 7-bit US-ASCII.
const ASCII_ALIASES: [&str; 13] = [
    "646",
    "ansi_x3.4_1968",
    "ansi_x3_4_1968",
    "ansi_x3.4_1986",
    "ascii",
    "cp367",
    "csascii",
    "ibm367",
    "iso646_us",
    "iso_646.irv_1991",
    "iso_ir_6",
    "us",
    "us_ascii",
];

/// Normalize an encoding label.
///
/// This function lowercases the label and collapses runs of characters other
/// than ASCII letters, digits, and periods into a single underscore, dropping
/// them at either end.
fn normalize(label: &str) -> String {
    let mut result = String::with_capacity(label.len());
    let mut separate = false;

    for c in label.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '.' {
            if separate && !result.is_empty() {
                result.push('_');
            }
            separate = false;
            result.push(c.to_ascii_lowercase());
        } else {
            separate = true;
        }
    }

    result
}

/// Determine whether the label names the ASCII encoding.
///
/// Unknown labels are not ASCII.
///
/// ```
/// # use prettystdio::is_ascii_encoding;
/// assert!(is_ascii_encoding("ANSI_X3.4-1968"));
/// assert!(is_ascii_encoding("US-ASCII"));
/// assert!(!is_ascii_encoding("utf-8"));
/// assert!(!is_ascii_encoding("no-such-thing"));
/// ```
pub fn is_ascii_encoding(label: &str) -> bool {
    ASCII_ALIASES.contains(&normalize(label).as_str())
}

/// Look up the encoding with the given label.
///
/// Besides WHATWG labels, this function also accepts spellings that use
/// underscores or omit separators, e.g., `utf_8` or `latin_1`. ASCII labels
/// resolve to windows-1252, which is the WHATWG superset of ASCII.
///
/// # Errors
///
/// This function fails with [`ErrorKind::UnknownEncoding`] for unknown labels
/// and for encodings that cannot be written. The latter are UTF-16, which
/// `encoding_rs` only decodes, and the replacement encoding, which stands in
/// for ISO-2022-KR, HZ-GB-2312, and similar legacy encodings.
pub fn lookup(label: &str) -> Result<&'static Encoding> {
    let label = label.trim();
    let hyphenated = label.replace('_', "-");
    let squeezed: String = label.chars().filter(|c| *c != '_' && *c != '-').collect();

    let found = [label, hyphenated.as_str(), squeezed.as_str()]
        .into_iter()
        .find_map(|candidate| Encoding::for_label(candidate.as_bytes()));

    match found {
        Some(encoding) if encoding != REPLACEMENT && encoding.output_encoding() == encoding => {
            Ok(encoding)
        }
        Some(encoding) => Err(Error::new(
            ErrorKind::UnknownEncoding,
            format!("{} ({} is not supported)", label, encoding.name()),
        )),
        None => Err(Error::new(ErrorKind::UnknownEncoding, label.to_string())),
    }
}

/// Get the runtime's default encoding, which is UTF-8.
#[inline]
pub fn default_encoding() -> &'static Encoding {
    UTF_8
}

/// Get the best encoding for the stream.
///
/// This function prefers the stream's declared encoding and falls back on the
/// default encoding. If the resulting label names ASCII or no known encoding,
/// it returns UTF-8. It never returns an ASCII encoding.
pub fn best_encoding<S: Stream + ?Sized>(stream: &S) -> &'static Encoding {
    let declared = stream.encoding();
    let label = declared
        .as_deref()
        .filter(|label| !label.is_empty())
        .unwrap_or(DEFAULT_ENCODING);

    if is_ascii_encoding(label) {
        return UTF_8;
    }

    match lookup(label) {
        Ok(encoding) => encoding,
        Err(_) => {
            tracing::debug!(label, "unknown stream encoding, falling back on UTF-8");
            UTF_8
        }
    }
}

/// Get the encoding for command line arguments and file names.
///
/// That is the encoding declared by standard input, or else the file system
/// encoding, which is UTF-8. Like the [best encoding](best_encoding), it never
/// is ASCII.
pub fn argv_encoding() -> &'static Encoding {
    declared_or_utf8(binary_stdin().encoding().as_deref())
}

fn declared_or_utf8(label: Option<&str>) -> &'static Encoding {
    label
        .filter(|label| !label.is_empty() && !is_ascii_encoding(label))
        .and_then(|label| lookup(label).ok())
        .unwrap_or(UTF_8)
}

/// Turn a Windows code page into an encoding label.
#[cfg_attr(not(target_family = "windows"), allow(dead_code))]
pub(crate) fn code_page_label(code_page: u32) -> Option<Cow<'static, str>> {
    match code_page {
        0 => None,
        20127 => Some(Cow::Borrowed("us-ascii")),
        65001 => Some(Cow::Borrowed("utf-8")),
        n => Some(Cow::Owned(format!("cp{}", n))),
    }
}

// ------------------------------------------------------------------------------------------------

/// The policy for malformed bytes and unmappable characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorPolicy {
    /// Fail with an error.
    Strict,
    /// Substitute U+FFFD when decoding and `?` when encoding.
    Replace,
    /// Skip the offending bytes or characters.
    Ignore,
}

impl ErrorPolicy {
    /// Get the policy's conventional name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Replace => "replace",
            Self::Ignore => "ignore",
        }
    }
}

impl std::fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "strict" => Ok(Self::Strict),
            "replace" => Ok(Self::Replace),
            "ignore" => Ok(Self::Ignore),
            _ => Err(Error::new(ErrorKind::UnknownErrorPolicy, s.to_string())),
        }
    }
}
