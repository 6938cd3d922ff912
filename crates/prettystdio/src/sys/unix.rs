use std::borrow::Cow;
use std::io::Result;
use std::os::fd::AsRawFd;

use super::{into_result::IntoResult, RawHandle};

/// The locale variables determining the character set, in order of precedence.
const LOCALE_VARIABLES: [&str; 3] = ["LC_ALL", "LC_CTYPE", "LANG"];

/// Get the raw file descriptor.
#[inline]
pub(crate) fn raw_handle<T: AsRawFd>(source: &T) -> RawHandle {
    source.as_raw_fd()
}

/// Turn the file descriptor into an identity token.
#[inline]
pub(crate) fn handle_token(handle: RawHandle) -> usize {
    handle as usize
}

/// Turn the identity token back into a file descriptor.
#[inline]
pub(crate) fn token_handle(token: usize) -> RawHandle {
    token as RawHandle
}

/// Determine whether the file descriptor refers to a terminal.
///
/// Like `isatty()`, this function probes the descriptor with `tcgetattr()`.
/// Unlike `isatty()`, it distinguishes between descriptors that are not
/// terminals and descriptors that cannot be probed at all.
pub(crate) fn is_terminal(handle: RawHandle) -> Result<bool> {
    let mut state = std::mem::MaybeUninit::<libc::termios>::uninit();
    match unsafe { libc::tcgetattr(handle, state.as_mut_ptr()) }.into_result() {
        Ok(_) => Ok(true),
        Err(error) if matches!(error.raw_os_error(), Some(libc::ENOTTY | libc::EINVAL)) => {
            Ok(false)
        }
        Err(error) => Err(error),
    }
}

/// Determine the encoding of the standard stream.
///
/// On Unix, all standard streams share the locale's character set.
pub(crate) fn stream_encoding(_handle: RawHandle, _input: bool) -> Option<Cow<'static, str>> {
    let locale = LOCALE_VARIABLES
        .into_iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.is_empty());

    locale_charset(locale.as_deref())
}

/// Extract the character set from a locale name such as `en_US.UTF-8@euro`.
///
/// The C and POSIX locales, which also are in effect when no locale is
/// configured, use ASCII.
fn locale_charset(locale: Option<&str>) -> Option<Cow<'static, str>> {
    match locale {
        None | Some("C") | Some("POSIX") => Some(Cow::Borrowed("ANSI_X3.4-1968")),
        Some(locale) => {
            let (_, charset) = locale.split_once('.')?;
            let charset = charset.split('@').next().unwrap_or(charset);
            if charset.is_empty() {
                None
            } else {
                Some(Cow::Owned(charset.to_string()))
            }
        }
    }
}

/// Enable the interpretation of ANSI escape sequences.
///
/// Unix terminals always interpret ANSI escape sequences.
#[inline]
pub(crate) fn enable_ansi(_handle: RawHandle) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod test {
    use super::{is_terminal, locale_charset};

    #[test]
    fn test_locale_charset() {
        assert_eq!(locale_charset(None).as_deref(), Some("ANSI_X3.4-1968"));
        assert_eq!(locale_charset(Some("POSIX")).as_deref(), Some("ANSI_X3.4-1968"));
        assert_eq!(locale_charset(Some("C.UTF-8")).as_deref(), Some("UTF-8"));
        assert_eq!(locale_charset(Some("de_DE.ISO-8859-15@euro")).as_deref(), Some("ISO-8859-15"));
        assert_eq!(locale_charset(Some("en_US")), None);
        assert_eq!(locale_charset(Some("en_US.")), None);
    }

    #[test]
    fn test_is_terminal() {
        let file = tempfile::tempfile().unwrap();
        assert!(!is_terminal(std::os::fd::AsRawFd::as_raw_fd(&file)).unwrap());
        assert!(is_terminal(-1).is_err());
    }
}
