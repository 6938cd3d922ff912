use std::borrow::Cow;
use std::io::Result;
use std::os::windows::io::AsRawHandle;
use std::ptr::from_mut;

use windows_sys::Win32::Globalization;
use windows_sys::Win32::System::Console::{self, CONSOLE_MODE as ConsoleMode};

use super::{into_result::IntoResult, RawHandle};
use crate::encoding::code_page_label;

/// Get the raw handle.
#[inline]
pub(crate) fn raw_handle<T: AsRawHandle>(source: &T) -> RawHandle {
    source.as_raw_handle()
}

/// Turn the handle into an identity token.
#[inline]
pub(crate) fn handle_token(handle: RawHandle) -> usize {
    handle as usize
}

/// Turn the identity token back into a handle.
#[inline]
pub(crate) fn token_handle(token: usize) -> RawHandle {
    token as RawHandle
}

fn read_mode(handle: RawHandle) -> Result<ConsoleMode> {
    let mut mode = 0;
    unsafe { Console::GetConsoleMode(handle, from_mut(&mut mode)) }.into_result()?;
    Ok(mode)
}

/// Determine whether the handle refers to a console.
///
/// Handles for pipes and files do not have a console mode.
pub(crate) fn is_terminal(handle: RawHandle) -> Result<bool> {
    Ok(read_mode(handle).is_ok())
}

/// Determine the encoding of the standard stream.
///
/// Consoles use their input or output code page, whereas redirected streams
/// use the ANSI code page.
pub(crate) fn stream_encoding(handle: RawHandle, input: bool) -> Option<Cow<'static, str>> {
    let code_page = if read_mode(handle).is_err() {
        unsafe { Globalization::GetACP() }
    } else if input {
        unsafe { Console::GetConsoleCP() }
    } else {
        unsafe { Console::GetConsoleOutputCP() }
    };

    code_page_label(code_page)
}

/// Enable the interpretation of ANSI escape sequences.
///
/// This function sets `ENABLE_PROCESSED_OUTPUT` and
/// `ENABLE_VIRTUAL_TERMINAL_PROCESSING` for the console. It fails if the handle
/// is not a console or the console predates Windows 10 version 1511.
pub(crate) fn enable_ansi(handle: RawHandle) -> Result<()> {
    let mode = read_mode(handle)?;
    let wanted =
        mode | Console::ENABLE_PROCESSED_OUTPUT | Console::ENABLE_VIRTUAL_TERMINAL_PROCESSING;
    if wanted != mode {
        unsafe { Console::SetConsoleMode(handle, wanted) }.into_result()?;
    }
    Ok(())
}
