#[cfg(target_family = "unix")]
pub(crate) type RawHandle = std::os::fd::RawFd;
#[cfg(target_family = "windows")]
pub(crate) type RawHandle = std::os::windows::io::RawHandle;

mod into_result;
#[cfg(target_family = "unix")]
mod unix;
#[cfg(target_family = "windows")]
mod windows;

#[cfg(target_family = "unix")]
pub(crate) use self::unix::{
    enable_ansi, handle_token, is_terminal, raw_handle, stream_encoding, token_handle,
};
#[cfg(target_family = "windows")]
pub(crate) use self::windows::{
    enable_ansi, handle_token, is_terminal, raw_handle, stream_encoding, token_handle,
};
