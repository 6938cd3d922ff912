use std::io::Result;

/// Trait to determine whether a status code signals an error.
pub(crate) trait IsError {
    /// Determine if this value is an error.
    fn is_error(&self) -> bool;
}

// C library calls return -1 on failure, Win32 calls return FALSE, i.e., 0.
#[cfg(target_family = "unix")]
impl IsError for i32 {
    #[inline]
    fn is_error(&self) -> bool {
        *self == -1
    }
}

#[cfg(target_family = "windows")]
macro_rules! is_error {
    ($source:ty) => {
        impl IsError for $source {
            #[inline]
            fn is_error(&self) -> bool {
                *self == 0
            }
        }
    };
}

#[cfg(target_family = "windows")]
is_error!(i32);
#[cfg(target_family = "windows")]
is_error!(u32);

/// Trait to convert a status code into a Rust result, with the last OS
/// error as the error.
pub(crate) trait IntoResult: IsError + Sized {
    /// Convert this status code into a Rust result.
    fn into_result(self) -> Result<Self> {
        if self.is_error() {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(self)
        }
    }
}

impl<T: IsError> IntoResult for T {}
