//! Helper module with the options for accessing and opening streams.
//!
//! This module provides the options for text streams and the corresponding
//! builder. Options only ever override defaults; an unset option means that
//! the default applies, which may differ between call paths. Notably, text
//! accessors for standard streams replace malformed input by default, whereas
//! files opened with [`open_stream`](crate::open_stream) are strict by
//! default.
//!
//!
//! # Example
//!
//! ```
//! # use prettystdio::{ErrorPolicy, Options};
//! let options = Options::builder()
//!     .encoding("latin-1")
//!     .errors(ErrorPolicy::Ignore)
//!     .color(false)
//!     .build();
//!
//! assert_eq!(options.encoding(), Some("latin-1"));
//! assert_eq!(options.errors(), Some(ErrorPolicy::Ignore));
//! assert_eq!(options.color(), Some(false));
//! assert!(!options.atomic());
//! ```

use crate::encoding::ErrorPolicy;

#[derive(Clone, Debug, Default)]
struct OptionData {
    encoding: Option<String>,
    errors: Option<ErrorPolicy>,
    color: Option<bool>,
    atomic: bool,
}

/// A builder of options objects.
#[derive(Debug)]
pub struct OptionBuilder(OptionData);

impl OptionBuilder {
    /// Set the encoding label.
    pub fn encoding(&mut self, label: impl Into<String>) -> &mut Self {
        self.0.encoding = Some(label.into());
        self
    }

    /// Set the policy for malformed and unmappable characters.
    pub fn errors(&mut self, policy: ErrorPolicy) -> &mut Self {
        self.0.errors = Some(policy);
        self
    }

    /// Force colors on or off.
    pub fn color(&mut self, color: bool) -> &mut Self {
        self.0.color = Some(color);
        self
    }

    /// Detect whether to use colors based on the output stream.
    pub fn auto_color(&mut self) -> &mut Self {
        self.0.color = None;
        self
    }

    /// Write files atomically.
    ///
    /// Atomic writes go to a temporary file, which replaces the destination
    /// upon [`Handle::close`](crate::Handle::close).
    pub fn atomic(&mut self, atomic: bool) -> &mut Self {
        self.0.atomic = atomic;
        self
    }

    /// Instantiate the options.
    pub fn build(&self) -> Options {
        Options(self.0.clone())
    }
}

/// An options object.
#[derive(Clone, Debug, Default)]
pub struct Options(OptionData);

impl Options {
    /// Create a new builder with the default option values.
    pub fn builder() -> OptionBuilder {
        OptionBuilder(OptionData::default())
    }

    /// Get the encoding label, if overridden.
    pub fn encoding(&self) -> Option<&str> {
        self.0.encoding.as_deref()
    }

    /// Get the error policy, if overridden.
    pub fn errors(&self) -> Option<ErrorPolicy> {
        self.0.errors
    }

    /// Get the color override. `None` means detecting terminals.
    pub fn color(&self) -> Option<bool> {
        self.0.color
    }

    /// Determine whether files are written atomically.
    pub fn atomic(&self) -> bool {
        self.0.atomic
    }
}

#[cfg(test)]
mod test {
    use super::Options;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert_eq!(options.encoding(), None);
        assert_eq!(options.errors(), None);
        assert_eq!(options.color(), None);
        assert!(!options.atomic());

        let options = Options::builder().color(true).auto_color().atomic(true).build();
        assert_eq!(options.color(), None);
        assert!(options.atomic());
    }
}
