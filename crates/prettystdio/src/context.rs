//! Helper module with the long-lived owner of all cached streams.

use std::io::{stdout, Write};

use crate::ansi;
use crate::cache::{CachedStream, Shared};
use crate::console::{AnsiStream, AnsiWrappers, StreamId};
use crate::err::Result;
use crate::open::{open_stream, Handle, Target};
use crate::opt::Options;
use crate::stream::{StdHandle, StdStream, Stream};
use crate::text::{guard_text_stream, TextStream};

/// A shared text stream over a standard stream.
pub type SharedTextStream = Shared<TextStream<StdHandle>>;

fn guard_with_options(stream: StdHandle, options: &Options) -> Result<TextStream<StdHandle>> {
    guard_text_stream(stream, options.encoding(), options.errors())
}

/// The context for accessing standard streams.
///
/// A context combines [`Options`] with the caches for text streams and ANSI
/// writers. The text streams for standard input, output, and error are created
/// on first access in each process and shared thereafter. Similarly, a stream
/// is wrapped for ANSI escape sequences at most once.
///
/// ```no_run
/// # use std::io::Write;
/// # use prettystdio::{Context, Options};
/// let context = Context::with_options(Options::builder().color(false).build());
/// let mut stdout = context.default_text_stdout()?;
/// writeln!(stdout, "Hello, wörld!")?;
/// # Ok::<(), prettystdio::err::Error>(())
/// ```
#[derive(Debug)]
pub struct Context {
    options: Options,
    stdin: CachedStream<StdHandle, TextStream<StdHandle>>,
    stdout: CachedStream<StdHandle, TextStream<StdHandle>>,
    stderr: CachedStream<StdHandle, TextStream<StdHandle>>,
    ansi: AnsiWrappers,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Create a new context with default options.
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    /// Create a new context with the given options.
    pub fn with_options(options: Options) -> Self {
        Self {
            options,
            stdin: CachedStream::new(StdHandle::stdin, guard_with_options),
            stdout: CachedStream::new(StdHandle::stdout, guard_with_options),
            stderr: CachedStream::new(StdHandle::stderr, guard_with_options),
            ansi: AnsiWrappers::new(),
        }
    }

    /// Get the options.
    pub fn options(&self) -> &Options {
        &self.options
    }

    fn cache(&self, which: StdStream) -> &CachedStream<StdHandle, TextStream<StdHandle>> {
        match which {
            StdStream::Stdin => &self.stdin,
            StdStream::Stdout => &self.stdout,
            StdStream::Stderr => &self.stderr,
        }
    }

    /// Get the shared text stream for the named standard stream.
    pub fn default_text_stream(&self, which: StdStream) -> Result<SharedTextStream> {
        self.cache(which).get(&self.options)
    }

    /// Get the shared text stream for standard input.
    pub fn default_text_stdin(&self) -> Result<SharedTextStream> {
        self.default_text_stream(StdStream::Stdin)
    }

    /// Get the shared text stream for standard output.
    pub fn default_text_stdout(&self) -> Result<SharedTextStream> {
        self.default_text_stream(StdStream::Stdout)
    }

    /// Get the shared text stream for standard error.
    pub fn default_text_stderr(&self) -> Result<SharedTextStream> {
        self.default_text_stream(StdStream::Stderr)
    }

    /// Determine whether to strip ANSI escape sequences from output to the
    /// stream, which defaults to standard output.
    pub fn should_strip_ansi(&self, stream: Option<&dyn Stream>) -> bool {
        ansi::should_strip_ansi(stream, self.options.color())
    }

    /// Wrap the stream for rendering ANSI escape sequences.
    pub fn wrap_for_ansi<W>(&self, id: StreamId, stream: W) -> AnsiStream
    where
        W: Write + Send + 'static,
    {
        self.ansi.wrap(id, stream, self.options.color())
    }

    /// Wrap standard output for rendering ANSI escape sequences.
    pub fn wrap_stdout_for_ansi(&self) -> AnsiStream {
        let stream = stdout();
        self.wrap_for_ansi(StreamId::of(&stream), stream)
    }

    /// Release the ANSI writer for the stream.
    pub fn release_ansi(&self, id: StreamId) -> Option<AnsiStream> {
        self.ansi.release(id)
    }

    /// Open a file or standard stream with this context's options.
    pub fn open<'a, T: Into<Target<'a>>>(&self, target: T, mode: &str) -> Result<(Handle, bool)> {
        open_stream(target, mode, &self.options)
    }
}
