use std::borrow::Cow;
use std::io::{Cursor, Read, Write};

use crate::encoding::ErrorPolicy;
use crate::stream::{ReadStream, Stream, WriteStream};

/// A binary buffer underneath a fake text stream.
#[derive(Debug, Default)]
pub(crate) struct Buffer {
    input: Cursor<Vec<u8>>,
    output: Vec<u8>,
}

impl Read for Buffer {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.output.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A stream with configurable capabilities.
#[derive(Debug, Default)]
pub(crate) struct FakeStream {
    encoding: Option<String>,
    errors: Option<ErrorPolicy>,
    // None means the terminal check fails.
    terminal: Option<bool>,
    binary: bool,
    input: Cursor<Vec<u8>>,
    output: Vec<u8>,
    flushes: usize,
    has_buffer: bool,
    buffer: Buffer,
}

impl FakeStream {
    pub fn new() -> Self {
        Self {
            terminal: Some(false),
            ..Self::default()
        }
    }

    pub fn with_encoding(label: &str) -> Self {
        Self {
            encoding: Some(label.to_string()),
            ..Self::new()
        }
    }

    pub fn with_input(bytes: &[u8]) -> Self {
        Self {
            input: Cursor::new(bytes.to_vec()),
            ..Self::new()
        }
    }

    pub fn errors(mut self, policy: ErrorPolicy) -> Self {
        self.errors = Some(policy);
        self
    }

    pub fn terminal(mut self, terminal: Option<bool>) -> Self {
        self.terminal = terminal;
        self
    }

    pub fn binary(mut self) -> Self {
        self.binary = true;
        self
    }

    pub fn with_buffer(mut self) -> Self {
        self.has_buffer = true;
        self
    }

    pub fn with_buffer_input(mut self, bytes: &[u8]) -> Self {
        self.has_buffer = true;
        self.buffer.input = Cursor::new(bytes.to_vec());
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.output
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn buffer_data(&self) -> Option<&[u8]> {
        if self.has_buffer {
            Some(&self.buffer.output)
        } else {
            None
        }
    }
}

impl Stream for FakeStream {
    fn encoding(&self) -> Option<Cow<'_, str>> {
        self.encoding.as_deref().map(Cow::Borrowed)
    }

    fn errors(&self) -> Option<ErrorPolicy> {
        self.errors
    }

    fn is_terminal(&self) -> std::io::Result<bool> {
        self.terminal
            .ok_or_else(|| std::io::Error::other("terminal probe failed"))
    }

    fn is_binary(&self) -> bool {
        self.binary
    }
}

impl Read for FakeStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for FakeStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.output.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

impl ReadStream for FakeStream {
    fn buffer_reader(&mut self) -> Result<&mut dyn Read, &mut Self> {
        if self.has_buffer {
            Ok(&mut self.buffer)
        } else {
            Err(self)
        }
    }
}

impl WriteStream for FakeStream {
    fn buffer_writer(&mut self) -> Result<&mut dyn Write, &mut Self> {
        if self.has_buffer {
            Ok(&mut self.buffer)
        } else {
            Err(self)
        }
    }
}
