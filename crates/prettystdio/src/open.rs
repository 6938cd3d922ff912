//! Helper module for opening files and standard streams.
//!
//! [`open_stream`] opens a file in text or binary mode, optionally writing it
//! atomically, or returns the standard input or output for the conventional
//! `-` placeholder. The returned boolean tells the caller whether they own
//! the handle.

use std::borrow::Cow;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::encoding::{argv_encoding, lookup, ErrorPolicy};
use crate::err::{Error, ErrorKind, Result};
use crate::opt::Options;
use crate::stream::{StdHandle, Stream};
use crate::text::TextWrapper;

/// The target of [`open_stream`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target<'a> {
    /// A path in the file system.
    Path(&'a Path),
    /// A descriptor placeholder, which selects a standard stream.
    Descriptor(i32),
}

impl Target<'_> {
    /// The placeholder for the standard streams.
    pub const STDIO: Self = Self::Descriptor(-1);
}

impl<'a> From<&'a str> for Target<'a> {
    /// Convert the string into a target. `-` is the standard stream
    /// placeholder, all other strings are paths.
    fn from(value: &'a str) -> Self {
        if value == "-" {
            Self::STDIO
        } else {
            Self::Path(Path::new(value))
        }
    }
}

impl<'a> From<&'a Path> for Target<'a> {
    fn from(value: &'a Path) -> Self {
        Self::Path(value)
    }
}

impl<'a> From<&'a PathBuf> for Target<'a> {
    fn from(value: &'a PathBuf) -> Self {
        Self::Path(value.as_path())
    }
}

impl From<i32> for Target<'_> {
    fn from(value: i32) -> Self {
        Self::Descriptor(value)
    }
}

// ------------------------------------------------------------------------------------------------

/// The primary purpose of opening a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// `r`: read an existing file.
    Read,
    /// `w`: truncate or create a file for writing.
    Write,
    /// `a`: append to an existing or new file.
    Append,
    /// `x`: create a new file for writing.
    Create,
}

/// The mode for opening a file.
///
/// Modes are written as strings combining exactly one of `r`, `w`, `a`, or
/// `x` with optional `b` for binary or `t` for text and optional `+` for
/// updating.
///
/// ```
/// # use prettystdio::{Access, OpenMode};
/// let mode: OpenMode = "rb+".parse()?;
/// assert_eq!(mode.access(), Access::Read);
/// assert!(mode.is_binary());
/// assert!(mode.is_update());
/// assert!("rw".parse::<OpenMode>().is_err());
/// # Ok::<(), prettystdio::err::Error>(())
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenMode {
    access: Access,
    binary: bool,
    update: bool,
}

impl OpenMode {
    /// Get the primary access.
    pub fn access(&self) -> Access {
        self.access
    }

    /// Determine whether the mode is binary.
    pub fn is_binary(&self) -> bool {
        self.binary
    }

    /// Determine whether the mode also allows the opposite access.
    pub fn is_update(&self) -> bool {
        self.update
    }

    /// Determine whether the primary access is writing.
    pub fn is_writing(&self) -> bool {
        !matches!(self.access, Access::Read)
    }

    fn options(&self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self.access {
            Access::Read => options.read(true).write(self.update),
            Access::Write => options.write(true).create(true).truncate(true).read(self.update),
            Access::Append => options.append(true).create(true).read(self.update),
            Access::Create => options.write(true).create_new(true).read(self.update),
        };
        options
    }
}

impl std::str::FromStr for OpenMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::new(ErrorKind::InvalidMode, s.to_string());

        let mut access = None;
        let mut kind = None;
        let mut update = false;

        for c in s.chars() {
            match c {
                'r' | 'w' | 'a' | 'x' if access.is_none() => {
                    access = Some(match c {
                        'r' => Access::Read,
                        'w' => Access::Write,
                        'a' => Access::Append,
                        _ => Access::Create,
                    })
                }
                'b' | 't' if kind.is_none() => kind = Some(c),
                '+' if !update => update = true,
                _ => return Err(invalid()),
            }
        }

        Ok(Self {
            access: access.ok_or_else(invalid)?,
            binary: kind == Some('b'),
            update,
        })
    }
}

// ------------------------------------------------------------------------------------------------

/// A file that replaces its destination only when committed.
///
/// Writes go to a temporary file in the destination's directory, which
/// replaces the destination upon [`AtomicFile::commit`]. Dropping an
/// uncommitted file removes the temporary file.
#[derive(Debug)]
pub struct AtomicFile {
    file: Option<File>,
    temp_path: PathBuf,
    real_path: PathBuf,
}

impl AtomicFile {
    /// Create a new atomic file for the given destination.
    pub fn create(path: &Path, update: bool) -> Result<Self> {
        let real_path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let directory = match real_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (file, temp_path) = loop {
            let temp_path = directory.join(format!(".__atomic-write{:08x}", rand::random::<u32>()));
            match OpenOptions::new()
                .write(true)
                .read(update)
                .create_new(true)
                .open(&temp_path)
            {
                Ok(file) => break (file, temp_path),
                Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(error) => return Err(error.into()),
            }
        };

        let this = Self {
            file: Some(file),
            temp_path,
            real_path,
        };

        if let Ok(metadata) = fs::metadata(&this.real_path) {
            if let Some(file) = &this.file {
                file.set_permissions(metadata.permissions())?;
            }
        }

        tracing::trace!(path = %this.temp_path.display(), "created temporary file");
        Ok(this)
    }

    /// Get the path of the temporary file.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Get the path of the destination.
    pub fn real_path(&self) -> &Path {
        &self.real_path
    }

    /// Determine whether the file has been committed.
    pub fn is_committed(&self) -> bool {
        self.file.is_none()
    }

    /// Replace the destination with the temporary file.
    ///
    /// Committing an already committed file does nothing.
    pub fn commit(&mut self) -> Result<()> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };

        file.flush()?;
        drop(file);
        if let Err(error) = fs::rename(&self.temp_path, &self.real_path) {
            let _ = fs::remove_file(&self.temp_path);
            return Err(error.into());
        }

        tracing::debug!(path = %self.real_path.display(), "committed atomic file");
        Ok(())
    }

    fn file(&mut self) -> std::io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::Detached, "atomic file is committed").into())
    }
}

impl Read for AtomicFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file()?.read(buf)
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file()?.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file()?.flush()
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            drop(file);
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}

/// A binary file handle.
#[derive(Debug)]
pub enum FileHandle {
    /// A regular file.
    Plain(File),
    /// An atomically written file.
    Atomic(AtomicFile),
}

impl FileHandle {
    /// Close the file, committing an atomic file.
    pub fn close(&mut self) -> Result<()> {
        match self {
            Self::Plain(file) => Ok(file.flush()?),
            Self::Atomic(file) => file.commit(),
        }
    }
}

impl Stream for FileHandle {
    fn is_terminal(&self) -> std::io::Result<bool> {
        match self {
            Self::Plain(file) => Stream::is_terminal(file),
            Self::Atomic(_) => Ok(false),
        }
    }

    fn is_binary(&self) -> bool {
        true
    }
}

impl Read for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(file) => file.read(buf),
            Self::Atomic(file) => file.read(buf),
        }
    }
}

impl Write for FileHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(file) => file.write(buf),
            Self::Atomic(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Plain(file) => file.flush(),
            Self::Atomic(file) => file.flush(),
        }
    }
}

// ------------------------------------------------------------------------------------------------

/// A handle returned by [`open_stream`].
#[derive(Debug)]
pub enum Handle {
    /// A standard stream, which is binary.
    Std(StdHandle),
    /// A file opened in binary mode.
    Binary(FileHandle),
    /// A file opened in text mode.
    Text(TextWrapper<FileHandle>),
}

impl Handle {
    /// Determine whether this handle is a standard stream.
    pub fn is_std(&self) -> bool {
        matches!(self, Self::Std(_))
    }

    /// Close the handle.
    ///
    /// For standard streams, this method only flushes them. For files, it
    /// flushes pending text and commits atomic files. Dropping a handle
    /// without closing it discards an atomic file's content.
    pub fn close(self) -> Result<()> {
        match self {
            Self::Std(mut stream) => Ok(stream.flush()?),
            Self::Binary(mut file) => file.close(),
            Self::Text(mut wrapper) => {
                wrapper.detach()?;
                wrapper.get_mut().close()
            }
        }
    }
}

impl Stream for Handle {
    fn encoding(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Std(stream) => stream.encoding(),
            Self::Binary(_) => None,
            Self::Text(wrapper) => wrapper.encoding(),
        }
    }

    fn errors(&self) -> Option<ErrorPolicy> {
        match self {
            Self::Text(wrapper) => wrapper.errors(),
            _ => None,
        }
    }

    fn is_terminal(&self) -> std::io::Result<bool> {
        match self {
            Self::Std(stream) => stream.is_terminal(),
            Self::Binary(file) => file.is_terminal(),
            Self::Text(wrapper) => wrapper.is_terminal(),
        }
    }

    fn is_binary(&self) -> bool {
        !matches!(self, Self::Text(_))
    }
}

impl Read for Handle {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Std(stream) => stream.read(buf),
            Self::Binary(file) => file.read(buf),
            Self::Text(wrapper) => wrapper.read(buf),
        }
    }
}

impl Write for Handle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Std(stream) => stream.write(buf),
            Self::Binary(file) => file.write(buf),
            Self::Text(wrapper) => wrapper.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Std(stream) => stream.flush(),
            Self::Binary(file) => file.flush(),
            Self::Text(wrapper) => wrapper.flush(),
        }
    }
}

/// Open a file or standard stream.
///
/// For a descriptor placeholder, this function returns standard output if the
/// mode is for writing and standard input otherwise. Since the caller must not
/// close those streams, the returned boolean is `false`.
///
/// For a path, this function opens the file with the given mode and returns
/// `true`. In text mode, the file transcodes with the options' encoding, which
/// defaults to the [argument encoding](argv_encoding), and error policy, which
/// defaults to [`ErrorPolicy::Strict`]. Binary mode ignores both.
///
/// If the options request an atomic write, the mode must be `w` or `w+`.
///
/// # Errors
///
/// This function fails with [`ErrorKind::InvalidMode`] for malformed modes
/// and atomic modes other than writing, with [`ErrorKind::UnknownEncoding`]
/// for unknown encodings, and with [`ErrorKind::Io`] if opening the file
/// fails.
pub fn open_stream<'a, T: Into<Target<'a>>>(
    target: T,
    mode: &str,
    options: &Options,
) -> Result<(Handle, bool)> {
    let open_mode: OpenMode = mode.parse()?;

    let path = match target.into() {
        Target::Descriptor(_) => {
            let stream = if open_mode.is_writing() {
                StdHandle::stdout()
            } else {
                StdHandle::stdin()
            };
            return Ok((Handle::Std(stream), false));
        }
        Target::Path(path) => path,
    };

    if options.atomic() {
        match open_mode.access() {
            Access::Write => (),
            Access::Append => {
                return Err(Error::new(ErrorKind::InvalidMode, "cannot append atomically"))
            }
            Access::Create => {
                return Err(Error::new(ErrorKind::InvalidMode, "cannot create atomically"))
            }
            Access::Read => {
                return Err(Error::new(ErrorKind::InvalidMode, "cannot read atomically"))
            }
        }
    }

    let text = if open_mode.is_binary() {
        None
    } else {
        let encoding = match options.encoding() {
            Some(label) => lookup(label)?,
            None => argv_encoding(),
        };
        Some((encoding, options.errors().unwrap_or(ErrorPolicy::Strict)))
    };

    let file = if options.atomic() {
        FileHandle::Atomic(AtomicFile::create(path, open_mode.is_update())?)
    } else {
        FileHandle::Plain(open_mode.options().open(path)?)
    };

    let handle = match text {
        None => Handle::Binary(file),
        Some((encoding, errors)) => Handle::Text(TextWrapper::new(file, encoding, errors)),
    };
    Ok((handle, true))
}

#[cfg(test)]
mod test {
    use super::*;
    use encoding_rs::WINDOWS_1252;

    #[test]
    fn test_open_mode() -> Result<()> {
        for (text, access, binary, update) in [
            ("r", Access::Read, false, false),
            ("rt", Access::Read, false, false),
            ("w+b", Access::Write, true, true),
            ("ab", Access::Append, true, false),
            ("x+", Access::Create, false, true),
        ] {
            let mode: OpenMode = text.parse()?;
            assert_eq!(mode.access(), access, "access of {}", text);
            assert_eq!(mode.is_binary(), binary, "binary for {}", text);
            assert_eq!(mode.is_update(), update, "update for {}", text);
        }

        for text in ["", "b", "rw", "rbt", "r++", "q"] {
            assert_eq!(
                text.parse::<OpenMode>().map_err(|e| e.kind()),
                Err(ErrorKind::InvalidMode),
                "mode {:?}",
                text
            );
        }
        Ok(())
    }

    #[test]
    fn test_target() {
        assert_eq!(Target::from("-"), Target::STDIO);
        assert_eq!(Target::from("out.txt"), Target::Path(Path::new("out.txt")));
        assert_eq!(Target::from(1), Target::Descriptor(1));
    }

    #[test]
    fn test_std_streams() -> Result<()> {
        let options = Options::default();

        let (handle, should_close) = open_stream("-", "w", &options)?;
        assert!(matches!(handle, Handle::Std(StdHandle::Stdout(_))));
        assert!(!should_close);

        let (handle, should_close) = open_stream(Target::STDIO, "rb", &options)?;
        assert!(matches!(handle, Handle::Std(StdHandle::Stdin(_))));
        assert!(!should_close);
        Ok(())
    }

    #[test]
    fn test_text_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("text.txt");
        let options = Options::builder().encoding("latin-1").build();

        let (mut handle, should_close) = open_stream(&path, "w", &options)?;
        assert!(should_close);
        assert!(!handle.is_binary());
        assert_eq!(handle.errors(), Some(ErrorPolicy::Strict));
        handle.write_all("Grüße".as_bytes())?;
        handle.close()?;
        assert_eq!(fs::read(&path)?, b"Gr\xfc\xdfe");

        let (mut handle, _) = open_stream(&path, "r", &options)?;
        let mut text = String::new();
        handle.read_to_string(&mut text)?;
        assert_eq!(text, "Grüße");
        if let Handle::Text(wrapper) = &handle {
            assert_eq!(wrapper.target_encoding(), WINDOWS_1252);
        }
        Ok(())
    }

    #[test]
    fn test_strict_text_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("strict.txt");
        let options = Options::builder().encoding("latin-1").build();

        let (mut handle, _) = open_stream(&path, "w", &options)?;
        let error = handle.write_all("日本".as_bytes()).unwrap_err();
        assert_eq!(error.kind(), std::io::ErrorKind::InvalidData);
        Ok(())
    }

    #[test]
    fn test_unwritable_encoding() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("wide.txt");
        fs::write(&path, "hello")?;

        for label in ["utf-16le", "utf-16be", "iso-2022-kr", "hz-gb-2312"] {
            let options = Options::builder().encoding(label).build();
            for mode in ["w", "r"] {
                assert_eq!(
                    open_stream(&path, mode, &options).map(|_| ()).map_err(|e| e.kind()),
                    Err(ErrorKind::UnknownEncoding),
                    "{} in mode {}",
                    label,
                    mode
                );
            }
        }

        // The file was neither truncated nor replaced.
        assert_eq!(fs::read_to_string(&path)?, "hello");
        Ok(())
    }

    #[test]
    fn test_binary_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("data.bin");
        let options = Options::builder().encoding("klingon").build();

        // Binary mode ignores the unknown encoding.
        let (mut handle, should_close) = open_stream(&path, "wb", &options)?;
        assert!(should_close);
        assert!(handle.is_binary());
        handle.write_all(b"\xff\x00\xfe")?;
        handle.close()?;
        assert_eq!(fs::read(&path)?, b"\xff\x00\xfe");

        assert_eq!(
            open_stream(&path, "r", &options).map(|_| ()).map_err(|e| e.kind()),
            Err(ErrorKind::UnknownEncoding)
        );
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let result = open_stream("/no/such/directory/file.txt", "r", &Options::default());
        assert_eq!(result.map(|_| ()).map_err(|e| e.kind()), Err(ErrorKind::Io));
    }

    #[test]
    fn test_atomic_commit() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(&path, "old")?;
        let options = Options::builder().atomic(true).build();

        let (mut handle, _) = open_stream(&path, "w", &options)?;
        handle.write_all(b"new")?;
        handle.flush()?;
        assert_eq!(fs::read_to_string(&path)?, "old");
        handle.close()?;
        assert_eq!(fs::read_to_string(&path)?, "new");
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_atomic_discard() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(&path, "old")?;
        let options = Options::builder().atomic(true).build();

        let (mut handle, _) = open_stream(&path, "wb", &options)?;
        handle.write_all(b"new")?;
        drop(handle);
        assert_eq!(fs::read_to_string(&path)?, "old");
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_atomic_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("fresh.txt");

        let mut file = AtomicFile::create(&path, false)?;
        assert!(file.temp_path().exists());
        assert!(file
            .temp_path()
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(".__atomic-write")));
        file.write_all(b"fresh")?;
        file.commit()?;
        assert!(file.is_committed());
        file.commit()?;
        assert_eq!(fs::read(&path)?, b"fresh");

        let error = file.write(b"more").unwrap_err();
        assert_eq!(error.kind(), std::io::ErrorKind::Other);
        Ok(())
    }

    #[test]
    fn test_atomic_modes() {
        let options = Options::builder().atomic(true).build();
        for mode in ["a", "x", "r", "r+"] {
            assert_eq!(
                open_stream("never-created.txt", mode, &options)
                    .map(|_| ())
                    .map_err(|e| e.kind()),
                Err(ErrorKind::InvalidMode),
                "mode {}",
                mode
            );
        }
        assert!(!Path::new("never-created.txt").exists());
    }

    #[test]
    fn test_default_text_encoding() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("plain.txt");

        let (handle, _) = open_stream(&path, "w", &Options::default())?;
        if let Handle::Text(wrapper) = &handle {
            assert_eq!(wrapper.target_encoding(), argv_encoding());
        } else {
            panic!("text mode should wrap file");
        }
        Ok(())
    }
}
