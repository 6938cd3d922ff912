//! Helper module with shared and cached streams.
//!
//! [`CachedStream`] memoizes the construction of wrapped streams per process.
//! Since the cache is keyed by process ID, a forked child process does not
//! reuse its parent's wrappers but creates its own.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::err::Result;
use crate::opt::Options;

/// A shared, lock-protected stream.
///
/// Clones refer to the same stream. Reading and writing through the shared
/// stream acquires the lock for the duration of each call. Use
/// [`Shared::lock`] to hold the lock across several calls.
#[derive(Debug)]
pub struct Shared<T>(Arc<Mutex<T>>);

impl<T> Shared<T> {
    /// Share the value.
    pub fn new(value: T) -> Self {
        Self(Arc::new(Mutex::new(value)))
    }

    /// Lock the shared value.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock()
    }

    /// Determine whether both refer to the same value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: Read> Read for Shared<T> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.lock().read(buf)
    }
}

impl<T: Write> Write for Shared<T> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.0.lock().write_all(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.lock().flush()
    }
}

// ------------------------------------------------------------------------------------------------

/// A factory of wrapped streams that caches the result per process.
///
/// The first access within a process creates the underlying stream with the
/// factory and wraps it with the wrapper. All later accesses within the same
/// process return the cached stream, ignoring their options. The cache is
/// populated while holding a lock, so that concurrent first accesses create
/// only one wrapped stream.
pub struct CachedStream<S, T> {
    factory: fn() -> S,
    wrapper: fn(S, &Options) -> Result<T>,
    entries: Mutex<HashMap<u32, Shared<T>>>,
}

impl<S, T> CachedStream<S, T> {
    /// Create a new cached stream.
    ///
    /// # Deadlocks
    ///
    /// The factory and wrapper run while the cache's lock is held. Since that
    /// lock is not reentrant, they must not access the same cached stream.
    pub fn new(factory: fn() -> S, wrapper: fn(S, &Options) -> Result<T>) -> Self {
        Self {
            factory,
            wrapper,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get the wrapped stream for the current process.
    pub fn get(&self, options: &Options) -> Result<Shared<T>> {
        self.get_for_process(std::process::id(), options)
    }

    /// Get the wrapped stream for the process with the given ID.
    pub fn get_for_process(&self, pid: u32, options: &Options) -> Result<Shared<T>> {
        let mut entries = self.entries.lock();
        if let Some(stream) = entries.get(&pid) {
            return Ok(stream.clone());
        }

        let stream = Shared::new((self.wrapper)((self.factory)(), options)?);
        entries.insert(pid, stream.clone());
        tracing::debug!(pid, "cached wrapped stream");
        Ok(stream)
    }

    /// Determine whether a wrapped stream has been cached for the process.
    pub fn contains(&self, pid: u32) -> bool {
        self.entries.lock().contains_key(&pid)
    }
}

impl<S, T> std::fmt::Debug for CachedStream<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut pids: Vec<u32> = self.entries.lock().keys().copied().collect();
        pids.sort_unstable();
        f.debug_struct("CachedStream").field("pids", &pids).finish()
    }
}

#[cfg(test)]
mod test {
    use super::{CachedStream, Shared};
    use crate::err::{Error, ErrorKind, Result};
    use crate::opt::Options;
    use crate::test_util::FakeStream;
    use std::io::Write;
    use std::sync::OnceLock;

    fn wrap(stream: FakeStream, options: &Options) -> Result<FakeStream> {
        match options.encoding() {
            Some("klingon") => Err(Error::new(ErrorKind::UnknownEncoding, "klingon")),
            _ => Ok(stream),
        }
    }

    #[test]
    fn test_same_process() -> Result<()> {
        let cache = CachedStream::new(FakeStream::new, wrap);
        let options = Options::default();

        let s1 = cache.get(&options)?;
        let s2 = cache.get(&options)?;
        assert!(s1.ptr_eq(&s2));
        assert!(cache.contains(std::process::id()));
        Ok(())
    }

    #[test]
    fn test_different_process() -> Result<()> {
        let cache = CachedStream::new(FakeStream::new, wrap);
        let options = Options::default();

        let parent = cache.get_for_process(665, &options)?;
        let child = cache.get_for_process(666, &options)?;
        assert!(!parent.ptr_eq(&child));
        assert!(parent.ptr_eq(&cache.get_for_process(665, &options)?));
        assert!(child.ptr_eq(&cache.get_for_process(666, &options)?));
        Ok(())
    }

    #[test]
    fn test_failure_is_not_cached() -> Result<()> {
        let cache = CachedStream::new(FakeStream::new, wrap);
        let bad = Options::builder().encoding("klingon").build();

        assert!(cache.get_for_process(42, &bad).is_err());
        assert!(!cache.contains(42));
        let stream = cache.get_for_process(42, &Options::default())?;

        // Later options are ignored.
        assert!(stream.ptr_eq(&cache.get_for_process(42, &bad)?));
        Ok(())
    }

    static OBSERVED: OnceLock<CachedStream<FakeStream, bool>> = OnceLock::new();

    fn observe_lock(_stream: FakeStream, _options: &Options) -> Result<bool> {
        Ok(OBSERVED
            .get()
            .is_some_and(|cache| cache.entries.try_lock().is_none()))
    }

    #[test]
    fn test_wrapper_runs_under_lock() -> Result<()> {
        let cache = OBSERVED.get_or_init(|| CachedStream::new(FakeStream::new, observe_lock));
        let held = cache.get_for_process(7, &Options::default())?;
        assert!(*held.lock(), "wrapper should run while the cache is locked");
        assert!(cache.entries.try_lock().is_some());
        Ok(())
    }

    #[test]
    fn test_shared_write() -> std::io::Result<()> {
        let shared = Shared::new(FakeStream::new());
        let mut alias = shared.clone();
        alias.write_all(b"via alias")?;
        alias.flush()?;
        assert_eq!(shared.lock().data(), b"via alias");
        assert_eq!(shared.lock().flushes(), 1);
        Ok(())
    }
}
