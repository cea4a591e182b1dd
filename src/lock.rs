//! Store-wide write lock and atomic file writes.
//!
//! Writers take an exclusive advisory lock (fs2/flock) on `.tl/lock`. The
//! lock is never waited on: a busy lock is reported as [`Error::LockBusy`]
//! and the caller decides whether to retry. Readers do not lock.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{Error, Result};

fn is_lock_contended(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }

    // On Windows, fs2/libc can surface lock/sharing violations as "Other".
    #[cfg(windows)]
    {
        matches!(err.raw_os_error(), Some(32) | Some(33))
    }
    #[cfg(not(windows))]
    {
        false
    }
}

/// Exclusive lock guard; released when dropped
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Take the lock or fail with `LockBusy`
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::try_acquire(path)?.ok_or_else(|| Error::LockBusy(path.to_path_buf()))
    }

    /// Try to take the lock without waiting
    ///
    /// Returns `Ok(Some(lock))` if acquired, `Ok(None)` if another holder
    /// has it, or `Err` for other errors. The lock file is created if
    /// missing and its contents are never touched.
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::trace!(path = %path.display(), "lock acquired");
                Ok(Some(FileLock {
                    file,
                    path: path.to_path_buf(),
                }))
            }
            Err(e) if is_lock_contended(&e) => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Unlock the file - ignore errors during drop
        let _ = self.file.unlock();
    }
}

/// Write to a temp file in the same directory, then rename over `path`.
pub fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension(format!(
        "{}.tmp.{}",
        path.extension().and_then(|e| e.to_str()).unwrap_or(""),
        std::process::id()
    ));

    let mut temp_file = File::create(&temp_path)?;
    temp_file.write_all(data)?;
    temp_file.sync_all()?;
    drop(temp_file);

    fs::rename(&temp_path, path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_file_lock_acquire_release() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("lock");

        let lock = FileLock::acquire(&lock_path).unwrap();
        assert!(lock_path.exists());
        assert!(FileLock::try_acquire(&lock_path).unwrap().is_none());

        drop(lock);

        assert!(FileLock::try_acquire(&lock_path).unwrap().is_some());
    }

    #[test]
    fn busy_lock_is_reported_not_waited_on() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("lock");

        let _lock = FileLock::acquire(&lock_path).unwrap();
        let result = FileLock::acquire(&lock_path);
        match result {
            Err(err @ Error::LockBusy(_)) => assert!(err.is_retryable()),
            other => panic!("expected LockBusy, got {other:?}"),
        }
    }

    #[test]
    fn lock_file_contents_are_left_alone() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("lock");
        fs::write(&lock_path, b"sentinel").unwrap();

        let lock = FileLock::acquire(&lock_path).unwrap();
        drop(lock);
        assert_eq!(fs::read(&lock_path).unwrap(), b"sentinel");
    }

    #[test]
    fn stress_single_lock_holder() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("lock");

        let threads = 12;
        let barrier = Arc::new(Barrier::new(threads));
        let in_lock = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));
        let acquired = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(threads);
        for _ in 0..threads {
            let barrier = Arc::clone(&barrier);
            let in_lock = Arc::clone(&in_lock);
            let max_concurrent = Arc::clone(&max_concurrent);
            let acquired = Arc::clone(&acquired);
            let lock_path = lock_path.clone();

            handles.push(thread::spawn(move || {
                barrier.wait();
                let _lock = loop {
                    match FileLock::try_acquire(&lock_path).unwrap() {
                        Some(lock) => break lock,
                        None => thread::sleep(Duration::from_millis(2)),
                    }
                };

                let current = in_lock.fetch_add(1, Ordering::SeqCst) + 1;
                let _ = max_concurrent.fetch_max(current, Ordering::SeqCst);

                thread::sleep(Duration::from_millis(10));

                in_lock.fetch_sub(1, Ordering::SeqCst);
                acquired.fetch_add(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(acquired.load(Ordering::SeqCst), threads);
        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_atomic_write() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("config.toml");

        write_atomic(&file_path, b"a = 1\n").unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "a = 1\n");

        write_atomic(&file_path, b"a = 2\n").unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "a = 2\n");
    }
}
