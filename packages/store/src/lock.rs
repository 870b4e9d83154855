//! Advisory exclusive file locks with bounded retries.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::StoreError;

/// How a locked file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Read only. The file must exist.
    Read,
    /// Read and write, creating the file if needed. Existing content is kept.
    ReadWrite,
}

/// Retry budget for non-blocking lock attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            backoff: Duration::from_millis(2),
        }
    }
}

impl LockPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }
}

/// An open file holding an exclusive advisory lock.
///
/// The lock is released and the handle closed when the value is dropped,
/// whichever way the holder exits.
#[derive(Debug)]
pub struct LockedFile {
    file: File,
    path: PathBuf,
}

impl LockedFile {
    /// Open `path` and take an exclusive lock on it.
    ///
    /// Fails with [`StoreError::LockTimeout`] once `policy.attempts` attempts
    /// have been refused; the handle is closed before returning.
    pub async fn acquire(
        path: impl AsRef<Path>,
        mode: LockMode,
        policy: LockPolicy,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let file = open(path, mode).await?;
        let attempts = policy.attempts.max(1);

        for attempt in 1..=attempts {
            if try_flock_exclusive(&file)? {
                tracing::debug!("Locked {:?} (attempt {})", path, attempt);
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                });
            }
            if attempt < attempts {
                tokio::time::sleep(policy.backoff).await;
            }
        }

        drop(file);
        Err(StoreError::LockTimeout {
            path: path.to_path_buf(),
            attempts,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole file from the start.
    pub async fn read_all(&mut self) -> Result<Vec<u8>, StoreError> {
        self.file.seek(SeekFrom::Start(0)).await?;
        let mut buf = Vec::new();
        self.file.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Truncate the file and write `bytes` as its only content.
    pub async fn replace(&mut self, bytes: &[u8]) -> Result<(), StoreError> {
        self.file.set_len(0).await?;
        self.file.seek(SeekFrom::Start(0)).await?;
        self.file.write_all(bytes).await?;
        self.file.flush().await?;
        self.file.sync_data().await?;
        Ok(())
    }

    /// Release the lock and close the file.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        unlock(&self.file);
        tracing::debug!("Unlocked {:?}", self.path);
    }
}

async fn open(path: &Path, mode: LockMode) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    match mode {
        LockMode::Read => options.read(true),
        LockMode::ReadWrite => options.read(true).write(true).create(true).truncate(false),
    };
    options.open(path).await
}

/// Try to acquire an exclusive flock on a file (non-blocking).
///
/// Returns `Ok(false)` if the file is already locked elsewhere. Targets
/// without `flock` get an `Unsupported` error rather than an unguarded store.
fn try_flock_exclusive(file: &File) -> std::io::Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: the descriptor is owned by `file` and stays open for the call.
        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if result == 0 {
            return Ok(true);
        }
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::WouldBlock
            || err.raw_os_error() == Some(libc::EWOULDBLOCK)
        {
            return Ok(false);
        }
        Err(err)
    }
    #[cfg(not(unix))]
    {
        let _ = file;
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "advisory file locks require a unix target",
        ))
    }
}

fn unlock(file: &File) {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: see `try_flock_exclusive`.
        unsafe {
            libc::flock(file.as_raw_fd(), libc::LOCK_UN);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = file;
    }
}
