//! Exclusive advisory locks on sidecar `.lock` files.
//!
//! Zone and catalog files are replaced by rename on every write, so the lock
//! is taken on a separate file whose inode stays stable.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Lock file guarding `path`: the same path suffixed with `.lock`
pub fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

/// Held exclusive lock; released on drop
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Lock the sidecar of `target`, waiting on a blocking thread if another
    /// holder has it
    pub async fn acquire(target: &Path) -> io::Result<Self> {
        let path = lock_path(target);
        tokio::task::spawn_blocking(move || Self::acquire_blocking(path))
            .await
            .map_err(io::Error::other)?
    }

    fn acquire_blocking(path: PathBuf) -> io::Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                debug!("Waiting for lock on {}", path.display());
                file.lock_exclusive()?;
            }
            Err(e) => return Err(e),
        }

        trace!("Locked {}", path.display());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!("Failed to unlock {}: {}", self.path.display(), e);
        } else {
            trace!("Unlocked {}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path() {
        assert_eq!(
            lock_path(Path::new("/zones/example.com.db")),
            PathBuf::from("/zones/example.com.db.lock")
        );
    }

    #[tokio::test]
    async fn test_lock_excludes_second_holder() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("catalog.db");

        let first = FileLock::acquire(&target).await.unwrap();
        assert!(first.path().ends_with("catalog.db.lock"));

        let released = Arc::new(AtomicBool::new(false));
        let flag = released.clone();
        let waiter = tokio::spawn({
            let target = target.clone();
            async move {
                let _second = FileLock::acquire(&target).await.unwrap();
                flag.load(Ordering::SeqCst)
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        released.store(true, Ordering::SeqCst);
        drop(first);

        assert!(waiter.await.unwrap());
    }
}
