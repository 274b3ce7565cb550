use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Replace `path` with `contents` via a temporary file in the same
/// directory, so readers never see a partial file
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp_file = tempfile::Builder::new()
        .prefix(".zonesync")
        .tempfile_in(dir)?;
    tmp_file.as_file_mut().write_all(contents)?;
    tmp_file.as_file().sync_all()?;
    tmp_file.persist(path).map_err(|e| e.error)?;

    Ok(())
}

/// [`write_atomic`] on the blocking pool
pub async fn write_atomic_async(path: PathBuf, contents: Vec<u8>) -> io::Result<()> {
    tokio::task::spawn_blocking(move || write_atomic(&path, &contents))
        .await
        .map_err(io::Error::other)?
}

/// Remove a file, treating "not found" as success. Returns whether a file
/// was removed.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Sleep until the wall clock is in a later second than `path`'s mtime.
///
/// BIND compares modification times at one-second resolution; a file
/// rewritten within the same second would not be picked up on reload.
/// Missing files return immediately.
pub async fn wait_for_mtime_in_past(path: &Path) -> io::Result<()> {
    let modified = match tokio::fs::metadata(path).await {
        Ok(meta) => meta.modified()?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    let mtime = unix_secs(modified);

    loop {
        let now = SystemTime::now();
        let now_secs = unix_secs(now);
        if now_secs > mtime {
            return Ok(());
        }

        // Sleep to the start of the next whole second
        let into_second = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let wait = Duration::from_nanos(1_000_000_000 - u64::from(into_second))
            + Duration::from_secs(mtime - now_secs);
        debug!(
            "{} modified in the current second, sleeping {:?}",
            path.display(),
            wait
        );
        tokio::time::sleep(wait).await;
    }
}
