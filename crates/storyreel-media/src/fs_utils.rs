//! Filesystem utilities: cross-device moves and scratch directory hygiene.

use std::path::Path;
use std::time::{Duration, SystemTime};
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Move `src` to `dst`, creating the destination directory if needed.
///
/// Falls back to copy and delete when the two paths sit on different
/// filesystems, which is the usual case when moving out of a tmpfs work root.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let (src, dst) = (src.as_ref(), dst.as_ref());
    ensure_parent(dst).await?;

    match fs::rename(src, dst).await {
        Err(e) if e.raw_os_error() == Some(EXDEV) => {
            tracing::debug!(from = %src.display(), to = %dst.display(), "Rename crossed devices, copying");
            copy_across(src, dst).await
        }
        other => other.map_err(MediaError::from),
    }
}

/// Prefix shared by every per-compilation scratch directory.
pub const WORKDIR_PREFIX: &str = "storyreel-";

/// Scratch directory prefix for the current process.
pub fn work_prefix() -> String {
    format!("{}{}-", WORKDIR_PREFIX, std::process::id())
}

/// Delete scratch directories under `root` older than `max_age`.
///
/// Only entries whose names start with [`WORKDIR_PREFIX`] are considered, so
/// a shared work root is safe. A missing root counts as nothing to reap.
/// Returns the number of entries removed.
pub async fn reap_stale_workdirs(root: impl AsRef<Path>, max_age: Duration) -> MediaResult<usize> {
    let root = root.as_ref();
    let mut entries = match fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let now = SystemTime::now();
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_name().to_string_lossy().starts_with(WORKDIR_PREFIX) {
            continue;
        }

        let metadata = entry.metadata().await?;
        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age < max_age {
            continue;
        }

        let path = entry.path();
        let result = if metadata.is_dir() {
            fs::remove_dir_all(&path).await
        } else {
            fs::remove_file(&path).await
        };

        match result {
            Ok(()) => {
                tracing::info!("Removed stale work directory: {}", path.display());
                removed += 1;
            }
            Err(e) => tracing::warn!("Failed to remove stale work directory {}: {}", path.display(), e),
        }
    }

    Ok(removed)
}

/// `errno` for a rename across mount points.
const EXDEV: i32 = 18;

async fn ensure_parent(path: &Path) -> MediaResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(fs::create_dir_all(parent).await?),
        _ => Ok(()),
    }
}

/// Copy next to `dst` first so the final rename stays on one filesystem.
async fn copy_across(src: &Path, dst: &Path) -> MediaResult<()> {
    let staging = dst.with_extension("partial");

    if let Err(e) = fs::copy(src, &staging).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&staging, dst).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(path = %src.display(), error = %e, "Moved file but could not remove the source");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_creates_destination_dirs() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("compiled.mp4");
        let dst = dir.path().join("out").join("nested").join("story.mp4");
        fs::write(&src, b"frames").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"frames");
    }

    #[tokio::test]
    async fn test_move_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("images.zip");
        let dst = dir.path().join("previous.zip");
        fs::write(&src, b"fresh").await.unwrap();
        fs::write(&dst, b"stale").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert_eq!(fs::read(&dst).await.unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn test_move_missing_source() {
        let dir = TempDir::new().unwrap();
        let err = move_file(dir.path().join("absent.mp4"), dir.path().join("x.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Io(_)));
    }

    #[tokio::test]
    async fn test_copy_across_cleans_staging() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.mp3");
        let dst = dir.path().join("b.mp3");
        fs::write(&src, b"tone").await.unwrap();

        copy_across(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert!(!dst.with_extension("partial").exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"tone");
    }

    #[tokio::test]
    async fn test_reap_only_touches_prefixed_entries() {
        let root = TempDir::new().unwrap();
        let stale = root.path().join(format!("{}1234-abc", WORKDIR_PREFIX));
        let foreign = root.path().join("other-tool-cache");
        fs::create_dir_all(stale.join("nested")).await.unwrap();
        fs::create_dir_all(&foreign).await.unwrap();

        let removed = reap_stale_workdirs(root.path(), Duration::ZERO).await.unwrap();

        assert_eq!(removed, 1);
        assert!(!stale.exists());
        assert!(foreign.exists());
    }

    #[tokio::test]
    async fn test_reap_keeps_fresh_directories() {
        let root = TempDir::new().unwrap();
        let fresh = root.path().join(format!("{}99-live", WORKDIR_PREFIX));
        fs::create_dir_all(&fresh).await.unwrap();

        let removed = reap_stale_workdirs(root.path(), Duration::from_secs(3600))
            .await
            .unwrap();

        assert_eq!(removed, 0);
        assert!(fresh.exists());
    }

    #[tokio::test]
    async fn test_reap_missing_root() {
        let root = TempDir::new().unwrap();
        let missing = root.path().join("absent");
        assert_eq!(reap_stale_workdirs(&missing, Duration::ZERO).await.unwrap(), 0);
    }

    #[test]
    fn test_work_prefix_is_process_scoped() {
        let prefix = work_prefix();
        assert!(prefix.starts_with(WORKDIR_PREFIX));
        assert!(prefix.contains(&std::process::id().to_string()));
    }
}
