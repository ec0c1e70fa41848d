//! Image archive creation.

use std::fs::File;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{WorkerError, WorkerResult};

/// Zip `files` (flat, by file name) into `dest`.
///
/// Images are already compressed, so entries are stored as-is. A partially
/// written archive is removed on failure.
pub async fn write_zip(files: Vec<PathBuf>, dest: PathBuf) -> WorkerResult<PathBuf> {
    tokio::task::spawn_blocking(move || match write_zip_blocking(&files, &dest) {
        Ok(()) => Ok(dest),
        Err(e) => {
            let _ = std::fs::remove_file(&dest);
            Err(e)
        }
    })
    .await
    .map_err(|e| WorkerError::processing_failed(format!("archive task failed: {}", e)))?
}

fn write_zip_blocking(files: &[PathBuf], dest: &Path) -> WorkerResult<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut zip = ZipWriter::new(File::create(dest)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| WorkerError::invalid_input(format!("not a file: {}", path.display())))?;
        zip.start_file(name, options)?;
        std::io::copy(&mut File::open(path)?, &mut zip)?;
    }

    zip.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_archive_contains_files_by_name() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("image_001.png");
        let b = dir.path().join("image_003.jpg");
        std::fs::write(&a, b"first").unwrap();
        std::fs::write(&b, b"second").unwrap();

        let dest = dir.path().join("out").join("generated_images_job.zip");
        let written = write_zip(vec![a, b], dest.clone()).await.unwrap();
        assert_eq!(written, dest);

        let mut archive = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        assert_eq!(archive.by_index(0).unwrap().name(), "image_001.png");
        assert_eq!(archive.by_index(1).unwrap().name(), "image_003.jpg");
    }

    #[tokio::test]
    async fn test_missing_input_removes_partial_archive() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("broken.zip");

        let err = write_zip(vec![dir.path().join("absent.png")], dest.clone())
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::Io(_)));
        assert!(!dest.exists());
    }
}
