//! Artifact store — the on-disk directory tree holding originals and
//! thumbnails, addressed by opaque path strings.
//!
//! Local-disk artifact store: no object-storage backend, just plain files
//! under a configured root.

use std::path::{Path, PathBuf};

/// Write `data` to `full_path`, creating parent directories as needed.
pub async fn write(full_path: &Path, data: &[u8]) -> Result<(), std::io::Error> {
    if let Some(parent) = full_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(full_path, data).await
}

/// Read the full contents of a file from the artifact store.
pub async fn read(full_path: &Path) -> Result<Vec<u8>, std::io::Error> {
    tokio::fs::read(full_path).await
}

/// Remove a file from the artifact store. Missing files are tolerated.
pub async fn remove(full_path: &Path) -> Result<(), std::io::Error> {
    match tokio::fs::remove_file(full_path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Path for a freshly uploaded original: `{upload_dir}/{uuid7}.{ext}`.
pub fn original_path(upload_dir: &Path, uuid7_hex: &str, ext: &str) -> PathBuf {
    upload_dir.join(format!("{}.{}", uuid7_hex, ext))
}

/// Path for a thumbnail, preserving the original's basename under `thumbs/`.
pub fn thumb_path_for(upload_dir: &Path, original: &Path) -> PathBuf {
    let basename = original
        .file_name()
        .expect("artifact path always has a filename");
    upload_dir.join("thumbs").join(basename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thumb_path_mirrors_basename() {
        let upload_dir = Path::new("uploads");
        let original = Path::new("uploads/0198abc.jpg");
        assert_eq!(
            thumb_path_for(upload_dir, original),
            PathBuf::from("uploads/thumbs/0198abc.jpg")
        );
    }

    #[tokio::test]
    async fn write_read_remove_roundtrip() {
        let dir = tempfile_dir();
        let path = dir.join("nested").join("file.bin");
        write(&path, b"hello").await.unwrap();
        assert_eq!(read(&path).await.unwrap(), b"hello");
        remove(&path).await.unwrap();
        assert!(read(&path).await.is_err());
        // Removing again is a no-op, not an error.
        remove(&path).await.unwrap();
        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    fn tempfile_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("api-storage-test-{}", std::process::id()));
        dir
    }
}
