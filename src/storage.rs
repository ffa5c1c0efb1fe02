use crate::config::Config;
use crate::uri;
use autocrop_vision::{codec, EncodeError};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Transient detect/process outputs.
pub const PROCESSED_DIR: &str = "ProcessedFaces";
/// Outputs the user chose to keep.
pub const SAVED_DIR: &str = "SavedFaces";
pub const SAVED_PREFIX: &str = "saved_face";

const OUTPUT_EXT: &str = "jpg";
const HISTORY_EXTS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Error)]
pub enum DirError {
    #[error("failed to create directory {}: {source}", .path.display())]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Dir(#[from] DirError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("failed to copy {} to {}: {source}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Which code path produced an output file; used as the file name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Detected,
    Processed,
    Fallback,
    FallbackProcessed,
    ErrorFallback,
    Full,
}

impl OutputKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            OutputKind::Detected => "detected",
            OutputKind::Processed => "processed",
            OutputKind::Fallback => "fallback",
            OutputKind::FallbackProcessed => "fallback_processed",
            OutputKind::ErrorFallback => "error_fallback",
            OutputKind::Full => "full",
        }
    }
}

/// An entry of the saved-faces history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFace {
    pub name: String,
    pub path: PathBuf,
    pub uri: String,
    pub modified: SystemTime,
}

/// Create `path` and its parents; an existing directory is not an error.
pub fn ensure_dir(path: &Path) -> Result<(), DirError> {
    std::fs::create_dir_all(path).map_err(|source| DirError::IoFailure {
        path: path.to_path_buf(),
        source,
    })
}

/// File layout under the data root and the only code that names files.
#[derive(Debug, Clone)]
pub struct StorageGateway {
    processed_dir: PathBuf,
    saved_dir: PathBuf,
    quality: u8,
}

impl StorageGateway {
    pub fn new(data_root: &Path, quality: u8) -> Self {
        let root = absolutize(data_root);
        Self {
            processed_dir: root.join(PROCESSED_DIR),
            saved_dir: root.join(SAVED_DIR),
            quality,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(&cfg.data_root, cfg.jpeg_quality)
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    pub fn saved_dir(&self) -> &Path {
        &self.saved_dir
    }

    /// Create both output directories.
    pub fn ensure_layout(&self) -> Result<(), DirError> {
        ensure_dir(&self.processed_dir)?;
        ensure_dir(&self.saved_dir)
    }

    /// Encode `image` into `directory` as `{prefix}_{unix_millis}.jpg` and
    /// return the absolute path. The encoder rejects empty files.
    pub fn write(
        &self,
        image: &RgbaImage,
        directory: &Path,
        prefix: &str,
    ) -> Result<PathBuf, StorageError> {
        ensure_dir(directory)?;
        let path = absolutize(&unique_path(directory, prefix, OUTPUT_EXT));
        codec::encode(image, &path, self.quality)?;
        log::debug!(
            "saved {}x{} output to {}",
            image.width(),
            image.height(),
            path.display()
        );
        Ok(path)
    }

    pub fn write_output(&self, image: &RgbaImage, kind: OutputKind) -> Result<PathBuf, StorageError> {
        self.write(image, &self.processed_dir, kind.prefix())
    }

    /// Copy a produced output (path or `file://` URI) into the saved
    /// directory as `saved_face_{unix_millis}.jpg`.
    pub fn promote(&self, output: &str) -> Result<PathBuf, StorageError> {
        let from = PathBuf::from(uri::strip_file_scheme(output));
        ensure_dir(&self.saved_dir)?;
        let to = absolutize(&unique_path(&self.saved_dir, SAVED_PREFIX, OUTPUT_EXT));

        std::fs::copy(&from, &to).map_err(|source| StorageError::Copy {
            from: from.clone(),
            to: to.clone(),
            source,
        })?;
        log::info!("saved {} as {}", from.display(), to.display());
        Ok(to)
    }

    /// Saved faces, newest first. A missing directory is an empty history.
    pub fn saved_history(&self) -> Result<Vec<SavedFace>, StorageError> {
        let read_err = |source: std::io::Error| StorageError::Read {
            path: self.saved_dir.clone(),
            source,
        };
        if !self.saved_dir.exists() {
            return Ok(vec![]);
        }

        let mut history = Vec::new();
        for entry in std::fs::read_dir(&self.saved_dir).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_saved_face(&name) {
                continue;
            }
            let metadata = entry.metadata().map_err(read_err)?;
            if !metadata.is_file() {
                continue;
            }
            let path = entry.path();
            history.push(SavedFace {
                uri: uri::to_file_uri(&path),
                name,
                path,
                modified: metadata.modified().unwrap_or(UNIX_EPOCH),
            });
        }

        history.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.name.cmp(&a.name))
        });
        Ok(history)
    }
}

fn is_saved_face(name: &str) -> bool {
    let Some(rest) = name.strip_prefix(SAVED_PREFIX).and_then(|r| r.strip_prefix('_')) else {
        return false;
    };
    match rest.rsplit_once('.') {
        Some((_, ext)) => HISTORY_EXTS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// `{prefix}_{millis}.{ext}` in `dir`, bumping the timestamp while the name
/// is taken so that files are never overwritten.
fn unique_path(dir: &Path, prefix: &str, ext: &str) -> PathBuf {
    let mut millis = unix_millis();
    loop {
        let candidate = dir.join(format!("{prefix}_{millis}.{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        millis += 1;
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn tile() -> RgbaImage {
        RgbaImage::from_pixel(16, 12, Rgba([40, 90, 200, 255]))
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(OutputKind::FallbackProcessed.prefix(), "fallback_processed");
        assert_eq!(OutputKind::ErrorFallback.prefix(), "error_fallback");
        assert_eq!(OutputKind::Full.prefix(), "full");
    }

    #[test]
    fn test_ensure_dir_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a").join("b");
        ensure_dir(&target).unwrap();
        ensure_dir(&target).unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn test_ensure_dir_over_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(ensure_dir(&file), Err(DirError::IoFailure { .. })));
    }

    #[test]
    fn test_write_names_and_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageGateway::new(dir.path(), 95);

        let first = storage.write_output(&tile(), OutputKind::Processed).unwrap();
        let second = storage.write_output(&tile(), OutputKind::Processed).unwrap();
        assert_ne!(first, second);

        for path in [&first, &second] {
            assert!(path.is_absolute());
            assert!(path.starts_with(storage.processed_dir()));
            let name = path.file_name().unwrap().to_str().unwrap();
            let stamp = name
                .strip_prefix("processed_")
                .and_then(|rest| rest.strip_suffix(".jpg"))
                .unwrap();
            assert!(stamp.parse::<u128>().is_ok(), "{name}");
            assert!(std::fs::metadata(path).unwrap().len() > 0);
        }
    }

    #[test]
    fn test_promote_and_history() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageGateway::new(dir.path(), 95);
        storage.ensure_layout().unwrap();
        assert!(storage.saved_history().unwrap().is_empty());

        let output = storage.write_output(&tile(), OutputKind::Detected).unwrap();
        let first = storage.promote(&uri::to_file_uri(&output)).unwrap();
        let second = storage.promote(output.to_str().unwrap()).unwrap();
        std::fs::write(storage.saved_dir().join("notes.txt"), b"ignored").unwrap();

        let history = storage.saved_history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].path, second);
        assert_eq!(history[1].path, first);
        assert!(history[0].name.starts_with("saved_face_"));
        assert!(history[0].uri.starts_with("file://"));
    }

    #[test]
    fn test_promote_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageGateway::new(dir.path(), 95);
        let err = storage.promote("file:///nonexistent/autocrop/out.jpg").unwrap_err();
        assert!(matches!(err, StorageError::Copy { .. }));
    }

    #[test]
    fn test_saved_face_filter() {
        assert!(is_saved_face("saved_face_1700000000000.jpg"));
        assert!(is_saved_face("saved_face_1.PNG"));
        assert!(!is_saved_face("processed_1.jpg"));
        assert!(!is_saved_face("saved_face_1.gif"));
        assert!(!is_saved_face("saved_faces"));
    }
}
