//! Sidecar caption files written next to their source images.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{BatchCaptionError, Result};

pub const DEFAULT_CAPTION_EXTENSION: &str = "txt";

/// Derive the sidecar path for `image_path`.
///
/// Only the file name is inspected, so dots in directory components never
/// matter. Everything after the last dot of the file name is replaced:
/// `shoot.v2.jpg` becomes `shoot.v2.txt`. A file name without any dot keeps
/// its full name and gains the extension (`README` becomes `README.txt`).
pub fn sidecar_path(image_path: &Path, extension: &str) -> Result<PathBuf> {
    let file_name = image_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| BatchCaptionError::Persistence {
            path: image_path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "image path has no UTF-8 file name",
            ),
        })?;

    let base = file_name
        .rfind('.')
        .map_or(file_name, |dot| &file_name[..dot]);

    Ok(image_path.with_file_name(format!("{base}.{extension}")))
}

#[derive(Debug, Clone)]
pub struct SidecarWriter {
    extension: String,
}

impl Default for SidecarWriter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPTION_EXTENSION)
    }
}

impl SidecarWriter {
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn sidecar_path(&self, image_path: &Path) -> Result<PathBuf> {
        sidecar_path(image_path, &self.extension)
    }

    /// Write `caption` (trimmed) to the sidecar of `image_path`, replacing any
    /// previous content. Returns the sidecar path.
    pub fn save(&self, image_path: &Path, caption: &str) -> Result<PathBuf> {
        let path = self.sidecar_path(image_path)?;
        fs::write(&path, caption.trim()).map_err(|source| BatchCaptionError::Persistence {
            path: path.clone(),
            source,
        })?;
        log::debug!("Saved caption to {}", path.display());
        Ok(path)
    }
}
