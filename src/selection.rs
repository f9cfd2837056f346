use std::path::PathBuf;

use rfd::FileDialog;
use walkdir::WalkDir;

use crate::errors::{BatchCaptionError, Result};
use crate::loader::FormatLoader;
use crate::orchestrator::{Selection, SelectionBatch};
use crate::traits::SelectionProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    pub name: String,
    pub extensions: Vec<String>,
}

/// Picker filters derived from the loader registry: all supported formats
/// first, then one entry per format kind, then everything.
pub fn file_filters(loader: &FormatLoader) -> Vec<FileFilter> {
    let mut filters = Vec::new();
    let mut all = Vec::new();
    let mut per_kind = Vec::new();

    for kind in loader.kinds() {
        let extensions = loader.extensions_for(kind);
        all.extend(extensions.iter().cloned());
        per_kind.push(FileFilter {
            name: kind.label().to_string(),
            extensions,
        });
    }

    filters.push(FileFilter {
        name: "All supported formats".to_string(),
        extensions: all,
    });
    filters.extend(per_kind);
    filters.push(FileFilter {
        name: "All files".to_string(),
        extensions: vec!["*".to_string()],
    });
    filters
}

/// Native multi-file picker. Closing the dialog cancels the session.
pub struct FileDialogSelection {
    filters: Vec<FileFilter>,
}

impl FileDialogSelection {
    pub fn new(loader: &FormatLoader) -> Self {
        Self {
            filters: file_filters(loader),
        }
    }
}

impl SelectionProvider for FileDialogSelection {
    fn request_batch(&mut self) -> Result<Selection> {
        let mut dialog = FileDialog::new().set_title("Select images");
        for filter in &self.filters {
            dialog = dialog.add_filter(filter.name.as_str(), filter.extensions.as_slice());
        }

        Ok(match dialog.pick_files() {
            Some(paths) if !paths.is_empty() => Selection::Batch(SelectionBatch::new(paths)),
            _ => Selection::Cancelled,
        })
    }
}

/// Headless selection: a single batch built from the given paths.
///
/// Files are kept in the order given. Directories are walked recursively and
/// contribute their supported files in sorted order.
pub struct PathListSelection {
    pending: Option<Vec<PathBuf>>,
    loader: FormatLoader,
}

impl PathListSelection {
    pub fn new(paths: Vec<PathBuf>, loader: FormatLoader) -> Self {
        Self {
            pending: Some(paths),
            loader,
        }
    }

    fn expand(&self, paths: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
        let mut expanded = Vec::new();

        for path in paths {
            if !path.is_dir() {
                expanded.push(path);
                continue;
            }

            let mut found = Vec::new();
            for entry in WalkDir::new(&path) {
                let entry = entry.map_err(|e| BatchCaptionError::Selection {
                    source: Box::new(e),
                })?;
                if entry.file_type().is_file() && self.loader.supports(entry.path()) {
                    found.push(entry.into_path());
                }
            }
            found.sort();
            expanded.extend(found);
        }

        Ok(expanded)
    }
}

impl SelectionProvider for PathListSelection {
    fn request_batch(&mut self) -> Result<Selection> {
        match self.pending.take() {
            Some(paths) => Ok(Selection::Batch(SelectionBatch::new(self.expand(paths)?))),
            None => Ok(Selection::Cancelled),
        }
    }
}
