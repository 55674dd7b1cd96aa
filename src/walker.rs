use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::{Error, Result};

/// A file found under an ingestion root.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the root; used as the record key.
    pub key: String,
    pub path: PathBuf,
}

/// Extensions picked up when no include patterns are given.
const DEFAULT_EXTENSIONS: &[&str] = &["md", "txt"];

/// Which files under a root get ingested.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    include: Option<GlobSet>,
}

impl FileFilter {
    /// Build a filter from glob patterns matched against the relative path.
    /// An empty list falls back to `.md` and `.txt` files.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        if patterns.is_empty() {
            return Ok(Self::default());
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern.as_ref()).map_err(|e| {
                Error::InvalidArgument(format!(
                    "bad include pattern {:?}: {e}",
                    pattern.as_ref()
                ))
            })?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;
        Ok(Self { include: Some(set) })
    }

    pub fn accepts(&self, relative: &Path) -> bool {
        match &self.include {
            Some(set) => set.is_match(relative),
            None => relative
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| DEFAULT_EXTENSIONS.contains(&ext)),
        }
    }
}

/// Recursively collect files under `root` accepted by `filter`.
///
/// Hidden entries (names starting with `.`) are skipped. Symlinked
/// directories are not followed. Results are sorted by key.
pub fn discover_files(root: &Path, filter: &FileFilter) -> Result<Vec<SourceFile>> {
    let root = root.canonicalize()?;
    let mut files = Vec::new();
    walk_dir(&root, &root, filter, &mut files)?;
    files.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(files)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    filter: &FileFilter,
    files: &mut Vec<SourceFile>,
) -> Result<()> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk_dir(root, &path, filter, files)?;
            continue;
        }
        // Broken symlinks and links to directories are skipped.
        if file_type.is_symlink() && !path.is_file() {
            continue;
        }
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        if filter.accepts(relative) {
            files.push(SourceFile {
                key: relative.to_string_lossy().replace('\\', "/"),
                path: path.clone(),
            });
        }
    }
    Ok(())
}
