use rayon::prelude::*;
use tantivy::IndexWriter;

use crate::{
    engine::tantivy_engine::TantivyEngine,
    error::Result,
    walker::SourceFile,
};

/// Title of a document: its first markdown heading, else the file stem.
fn extract_title(content: &str, key: &str) -> String {
    content
        .lines()
        .filter_map(|line| line.trim().strip_prefix("# "))
        .map(str::trim)
        .find(|title| !title.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            std::path::Path::new(key)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("untitled")
                .to_string()
        })
}

/// Add `files` to the engine's index and commit.
///
/// Files are read in parallel; unreadable files are skipped with a warning.
/// Returns the number of documents written.
pub fn ingest_files(
    engine: &TantivyEngine,
    writer: &mut IndexWriter,
    files: &[SourceFile],
) -> Result<usize> {
    let loaded: Vec<_> = files
        .par_iter()
        .filter_map(|file| match std::fs::read_to_string(&file.path) {
            Ok(content) => {
                let title = extract_title(&content, &file.key);
                Some((file.key.as_str(), title, content))
            }
            Err(err) => {
                tracing::warn!(path = %file.path.display(), "skipping file: {err}");
                None
            }
        })
        .collect();

    for (key, title, content) in &loaded {
        engine.add_document(writer, key, title, content)?;
    }

    writer.commit()?;
    tracing::debug!(documents = loaded.len(), "committed batch");
    Ok(loaded.len())
}
