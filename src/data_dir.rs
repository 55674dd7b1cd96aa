//! Where the command line keeps its tantivy index.

use std::path::{Path, PathBuf};

use crate::{
    engine::tantivy_engine::TantivyEngine,
    error::{Error, Result},
};

pub const DATA_DIR_ENV: &str = "POSTCURSOR_DATA_DIR";

const INDEX_DIR: &str = "index";

/// A data directory and the index stored inside it.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
    index: PathBuf,
}

impl DataDir {
    /// Pick the data directory and make sure its index directory exists.
    ///
    /// `explicit` (from `--data-dir`) wins over `POSTCURSOR_DATA_DIR`, which
    /// wins over the XDG data home. An empty variable counts as unset.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = match explicit {
            Some(path) => path.to_path_buf(),
            None => default_root()?,
        };
        let index = root.join(INDEX_DIR);
        std::fs::create_dir_all(&index)
            .map_err(|_| Error::DataDir(index.clone()))?;
        tracing::debug!(path = %index.display(), "resolved index directory");
        Ok(Self { root, index })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_dir(&self) -> &Path {
        &self.index
    }

    /// Open the engine over this directory's index. The first open creates
    /// an empty index.
    pub fn open_engine(&self) -> Result<TantivyEngine> {
        TantivyEngine::open(&self.index)
    }
}

fn default_root() -> Result<PathBuf> {
    if let Some(dir) =
        std::env::var_os(DATA_DIR_ENV).filter(|value| !value.is_empty())
    {
        return Ok(PathBuf::from(dir));
    }
    xdg::BaseDirectories::with_prefix("postcursor")
        .get_data_home()
        .ok_or_else(|| {
            Error::Config("could not determine XDG data home directory".into())
        })
}
