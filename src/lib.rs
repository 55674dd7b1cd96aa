//! postcursor - safe cursors over the tables and inverted indexes of a
//! full-text engine.
//!
//! All access goes through a [`Context`], which owns an [`Engine`]
//! implementation and the status of its last call. Cursors borrow the
//! context, release their engine cursor exactly once (explicitly or on
//! drop), and refuse to touch the engine once the context or the object
//! they were opened on has been closed.
//!
//! Two engines ship with the crate: [`MemoryEngine`], an in-process engine
//! that is easy to script, and [`TantivyEngine`], which serves a tantivy
//! index of text documents.
//!
//! # Quick start
//!
//! ```no_run
//! use postcursor::{Context, DataDir, IndexCursorOptions, PostingMode, TantivyEngine};
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let engine = data_dir.open_engine().unwrap();
//! let ctx = Context::new(engine);
//!
//! let index = ctx.lookup(TantivyEngine::INDEX_NAME).unwrap().id;
//! if let Some(term) = ctx.term_id(index, b"rust").unwrap() {
//!     let mut cursor = ctx
//!         .open_index_cursor(index, term, &IndexCursorOptions::with_position())
//!         .unwrap();
//!     for posting in cursor.each(PostingMode::Snapshot).unwrap() {
//!         let posting = posting.unwrap().get();
//!         println!("{} @ {}", posting.record_id, posting.position);
//!     }
//! }
//! ```

pub mod cli;
pub mod context;
mod cursor;
pub mod data_dir;
pub mod engine;
pub mod error;
pub mod index_cursor;
pub mod ingestion;
pub mod options;
pub mod posting;
pub mod rc;
pub mod table_cursor;
pub mod walker;

pub use context::Context;
pub use data_dir::DataDir;
pub use engine::{
    Engine,
    memory::MemoryEngine,
    tantivy_engine::TantivyEngine,
};
pub use error::{Error, Result};
pub use index_cursor::{CursorState, Each, IndexCursor};
pub use options::{IndexCursorOptions, PostingMode, TableCursorOptions};
pub use posting::{Posting, PostingHandle, Record};
pub use rc::ReturnCode;
pub use table_cursor::{Records, TableCursor};
