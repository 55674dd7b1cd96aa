use std::cell::{Cell, Ref, RefCell, RefMut};

use crate::{
    engine::{Engine, ObjectId, ObjectInfo, ObjectKind, RecordId, Status, TermId},
    error::{Error, Result},
    index_cursor::IndexCursor,
    options::{IndexCursorOptions, TableCursorOptions},
    posting::Posting,
    rc::ReturnCode,
    table_cursor::TableCursor,
};

/// A session with an engine.
///
/// The context owns the engine and the status slot every engine call
/// reports into. Cursors borrow the context, so they can never outlive it;
/// closing the context invalidates them instead.
pub struct Context<E: Engine> {
    engine: RefCell<E>,
    status: RefCell<Status>,
    closed: Cell<bool>,
}

impl<E: Engine> Context<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: RefCell::new(engine),
            status: RefCell::new(Status::default()),
            closed: Cell::new(false),
        }
    }

    /// Shared access to the engine, e.g. for engine-specific queries.
    ///
    /// Engine calls made while the guard is held fail with
    /// [`ReturnCode::ResourceBusy`].
    pub fn engine(&self) -> Ref<'_, E> {
        self.engine.borrow()
    }

    /// Exclusive access to the engine, e.g. to load data.
    ///
    /// Engine calls made while the guard is held fail with
    /// [`ReturnCode::ResourceBusy`].
    pub fn engine_mut(&self) -> RefMut<'_, E> {
        self.engine.borrow_mut()
    }

    /// The status left behind by the most recent engine call.
    pub fn last_status(&self) -> Status {
        self.status.borrow().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Close the session. Every cursor opened from it fails with
    /// [`Error::Closed`] afterwards. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        if self.closed.get() {
            return Ok(());
        }
        tracing::debug!("closing context");
        self.call(|engine, status| engine.close_database(status))?;
        self.closed.set(true);
        self.check()
    }

    /// Close a single table, lexicon or index.
    pub fn close_object(&self, id: ObjectId) -> Result<()> {
        self.ensure_open()?;
        self.call(|engine, status| engine.object_close(status, id))?;
        self.check()
    }

    pub fn lookup(&self, name: &str) -> Result<ObjectInfo> {
        self.ensure_open()?;
        let info = self.call(|engine, status| engine.object(status, name))?;
        self.check()?;
        info.ok_or_else(|| Error::NotFound {
            kind: "object",
            name: name.to_string(),
        })
    }

    pub fn object_info(&self, id: ObjectId) -> Result<ObjectInfo> {
        self.ensure_open()?;
        let info = self.call(|engine, status| engine.object_info(status, id))?;
        self.check()?;
        info.ok_or_else(|| Error::NotFound {
            kind: "object",
            name: id.0.to_string(),
        })
    }

    /// Resolve a term of the index's lexicon. `None` when the term is not
    /// indexed.
    pub fn term_id(&self, index: ObjectId, key: &[u8]) -> Result<Option<TermId>> {
        self.ensure_open()?;
        let id = self.call(|engine, status| engine.term_id(status, index, key))?;
        self.check()?;
        Ok((id != 0).then_some(id))
    }

    pub fn record_key(
        &self,
        table: ObjectId,
        id: RecordId,
    ) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        self.ensure_object_open(table)?;
        let key =
            self.call(|engine, status| engine.record_key(status, table, id))?;
        self.check()?;
        Ok(key)
    }

    pub fn open_table_cursor(
        &self,
        table: ObjectId,
        options: &TableCursorOptions,
    ) -> Result<TableCursor<'_, E>> {
        TableCursor::open(self, table, options)
    }

    pub fn open_index_cursor(
        &self,
        index: ObjectId,
        term: TermId,
        options: &IndexCursorOptions,
    ) -> Result<IndexCursor<'_, E>> {
        let info = self.object_info(index)?;
        let ObjectKind::Index { source, lexicon, .. } = info.kind else {
            return Err(Error::InvalidArgument(format!(
                "{} is not an index",
                info.name
            )));
        };
        IndexCursor::open(self, index, source, lexicon, term, options)
    }

    /// Open a table cursor, run `f` with it and close it on every exit path.
    pub fn with_table_cursor<T>(
        &self,
        table: ObjectId,
        options: &TableCursorOptions,
        f: impl FnOnce(&mut TableCursor<'_, E>) -> Result<T>,
    ) -> Result<T> {
        let mut cursor = self.open_table_cursor(table, options)?;
        let result = f(&mut cursor);
        let closed = cursor.close();
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Open an index cursor, run `f` with it and close it on every exit
    /// path.
    pub fn with_index_cursor<T>(
        &self,
        index: ObjectId,
        term: TermId,
        options: &IndexCursorOptions,
        f: impl FnOnce(&mut IndexCursor<'_, E>) -> Result<T>,
    ) -> Result<T> {
        let mut cursor = self.open_index_cursor(index, term, options)?;
        let result = f(&mut cursor);
        let closed = cursor.close();
        let value = result?;
        closed?;
        Ok(value)
    }

    /// All postings of `term`, each an independent snapshot.
    pub fn postings(
        &self,
        index: ObjectId,
        term: TermId,
        options: &IndexCursorOptions,
    ) -> Result<Vec<Posting>> {
        self.open_index_cursor(index, term, options)?.collect()
    }

    /// Run one engine call against a freshly reset status.
    ///
    /// Fails without reaching the engine while a guard from
    /// [`Context::engine`] or [`Context::engine_mut`] is alive.
    pub(crate) fn call<T>(
        &self,
        f: impl FnOnce(&mut E, &mut Status) -> T,
    ) -> Result<T> {
        let mut status = self.status.borrow_mut();
        status.reset();
        let Ok(mut engine) = self.engine.try_borrow_mut() else {
            let err = engine_busy();
            status.fail(&err);
            return Err(err);
        };
        Ok(f(&mut *engine, &mut *status))
    }

    /// Translate the status of the last call into a `Result`.
    pub(crate) fn check(&self) -> Result<()> {
        let status = self.status.borrow();
        if status.is_error() {
            return Err(Error::Native {
                rc: status.rc,
                message: status.message.clone(),
            });
        }
        Ok(())
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed.get() {
            return Err(Error::Closed { kind: "context" });
        }
        Ok(())
    }

    pub(crate) fn ensure_object_open(&self, id: ObjectId) -> Result<()> {
        let engine = self.engine.try_borrow().map_err(|_| engine_busy())?;
        if !engine.object_is_open(id) {
            return Err(Error::Closed { kind: "object" });
        }
        Ok(())
    }
}

fn engine_busy() -> Error {
    Error::Native {
        rc: ReturnCode::ResourceBusy,
        message: "engine is borrowed outside the context".into(),
    }
}

impl<E: Engine> std::fmt::Debug for Context<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("closed", &self.closed.get())
            .finish_non_exhaustive()
    }
}
