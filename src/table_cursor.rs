use std::iter::FusedIterator;

use crate::{
    context::Context,
    cursor::CursorResource,
    engine::{CursorId, Engine, NIL, ObjectId},
    error::Result,
    options::TableCursorOptions,
    posting::Record,
};

/// Forward-only cursor over the records of a table.
pub struct TableCursor<'ctx, E: Engine> {
    resource: CursorResource<'ctx, E>,
    exhausted: bool,
}

impl<'ctx, E: Engine> TableCursor<'ctx, E> {
    pub(crate) fn open(
        ctx: &'ctx Context<E>,
        table: ObjectId,
        options: &TableCursorOptions,
    ) -> Result<Self> {
        let args = options.build()?;
        ctx.ensure_open()?;
        ctx.ensure_object_open(table)?;
        let handle = ctx.call(|engine, status| {
            engine.table_cursor_open(status, table, &args)
        })?;
        let resource =
            CursorResource::from_open(ctx, handle, table, "table cursor")?;
        Ok(Self {
            resource,
            exhausted: false,
        })
    }

    pub fn table(&self) -> ObjectId {
        self.resource.owner()
    }

    pub fn is_closed(&self) -> bool {
        self.resource.is_closed()
    }

    pub fn native_id(&self) -> Option<CursorId> {
        self.resource.native_id()
    }

    pub fn close(&mut self) -> Result<()> {
        self.resource.close()
    }

    /// The next record, or `None` at the end of the table.
    pub fn next(&mut self) -> Result<Option<Record>> {
        let handle = self.resource.live()?;
        if self.exhausted {
            return Ok(None);
        }
        let ctx = self.resource.ctx();
        let id = ctx
            .call(|engine, status| engine.table_cursor_next(status, handle))?;
        if let Err(err) = ctx.check() {
            self.exhausted = true;
            return Err(err);
        }
        if id == NIL {
            self.exhausted = true;
            return Ok(None);
        }
        Ok(Some(Record {
            table: self.table(),
            id,
        }))
    }

    /// Iterate over the remaining records. The cursor stays open.
    pub fn each(&mut self) -> Result<Records<'_, 'ctx, E>> {
        self.resource.live()?;
        Ok(Records {
            cursor: self,
            done: false,
        })
    }

    /// Drain the remaining records and close the cursor.
    pub fn collect(mut self) -> Result<Vec<Record>> {
        let drained = self.drain();
        let closed = self.close();
        let records = drained?;
        closed?;
        Ok(records)
    }

    fn drain(&mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.next()? {
            records.push(record);
        }
        Ok(records)
    }
}

impl<E: Engine> std::fmt::Debug for TableCursor<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableCursor")
            .field("table", &self.table())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Lazy traversal returned by [`TableCursor::each`].
pub struct Records<'a, 'ctx, E: Engine> {
    cursor: &'a mut TableCursor<'ctx, E>,
    done: bool,
}

impl<E: Engine> Iterator for Records<'_, '_, E> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.cursor.next() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<E: Engine> FusedIterator for Records<'_, '_, E> {}

impl<E: Engine> std::fmt::Debug for Records<'_, '_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Records")
            .field("cursor", &self.cursor)
            .field("done", &self.done)
            .finish()
    }
}
