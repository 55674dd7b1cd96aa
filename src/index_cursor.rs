//! Iteration over the postings of one term.
//!
//! A document-level cursor advances the engine cursor once per step. A
//! position-aware cursor walks two levels: it asks for the next position of
//! the current document and only moves to the next document once the
//! positions are used up. Such cursors are primed on open, i.e. already
//! placed on their first document, so the first [`IndexCursor::next`]
//! yields the first real posting.

use std::iter::FusedIterator;

use crate::{
    context::Context,
    cursor::CursorResource,
    engine::{CursorId, Engine, NativePosting, ObjectId, TermId},
    error::Result,
    options::{IndexCursorOptions, PostingMode},
    posting::{Posting, PostingHandle, materialize_new, materialize_update},
};

/// Where an index cursor stands in its traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Opened but not advanced yet.
    Unprimed,
    /// Placed on a document, none of its positions consumed.
    OnDocument,
    /// Placed on a position within the current document.
    OnPosition,
    /// No postings left. Terminal.
    Exhausted,
}

pub struct IndexCursor<'ctx, E: Engine> {
    resource: CursorResource<'ctx, E>,
    term_id: TermId,
    table: ObjectId,
    lexicon: ObjectId,
    with_position: bool,
    mode: PostingMode,
    state: CursorState,
}

impl<'ctx, E: Engine> IndexCursor<'ctx, E> {
    pub(crate) fn open(
        ctx: &'ctx Context<E>,
        index: ObjectId,
        table: ObjectId,
        lexicon: ObjectId,
        term_id: TermId,
        options: &IndexCursorOptions,
    ) -> Result<Self> {
        let args = options.build()?;
        ctx.ensure_open()?;
        ctx.ensure_object_open(index)?;
        let handle = ctx.call(|engine, status| {
            engine.ii_cursor_open(status, index, term_id, &args)
        })?;
        let resource =
            CursorResource::from_open(ctx, handle, index, "index cursor")?;
        let mut cursor = Self {
            resource,
            term_id,
            table,
            lexicon,
            with_position: options.with_position,
            mode: options.mode,
            state: CursorState::Unprimed,
        };
        if cursor.with_position {
            cursor.advance_document()?;
        }
        Ok(cursor)
    }

    pub fn term_id(&self) -> TermId {
        self.term_id
    }

    pub fn index(&self) -> ObjectId {
        self.resource.owner()
    }

    pub fn table(&self) -> ObjectId {
        self.table
    }

    pub fn lexicon(&self) -> ObjectId {
        self.lexicon
    }

    pub fn with_position(&self) -> bool {
        self.with_position
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.resource.is_closed()
    }

    /// The engine cursor while it is open.
    pub fn native_id(&self) -> Option<CursorId> {
        self.resource.native_id()
    }

    /// Release the engine cursor. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        self.resource.close()
    }

    /// The next posting, or `None` once the postings are exhausted.
    pub fn next(&mut self) -> Result<Option<Posting>> {
        let native = self.step()?;
        Ok(native.map(|native| self.snapshot(&native)))
    }

    /// Iterate over the remaining postings.
    ///
    /// The cursor stays open when the iterator is dropped.
    pub fn each(&mut self, mode: PostingMode) -> Result<Each<'_, 'ctx, E>> {
        self.resource.live()?;
        Ok(Each {
            cursor: self,
            mode,
            slot: None,
            done: false,
        })
    }

    /// [`IndexCursor::each`] with the mode the cursor was opened with.
    pub fn each_default(&mut self) -> Result<Each<'_, 'ctx, E>> {
        let mode = self.mode;
        self.each(mode)
    }

    /// Drain the remaining postings as snapshots and close the cursor,
    /// whether or not draining succeeded.
    pub fn collect(mut self) -> Result<Vec<Posting>> {
        let drained = self.drain();
        let closed = self.close();
        let postings = drained?;
        closed?;
        Ok(postings)
    }

    fn drain(&mut self) -> Result<Vec<Posting>> {
        let mut postings = Vec::new();
        while let Some(posting) = self.next()? {
            postings.push(posting);
        }
        Ok(postings)
    }

    fn snapshot(&self, native: &NativePosting) -> Posting {
        materialize_new(Some(native), self.term_id, self.table, self.lexicon)
    }

    /// Run the advance protocol once.
    fn step(&mut self) -> Result<Option<NativePosting>> {
        self.resource.live()?;
        if self.state == CursorState::Exhausted {
            return Ok(None);
        }
        if !self.with_position {
            return self.advance_document();
        }
        loop {
            if matches!(
                self.state,
                CursorState::OnDocument | CursorState::OnPosition
            ) && let Some(posting) = self.advance_position()?
            {
                return Ok(Some(posting));
            }
            if self.advance_document()?.is_none() {
                return Ok(None);
            }
        }
    }

    fn advance_document(&mut self) -> Result<Option<NativePosting>> {
        let handle = self.resource.live()?;
        let ctx = self.resource.ctx();
        let posting =
            ctx.call(|engine, status| engine.ii_cursor_next(status, handle))?;
        self.settle(posting, CursorState::OnDocument)
    }

    fn advance_position(&mut self) -> Result<Option<NativePosting>> {
        let handle = self.resource.live()?;
        let ctx = self.resource.ctx();
        let posting = ctx
            .call(|engine, status| engine.ii_cursor_next_pos(status, handle))?;
        match posting {
            Some(_) => self.settle(posting, CursorState::OnPosition),
            // Running out of positions only ends the current document.
            None => {
                self.fail_on_error()?;
                Ok(None)
            }
        }
    }

    fn settle(
        &mut self,
        posting: Option<NativePosting>,
        on_success: CursorState,
    ) -> Result<Option<NativePosting>> {
        self.fail_on_error()?;
        match posting {
            Some(_) => self.state = on_success,
            None => {
                tracing::debug!(term = self.term_id, "postings exhausted");
                self.state = CursorState::Exhausted;
            }
        }
        Ok(posting)
    }

    /// Engine errors end the traversal for good.
    fn fail_on_error(&mut self) -> Result<()> {
        if let Err(err) = self.resource.ctx().check() {
            self.state = CursorState::Exhausted;
            return Err(err);
        }
        Ok(())
    }
}

impl<E: Engine> std::fmt::Debug for IndexCursor<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexCursor")
            .field("term_id", &self.term_id)
            .field("with_position", &self.with_position)
            .field("state", &self.state)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Lazy traversal returned by [`IndexCursor::each`].
///
/// Yields `Err` at most once, then ends.
pub struct Each<'a, 'ctx, E: Engine> {
    cursor: &'a mut IndexCursor<'ctx, E>,
    mode: PostingMode,
    slot: Option<PostingHandle>,
    done: bool,
}

impl<E: Engine> Each<'_, '_, E> {
    fn materialize(&mut self, native: &NativePosting) -> PostingHandle {
        if self.mode == PostingMode::Snapshot {
            return PostingHandle::new(self.cursor.snapshot(native));
        }
        if let Some(slot) = &self.slot {
            return materialize_update(slot, Some(native), self.cursor.term_id);
        }
        let handle = PostingHandle::new(self.cursor.snapshot(native));
        self.slot = Some(handle.clone());
        handle
    }
}

impl<E: Engine> Iterator for Each<'_, '_, E> {
    type Item = Result<PostingHandle>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.cursor.step() {
            Ok(Some(native)) => Some(Ok(self.materialize(&native))),
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

impl<E: Engine> FusedIterator for Each<'_, '_, E> {}

impl<E: Engine> std::fmt::Debug for Each<'_, '_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Each")
            .field("cursor", &self.cursor)
            .field("mode", &self.mode)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
