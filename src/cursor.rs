use crate::{
    context::Context,
    engine::{CursorId, Engine, ObjectId},
    error::{Error, Result},
    rc::ReturnCode,
};

/// Exclusive owner of one engine cursor.
///
/// `handle` doubles as the liveness flag: it is `Some` exactly while the
/// engine cursor is open. Every access goes through [`CursorResource::live`],
/// which checks this wrapper, the context and the owning object before any
/// engine call is made.
pub(crate) struct CursorResource<'ctx, E: Engine> {
    ctx: &'ctx Context<E>,
    handle: Option<CursorId>,
    owner: ObjectId,
    kind: &'static str,
}

impl<'ctx, E: Engine> CursorResource<'ctx, E> {
    /// Wrap the result of an engine open call. A null handle becomes
    /// [`Error::OpenFailed`] carrying the engine's status, or
    /// [`ReturnCode::UnknownError`] when the engine reported success.
    pub(crate) fn from_open(
        ctx: &'ctx Context<E>,
        handle: Option<CursorId>,
        owner: ObjectId,
        kind: &'static str,
    ) -> Result<Self> {
        let status = ctx.last_status();
        let handle = match handle {
            Some(handle) if !status.is_error() => handle,
            Some(handle) => {
                // The engine handed out a cursor but also reported a
                // failure; release it and report the failure.
                let released = ctx
                    .call(|engine, status| engine.cursor_close(status, handle))
                    .and_then(|()| ctx.check());
                if let Err(err) = released {
                    tracing::warn!(kind, "failed to release cursor: {err}");
                }
                return Err(Error::OpenFailed {
                    kind,
                    rc: status.rc,
                    message: status.message,
                });
            }
            None if status.is_error() => {
                return Err(Error::OpenFailed {
                    kind,
                    rc: status.rc,
                    message: status.message,
                });
            }
            None => {
                return Err(Error::OpenFailed {
                    kind,
                    rc: ReturnCode::UnknownError,
                    message: "engine returned no cursor".into(),
                });
            }
        };
        tracing::debug!(kind, cursor = handle.0, owner = owner.0, "opened cursor");
        Ok(Self {
            ctx,
            handle: Some(handle),
            owner,
            kind,
        })
    }

    pub(crate) fn ctx(&self) -> &'ctx Context<E> {
        self.ctx
    }

    pub(crate) fn owner(&self) -> ObjectId {
        self.owner
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    pub(crate) fn native_id(&self) -> Option<CursorId> {
        self.handle
    }

    /// The engine handle, after checking that it is still safe to use.
    pub(crate) fn live(&self) -> Result<CursorId> {
        let handle = self.handle.ok_or(Error::Closed { kind: self.kind })?;
        self.ctx.ensure_open()?;
        self.ctx.ensure_object_open(self.owner)?;
        Ok(handle)
    }

    /// Release the engine cursor. Calling this on a closed cursor is a
    /// no-op.
    ///
    /// The wrapper counts as closed even when the engine reports a failure.
    /// If the engine cannot be reached at all the cursor stays open.
    pub(crate) fn close(&mut self) -> Result<()> {
        let Some(handle) = self.handle else {
            return Ok(());
        };
        // A closed context or owner has already released the engine cursor.
        let invalidated = self.ctx.is_closed()
            || match self.ctx.ensure_object_open(self.owner) {
                Ok(()) => false,
                Err(err) if err.is_closed() => true,
                Err(err) => return Err(err),
            };
        if invalidated {
            self.handle = None;
            tracing::debug!(
                kind = self.kind,
                cursor = handle.0,
                "cursor invalidated by its owner"
            );
            return Ok(());
        }
        self.ctx
            .call(|engine, status| engine.cursor_close(status, handle))?;
        self.handle = None;
        tracing::debug!(kind = self.kind, cursor = handle.0, "closed cursor");
        self.ctx.check()
    }
}

impl<E: Engine> Drop for CursorResource<'_, E> {
    fn drop(&mut self) {
        let kind = self.kind;
        if let Err(err) = self.close() {
            tracing::warn!(kind, "failed to release cursor: {err}");
        }
    }
}
