use std::{cell::Cell, rc::Rc};

use serde::Serialize;

use crate::engine::{NativePosting, ObjectId, RecordId, TermId};

/// One occurrence of a term, as reported by an index cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Posting {
    pub record_id: RecordId,
    pub section_id: u32,
    pub position: u32,
    pub term_frequency: u32,
    pub weight: u32,
    /// Occurrences left in the current document after this one.
    pub rest: u32,
    pub term_id: TermId,
    /// Table the record id belongs to.
    pub table: ObjectId,
    /// Lexicon the term id belongs to.
    pub lexicon: ObjectId,
}

/// A record of some table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Record {
    pub table: ObjectId,
    pub id: RecordId,
}

impl Posting {
    /// The matching record.
    pub fn record(&self) -> Record {
        Record {
            table: self.table,
            id: self.record_id,
        }
    }

    /// The lexicon entry this posting was produced for.
    pub fn term(&self) -> Record {
        Record {
            table: self.lexicon,
            id: self.term_id,
        }
    }

    fn assign(&mut self, native: Option<&NativePosting>, term_id: TermId) {
        let native = native.copied().unwrap_or_default();
        self.record_id = native.rid;
        self.section_id = native.sid;
        self.position = native.pos;
        self.term_frequency = native.tf;
        self.weight = native.weight;
        self.rest = native.rest;
        self.term_id = term_id;
    }
}

/// Build a fresh posting from the cursor's current engine posting.
///
/// Without an engine posting only the term id is set.
pub fn materialize_new(
    native: Option<&NativePosting>,
    term_id: TermId,
    table: ObjectId,
    lexicon: ObjectId,
) -> Posting {
    let mut posting = Posting {
        record_id: 0,
        section_id: 0,
        position: 0,
        term_frequency: 0,
        weight: 0,
        rest: 0,
        term_id,
        table,
        lexicon,
    };
    posting.assign(native, term_id);
    posting
}

/// Overwrite `existing` with the cursor's current engine posting and hand
/// back the same handle.
pub fn materialize_update(
    existing: &PostingHandle,
    native: Option<&NativePosting>,
    term_id: TermId,
) -> PostingHandle {
    let mut posting = existing.get();
    posting.assign(native, term_id);
    existing.0.set(posting);
    existing.clone()
}

/// A posting as yielded by [`crate::IndexCursor::each`].
///
/// In [`crate::PostingMode::Snapshot`] mode every handle is distinct. In
/// [`crate::PostingMode::ReuseInPlace`] mode the cursor yields clones of a
/// single handle and overwrites it on every step.
#[derive(Debug, Clone)]
pub struct PostingHandle(Rc<Cell<Posting>>);

impl PostingHandle {
    pub fn new(posting: Posting) -> Self {
        Self(Rc::new(Cell::new(posting)))
    }

    /// The posting currently stored in the handle.
    pub fn get(&self) -> Posting {
        self.0.get()
    }

    /// Whether both handles refer to the same storage.
    pub fn ptr_eq(&self, other: &PostingHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: ObjectId = ObjectId(1);
    const LEXICON: ObjectId = ObjectId(2);

    fn native(rid: RecordId, pos: u32) -> NativePosting {
        NativePosting {
            rid,
            sid: 1,
            pos,
            tf: 1,
            weight: 0,
            rest: 0,
        }
    }

    #[test]
    fn fields_map_one_to_one() {
        let raw = NativePosting {
            rid: 7,
            sid: 2,
            pos: 3,
            tf: 5,
            weight: 10,
            rest: 1,
        };
        let posting = materialize_new(Some(&raw), 42, TABLE, LEXICON);
        assert_eq!(posting.record_id, 7);
        assert_eq!(posting.section_id, 2);
        assert_eq!(posting.position, 3);
        assert_eq!(posting.term_frequency, 5);
        assert_eq!(posting.weight, 10);
        assert_eq!(posting.rest, 1);
        assert_eq!(posting.term_id, 42);
    }

    #[test]
    fn extreme_values_are_not_truncated() {
        let raw = NativePosting {
            rid: u32::MAX,
            sid: u32::MAX,
            pos: u32::MAX,
            tf: u32::MAX,
            weight: u32::MAX,
            rest: u32::MAX,
        };
        let posting = materialize_new(Some(&raw), u32::MAX, TABLE, LEXICON);
        assert_eq!(posting.record_id, u32::MAX);
        assert_eq!(posting.weight, u32::MAX);
        assert_eq!(posting.rest, u32::MAX);
    }

    #[test]
    fn unbound_posting_only_has_term() {
        let posting = materialize_new(None, 9, TABLE, LEXICON);
        assert_eq!(posting.term_id, 9);
        assert_eq!(posting.record_id, 0);
        assert_eq!(posting.position, 0);
        assert_eq!(posting.term(), Record { table: LEXICON, id: 9 });
    }

    #[test]
    fn update_keeps_identity() {
        let first = PostingHandle::new(materialize_new(
            Some(&native(1, 0)),
            3,
            TABLE,
            LEXICON,
        ));
        let second = materialize_update(&first, Some(&native(2, 4)), 3);
        assert!(first.ptr_eq(&second));
        assert_eq!(first.get().record_id, 2);
        assert_eq!(first.get().position, 4);
        assert_eq!(first.get().table, TABLE);
    }

    #[test]
    fn record_points_at_source_table() {
        let posting = materialize_new(Some(&native(5, 0)), 3, TABLE, LEXICON);
        assert_eq!(posting.record(), Record { table: TABLE, id: 5 });
    }

    #[test]
    fn serializes_to_json() {
        let posting = materialize_new(Some(&native(5, 2)), 3, TABLE, LEXICON);
        let json = serde_json::to_value(posting).unwrap();
        assert_eq!(json["record_id"], 5);
        assert_eq!(json["position"], 2);
        assert_eq!(json["table"], 1);
    }
}
