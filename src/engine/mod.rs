//! The boundary between the cursor layer and the engine that owns tables
//! and inverted indexes.
//!
//! Engines follow the conventions of a C-style API: every call receives the
//! session's [`Status`] slot and reports failures only by writing a return
//! code and message into it. Open calls return `None` for a null handle,
//! advancing calls return `None` / [`NIL`] at end of data *or* on failure,
//! and the caller tells the two apart by inspecting the status.

pub mod memory;
pub mod tantivy_engine;

use serde::Serialize;

use crate::{error::Error, rc::ReturnCode};

/// Record identifier. Ids are 1-based; [`NIL`] means "no record".
pub type RecordId = u32;

/// Identifier of a lexicon entry.
pub type TermId = u32;

pub const NIL: RecordId = 0;

/// Identifier of a table, lexicon or index inside an engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
)]
pub struct ObjectId(pub u32);

/// Identifier of an open engine-side cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CursorId(pub u64);

/// The return-code/message pair written by every engine call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    pub rc: ReturnCode,
    pub message: String,
}

impl Status {
    pub fn set(&mut self, rc: ReturnCode, message: impl Into<String>) {
        self.rc = rc;
        self.message = message.into();
    }

    /// Record a crate error raised inside an engine.
    pub fn fail(&mut self, err: &Error) {
        self.set(err.native_rc(), err.to_string());
    }

    pub fn reset(&mut self) {
        self.rc = ReturnCode::Success;
        self.message.clear();
    }

    pub fn is_error(&self) -> bool {
        self.rc.is_error()
    }
}

/// A raw posting as produced by an index cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NativePosting {
    pub rid: RecordId,
    pub sid: u32,
    pub pos: u32,
    pub tf: u32,
    pub weight: u32,
    pub rest: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// A table of records. Keyless tables only support id order.
    Table { keyed: bool },
    /// An inverted index over `source`, keyed by terms of `lexicon`.
    Index {
        source: ObjectId,
        lexicon: ObjectId,
        with_position: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub id: ObjectId,
    pub name: String,
    pub kind: ObjectKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderBy {
    #[default]
    Id,
    Key,
}

/// A key prefix, optionally limited to its first `bits` bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPrefix {
    pub key: Vec<u8>,
    pub bits: Option<u32>,
}

impl KeyPrefix {
    pub fn matches(&self, key: &[u8]) -> bool {
        let Some(bits) = self.bits else {
            return key.starts_with(&self.key);
        };
        let whole = (bits / 8) as usize;
        let partial = bits % 8;
        if self.key.len() * 8 < bits as usize {
            return false;
        }
        if key.len() < whole + usize::from(partial > 0) {
            return false;
        }
        if key[..whole] != self.key[..whole] {
            return false;
        }
        if partial == 0 {
            return true;
        }
        let mask = 0xffu8 << (8 - partial);
        key[whole] & mask == self.key[whole] & mask
    }
}

/// Validated table cursor parameters, see
/// [`crate::options::TableCursorOptions::build`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableCursorArgs {
    pub min: Option<Vec<u8>>,
    pub max: Option<Vec<u8>>,
    pub greater_than: bool,
    pub less_than: bool,
    pub prefix: Option<KeyPrefix>,
    pub offset: usize,
    pub limit: Option<usize>,
    pub order: Order,
    pub order_by: OrderBy,
}

impl TableCursorArgs {
    /// Whether the arguments restrict keys at all.
    pub fn has_key_bounds(&self) -> bool {
        self.min.is_some() || self.max.is_some() || self.prefix.is_some()
    }

    pub fn key_in_range(&self, key: &[u8]) -> bool {
        if let Some(min) = &self.min {
            let below = if self.greater_than {
                key <= min.as_slice()
            } else {
                key < min.as_slice()
            };
            if below {
                return false;
            }
        }
        if let Some(max) = &self.max {
            let above = if self.less_than {
                key >= max.as_slice()
            } else {
                key > max.as_slice()
            };
            if above {
                return false;
            }
        }
        self.prefix.as_ref().is_none_or(|p| p.matches(key))
    }

    /// Apply order, offset and limit to ids already filtered by key.
    pub fn page(&self, mut ids: Vec<RecordId>) -> Vec<RecordId> {
        if self.order == Order::Descending {
            ids.reverse();
        }
        let limit = self.limit.unwrap_or(usize::MAX);
        ids.into_iter().skip(self.offset).take(limit).collect()
    }
}

/// Parameters of an inverted index cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IiCursorArgs {
    pub with_position: bool,
    /// Smallest record id to report; [`NIL`] means unbounded.
    pub min_record_id: RecordId,
    /// Largest record id to report; [`NIL`] means unbounded.
    pub max_record_id: RecordId,
}

impl IiCursorArgs {
    pub fn accepts(&self, rid: RecordId) -> bool {
        rid >= self.min_record_id
            && (self.max_record_id == NIL || rid <= self.max_record_id)
    }
}

/// The native API surface consumed by the cursor layer.
pub trait Engine {
    /// Look up a table, lexicon or index by name.
    fn object(&mut self, status: &mut Status, name: &str)
    -> Option<ObjectInfo>;

    fn object_info(
        &mut self,
        status: &mut Status,
        id: ObjectId,
    ) -> Option<ObjectInfo>;

    /// Whether `id` refers to an object that is still open.
    fn object_is_open(&self, id: ObjectId) -> bool;

    /// Close an object, releasing every cursor opened over it.
    fn object_close(&mut self, status: &mut Status, id: ObjectId);

    /// Close every object and cursor.
    fn close_database(&mut self, status: &mut Status);

    /// Resolve `key` to a term id of the index's lexicon; [`NIL`] when the
    /// term is unknown.
    fn term_id(
        &mut self,
        status: &mut Status,
        index: ObjectId,
        key: &[u8],
    ) -> TermId;

    fn record_key(
        &mut self,
        status: &mut Status,
        table: ObjectId,
        id: RecordId,
    ) -> Option<Vec<u8>>;

    fn table_cursor_open(
        &mut self,
        status: &mut Status,
        table: ObjectId,
        args: &TableCursorArgs,
    ) -> Option<CursorId>;

    /// Next record id, or [`NIL`] when exhausted.
    fn table_cursor_next(
        &mut self,
        status: &mut Status,
        cursor: CursorId,
    ) -> RecordId;

    fn ii_cursor_open(
        &mut self,
        status: &mut Status,
        index: ObjectId,
        term: TermId,
        args: &IiCursorArgs,
    ) -> Option<CursorId>;

    /// Advance to the next document.
    fn ii_cursor_next(
        &mut self,
        status: &mut Status,
        cursor: CursorId,
    ) -> Option<NativePosting>;

    /// Advance to the next position within the current document.
    fn ii_cursor_next_pos(
        &mut self,
        status: &mut Status,
        cursor: CursorId,
    ) -> Option<NativePosting>;

    fn cursor_close(&mut self, status: &mut Status, cursor: CursorId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_without_bits_is_byte_prefix() {
        let prefix = KeyPrefix {
            key: b"ab".to_vec(),
            bits: None,
        };
        assert!(prefix.matches(b"abc"));
        assert!(prefix.matches(b"ab"));
        assert!(!prefix.matches(b"a"));
        assert!(!prefix.matches(b"ba"));
    }

    #[test]
    fn prefix_bits_compare_partial_bytes() {
        // 0x60 = 0b0110_0000, first 3 bits are 011.
        let prefix = KeyPrefix {
            key: vec![0x60],
            bits: Some(3),
        };
        assert!(prefix.matches(&[0x7f]));
        assert!(prefix.matches(&[0x60, 0x01]));
        assert!(!prefix.matches(&[0x80]));
        assert!(!prefix.matches(&[]));
    }

    #[test]
    fn key_range_respects_exclusive_bounds() {
        let args = TableCursorArgs {
            min: Some(b"b".to_vec()),
            max: Some(b"d".to_vec()),
            greater_than: true,
            ..Default::default()
        };
        assert!(!args.key_in_range(b"a"));
        assert!(!args.key_in_range(b"b"));
        assert!(args.key_in_range(b"c"));
        assert!(args.key_in_range(b"d"));
        assert!(!args.key_in_range(b"e"));
    }

    #[test]
    fn page_applies_order_offset_limit() {
        let args = TableCursorArgs {
            order: Order::Descending,
            offset: 1,
            limit: Some(2),
            ..Default::default()
        };
        assert_eq!(args.page(vec![1, 2, 3, 4, 5]), vec![4, 3]);
    }

    #[test]
    fn ii_args_bounds() {
        let args = IiCursorArgs {
            min_record_id: 2,
            max_record_id: 4,
            ..Default::default()
        };
        assert!(!args.accepts(1));
        assert!(args.accepts(2));
        assert!(args.accepts(4));
        assert!(!args.accepts(5));
        assert!(IiCursorArgs::default().accepts(u32::MAX));
    }
}
