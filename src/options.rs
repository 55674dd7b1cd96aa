//! Typed cursor configuration.
//!
//! Options are plain structs with public fields and documented defaults.
//! Table cursor options are validated once, by
//! [`TableCursorOptions::build`], before anything reaches the engine.

use crate::{
    engine::{
        IiCursorArgs,
        KeyPrefix,
        Order,
        OrderBy,
        RecordId,
        TableCursorArgs,
    },
    error::{Error, Result},
};

/// How an index cursor hands postings to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PostingMode {
    /// Every step yields a new, independent posting.
    #[default]
    Snapshot,
    /// Every step overwrites and re-yields the same posting handle.
    ///
    /// Handles retained across steps all show the most recent posting.
    ReuseInPlace,
}

/// Options for [`crate::Context::open_index_cursor`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexCursorOptions {
    /// Yield one posting per position instead of one per document.
    pub with_position: bool,
    /// Skip records with a smaller id. `0` means unbounded.
    pub min_record_id: RecordId,
    /// Skip records with a larger id. `0` means unbounded.
    pub max_record_id: RecordId,
    /// Materialization used by [`crate::IndexCursor::each_default`].
    pub mode: PostingMode,
}

impl IndexCursorOptions {
    pub fn with_position() -> Self {
        Self {
            with_position: true,
            ..Self::default()
        }
    }

    pub(crate) fn build(&self) -> Result<IiCursorArgs> {
        if self.max_record_id != 0 && self.min_record_id > self.max_record_id
        {
            return Err(Error::InvalidArgument(format!(
                "min_record_id {} is greater than max_record_id {}",
                self.min_record_id, self.max_record_id
            )));
        }
        Ok(IiCursorArgs {
            with_position: self.with_position,
            min_record_id: self.min_record_id,
            max_record_id: self.max_record_id,
        })
    }
}

/// Options for [`crate::Context::open_table_cursor`].
///
/// With every field left at its default the cursor visits all records in
/// ascending id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableCursorOptions {
    /// Lower key bound, inclusive unless `greater_than` is set.
    pub min: Option<Vec<u8>>,
    /// Upper key bound, inclusive unless `less_than` is set.
    pub max: Option<Vec<u8>>,
    pub greater_than: bool,
    pub less_than: bool,
    /// Only visit keys starting with this prefix.
    pub prefix: Option<Vec<u8>>,
    /// Compare only the first `key_bytes` bytes of `prefix`.
    pub key_bytes: Option<u32>,
    /// Compare only the first `key_bits` bits of `prefix`.
    pub key_bits: Option<u32>,
    /// Number of matching records to skip.
    pub offset: usize,
    /// Maximum number of records to visit; `None` visits all.
    pub limit: Option<usize>,
    pub order: Order,
    pub order_by: OrderBy,
}

impl TableCursorOptions {
    /// Validate the combination of options.
    pub fn build(&self) -> Result<TableCursorArgs> {
        let bits = match (self.key_bytes, self.key_bits) {
            (Some(_), Some(_)) => {
                return Err(Error::InvalidArgument(
                    "key_bytes and key_bits are mutually exclusive".into(),
                ));
            }
            (Some(bytes), None) => Some(bytes.checked_mul(8).ok_or_else(
                || Error::InvalidArgument(format!("key_bytes {bytes} overflows")),
            )?),
            (None, bits) => bits,
        };

        let prefix = match (&self.prefix, bits) {
            (None, Some(_)) => {
                return Err(Error::InvalidArgument(
                    "key_bytes/key_bits require a prefix".into(),
                ));
            }
            (None, None) => None,
            (Some(key), bits) => {
                if self.min.is_some() || self.max.is_some() {
                    return Err(Error::InvalidArgument(
                        "prefix cannot be combined with min/max".into(),
                    ));
                }
                if let Some(bits) = bits
                    && bits as usize > key.len() * 8
                {
                    return Err(Error::InvalidArgument(format!(
                        "prefix is {} bits long, {bits} requested",
                        key.len() * 8
                    )));
                }
                Some(KeyPrefix {
                    key: key.clone(),
                    bits,
                })
            }
        };

        Ok(TableCursorArgs {
            min: self.min.clone(),
            max: self.max.clone(),
            greater_than: self.greater_than,
            less_than: self.less_than,
            prefix,
            offset: self.offset,
            limit: self.limit,
            order: self.order,
            order_by: self.order_by,
        })
    }
}
