//! An in-process engine keeping tables, lexicons and inverted indexes in
//! ordinary collections.
//!
//! Besides being a usable engine for small data sets it can simulate
//! failures ([`MemoryEngine::fail_next_open`], [`MemoryEngine::fail_next_call`])
//! and counts how often each native cursor was released, which is what the
//! cursor layer's release guarantees are tested against.

use std::collections::{BTreeMap, HashMap};

use super::{
    CursorId,
    Engine,
    IiCursorArgs,
    NIL,
    NativePosting,
    ObjectId,
    ObjectInfo,
    ObjectKind,
    OrderBy,
    RecordId,
    Status,
    TableCursorArgs,
    TermId,
};
use crate::{
    error::{Error, Result},
    rc::ReturnCode,
};

#[derive(Debug, Default)]
pub struct MemoryEngine {
    objects: Vec<Object>,
    cursors: BTreeMap<CursorId, CursorState>,
    next_cursor: u64,
    close_counts: HashMap<CursorId, u32>,
    open_failure: Option<(ReturnCode, String)>,
    call_failure: Option<(ReturnCode, String)>,
    closed: bool,
}

#[derive(Debug)]
struct Object {
    info: ObjectInfo,
    open: bool,
    data: ObjectData,
}

#[derive(Debug)]
enum ObjectData {
    Table(TableData),
    Index(IndexData),
}

#[derive(Debug, Default)]
struct TableData {
    /// Key of record `i + 1`; `None` for keyless tables.
    keys: Vec<Option<Vec<u8>>>,
    by_key: BTreeMap<Vec<u8>, RecordId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    rid: RecordId,
    sid: u32,
    weight: u32,
    positions: Vec<u32>,
}

#[derive(Debug, Default)]
struct IndexData {
    postings: BTreeMap<TermId, Vec<Entry>>,
}

#[derive(Debug)]
enum CursorState {
    Table {
        owner: ObjectId,
        ids: std::vec::IntoIter<RecordId>,
    },
    Postings {
        owner: ObjectId,
        entries: Vec<Entry>,
        next_entry: usize,
        current: Option<usize>,
        next_pos: usize,
    },
}

impl CursorState {
    fn owner(&self) -> ObjectId {
        match self {
            CursorState::Table { owner, .. }
            | CursorState::Postings { owner, .. } => *owner,
        }
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table. Keyed tables map each key to exactly one record.
    pub fn create_table(&mut self, name: &str, keyed: bool) -> Result<ObjectId> {
        self.create_object(
            name,
            ObjectKind::Table { keyed },
            ObjectData::Table(TableData::default()),
        )
    }

    /// Create an inverted index over `source` whose terms live in `lexicon`.
    pub fn create_index(
        &mut self,
        name: &str,
        source: ObjectId,
        lexicon: ObjectId,
        with_position: bool,
    ) -> Result<ObjectId> {
        self.table(source)?;
        if !matches!(self.table(lexicon)?.0, ObjectKind::Table { keyed: true })
        {
            return Err(Error::InvalidArgument(format!(
                "lexicon of {name} must be a keyed table"
            )));
        }
        self.create_object(
            name,
            ObjectKind::Index {
                source,
                lexicon,
                with_position,
            },
            ObjectData::Index(IndexData::default()),
        )
    }

    /// Add a record to a keyed table, returning the existing id when the
    /// key is already present.
    pub fn add_record(&mut self, table: ObjectId, key: &[u8]) -> Result<RecordId> {
        let (kind, data) = self.table_mut(table)?;
        if kind != (ObjectKind::Table { keyed: true }) {
            return Err(Error::InvalidArgument(
                "keyless table does not accept keys".into(),
            ));
        }
        if let Some(&id) = data.by_key.get(key) {
            return Ok(id);
        }
        data.keys.push(Some(key.to_vec()));
        let id = data.keys.len() as RecordId;
        data.by_key.insert(key.to_vec(), id);
        Ok(id)
    }

    /// Append a record to a keyless table.
    pub fn append_record(&mut self, table: ObjectId) -> Result<RecordId> {
        let (kind, data) = self.table_mut(table)?;
        if kind != (ObjectKind::Table { keyed: false }) {
            return Err(Error::InvalidArgument(
                "keyed table requires a key".into(),
            ));
        }
        data.keys.push(None);
        Ok(data.keys.len() as RecordId)
    }

    /// Record that `term` occurs in section `sid` of record `rid` at the
    /// given positions. Returns the term id.
    pub fn add_posting(
        &mut self,
        index: ObjectId,
        term: &[u8],
        rid: RecordId,
        sid: u32,
        weight: u32,
        positions: &[u32],
    ) -> Result<TermId> {
        let (source, lexicon) = self.index_tables(index)?;
        let record_count = self.table(source)?.1.keys.len() as RecordId;
        if rid == NIL || rid > record_count {
            return Err(Error::InvalidArgument(format!(
                "record {rid} does not exist"
            )));
        }
        let term_id = self.add_record(lexicon, term)?;
        let data = self.index_mut(index)?;
        let entries = data.postings.entry(term_id).or_default();
        match entries.binary_search_by_key(&(rid, sid), |e| (e.rid, e.sid)) {
            Ok(found) => {
                let entry = &mut entries[found];
                entry.weight = weight;
                entry.positions.extend_from_slice(positions);
                entry.positions.sort_unstable();
                entry.positions.dedup();
            }
            Err(at) => {
                let mut positions = positions.to_vec();
                positions.sort_unstable();
                positions.dedup();
                entries.insert(
                    at,
                    Entry {
                        rid,
                        sid,
                        weight,
                        positions,
                    },
                );
            }
        }
        Ok(term_id)
    }

    /// Tokenize `text` on whitespace, lowercase each token and index it.
    pub fn index_text(
        &mut self,
        index: ObjectId,
        rid: RecordId,
        sid: u32,
        text: &str,
    ) -> Result<()> {
        let mut occurrences: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        for (pos, token) in text.split_whitespace().enumerate() {
            occurrences
                .entry(token.to_lowercase())
                .or_default()
                .push(pos as u32);
        }
        for (token, positions) in occurrences {
            self.add_posting(index, token.as_bytes(), rid, sid, 0, &positions)?;
        }
        Ok(())
    }

    /// Make the next `*_cursor_open` call return a null handle with the
    /// given status.
    pub fn fail_next_open(&mut self, rc: ReturnCode, message: &str) {
        self.open_failure = Some((rc, message.to_string()));
    }

    /// Make the next advancing call fail with the given status.
    pub fn fail_next_call(&mut self, rc: ReturnCode, message: &str) {
        self.call_failure = Some((rc, message.to_string()));
    }

    /// How many times `cursor` was released through `cursor_close`.
    pub fn close_count(&self, cursor: CursorId) -> u32 {
        self.close_counts.get(&cursor).copied().unwrap_or(0)
    }

    pub fn open_cursor_count(&self) -> usize {
        self.cursors.len()
    }

    fn create_object(
        &mut self,
        name: &str,
        kind: ObjectKind,
        data: ObjectData,
    ) -> Result<ObjectId> {
        if self.objects.iter().any(|o| o.info.name == name) {
            return Err(Error::InvalidArgument(format!(
                "object already exists: {name}"
            )));
        }
        let id = ObjectId(self.objects.len() as u32 + 1);
        self.objects.push(Object {
            info: ObjectInfo {
                id,
                name: name.to_string(),
                kind,
            },
            open: true,
            data,
        });
        Ok(id)
    }

    fn get(&self, id: ObjectId) -> Result<&Object> {
        if self.closed {
            return Err(Error::Closed { kind: "database" });
        }
        let object = (id.0 as usize)
            .checked_sub(1)
            .and_then(|i| self.objects.get(i))
            .ok_or_else(|| Error::NotFound {
                kind: "object",
                name: id.0.to_string(),
            })?;
        if !object.open {
            return Err(Error::Closed { kind: "object" });
        }
        Ok(object)
    }

    fn get_mut(&mut self, id: ObjectId) -> Result<&mut Object> {
        self.get(id)?;
        Ok(&mut self.objects[id.0 as usize - 1])
    }

    fn table(&self, id: ObjectId) -> Result<(ObjectKind, &TableData)> {
        let object = self.get(id)?;
        match &object.data {
            ObjectData::Table(data) => Ok((object.info.kind, data)),
            ObjectData::Index(_) => Err(Error::InvalidArgument(format!(
                "{} is not a table",
                object.info.name
            ))),
        }
    }

    fn table_mut(
        &mut self,
        id: ObjectId,
    ) -> Result<(ObjectKind, &mut TableData)> {
        let object = self.get_mut(id)?;
        match &mut object.data {
            ObjectData::Table(data) => Ok((object.info.kind, data)),
            ObjectData::Index(_) => Err(Error::InvalidArgument(format!(
                "{} is not a table",
                object.info.name
            ))),
        }
    }

    fn index_tables(&self, id: ObjectId) -> Result<(ObjectId, ObjectId)> {
        match self.get(id)?.info.kind {
            ObjectKind::Index { source, lexicon, .. } => Ok((source, lexicon)),
            ObjectKind::Table { .. } => Err(Error::InvalidArgument(format!(
                "object {} is not an index",
                id.0
            ))),
        }
    }

    fn index_mut(&mut self, id: ObjectId) -> Result<&mut IndexData> {
        match &mut self.get_mut(id)?.data {
            ObjectData::Index(data) => Ok(data),
            ObjectData::Table(_) => Err(Error::InvalidArgument(format!(
                "object {} is not an index",
                id.0
            ))),
        }
    }

    fn register_cursor(&mut self, state: CursorState) -> CursorId {
        self.next_cursor += 1;
        let id = CursorId(self.next_cursor);
        self.cursors.insert(id, state);
        id
    }

    fn take_open_failure(&mut self, status: &mut Status) -> bool {
        match self.open_failure.take() {
            Some((rc, message)) => {
                status.set(rc, message);
                true
            }
            None => false,
        }
    }

    fn take_call_failure(&mut self, status: &mut Status) -> bool {
        match self.call_failure.take() {
            Some((rc, message)) => {
                status.set(rc, message);
                true
            }
            None => false,
        }
    }

    fn open_table_cursor(
        &mut self,
        table: ObjectId,
        args: &TableCursorArgs,
    ) -> Result<CursorId> {
        let (kind, data) = self.table(table)?;
        let keyed = matches!(kind, ObjectKind::Table { keyed: true });
        if !keyed && (args.has_key_bounds() || args.order_by == OrderBy::Key)
        {
            return Err(Error::Native {
                rc: ReturnCode::OperationNotSupported,
                message: "keyless tables can only be traversed by id".into(),
            });
        }
        let ids: Vec<RecordId> = match args.order_by {
            OrderBy::Key => data
                .by_key
                .iter()
                .filter(|(key, _)| args.key_in_range(key))
                .map(|(_, &id)| id)
                .collect(),
            OrderBy::Id => data
                .keys
                .iter()
                .enumerate()
                .filter(|(_, key)| {
                    key.as_deref().is_none_or(|k| args.key_in_range(k))
                })
                .map(|(i, _)| i as RecordId + 1)
                .collect(),
        };
        let ids = args.page(ids).into_iter();
        Ok(self.register_cursor(CursorState::Table { owner: table, ids }))
    }

    fn open_ii_cursor(
        &mut self,
        index: ObjectId,
        term: TermId,
        args: &IiCursorArgs,
    ) -> Result<CursorId> {
        let ObjectKind::Index { with_position, .. } = self.get(index)?.info.kind
        else {
            return Err(Error::InvalidArgument(format!(
                "object {} is not an index",
                index.0
            )));
        };
        if args.with_position && !with_position {
            return Err(Error::Native {
                rc: ReturnCode::OperationNotSupported,
                message: "index does not store positions".into(),
            });
        }
        let entries: Vec<Entry> = self
            .index_mut(index)?
            .postings
            .get(&term)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| args.accepts(e.rid))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(self.register_cursor(CursorState::Postings {
            owner: index,
            entries,
            next_entry: 0,
            current: None,
            next_pos: 0,
        }))
    }

    fn cursor_mut(&mut self, cursor: CursorId) -> Result<&mut CursorState> {
        if self.closed {
            return Err(Error::Closed { kind: "database" });
        }
        self.cursors.get_mut(&cursor).ok_or_else(|| {
            Error::InvalidArgument(format!("unknown cursor {}", cursor.0))
        })
    }
}

fn entry_posting(entry: &Entry, pos_index: usize) -> NativePosting {
    let tf = (entry.positions.len() as u32).max(1);
    NativePosting {
        rid: entry.rid,
        sid: entry.sid,
        pos: entry.positions.get(pos_index).copied().unwrap_or(0),
        tf,
        weight: entry.weight,
        rest: tf.saturating_sub(pos_index as u32 + 1),
    }
}

impl Engine for MemoryEngine {
    fn object(
        &mut self,
        status: &mut Status,
        name: &str,
    ) -> Option<ObjectInfo> {
        if self.closed {
            status.fail(&Error::Closed { kind: "database" });
            return None;
        }
        self.objects
            .iter()
            .find(|o| o.open && o.info.name == name)
            .map(|o| o.info.clone())
    }

    fn object_info(
        &mut self,
        status: &mut Status,
        id: ObjectId,
    ) -> Option<ObjectInfo> {
        match self.get(id) {
            Ok(object) => Some(object.info.clone()),
            Err(err) => {
                status.fail(&err);
                None
            }
        }
    }

    fn object_is_open(&self, id: ObjectId) -> bool {
        self.get(id).is_ok()
    }

    fn object_close(&mut self, status: &mut Status, id: ObjectId) {
        if let Err(err) = self.get(id) {
            status.fail(&err);
            return;
        }
        // Indexes cannot outlive the tables they are built on.
        let mut closing = vec![id];
        for object in &self.objects {
            if let ObjectKind::Index { source, lexicon, .. } = object.info.kind
                && (source == id || lexicon == id)
            {
                closing.push(object.info.id);
            }
        }
        for target in &closing {
            self.objects[target.0 as usize - 1].open = false;
        }
        self.cursors.retain(|_, state| !closing.contains(&state.owner()));
    }

    fn close_database(&mut self, _status: &mut Status) {
        self.closed = true;
        for object in &mut self.objects {
            object.open = false;
        }
        self.cursors.clear();
    }

    fn term_id(
        &mut self,
        status: &mut Status,
        index: ObjectId,
        key: &[u8],
    ) -> TermId {
        let lookup = self.index_tables(index).and_then(|(_, lexicon)| {
            Ok(self.table(lexicon)?.1.by_key.get(key).copied().unwrap_or(NIL))
        });
        lookup.unwrap_or_else(|err| {
            status.fail(&err);
            NIL
        })
    }

    fn record_key(
        &mut self,
        status: &mut Status,
        table: ObjectId,
        id: RecordId,
    ) -> Option<Vec<u8>> {
        let data = match self.table(table) {
            Ok((_, data)) => data,
            Err(err) => {
                status.fail(&err);
                return None;
            }
        };
        match (id as usize).checked_sub(1).and_then(|i| data.keys.get(i)) {
            Some(key) => key.clone(),
            None => {
                status.set(
                    ReturnCode::InvalidArgument,
                    format!("record {id} does not exist"),
                );
                None
            }
        }
    }

    fn table_cursor_open(
        &mut self,
        status: &mut Status,
        table: ObjectId,
        args: &TableCursorArgs,
    ) -> Option<CursorId> {
        if self.take_open_failure(status) {
            return None;
        }
        self.open_table_cursor(table, args)
            .map_err(|err| status.fail(&err))
            .ok()
    }

    fn table_cursor_next(
        &mut self,
        status: &mut Status,
        cursor: CursorId,
    ) -> RecordId {
        if self.take_call_failure(status) {
            return NIL;
        }
        match self.cursor_mut(cursor) {
            Ok(CursorState::Table { ids, .. }) => ids.next().unwrap_or(NIL),
            Ok(CursorState::Postings { .. }) => {
                status.set(
                    ReturnCode::InvalidArgument,
                    "not a table cursor",
                );
                NIL
            }
            Err(err) => {
                status.fail(&err);
                NIL
            }
        }
    }

    fn ii_cursor_open(
        &mut self,
        status: &mut Status,
        index: ObjectId,
        term: TermId,
        args: &IiCursorArgs,
    ) -> Option<CursorId> {
        if self.take_open_failure(status) {
            return None;
        }
        self.open_ii_cursor(index, term, args)
            .map_err(|err| status.fail(&err))
            .ok()
    }

    fn ii_cursor_next(
        &mut self,
        status: &mut Status,
        cursor: CursorId,
    ) -> Option<NativePosting> {
        if self.take_call_failure(status) {
            return None;
        }
        match self.cursor_mut(cursor) {
            Ok(CursorState::Postings {
                entries,
                next_entry,
                current,
                next_pos,
                ..
            }) => {
                let entry = entries.get(*next_entry)?;
                *current = Some(*next_entry);
                *next_entry += 1;
                *next_pos = 0;
                Some(entry_posting(entry, 0))
            }
            Ok(CursorState::Table { .. }) => {
                status.set(
                    ReturnCode::InvalidArgument,
                    "not an index cursor",
                );
                None
            }
            Err(err) => {
                status.fail(&err);
                None
            }
        }
    }

    fn ii_cursor_next_pos(
        &mut self,
        status: &mut Status,
        cursor: CursorId,
    ) -> Option<NativePosting> {
        if self.take_call_failure(status) {
            return None;
        }
        match self.cursor_mut(cursor) {
            Ok(CursorState::Postings {
                entries,
                current,
                next_pos,
                ..
            }) => {
                let entry = &entries[(*current)?];
                if *next_pos >= entry.positions.len() {
                    return None;
                }
                let posting = entry_posting(entry, *next_pos);
                *next_pos += 1;
                Some(posting)
            }
            Ok(CursorState::Table { .. }) => {
                status.set(
                    ReturnCode::InvalidArgument,
                    "not an index cursor",
                );
                None
            }
            Err(err) => {
                status.fail(&err);
                None
            }
        }
    }

    fn cursor_close(&mut self, status: &mut Status, cursor: CursorId) {
        if self.cursors.remove(&cursor).is_some() {
            *self.close_counts.entry(cursor).or_default() += 1;
        } else {
            status.set(
                ReturnCode::InvalidArgument,
                format!("cursor {} is not open", cursor.0),
            );
        }
    }
}
