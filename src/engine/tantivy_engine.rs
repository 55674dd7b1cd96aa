//! An engine backed by a tantivy index.
//!
//! The index holds one document table ([`TantivyEngine::TABLE_NAME`]) whose
//! record keys are document paths, and one positional inverted index over
//! the document bodies ([`TantivyEngine::INDEX_NAME`]) whose terms form the
//! lexicon ([`TantivyEngine::LEXICON_NAME`]).
//!
//! Record ids are global document numbers: the document's id within its
//! segment plus the sizes of all earlier segments, plus one. They are stable
//! for as long as the segment layout does not change.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    path::Path,
};

use tantivy::{
    DocAddress,
    DocSet,
    Index,
    IndexReader,
    IndexWriter,
    Searcher,
    TERMINATED,
    TantivyDocument,
    Term,
    doc,
    postings::{Postings, SegmentPostings},
    schema::{
        Field,
        IndexRecordOption,
        STORED,
        STRING,
        Schema,
        TextFieldIndexing,
        TextOptions,
    },
    tokenizer::{
        LowerCaser,
        RemoveLongFilter,
        SimpleTokenizer,
        Stemmer,
        TextAnalyzer,
        TokenStream,
    },
};

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

/// Field names used in the schema.
pub mod fields {
    pub const PATH: &str = "path";
    pub const TITLE: &str = "title";
    pub const BODY: &str = "body";
}

const TOKENIZER: &str = "en_stem";

const TABLE: ObjectId = ObjectId(1);
const LEXICON: ObjectId = ObjectId(2);
const INDEX: ObjectId = ObjectId(3);

#[derive(Clone, Copy)]
struct SchemaFields {
    path: Field,
    title: Field,
    body: Field,
}

fn build_schema() -> (Schema, SchemaFields) {
    let mut builder = Schema::builder();

    let path = builder.add_text_field(fields::PATH, STRING | STORED);

    let text_indexing = TextFieldIndexing::default()
        .set_tokenizer(TOKENIZER)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let title = builder.add_text_field(
        fields::TITLE,
        TextOptions::default()
            .set_indexing_options(text_indexing.clone())
            .set_stored(),
    );
    let body = builder.add_text_field(
        fields::BODY,
        TextOptions::default().set_indexing_options(text_indexing),
    );

    (builder.build(), SchemaFields { path, title, body })
}

fn register_tokenizers(index: &Index) {
    let en_stem = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .filter(Stemmer::new(tantivy::tokenizer::Language::English))
        .build();
    index.tokenizers().register(TOKENIZER, en_stem);
}

pub struct TantivyEngine {
    index: Index,
    reader: IndexReader,
    fields: SchemaFields,
    cursors: HashMap<CursorId, CursorState>,
    next_cursor: u64,
    /// Term of id `i + 1`.
    terms: Vec<String>,
    term_ids: HashMap<String, TermId>,
    closed_objects: HashSet<ObjectId>,
    closed: bool,
}

enum CursorState {
    Table {
        owner: ObjectId,
        ids: std::vec::IntoIter<RecordId>,
    },
    Postings(Box<PostingScan>),
}

impl CursorState {
    fn owner(&self) -> ObjectId {
        match self {
            CursorState::Table { owner, .. } => *owner,
            CursorState::Postings(_) => INDEX,
        }
    }
}

impl TantivyEngine {
    pub const TABLE_NAME: &'static str = "Documents";
    pub const LEXICON_NAME: &'static str = "Terms";
    pub const INDEX_NAME: &'static str = "Terms.body";

    /// Open or create an index at the given directory.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let (schema, fields) = build_schema();

        let mmap_dir = tantivy::directory::MmapDirectory::open(dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?;
        let index = if Index::exists(&mmap_dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?
        {
            Index::open(mmap_dir)?
        } else {
            Index::create(mmap_dir, schema, tantivy::IndexSettings::default())?
        };

        Self::from_index(index, fields)
    }

    /// Create an in-memory index (for testing).
    pub fn open_in_ram() -> Result<Self> {
        let (schema, fields) = build_schema();
        Self::from_index(Index::create_in_ram(schema), fields)
    }

    fn from_index(index: Index, fields: SchemaFields) -> Result<Self> {
        register_tokenizers(&index);
        let reader = index.reader()?;
        Ok(Self {
            index,
            reader,
            fields,
            cursors: HashMap::new(),
            next_cursor: 0,
            terms: Vec::new(),
            term_ids: HashMap::new(),
            closed_objects: HashSet::new(),
            closed: false,
        })
    }

    /// Create a writer with the given memory budget (in bytes).
    ///
    /// The writer is single-threaded so that documents of one commit land in
    /// one segment in insertion order, keeping record ids in that order.
    pub fn writer(&self, memory_budget: usize) -> Result<IndexWriter> {
        Ok(self.index.writer_with_num_threads(1, memory_budget)?)
    }

    /// Add a document, replacing any document with the same path.
    pub fn add_document(
        &self,
        writer: &IndexWriter,
        path: &str,
        title: &str,
        body: &str,
    ) -> Result<()> {
        let f = self.fields;
        self.delete_document(writer, path);
        writer.add_document(doc!(
            f.path => path,
            f.title => title,
            f.body => body,
        ))?;
        Ok(())
    }

    /// Remove the document stored under `path`, if any. Takes effect on
    /// the next commit.
    pub fn delete_document(&self, writer: &IndexWriter, path: &str) {
        writer.delete_term(Term::from_field_text(self.fields.path, path));
    }

    /// Run `text` through the body analyzer, producing lexicon keys.
    pub fn analyze(&self, text: &str) -> Result<Vec<String>> {
        let mut analyzer =
            self.index.tokenizers().get(TOKENIZER).ok_or_else(|| {
                Error::Config(format!("tokenizer {TOKENIZER} is not registered"))
            })?;
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        while stream.advance() {
            tokens.push(stream.token().text.clone());
        }
        Ok(tokens)
    }

    /// Number of live documents in the latest commit.
    pub fn document_count(&self) -> Result<u64> {
        Ok(self.searcher()?.num_docs())
    }

    pub fn segment_count(&self) -> Result<usize> {
        Ok(self.searcher()?.segment_readers().len())
    }

    fn searcher(&self) -> Result<Searcher> {
        self.reader.reload()?;
        Ok(self.reader.searcher())
    }

    fn info(id: ObjectId) -> Option<ObjectInfo> {
        let (name, kind) = match id {
            TABLE => (Self::TABLE_NAME, ObjectKind::Table { keyed: true }),
            LEXICON => (Self::LEXICON_NAME, ObjectKind::Table { keyed: true }),
            INDEX => (
                Self::INDEX_NAME,
                ObjectKind::Index {
                    source: TABLE,
                    lexicon: LEXICON,
                    with_position: true,
                },
            ),
            _ => return None,
        };
        Some(ObjectInfo {
            id,
            name: name.to_string(),
            kind,
        })
    }

    fn ensure_usable(&self, id: ObjectId) -> Result<()> {
        if self.closed {
            return Err(Error::Closed { kind: "database" });
        }
        if Self::info(id).is_none() {
            return Err(Error::NotFound {
                kind: "object",
                name: id.0.to_string(),
            });
        }
        if self.closed_objects.contains(&id) {
            return Err(Error::Closed { kind: "object" });
        }
        Ok(())
    }

    fn intern(&mut self, key: &str) -> TermId {
        if let Some(&id) = self.term_ids.get(key) {
            return id;
        }
        self.terms.push(key.to_string());
        let id = self.terms.len() as TermId;
        self.term_ids.insert(key.to_string(), id);
        id
    }

    fn term_text(&self, id: TermId) -> Option<&str> {
        (id as usize)
            .checked_sub(1)
            .and_then(|i| self.terms.get(i))
            .map(String::as_str)
    }

    fn lookup_term(&mut self, key: &[u8]) -> Result<TermId> {
        let Ok(key) = std::str::from_utf8(key) else {
            return Ok(NIL);
        };
        if let Some(&id) = self.term_ids.get(key) {
            return Ok(id);
        }
        let term = Term::from_field_text(self.fields.body, key);
        if self.searcher()?.doc_freq(&term)? == 0 {
            return Ok(NIL);
        }
        Ok(self.intern(key))
    }

    /// Intern every term of the body index, in key order.
    fn load_lexicon(&mut self) -> Result<()> {
        let searcher = self.searcher()?;
        let mut keys = BTreeSet::new();
        for reader in searcher.segment_readers() {
            let inverted = reader.inverted_index(self.fields.body)?;
            let mut stream = inverted.terms().stream()?;
            while stream.advance() {
                if let Ok(key) = std::str::from_utf8(stream.key()) {
                    keys.insert(key.to_string());
                }
            }
        }
        for key in keys {
            self.intern(&key);
        }
        Ok(())
    }

    fn record_key_of(
        &self,
        table: ObjectId,
        id: RecordId,
    ) -> Result<Option<Vec<u8>>> {
        use tantivy::schema::Value;

        self.ensure_usable(table)?;
        if table == LEXICON {
            return Ok(self.term_text(id).map(|t| t.as_bytes().to_vec()));
        }
        if table != TABLE {
            return Err(Error::InvalidArgument(format!(
                "object {} is not a table",
                table.0
            )));
        }
        let searcher = self.searcher()?;
        let Some(address) = locate(&searcher, id) else {
            return Err(Error::InvalidArgument(format!(
                "record {id} does not exist"
            )));
        };
        let doc: TantivyDocument = searcher.doc(address)?;
        Ok(doc
            .get_first(self.fields.path)
            .and_then(|v| v.as_str())
            .map(|path| str::as_bytes(path).to_vec()))
    }

    fn open_table_cursor(
        &mut self,
        table: ObjectId,
        args: &TableCursorArgs,
    ) -> Result<CursorState> {
        self.ensure_usable(table)?;
        let ids = match table {
            TABLE => {
                if args.has_key_bounds() || args.order_by == OrderBy::Key {
                    return Err(Error::Native {
                        rc: ReturnCode::OperationNotSupported,
                        message: "documents can only be traversed by id"
                            .into(),
                    });
                }
                record_ids(&self.searcher()?)
            }
            LEXICON => {
                self.load_lexicon()?;
                let mut entries: Vec<(&str, TermId)> = self
                    .terms
                    .iter()
                    .enumerate()
                    .filter(|(_, key)| {
                        args.key_in_range(key.as_str().as_bytes())
                    })
                    .map(|(i, key)| (key.as_str(), i as TermId + 1))
                    .collect();
                if args.order_by == OrderBy::Key {
                    entries.sort_unstable();
                }
                entries.into_iter().map(|(_, id)| id).collect()
            }
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "object {} is not a table",
                    table.0
                )));
            }
        };
        Ok(CursorState::Table {
            owner: table,
            ids: args.page(ids).into_iter(),
        })
    }

    fn open_ii_cursor(
        &mut self,
        index: ObjectId,
        term: TermId,
        args: &IiCursorArgs,
    ) -> Result<CursorState> {
        self.ensure_usable(index)?;
        if index != INDEX {
            return Err(Error::InvalidArgument(format!(
                "object {} is not an index",
                index.0
            )));
        }
        let term = self
            .term_text(term)
            .map(|text| Term::from_field_text(self.fields.body, text));
        Ok(CursorState::Postings(Box::new(PostingScan {
            searcher: self.searcher()?,
            field: self.fields.body,
            term,
            args: *args,
            next_segment: 0,
            next_base: 0,
            current: None,
            document: None,
            positions: Vec::new(),
            next_pos: 0,
        })))
    }

    fn register_cursor(&mut self, state: CursorState) -> CursorId {
        self.next_cursor += 1;
        let id = CursorId(self.next_cursor);
        self.cursors.insert(id, state);
        id
    }

    fn scan(&mut self, cursor: CursorId) -> Result<&mut PostingScan> {
        if self.closed {
            return Err(Error::Closed { kind: "database" });
        }
        match self.cursors.get_mut(&cursor) {
            Some(CursorState::Postings(scan)) => Ok(&mut **scan),
            Some(CursorState::Table { .. }) => Err(Error::InvalidArgument(
                "not an index cursor".into(),
            )),
            None => Err(Error::InvalidArgument(format!(
                "unknown cursor {}",
                cursor.0
            ))),
        }
    }
}

impl std::fmt::Debug for TantivyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TantivyEngine")
            .field("open_cursors", &self.cursors.len())
            .field("terms", &self.terms.len())
            .finish_non_exhaustive()
    }
}

/// Ids of all live documents, in id order.
fn record_ids(searcher: &Searcher) -> Vec<RecordId> {
    let mut ids = Vec::new();
    let mut base = 0;
    for reader in searcher.segment_readers() {
        let alive = reader.alive_bitset();
        for doc in 0..reader.max_doc() {
            if alive.is_none_or(|bits| bits.is_alive(doc)) {
                ids.push(base + doc + 1);
            }
        }
        base += reader.max_doc();
    }
    ids
}

/// Address of a live document. Deleted documents keep their id but no
/// longer resolve.
fn locate(searcher: &Searcher, id: RecordId) -> Option<DocAddress> {
    let mut local = id.checked_sub(1)?;
    for (ord, reader) in searcher.segment_readers().iter().enumerate() {
        if local < reader.max_doc() {
            let alive = reader
                .alive_bitset()
                .is_none_or(|bits| bits.is_alive(local));
            return alive.then(|| DocAddress::new(ord as u32, local));
        }
        local -= reader.max_doc();
    }
    None
}

struct SegmentScan {
    ord: usize,
    base: u32,
    postings: SegmentPostings,
    started: bool,
}

/// Walks the postings of one term across all segments of a searcher.
struct PostingScan {
    searcher: Searcher,
    field: Field,
    /// `None` for terms missing from the lexicon.
    term: Option<Term>,
    args: IiCursorArgs,
    next_segment: usize,
    next_base: u32,
    current: Option<SegmentScan>,
    document: Option<NativePosting>,
    positions: Vec<u32>,
    next_pos: usize,
}

impl PostingScan {
    fn next_document(&mut self) -> Result<Option<NativePosting>> {
        let Some(term) = &self.term else {
            return Ok(None);
        };
        loop {
            if let Some(scan) = self.current.as_mut() {
                let doc = if scan.started {
                    scan.postings.advance()
                } else {
                    scan.started = true;
                    scan.postings.doc()
                };
                if doc == TERMINATED {
                    self.current = None;
                    continue;
                }
                let reader = &self.searcher.segment_readers()[scan.ord];
                if reader.alive_bitset().is_some_and(|bits| bits.is_deleted(doc))
                {
                    continue;
                }
                let rid = scan.base + doc + 1;
                if !self.args.accepts(rid) {
                    continue;
                }
                let tf = scan.postings.term_freq();
                self.positions.clear();
                scan.postings.positions(&mut self.positions);
                self.next_pos = 0;
                let posting = NativePosting {
                    rid,
                    sid: 1,
                    pos: self.positions.first().copied().unwrap_or(0),
                    tf,
                    weight: 0,
                    rest: tf.saturating_sub(1),
                };
                self.document = Some(posting);
                return Ok(Some(posting));
            }

            let Some(reader) = self.searcher.segment_readers().get(self.next_segment)
            else {
                self.document = None;
                return Ok(None);
            };
            let ord = self.next_segment;
            let base = self.next_base;
            self.next_segment += 1;
            self.next_base += reader.max_doc();
            let postings = reader
                .inverted_index(self.field)?
                .read_postings(term, IndexRecordOption::WithFreqsAndPositions)?;
            self.current = postings.map(|postings| SegmentScan {
                ord,
                base,
                postings,
                started: false,
            });
        }
    }

    fn next_position(&mut self) -> Option<NativePosting> {
        let document = self.document?;
        let pos = *self.positions.get(self.next_pos)?;
        self.next_pos += 1;
        Some(NativePosting {
            pos,
            rest: (self.positions.len() - self.next_pos) as u32,
            ..document
        })
    }
}

impl Engine for TantivyEngine {
    fn object(
        &mut self,
        status: &mut Status,
        name: &str,
    ) -> Option<ObjectInfo> {
        if self.closed {
            status.fail(&Error::Closed { kind: "database" });
            return None;
        }
        [TABLE, LEXICON, INDEX]
            .into_iter()
            .filter(|id| !self.closed_objects.contains(id))
            .filter_map(Self::info)
            .find(|info| info.name == name)
    }

    fn object_info(
        &mut self,
        status: &mut Status,
        id: ObjectId,
    ) -> Option<ObjectInfo> {
        match self.ensure_usable(id) {
            Ok(()) => Self::info(id),
            Err(err) => {
                status.fail(&err);
                None
            }
        }
    }

    fn object_is_open(&self, id: ObjectId) -> bool {
        self.ensure_usable(id).is_ok()
    }

    fn object_close(&mut self, status: &mut Status, id: ObjectId) {
        if let Err(err) = self.ensure_usable(id) {
            status.fail(&err);
            return;
        }
        self.closed_objects.insert(id);
        // The index is built on both tables.
        if id != INDEX {
            self.closed_objects.insert(INDEX);
        }
        let closed = &self.closed_objects;
        self.cursors.retain(|_, state| !closed.contains(&state.owner()));
    }

    fn close_database(&mut self, _status: &mut Status) {
        self.closed = true;
        self.cursors.clear();
    }

    fn term_id(
        &mut self,
        status: &mut Status,
        index: ObjectId,
        key: &[u8],
    ) -> TermId {
        let result = self.ensure_usable(index).and_then(|()| {
            if index != INDEX {
                return Err(Error::InvalidArgument(format!(
                    "object {} is not an index",
                    index.0
                )));
            }
            self.lookup_term(key)
        });
        result.unwrap_or_else(|err| {
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
        self.record_key_of(table, id)
            .unwrap_or_else(|err| {
                status.fail(&err);
                None
            })
    }

    fn table_cursor_open(
        &mut self,
        status: &mut Status,
        table: ObjectId,
        args: &TableCursorArgs,
    ) -> Option<CursorId> {
        match self.open_table_cursor(table, args) {
            Ok(state) => Some(self.register_cursor(state)),
            Err(err) => {
                status.fail(&err);
                None
            }
        }
    }

    fn table_cursor_next(
        &mut self,
        status: &mut Status,
        cursor: CursorId,
    ) -> RecordId {
        if self.closed {
            status.fail(&Error::Closed { kind: "database" });
            return NIL;
        }
        match self.cursors.get_mut(&cursor) {
            Some(CursorState::Table { ids, .. }) => ids.next().unwrap_or(NIL),
            Some(CursorState::Postings(_)) => {
                status.set(ReturnCode::InvalidArgument, "not a table cursor");
                NIL
            }
            None => {
                status.set(
                    ReturnCode::InvalidArgument,
                    format!("unknown cursor {}", cursor.0),
                );
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
        match self.open_ii_cursor(index, term, args) {
            Ok(state) => Some(self.register_cursor(state)),
            Err(err) => {
                status.fail(&err);
                None
            }
        }
    }

    fn ii_cursor_next(
        &mut self,
        status: &mut Status,
        cursor: CursorId,
    ) -> Option<NativePosting> {
        self.scan(cursor)
            .and_then(PostingScan::next_document)
            .unwrap_or_else(|err| {
                status.fail(&err);
                None
            })
    }

    fn ii_cursor_next_pos(
        &mut self,
        status: &mut Status,
        cursor: CursorId,
    ) -> Option<NativePosting> {
        match self.scan(cursor) {
            Ok(scan) => scan.next_position(),
            Err(err) => {
                status.fail(&err);
                None
            }
        }
    }

    fn cursor_close(&mut self, status: &mut Status, cursor: CursorId) {
        if self.cursors.remove(&cursor).is_none() {
            status.set(
                ReturnCode::InvalidArgument,
                format!("cursor {} is not open", cursor.0),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::Context,
        options::{IndexCursorOptions, TableCursorOptions},
    };

    fn engine_with(docs: &[(&str, &str)]) -> TantivyEngine {
        let engine = TantivyEngine::open_in_ram().unwrap();
        let mut writer = engine.writer(15_000_000).unwrap();
        for (path, body) in docs {
            engine.add_document(&writer, path, path, body).unwrap();
        }
        writer.commit().unwrap();
        engine
    }

    fn index_of(ctx: &Context<TantivyEngine>) -> ObjectId {
        ctx.lookup(TantivyEngine::INDEX_NAME).unwrap().id
    }

    #[test]
    fn positions_follow_token_order() {
        let ctx = Context::new(engine_with(&[
            ("a.md", "hello big hello"),
            ("b.md", "say hello"),
        ]));
        let index = index_of(&ctx);
        let term = ctx.term_id(index, b"hello").unwrap().unwrap();

        let postings = ctx
            .postings(index, term, &IndexCursorOptions::with_position())
            .unwrap();
        let seen: Vec<_> = postings
            .iter()
            .map(|p| (p.record_id, p.position, p.term_frequency))
            .collect();
        assert_eq!(seen, vec![(1, 0, 2), (1, 2, 2), (2, 1, 1)]);
    }

    #[test]
    fn document_level_postings() {
        let ctx = Context::new(engine_with(&[
            ("a.md", "rust is fast"),
            ("b.md", "python"),
            ("c.md", "rust rust"),
        ]));
        let index = index_of(&ctx);
        let term = ctx.term_id(index, b"rust").unwrap().unwrap();
        let postings = ctx
            .postings(index, term, &IndexCursorOptions::default())
            .unwrap();
        let docs: Vec<_> =
            postings.iter().map(|p| (p.record_id, p.rest)).collect();
        assert_eq!(docs, vec![(1, 0), (3, 1)]);
    }

    #[test]
    fn unknown_terms_have_no_id() {
        let ctx = Context::new(engine_with(&[("a.md", "hello")]));
        let index = index_of(&ctx);
        assert_eq!(ctx.term_id(index, b"absent").unwrap(), None);
        assert_eq!(ctx.term_id(index, &[0xff, 0xfe]).unwrap(), None);
    }

    #[test]
    fn record_keys_are_paths() {
        let ctx = Context::new(engine_with(&[
            ("notes/a.md", "alpha"),
            ("notes/b.md", "beta"),
        ]));
        let table = ctx.lookup(TantivyEngine::TABLE_NAME).unwrap().id;
        let index = index_of(&ctx);
        let term = ctx.term_id(index, b"beta").unwrap().unwrap();
        let posting = ctx
            .postings(index, term, &IndexCursorOptions::default())
            .unwrap()[0];
        let record = posting.record();
        assert_eq!(record.table, table);
        assert_eq!(
            ctx.record_key(record.table, record.id).unwrap(),
            Some(b"notes/b.md".to_vec())
        );
        let term_record = posting.term();
        assert_eq!(
            ctx.record_key(term_record.table, term_record.id).unwrap(),
            Some(b"beta".to_vec())
        );
    }

    #[test]
    fn deleted_documents_are_skipped() {
        let engine = engine_with(&[("a.md", "shared"), ("b.md", "shared")]);
        let mut writer = engine.writer(15_000_000).unwrap();
        engine.delete_document(&writer, "a.md");
        writer.commit().unwrap();

        let ctx = Context::new(engine);
        let table = ctx.lookup(TantivyEngine::TABLE_NAME).unwrap().id;
        let records = ctx
            .open_table_cursor(table, &TableCursorOptions::default())
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            ctx.record_key(table, records[0].id).unwrap(),
            Some(b"b.md".to_vec())
        );

        let index = index_of(&ctx);
        let shared = ctx.engine().analyze("shared").unwrap().remove(0);
        let term = ctx.term_id(index, shared.as_bytes()).unwrap().unwrap();
        let postings = ctx
            .postings(index, term, &IndexCursorOptions::default())
            .unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].record_id, records[0].id);
    }

    #[test]
    fn deleted_document_has_no_key() {
        let engine = engine_with(&[("a.md", "shared"), ("b.md", "shared")]);
        let mut writer = engine.writer(15_000_000).unwrap();
        engine.delete_document(&writer, "a.md");
        writer.commit().unwrap();

        let ctx = Context::new(engine);
        let table = ctx.lookup(TantivyEngine::TABLE_NAME).unwrap().id;
        let err = ctx.record_key(table, 1).unwrap_err();
        assert_eq!(err.rc(), Some(ReturnCode::InvalidArgument));
        assert_eq!(ctx.record_key(table, 2).unwrap(), Some(b"b.md".to_vec()));
    }

    #[test]
    fn lexicon_cursor_lists_terms_by_prefix() {
        let engine = engine_with(&[("a.md", "rust rustacean python")]);
        let mut expected: Vec<Vec<u8>> = engine
            .analyze("rust rustacean")
            .unwrap()
            .into_iter()
            .map(String::into_bytes)
            .collect();
        expected.sort();
        let ctx = Context::new(engine);
        let lexicon = ctx.lookup(TantivyEngine::LEXICON_NAME).unwrap().id;
        let options = TableCursorOptions {
            prefix: Some(b"rust".to_vec()),
            order_by: OrderBy::Key,
            ..Default::default()
        };
        let records = ctx
            .open_table_cursor(lexicon, &options)
            .unwrap()
            .collect()
            .unwrap();
        let keys: Vec<_> = records
            .iter()
            .map(|r| ctx.record_key(r.table, r.id).unwrap().unwrap())
            .collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn lexicon_cursor_honours_key_range() {
        let engine = engine_with(&[("a.md", "apple banana cherry")]);
        let expected: Vec<Vec<u8>> = engine
            .analyze("banana")
            .unwrap()
            .into_iter()
            .map(String::into_bytes)
            .collect();
        let ctx = Context::new(engine);
        let lexicon = ctx.lookup(TantivyEngine::LEXICON_NAME).unwrap().id;
        let options = TableCursorOptions {
            min: Some(b"b".to_vec()),
            max: Some(b"c".to_vec()),
            ..Default::default()
        };
        let keys: Vec<_> = ctx
            .open_table_cursor(lexicon, &options)
            .unwrap()
            .collect()
            .unwrap()
            .iter()
            .map(|r| ctx.record_key(r.table, r.id).unwrap().unwrap())
            .collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn documents_cannot_be_ordered_by_key() {
        let ctx = Context::new(engine_with(&[("a.md", "x")]));
        let table = ctx.lookup(TantivyEngine::TABLE_NAME).unwrap().id;
        let options = TableCursorOptions {
            order_by: OrderBy::Key,
            ..Default::default()
        };
        let err = ctx.open_table_cursor(table, &options).unwrap_err();
        assert_eq!(err.rc(), Some(ReturnCode::OperationNotSupported));
    }

    #[test]
    fn analyzer_stems_and_lowercases() {
        let engine = TantivyEngine::open_in_ram().unwrap();
        assert_eq!(
            engine.analyze("Running Dogs").unwrap(),
            vec!["run".to_string(), "dog".to_string()]
        );
    }

    #[test]
    fn disk_persistence() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("tantivy");

        {
            let engine = TantivyEngine::open(&dir).unwrap();
            let mut writer = engine.writer(15_000_000).unwrap();
            engine
                .add_document(&writer, "a.md", "A", "persistent data")
                .unwrap();
            writer.commit().unwrap();
        }

        {
            let engine = TantivyEngine::open(&dir).unwrap();
            assert_eq!(engine.document_count().unwrap(), 1);
            let ctx = Context::new(engine);
            let index = index_of(&ctx);
            let key = ctx.engine().analyze("persistent").unwrap().remove(0);
            let term = ctx.term_id(index, key.as_bytes()).unwrap().unwrap();
            let postings = ctx
                .postings(index, term, &IndexCursorOptions::default())
                .unwrap();
            assert_eq!(postings.len(), 1);
        }
    }

    #[test]
    fn closing_the_lexicon_closes_the_index() {
        let ctx = Context::new(engine_with(&[("a.md", "hello")]));
        let index = index_of(&ctx);
        let term = ctx.term_id(index, b"hello").unwrap().unwrap();
        let mut cursor = ctx
            .open_index_cursor(index, term, &IndexCursorOptions::default())
            .unwrap();
        let lexicon = ctx.lookup(TantivyEngine::LEXICON_NAME).unwrap().id;
        ctx.close_object(lexicon).unwrap();
        assert!(cursor.next().unwrap_err().is_closed());
        assert_eq!(ctx.engine().cursors.len(), 0);
    }
}
