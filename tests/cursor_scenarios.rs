use postcursor::{
    Context,
    CursorState,
    Error,
    IndexCursorOptions,
    MemoryEngine,
    PostingHandle,
    PostingMode,
    ReturnCode,
    TableCursorOptions,
    engine::{ObjectId, TermId},
};
use proptest::prelude::*;

struct Corpus {
    ctx: Context<MemoryEngine>,
    docs: ObjectId,
    index: ObjectId,
}

fn corpus(texts: &[&str]) -> Corpus {
    let mut engine = MemoryEngine::new();
    let docs = engine.create_table("Docs", true).unwrap();
    let terms = engine.create_table("Terms", true).unwrap();
    let index = engine.create_index("Terms.body", docs, terms, true).unwrap();
    for (i, text) in texts.iter().enumerate() {
        let rid = engine.add_record(docs, format!("doc{i}").as_bytes()).unwrap();
        engine.index_text(index, rid, 1, text).unwrap();
    }
    Corpus {
        ctx: Context::new(engine),
        docs,
        index,
    }
}

fn term(c: &Corpus, key: &str) -> TermId {
    c.ctx.term_id(c.index, key.as_bytes()).unwrap().unwrap()
}

#[test]
fn close_is_idempotent() {
    let c = corpus(&["hello"]);
    let mut cursor = c
        .ctx
        .open_index_cursor(c.index, term(&c, "hello"), &Default::default())
        .unwrap();
    let native = cursor.native_id().unwrap();

    cursor.close().unwrap();
    assert!(cursor.is_closed());
    cursor.close().unwrap();
    assert!(cursor.is_closed());
    drop(cursor);

    assert_eq!(c.ctx.engine().close_count(native), 1);
}

#[test]
fn use_after_close_fails() {
    let c = corpus(&["hello"]);
    let mut cursor = c
        .ctx
        .open_index_cursor(c.index, term(&c, "hello"), &Default::default())
        .unwrap();
    cursor.close().unwrap();

    assert!(matches!(cursor.next(), Err(Error::Closed { .. })));
    assert!(matches!(
        cursor.each(PostingMode::Snapshot),
        Err(Error::Closed { .. })
    ));

    let mut table = c
        .ctx
        .open_table_cursor(c.docs, &TableCursorOptions::default())
        .unwrap();
    table.close().unwrap();
    assert!(table.next().unwrap_err().is_closed());
    assert!(table.each().unwrap_err().is_closed());
}

#[test]
fn positions_in_document_order() {
    let c = corpus(&["hello big hello", "say hello"]);
    let mut cursor = c
        .ctx
        .open_index_cursor(
            c.index,
            term(&c, "hello"),
            &IndexCursorOptions::with_position(),
        )
        .unwrap();
    assert_eq!(cursor.state(), CursorState::OnDocument);

    let mut seen = Vec::new();
    for _ in 0..3 {
        let posting = cursor.next().unwrap().unwrap();
        seen.push((posting.record_id, posting.position));
    }
    assert_eq!(seen, vec![(1, 0), (1, 2), (2, 1)]);

    assert_eq!(cursor.next().unwrap(), None);
    assert_eq!(cursor.next().unwrap(), None);
    assert_eq!(cursor.state(), CursorState::Exhausted);
}

#[test]
fn rest_counts_down_within_a_document() {
    let c = corpus(&["x y x z x"]);
    let postings = c
        .ctx
        .postings(c.index, term(&c, "x"), &IndexCursorOptions::with_position())
        .unwrap();
    let rest: Vec<_> = postings.iter().map(|p| (p.position, p.rest)).collect();
    assert_eq!(rest, vec![(0, 2), (2, 1), (4, 0)]);
    assert!(postings.iter().all(|p| p.term_frequency == 3));
}

#[test]
fn reused_posting_aliases_the_last_value() {
    let c = corpus(&["hello big hello", "say hello"]);
    let mut cursor = c
        .ctx
        .open_index_cursor(
            c.index,
            term(&c, "hello"),
            &IndexCursorOptions::with_position(),
        )
        .unwrap();
    let handles: Vec<PostingHandle> = cursor
        .each(PostingMode::ReuseInPlace)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(handles.len(), 3);
    assert!(handles.iter().all(|h| h.ptr_eq(&handles[0])));
    let first = handles[0].get();
    assert_eq!((first.record_id, first.position), (2, 1));
}

#[test]
fn snapshots_stay_independent() {
    let c = corpus(&["hello big hello", "say hello"]);
    let mut cursor = c
        .ctx
        .open_index_cursor(
            c.index,
            term(&c, "hello"),
            &IndexCursorOptions::with_position(),
        )
        .unwrap();
    let handles: Vec<PostingHandle> = cursor
        .each(PostingMode::Snapshot)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    let seen: Vec<_> = handles
        .iter()
        .map(|h| (h.get().record_id, h.get().position))
        .collect();
    assert_eq!(seen, vec![(1, 0), (1, 2), (2, 1)]);
    assert!(!handles[0].ptr_eq(&handles[1]));
}

#[test]
fn table_traversal_closes_native_cursor_once() {
    let mut engine = MemoryEngine::new();
    let users = engine.create_table("Users", true).unwrap();
    for key in ["first", "second", "third"] {
        engine.add_record(users, key.as_bytes()).unwrap();
    }
    let ctx = Context::new(engine);

    let (native, ids) = ctx
        .with_table_cursor(users, &TableCursorOptions::default(), |cursor| {
            let native = cursor.native_id().unwrap();
            let ids = cursor
                .each()?
                .map(|record| record.map(|r| r.id))
                .collect::<postcursor::Result<Vec<_>>>()?;
            Ok((native, ids))
        })
        .unwrap();

    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(ctx.engine().close_count(native), 1);
    assert_eq!(ctx.engine().open_cursor_count(), 0);
}

#[test]
fn failed_open_carries_native_code() {
    let c = corpus(&["hello"]);
    let hello = term(&c, "hello");
    c.ctx
        .engine_mut()
        .fail_next_open(ReturnCode::NoMemoryAvailable, "out of memory");

    let err = c
        .ctx
        .open_index_cursor(c.index, hello, &Default::default())
        .unwrap_err();
    match &err {
        Error::OpenFailed { rc, message, .. } => {
            assert_eq!(*rc, ReturnCode::NoMemoryAvailable);
            assert_eq!(message, "out of memory");
        }
        other => panic!("expected OpenFailed, got {other:?}"),
    }
    assert_eq!(err.rc(), Some(ReturnCode::NoMemoryAvailable));
    assert_eq!(c.ctx.engine().open_cursor_count(), 0);
}

#[test]
fn missing_handle_without_status_is_unknown_error() {
    let c = corpus(&["hello"]);
    c.ctx.engine_mut().fail_next_open(ReturnCode::Success, "");

    let err = c
        .ctx
        .open_table_cursor(c.docs, &TableCursorOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::OpenFailed { .. }));
    assert_eq!(err.rc(), Some(ReturnCode::UnknownError));
    assert!(!err.to_string().is_empty());
    assert_eq!(c.ctx.engine().open_cursor_count(), 0);
}

#[test]
fn failed_drain_still_releases_native_cursor() {
    let c = corpus(&["hello big hello", "say hello"]);
    let cursor = c
        .ctx
        .open_index_cursor(
            c.index,
            term(&c, "hello"),
            &IndexCursorOptions::with_position(),
        )
        .unwrap();
    let native = cursor.native_id().unwrap();
    c.ctx
        .engine_mut()
        .fail_next_call(ReturnCode::NoMemoryAvailable, "allocation failed");

    assert!(cursor.collect().is_err());
    assert_eq!(c.ctx.engine().close_count(native), 1);

    let table = c
        .ctx
        .open_table_cursor(c.docs, &TableCursorOptions::default())
        .unwrap();
    let native = table.native_id().unwrap();
    c.ctx
        .engine_mut()
        .fail_next_call(ReturnCode::NoMemoryAvailable, "allocation failed");
    assert!(table.collect().is_err());
    assert_eq!(c.ctx.engine().close_count(native), 1);
    assert_eq!(c.ctx.engine().open_cursor_count(), 0);
}

#[test]
fn closing_the_table_first_fails_cleanly() {
    let c = corpus(&["hello"]);
    let mut cursor = c
        .ctx
        .open_table_cursor(c.docs, &TableCursorOptions::default())
        .unwrap();
    c.ctx.close_object(c.docs).unwrap();

    assert!(cursor.next().unwrap_err().is_closed());
    cursor.close().unwrap();
}

#[test]
fn dropping_after_context_close_is_silent() {
    let c = corpus(&["hello"]);
    let cursor = c
        .ctx
        .open_index_cursor(c.index, term(&c, "hello"), &Default::default())
        .unwrap();
    c.ctx.close().unwrap();
    drop(cursor);
    assert!(c.ctx.is_closed());
}

fn vocabulary() -> impl Strategy<Value = Vec<Vec<&'static str>>> {
    prop::collection::vec(
        prop::collection::vec(prop::sample::select(vec!["a", "b", "c"]), 0..6),
        1..5,
    )
}

proptest! {
    #[test]
    fn exhaustion_is_terminal(docs in vocabulary(), extra in 1usize..5) {
        let texts: Vec<String> = docs.iter().map(|d| d.join(" ")).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let c = corpus(&refs);
        let expected = docs.iter().flatten().filter(|t| **t == "a").count();

        let Some(a) = c.ctx.term_id(c.index, b"a").unwrap() else {
            prop_assert_eq!(expected, 0);
            return Ok(());
        };
        let mut cursor = c
            .ctx
            .open_index_cursor(c.index, a, &IndexCursorOptions::with_position())
            .unwrap();
        let mut yielded = 0;
        while cursor.next().unwrap().is_some() {
            yielded += 1;
        }
        prop_assert_eq!(yielded, expected);
        for _ in 0..extra {
            prop_assert_eq!(cursor.next().unwrap(), None);
        }
    }

    #[test]
    fn document_postings_match_documents(docs in vocabulary()) {
        let texts: Vec<String> = docs.iter().map(|d| d.join(" ")).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let c = corpus(&refs);
        let expected: Vec<u32> = docs
            .iter()
            .enumerate()
            .filter(|(_, d)| d.contains(&"b"))
            .map(|(i, _)| i as u32 + 1)
            .collect();

        let ids = match c.ctx.term_id(c.index, b"b").unwrap() {
            Some(b) => c
                .ctx
                .postings(c.index, b, &IndexCursorOptions::default())
                .unwrap()
                .iter()
                .map(|p| p.record_id)
                .collect(),
            None => Vec::new(),
        };
        prop_assert_eq!(ids, expected);
    }
}
