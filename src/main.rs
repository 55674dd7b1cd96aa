use clap::Parser;
use postcursor::{
    Context,
    DataDir,
    Error,
    Result,
    TantivyEngine,
    cli::{
        AddArgs,
        Cli,
        Command,
        PostingsArgs,
        RecordsArgs,
        StatusArgs,
        TermsArgs,
    },
    ingestion,
    walker::{self, FileFilter},
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// Writer heap shared by all indexing threads.
const WRITER_MEMORY: usize = 50_000_000;

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("POSTCURSOR_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let engine = data_dir.open_engine()?;

    match cli.command {
        Command::Add(args) => cmd_add(&engine, &args)?,
        Command::Records(args) => cmd_records(&Context::new(engine), &args)?,
        Command::Postings(args) => {
            cmd_postings(&Context::new(engine), &args)?
        }
        Command::Terms(args) => cmd_terms(&Context::new(engine), &args)?,
        Command::Status(args) => {
            cmd_status(&Context::new(engine), &data_dir, &args)?
        }
        Command::Completions(_) => {}
    }

    Ok(())
}

fn cmd_add(engine: &TantivyEngine, args: &AddArgs) -> Result<()> {
    if !args.path.is_dir() {
        return Err(Error::Config(format!(
            "path is not a directory: {}",
            args.path.display()
        )));
    }
    let filter = FileFilter::new(&args.include)?;
    let files = walker::discover_files(&args.path, &filter)?;
    tracing::info!(files = files.len(), "discovered files");

    let mut writer = engine.writer(WRITER_MEMORY)?;
    let count = ingestion::ingest_files(engine, &mut writer, &files)?;
    println!("Indexed {count} documents from {}", args.path.display());
    Ok(())
}

fn key_string(key: Option<Vec<u8>>) -> String {
    key.map(|k| String::from_utf8_lossy(&k).into_owned())
        .unwrap_or_default()
}

fn cmd_records(ctx: &Context<TantivyEngine>, args: &RecordsArgs) -> Result<()> {
    let table = ctx.lookup(TantivyEngine::TABLE_NAME)?.id;
    let records = ctx.with_table_cursor(table, &args.cursor_options(), |c| {
        c.each()?
            .map(|record| -> Result<_> {
                let record = record?;
                Ok((record.id, key_string(ctx.record_key(table, record.id)?)))
            })
            .collect::<Result<Vec<_>>>()
    })?;

    if args.json {
        let items: Vec<_> = records
            .iter()
            .map(|(id, path)| json!({ "id": id, "path": path }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for (id, path) in &records {
            println!("{id}\t{path}");
        }
    }
    Ok(())
}

fn cmd_postings(
    ctx: &Context<TantivyEngine>,
    args: &PostingsArgs,
) -> Result<()> {
    let mut tokens = ctx.engine().analyze(&args.term)?;
    let key = match (tokens.pop(), tokens.is_empty()) {
        (Some(key), true) => key,
        _ => {
            return Err(Error::InvalidArgument(format!(
                "{:?} does not analyze to a single term",
                args.term
            )));
        }
    };

    let index = ctx.lookup(TantivyEngine::INDEX_NAME)?.id;
    let Some(term) = ctx.term_id(index, key.as_bytes())? else {
        tracing::info!(term = %key, "term not in lexicon");
        if args.json {
            println!("[]");
        }
        return Ok(());
    };

    let options = args.cursor_options();
    let postings = ctx.with_index_cursor(index, term, &options, |c| {
        c.each_default()?
            .map(|handle| handle.map(|h| h.get()))
            .collect::<Result<Vec<_>>>()
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&postings)?);
        return Ok(());
    }
    for posting in &postings {
        let path = key_string(ctx.record_key(posting.table, posting.record_id)?);
        if args.with_position {
            println!(
                "{}\t{path}\tpos={}\ttf={}\trest={}",
                posting.record_id,
                posting.position,
                posting.term_frequency,
                posting.rest
            );
        } else {
            println!(
                "{}\t{path}\ttf={}",
                posting.record_id, posting.term_frequency
            );
        }
    }
    Ok(())
}

fn cmd_terms(ctx: &Context<TantivyEngine>, args: &TermsArgs) -> Result<()> {
    let lexicon = ctx.lookup(TantivyEngine::LEXICON_NAME)?.id;
    let terms = ctx
        .open_table_cursor(lexicon, &args.cursor_options())?
        .collect()?
        .into_iter()
        .map(|record| ctx.record_key(lexicon, record.id).map(key_string))
        .collect::<Result<Vec<_>>>()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&terms)?);
    } else {
        for term in &terms {
            println!("{term}");
        }
    }
    Ok(())
}

fn cmd_status(
    ctx: &Context<TantivyEngine>,
    data_dir: &DataDir,
    args: &StatusArgs,
) -> Result<()> {
    let (documents, segments) = {
        let engine = ctx.engine();
        (engine.document_count()?, engine.segment_count()?)
    };
    let lexicon = ctx.lookup(TantivyEngine::LEXICON_NAME)?.id;
    let terms = ctx
        .open_table_cursor(lexicon, &Default::default())?
        .collect()?
        .len();

    if args.json {
        let status = json!({
            "data_dir": data_dir.root().display().to_string(),
            "documents": documents,
            "segments": segments,
            "terms": terms,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("Data directory: {}", data_dir.root().display());
        println!("Documents: {documents}");
        println!("Segments: {segments}");
        println!("Terms: {terms}");
    }
    Ok(())
}
