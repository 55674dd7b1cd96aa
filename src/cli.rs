use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::{
    engine::{Order, OrderBy},
    options::{IndexCursorOptions, PostingMode, TableCursorOptions},
};

#[derive(Debug, Parser)]
#[command(
    name = "postcursor",
    about = "Walk the records and postings of a full-text index"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Index the files under a directory
    Add(AddArgs),
    /// List documents with a table cursor
    Records(RecordsArgs),
    /// List the postings of a term with an index cursor
    Postings(PostingsArgs),
    /// List lexicon entries
    Terms(TermsArgs),
    /// Show index statistics
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

#[derive(Debug, Parser)]
pub struct AddArgs {
    /// Directory to index
    pub path: PathBuf,

    /// Glob applied to relative paths (repeatable; default: *.md and *.txt)
    #[arg(short = 'i', long = "include")]
    pub include: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl From<SortOrder> for Order {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Asc => Order::Ascending,
            SortOrder::Desc => Order::Descending,
        }
    }
}

#[derive(Debug, Parser)]
pub struct RecordsArgs {
    /// Traversal order
    #[arg(long, value_enum, default_value = "asc")]
    pub order: SortOrder,

    /// Records to skip
    #[arg(long, default_value = "0")]
    pub offset: usize,

    /// Maximum number of records
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RecordsArgs {
    pub fn cursor_options(&self) -> TableCursorOptions {
        TableCursorOptions {
            order: self.order.into(),
            offset: self.offset,
            limit: self.limit,
            ..Default::default()
        }
    }
}

#[derive(Debug, Parser)]
pub struct PostingsArgs {
    /// The term; analyzed the same way document bodies are
    pub term: String,

    /// Report every occurrence instead of one posting per document
    #[arg(short = 'p', long)]
    pub with_position: bool,

    /// Reuse a single posting while iterating
    #[arg(long)]
    pub reuse: bool,

    /// Smallest record id to report
    #[arg(long)]
    pub min_id: Option<u32>,

    /// Largest record id to report
    #[arg(long)]
    pub max_id: Option<u32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl PostingsArgs {
    pub fn cursor_options(&self) -> IndexCursorOptions {
        IndexCursorOptions {
            with_position: self.with_position,
            min_record_id: self.min_id.unwrap_or(0),
            max_record_id: self.max_id.unwrap_or(0),
            mode: if self.reuse {
                PostingMode::ReuseInPlace
            } else {
                PostingMode::Snapshot
            },
        }
    }
}

#[derive(Debug, Parser)]
pub struct TermsArgs {
    /// Only list terms starting with this prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Maximum number of terms
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl TermsArgs {
    pub fn cursor_options(&self) -> TableCursorOptions {
        TableCursorOptions {
            prefix: self.prefix.as_ref().map(|p| p.as_bytes().to_vec()),
            limit: self.limit,
            order_by: OrderBy::Key,
            ..Default::default()
        }
    }
}

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "postcursor",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_postings_defaults() {
        let cli = Cli::parse_from(["postcursor", "postings", "hello"]);
        match cli.command {
            Command::Postings(args) => {
                assert_eq!(args.term, "hello");
                let options = args.cursor_options();
                assert!(!options.with_position);
                assert_eq!(options.mode, PostingMode::Snapshot);
                assert_eq!(options.min_record_id, 0);
            }
            _ => panic!("expected postings command"),
        }
    }

    #[test]
    fn parse_postings_flags() {
        let cli = Cli::parse_from([
            "postcursor",
            "postings",
            "hello",
            "-p",
            "--reuse",
            "--min-id",
            "2",
        ]);
        let Command::Postings(args) = cli.command else {
            panic!("expected postings command");
        };
        let options = args.cursor_options();
        assert!(options.with_position);
        assert_eq!(options.mode, PostingMode::ReuseInPlace);
        assert_eq!(options.min_record_id, 2);
    }

    #[test]
    fn parse_records_paging() {
        let cli = Cli::parse_from([
            "postcursor",
            "records",
            "--order",
            "desc",
            "--offset",
            "1",
            "-n",
            "5",
        ]);
        let Command::Records(args) = cli.command else {
            panic!("expected records command");
        };
        let options = args.cursor_options();
        assert_eq!(options.order, Order::Descending);
        assert_eq!(options.offset, 1);
        assert_eq!(options.limit, Some(5));
    }

    #[test]
    fn terms_are_key_ordered() {
        let cli =
            Cli::parse_from(["postcursor", "terms", "--prefix", "ru"]);
        let Command::Terms(args) = cli.command else {
            panic!("expected terms command");
        };
        let options = args.cursor_options();
        assert_eq!(options.order_by, OrderBy::Key);
        assert_eq!(options.prefix, Some(b"ru".to_vec()));
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(
            Cli::try_parse_from(["postcursor", "-q", "-v", "status"]).is_err()
        );
    }

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }
}
