//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "docqa",
    version,
    about = "Local document Q&A assistant with retrieval-augmented answers",
    long_about = "Docqa ingests PDF documents into a local vector index and answers \
                  natural-language questions about them with a language model, citing the \
                  chunks used as evidence. It can also search arXiv and pull papers straight \
                  into the index."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/docqa/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload and index a PDF document
    Upload {
        /// Path to the PDF file
        file: PathBuf,

        /// Name to register the document under (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Ask a question about indexed documents
    Ask {
        /// Question to ask
        question: String,

        /// Restrict the search to one document
        #[arg(short, long)]
        document: Option<String>,

        /// Number of context chunks to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print the answer and evidence as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize an indexed document
    Summarize {
        /// Document name
        document: String,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search arXiv for papers by keyword
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long)]
        max_results: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Download a paper from arXiv and index it
    Fetch {
        /// arXiv id of the paper (e.g. 1706.03762)
        arxiv_id: String,

        /// Name to register the document under (defaults to <id>.pdf)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// List indexed documents
    List {
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a document and its index entries
    Delete {
        /// Document name
        document: String,
    },

    /// Show storage statistics
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_ask_with_document_filter() {
        let cli = Cli::parse_from([
            "docqa",
            "ask",
            "What is the main contribution?",
            "--document",
            "paper.pdf",
            "-k",
            "4",
        ]);

        match cli.command {
            Commands::Ask {
                question,
                document,
                top_k,
                json,
            } => {
                assert_eq!(question, "What is the main contribution?");
                assert_eq!(document.as_deref(), Some("paper.pdf"));
                assert_eq!(top_k, Some(4));
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parse_fetch() {
        let cli = Cli::parse_from(["docqa", "fetch", "1706.03762"]);
        match cli.command {
            Commands::Fetch { arxiv_id, name } => {
                assert_eq!(arxiv_id, "1706.03762");
                assert!(name.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
