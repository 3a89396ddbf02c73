use docqa::cli::{Cli, Commands, ConfigAction};
use docqa::config::Config;
use docqa::engine::{expand_path, Engine};
use docqa::error::{DocqaError, Result};
use docqa::storage::{StorageManager, StorageStats};

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Upload { file, name } => {
            cmd_upload(cli.config, file, name)?;
        }
        Commands::Ask {
            question,
            document,
            top_k,
            json,
        } => {
            cmd_ask(cli.config, &question, document, top_k, json)?;
        }
        Commands::Summarize { document, json } => {
            cmd_summarize(cli.config, &document, json)?;
        }
        Commands::Search {
            query,
            max_results,
            json,
        } => {
            cmd_search(cli.config, &query, max_results, json)?;
        }
        Commands::Fetch { arxiv_id, name } => {
            cmd_fetch(cli.config, &arxiv_id, name)?;
        }
        Commands::List { json } => {
            cmd_list(cli.config, json)?;
        }
        Commands::Delete { document } => {
            cmd_delete(cli.config, &document)?;
        }
        Commands::Status => {
            cmd_status(cli.config)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "docqa=debug" } else { "docqa=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| DocqaError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })
}

fn cmd_upload(
    config_path: Option<std::path::PathBuf>,
    file: std::path::PathBuf,
    name: Option<String>,
) -> Result<()> {
    let config = load_config(config_path)?;

    let name = match name {
        Some(name) => name,
        None => file
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_string())
            .ok_or_else(|| DocqaError::Config(format!("Cannot derive a name from {:?}", file)))?,
    };

    let bytes = std::fs::read(&file).map_err(|e| DocqaError::Io {
        source: e,
        context: format!("Failed to read {:?}", file),
    })?;

    let engine = Engine::open(config)?;
    let rt = runtime()?;
    let report = rt.block_on(engine.upload(&name, &bytes))?;

    println!("✓ Document processed");
    println!("  Name:   {}", report.document.name);
    println!("  Pages:  {}", report.document.page_count);
    println!("  Chunks: {} ({} embedded)", report.chunks, report.embedded);
    if !report.skipped_pages.is_empty() {
        println!(
            "  ⚠ Pages with no extractable text: {:?}",
            report.skipped_pages
        );
    }

    Ok(())
}

fn cmd_ask(
    config_path: Option<std::path::PathBuf>,
    question: &str,
    document: Option<String>,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(k) = top_k {
        config.retrieval.top_k = k;
    }

    let engine = Engine::open(config)?;
    let rt = runtime()?;
    let answer = rt.block_on(engine.query(question, document.as_deref()))?;

    if json {
        let out = serde_json::to_string_pretty(&answer).map_err(|e| DocqaError::Json {
            source: e,
            context: "Failed to serialize answer".to_string(),
        })?;
        println!("{}", out);
    } else {
        println!("{}", answer.text);
        if !answer.evidence.is_empty() {
            println!("\nEvidence:");
            for chunk in &answer.evidence {
                println!(
                    "  [{:.3}] {} (page {})",
                    chunk.score, chunk.document, chunk.page
                );
            }
        }
    }

    Ok(())
}

fn cmd_summarize(
    config_path: Option<std::path::PathBuf>,
    document: &str,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;

    let engine = Engine::open(config)?;
    let rt = runtime()?;
    let summary = rt.block_on(engine.summarize(document))?;

    if json {
        let out = serde_json::to_string_pretty(&summary).map_err(|e| DocqaError::Json {
            source: e,
            context: "Failed to serialize summary".to_string(),
        })?;
        println!("{}", out);
    } else {
        println!("{}", summary.text);
        println!("\n({} chunks used)", summary.chunks_used);
    }

    Ok(())
}

fn cmd_search(
    config_path: Option<std::path::PathBuf>,
    query: &str,
    max_results: Option<usize>,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;

    let engine = Engine::open(config)?;
    let rt = runtime()?;
    let papers = rt.block_on(engine.search_papers(query, max_results))?;

    if json {
        let out = serde_json::to_string_pretty(&papers).map_err(|e| DocqaError::Json {
            source: e,
            context: "Failed to serialize papers".to_string(),
        })?;
        println!("{}", out);
        return Ok(());
    }

    if papers.is_empty() {
        println!("No papers found for '{}'", query);
        return Ok(());
    }

    println!("Found {} papers for '{}':\n", papers.len(), query);
    for (i, paper) in papers.iter().enumerate() {
        println!("{}. {} [{}]", i + 1, paper.title, paper.arxiv_id);
        if !paper.authors.is_empty() {
            let authors = paper.authors.join(", ");
            println!("   Authors: {}", authors);
        }
        if !paper.published.is_empty() {
            println!("   Published: {}", &paper.published[..10.min(paper.published.len())]);
        }
        println!();
    }
    println!("Use 'docqa fetch <id>' to download and index a paper.");

    Ok(())
}

fn cmd_fetch(
    config_path: Option<std::path::PathBuf>,
    arxiv_id: &str,
    name: Option<String>,
) -> Result<()> {
    let config = load_config(config_path)?;

    let engine = Engine::open(config)?;
    let rt = runtime()?;
    let report = rt.block_on(engine.fetch_paper(arxiv_id, name))?;

    println!("✓ Paper downloaded and indexed");
    println!("  Name:   {}", report.document.name);
    println!("  Pages:  {}", report.document.page_count);
    println!("  Chunks: {}", report.chunks);
    println!("\nYou can now ask questions with 'docqa ask'.");

    Ok(())
}

fn cmd_list(config_path: Option<std::path::PathBuf>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;

    // Listing only needs the store; skip model and API key setup
    let data_dir = expand_path(&config.storage.data_dir)?;
    let storage = StorageManager::new(data_dir)?;
    let documents = storage.database.list_documents()?;

    if json {
        let out = serde_json::to_string_pretty(&documents).map_err(|e| DocqaError::Json {
            source: e,
            context: "Failed to serialize document list".to_string(),
        })?;
        println!("{}", out);
        return Ok(());
    }

    if documents.is_empty() {
        println!("No documents indexed yet. Use 'docqa upload <file.pdf>' to add one.");
        return Ok(());
    }

    println!("Documents: {} total\n", documents.len());
    for doc in &documents {
        println!(
            "  {} - {} pages, {} chunks, {} ({})",
            doc.name,
            doc.page_count,
            doc.chunk_count,
            StorageStats::format_size(doc.byte_size),
            doc.status
        );
    }

    Ok(())
}

fn cmd_delete(config_path: Option<std::path::PathBuf>, document: &str) -> Result<()> {
    let config = load_config(config_path)?;

    // Deletion touches only the store and the index rebuild; use a stub-free
    // path through the storage layer rather than booting the embedding model
    let data_dir = expand_path(&config.storage.data_dir)?;
    let storage = StorageManager::new(data_dir)?;

    let doc = storage
        .database
        .get_document(document)?
        .ok_or_else(|| DocqaError::NotFound {
            name: document.to_string(),
        })?;

    storage.database.delete_document(document)?;
    if storage.database.count_blob_refs(&doc.blob_hash)? == 0 {
        storage.blob_store.delete(&doc.blob_hash)?;
    }

    println!("✓ Deleted {}", document);

    Ok(())
}

fn cmd_status(config_path: Option<std::path::PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let data_dir = expand_path(&config.storage.data_dir)?;
    let storage = StorageManager::new(data_dir)?;

    let stats = storage.stats()?;

    println!("Docqa Status");
    println!("============");
    println!("\nDocuments:  {}", stats.db.document_count);
    println!("Chunks:     {}", stats.db.chunk_count);
    println!("Embeddings: {}", stats.db.embedding_count);
    println!(
        "Documents size: {}",
        StorageStats::format_size(stats.db.total_document_bytes)
    );
    println!(
        "Store size:     {}",
        StorageStats::format_size(stats.store_size)
    );

    let api_key_set = std::env::var(&config.llm.api_key_env)
        .map(|k| !k.trim().is_empty())
        .unwrap_or(false);
    println!(
        "\nLLM credential ({}): {}",
        config.llm.api_key_env,
        if api_key_set { "set" } else { "NOT SET" }
    );

    Ok(())
}

fn cmd_config(config_path: Option<std::path::PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let json = serde_json::to_string_pretty(&config).map_err(|e| DocqaError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| DocqaError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            let config = Config::default();
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
            println!(
                "  Set the {} environment variable before asking questions.",
                config.llm.api_key_env
            );
        }
    }

    Ok(())
}

fn load_config(config_path: Option<std::path::PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'docqa config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        return Ok(config);
    }

    Config::load(&path)
}
