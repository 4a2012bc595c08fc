use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kbindex::config::{load_config, Config};
use kbindex::embedding::create_provider;
use kbindex::index::sqlite::SqliteIndex;
use kbindex::index::QueryFilter;
use kbindex::indexer::Indexer;
use kbindex::models::{DocumentType, ItemStatus, KnowledgeItem};
use kbindex::search::SearchService;
use kbindex::stats;

#[derive(Parser)]
#[command(name = "kbx", about = "Index and search a local knowledge base", version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./config/kb.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter configuration file
    Init,
    /// Index one knowledge item
    Index {
        /// Knowledge item id
        #[arg(long)]
        id: i64,
        /// Item title (used when the source carries none)
        #[arg(long)]
        title: String,
        /// Source path or URL
        #[arg(long)]
        uri: String,
        /// markdown, website, folder, or pdf
        #[arg(long = "type")]
        document_type: DocumentType,
        #[arg(long)]
        category: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// Index every item listed in a JSON file
    IndexAll {
        /// Path to a JSON array of knowledge items
        #[arg(long)]
        items: PathBuf,
        /// Only index items with this status
        #[arg(long)]
        status: Option<ItemStatus>,
    },
    /// Remove an item's chunks from the index
    Remove {
        /// Knowledge item id
        id: i64,
    },
    /// Semantic search over indexed chunks
    Search {
        /// Query text
        query: String,
        /// Maximum number of results
        #[arg(short = 'n', long, default_value_t = 5)]
        limit: usize,
        /// Restrict to one category (exact match)
        #[arg(long)]
        category: Option<String>,
        /// Restrict to chunks whose tags contain this text
        #[arg(long)]
        tags: Option<String>,
        /// Restrict to these knowledge item ids (comma-separated)
        #[arg(long, value_delimiter = ',')]
        knowledge_ids: Option<Vec<i64>>,
    },
    /// Show collection statistics
    Stats,
}

const CONFIG_TEMPLATE: &str = r#"[index]
persist_directory = "./data"
collection_name = "knowledge"

[chunking]
chunk_size = 1000
chunk_overlap = 200

[loader]
fetch_timeout_secs = 30

[embedding]
# disabled, openai, or ollama
provider = "disabled"
# model = "nomic-embed-text"
# dims = 768
# url = "http://localhost:11434"
"#;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        return run_init(&cli.config);
    }

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => unreachable!(),
        Commands::Index {
            id,
            title,
            uri,
            document_type,
            category,
            tags,
        } => {
            let item = KnowledgeItem {
                id,
                title,
                uri,
                document_type,
                category,
                tags,
                content_hash: None,
                status: ItemStatus::Pending,
                last_fetched_at: None,
                indexed_at: None,
            };
            run_index(&config, &item).await
        }
        Commands::IndexAll { items, status } => run_index_all(&config, &items, status).await,
        Commands::Remove { id } => run_remove(&config, id).await,
        Commands::Search {
            query,
            limit,
            category,
            tags,
            knowledge_ids,
        } => {
            let filter = QueryFilter {
                category,
                tags,
                knowledge_ids,
            };
            run_search(&config, &query, limit, &filter).await
        }
        Commands::Stats => run_stats(&config).await,
    }
}

fn run_init(path: &PathBuf) -> Result<()> {
    if path.exists() {
        anyhow::bail!("config file already exists: {}", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote starter config to {}", path.display());
    println!("Edit the [embedding] section, then run: kbx index --help");
    Ok(())
}

async fn open_stack(config: &Config) -> Result<(Arc<SqliteIndex>, Arc<dyn kbindex::embedding::EmbeddingProvider>)> {
    let index = SqliteIndex::open(
        &config.index.persist_directory,
        &config.index.collection_name,
    )
    .await?;
    let provider = create_provider(&config.embedding)?;
    Ok((Arc::new(index), Arc::from(provider)))
}

async fn run_index(config: &Config, item: &KnowledgeItem) -> Result<()> {
    let (index, provider) = open_stack(config).await?;
    let indexer = Indexer::new(config, provider, index)?;

    let result = indexer.index_item(item).await;
    if result.success {
        println!(
            "Indexed '{}' ({} chunks, hash {})",
            item.title,
            result.chunks_indexed,
            &result.content_hash[..12.min(result.content_hash.len())]
        );
        Ok(())
    } else {
        anyhow::bail!(
            "Indexing '{}' failed: {}",
            item.title,
            result.error.unwrap_or_default()
        )
    }
}

async fn run_index_all(config: &Config, items_path: &PathBuf, status: Option<ItemStatus>) -> Result<()> {
    let json = std::fs::read_to_string(items_path)
        .with_context(|| format!("Failed to read items file: {}", items_path.display()))?;
    let items: Vec<KnowledgeItem> =
        serde_json::from_str(&json).with_context(|| "Failed to parse items file")?;

    let (index, provider) = open_stack(config).await?;
    let indexer = Indexer::new(config, provider, index)?;

    let reports = indexer.index_all(&items, status).await;

    let mut ok = 0usize;
    let mut failed = 0usize;
    for report in &reports {
        if report.result.success {
            ok += 1;
            println!(
                "  ok      {:>5}  {}  ({} chunks)",
                report.knowledge_id, report.title, report.result.chunks_indexed
            );
        } else {
            failed += 1;
            println!(
                "  FAILED  {:>5}  {}  ({})",
                report.knowledge_id,
                report.title,
                report.result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    println!("\n{} indexed, {} failed, {} total", ok, failed, reports.len());

    if failed > 0 && ok == 0 {
        anyhow::bail!("all items failed to index");
    }
    Ok(())
}

async fn run_remove(config: &Config, id: i64) -> Result<()> {
    let (index, provider) = open_stack(config).await?;
    let indexer = Indexer::new(config, provider, index)?;

    if indexer.remove(id).await? {
        println!("Removed knowledge item {} from the index", id);
    } else {
        println!("Knowledge item {} had no indexed chunks", id);
    }
    Ok(())
}

async fn run_search(
    config: &Config,
    query: &str,
    limit: usize,
    filter: &QueryFilter,
) -> Result<()> {
    let (index, provider) = open_stack(config).await?;
    let service = SearchService::new(provider, index);

    let results = service.search(query, limit, filter).await?;
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (rank, r) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} (item {}, chunk {})",
            rank + 1,
            r.score,
            r.title,
            r.knowledge_id,
            r.chunk_index
        );
        println!("   {}", r.uri);
        let preview: String = r.content.chars().take(200).collect();
        println!("   {}\n", preview.replace('\n', " "));
    }
    Ok(())
}

async fn run_stats(config: &Config) -> Result<()> {
    let (index, provider) = open_stack(config).await?;
    let snapshot = stats::gather(
        index.as_ref(),
        provider.as_ref(),
        index.collection_name(),
    )
    .await?;
    println!("{}", stats::render(&snapshot));
    Ok(())
}
