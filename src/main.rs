//! CLI interface for the embedding store

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use embeddb::persistence::engine::{DurableConfig, DurableStore};
use embeddb::{
    AccessCoordinator, DistanceMetric, EmbeddingStore, HnswParams, IndexKind, MemoryStore,
    NewEmbedding, RecordId, Vector, WhereFilter,
};

#[derive(Parser)]
#[command(name = "embeddb")]
#[command(about = "An embedding store with pluggable similarity search", long_about = None)]
struct Cli {
    /// Index type to use for search
    #[arg(long, value_enum, default_value = "flat")]
    index: IndexType,

    /// Distance metric for queries
    #[arg(long, value_enum, default_value = "l2")]
    metric: MetricType,

    /// Space to operate on
    #[arg(long, default_value = "default")]
    space: String,

    /// Data directory for persistence. If set, data is persisted to disk.
    #[arg(long)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy)]
enum IndexType {
    Flat,
    Hnsw,
}

impl IndexType {
    fn kind(self) -> IndexKind {
        match self {
            IndexType::Flat => IndexKind::Flat,
            IndexType::Hnsw => IndexKind::Hnsw(HnswParams::default()),
        }
    }
}

#[derive(ValueEnum, Clone, Copy)]
enum MetricType {
    L2,
    Cosine,
    Ip,
}

impl MetricType {
    fn metric(self) -> DistanceMetric {
        match self {
            MetricType::L2 => DistanceMetric::L2,
            MetricType::Cosine => DistanceMetric::Cosine,
            MetricType::Ip => DistanceMetric::InnerProduct,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Add an embedding
    Add {
        /// Embedding data as comma-separated values (e.g., "1.0,2.0,3.0")
        #[arg(short, long)]
        vector: String,
        /// Source URI for the embedded input
        #[arg(short, long)]
        uri: String,
        /// Optional dataset label
        #[arg(long)]
        dataset: Option<String>,
        /// Optional category label
        #[arg(long)]
        category: Option<String>,
    },
    /// Query for nearest embeddings
    Query {
        /// Query vector as comma-separated values (e.g., "1.0,2.0,3.0")
        query: String,
        /// Number of results to return
        #[arg(short, long, default_value = "10")]
        n_results: usize,
        /// Only match records with this category label
        #[arg(long)]
        category: Option<String>,
    },
    /// Fetch records by metadata, no vector math
    Fetch {
        /// Only match records with this category label
        #[arg(long)]
        category: Option<String>,
        /// Maximum number of records to return
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Count records in the space
    Count,
    /// Delete records by identifier (hex)
    Delete {
        /// Record identifiers to delete
        ids: Vec<String>,
    },
    /// Drop every record in every space
    Reset,
    /// Start the HTTP API server
    Serve {
        /// Address to bind to
        #[arg(long, default_value = "0.0.0.0:3000")]
        addr: String,
    },
}

fn category_filter(category: Option<String>) -> WhereFilter {
    match category {
        Some(c) => WhereFilter::new().with("category", c),
        None => WhereFilter::new(),
    }
}

fn run<S: EmbeddingStore>(
    coordinator: &AccessCoordinator<S>,
    space: &str,
    command: Commands,
) -> Result<()> {
    match command {
        Commands::Add {
            vector,
            uri,
            dataset,
            category,
        } => {
            let v = Vector::from_str(&vector)?;
            let mut item = NewEmbedding::new(v, uri);
            item.dataset = dataset;
            item.category = category;
            let ids = coordinator.add(space, vec![item])?;
            println!("Added embedding with ID: {}", ids[0]);
        }
        Commands::Query {
            query,
            n_results,
            category,
        } => {
            let q = Vector::from_str(&query)?;
            let filter = category_filter(category);
            let filter = (!filter.is_empty()).then_some(&filter);
            let results = coordinator.query(space, &q, n_results, filter)?;

            if results.is_empty() {
                println!("No results found (space is empty)");
            } else {
                println!("Top {} results:", results.len());
                for (i, m) in results.iter().enumerate() {
                    println!("{}. {} (distance: {:.4})", i + 1, m.id, m.distance);
                }
            }
        }
        Commands::Fetch { category, limit } => {
            let filter = category_filter(category);
            let records = coordinator.fetch(space, &filter, None, limit)?;
            if records.is_empty() {
                println!("No records matched");
            } else {
                println!("Records ({} total):", records.len());
                for record in records {
                    println!("  - {}", record.id);
                }
            }
        }
        Commands::Count => {
            println!("{}", coordinator.count(Some(space))?);
        }
        Commands::Delete { ids } => {
            let ids = ids
                .iter()
                .map(|s| RecordId::from_hex(s))
                .collect::<embeddb::error::Result<Vec<_>>>()?;
            let removed = coordinator.delete(space, &ids)?;
            println!("Deleted {} records", removed);
        }
        Commands::Reset => {
            coordinator.reset()?;
            println!("Store reset");
        }
        Commands::Serve { .. } => {
            unreachable!("Serve handled separately");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let metric = cli.metric.metric();
    let kind = cli.index.kind();

    // Serve gets handled first since it needs the async runtime
    if let Commands::Serve { ref addr } = cli.command {
        match cli.data_dir {
            Some(data_dir) => {
                let store = DurableStore::open(data_dir, DurableConfig::default())?;
                embeddb::server::start(addr, store, kind, metric).await?;
            }
            None => {
                embeddb::server::start(addr, MemoryStore::new(), kind, metric).await?;
            }
        }
        return Ok(());
    }

    match cli.data_dir {
        Some(data_dir) => {
            let store = DurableStore::open(data_dir, DurableConfig::default())?;
            let coordinator = AccessCoordinator::new(store, kind, metric);
            run(&coordinator, &cli.space, cli.command)
        }
        None => {
            let coordinator = AccessCoordinator::new(MemoryStore::new(), kind, metric);
            run(&coordinator, &cli.space, cli.command)
        }
    }
}
