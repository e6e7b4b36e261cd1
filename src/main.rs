use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use resrank_api::RestApi;
use resrank_core::{BackendKind, HnswParams, IndexOptions};
use resrank_engine::{
    ChatRationaleGenerator, EmbeddingModel, EntityStore, HashingEmbedder, HttpEmbeddingModel,
    InMemoryEnrichmentSource, JsonFileEntitySource, Recommender, RecommenderConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Researcher recommendation engine
#[derive(Parser, Debug)]
#[command(name = "resrank")]
#[command(about = "Recommend researchers for a free-text query", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    settings: Settings,

    /// Log level
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the REST API
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        #[arg(long, env = "PORT", default_value_t = 8000)]
        port: u16,
    },
    /// Run one recommendation and print the results as JSON
    Query {
        text: String,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum EmbedderKind {
    /// OpenAI-compatible embeddings endpoint
    Http,
    /// Offline feature-hashing embedder
    Hashing,
}

#[derive(clap::Args, Debug)]
struct Settings {
    /// JSON array of entity records
    #[arg(long, global = true, env = "ENTITIES_PATH", default_value = "./data/entities.json")]
    entities: PathBuf,

    /// JSON object mapping entity id to supporting documents
    #[arg(long, global = true, env = "ENRICHMENT_PATH")]
    enrichment: Option<PathBuf>,

    /// Nearest-neighbor backend (exact, hnsw)
    #[arg(long, global = true, env = "INDEX_BACKEND", default_value = "exact")]
    backend: String,

    /// HNSW links per node on upper layers
    #[arg(long, global = true, env = "HNSW_MAX_CONNECTIONS", default_value_t = 16)]
    hnsw_max_connections: usize,

    #[arg(long, global = true, env = "HNSW_MAX_LAYERS", default_value_t = 4)]
    hnsw_max_layers: usize,

    #[arg(long, global = true, env = "HNSW_EF_CONSTRUCTION", default_value_t = 200)]
    hnsw_ef_construction: usize,

    #[arg(long, global = true, env = "HNSW_EF_SEARCH", default_value_t = 64)]
    hnsw_ef_search: usize,

    /// Seed for HNSW level assignment
    #[arg(long, global = true, env = "HNSW_SEED", default_value_t = 0x5eed_1dea)]
    hnsw_seed: u64,

    #[arg(long, global = true, value_enum, default_value_t = EmbedderKind::Http)]
    embedder: EmbedderKind,

    #[arg(long, global = true, env = "EMBEDDING_URL")]
    embedding_url: Option<String>,

    #[arg(long, global = true, env = "EMBEDDING_MODEL", default_value = "intfloat/multilingual-e5-large")]
    embedding_model: String,

    #[arg(long, global = true, env = "EMBEDDING_API_KEY")]
    embedding_api_key: Option<String>,

    /// Enables generated rationales; without it the template is used
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[arg(long, global = true, env = "OPENAI_BASE_URL", default_value = ChatRationaleGenerator::DEFAULT_BASE_URL)]
    openai_base_url: String,

    #[arg(long, global = true, env = "OPENAI_TEXT_MODEL", default_value = "gpt-5")]
    text_model: String,

    #[arg(long, global = true, env = "RAG_MAX_TOKENS", default_value_t = 500)]
    rag_max_tokens: u32,

    #[arg(long, global = true, env = "TOP_K", default_value_t = 5)]
    top_k: usize,

    #[arg(long, global = true, env = "SIMILARITY_THRESHOLD", default_value_t = 0.3)]
    similarity_threshold: f32,

    #[arg(long, global = true, env = "JOURNAL_IMPACT_WEIGHT", default_value_t = 0.2)]
    impact_weight: f64,

    #[arg(long, global = true, env = "KEYWORD_WEIGHT", default_value_t = 0.3)]
    keyword_weight: f64,

    /// Comma-separated language classes (ko, en, ja, zh), earliest first
    #[arg(long, global = true, env = "KEYWORD_LANGUAGE_PRIORITY", default_value = "ko,en")]
    keyword_language_priority: String,

    #[arg(long, global = true, env = "RATIONALE_LANGUAGE", default_value = "English")]
    rationale_language: String,

    /// Paragraph length asked of the generator, in characters
    #[arg(long, global = true, env = "RATIONALE_MAX_CHARS", default_value_t = 500)]
    rationale_max_chars: usize,

    /// Coarse filter retrieves top_k times this many hits
    #[arg(long, global = true, env = "OVER_FETCH_FACTOR", default_value_t = 10)]
    over_fetch_factor: usize,

    /// Documents fetched per candidate
    #[arg(long, global = true, env = "ENRICHMENT_LIMIT", default_value_t = 5)]
    enrichment_limit: usize,

    /// Documents attached to each result
    #[arg(long, global = true, env = "TOP_DOCUMENTS", default_value_t = 3)]
    top_documents: usize,

    #[arg(long, global = true, env = "EMBED_TIMEOUT_MS", default_value_t = 10_000)]
    embed_timeout_ms: u64,

    #[arg(long, global = true, env = "ENRICHMENT_TIMEOUT_MS", default_value_t = 5_000)]
    enrichment_timeout_ms: u64,

    #[arg(long, global = true, env = "RATIONALE_TIMEOUT_MS", default_value_t = 20_000)]
    rationale_timeout_ms: u64,
}

impl Settings {
    fn config(&self) -> RecommenderConfig {
        RecommenderConfig {
            top_k: self.top_k,
            similarity_threshold: self.similarity_threshold,
            over_fetch_factor: self.over_fetch_factor,
            impact_weight: self.impact_weight,
            keyword_weight: self.keyword_weight,
            keyword_language_priority: self
                .keyword_language_priority
                .split(',')
                .map(|code| code.trim().to_string())
                .filter(|code| !code.is_empty())
                .collect(),
            enrichment_limit: self.enrichment_limit,
            top_documents: self.top_documents,
            rationale_max_tokens: self.rag_max_tokens,
            rationale_max_chars: self.rationale_max_chars,
            rationale_language: self.rationale_language.clone(),
            embed_timeout: Duration::from_millis(self.embed_timeout_ms),
            enrichment_timeout: Duration::from_millis(self.enrichment_timeout_ms),
            rationale_timeout: Duration::from_millis(self.rationale_timeout_ms),
        }
    }

    /// HNSW parameters are checked when the graph is built; invalid ones
    /// fall back to the exact backend there.
    fn index_options(&self) -> anyhow::Result<IndexOptions> {
        let backend: BackendKind = self.backend.parse()?;
        Ok(IndexOptions {
            backend,
            hnsw: HnswParams {
                max_connections: self.hnsw_max_connections,
                max_layers: self.hnsw_max_layers,
                ef_construction: self.hnsw_ef_construction,
                ef_search: self.hnsw_ef_search,
                seed: self.hnsw_seed,
            },
        })
    }

    fn embedding_model(
        &self,
        dim: usize,
        timeout: Duration,
    ) -> anyhow::Result<Option<Arc<dyn EmbeddingModel>>> {
        match self.embedder {
            EmbedderKind::Hashing => Ok(Some(Arc::new(HashingEmbedder::new(dim)?))),
            EmbedderKind::Http => match self.embedding_url.as_deref() {
                Some(url) => Ok(Some(Arc::new(HttpEmbeddingModel::new(
                    url,
                    self.embedding_model.clone(),
                    self.embedding_api_key.clone(),
                    timeout,
                )?))),
                None => Ok(None),
            },
        }
    }
}

fn build_recommender(settings: &Settings) -> anyhow::Result<Recommender> {
    let config = settings.config();
    config.validate()?;

    let source = Arc::new(JsonFileEntitySource::new(&settings.entities));
    let store = EntityStore::init(source, settings.index_options()?)
        .with_context(|| format!("loading entities from {}", settings.entities.display()))?;
    let dim = store.snapshot().dim();

    let model = settings.embedding_model(dim, config.embed_timeout)?;
    let generator = match settings.openai_api_key.as_deref() {
        Some(key) if !key.trim().is_empty() => Some(ChatRationaleGenerator::new(
            &settings.openai_base_url,
            key,
            settings.text_model.clone(),
            config.rationale_max_tokens,
            config.rationale_timeout,
        )?),
        _ => {
            warn!("No OpenAI API key configured; rationales use the keyword template");
            None
        }
    };

    let mut recommender = Recommender::new(Arc::new(store), model, config)?;
    if let Some(path) = &settings.enrichment {
        let enrichment = InMemoryEnrichmentSource::from_json_file(path)
            .with_context(|| format!("loading enrichment documents from {}", path.display()))?;
        info!(entities = enrichment.len(), "Enrichment documents loaded");
        recommender = recommender.with_enrichment(Arc::new(enrichment));
    }
    if let Some(generator) = generator {
        recommender = recommender.with_generator(Arc::new(generator));
    }
    Ok(recommender)
}

/// Empty index, missing encoder or invalid configuration, possibly under context.
fn is_fatal_startup(e: &anyhow::Error) -> bool {
    e.downcast_ref::<resrank_engine::Error>()
        .map(|cause| cause.is_startup_fatal())
        .unwrap_or(false)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting resrank v{}", env!("CARGO_PKG_VERSION"));
    let recommender = match build_recommender(&cli.settings) {
        Ok(recommender) => Arc::new(recommender),
        Err(e) => {
            if is_fatal_startup(&e) {
                error!(error = %e, "Fatal startup condition, not retrying");
            }
            return Err(e);
        }
    };

    match cli.command {
        Command::Query { text } => {
            let (results, stats) = recommender.recommend_with_stats(&text, None).await?;
            info!(
                results = stats.results_count,
                avg_score = stats.avg_score,
                "Query finished"
            );
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Command::Serve { host, port } => {
            let http_handle = std::thread::spawn(move || {
                let sys = actix_web::rt::System::new();
                sys.block_on(async {
                    if let Err(e) = RestApi::start(recommender, &host, port).await {
                        eprintln!("HTTP server error: {}", e);
                    }
                })
            });

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                }
                _ = tokio::task::spawn_blocking(move || {
                    http_handle.join().ok();
                }) => {
                    info!("HTTP server stopped");
                }
            }
            info!("Shutting down...");
        }
    }
    Ok(())
}
