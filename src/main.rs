use anyhow::{Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use mmr_summarizer::{
    api, config, embedding, logging,
    processing::{
        SummarizeApi, SummarizeRequest, SummarizeService, Upload,
        chunking::chunk_text,
        types::{DEFAULT_DETAIL, DEFAULT_TEMPERATURE},
    },
    vector_store,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(
    name = "mmr-summarizer",
    version,
    about = "Summarize documents from a small, diverse subset of their chunks"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Summarize a single document and print the outcome as JSON.
    Summarize(SummarizeArgs),
    /// Chunk a document and upsert its chunks into a vector collection.
    Index {
        #[arg(long)]
        collection: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Query a vector collection with free text.
    Search {
        #[arg(long)]
        collection: String,
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
}

#[derive(Args)]
#[command(group(ArgGroup::new("source").required(true).args(["url", "text", "file"])))]
struct SummarizeArgs {
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    text: Option<String>,
    #[arg(long)]
    file: Option<PathBuf>,
    #[arg(long, default_value_t = DEFAULT_DETAIL, allow_negative_numbers = true)]
    detail: i64,
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    config::init_config();
    logging::init_tracing();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Summarize(args) => summarize(args).await,
        Command::Index { collection, file } => index(&collection, &file).await,
        Command::Search {
            collection,
            query,
            limit,
        } => search(&collection, query, limit).await,
    }
}

async fn serve() -> Result<()> {
    let service = SummarizeService::from_config(config::get_config())
        .context("Failed to initialize summarization pipeline")?;
    let app = api::create_router(Arc::new(service));

    let (listener, port) = bind_listener().await.context("Failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.context("Server error")
}

async fn summarize(args: SummarizeArgs) -> Result<()> {
    let service = SummarizeService::from_config(config::get_config())
        .context("Failed to initialize summarization pipeline")?;

    let outcome = match args.file {
        Some(path) => {
            let upload = read_upload(&path).await?;
            service
                .summarize_upload(upload, args.detail, args.temperature)
                .await?
        }
        None => {
            service
                .summarize(SummarizeRequest {
                    url: args.url,
                    text: args.text,
                    detail: args.detail,
                    temperature: args.temperature,
                })
                .await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn index(collection: &str, path: &Path) -> Result<()> {
    let config = config::get_config();
    let upload = read_upload(path).await?;
    let filename = upload.filename.clone();
    let document = SummarizeService::upload_document(upload).await?;
    let chunks = chunk_text(&document.raw_text, &config.chunker_settings())?;
    if chunks.is_empty() {
        tracing::warn!(file = %path.display(), "Nothing to index");
        return Ok(());
    }

    let ids = chunks
        .iter()
        .map(|chunk| format!("{filename}-{}", chunk.index))
        .collect();
    let texts = chunks.into_iter().map(|chunk| chunk.text).collect();

    let embedder = embedding::get_embedding_client(config)?;
    let index = vector_store::get_vector_index(config)?;
    let ids =
        vector_store::index_texts(index.as_ref(), embedder.as_ref(), collection, texts, Some(ids))
            .await?;

    println!("{}", serde_json::to_string_pretty(&ids)?);
    Ok(())
}

async fn search(collection: &str, query: String, limit: usize) -> Result<()> {
    let config = config::get_config();
    let embedder = embedding::get_embedding_client(config)?;
    let index = vector_store::get_vector_index(config)?;
    let mut hits = vector_store::query_texts(
        index.as_ref(),
        embedder.as_ref(),
        collection,
        vec![query],
        limit,
    )
    .await?;

    println!("{}", serde_json::to_string_pretty(&hits.pop().unwrap_or_default())?);
    Ok(())
}

async fn read_upload(path: &Path) -> Result<Upload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Upload { filename, bytes })
}

async fn bind_listener() -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    let config = config::get_config();
    if let Some(port) = config.server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 4100..=4199;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 4100-4199",
    ))
}
