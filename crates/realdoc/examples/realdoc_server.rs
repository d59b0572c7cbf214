use clap::Parser;
use realdoc::{AppState, Broadcaster, DocumentService, FileStorage, SubscriberRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};

/// Collaborative document server
#[derive(Debug, Parser)]
#[command(name = "realdoc-server", version)]
struct Args {
    /// Address to bind the server to
    #[arg(long, env = "REALDOC_BIND_ADDR", default_value = "127.0.0.1:8000")]
    bind_addr: String,

    /// Directory where documents are stored
    #[arg(long, env = "REALDOC_STORAGE_DIR", default_value = "./realdoc-data")]
    storage_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let args = Args::parse();

    let storage = Arc::new(FileStorage::open(args.storage_dir).await?);
    let registry = Arc::new(SubscriberRegistry::new());
    let broadcaster = Broadcaster::new(registry.clone());
    let service = Arc::new(DocumentService::new(storage, broadcaster));

    let app = realdoc::router(AppState::new(service, registry));

    let listener = TcpListener::bind(&args.bind_addr).await?;
    info!("Server running on http://{}", args.bind_addr);
    info!("WebSocket endpoint at ws://{}/ws/{{document_id}}", args.bind_addr);
    info!("API endpoints:");
    info!("  GET  /api/health               - Health check");
    info!("  GET  /api/documents/:doc_id    - Fetch a document (creates it if unknown)");
    info!("  POST /api/documents/:doc_id    - Save a document and notify subscribers");

    axum::serve(listener, app).await?;

    Ok(())
}
