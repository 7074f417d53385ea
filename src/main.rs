//! Server entrypoint.
//!
//! Runs the memory tools over MCP stdio (the default, for editor and agent integrations) or
//! serves the HTTP API. Both transports share one connector built from the environment.
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rmcp::{service::ServiceExt, transport::stdio};
use std::sync::Arc;
use tokio::net::TcpListener;
use vectordb_mcp::{
    api,
    config::Config,
    embedding::create_embedding_provider,
    logging,
    mcp::VectorDbMcpServer,
    store::{VectorStoreConnector, create_backend},
};

#[derive(Parser)]
#[command(
    name = "vectordb-mcp",
    version,
    about = "Store and find memories in a vector database over MCP"
)]
struct Cli {
    /// Transport used to serve requests.
    #[arg(long, value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,
    /// Port for the HTTP transport; overrides SERVER_PORT.
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Transport {
    Stdio,
    Http,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("invalid configuration")?;
    logging::init_tracing(config.log_file.as_deref());

    // Local models may be downloaded and loaded here.
    let embedding_settings = config.embedding.clone();
    let embedding =
        tokio::task::spawn_blocking(move || create_embedding_provider(&embedding_settings))
            .await
            .context("embedding provider setup aborted")?
            .context("failed to build embedding provider")?;
    let backend = create_backend(&config)
        .await
        .context("failed to build vector database backend")?;
    let connector = Arc::new(VectorStoreConnector::new(
        backend,
        embedding,
        config.collection_name.clone(),
    ));

    tracing::info!(
        provider = config.tool_prefix(),
        embedding = config.embedding.provider.label(),
        vector_name = connector.vector_name(),
        vector_size = connector.vector_size(),
        default_collection = connector.default_collection().unwrap_or("<none>"),
        read_only = config.tools.read_only,
        "Starting vectordb-mcp"
    );

    match cli.transport {
        Transport::Stdio => serve_stdio(connector, &config).await,
        Transport::Http => serve_http(connector, &config, cli.port).await,
    }
}

async fn serve_stdio(connector: Arc<VectorStoreConnector>, config: &Config) -> Result<()> {
    let server = VectorDbMcpServer::new(connector, config.tools.clone(), config.tool_prefix());

    let service = server
        .serve(stdio())
        .await
        .context("failed to start MCP server over stdio")?;

    service
        .waiting()
        .await
        .context("MCP server terminated unexpectedly")?;

    Ok(())
}

async fn serve_http(
    connector: Arc<VectorStoreConnector>,
    config: &Config,
    port: Option<u16>,
) -> Result<()> {
    let app = api::create_router(connector, config.tools.search_limit);

    let (listener, port) = bind_listener(port.or(config.server_port))
        .await
        .context("failed to bind HTTP listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app)
        .await
        .context("HTTP server terminated unexpectedly")?;
    Ok(())
}

async fn bind_listener(port: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = port {
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
