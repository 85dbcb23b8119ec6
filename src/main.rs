//! CLI for the vector index server

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{prelude::*, EnvFilter};
use vectordb_server::builder::{self, BuildOptions};
use vectordb_server::server::{self, ServerConfig, DEFAULT_GRPC_ADDR, DEFAULT_HTTP_ADDR};
use vectordb_server::validate::{SearchLimits, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_MAX_TOP_K};
use vectordb_server::{HnswParams, IndexHandle, IndexKind, MetricType};

#[derive(Parser)]
#[command(name = "vectordb-server")]
#[command(about = "Serve a pre-built vector index over gRPC and HTTP/JSON", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load an index file and serve it until SIGINT or SIGTERM
    Serve(ServeArgs),
    /// Build an index file from a text file of vectors
    Build(BuildArgs),
    /// Print an index file's metadata as JSON
    Inspect {
        /// Index file to read
        #[arg(long, env = "VECTORDB_INDEX")]
        index: PathBuf,
    },
}

#[derive(Args)]
struct ServeArgs {
    /// Index file to serve
    #[arg(long, env = "VECTORDB_INDEX")]
    index: PathBuf,

    /// gRPC listen address
    #[arg(long, env = "VECTORDB_GRPC_ADDR", default_value = DEFAULT_GRPC_ADDR)]
    grpc_addr: SocketAddr,

    /// HTTP/JSON gateway listen address
    #[arg(long, env = "VECTORDB_HTTP_ADDR", default_value = DEFAULT_HTTP_ADDR)]
    http_addr: SocketAddr,

    /// Largest top_k a request may ask for
    #[arg(long, env = "VECTORDB_MAX_TOP_K", default_value_t = DEFAULT_MAX_TOP_K)]
    max_top_k: usize,

    /// Largest gRPC message in bytes; JSON bodies may be four times this
    #[arg(long, env = "VECTORDB_MAX_MESSAGE_SIZE", default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    max_message_size: usize,

    /// Seconds to wait for in-flight searches during shutdown
    #[arg(long, env = "VECTORDB_DRAIN_TIMEOUT_SECS", default_value_t = 10)]
    drain_timeout_secs: u64,
}

#[derive(Args)]
struct BuildArgs {
    /// Text file with one comma-separated vector per line
    #[arg(long)]
    input: PathBuf,

    /// Where to write the index file
    #[arg(long)]
    output: PathBuf,

    #[arg(long, value_enum, default_value = "l2")]
    metric: MetricArg,

    #[arg(long, value_enum, default_value = "flat")]
    kind: KindArg,

    /// HNSW: max connections per node
    #[arg(long, default_value_t = 16)]
    m: usize,

    /// HNSW: candidate list size while building
    #[arg(long, default_value_t = 200)]
    ef_construction: usize,

    /// HNSW: candidate list size while searching
    #[arg(long, default_value_t = 64)]
    ef_search: usize,

    /// HNSW: seed for level assignment
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(ValueEnum, Clone, Copy)]
enum MetricArg {
    L2,
    InnerProduct,
}

impl From<MetricArg> for MetricType {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::L2 => MetricType::L2,
            MetricArg::InnerProduct => MetricType::InnerProduct,
        }
    }
}

#[derive(ValueEnum, Clone, Copy)]
enum KindArg {
    Flat,
    Hnsw,
}

impl From<KindArg> for IndexKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Flat => IndexKind::Flat,
            KindArg::Hnsw => IndexKind::Hnsw,
        }
    }
}

/// Logs go to stderr; `VECTORDB_LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("VECTORDB_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let result = if json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .flatten_event(true),
            )
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing already initialized, skipping re-initialization");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            ensure!(args.max_top_k >= 1, "--max-top-k must be at least 1");
            ensure!(args.max_message_size >= 1, "--max-message-size must be at least 1");
            let config = ServerConfig {
                index_path: args.index,
                grpc_addr: args.grpc_addr,
                http_addr: args.http_addr,
                limits: SearchLimits {
                    max_top_k: args.max_top_k,
                    max_message_size: args.max_message_size,
                },
                drain_timeout: Duration::from_secs(args.drain_timeout_secs),
            };
            if let Err(e) = server::run(config).await {
                tracing::error!(error = %format!("{e:#}"), "server exited with error");
                return Err(e);
            }
        }
        Commands::Build(args) => {
            let options = BuildOptions {
                metric: args.metric.into(),
                kind: args.kind.into(),
                params: HnswParams::new(args.m, args.ef_construction, args.ef_search),
                seed: args.seed,
            };
            let meta = builder::build_index_file(&args.input, &args.output, &options)
                .with_context(|| format!("failed to build index from {}", args.input.display()))?;
            println!(
                "Built {} index with {} vectors of dimension {} at {}",
                meta.kind, meta.element_count, meta.dimension, meta.path
            );
        }
        Commands::Inspect { index } => {
            let handle = IndexHandle::load(&index)?;
            println!("{}", serde_json::to_string_pretty(&handle.metadata())?);
            handle.release();
        }
    }
    Ok(())
}
