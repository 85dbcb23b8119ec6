//! Process lifecycle: load the index, serve gRPC and HTTP, shut down in order,
//! drain, and release the index.
//!
//! Shutdown sequence once the coordinator fires:
//! 1. the health service reports NOT_SERVING
//! 2. the HTTP gateway stops accepting and finishes in-flight requests
//! 3. the gRPC server does the same (gateway requests land here, so it goes last)
//! 4. remaining references to the index are drained, then it is released

pub mod shutdown;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic_health::ServingStatus;
use tracing::{error, info, warn};

use crate::error::VectorDbError;
use crate::gateway;
use crate::handle::IndexHandle;
use crate::rpc::search_service_server::SERVICE_NAME;
use crate::service::SearchServiceImpl;
use crate::validate::SearchLimits;

pub use shutdown::ShutdownCoordinator;

pub const DEFAULT_GRPC_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8001";
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Settings for `serve`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub index_path: PathBuf,
    pub grpc_addr: SocketAddr,
    pub http_addr: SocketAddr,
    pub limits: SearchLimits,
    /// How long to wait for in-flight searches after both front ends stop.
    pub drain_timeout: Duration,
}

impl ServerConfig {
    /// Loopback addresses with OS-assigned ports.
    pub fn ephemeral(index_path: impl Into<PathBuf>) -> Self {
        let any_port = SocketAddr::from(([127, 0, 0, 1], 0));
        Self {
            index_path: index_path.into(),
            grpc_addr: any_port,
            http_addr: any_port,
            limits: SearchLimits::default(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

/// Both front ends, up and serving.
#[derive(Debug)]
pub struct RunningServer {
    grpc_addr: SocketAddr,
    http_addr: SocketAddr,
    shutdown: ShutdownCoordinator,
    task: JoinHandle<anyhow::Result<()>>,
}

impl RunningServer {
    /// Address the gRPC server is bound to.
    pub fn grpc_addr(&self) -> SocketAddr {
        self.grpc_addr
    }

    /// Address the HTTP gateway is bound to.
    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    pub fn coordinator(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Start the shutdown sequence without waiting for it.
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// Wait until both front ends stopped and the index was released.
    pub async fn wait(self) -> anyhow::Result<()> {
        self.task.await.context("server task panicked")?
    }
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, VectorDbError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| VectorDbError::Bind { addr, source })
}

/// Bind both listeners and start serving `handle`.
///
/// Returns once both sockets are bound, so bind failures surface here.
pub async fn start(handle: IndexHandle, config: &ServerConfig) -> anyhow::Result<RunningServer> {
    let grpc_listener = bind(config.grpc_addr).await?;
    let http_listener = bind(config.http_addr).await?;
    let grpc_addr = grpc_listener.local_addr()?;
    let http_addr = http_listener.local_addr()?;

    let handle = Arc::new(handle);
    let coordinator = ShutdownCoordinator::new();
    let (gateway_done_tx, gateway_done_rx) = oneshot::channel::<()>();

    // gRPC server
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_service_status(SERVICE_NAME, ServingStatus::Serving)
        .await;
    health_reporter
        .set_service_status("", ServingStatus::Serving)
        .await;

    let service = SearchServiceImpl::new(Arc::clone(&handle), config.limits);
    let grpc_signal = {
        let coordinator = coordinator.clone();
        async move {
            coordinator.wait().await;
            health_reporter
                .set_service_status(SERVICE_NAME, ServingStatus::NotServing)
                .await;
            health_reporter
                .set_service_status("", ServingStatus::NotServing)
                .await;
            // Requests already accepted by the gateway still need this server.
            let _ = gateway_done_rx.await;
            info!("gRPC server shutting down");
        }
    };
    let grpc_task = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            info!(addr = %grpc_addr, service = SERVICE_NAME, "gRPC server listening");
            let result = Server::builder()
                .add_service(health_service)
                .add_service(service.into_server())
                .serve_with_incoming_shutdown(TcpListenerStream::new(grpc_listener), grpc_signal)
                .await;
            if let Err(e) = &result {
                error!(error = %e, "gRPC server failed");
                coordinator.shutdown();
            }
            result.map_err(VectorDbError::from)
        })
    };

    // HTTP gateway
    let max_message_size = config.limits.max_message_size;
    let client = gateway::connect(grpc_addr, max_message_size)?;
    let http_task = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            let signal = {
                let coordinator = coordinator.clone();
                async move { coordinator.wait().await }
            };
            let body_limit = gateway::body_limit(max_message_size);
            let result = gateway::serve(client, http_listener, body_limit, signal).await;
            if let Err(e) = &result {
                error!(error = %e, "HTTP gateway failed");
                coordinator.shutdown();
            }
            info!("HTTP gateway stopped");
            let _ = gateway_done_tx.send(());
            result
        })
    };

    let drain_timeout = config.drain_timeout;
    let task = tokio::spawn(async move {
        let (http_result, grpc_result) = tokio::join!(http_task, grpc_task);
        drain_and_release(handle, drain_timeout).await;

        http_result
            .context("HTTP gateway task panicked")?
            .context("HTTP gateway failed")?;
        grpc_result
            .context("gRPC server task panicked")?
            .context("gRPC server failed")?;
        info!("shutdown complete");
        Ok(())
    });

    Ok(RunningServer {
        grpc_addr,
        http_addr,
        shutdown: coordinator,
        task,
    })
}

/// Wait for in-flight searches to drop their references, then release the
/// index. If the wait times out the last search to finish frees it instead.
async fn drain_and_release(mut handle: Arc<IndexHandle>, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    loop {
        match Arc::try_unwrap(handle) {
            Ok(owned) => {
                owned.release();
                return;
            }
            Err(shared) => {
                if Instant::now() >= deadline {
                    warn!(
                        references = Arc::strong_count(&shared) - 1,
                        "drain timed out, index is freed when the last search completes"
                    );
                    return;
                }
                handle = shared;
                tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
            }
        }
    }
}

/// Load the index, serve until SIGINT or SIGTERM, then shut down.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let path = config.index_path.clone();
    let handle = tokio::task::spawn_blocking(move || IndexHandle::load(path))
        .await
        .context("index loader panicked")?
        .with_context(|| format!("failed to load index {}", config.index_path.display()))?;

    let server = start(handle, &config).await?;
    info!(
        grpc = %server.grpc_addr(),
        http = %server.http_addr(),
        "vectordb-server ready"
    );

    let coordinator = server.coordinator().clone();
    tokio::spawn(async move { coordinator.wait_for_signal().await });

    server.wait().await
}
