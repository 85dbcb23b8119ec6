//! HTTP/JSON gateway.
//!
//! Each route transcodes its JSON body into a `vectordb.v1` message, calls the
//! gRPC service over a loopback channel, and transcodes the reply back. The
//! gateway does no validation or searching of its own.

pub mod error;
pub mod json;

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tonic::transport::{Channel, Endpoint};
use tracing::info;

use crate::error::Result;
use crate::rpc::search_service_client::SearchServiceClient;
use crate::rpc::{EmptyMessage, SearchRequest};

pub use error::GatewayError;
use json::{MetadataJson, SearchBody, SearchResponseJson};

pub type GatewayClient = SearchServiceClient<Channel>;

/// JSON spells a float in up to four times the bytes protobuf does.
const JSON_EXPANSION: usize = 4;

/// Create a client for the gRPC service listening on `grpc_addr`.
///
/// The channel connects on first use and reconnects after failures. Both
/// directions accept messages up to `max_message_size`, the same limit the
/// service enforces.
pub fn connect(grpc_addr: SocketAddr, max_message_size: usize) -> Result<GatewayClient> {
    let target = dial_addr(grpc_addr);
    let channel = Endpoint::from_shared(format!("http://{target}"))?.connect_lazy();
    Ok(SearchServiceClient::new(channel)
        .max_decoding_message_size(max_message_size)
        .max_encoding_message_size(max_message_size))
}

/// Largest JSON body accepted for a `max_message_size` protobuf message.
pub fn body_limit(max_message_size: usize) -> usize {
    max_message_size.saturating_mul(JSON_EXPANSION)
}

/// A wildcard listen address is reached through loopback.
fn dial_addr(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(Ipv4Addr::LOCALHOST.into(), addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(Ipv6Addr::LOCALHOST.into(), addr.port())
        }
        _ => addr,
    }
}

pub fn router(client: GatewayClient, body_limit: usize) -> Router {
    Router::new()
        .route("/v1/metadata", get(get_metadata))
        .route("/v1/search", post(search))
        .route("/v1/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(client)
}

/// Serve the gateway on `listener` until `shutdown` resolves, then finish
/// in-flight requests.
pub async fn serve<F>(
    client: GatewayClient,
    listener: TcpListener,
    body_limit: usize,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "HTTP gateway listening");
    }
    axum::serve(listener, router(client, body_limit))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn get_metadata(
    State(mut client): State<GatewayClient>,
) -> std::result::Result<Json<MetadataJson>, GatewayError> {
    let response = client.get_metadata(EmptyMessage {}).await?;
    Ok(Json(response.into_inner().into()))
}

async fn search(
    State(mut client): State<GatewayClient>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> std::result::Result<Json<SearchResponseJson>, GatewayError> {
    let body = body?;
    let body: SearchBody = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::invalid_argument(format!("invalid request body: {e}")))?;

    let response = client.search(SearchRequest::from(body)).await?;
    Ok(Json(response.into_inner().into()))
}

async fn healthz() -> &'static str {
    "ok"
}
