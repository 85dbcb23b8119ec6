//! End-to-end tests: real gRPC and HTTP listeners on ephemeral ports.

use std::path::Path;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use tonic::transport::Channel;
use vectordb_server::index::file::{self, IndexFile};
use vectordb_server::rpc::get_metadata_response::MetricType as ProtoMetricType;
use vectordb_server::rpc::search_service_client::SearchServiceClient;
use vectordb_server::rpc::{EmptyMessage, SearchRequest};
use vectordb_server::server::{self, RunningServer, ServerConfig};
use vectordb_server::{FlatIndex, IndexHandle, MetricType, VectorDbError};

const SCENARIO: [f32; 12] = [0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0];

fn write_index(dir: &Path, metric: MetricType, dimension: usize, vectors: &[f32]) -> String {
    let path = dir.join("index.vdb");
    let index = FlatIndex::from_vectors(metric, dimension, vectors.to_vec()).unwrap();
    file::write(&path, &IndexFile::flat(index)).unwrap();
    path.display().to_string()
}

async fn start(metric: MetricType, dimension: usize, vectors: &[f32]) -> (TempDir, String, RunningServer) {
    let dir = TempDir::new().unwrap();
    let path = write_index(dir.path(), metric, dimension, vectors);
    let handle = IndexHandle::load(&path).unwrap();
    let server = server::start(handle, &ServerConfig::ephemeral(&path))
        .await
        .unwrap();
    (dir, path, server)
}

async fn start_scenario() -> (TempDir, String, RunningServer) {
    start(MetricType::L2, 4, &SCENARIO).await
}

async fn grpc_client(server: &RunningServer) -> SearchServiceClient<Channel> {
    SearchServiceClient::connect(format!("http://{}", server.grpc_addr()))
        .await
        .unwrap()
}

fn http_url(server: &RunningServer, route: &str) -> String {
    format!("http://{}{}", server.http_addr(), route)
}

async fn stop(server: RunningServer) {
    server.shutdown();
    tokio::time::timeout(Duration::from_secs(10), server.wait())
        .await
        .expect("shutdown timed out")
        .unwrap();
}

fn search_request(num_vectors: i32, vectors: Vec<f32>, top_k: i32) -> SearchRequest {
    SearchRequest {
        num_vectors,
        vectors,
        top_k,
    }
}

#[tokio::test]
async fn test_grpc_search_scenario() {
    let (_dir, _path, server) = start_scenario().await;
    let mut client = grpc_client(&server).await;

    let response = client
        .search(search_request(1, vec![0.0; 4], 2))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.ids, vec![0, 1]);
    assert_eq!(response.distances, vec![0.0, 4.0]);

    stop(server).await;
}

#[tokio::test]
async fn test_grpc_metadata() {
    let (_dir, path, server) = start_scenario().await;
    let mut client = grpc_client(&server).await;

    let meta = client.get_metadata(EmptyMessage {}).await.unwrap().into_inner();
    assert_eq!(meta.index_name, path);
    assert_eq!(meta.dimension, 4);
    assert_eq!(meta.metric_type, ProtoMetricType::L2 as i32);
    assert_eq!(meta.ntotal, 3);

    stop(server).await;
}

#[tokio::test]
async fn test_grpc_shape_mismatch() {
    let (_dir, _path, server) = start_scenario().await;
    let mut client = grpc_client(&server).await;

    let status = client
        .search(search_request(2, vec![0.0; 7], 1))
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::InvalidArgument);
    assert!(status.message().contains("vector(7)"));
    assert!(status.message().contains("(expected 8)"));

    stop(server).await;
}

#[tokio::test]
async fn test_grpc_pads_missing_neighbors() {
    let (_dir, _path, server) = start_scenario().await;
    let mut client = grpc_client(&server).await;

    let response = client
        .search(search_request(1, vec![0.0; 4], 5))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.ids, vec![0, 1, 2, -1, -1]);
    assert_eq!(response.distances.len(), 5);
    assert_eq!(response.distances[3], f32::INFINITY);
    assert_eq!(response.distances[4], f32::INFINITY);

    stop(server).await;
}

#[tokio::test]
async fn test_grpc_rejects_bad_top_k() {
    let (_dir, _path, server) = start_scenario().await;
    let mut client = grpc_client(&server).await;

    for top_k in [0, -1, 100_000] {
        let status = client
            .search(search_request(1, vec![0.0; 4], top_k))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument, "top_k={top_k}");
    }

    stop(server).await;
}

#[tokio::test]
async fn test_grpc_health_reports_serving() {
    use tonic_health::pb::health_check_response::ServingStatus;
    use tonic_health::pb::health_client::HealthClient;
    use tonic_health::pb::HealthCheckRequest;

    let (_dir, _path, server) = start_scenario().await;
    let channel = Channel::from_shared(format!("http://{}", server.grpc_addr()))
        .unwrap()
        .connect()
        .await
        .unwrap();
    let mut health = HealthClient::new(channel);

    let response = health
        .check(HealthCheckRequest {
            service: "vectordb.v1.SearchService".to_string(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.status, ServingStatus::Serving as i32);

    stop(server).await;
}

#[tokio::test]
async fn test_http_metadata() {
    let (_dir, path, server) = start_scenario().await;

    let response = reqwest::get(http_url(&server, "/v1/metadata")).await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({"indexName": path, "dimension": 4, "metricType": "L2", "ntotal": "3"})
    );

    stop(server).await;
}

#[tokio::test]
async fn test_http_search_scenario() {
    let (_dir, _path, server) = start_scenario().await;

    let response = reqwest::Client::new()
        .post(http_url(&server, "/v1/search"))
        .json(&json!({"numVectors": 1, "vectors": [0, 0, 0, 0], "topK": 2}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["ids"], json!(["0", "1"]));
    assert_eq!(body["distances"], json!([0.0, 4.0]));

    stop(server).await;
}

#[tokio::test]
async fn test_http_shape_mismatch_is_400() {
    let (_dir, _path, server) = start_scenario().await;

    let response = reqwest::Client::new()
        .post(http_url(&server, "/v1/search"))
        .json(&json!({"numVectors": 2, "vectors": [0, 0, 0, 0, 0, 0, 0], "topK": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], 3);
    assert!(body["message"].as_str().unwrap().contains("(expected 8)"));
    assert_eq!(body["details"], json!([]));

    stop(server).await;
}

#[tokio::test]
async fn test_http_padding_uses_infinity_strings() {
    let (_dir, _path, server) = start_scenario().await;

    let response = reqwest::Client::new()
        .post(http_url(&server, "/v1/search"))
        .json(&json!({"num_vectors": "1", "vectors": [0, 0, 0, 0], "top_k": 4}))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["ids"], json!(["0", "1", "2", "-1"]));
    assert_eq!(body["distances"][3], json!("Infinity"));

    stop(server).await;
}

#[tokio::test]
async fn test_http_inner_product_index() {
    let (_dir, _path, server) = start(MetricType::InnerProduct, 2, &[1.0, 0.0, 3.0, 0.0]).await;
    let http = reqwest::Client::new();

    let meta: Value = http
        .get(http_url(&server, "/v1/metadata"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(meta["metricType"], "INNER_PRODUCT");

    let body: Value = http
        .post(http_url(&server, "/v1/search"))
        .json(&json!({"numVectors": 1, "vectors": [1, 0], "topK": 3}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["ids"], json!(["1", "0", "-1"]));
    assert_eq!(body["distances"], json!([3.0, 1.0, "-Infinity"]));

    stop(server).await;
}

#[tokio::test]
async fn test_gateway_and_grpc_agree() {
    let vectors: Vec<f32> = (0..64).map(|i| ((i * 37) % 11) as f32 * 0.25).collect();
    let (_dir, _path, server) = start(MetricType::L2, 4, &vectors).await;
    let mut client = grpc_client(&server).await;
    let http = reqwest::Client::new();

    let queries: Vec<f32> = (0..12).map(|i| (i % 5) as f32 * 0.5).collect();
    let grpc = client
        .search(search_request(3, queries.clone(), 4))
        .await
        .unwrap()
        .into_inner();

    let body: Value = http
        .post(http_url(&server, "/v1/search"))
        .json(&json!({"numVectors": 3, "vectors": queries, "topK": 4}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let ids: Vec<i64> = body["ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().parse().unwrap())
        .collect();
    let distances: Vec<f32> = body["distances"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap() as f32)
        .collect();
    assert_eq!(ids, grpc.ids);
    assert_eq!(distances, grpc.distances);

    stop(server).await;
}

#[derive(serde::Deserialize)]
struct SearchJson {
    ids: Vec<String>,
    distances: Vec<Value>,
}

#[tokio::test]
async fn test_http_search_with_response_over_default_grpc_limit() {
    let (_dir, _path, server) = start_scenario().await;

    // 400 * 1024 padded slots encode to well over tonic's 4 MiB default
    let num_vectors = 400;
    let top_k = 1024;
    let response = reqwest::Client::new()
        .post(http_url(&server, "/v1/search"))
        .json(&json!({
            "numVectors": num_vectors,
            "vectors": vec![0.0f32; num_vectors * 4],
            "topK": top_k,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: SearchJson = response.json().await.unwrap();
    assert_eq!(body.ids.len(), num_vectors * top_k);
    assert_eq!(body.distances.len(), num_vectors * top_k);
    assert_eq!(body.ids[..4], ["0", "1", "2", "-1"]);
    assert_eq!(body.distances[top_k - 1], json!("Infinity"));

    stop(server).await;
}

#[tokio::test]
async fn test_http_accepts_body_over_axum_default_limit() {
    let (_dir, _path, server) = start_scenario().await;
    let mut client = grpc_client(&server).await;

    // Roughly 2.9 MB of JSON, 1.3 MB as protobuf
    let num_vectors = 80_000;
    let queries = vec![0.123456f32; num_vectors * 4];

    let grpc = client
        .search(search_request(num_vectors as i32, queries.clone(), 1))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(grpc.ids.len(), num_vectors);

    let response = reqwest::Client::new()
        .post(http_url(&server, "/v1/search"))
        .json(&json!({"numVectors": num_vectors, "vectors": queries, "topK": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: SearchJson = response.json().await.unwrap();
    assert_eq!(body.ids.len(), num_vectors);
    assert!(body.ids.iter().all(|id| id == "0"));

    stop(server).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_searches_are_independent() {
    let (_dir, _path, server) = start_scenario().await;
    let client = grpc_client(&server).await;

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let mut client = client.clone();
            let target = (i % 3) as f32;
            tokio::spawn(async move {
                let response = client
                    .search(search_request(1, vec![target; 4], 1))
                    .await
                    .unwrap()
                    .into_inner();
                (i % 3, response)
            })
        })
        .collect();

    for task in tasks {
        let (expected, response) = task.await.unwrap();
        assert_eq!(response.ids, vec![expected as i64]);
        assert_eq!(response.distances, vec![0.0]);
    }

    stop(server).await;
}

#[tokio::test]
async fn test_search_is_idempotent_and_metadata_stable() {
    let (_dir, _path, server) = start_scenario().await;
    let mut client = grpc_client(&server).await;

    let before = client.get_metadata(EmptyMessage {}).await.unwrap().into_inner();
    let first = client
        .search(search_request(2, vec![0.4; 8], 3))
        .await
        .unwrap()
        .into_inner();
    for _ in 0..10 {
        let again = client
            .search(search_request(2, vec![0.4; 8], 3))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(again, first);
    }
    let after = client.get_metadata(EmptyMessage {}).await.unwrap().into_inner();
    assert_eq!(before, after);

    stop(server).await;
}

#[tokio::test]
async fn test_listeners_close_after_shutdown() {
    let (_dir, _path, server) = start_scenario().await;
    let http_addr = server.http_addr();
    stop(server).await;

    assert!(tokio::net::TcpStream::connect(http_addr).await.is_err());
}

#[test]
fn test_load_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = IndexHandle::load(dir.path().join("missing.vdb")).unwrap_err();
    assert!(matches!(err, VectorDbError::Load { .. }));
}

#[test]
fn test_load_corrupted_file() {
    let dir = TempDir::new().unwrap();
    let path = write_index(dir.path(), MetricType::L2, 4, &SCENARIO);

    let mut bytes = std::fs::read(&path).unwrap();
    let middle = bytes.len() / 2 + 12;
    bytes[middle] ^= 0x5a;
    std::fs::write(&path, &bytes).unwrap();

    let err = IndexHandle::load(&path).unwrap_err();
    assert!(matches!(err, VectorDbError::Load { .. }));
    assert!(err.to_string().contains("checksum"));
}

#[test]
fn test_load_rejects_non_index_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "0,0,0,0\n1,1,1,1\n2,2,2,2\n").unwrap();

    let err = IndexHandle::load(&path).unwrap_err();
    assert!(err.to_string().contains(&path.display().to_string()));
}
