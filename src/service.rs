//! gRPC search service implementation
//!
//! Validates every request against the loaded index, then runs the search on
//! the blocking pool. The service keeps no mutable state of its own.

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::{error, instrument, warn};

use crate::error::VectorDbError;
use crate::handle::IndexHandle;
use crate::metric::MetricType;
use crate::rpc::get_metadata_response::MetricType as ProtoMetricType;
use crate::rpc::search_service_server::{SearchService, SearchServiceServer};
use crate::rpc::{EmptyMessage, GetMetadataResponse, SearchRequest, SearchResponse};
use crate::validate::{validate, SearchLimits};

impl From<MetricType> for ProtoMetricType {
    fn from(metric: MetricType) -> Self {
        match metric {
            MetricType::InnerProduct => ProtoMetricType::InnerProduct,
            MetricType::L2 => ProtoMetricType::L2,
        }
    }
}

/// Serves `vectordb.v1.SearchService` from one shared index.
#[derive(Debug, Clone)]
pub struct SearchServiceImpl {
    index: Arc<IndexHandle>,
    limits: SearchLimits,
}

impl SearchServiceImpl {
    pub fn new(index: Arc<IndexHandle>, limits: SearchLimits) -> Self {
        Self { index, limits }
    }

    pub fn into_server(self) -> SearchServiceServer<Self> {
        let max_message_size = self.limits.max_message_size;
        SearchServiceServer::new(self)
            .max_decoding_message_size(max_message_size)
            .max_encoding_message_size(max_message_size)
    }

    fn metadata_response(&self) -> Result<GetMetadataResponse, VectorDbError> {
        let meta = self.index.metadata();
        let dimension = i32::try_from(meta.dimension).map_err(|_| {
            VectorDbError::Internal(format!("dimension {} does not fit int32", meta.dimension))
        })?;
        let ntotal = i64::try_from(meta.element_count).map_err(|_| {
            VectorDbError::Internal(format!(
                "element count {} does not fit int64",
                meta.element_count
            ))
        })?;

        Ok(GetMetadataResponse {
            index_name: meta.path,
            dimension,
            metric_type: ProtoMetricType::from(meta.metric_type) as i32,
            ntotal,
        })
    }
}

#[tonic::async_trait]
impl SearchService for SearchServiceImpl {
    #[instrument(skip_all)]
    async fn get_metadata(
        &self,
        _request: Request<EmptyMessage>,
    ) -> Result<Response<GetMetadataResponse>, Status> {
        let response = self.metadata_response().map_err(|e| {
            error!(error = %e, "metadata conversion failed");
            Status::from(e)
        })?;
        Ok(Response::new(response))
    }

    #[instrument(skip_all, fields(num_vectors = tracing::field::Empty, top_k = tracing::field::Empty))]
    async fn search(
        &self,
        request: Request<SearchRequest>,
    ) -> Result<Response<SearchResponse>, Status> {
        let req = request.into_inner();
        let span = tracing::Span::current();
        span.record("num_vectors", req.num_vectors);
        span.record("top_k", req.top_k);

        let query = validate(&req, self.index.dimension(), &self.limits).map_err(|e| {
            warn!(error = %e, "rejected search request");
            Status::from(e)
        })?;

        let index = Arc::clone(&self.index);
        let vectors = req.vectors;
        let result = tokio::task::spawn_blocking(move || {
            index.search(query.num_vectors, &vectors, query.top_k)
        })
        .await
        .map_err(|e| {
            error!(error = %e, "search task failed");
            Status::internal(format!("search task failed: {e}"))
        })?
        .map_err(|e| {
            error!(error = %e, "search failed");
            Status::from(e)
        })?;

        Ok(Response::new(SearchResponse {
            ids: result.ids,
            distances: result.distances,
        }))
    }
}
