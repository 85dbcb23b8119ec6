//! Gateway error responses.

use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tonic::Code;

/// Error body, shaped like a `google.rpc.Status` in JSON.
///
/// ```json
/// { "code": 3, "message": "top_k must be at least 1, got 0", "details": [] }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric gRPC status code
    pub code: i32,
    pub message: String,
    pub details: Vec<serde_json::Value>,
}

/// A failed gateway call: a gRPC status or a request that could not be transcoded.
#[derive(Debug)]
pub struct GatewayError {
    code: Code,
    status: StatusCode,
    message: String,
}

impl GatewayError {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            status: http_status(code),
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<tonic::Status> for GatewayError {
    fn from(status: tonic::Status) -> Self {
        Self::new(status.code(), status.message())
    }
}

/// A request body that could not be read keeps its HTTP status (413 for an
/// oversized body) but is reported in the usual error shape.
impl From<BytesRejection> for GatewayError {
    fn from(rejection: BytesRejection) -> Self {
        let status = rejection.status();
        let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
            Code::ResourceExhausted
        } else {
            Code::InvalidArgument
        };
        Self {
            code,
            status,
            message: rejection.body_text(),
        }
    }
}

/// HTTP status for a gRPC code.
pub fn http_status(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        Code::InvalidArgument | Code::FailedPrecondition | Code::OutOfRange => {
            StatusCode::BAD_REQUEST
        }
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists | Code::Aborted => StatusCode::CONFLICT,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        // 499 Client Closed Request has no named constant
        Code::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        Code::Unknown | Code::Internal | Code::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status;
        if status.is_server_error() {
            tracing::error!(code = ?self.code, message = %self.message, "gateway call failed");
        } else {
            tracing::debug!(code = ?self.code, message = %self.message, "gateway call rejected");
        }

        let body = ErrorBody {
            code: self.code as i32,
            message: self.message,
            details: Vec::new(),
        };
        (status, Json(body)).into_response()
    }
}
