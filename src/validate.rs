//! Request validation, run before any search work.

use crate::error::{Result, VectorDbError};
use crate::rpc::SearchRequest;

pub const DEFAULT_MAX_TOP_K: usize = 1024;

/// Largest protobuf message either front end sends or accepts (64 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Worst-case encoded size of one result slot: a 10-byte varint id (`-1`)
/// plus a 4-byte float.
const RESULT_SLOT_BYTES: usize = 14;

/// Field tags and length prefixes of the two packed fields.
const RESPONSE_FRAMING_BYTES: usize = 32;

/// Per-request bounds configured at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub max_top_k: usize,
    /// Applies to gRPC messages in both directions and, scaled for JSON, to
    /// gateway request bodies.
    pub max_message_size: usize,
}

impl SearchLimits {
    /// Upper bound on an encoded `SearchResponse` with `slots` results.
    pub fn response_size(slots: usize) -> usize {
        slots
            .saturating_mul(RESULT_SLOT_BYTES)
            .saturating_add(RESPONSE_FRAMING_BYTES)
    }
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_top_k: DEFAULT_MAX_TOP_K,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// A request whose shape matches the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedQuery {
    pub num_vectors: usize,
    pub top_k: usize,
}

/// Check `request` against the index dimension and the configured limits.
///
/// Argument checks run first (`num_vectors >= 0`, `1 <= top_k <= max_top_k`),
/// then `len(vectors) == num_vectors * dimension`, and last the result must
/// fit in one response message.
pub fn validate(
    request: &SearchRequest,
    dimension: usize,
    limits: &SearchLimits,
) -> Result<ValidatedQuery> {
    let num_vectors = usize::try_from(request.num_vectors).map_err(|_| {
        VectorDbError::InvalidArgument(format!(
            "num_vectors must be non-negative, got {}",
            request.num_vectors
        ))
    })?;

    if request.top_k < 1 {
        return Err(VectorDbError::InvalidArgument(format!(
            "top_k must be at least 1, got {}",
            request.top_k
        )));
    }
    // top_k is positive here, so the cast is lossless
    let top_k = request.top_k as usize;
    if top_k > limits.max_top_k {
        return Err(VectorDbError::InvalidArgument(format!(
            "top_k({top_k}) exceeds the maximum of {}",
            limits.max_top_k
        )));
    }

    let expected = num_vectors.checked_mul(dimension).ok_or_else(|| {
        VectorDbError::InvalidArgument(format!(
            "num vectors({num_vectors}) * dimension({dimension}) overflows"
        ))
    })?;

    let actual = request.vectors.len();
    if actual != expected {
        return Err(VectorDbError::ShapeMismatch {
            expected,
            actual,
            num_vectors,
            dimension,
        });
    }

    let slots = num_vectors.saturating_mul(top_k);
    if SearchLimits::response_size(slots) > limits.max_message_size {
        return Err(VectorDbError::InvalidArgument(format!(
            "num vectors({num_vectors}) * top_k({top_k}) results exceed the {} byte response limit",
            limits.max_message_size
        )));
    }

    Ok(ValidatedQuery { num_vectors, top_k })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn request(num_vectors: i32, len: usize, top_k: i32) -> SearchRequest {
        SearchRequest {
            num_vectors,
            vectors: vec![0.0; len],
            top_k,
        }
    }

    #[test]
    fn test_valid_request() {
        let q = validate(&request(2, 8, 3), 4, &SearchLimits::default()).unwrap();
        assert_eq!(q, ValidatedQuery { num_vectors: 2, top_k: 3 });
    }

    #[test]
    fn test_shape_mismatch() {
        let err = validate(&request(2, 7, 1), 4, &SearchLimits::default()).unwrap_err();
        match err {
            VectorDbError::ShapeMismatch { expected, actual, .. } => {
                assert_eq!(expected, 8);
                assert_eq!(actual, 7);
            }
            other => panic!("expected shape mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_vectors_is_valid() {
        let q = validate(&request(0, 0, 1), 4, &SearchLimits::default()).unwrap();
        assert_eq!(q.num_vectors, 0);
    }

    #[test]
    fn test_negative_num_vectors() {
        let err = validate(&request(-1, 0, 1), 4, &SearchLimits::default()).unwrap_err();
        assert!(matches!(err, VectorDbError::InvalidArgument(_)));
    }

    #[test]
    fn test_top_k_bounds() {
        let limits = SearchLimits {
            max_top_k: 10,
            ..SearchLimits::default()
        };
        assert!(validate(&request(1, 4, 0), 4, &limits).is_err());
        assert!(validate(&request(1, 4, -3), 4, &limits).is_err());
        assert!(validate(&request(1, 4, 11), 4, &limits).is_err());
        assert!(validate(&request(1, 4, 10), 4, &limits).is_ok());
    }

    #[test]
    fn test_argument_errors_take_precedence_over_shape() {
        let err = validate(&request(1, 3, 0), 4, &SearchLimits::default()).unwrap_err();
        assert!(matches!(err, VectorDbError::InvalidArgument(_)));
    }

    #[test]
    fn test_result_must_fit_response_limit() {
        let limits = SearchLimits {
            max_top_k: 1024,
            max_message_size: 16_000,
        };
        assert!(validate(&request(1, 4, 1000), 4, &limits).is_ok());

        let err = validate(&request(2, 8, 1000), 4, &limits).unwrap_err();
        match err {
            VectorDbError::InvalidArgument(message) => {
                assert!(message.contains("response limit"), "{message}");
            }
            other => panic!("expected invalid argument, got {other:?}"),
        }
    }

    #[test]
    fn test_default_limits_admit_full_batches() {
        // 1000 queries at the largest top_k still fit one response
        assert!(validate(&request(1000, 4000, 1024), 4, &SearchLimits::default()).is_ok());
    }

    proptest! {
        #[test]
        fn prop_accepts_exactly_matching_shape(
            num_vectors in 0i32..50,
            dimension in 1usize..64,
            delta in -3i64..4,
        ) {
            let expected = num_vectors as usize * dimension;
            let len = (expected as i64 + delta).max(0) as usize;
            let result = validate(&request(num_vectors, len, 1), dimension, &SearchLimits::default());
            prop_assert_eq!(result.is_ok(), len == expected);
        }
    }
}
