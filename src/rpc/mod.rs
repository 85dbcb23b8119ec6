//! Protobuf messages and gRPC stubs for `vectordb.v1`.
//!
//! The two `vectordb.v1*.rs` files are generated from
//! `proto/vectordb/v1/search.proto` with `protoc-gen-prost` and
//! `protoc-gen-tonic`; do not edit them by hand.

pub mod vectordb {
    pub mod v1 {
        include!("vectordb.v1.rs");
    }
}

pub use vectordb::v1::*;
