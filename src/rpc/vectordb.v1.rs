// @generated
// This file is @generated by prost-build.
#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct EmptyMessage {}
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct GetMetadataResponse {
    #[prost(string, tag = "1")]
    pub index_name: ::prost::alloc::string::String,
    #[prost(int32, tag = "2")]
    pub dimension: i32,
    #[prost(enumeration = "get_metadata_response::MetricType", tag = "3")]
    pub metric_type: i32,
    #[prost(int64, tag = "4")]
    pub ntotal: i64,
}
/// Nested message and enum types in `GetMetadataResponse`.
pub mod get_metadata_response {
    /// Numbering follows the index library's metric ids.
    #[derive(
        Clone,
        Copy,
        Debug,
        PartialEq,
        Eq,
        Hash,
        PartialOrd,
        Ord,
        ::prost::Enumeration
    )]
    #[repr(i32)]
    pub enum MetricType {
        InnerProduct = 0,
        L2 = 1,
    }
    impl MetricType {
        /// String value of the enum field names used in the ProtoBuf definition.
        ///
        /// The values are not transformed in any way and thus are considered stable
        /// (if the ProtoBuf definition does not change) and safe for programmatic use.
        pub fn as_str_name(&self) -> &'static str {
            match self {
                Self::InnerProduct => "INNER_PRODUCT",
                Self::L2 => "L2",
            }
        }
        /// Creates an enum from field names used in the ProtoBuf definition.
        pub fn from_str_name(value: &str) -> ::core::option::Option<Self> {
            match value {
                "INNER_PRODUCT" => Some(Self::InnerProduct),
                "L2" => Some(Self::L2),
                _ => None,
            }
        }
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SearchRequest {
    #[prost(int32, tag = "1")]
    pub num_vectors: i32,
    /// num_vectors * dimension components, query after query.
    #[prost(float, repeated, tag = "2")]
    pub vectors: ::prost::alloc::vec::Vec<f32>,
    #[prost(int32, tag = "3")]
    pub top_k: i32,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SearchResponse {
    /// num_vectors * top_k entries. Unfilled slots hold id -1.
    #[prost(int64, repeated, tag = "1")]
    pub ids: ::prost::alloc::vec::Vec<i64>,
    #[prost(float, repeated, tag = "2")]
    pub distances: ::prost::alloc::vec::Vec<f32>,
}
include!("vectordb.v1.tonic.rs");
// @@protoc_insertion_point(module)
