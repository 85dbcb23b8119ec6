//! JSON forms of the `vectordb.v1` messages, following the proto3 JSON mapping.
//!
//! - field names are lowerCamelCase; the original snake_case names are accepted on input
//! - int64 values are written as decimal strings
//! - enums are written by value name
//! - non-finite floats are written as `"Infinity"`, `"-Infinity"` and `"NaN"`
//! - `null` or a missing field means the default value

use serde::de::{self, Deserializer};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rpc::get_metadata_response::MetricType as ProtoMetricType;
use crate::rpc::{GetMetadataResponse, SearchRequest, SearchResponse};

/// Body of `POST /v1/search`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SearchBody {
    #[serde(default, alias = "num_vectors", deserialize_with = "de_int32")]
    pub num_vectors: i32,
    #[serde(default, deserialize_with = "de_floats")]
    pub vectors: Vec<f32>,
    #[serde(default, alias = "top_k", deserialize_with = "de_int32")]
    pub top_k: i32,
}

impl From<SearchBody> for SearchRequest {
    fn from(body: SearchBody) -> Self {
        SearchRequest {
            num_vectors: body.num_vectors,
            vectors: body.vectors,
            top_k: body.top_k,
        }
    }
}

/// Body returned by `GET /v1/metadata`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataJson {
    pub index_name: String,
    pub dimension: i32,
    pub metric_type: EnumJson,
    pub ntotal: String,
}

/// An enum value: its name when known, its number otherwise.
#[derive(Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EnumJson {
    Name(&'static str),
    Number(i32),
}

impl From<GetMetadataResponse> for MetadataJson {
    fn from(resp: GetMetadataResponse) -> Self {
        let metric_type = match ProtoMetricType::try_from(resp.metric_type) {
            Ok(metric) => EnumJson::Name(metric.as_str_name()),
            Err(_) => EnumJson::Number(resp.metric_type),
        };
        MetadataJson {
            index_name: resp.index_name,
            dimension: resp.dimension,
            metric_type,
            ntotal: resp.ntotal.to_string(),
        }
    }
}

/// Body returned by `POST /v1/search`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponseJson {
    pub ids: Vec<String>,
    #[serde(serialize_with = "ser_floats")]
    pub distances: Vec<f32>,
}

impl From<SearchResponse> for SearchResponseJson {
    fn from(resp: SearchResponse) -> Self {
        SearchResponseJson {
            ids: resp.ids.iter().map(i64::to_string).collect(),
            distances: resp.distances,
        }
    }
}

fn ser_floats<S: Serializer>(values: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(values.len()))?;
    for &v in values {
        if v.is_nan() {
            seq.serialize_element("NaN")?;
        } else if v == f32::INFINITY {
            seq.serialize_element("Infinity")?;
        } else if v == f32::NEG_INFINITY {
            seq.serialize_element("-Infinity")?;
        } else {
            // serde_json prints the shortest f32 representation
            seq.serialize_element(&v)?;
        }
    }
    seq.end()
}

fn de_int32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    int32_from_value(&value).map_err(de::Error::custom)
}

fn de_floats<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                float_from_value(item).map_err(|e| de::Error::custom(format!("vectors[{i}]: {e}")))
            })
            .collect(),
        other => Err(de::Error::custom(format!(
            "expected an array of floats, got {other}"
        ))),
    }
}

fn int32_from_value(value: &Value) -> Result<i32, String> {
    match value {
        Value::Null => Ok(0),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return i32::try_from(i).map_err(|_| format!("{i} is out of int32 range"));
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= i32::MIN as f64 && f <= i32::MAX as f64 => {
                    Ok(f as i32)
                }
                _ => Err(format!("{n} is not an int32")),
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i32>()
            .map_err(|_| format!("{s:?} is not an int32")),
        other => Err(format!("expected an int32, got {other}")),
    }
}

fn float_from_value(value: &Value) -> Result<f32, String> {
    let f = match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("{n} is not a float"))?,
        Value::String(s) => match s.as_str() {
            "NaN" => return Ok(f32::NAN),
            "Infinity" => return Ok(f32::INFINITY),
            "-Infinity" => return Ok(f32::NEG_INFINITY),
            other => other
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .ok_or_else(|| format!("{other:?} is not a float"))?,
        },
        other => return Err(format!("expected a float, got {other}")),
    };

    let narrowed = f as f32;
    if narrowed.is_infinite() {
        return Err(format!("{f} is out of float range"));
    }
    Ok(narrowed)
}
