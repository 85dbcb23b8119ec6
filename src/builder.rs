//! Offline index construction for the `build` command.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::info;

use crate::error::{Result, VectorDbError};
use crate::handle::IndexMetadata;
use crate::index::{file, FlatIndex, HnswIndex, HnswParams, IndexFile, IndexKind};
use crate::metric::MetricType;

/// How to build an index.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub metric: MetricType,
    pub kind: IndexKind,
    /// Only used for HNSW.
    pub params: HnswParams,
    /// Seeds HNSW level assignment.
    pub seed: u64,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            metric: MetricType::L2,
            kind: IndexKind::Flat,
            params: HnswParams::default(),
            seed: 42,
        }
    }
}

/// Parse a comma-separated vector such as `"1.0, 2.0, 3.0"`.
pub fn parse_vector(s: &str) -> Result<Vec<f32>> {
    s.split(',')
        .map(|x| {
            x.trim()
                .parse::<f32>()
                .map_err(|_| VectorDbError::InvalidArgument(format!("Invalid float: {}", x)))
        })
        .collect()
}

/// Read one vector per line. Blank lines and lines starting with `#` are skipped.
///
/// Returns the common dimension and all vectors packed back to back.
pub fn read_vectors(reader: impl BufRead) -> Result<(usize, Vec<f32>)> {
    let mut dimension = None;
    let mut vectors = Vec::new();

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let vector = parse_vector(line).map_err(|e| {
            VectorDbError::InvalidArgument(format!("line {}: {}", lineno + 1, e))
        })?;
        match dimension {
            None => dimension = Some(vector.len()),
            Some(d) if d != vector.len() => {
                return Err(VectorDbError::InvalidArgument(format!(
                    "line {}: expected {} components, found {}",
                    lineno + 1,
                    d,
                    vector.len()
                )));
            }
            Some(_) => {}
        }
        vectors.extend_from_slice(&vector);
    }

    let dimension =
        dimension.ok_or_else(|| VectorDbError::InvalidArgument("no vectors in input".to_string()))?;
    Ok((dimension, vectors))
}

/// Build an index over packed vectors.
pub fn build_index(options: &BuildOptions, dimension: usize, vectors: Vec<f32>) -> Result<IndexFile> {
    match options.kind {
        IndexKind::Flat => Ok(IndexFile::flat(FlatIndex::from_vectors(
            options.metric,
            dimension,
            vectors,
        )?)),
        IndexKind::Hnsw => Ok(IndexFile::hnsw(HnswIndex::build(
            options.metric,
            dimension,
            options.params.clone(),
            &vectors,
            options.seed,
        )?)),
    }
}

/// Read vectors from `input`, build an index, and write it to `output`.
pub fn build_index_file(input: &Path, output: &Path, options: &BuildOptions) -> Result<IndexMetadata> {
    let reader = BufReader::new(File::open(input)?);
    let (dimension, vectors) = read_vectors(reader)?;
    let element_count = vectors.len() / dimension;

    info!(
        input = %input.display(),
        kind = %options.kind,
        metric = %options.metric,
        dimension,
        count = element_count,
        "building index"
    );
    let index_file = build_index(options, dimension, vectors)?;
    file::write(output, &index_file)?;
    info!(output = %output.display(), "index written");

    Ok(IndexMetadata {
        path: output.display().to_string(),
        kind: options.kind,
        dimension,
        metric_type: options.metric,
        element_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::IndexHandle;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_parse_vector() {
        assert_eq!(parse_vector("1.0, 2.0, 3.0").unwrap(), vec![1.0, 2.0, 3.0]);
        assert!(parse_vector("1.0, x").is_err());
    }

    #[test]
    fn test_read_vectors() {
        let input = "# header\n0,0\n\n1,1\n2, 2\n";
        let (dimension, vectors) = read_vectors(Cursor::new(input)).unwrap();
        assert_eq!(dimension, 2);
        assert_eq!(vectors, vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_read_vectors_ragged() {
        let err = read_vectors(Cursor::new("0,0\n1,1,1\n")).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_read_vectors_empty() {
        assert!(read_vectors(Cursor::new("\n# nothing\n")).is_err());
    }

    #[test]
    fn test_build_index_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("vectors.txt");
        let output = dir.path().join("out.idx");
        std::fs::write(&input, "0,0,0,0\n1,1,1,1\n2,2,2,2\n").unwrap();

        for kind in [IndexKind::Flat, IndexKind::Hnsw] {
            let options = BuildOptions {
                kind,
                ..BuildOptions::default()
            };
            let meta = build_index_file(&input, &output, &options).unwrap();
            assert_eq!(meta.element_count, 3);

            let handle = IndexHandle::load(&output).unwrap();
            assert_eq!(handle.metadata().kind, kind);
            let result = handle.search(1, &[0.0; 4], 2).unwrap();
            assert_eq!(result.ids, vec![0, 1]);
            assert_eq!(result.distances, vec![0.0, 4.0]);
        }
    }
}
