//! Index + metadata artifact pair
//!
//! The vector index (bincode) and the record list (JSON) are written as a
//! matched pair: row `i` of the index always describes metadata entry `i`.
//! Both files are staged next to their targets and renamed into place only
//! after both were written completely.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::vector_index::{FlatIndex, VectorIndex};
use crate::error::IngestError;
use crate::records::OrderRecord;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub index: PathBuf,
    pub metadata: PathBuf,
}

impl ArtifactPaths {
    pub fn new(index: impl Into<PathBuf>, metadata: impl Into<PathBuf>) -> Self {
        Self { index: index.into(), metadata: metadata.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("faiss_index.bin"), dir.join("metadata.json"))
    }
}

/// Serialized form of the vector index file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexArtifact {
    pub format_version: u32,
    pub embedding_model: String,
    pub built_at: DateTime<Utc>,
    /// Key of each row, used to check the pairing with the metadata file.
    pub tracking_numbers: Vec<String>,
    pub index: FlatIndex,
}

/// A vector index together with the source objects its rows were built from.
/// Metadata entries are kept exactly as they appeared in the record source.
#[derive(Debug, Clone)]
pub struct EmbeddingIndex {
    pub artifact: IndexArtifact,
    pub metadata: Vec<Value>,
}

impl EmbeddingIndex {
    pub fn new(embedding_model: &str, index: FlatIndex, tracking_numbers: Vec<String>, metadata: Vec<Value>) -> Self {
        Self {
            artifact: IndexArtifact {
                format_version: FORMAT_VERSION,
                embedding_model: embedding_model.to_string(),
                built_at: Utc::now(),
                tracking_numbers,
                index,
            },
            metadata,
        }
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.artifact.index.dimension()
    }

    /// Check the parallel-array invariant.
    pub fn verify(&self) -> Result<(), IngestError> {
        let rows = self.artifact.index.len();
        let keys = self.artifact.tracking_numbers.len();
        let records = self.metadata.len();
        if rows != records || keys != records {
            return Err(IngestError::IndexConsistency(format!(
                "{} vectors, {} row keys, {} metadata records",
                rows, keys, records
            )));
        }

        for (position, (key, entry)) in self.artifact.tracking_numbers.iter().zip(&self.metadata).enumerate() {
            let record = OrderRecord::deserialize(entry).map_err(|e| {
                IngestError::IndexConsistency(format!("metadata entry {} is not an order: {}", position, e))
            })?;
            if *key != record.tracking_number {
                return Err(IngestError::IndexConsistency(format!(
                    "row {} belongs to {} but metadata holds {}",
                    position, key, record.tracking_number
                )));
            }
        }
        Ok(())
    }

    /// Source objects nearest to an already-normalised query vector.
    pub fn nearest(&self, query: &[f32], k: usize) -> Vec<(&Value, f32)> {
        self.artifact.index
            .search(query, k)
            .into_iter()
            .filter_map(|(position, distance)| self.metadata.get(position).map(|r| (r, distance)))
            .collect()
    }
}

/// Replace the artifact pair on disk. Nothing is published unless both files
/// were encoded and staged; a failure while publishing the metadata restores
/// the previous index file.
pub fn write_artifacts(paths: &ArtifactPaths, index: &EmbeddingIndex) -> Result<(), IngestError> {
    index.verify()?;

    let index_bytes = bincode::serialize(&index.artifact)?;
    let metadata_bytes = serde_json::to_vec_pretty(&index.metadata)?;

    for path in [&paths.index, &paths.metadata] {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
    }

    let staged_index = staging_path(&paths.index);
    let staged_metadata = staging_path(&paths.metadata);

    let staged = stage(&staged_index, &index_bytes).and_then(|_| stage(&staged_metadata, &metadata_bytes));
    if let Err(e) = staged {
        discard(&staged_index);
        discard(&staged_metadata);
        return Err(e.into());
    }

    publish(paths, &staged_index, &staged_metadata)?;
    info!(
        "Wrote {} vectors to {} and metadata to {}",
        index.len(),
        paths.index.display(),
        paths.metadata.display()
    );
    Ok(())
}

/// Load a matched pair, rejecting it if either side disagrees with the other.
pub fn load_artifacts(paths: &ArtifactPaths) -> Result<EmbeddingIndex, IngestError> {
    let index_bytes = fs::read(&paths.index)?;
    let metadata_bytes = fs::read(&paths.metadata)?;

    let artifact: IndexArtifact = bincode::deserialize(&index_bytes)?;
    if artifact.format_version != FORMAT_VERSION {
        return Err(IngestError::IndexConsistency(format!(
            "unsupported index format version {}",
            artifact.format_version
        )));
    }
    let metadata: Vec<Value> = serde_json::from_slice(&metadata_bytes)?;

    let loaded = EmbeddingIndex { artifact, metadata };
    loaded.verify()?;
    debug!("Loaded index with {} rows (dim={})", loaded.len(), loaded.dimension());
    Ok(loaded)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}

fn stage(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn discard(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

fn restore(backup: &Path, target: &Path) -> Result<(), IngestError> {
    fs::rename(backup, target).map_err(|source| {
        warn!(
            "Failed to restore {} from {}: {}",
            target.display(),
            backup.display(),
            source
        );
        IngestError::Rollback { backup: backup.to_path_buf(), source }
    })
}

fn publish(paths: &ArtifactPaths, staged_index: &Path, staged_metadata: &Path) -> Result<(), IngestError> {
    let backup = backup_path(&paths.index);
    let had_previous = paths.index.exists();
    if had_previous {
        fs::rename(&paths.index, &backup)?;
    }

    if let Err(e) = fs::rename(staged_index, &paths.index) {
        discard(staged_index);
        discard(staged_metadata);
        if had_previous {
            restore(&backup, &paths.index)?;
        }
        return Err(e.into());
    }

    if let Err(e) = fs::rename(staged_metadata, &paths.metadata) {
        warn!("Publishing metadata failed, restoring previous index: {}", e);
        discard(staged_metadata);
        if had_previous {
            restore(&backup, &paths.index)?;
        } else {
            discard(&paths.index);
        }
        return Err(e.into());
    }

    if had_previous {
        discard(&backup);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_index() -> EmbeddingIndex {
        let mut flat = FlatIndex::new(2);
        flat.add(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        EmbeddingIndex::new(
            "fake",
            flat,
            vec!["11111".to_string(), "22222".to_string()],
            vec![
                json!({"tracking_number": 11111, "estado": "entregado", "motivo_retraso": null}),
                json!({"tracking_number": "22222", "estado": "en tránsito"}),
            ],
        )
    }

    #[test]
    fn test_write_then_load_pair() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());

        write_artifacts(&paths, &sample_index()).unwrap();
        let loaded = load_artifacts(&paths).unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.dimension(), 2);
        assert_eq!(loaded.metadata[1]["tracking_number"], "22222");
        assert_eq!(loaded.artifact.embedding_model, "fake");
        assert!(!staging_path(&paths.index).exists());
        assert!(!backup_path(&paths.index).exists());
    }

    #[test]
    fn test_metadata_file_holds_source_objects_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let index = sample_index();
        write_artifacts(&paths, &index).unwrap();

        let written: Vec<Value> = serde_json::from_slice(&fs::read(&paths.metadata).unwrap()).unwrap();
        assert_eq!(written, index.metadata);
        assert_eq!(written[0]["tracking_number"], 11111);
        assert!(written[0]["motivo_retraso"].is_null());
        assert!(written[1].get("cliente").is_none());

        let keys: Vec<&String> = written[0].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["tracking_number", "estado", "motivo_retraso"]);
    }

    #[test]
    fn test_inconsistent_index_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let mut index = sample_index();
        index.metadata.pop();

        let err = write_artifacts(&paths, &index).unwrap_err();
        assert!(matches!(err, IngestError::IndexConsistency(_)));
        assert!(!paths.index.exists());
        assert!(!paths.metadata.exists());
    }

    #[test]
    fn test_overwrites_previous_pair() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        write_artifacts(&paths, &sample_index()).unwrap();

        let mut flat = FlatIndex::new(2);
        flat.add(&[vec![0.6, 0.8]]).unwrap();
        let next = EmbeddingIndex::new(
            "fake",
            flat,
            vec!["33333".to_string()],
            vec![json!({"tracking_number": "33333"})],
        );
        write_artifacts(&paths, &next).unwrap();

        let loaded = load_artifacts(&paths).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.metadata[0]["tracking_number"], "33333");
    }

    #[test]
    fn test_failed_metadata_publish_restores_previous_index() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        write_artifacts(&paths, &sample_index()).unwrap();
        let previous_index = fs::read(&paths.index).unwrap();

        // a non-empty directory where the metadata file should go makes the
        // final rename fail after the new index was already moved in
        fs::remove_file(&paths.metadata).unwrap();
        fs::create_dir(&paths.metadata).unwrap();
        fs::write(paths.metadata.join("keep"), b"x").unwrap();

        let mut flat = FlatIndex::new(2);
        flat.add(&[vec![0.6, 0.8]]).unwrap();
        let next = EmbeddingIndex::new(
            "fake",
            flat,
            vec!["33333".to_string()],
            vec![json!({"tracking_number": "33333"})],
        );
        let err = write_artifacts(&paths, &next).unwrap_err();

        assert!(matches!(err, IngestError::Io(_)));
        assert_eq!(fs::read(&paths.index).unwrap(), previous_index);
        assert!(!staging_path(&paths.index).exists());
        assert!(!staging_path(&paths.metadata).exists());
        assert!(!backup_path(&paths.index).exists());
    }

    #[test]
    fn test_failed_restore_names_backup() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("faiss_index.bin.bak");

        let err = restore(&backup, &dir.path().join("faiss_index.bin")).unwrap_err();

        assert!(matches!(err, IngestError::Rollback { backup: ref path, .. } if *path == backup));
        assert!(err.to_string().contains("faiss_index.bin.bak"));
    }

    #[test]
    fn test_mismatched_pair_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        write_artifacts(&paths, &sample_index()).unwrap();

        let swapped = json!([{"tracking_number": "22222"}, {"tracking_number": "11111"}]);
        fs::write(&paths.metadata, serde_json::to_vec(&swapped).unwrap()).unwrap();

        assert!(matches!(load_artifacts(&paths), Err(IngestError::IndexConsistency(_))));
    }

    #[test]
    fn test_missing_half_of_pair_fails() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        write_artifacts(&paths, &sample_index()).unwrap();
        fs::remove_file(&paths.metadata).unwrap();

        assert!(matches!(load_artifacts(&paths), Err(IngestError::Io(_))));
    }

    #[test]
    fn test_nearest_maps_rows_to_records() {
        let index = sample_index();
        let hits = index.nearest(&[0.0, 1.0], 1);
        assert_eq!(hits[0].0["tracking_number"], "22222");
    }
}
