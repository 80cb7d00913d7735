//! Offline ingestion: order records -> descriptor texts -> normalised
//! embeddings -> flat vector index + parallel metadata on disk

pub mod artifacts;
pub mod embedder;
pub mod vector_index;

pub use artifacts::{load_artifacts, write_artifacts, ArtifactPaths, EmbeddingIndex, IndexArtifact};
pub use embedder::{Embedder, OllamaEmbedder, DEFAULT_EMBEDDING_MODEL};
pub use vector_index::{normalize_all, FlatIndex, VectorIndex};

use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::IngestError;
use crate::records::{DescriptorBuilder, OrderRecord};

pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub records: usize,
    pub dimension: usize,
    pub index_path: PathBuf,
    pub metadata_path: PathBuf,
}

pub struct IngestPipeline {
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl IngestPipeline {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder, batch_size: DEFAULT_BATCH_SIZE }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Embed every record and build the in-memory index. Nothing touches disk.
    /// `sources[i]` is stored as metadata for row `i` as-is.
    pub async fn build(&self, records: &[OrderRecord], sources: &[Value]) -> Result<EmbeddingIndex, IngestError> {
        if records.is_empty() {
            return Err(IngestError::EmptyInput);
        }
        if sources.len() != records.len() {
            return Err(IngestError::IndexConsistency(format!(
                "{} records but {} source objects",
                records.len(),
                sources.len()
            )));
        }

        let texts: Vec<String> = records.iter().map(DescriptorBuilder::flat).collect();
        info!("Generating embeddings for {} orders", texts.len());

        let mut vectors = Vec::with_capacity(texts.len());
        for (batch_number, batch) in texts.chunks(self.batch_size).enumerate() {
            let embedded = self.embedder.embed(batch).await?;
            if embedded.len() != batch.len() {
                return Err(IngestError::IndexConsistency(format!(
                    "batch {} sent {} texts but received {} vectors",
                    batch_number,
                    batch.len(),
                    embedded.len()
                )));
            }
            debug!("Embedded batch {} ({} texts)", batch_number, batch.len());
            vectors.extend(embedded);
        }

        normalize_all(&mut vectors)?;

        let dimension = vectors.first().map(|v| v.len()).unwrap_or(0);
        if dimension == 0 {
            return Err(IngestError::Embedding("embedder returned empty vectors".to_string()));
        }
        let mut index = FlatIndex::new(dimension);
        index.add(&vectors)?;

        let tracking_numbers = records.iter().map(|r| r.tracking_number.clone()).collect();
        let built = EmbeddingIndex::new(self.embedder.model_id(), index, tracking_numbers, sources.to_vec());
        built.verify()?;
        Ok(built)
    }

    /// Full rebuild: embed, index and replace the artifact pair.
    pub async fn run(
        &self,
        records: &[OrderRecord],
        sources: &[Value],
        paths: &ArtifactPaths,
    ) -> Result<IngestReport, IngestError> {
        let built = self.build(records, sources).await?;
        write_artifacts(paths, &built)?;

        let report = IngestReport {
            records: built.len(),
            dimension: built.dimension(),
            index_path: paths.index.clone(),
            metadata_path: paths.metadata.clone(),
        };
        info!(
            "Index built with {} records (dim={})",
            report.records, report.dimension
        );
        Ok(report)
    }
}
