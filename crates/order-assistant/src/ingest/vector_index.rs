//! Exact nearest-neighbour index over L2-normalised vectors

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::IngestError;

/// Vectors whose norm falls below this cannot be normalised meaningfully.
const MIN_NORM: f32 = 1e-12;

/// Write side of a vector index: rows are appended in order and row `i`
/// keeps position `i` for the index's lifetime.
pub trait VectorIndex {
    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), IngestError>;
    fn len(&self) -> usize;
    fn dimension(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Flat (brute-force) L2 index. Rows are stored contiguously.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self { dimension, data: Vec::new() }
    }

    pub fn row(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Exhaustive search: the `k` closest rows by squared L2 distance,
    /// nearest first. Not used by the chat flow.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        if query.len() != self.dimension || self.dimension == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self.data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, row)| {
                let distance = row.iter().zip(query).map(|(a, b)| (a - b) * (a - b)).sum::<f32>();
                (position, distance)
            })
            .collect();

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

impl VectorIndex for FlatIndex {
    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), IngestError> {
        if let Some((position, bad)) = vectors.iter().enumerate().find(|(_, v)| v.len() != self.dimension) {
            return Err(IngestError::IndexConsistency(format!(
                "vector {} has dimension {}, index expects {}",
                position,
                bad.len(),
                self.dimension
            )));
        }
        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Scale every vector to unit length in place, so Euclidean distance ranks
/// the same way cosine similarity does.
pub fn normalize_all(vectors: &mut [Vec<f32>]) -> Result<(), IngestError> {
    let degenerate = vectors
        .par_iter_mut()
        .enumerate()
        .filter_map(|(position, vector)| {
            let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
            if !norm.is_finite() || norm < MIN_NORM {
                return Some(position);
            }
            vector.iter_mut().for_each(|x| *x /= norm);
            None
        })
        .min();

    match degenerate {
        Some(position) => Err(IngestError::Embedding(format!(
            "embedding {} has zero or non-finite norm",
            position
        ))),
        None => Ok(()),
    }
}
