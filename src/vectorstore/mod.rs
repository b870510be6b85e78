// Vector store module
// In-memory exact nearest-neighbor index paired with the segment texts it was built from

pub mod documents;
pub mod index;


use thiserror::Error;
use tracing::{debug, info};

use crate::embeddings::EmbeddedText;

pub use documents::DocumentStore;
pub use index::{Neighbor, VectorIndex};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Vectors must have at least one dimension")]
    EmptyVector,
    #[error("Id {id} is out of range for {len} documents")]
    OutOfRange { id: usize, len: usize },
    #[error("Embedding refers to segment {index}, but only {len} segments were given")]
    UnknownSegment { index: usize, len: usize },
}

/// A vector index and the segment texts it was built from
///
/// Id `i` in the index always refers to text `i` in the document store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vectorstore {
    index: VectorIndex,
    documents: DocumentStore,
}

impl Vectorstore {
    /// Pair each embedding with the segment it was computed from
    ///
    /// Segments without an embedding (for example because their batch failed)
    /// are left out, keeping the index and the document store aligned.
    #[inline]
    pub fn build(segments: &[String], embedded: Vec<EmbeddedText>) -> Result<Self, IndexError> {
        let mut store = Self::default();

        for EmbeddedText { index, vector } in embedded {
            let text = segments.get(index).ok_or(IndexError::UnknownSegment {
                index,
                len: segments.len(),
            })?;
            store.index.add(&vector)?;
            store.documents.push(text.clone());
        }

        info!(
            "Built vector store with {} of {} segments (dimension {:?})",
            store.len(),
            segments.len(),
            store.dimension()
        );

        Ok(store)
    }

    /// Texts of the `k` segments nearest to `query`, closest first
    ///
    /// Ids with no matching document are skipped.
    #[inline]
    pub fn retrieve(&self, query: &[f32], k: usize) -> Result<Vec<String>, IndexError> {
        let neighbors = self.index.search(query, k)?;

        let texts = neighbors
            .iter()
            .filter_map(|neighbor| match self.documents.get(neighbor.id) {
                Ok(text) => Some(text.to_string()),
                Err(e) => {
                    debug!("Skipping search hit: {}", e);
                    None
                }
            })
            .collect();

        Ok(texts)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    #[inline]
    pub const fn dimension(&self) -> Option<usize> {
        self.index.dimension()
    }

    #[inline]
    pub const fn index(&self) -> &VectorIndex {
        &self.index
    }

    #[inline]
    pub const fn documents(&self) -> &DocumentStore {
        &self.documents
    }
}
