// Embeddings module
// Chunking of raw text and batched conversion of text into vectors

pub mod chunking;


use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use chunking::{Chunker, ChunkingConfig};

/// Tells the embedding model whether a text is being indexed or searched for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    SearchDocument,
    SearchQuery,
}

/// A vector together with the position of the text it was produced from
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedText {
    pub index: usize,
    pub vector: Vec<f32>,
}

/// A remote capability that turns one batch of texts into vectors
pub trait Embedder {
    /// Embed a single request's worth of texts, returning one vector per text in order
    fn embed_batch(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>>;

    /// Largest number of texts accepted in one request
    fn batch_size(&self) -> usize;
}

impl<E: Embedder + ?Sized> Embedder for &E {
    #[inline]
    fn embed_batch(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts, input_type)
    }

    #[inline]
    fn batch_size(&self) -> usize {
        (**self).batch_size()
    }
}

/// Embed `texts` in batches, dropping any batch the embedder fails on
///
/// The returned vectors keep the index of their source text, so callers can
/// tell which inputs survived. A batch that errors, or that answers with the
/// wrong number of vectors, is logged and skipped as a whole.
#[inline]
pub fn embed_texts<E: Embedder + ?Sized>(
    embedder: &E,
    texts: &[String],
    input_type: InputType,
) -> Vec<EmbeddedText> {
    if texts.is_empty() {
        return Vec::new();
    }

    let batch_size = embedder.batch_size().max(1);
    let mut embedded = Vec::with_capacity(texts.len());
    let mut failed_batches = 0;

    for (batch_number, batch) in texts.chunks(batch_size).enumerate() {
        let offset = batch_number * batch_size;

        match embedder.embed_batch(batch, input_type) {
            Ok(vectors) if vectors.len() == batch.len() => {
                embedded.extend(
                    vectors
                        .into_iter()
                        .enumerate()
                        .map(|(i, vector)| EmbeddedText {
                            index: offset + i,
                            vector,
                        }),
                );
            }
            Ok(vectors) => {
                failed_batches += 1;
                warn!(
                    "Discarding batch {}: requested {} embeddings, received {}",
                    batch_number,
                    batch.len(),
                    vectors.len()
                );
            }
            Err(e) => {
                failed_batches += 1;
                warn!("Error embedding batch {}: {:#}", batch_number, e);
            }
        }
    }

    debug!(
        "Embedded {}/{} texts ({} failed batches)",
        embedded.len(),
        texts.len(),
        failed_batches
    );

    embedded
}
