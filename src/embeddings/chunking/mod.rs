
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;

/// Configuration for fixed-window chunking
///
/// Sizes are measured in characters, not bytes, so multi-byte text is never
/// split inside a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum segment length in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive segments
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl ChunkingConfig {
    /// Reject configurations whose stride would not advance
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }

        if self.overlap >= self.chunk_size {
            return Err(ConfigError::OverlapTooLarge {
                overlap: self.overlap,
                chunk_size: self.chunk_size,
            });
        }

        Ok(())
    }

    /// Distance between the starts of two consecutive segments
    #[inline]
    pub const fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// Splits text into fixed-size, overlapping segments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    #[inline]
    pub fn new(config: ChunkingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[inline]
    pub const fn config(&self) -> ChunkingConfig {
        self.config
    }

    /// Split `text` into segments of at most `chunk_size` characters
    ///
    /// Each segment after the first starts `chunk_size - overlap` characters
    /// after the previous one. Splitting stops as soon as a segment reaches the
    /// end of the text, so the final segment may be shorter than `chunk_size`.
    #[inline]
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let stride = self.config.stride();

        let mut segments = Vec::with_capacity(len.div_ceil(stride));
        let mut start = 0;

        loop {
            let end = (start + self.config.chunk_size).min(len);
            segments.push(chars[start..end].iter().collect::<String>());

            if end == len {
                break;
            }
            start += stride;
        }

        debug!(
            "Chunked {} characters into {} segments (size {}, overlap {})",
            len,
            segments.len(),
            self.config.chunk_size,
            self.config.overlap
        );

        segments
    }

    /// Chunk several documents, keeping segments of each document contiguous
    #[inline]
    pub fn chunk_all<S: AsRef<str>>(&self, documents: &[S]) -> Vec<String> {
        documents
            .iter()
            .flat_map(|document| self.chunk(document.as_ref()))
            .collect()
    }
}
