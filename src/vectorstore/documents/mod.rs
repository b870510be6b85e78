
use super::IndexError;

/// Segment texts, addressed by the same ids as the vector index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentStore {
    texts: Vec<String>,
}

impl DocumentStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment and return its id
    #[inline]
    pub fn push(&mut self, text: String) -> usize {
        self.texts.push(text);
        self.texts.len() - 1
    }

    #[inline]
    pub fn get(&self, id: usize) -> Result<&str, IndexError> {
        self.texts
            .get(id)
            .map(String::as_str)
            .ok_or(IndexError::OutOfRange {
                id,
                len: self.texts.len(),
            })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.texts.iter().map(String::as_str)
    }
}
