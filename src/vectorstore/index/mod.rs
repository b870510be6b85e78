
use std::cmp::Ordering;

use super::IndexError;

/// A single search hit: squared Euclidean distance and insertion position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub distance: f32,
    pub id: usize,
}

/// Exact nearest-neighbor index over fixed-dimension vectors
///
/// Vectors are stored row-major in one contiguous buffer. The dimension is
/// fixed by the first vector added; every later vector and every query must
/// match it. Ids are zero-based insertion positions and never change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorIndex {
    dimension: Option<usize>,
    data: Vec<f32>,
}

impl VectorIndex {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from `vectors`, assigning ids in iteration order
    #[inline]
    pub fn build<I>(vectors: I) -> Result<Self, IndexError>
    where
        I: IntoIterator<Item = Vec<f32>>,
    {
        let mut index = Self::new();
        for vector in vectors {
            index.add(&vector)?;
        }
        Ok(index)
    }

    /// Append `vector` and return its id
    #[inline]
    pub fn add(&mut self, vector: &[f32]) -> Result<usize, IndexError> {
        match self.dimension {
            None if vector.is_empty() => return Err(IndexError::EmptyVector),
            None => self.dimension = Some(vector.len()),
            Some(expected) if expected != vector.len() => {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            Some(_) => {}
        }

        let id = self.len();
        self.data.extend_from_slice(vector);
        Ok(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dimension.map_or(0, |d| self.data.len() / d)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub const fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Vector stored under `id`
    #[inline]
    pub fn get(&self, id: usize) -> Option<&[f32]> {
        let dimension = self.dimension?;
        self.data.get(id * dimension..(id + 1) * dimension)
    }

    /// Find the `k` stored vectors closest to `query`
    ///
    /// Results are ordered by ascending squared Euclidean distance, ties by id.
    /// An empty index answers every query with no results.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        let Some(dimension) = self.dimension else {
            return Ok(Vec::new());
        };

        if query.len() != dimension {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        if k == 0 {
            return Ok(Vec::new());
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(dimension)
            .enumerate()
            .map(|(id, vector)| Neighbor {
                distance: squared_euclidean(query, vector),
                id,
            })
            .collect();

        let by_distance = |a: &Neighbor, b: &Neighbor| -> Ordering {
            a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id))
        };

        if neighbors.len() > k {
            neighbors.select_nth_unstable_by(k - 1, by_distance);
            neighbors.truncate(k);
        }
        neighbors.sort_unstable_by(by_distance);

        Ok(neighbors)
    }
}

#[inline]
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
