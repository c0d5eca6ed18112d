//! Exact-scan cosine similarity index over passage embeddings.
//!
//! Vectors are L2-normalized on insertion so similarity is a plain dot
//! product. At the corpus scale this system targets (thousands of passages)
//! a linear scan answers queries well under a millisecond, and the ordering
//! contract stays exact: descending similarity, ties broken by insertion
//! order.

use adhera_core::{Passage, PassageId};

#[derive(Default)]
pub struct Index {
    passages: Vec<Passage>,
    embeddings: Vec<Vec<f32>>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one passage with its embedding; returns the assigned id.
    ///
    /// Ids are dense and equal to insertion order, so they double as the
    /// tie-break key for equal similarities.
    pub fn add(
        &mut self,
        source: String,
        start: usize,
        text: String,
        mut embedding: Vec<f32>,
    ) -> PassageId {
        let id = self.passages.len();
        normalize(&mut embedding);
        self.passages.push(Passage {
            id,
            source,
            start,
            text,
        });
        self.embeddings.push(embedding);
        id
    }

    /// The k most similar passages to the query, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(&Passage, f32)> {
        let mut query = query.to_vec();
        normalize(&mut query);

        let mut scored: Vec<(usize, f32)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, emb)| (i, dot(&query, emb)))
            .collect();

        // Stable sort keeps insertion order for equal scores.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| (&self.passages[i], score))
            .collect()
    }

    pub fn get(&self, id: PassageId) -> Option<&Passage> {
        self.passages.get(id)
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// L2-normalize a vector in place.
fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
