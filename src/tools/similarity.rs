//! Brute force face matching over embeddings.
//!
//! Every query is a linear scan over the candidate slice, which is fine for a
//! single user's descriptors (hundreds to low thousands).

use std::cmp::Ordering;

use crate::domain::face::FaceDescriptor;

pub trait HasEmbedding {
    fn embedding(&self) -> &[f32];
}

impl HasEmbedding for FaceDescriptor {
    fn embedding(&self) -> &[f32] {
        &self.embedding
    }
}

impl HasEmbedding for Vec<f32> {
    fn embedding(&self) -> &[f32] {
        self
    }
}

/// Euclidean distance. Embeddings of different sizes come from different models
/// and are never considered similar.
pub fn distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[derive(Debug, Clone, Copy)]
pub struct SimilarityMatch<'a, T> {
    pub item: &'a T,
    pub distance: f32,
}

/// Candidates strictly closer than `threshold`, closest first.
/// Equal distances keep the candidates scan order.
pub fn find_similar<'a, T: HasEmbedding>(target: &[f32], candidates: &'a [T], threshold: f32) -> Vec<SimilarityMatch<'a, T>> {
    let mut matches: Vec<SimilarityMatch<'a, T>> = candidates
        .iter()
        .map(|item| SimilarityMatch { item, distance: distance(target, item.embedding()) })
        .filter(|m| m.distance < threshold)
        .collect();
    matches.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
    matches
}

/// Seed based grouping.
///
/// The first unprocessed item becomes a seed and absorbs every unprocessed item
/// closer than `threshold` to the seed itself. Members are not compared to each
/// other, so two members of a cluster can be far apart. Groups of one are dropped.
/// Result depends on the order of `items`.
pub fn cluster_by_seed<T: HasEmbedding>(items: &[T], threshold: f32) -> Vec<Vec<&T>> {
    let mut processed = vec![false; items.len()];
    let mut clusters = vec![];

    for (seed_index, seed) in items.iter().enumerate() {
        if processed[seed_index] {
            continue;
        }
        processed[seed_index] = true;
        let mut cluster = vec![seed];

        for (index, candidate) in items.iter().enumerate() {
            if processed[index] {
                continue;
            }
            if distance(seed.embedding(), candidate.embedding()) < threshold {
                cluster.push(candidate);
                processed[index] = true;
            }
        }

        if cluster.len() > 1 {
            clusters.push(cluster);
        }
    }
    clusters
}
