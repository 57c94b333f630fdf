use crate::error::RankingError;
use anyhow::Result;
use tracing::debug;

/// Cosine similarity of one query against every section embedding.
///
/// Scores are positionally aligned with `section_embeddings` and are not
/// normalized across the set.
pub fn score(query_embedding: &[f32], section_embeddings: &[Vec<f32>]) -> Result<Vec<f32>> {
    let scores = section_embeddings
        .iter()
        .map(|embedding| -> Result<f32> {
            if embedding.len() != query_embedding.len() {
                return Err(RankingError::DimensionMismatch {
                    expected: query_embedding.len(),
                    actual: embedding.len(),
                }
                .into());
            }
            Ok(cosine_similarity(query_embedding, embedding))
        })
        .collect::<Result<Vec<_>>>()?;

    debug!("Scored {} sections", scores.len());
    Ok(scores)
}

/// Zero-length vectors score 0.0 against anything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}
