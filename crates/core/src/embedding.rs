//! Embedding-function seam.
//!
//! The stores never compute embeddings themselves; an [`EmbeddingFunc`] is
//! injected at construction and called with batches of texts.

/// Turns a batch of texts into one vector per text, in input order.
///
/// Implementations report failures as a message; the calling upsert or query
/// fails as a whole and no partial records are applied.
pub trait EmbeddingFunc: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, String>;
}

impl<F> EmbeddingFunc for F
where
    F: Fn(&[String]) -> Result<Vec<Vec<f32>>, String> + Send + Sync,
{
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, String> {
        self(texts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_embedding_func() {
        let f = |texts: &[String]| -> Result<Vec<Vec<f32>>, String> {
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        };
        let out = f.embed(&["ab".to_string(), "abc".to_string()]).unwrap();
        assert_eq!(out, vec![vec![2.0], vec![3.0]]);
    }
}
