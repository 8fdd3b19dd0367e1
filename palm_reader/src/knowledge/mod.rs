pub mod chunker;
pub mod embeddings;
pub mod index;

pub use chunker::TextChunker;
pub use embeddings::{Embedder, EmbeddingError, OpenAiEmbedder};
pub use index::{IndexError, KnowledgeIndex};

use std::sync::Arc;
use tracing::instrument;

/// Read-only palmistry knowledge, searched by feature descriptions.
pub struct KnowledgeBase {
    index: KnowledgeIndex,
    embedder: Arc<dyn Embedder>,
}

impl KnowledgeBase {
    pub fn new(index: KnowledgeIndex, embedder: Arc<dyn Embedder>) -> Self {
        if !index.is_empty() && index.model != embedder.model() {
            tracing::warn!(
                "Knowledge index was built with `{}` but queries use `{}`",
                index.model,
                embedder.model()
            );
        }
        Self { index, embedder }
    }

    pub fn len(&self) -> usize {
        self.index.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Top `top_k` snippet texts for each query, in query order, without
    /// repeats.
    #[instrument(skip(self, queries), fields(queries = queries.len()))]
    pub async fn lookup(
        &self,
        queries: &[String],
        top_k: usize,
    ) -> Result<Vec<String>, EmbeddingError> {
        if self.index.is_empty() || queries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_embeddings = self.embedder.embed(queries).await?;

        let mut meanings: Vec<String> = Vec::new();
        for embedding in &query_embeddings {
            if embedding.len() != self.index.dimensions {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.index.dimensions,
                    got: embedding.len(),
                });
            }
            for hit in self.index.search(embedding, top_k) {
                if !meanings.iter().any(|m| m == &hit.snippet.text) {
                    meanings.push(hit.snippet.text.clone());
                }
            }
        }

        tracing::debug!("Retrieved {} knowledge snippets", meanings.len());
        Ok(meanings)
    }
}
