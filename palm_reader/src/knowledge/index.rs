use super::{
    chunker::TextChunker,
    embeddings::{Embedder, EmbeddingError},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const INDEX_FILE: &str = "index.json";

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Knowledge index not found at {0:?}, run `build_index` first")]
    NotFound(PathBuf),
    #[error("Knowledge index I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Knowledge index is malformed: {0}")]
    Format(#[from] serde_json::Error),
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("Knowledge source has no text to index")]
    EmptySource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub id: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredSnippet<'a> {
    pub snippet: &'a Snippet,
    pub score: f32,
}

/// Embedded knowledge chunks persisted as a single JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeIndex {
    pub model: String,
    pub dimensions: usize,
    pub snippets: Vec<Snippet>,
}

impl KnowledgeIndex {
    pub async fn build(
        text: &str,
        chunker: &TextChunker,
        embedder: &dyn Embedder,
    ) -> Result<Self, IndexError> {
        let chunks = chunker.split(text);
        if chunks.is_empty() {
            return Err(IndexError::EmptySource);
        }

        let embeddings = embedder.embed(&chunks).await?;
        let dimensions = embeddings.first().map(Vec::len).unwrap_or_default();

        let snippets = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(id, (text, embedding))| Snippet {
                id,
                text,
                embedding,
            })
            .collect();

        Ok(Self {
            model: embedder.model().to_string(),
            dimensions,
            snippets,
        })
    }

    pub fn save(&self, dir: &Path) -> Result<PathBuf, IndexError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(INDEX_FILE);
        let json = serde_json::to_vec(self)?;
        fs::write(&path, json)?;
        Ok(path)
    }

    pub fn load(dir: &Path) -> Result<Self, IndexError> {
        let path = dir.join(INDEX_FILE);
        if !path.exists() {
            return Err(IndexError::NotFound(path));
        }
        let bytes = fs::read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// The `top_k` most similar snippets by cosine similarity, best first.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<ScoredSnippet<'_>> {
        let mut scored: Vec<ScoredSnippet<'_>> = self
            .snippets
            .iter()
            .map(|snippet| {
                let score = cosine_similarity(query, &snippet.embedding);
                ScoredSnippet {
                    snippet,
                    score: if score.is_nan() { f32::NEG_INFINITY } else { score },
                }
            })
            .collect();

        // stable sort keeps index order among equal scores
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        scored
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
