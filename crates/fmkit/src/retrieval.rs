//! Passage retrieval behind the `RAGQuery` tool.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::chunker::TextSplitter;
use crate::errors::AgentResult;

/// A retrieved chunk of a source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub source: Option<String>,
    pub score: f32,
}

/// Anything that can answer a query with ranked passages
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, top_k: usize) -> AgentResult<Vec<Passage>>;
}

#[derive(Debug, Clone)]
struct IndexedChunk {
    text: String,
    source: Option<String>,
    terms: HashSet<String>,
}

/// In-memory index scoring chunks by how many query terms they contain
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    chunks: Vec<IndexedChunk>,
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<S: Into<String>>(&mut self, text: S, source: Option<String>) {
        let text = text.into();
        let terms = terms(&text);
        self.chunks.push(IndexedChunk {
            text,
            source,
            terms,
        });
    }

    /// Split a document and index each of its chunks
    pub fn add_document(&mut self, splitter: &TextSplitter, text: &str, source: Option<&str>) {
        for chunk in splitter.split(text) {
            self.add(chunk, source.map(str::to_string));
        }
    }

    /// Index every `.txt` and `.md` file found directly under `dir`
    pub fn from_dir(dir: &Path, splitter: &TextSplitter) -> std::io::Result<Self> {
        let mut index = Self::new();
        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && matches!(
                        path.extension().and_then(|ext| ext.to_str()),
                        Some("txt") | Some("md")
                    )
            })
            .collect();
        paths.sort();

        for path in paths {
            let text = fs::read_to_string(&path)?;
            let source = path.file_name().map(|name| name.to_string_lossy().to_string());
            index.add_document(splitter, &text, source.as_deref());
        }
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Rank chunks against the query; chunks sharing no term are left out
    pub fn search(&self, query: &str, top_k: usize) -> Vec<Passage> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, &IndexedChunk)> = self
            .chunks
            .iter()
            .map(|chunk| (chunk.terms.intersection(&query_terms).count(), chunk))
            .filter(|(hits, _)| *hits > 0)
            .collect();
        // stable: equal scores keep insertion order
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        scored
            .into_iter()
            .take(top_k)
            .map(|(hits, chunk)| Passage {
                text: chunk.text.clone(),
                source: chunk.source.clone(),
                score: hits as f32 / query_terms.len() as f32,
            })
            .collect()
    }
}

#[async_trait]
impl Retriever for KeywordIndex {
    async fn retrieve(&self, query: &str, top_k: usize) -> AgentResult<Vec<Passage>> {
        Ok(self.search(query, top_k))
    }
}
