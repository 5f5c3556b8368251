//! Grounding retrieval: hybrid vector + lexical search over reference
//! chunks, with an optional inferred metadata filter and an unfiltered
//! fallback pass when the filtered pass comes back thin.
//!
//! Retrieval is a quality enhancement, never a correctness dependency:
//! every failure path degrades to "no grounding" with a warning.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::db::operations::chunks as chunk_ops;
use crate::db::DatabaseProxy;
use crate::exam::config::RetrievalConfig;
use crate::exam::types::{ChunkSearchResult, RagFilterHint};

use super::embedding::QueryEmbeddingService;
use super::filters::infer_filters;

#[derive(Clone)]
pub struct Retriever {
    config: RetrievalConfig,
    embedding: QueryEmbeddingService,
    db: Option<Arc<DatabaseProxy>>,
}

impl Retriever {
    pub fn new(
        config: RetrievalConfig,
        embedding: QueryEmbeddingService,
        db: Option<Arc<DatabaseProxy>>,
    ) -> Self {
        Self {
            config,
            embedding,
            db,
        }
    }

    /// `retrieve` bounded by the configured timeout; elapsing the
    /// timeout fails open to no grounding.
    pub async fn retrieve_with_timeout(&self, query: &str) -> Vec<ChunkSearchResult> {
        let budget = Duration::from_millis(self.config.timeout_ms);
        match tokio::time::timeout(budget, self.retrieve(query)).await {
            Ok(results) => results,
            Err(_) => {
                warn!(timeout_ms = self.config.timeout_ms, "retrieval timed out, continuing without grounding");
                Vec::new()
            }
        }
    }

    /// Runs the filtered pass when a filter can be inferred, falls back
    /// to an unfiltered pass when the filtered one is thin, and merges.
    /// Queries with fewer than the minimum characters are skipped.
    pub async fn retrieve(&self, query: &str) -> Vec<ChunkSearchResult> {
        if !self.config.enabled {
            return Vec::new();
        }
        let trimmed = query.trim();
        if trimmed.chars().count() < self.config.min_query_chars {
            return Vec::new();
        }
        let Some(db) = &self.db else {
            return Vec::new();
        };
        if !self.embedding.is_available() {
            return Vec::new();
        }

        let embedding = match self.embedding.embed_query(trimmed).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "query embedding failed, continuing without grounding");
                return Vec::new();
            }
        };

        let hint = if self.config.filter_inference_enabled {
            infer_filters(trimmed)
        } else {
            RagFilterHint::none()
        };

        if hint.is_none() {
            return self.search(db, trimmed, &embedding, None).await;
        }

        let filtered = self.search(db, trimmed, &embedding, Some(&hint)).await;
        let top_score = filtered.first().map(|r| r.score).unwrap_or(0.0);
        if filtered.len() >= self.config.min_filtered_results
            && top_score >= self.config.min_top_score
        {
            return filtered;
        }

        debug!(
            filtered_count = filtered.len(),
            top_score, "filtered pass thin, adding unfiltered pass"
        );
        let unfiltered = self.search(db, trimmed, &embedding, None).await;
        merge_results(filtered, unfiltered, self.config.top_k)
    }

    async fn search(
        &self,
        db: &DatabaseProxy,
        query: &str,
        embedding: &[f32],
        hint: Option<&RagFilterHint>,
    ) -> Vec<ChunkSearchResult> {
        match chunk_ops::hybrid_search(
            db,
            query,
            embedding,
            self.config.top_k as i64,
            self.config.similarity_floor,
            hint,
        )
        .await
        {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "chunk search failed, continuing without grounding");
                Vec::new()
            }
        }
    }
}

/// Union by chunk id: filtered results keep their position, new
/// unfiltered ones are appended, then everything is re-sorted by score
/// descending and truncated.
pub fn merge_results(
    filtered: Vec<ChunkSearchResult>,
    unfiltered: Vec<ChunkSearchResult>,
    limit: usize,
) -> Vec<ChunkSearchResult> {
    let mut seen: HashSet<String> = filtered.iter().map(|r| r.id.clone()).collect();
    let mut merged = filtered;
    for result in unfiltered {
        if seen.insert(result.id.clone()) {
            merged.push(result);
        }
    }
    merged.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    merged.truncate(limit);
    merged
}
