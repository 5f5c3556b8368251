//! Query-embedding lookup with a layered cache: Redis hot layer, then
//! the persistent `query_embeddings` table, then the embedding model.
//! Cache maintenance never blocks or fails the caller; every write and
//! touch rides a detached task that only logs.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::cache::{keys, RedisCache};
use crate::db::operations::embeddings as embedding_ops;
use crate::db::DatabaseProxy;
use crate::services::embedding_provider::{EmbeddingError, EmbeddingProvider};

/// Lowercases, collapses runs of whitespace and trims, so queries that
/// differ only in case or spacing share one cache entry.
pub fn normalize_query(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn query_hash(normalized: &str) -> String {
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

#[derive(Clone)]
pub struct QueryEmbeddingService {
    provider: Arc<EmbeddingProvider>,
    db: Option<Arc<DatabaseProxy>>,
    cache: Option<Arc<RedisCache>>,
}

impl QueryEmbeddingService {
    pub fn new(
        provider: Arc<EmbeddingProvider>,
        db: Option<Arc<DatabaseProxy>>,
        cache: Option<Arc<RedisCache>>,
    ) -> Self {
        Self {
            provider,
            db,
            cache,
        }
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_available()
    }

    /// Returns the embedding for a query, from cache when possible.
    /// Both cache layers are best-effort: read errors count as misses,
    /// write-backs are fire-and-forget.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let normalized = normalize_query(text);
        let hash = query_hash(&normalized);

        if let Some(cache) = &self.cache {
            if let Some(vector) = cache
                .get::<Vec<f32>>(&keys::query_embedding_key(&hash))
                .await
            {
                debug!(%hash, "query embedding hot-cache hit");
                self.spawn_touch(&hash);
                return Ok(vector);
            }
        }

        if let Some(db) = &self.db {
            match embedding_ops::get_query_embedding(db, &hash).await {
                Ok(Some(vector)) => {
                    debug!(%hash, "query embedding store hit");
                    self.spawn_touch(&hash);
                    self.spawn_hot_set(&hash, vector.clone());
                    return Ok(vector);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "query embedding lookup failed, treating as miss");
                }
            }
        }

        let vector = self.provider.embed_text(&normalized).await?;
        self.spawn_write_back(&hash, &normalized, vector.clone());
        Ok(vector)
    }

    fn spawn_touch(&self, hash: &str) {
        let Some(db) = self.db.clone() else { return };
        let hash = hash.to_string();
        tokio::spawn(async move {
            if let Err(e) = embedding_ops::touch_query_embedding(&db, &hash).await {
                warn!(error = %e, "query embedding touch failed");
            }
        });
    }

    fn spawn_hot_set(&self, hash: &str, vector: Vec<f32>) {
        let Some(cache) = self.cache.clone() else { return };
        let key = keys::query_embedding_key(hash);
        tokio::spawn(async move {
            cache.set(&key, &vector, keys::QUERY_EMBEDDING_TTL).await;
        });
    }

    fn spawn_write_back(&self, hash: &str, normalized: &str, vector: Vec<f32>) {
        self.spawn_hot_set(hash, vector.clone());

        let Some(db) = self.db.clone() else { return };
        let hash = hash.to_string();
        let query_text = normalized.to_string();
        let model = self.provider.model().to_string();
        tokio::spawn(async move {
            let dim = vector.len() as i32;
            if let Err(e) =
                embedding_ops::upsert_query_embedding(&db, &hash, &query_text, &model, dim, &vector)
                    .await
            {
                warn!(error = %e, "query embedding write-back failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_case_and_whitespace() {
        assert_eq!(
            normalize_query("  What ARE   the VFR\tminimums?  "),
            "what are the vfr minimums?"
        );
    }

    #[test]
    fn test_equivalent_queries_share_a_key() {
        let a = query_hash(&normalize_query("Class B airspace requirements"));
        let b = query_hash(&normalize_query("  class b AIRSPACE    requirements "));
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_queries_differ() {
        let a = query_hash(&normalize_query("class b airspace"));
        let b = query_hash(&normalize_query("class c airspace"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let h = query_hash("anything");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
