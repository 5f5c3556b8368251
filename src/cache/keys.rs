use std::time::Duration;

pub const QUERY_EMBEDDING_TTL: Duration = Duration::from_secs(6 * 60 * 60);
pub const CURRICULUM_TTL: Duration = Duration::from_secs(12 * 60 * 60);

pub fn query_embedding_key(hash: &str) -> String {
    format!("rag:query:{}", hash)
}

pub fn curriculum_key(rating: &str) -> String {
    format!("curriculum:{}", rating)
}
