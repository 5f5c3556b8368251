use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::db::operations::embeddings as embedding_ops;
use crate::db::DatabaseProxy;

const DEFAULT_RETENTION_DAYS: i32 = 30;

pub async fn purge_stale_query_embeddings(db: Arc<DatabaseProxy>) -> Result<(), super::WorkerError> {
    let start = Instant::now();
    debug!("Starting query embedding cleanup cycle");

    let retention_days = std::env::var("EMBEDDING_RETENTION_DAYS")
        .ok()
        .and_then(|v| v.parse::<i32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_RETENTION_DAYS);

    let deleted = embedding_ops::delete_stale_query_embeddings(db.as_ref(), retention_days).await?;

    info!(
        deleted_embeddings = deleted,
        retention_days,
        duration_secs = format!("{:.2}", start.elapsed().as_secs_f64()),
        "Query embedding cleanup completed"
    );

    Ok(())
}
