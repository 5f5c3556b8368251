use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::exam::ExamEngine;

pub async fn expire_idle_sessions(engine: Arc<ExamEngine>) -> Result<(), super::WorkerError> {
    let start = Instant::now();
    debug!("Starting session cleanup cycle");

    let expired = engine.expire_stale_sessions().await?;

    info!(
        expired_sessions = expired,
        duration_secs = format!("{:.2}", start.elapsed().as_secs_f64()),
        "Session cleanup completed"
    );

    Ok(())
}
