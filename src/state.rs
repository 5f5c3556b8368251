use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::cache::RedisCache;
use crate::db::DatabaseProxy;
use crate::exam::{ExamConfig, ExamEngine};

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    db_proxy: Option<Arc<DatabaseProxy>>,
    cache: Option<Arc<RedisCache>>,
    exam_engine: Arc<ExamEngine>,
}

impl AppState {
    pub fn new(
        db_proxy: Option<Arc<DatabaseProxy>>,
        exam_engine: Arc<ExamEngine>,
        cache: Option<Arc<RedisCache>>,
    ) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            db_proxy,
            cache,
            exam_engine,
        }
    }

    pub fn create_exam_engine(
        db_proxy: Option<Arc<DatabaseProxy>>,
        cache: Option<Arc<RedisCache>>,
    ) -> Arc<ExamEngine> {
        Arc::new(ExamEngine::new(ExamConfig::from_env(), db_proxy, cache))
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn db_proxy(&self) -> Option<Arc<DatabaseProxy>> {
        self.db_proxy.clone()
    }

    pub fn cache(&self) -> Option<Arc<RedisCache>> {
        self.cache.clone()
    }

    pub fn exam_engine(&self) -> Arc<ExamEngine> {
        Arc::clone(&self.exam_engine)
    }
}
