#![allow(dead_code)]

pub mod cache;
pub mod config;
pub mod db;
pub mod exam;
pub mod logging;
pub mod rag;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod workers;

use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::cache::RedisCache;
use crate::state::AppState;

pub async fn create_app() -> axum::Router {
    let db_proxy = match db::DatabaseProxy::from_env().await {
        Ok(proxy) => Some(proxy),
        Err(err) => {
            tracing::warn!(error = %err, "database proxy not initialized");
            None
        }
    };

    let cache = connect_cache().await;
    let exam_engine = AppState::create_exam_engine(db_proxy.clone(), cache.clone());
    let state = AppState::new(db_proxy, exam_engine, cache);

    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn connect_cache() -> Option<Arc<RedisCache>> {
    let url = std::env::var("REDIS_URL")
        .ok()
        .filter(|v| !v.trim().is_empty())?;

    match RedisCache::connect(&url).await {
        Ok(cache) => Some(Arc::new(cache)),
        Err(err) => {
            tracing::warn!(error = %err, "redis cache not initialized");
            None
        }
    }
}
