use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

const MEMORY_LIMIT_BYTES: u64 = 1_400_000_000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/info", get(info))
        .route("/live", get(live))
        .route("/ready", get(ready))
        .route("/database", get(database))
}

async fn root(State(state): State<AppState>) -> Response {
    let db_status = database_check(&state).await;
    let ok = matches!(db_status, DbCheckStatus::Connected { .. });

    let response = CompatHealthResponse {
        database: if ok { "connected" } else { "disconnected" },
        timestamp: now_iso(),
        status: if ok { "ok" } else { "degraded" },
    };

    let status_code = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response)).into_response()
}

async fn info(State(state): State<AppState>) -> Response {
    let response = HealthInfoResponse {
        service: "checkride-backend",
        version: std::env::var("APP_VERSION")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string()),
        environment: std::env::var("APP_ENV")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "development".to_string()),
        start_time: system_time_iso(state.started_at_system()),
        uptime: state.uptime_seconds(),
    };

    Json(response).into_response()
}

async fn live(State(state): State<AppState>) -> Response {
    let process_healthy = std::process::id() > 0;
    let memory_healthy = check_memory_health(0.9);

    let status = if process_healthy && memory_healthy {
        "healthy"
    } else {
        "unhealthy"
    };

    let response = LivenessResponse {
        status,
        timestamp: now_iso(),
        uptime: state.uptime_seconds(),
        checks: LivenessChecks {
            process: process_healthy,
            memory: memory_healthy,
        },
    };

    let status_code = if status == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response)).into_response()
}

async fn ready(State(state): State<AppState>) -> Response {
    let db_check = database_check(&state).await;
    let cache_status = cache_check(&state).await;
    let memory_healthy = check_memory_health(0.9);
    let memory_usage = read_memory_usage();

    let (database_status, database_latency_ms) = match db_check {
        DbCheckStatus::Connected { latency_ms } => ("connected", latency_ms),
        DbCheckStatus::Timeout => ("timeout", None),
        DbCheckStatus::Disconnected => ("disconnected", None),
    };

    // The cache is an optional layer; an unreachable one degrades
    // readiness but never fails it.
    let status = if database_status == "disconnected" {
        "unhealthy"
    } else if database_status == "timeout" || !memory_healthy || cache_status == "disconnected" {
        "degraded"
    } else {
        "healthy"
    };

    let response = ReadinessResponse {
        status,
        timestamp: now_iso(),
        uptime: state.uptime_seconds(),
        checks: ReadinessChecks {
            database: database_status,
            cache: cache_status,
            memory: memory_healthy,
        },
        details: Some(ReadinessDetails {
            database_latency: database_latency_ms,
            memory_usage: Some(memory_usage.rss),
            memory_limit: Some(MEMORY_LIMIT_BYTES),
        }),
    };

    let status_code = match status {
        "healthy" | "degraded" => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response)).into_response()
}

async fn database(State(state): State<AppState>) -> impl IntoResponse {
    let Some(proxy) = state.db_proxy() else {
        let response = DatabaseStatusResponse {
            mode: "memory-only",
            healthy: false,
            latency_ms: None,
            error: Some("database proxy not configured".to_string()),
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_checked_at: None,
        };
        return (StatusCode::OK, Json(response));
    };

    let snapshot = proxy.health_status().await;
    let response = DatabaseStatusResponse {
        mode: "postgres",
        healthy: snapshot.healthy,
        latency_ms: snapshot.latency_ms,
        error: snapshot.error,
        consecutive_failures: snapshot.consecutive_failures,
        consecutive_successes: snapshot.consecutive_successes,
        last_checked_at: snapshot.timestamp_ms.map(unix_ms_to_iso),
    };

    (StatusCode::OK, Json(response))
}

#[derive(Debug)]
enum DbCheckStatus {
    Connected { latency_ms: Option<u64> },
    Timeout,
    Disconnected,
}

async fn database_check(state: &AppState) -> DbCheckStatus {
    let Some(proxy) = state.db_proxy() else {
        return DbCheckStatus::Disconnected;
    };

    let snapshot = proxy.health_status().await;
    if snapshot.healthy {
        return DbCheckStatus::Connected {
            latency_ms: snapshot.latency_ms,
        };
    }
    if snapshot.error.as_deref() == Some("timeout") {
        return DbCheckStatus::Timeout;
    }
    DbCheckStatus::Disconnected
}

async fn cache_check(state: &AppState) -> &'static str {
    match state.cache() {
        Some(cache) if cache.is_connected().await => "connected",
        Some(_) => "disconnected",
        None => "disabled",
    }
}

fn system_time_iso(time: std::time::SystemTime) -> String {
    let datetime: chrono::DateTime<chrono::Utc> = time.into();
    datetime.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn unix_ms_to_iso(ms: u64) -> String {
    system_time_iso(std::time::UNIX_EPOCH + std::time::Duration::from_millis(ms))
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn check_memory_health(threshold: f64) -> bool {
    let usage = read_memory_usage();
    if usage.rss == 0 {
        return true;
    }

    (usage.rss as f64) / (MEMORY_LIMIT_BYTES as f64) < threshold
}

fn read_memory_usage() -> MemoryUsage {
    let rss_bytes = read_proc_self_status_kb("VmRSS").unwrap_or(0) * 1024;

    MemoryUsage { rss: rss_bytes }
}

fn read_proc_self_status_kb(prefix: &str) -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    for line in status.lines() {
        let trimmed = line.trim_start();
        if !trimmed.starts_with(prefix) {
            continue;
        }
        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }
        let value: u64 = parts[1].parse().ok()?;
        return Some(value);
    }
    None
}

#[derive(Serialize)]
struct CompatHealthResponse {
    database: &'static str,
    timestamp: String,
    status: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthInfoResponse {
    service: &'static str,
    version: String,
    environment: String,
    start_time: String,
    uptime: u64,
}

#[derive(Serialize)]
struct LivenessResponse {
    status: &'static str,
    timestamp: String,
    uptime: u64,
    checks: LivenessChecks,
}

#[derive(Serialize)]
struct LivenessChecks {
    process: bool,
    memory: bool,
}

#[derive(Serialize)]
struct ReadinessResponse {
    status: &'static str,
    timestamp: String,
    uptime: u64,
    checks: ReadinessChecks,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<ReadinessDetails>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadinessChecks {
    database: &'static str,
    cache: &'static str,
    memory: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadinessDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    database_latency: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory_usage: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory_limit: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseStatusResponse {
    mode: &'static str,
    healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    consecutive_failures: u32,
    consecutive_successes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_checked_at: Option<String>,
}

#[derive(Serialize)]
struct MemoryUsage {
    rss: u64,
}
