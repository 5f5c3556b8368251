use sqlx::Row;

use crate::db::DatabaseProxy;
use crate::exam::types::ExamSession;

/// Inserts a freshly started session. The full session aggregate is
/// stored as JSONB; id, user, status and version are extracted into
/// columns so lookups and the optimistic guard stay plain SQL.
pub async fn insert_session(
    proxy: &DatabaseProxy,
    session: &ExamSession,
) -> Result<(), sqlx::Error> {
    let payload = serde_json::to_value(session).unwrap_or_default();

    sqlx::query(
        r#"
        INSERT INTO "exam_sessions" ("id", "userId", "status", "version", "session", "createdAt", "updatedAt")
        VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
        "#,
    )
    .bind(&session.id)
    .bind(&session.user_id)
    .bind(session.status.as_str())
    .bind(session.version)
    .bind(&payload)
    .execute(proxy.pool())
    .await?;
    Ok(())
}

/// Optimistic write: updates the row only if the stored version still
/// matches `expected_version`. Returns false when another writer got
/// there first.
pub async fn update_session_guarded(
    proxy: &DatabaseProxy,
    session: &ExamSession,
    expected_version: i64,
) -> Result<bool, sqlx::Error> {
    let payload = serde_json::to_value(session).unwrap_or_default();

    let result = sqlx::query(
        r#"
        UPDATE "exam_sessions"
        SET "session" = $2,
            "status" = $3,
            "version" = $4,
            "updatedAt" = NOW()
        WHERE "id" = $1 AND "version" = $5
        "#,
    )
    .bind(&session.id)
    .bind(&payload)
    .bind(session.status.as_str())
    .bind(session.version)
    .bind(expected_version)
    .execute(proxy.pool())
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn load_session(
    proxy: &DatabaseProxy,
    session_id: &str,
) -> Result<Option<ExamSession>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT "session"
        FROM "exam_sessions"
        WHERE "id" = $1
        LIMIT 1
        "#,
    )
    .bind(session_id)
    .fetch_optional(proxy.pool())
    .await?;

    Ok(row.and_then(|r| {
        let payload: serde_json::Value = r.get("session");
        serde_json::from_value(payload).ok()
    }))
}

/// Most recently touched session still marked active for the user, if
/// any. Used for resume-after-reconnect.
pub async fn find_active_session(
    proxy: &DatabaseProxy,
    user_id: &str,
) -> Result<Option<ExamSession>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT "session"
        FROM "exam_sessions"
        WHERE "userId" = $1 AND "status" = 'active'
        ORDER BY "updatedAt" DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(proxy.pool())
    .await?;

    Ok(row.and_then(|r| {
        let payload: serde_json::Value = r.get("session");
        serde_json::from_value(payload).ok()
    }))
}

/// A user holds at most one active session; starting a new one pauses
/// whatever was active before. The version bump invalidates any client
/// still writing against the paused session.
pub async fn pause_other_active_sessions(
    proxy: &DatabaseProxy,
    user_id: &str,
    keep_session_id: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE "exam_sessions"
        SET "status" = 'paused',
            "version" = "version" + 1,
            "session" = jsonb_set(jsonb_set("session", '{status}', '"paused"'), '{version}', to_jsonb("version" + 1)),
            "updatedAt" = NOW()
        WHERE "userId" = $1 AND "status" = 'active' AND "id" != $2
        "#,
    )
    .bind(user_id)
    .bind(keep_session_id)
    .execute(proxy.pool())
    .await?;

    Ok(result.rows_affected())
}

/// Marks sessions untouched since the cutoff as expired. Returns how
/// many rows were transitioned.
pub async fn expire_stale_sessions(
    proxy: &DatabaseProxy,
    idle_hours: i32,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE "exam_sessions"
        SET "status" = 'expired',
            "version" = "version" + 1,
            "session" = jsonb_set(jsonb_set("session", '{status}', '"expired"'), '{version}', to_jsonb("version" + 1)),
            "updatedAt" = NOW()
        WHERE "status" IN ('active', 'paused')
          AND "updatedAt" < NOW() - make_interval(hours => $1)
        "#,
    )
    .bind(idle_hours)
    .execute(proxy.pool())
    .await?;

    Ok(result.rows_affected())
}
