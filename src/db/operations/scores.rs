use std::collections::HashMap;

use sqlx::Row;

use crate::db::DatabaseProxy;
use crate::exam::types::{AttemptOutcome, ElementScore};

/// Per-element outcome history for one user, scoped to a rating via
/// the code prefix (`PA` matches `PA.I.A.K1` and so on).
pub async fn load_element_scores(
    proxy: &DatabaseProxy,
    user_id: &str,
    rating: &str,
) -> Result<HashMap<String, ElementScore>, sqlx::Error> {
    let prefix = format!("{}.%", rating);
    let rows = sqlx::query(
        r#"
        SELECT "elementCode", "latestOutcome", "totalAttempts"
        FROM "element_scores"
        WHERE "userId" = $1 AND "elementCode" LIKE $2
        "#,
    )
    .bind(user_id)
    .bind(&prefix)
    .fetch_all(proxy.pool())
    .await?;

    let mut scores = HashMap::with_capacity(rows.len());
    for row in rows {
        let element_code: String = row.get("elementCode");
        let latest_raw: Option<String> = row.get("latestOutcome");
        let total_attempts: i32 = row.get("totalAttempts");
        scores.insert(
            element_code.clone(),
            ElementScore {
                element_code,
                latest_score: latest_raw.as_deref().and_then(AttemptOutcome::parse),
                total_attempts: total_attempts.max(0) as u32,
            },
        );
    }
    Ok(scores)
}

/// Records the latest graded outcome for an element. The attempt
/// counter only ever grows; the outcome is last-write-wins.
pub async fn upsert_element_score(
    proxy: &DatabaseProxy,
    user_id: &str,
    element_code: &str,
    outcome: AttemptOutcome,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "element_scores" ("userId", "elementCode", "latestOutcome", "totalAttempts", "updatedAt")
        VALUES ($1, $2, $3, 1, NOW())
        ON CONFLICT ("userId", "elementCode") DO UPDATE
        SET "latestOutcome" = EXCLUDED."latestOutcome",
            "totalAttempts" = "element_scores"."totalAttempts" + 1,
            "updatedAt" = NOW()
        "#,
    )
    .bind(user_id)
    .bind(element_code)
    .bind(outcome.as_str())
    .execute(proxy.pool())
    .await?;
    Ok(())
}
