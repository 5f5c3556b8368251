use sqlx::Row;

use crate::db::DatabaseProxy;

pub async fn get_query_embedding(
    proxy: &DatabaseProxy,
    hash: &str,
) -> Result<Option<Vec<f32>>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT "embedding"::text as embedding_text
        FROM "query_embeddings"
        WHERE "hash" = $1
        LIMIT 1
        "#,
    )
    .bind(hash)
    .fetch_optional(proxy.pool())
    .await?;

    match row {
        Some(r) => {
            let embedding_text: String = r.get("embedding_text");
            let embedding = parse_vector_string(&embedding_text);
            Ok(Some(embedding))
        }
        None => Ok(None),
    }
}

/// Bumps `lastUsedAt` so the pruning job keeps hot queries around.
pub async fn touch_query_embedding(
    proxy: &DatabaseProxy,
    hash: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE "query_embeddings"
        SET "lastUsedAt" = NOW()
        WHERE "hash" = $1
        "#,
    )
    .bind(hash)
    .execute(proxy.pool())
    .await?;
    Ok(())
}

pub async fn upsert_query_embedding(
    proxy: &DatabaseProxy,
    hash: &str,
    query_text: &str,
    model: &str,
    dim: i32,
    embedding: &[f32],
) -> Result<(), sqlx::Error> {
    let embedding_str = format!(
        "[{}]",
        embedding
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",")
    );

    sqlx::query(
        r#"
        INSERT INTO "query_embeddings" ("hash", "queryText", "model", "dim", "embedding", "createdAt", "lastUsedAt")
        VALUES ($1, $2, $3, $4, $5::vector, NOW(), NOW())
        ON CONFLICT ("hash") DO UPDATE
        SET "embedding" = EXCLUDED."embedding",
            "model" = EXCLUDED."model",
            "dim" = EXCLUDED."dim",
            "lastUsedAt" = NOW()
        "#,
    )
    .bind(hash)
    .bind(query_text)
    .bind(model)
    .bind(dim)
    .bind(&embedding_str)
    .execute(proxy.pool())
    .await?;
    Ok(())
}

/// Drops cached query vectors not used within the retention window.
pub async fn delete_stale_query_embeddings(
    proxy: &DatabaseProxy,
    retention_days: i32,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM "query_embeddings"
        WHERE "lastUsedAt" < NOW() - make_interval(days => $1)
        "#,
    )
    .bind(retention_days)
    .execute(proxy.pool())
    .await?;

    Ok(result.rows_affected())
}

fn parse_vector_string(s: &str) -> Vec<f32> {
    let trimmed = s.trim().trim_start_matches('[').trim_end_matches(']');
    trimmed
        .split(',')
        .filter_map(|v| v.trim().parse::<f32>().ok())
        .collect()
}
