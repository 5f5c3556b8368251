use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::db::DatabaseProxy;
use crate::exam::types::{ChunkSearchResult, RagFilterHint};

const VECTOR_WEIGHT: f64 = 0.85;
const LEXICAL_WEIGHT: f64 = 0.15;

/// Ranked passage search over the reference library: cosine similarity
/// against the chunk embedding, with a small boost when the chunk text
/// contains the raw query. `similarity_floor` applies to the vector
/// part alone so the lexical boost cannot rescue an unrelated chunk.
pub async fn hybrid_search(
    proxy: &DatabaseProxy,
    query: &str,
    embedding: &[f32],
    limit: i64,
    similarity_floor: f64,
    hint: Option<&RagFilterHint>,
) -> Result<Vec<ChunkSearchResult>, sqlx::Error> {
    let embedding_str = format!(
        "[{}]",
        embedding
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",")
    );
    let like_pattern = format!("%{}%", escape_like(query));

    let abbreviation = hint.and_then(|h| h.filter_abbreviation.as_deref());
    let doc_type = hint.and_then(|h| h.filter_doc_type.as_deref());

    let rows = if let Some(abbr) = abbreviation {
        sqlx::query(
            r#"
            SELECT c."id", c."documentId", c."heading", c."content", c."pageStart", c."pageEnd",
                   d."title" as doc_title, d."abbreviation" as doc_abbreviation,
                   ((1 - (c."embedding" <=> $1::vector)) * $4
                    + CASE WHEN c."content" ILIKE $2 THEN $5 ELSE 0.0 END) as score
            FROM "reference_chunks" c
            JOIN "reference_documents" d ON d."id" = c."documentId"
            WHERE c."embedding" IS NOT NULL
              AND (1 - (c."embedding" <=> $1::vector)) >= $3
              AND d."abbreviation" = $6
            ORDER BY score DESC
            LIMIT $7
            "#,
        )
        .bind(&embedding_str)
        .bind(&like_pattern)
        .bind(similarity_floor)
        .bind(VECTOR_WEIGHT)
        .bind(LEXICAL_WEIGHT)
        .bind(abbr)
        .bind(limit)
        .fetch_all(proxy.pool())
        .await?
    } else if let Some(doc_type) = doc_type {
        sqlx::query(
            r#"
            SELECT c."id", c."documentId", c."heading", c."content", c."pageStart", c."pageEnd",
                   d."title" as doc_title, d."abbreviation" as doc_abbreviation,
                   ((1 - (c."embedding" <=> $1::vector)) * $4
                    + CASE WHEN c."content" ILIKE $2 THEN $5 ELSE 0.0 END) as score
            FROM "reference_chunks" c
            JOIN "reference_documents" d ON d."id" = c."documentId"
            WHERE c."embedding" IS NOT NULL
              AND (1 - (c."embedding" <=> $1::vector)) >= $3
              AND d."docType" = $6
            ORDER BY score DESC
            LIMIT $7
            "#,
        )
        .bind(&embedding_str)
        .bind(&like_pattern)
        .bind(similarity_floor)
        .bind(VECTOR_WEIGHT)
        .bind(LEXICAL_WEIGHT)
        .bind(doc_type)
        .bind(limit)
        .fetch_all(proxy.pool())
        .await?
    } else {
        sqlx::query(
            r#"
            SELECT c."id", c."documentId", c."heading", c."content", c."pageStart", c."pageEnd",
                   d."title" as doc_title, d."abbreviation" as doc_abbreviation,
                   ((1 - (c."embedding" <=> $1::vector)) * $4
                    + CASE WHEN c."content" ILIKE $2 THEN $5 ELSE 0.0 END) as score
            FROM "reference_chunks" c
            JOIN "reference_documents" d ON d."id" = c."documentId"
            WHERE c."embedding" IS NOT NULL
              AND (1 - (c."embedding" <=> $1::vector)) >= $3
            ORDER BY score DESC
            LIMIT $6
            "#,
        )
        .bind(&embedding_str)
        .bind(&like_pattern)
        .bind(similarity_floor)
        .bind(VECTOR_WEIGHT)
        .bind(LEXICAL_WEIGHT)
        .bind(limit)
        .fetch_all(proxy.pool())
        .await?
    };

    Ok(rows.into_iter().map(map_chunk_row).collect())
}

fn map_chunk_row(row: PgRow) -> ChunkSearchResult {
    ChunkSearchResult {
        id: row.get("id"),
        document_id: row.get("documentId"),
        heading: row.get("heading"),
        content: row.get("content"),
        page_start: row.get("pageStart"),
        page_end: row.get("pageEnd"),
        doc_title: row.get("doc_title"),
        doc_abbreviation: row.get("doc_abbreviation"),
        score: row.get("score"),
    }
}

/// Escapes LIKE metacharacters so user text is matched literally.
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
