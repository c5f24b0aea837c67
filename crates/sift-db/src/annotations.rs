//! Annotation columns of `reddit_comments`: batched fetch for dedup, run
//! re-linking, and the write-once annotation update.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::DbError;

/// Annotation state of one stored comment, as seen by the dedup partitioner.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnnotationRow {
    pub comment_id: String,
    pub post_id: String,
    /// `false` when the comment's post has no `reddit_posts` row.
    pub post_exists: bool,
    /// `None` until the external analysis stage has populated the row.
    pub sentiment: Option<String>,
    pub sarcasm_detected: Option<bool>,
    pub has_reasoning: Option<bool>,
    pub confidence: Option<Decimal>,
    pub reasoning_summary: Option<String>,
    pub author_trust_snapshot: Option<f64>,
    pub analysis_run_id: Option<i64>,
}

/// Annotation content produced by the external analysis stage.
#[derive(Debug, Clone)]
pub struct AnnotationInput {
    /// One of `bullish`, `bearish`, `neutral`.
    pub sentiment: String,
    pub sarcasm_detected: bool,
    pub has_reasoning: bool,
    pub confidence: Decimal,
    pub reasoning_summary: Option<String>,
    pub author_trust_snapshot: Option<f64>,
}

/// Fetches annotation state for every id in `comment_ids` in one round trip,
/// locking the matching comment rows until the surrounding transaction ends.
///
/// Ids with no stored comment are absent from the result.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn fetch_annotations_for_update(
    conn: &mut PgConnection,
    comment_ids: &[String],
) -> Result<Vec<AnnotationRow>, DbError> {
    if comment_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, AnnotationRow>(
        "SELECT c.comment_id, c.post_id, (p.post_id IS NOT NULL) AS post_exists, \
                c.sentiment, c.sarcasm_detected, c.has_reasoning, c.confidence, \
                c.reasoning_summary, c.author_trust_snapshot, c.analysis_run_id \
         FROM reddit_comments c \
         LEFT JOIN reddit_posts p ON p.post_id = c.post_id \
         WHERE c.comment_id = ANY($1) \
         ORDER BY c.comment_id \
         FOR UPDATE OF c",
    )
    .bind(comment_ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

/// Points every annotated comment in `comment_ids` at `run_id` with one statement.
///
/// Only `analysis_run_id` changes; annotation content is never written here.
/// Rows already linked to `run_id` are skipped, so a repeat call affects
/// nothing. Returns the number of rows re-linked.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn relink_annotations_to_run(
    conn: &mut PgConnection,
    comment_ids: &[String],
    run_id: i64,
) -> Result<u64, DbError> {
    if comment_ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(
        "UPDATE reddit_comments \
         SET analysis_run_id = $1, updated_at = NOW() \
         WHERE comment_id = ANY($2) \
           AND sentiment IS NOT NULL \
           AND analysis_run_id IS DISTINCT FROM $1",
    )
    .bind(run_id)
    .bind(comment_ids)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Stores the analysis result for a comment and links it to `run_id`.
///
/// An annotation is written at most once: if the comment already carries a
/// sentiment the call is rejected.
///
/// # Errors
///
/// Returns [`DbError::AnnotationAlreadyRecorded`] if the comment is already
/// annotated, [`DbError::NotFound`] if the comment does not exist, or
/// [`DbError::Sqlx`] if a query fails.
pub async fn record_annotation(
    pool: &PgPool,
    comment_id: &str,
    run_id: i64,
    annotation: &AnnotationInput,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE reddit_comments \
         SET sentiment = $1, sarcasm_detected = $2, has_reasoning = $3, confidence = $4, \
             reasoning_summary = $5, author_trust_snapshot = $6, analysis_run_id = $7, \
             analyzed_at = NOW(), updated_at = NOW() \
         WHERE comment_id = $8 AND sentiment IS NULL",
    )
    .bind(&annotation.sentiment)
    .bind(annotation.sarcasm_detected)
    .bind(annotation.has_reasoning)
    .bind(annotation.confidence)
    .bind(&annotation.reasoning_summary)
    .bind(annotation.author_trust_snapshot)
    .bind(run_id)
    .bind(comment_id)
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        return Ok(());
    }

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM reddit_comments WHERE comment_id = $1)")
            .bind(comment_id)
            .fetch_one(pool)
            .await?;

    if exists {
        Err(DbError::AnnotationAlreadyRecorded(comment_id.to_string()))
    } else {
        Err(DbError::NotFound)
    }
}
