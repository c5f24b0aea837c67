//! Storage for `reddit_posts` and `reddit_comments`.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

/// A post to upsert into `reddit_posts`.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub post_id: String,
    pub subreddit: String,
    pub title: String,
    pub author: String,
    pub score: i32,
    pub num_comments: i32,
    pub created_utc: i64,
}

/// A ranked comment to upsert into `reddit_comments`.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub comment_id: String,
    pub post_id: String,
    pub author: String,
    pub body: String,
    pub score: i32,
    pub depth: i32,
    pub created_utc: i64,
    /// JSON array of ancestor entries, nearest first.
    pub parent_chain: Value,
    pub financial_score: f64,
    pub author_trust_score: f64,
    pub engagement_normalized: f64,
    pub priority_score: f64,
}

/// The content columns of a stored comment (annotation columns excluded).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredCommentRow {
    pub comment_id: String,
    pub post_id: String,
    pub author: String,
    pub body: String,
    pub score: i32,
    pub depth: i32,
    pub created_utc: i64,
    pub parent_chain: Value,
    pub financial_score: Option<f64>,
    pub author_trust_score: Option<f64>,
    pub engagement_normalized: Option<f64>,
    pub priority_score: Option<f64>,
    pub analysis_run_id: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

/// Upserts posts and their selected comments in a single transaction.
///
/// New comments are linked to `run_id`. A comment that already exists gets
/// its content and scores refreshed; its annotation columns and run linkage
/// are left untouched, and an annotated comment keeps the body it was
/// analyzed with.
///
/// Returns the number of comment rows written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; nothing is committed in that case.
pub async fn store_posts_and_comments(
    pool: &PgPool,
    run_id: i64,
    posts: &[NewPost],
    comments: &[NewComment],
) -> Result<u64, DbError> {
    let mut tx = pool.begin().await?;

    for post in posts {
        sqlx::query(
            "INSERT INTO reddit_posts \
                 (post_id, subreddit, title, author, score, num_comments, created_utc) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (post_id) DO UPDATE SET \
                 title = EXCLUDED.title, \
                 score = EXCLUDED.score, \
                 num_comments = EXCLUDED.num_comments, \
                 fetched_at = NOW()",
        )
        .bind(&post.post_id)
        .bind(&post.subreddit)
        .bind(&post.title)
        .bind(&post.author)
        .bind(post.score)
        .bind(post.num_comments)
        .bind(post.created_utc)
        .execute(&mut *tx)
        .await?;
    }

    let mut written = 0_u64;
    for c in comments {
        let result = sqlx::query(
            "INSERT INTO reddit_comments \
                 (comment_id, post_id, author, body, score, depth, created_utc, parent_chain, \
                  financial_score, author_trust_score, engagement_normalized, priority_score, \
                  analysis_run_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             ON CONFLICT (comment_id) DO UPDATE SET \
                 body = CASE WHEN reddit_comments.sentiment IS NULL \
                     THEN EXCLUDED.body ELSE reddit_comments.body END, \
                 score = EXCLUDED.score, \
                 parent_chain = EXCLUDED.parent_chain, \
                 financial_score = EXCLUDED.financial_score, \
                 author_trust_score = EXCLUDED.author_trust_score, \
                 engagement_normalized = EXCLUDED.engagement_normalized, \
                 priority_score = EXCLUDED.priority_score, \
                 updated_at = NOW()",
        )
        .bind(&c.comment_id)
        .bind(&c.post_id)
        .bind(&c.author)
        .bind(&c.body)
        .bind(c.score)
        .bind(c.depth)
        .bind(c.created_utc)
        .bind(&c.parent_chain)
        .bind(c.financial_score)
        .bind(c.author_trust_score)
        .bind(c.engagement_normalized)
        .bind(c.priority_score)
        .bind(run_id)
        .execute(&mut *tx)
        .await?;
        written += result.rows_affected();
    }

    tx.commit().await?;
    Ok(written)
}

/// Fetches the stored content of one comment, or `None` if it does not exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_comment(
    pool: &PgPool,
    comment_id: &str,
) -> Result<Option<StoredCommentRow>, DbError> {
    let row = sqlx::query_as::<_, StoredCommentRow>(
        "SELECT comment_id, post_id, author, body, score, depth, created_utc, parent_chain, \
                financial_score, author_trust_score, engagement_normalized, priority_score, \
                analysis_run_id, updated_at \
         FROM reddit_comments \
         WHERE comment_id = $1",
    )
    .bind(comment_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
