//! Bulk author trust lookups against `author_trust`.

use std::collections::HashMap;

use sqlx::PgPool;

use crate::DbError;

/// Returns the stored trust score for each known author in `authors`.
///
/// Issues one query regardless of how many authors are passed. Authors with
/// no row are simply absent from the map; callers apply their own default.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn lookup_author_trust(
    pool: &PgPool,
    authors: &[String],
) -> Result<HashMap<String, f64>, DbError> {
    if authors.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, (String, f64)>(
        "SELECT author, trust_score FROM author_trust WHERE author = ANY($1)",
    )
    .bind(authors)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Inserts or replaces the trust score for one author.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails (including scores outside `[0, 1]`).
pub async fn upsert_author_trust(
    pool: &PgPool,
    author: &str,
    trust_score: f64,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO author_trust (author, trust_score) VALUES ($1, $2) \
         ON CONFLICT (author) DO UPDATE SET \
             trust_score = EXCLUDED.trust_score, \
             updated_at = NOW()",
    )
    .bind(author)
    .bind(trust_score)
    .execute(pool)
    .await?;

    Ok(())
}
