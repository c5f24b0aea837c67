//! Author trust resolution with graceful degradation.

use std::collections::{BTreeSet, HashMap};

use sqlx::PgPool;

use crate::retry::{retry_with_backoff, AttemptError, RetryPolicy};

/// Look up trust scores for every distinct author in one bulk query.
///
/// Unknown authors are absent from the returned map. If the trust store
/// stays unavailable after retries the map is empty and callers fall back
/// to their default for everyone; the failure is logged, not raised.
pub async fn resolve_author_trust(
    pool: &PgPool,
    authors: &BTreeSet<String>,
    policy: &RetryPolicy,
) -> HashMap<String, f64> {
    if authors.is_empty() {
        return HashMap::new();
    }
    let authors: Vec<String> = authors.iter().cloned().collect();

    let requested = &authors;
    let lookup = move || async move {
        sift_db::lookup_author_trust(pool, requested)
            .await
            .map_err(AttemptError::from_db)
    };

    match retry_with_backoff(policy, lookup).await {
        Ok(found) => {
            tracing::debug!(
                requested = authors.len(),
                found = found.len(),
                "resolved author trust"
            );
            found
        }
        Err(e) => {
            tracing::warn!(
                requested = authors.len(),
                error = %e,
                "author trust store unavailable; using default trust for all authors"
            );
            HashMap::new()
        }
    }
}

/// Trust for `author`, or `default` when the store had no score.
#[must_use]
#[allow(clippy::implicit_hasher)]
pub fn trust_or_default(trust: &HashMap<String, f64>, author: &str, default: f64) -> f64 {
    trust.get(author).copied().unwrap_or(default)
}
