//! Split a comment batch into reusable annotations and comments that still
//! need analysis, re-linking reused annotations to the current run.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::{json, Map};
use sift_db::{AnnotationRow, DbError};
use sqlx::PgPool;

use crate::retry::{retry_with_backoff, AttemptError, RetryPolicy};
use crate::types::{Annotation, AnnotationState, Comment};
use crate::warnings::{WarningKind, WarningsCollector};

/// A comment whose stored annotation can be reused as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReusableComment {
    pub comment: Comment,
    pub annotation: Annotation,
}

/// Counts reported for every partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PartitionStats {
    pub total: usize,
    pub reused: usize,
    pub new: usize,
    /// Comments with no stored row at all.
    pub never_stored: usize,
    /// Comments stored without a sentiment (never analyzed, or analysis failed).
    pub incomplete: usize,
    /// Comments dropped because their post record is missing.
    pub skipped: usize,
    /// Annotations whose run link actually changed.
    pub relinked: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Partition {
    pub reusable: Vec<ReusableComment>,
    pub to_analyze: Vec<Comment>,
    /// Comments left out of `to_analyze` because their post record is missing.
    pub skipped: Vec<Comment>,
    pub stats: PartitionStats,
}

/// Stored state of one comment relevant to deduplication.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAnnotation {
    pub post_exists: bool,
    pub state: AnnotationState,
}

impl From<&AnnotationRow> for StoredAnnotation {
    fn from(row: &AnnotationRow) -> Self {
        Self {
            post_exists: row.post_exists,
            state: AnnotationState::from(row),
        }
    }
}

/// Classify `comments` against their stored annotation state.
///
/// A comment is reusable only if its row exists and carries a sentiment.
/// Everything else goes to analysis, except comments whose stored row
/// points at a missing post, which are skipped. Duplicate ids are kept once
/// (first occurrence).
#[must_use]
#[allow(clippy::implicit_hasher)]
pub fn classify(comments: Vec<Comment>, stored: &HashMap<String, StoredAnnotation>) -> Partition {
    let mut partition = Partition::default();
    let mut seen = HashSet::new();

    for comment in comments {
        if !seen.insert(comment.id.clone()) {
            tracing::debug!(comment_id = %comment.id, "duplicate comment id in partition input");
            continue;
        }
        partition.stats.total += 1;

        match stored.get(&comment.id) {
            Some(StoredAnnotation {
                state: AnnotationState::Annotated(annotation),
                ..
            }) => {
                partition.reusable.push(ReusableComment {
                    annotation: annotation.clone(),
                    comment,
                });
            }
            Some(StoredAnnotation {
                post_exists: false, ..
            }) => {
                partition.skipped.push(comment);
            }
            Some(_) => {
                partition.stats.incomplete += 1;
                partition.to_analyze.push(comment);
            }
            None => {
                partition.stats.never_stored += 1;
                partition.to_analyze.push(comment);
            }
        }
    }

    partition.stats.reused = partition.reusable.len();
    partition.stats.new = partition.to_analyze.len();
    partition.stats.skipped = partition.skipped.len();
    partition
}

/// Fetch annotation state and re-link reusable annotations inside one
/// transaction. Returns the stored state and the number of rows re-linked.
async fn fetch_and_relink(
    pool: &PgPool,
    comment_ids: &[String],
    run_id: i64,
) -> Result<(HashMap<String, StoredAnnotation>, u64), DbError> {
    let mut tx = pool.begin().await?;

    let rows = sift_db::fetch_annotations_for_update(&mut tx, comment_ids).await?;
    let stored: HashMap<String, StoredAnnotation> = rows
        .iter()
        .map(|row| (row.comment_id.clone(), StoredAnnotation::from(row)))
        .collect();

    let reusable_ids: Vec<String> = stored
        .iter()
        .filter(|(_, s)| matches!(s.state, AnnotationState::Annotated(_)))
        .map(|(id, _)| id.clone())
        .collect();

    let relinked = sift_db::relink_annotations_to_run(&mut tx, &reusable_ids, run_id).await?;

    tx.commit().await?;
    Ok((stored, relinked))
}

/// Partition `comments` for `run_id` against persisted annotations.
///
/// One batched read and one batched re-link run inside a single
/// transaction (locking the rows read), retried as a whole on transient
/// database errors. Annotation content is never modified. Calling this
/// again with the same run id re-links nothing. Comments whose post record
/// is missing are reported as [`WarningKind::DataIntegrity`] and skipped.
///
/// # Errors
///
/// Returns [`DbError`] if the transaction fails fatally or exhausts its
/// retries; nothing is committed in that case.
pub async fn partition_for_run(
    pool: &PgPool,
    comments: Vec<Comment>,
    run_id: i64,
    warnings: &WarningsCollector,
    policy: &RetryPolicy,
) -> Result<Partition, DbError> {
    let ids: Vec<String> = comments.iter().map(|c| c.id.clone()).collect();
    let ids_ref = &ids;

    let (stored, relinked) = retry_with_backoff(policy, move || async move {
        fetch_and_relink(pool, ids_ref, run_id)
            .await
            .map_err(AttemptError::from_db)
    })
    .await?;

    let mut partition = classify(comments, &stored);
    partition.stats.relinked = relinked;

    for comment in &partition.skipped {
        let mut context = Map::new();
        context.insert("comment_id".to_string(), json!(comment.id));
        context.insert("post_id".to_string(), json!(comment.post_id));
        warnings.append(
            WarningKind::DataIntegrity,
            "comment has no post record; skipped from analysis",
            context,
        );
    }

    let s = partition.stats;
    tracing::info!(
        run_id,
        reused = s.reused,
        new = s.new,
        total = s.total,
        never_stored = s.never_stored,
        incomplete = s.incomplete,
        skipped = s.skipped,
        relinked = s.relinked,
        "partitioned comments against stored annotations"
    );

    Ok(partition)
}

#[cfg(test)]
#[path = "dedup_test.rs"]
mod tests;
