//! Staged ingest run: intake → score/select → store → dedup partition.
//!
//! Every stage shares one [`RunContext`]; degraded conditions go to its
//! warnings collector and are persisted on the run whether the run
//! succeeds or fails.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sift_core::RankingConfig;
use sift_db::{NewComment, NewPost, RunResults};
use sqlx::PgPool;

use crate::dedup::{partition_for_run, Partition};
use crate::error::PipelineError;
use crate::ranker::rank_and_select;
use crate::retry::{retry_with_backoff, AttemptError, RetryPolicy};
use crate::trust::resolve_author_trust;
use crate::types::{ChainOrder, Comment, ParentChainEntry, Post, RawComment};
use crate::warnings::WarningsCollector;

const PHASE_INTAKE: i16 = 1;
const PHASE_SELECT: i16 = 2;
const PHASE_STORE: i16 = 3;
const PHASE_DEDUP: i16 = 4;

/// Per-run state handed to every stage.
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: i64,
    warnings: Arc<WarningsCollector>,
}

impl RunContext {
    #[must_use]
    pub fn new(run_id: i64) -> Self {
        Self {
            run_id,
            warnings: Arc::new(WarningsCollector::new()),
        }
    }

    #[must_use]
    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    #[must_use]
    pub fn warnings(&self) -> &WarningsCollector {
        &self.warnings
    }

    /// Handle for workers that outlive a borrow of the context.
    #[must_use]
    pub fn shared_warnings(&self) -> Arc<WarningsCollector> {
        Arc::clone(&self.warnings)
    }
}

/// Raw input of one ingest run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestBatch {
    pub posts: Vec<Post>,
    pub comments: Vec<RawComment>,
}

/// A comment queued for AI analysis together with its ancestor context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRequest {
    pub comment_id: String,
    pub post_id: String,
    pub author: String,
    pub body: String,
    /// Ancestors root-first, each body capped at `parent_context_max_chars`.
    pub parent_context: Vec<ParentChainEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub run_id: i64,
    /// Comments dropped at intake for deleted, removed or too-short bodies.
    pub dropped_unusable: usize,
    pub selected: usize,
    pub stored: u64,
    pub partition: Partition,
    /// One entry per comment in `partition.to_analyze`, in the same order.
    pub analysis_queue: Vec<AnalysisRequest>,
}

/// Run phases 1–4 for `batch` under a new analysis run.
///
/// On success the run stays `in_progress` (analysis continues elsewhere)
/// with its warnings saved. On failure the run is marked `failed` with the
/// error message and any warnings gathered so far.
///
/// # Errors
///
/// Returns [`PipelineError`] for invalid input, a comment whose post is
/// missing from the batch, or a fatal database failure.
pub async fn run_ingest(
    pool: &PgPool,
    ranking: &RankingConfig,
    policy: &RetryPolicy,
    batch: IngestBatch,
) -> Result<IngestOutcome, PipelineError> {
    let run = sift_db::create_analysis_run(pool).await?;
    let ctx = RunContext::new(run.id);
    tracing::info!(run_id = run.id, public_id = %run.public_id, "analysis run started");

    match ingest_phases(pool, &ctx, ranking, policy, batch).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            fail_run_best_effort(pool, &ctx, &e.to_string()).await;
            Err(e)
        }
    }
}

async fn ingest_phases(
    pool: &PgPool,
    ctx: &RunContext,
    ranking: &RankingConfig,
    policy: &RetryPolicy,
    batch: IngestBatch,
) -> Result<IngestOutcome, PipelineError> {
    let run_id = ctx.run_id();
    let IngestBatch { posts, comments } = batch;

    // Phase 1: intake
    sift_db::set_run_phase(pool, run_id, PHASE_INTAKE, Some(count(comments.len()))).await?;
    let (comments, dropped_unusable) = intake(comments, ranking.min_body_chars)?;
    sift_db::update_run_progress(pool, run_id, count(comments.len()), None).await?;

    // Phase 2: score and select
    sift_db::set_run_phase(pool, run_id, PHASE_SELECT, Some(count(comments.len()))).await?;
    let authors: BTreeSet<String> = comments.iter().map(|c| c.author.clone()).collect();
    let trust = resolve_author_trust(pool, &authors, policy).await;
    let selected: Vec<Comment> = rank_and_select(&posts, comments, &trust, ranking)?
        .into_values()
        .flatten()
        .collect();
    sift_db::update_run_progress(pool, run_id, count(selected.len()), None).await?;

    // Phase 3: store
    sift_db::set_run_phase(pool, run_id, PHASE_STORE, Some(count(selected.len()))).await?;
    let new_posts: Vec<NewPost> = posts.iter().map(to_new_post).collect();
    let new_comments = selected
        .iter()
        .map(to_new_comment)
        .collect::<Result<Vec<_>, _>>()?;
    let (posts_ref, comments_ref) = (&new_posts, &new_comments);
    let stored = retry_with_backoff(policy, move || async move {
        sift_db::store_posts_and_comments(pool, run_id, posts_ref, comments_ref)
            .await
            .map_err(AttemptError::from_db)
    })
    .await?;
    sift_db::update_run_progress(pool, run_id, count(selected.len()), None).await?;

    // Phase 4: dedup partition
    let selected_count = selected.len();
    sift_db::set_run_phase(pool, run_id, PHASE_DEDUP, Some(count(selected_count))).await?;
    let partition = partition_for_run(pool, selected, run_id, ctx.warnings(), policy).await?;
    sift_db::update_run_progress(pool, run_id, count(partition.stats.total), None).await?;

    let warnings = ctx.warnings().serialize()?;
    sift_db::save_run_warnings(pool, run_id, warnings.as_deref()).await?;

    let analysis_queue = analysis_queue(&partition.to_analyze, ranking.parent_context_max_chars);

    Ok(IngestOutcome {
        run_id,
        dropped_unusable,
        selected: selected_count,
        stored,
        partition,
        analysis_queue,
    })
}

/// Mark an ingested run `completed` with its downstream result counters.
///
/// Warnings in `ctx` replace the stored list only when at least one was
/// recorded; otherwise whatever earlier phases saved is kept.
///
/// # Errors
///
/// Returns [`PipelineError::Db`] if the run is not `in_progress` or the
/// update fails; a terminal run keeps its counters and warnings.
pub async fn finish_run(
    pool: &PgPool,
    ctx: &RunContext,
    results: RunResults,
) -> Result<(), PipelineError> {
    let warnings = ctx.warnings().serialize()?;
    sift_db::complete_analysis_run(pool, ctx.run_id(), Some(results), warnings.as_deref())
        .await?;
    tracing::info!(
        run_id = ctx.run_id(),
        signals_created = results.signals_created,
        positions_opened = results.positions_opened,
        exits_triggered = results.exits_triggered,
        "analysis run completed"
    );
    Ok(())
}

/// Validate raw records and drop unusable bodies.
fn intake(
    raw: Vec<RawComment>,
    min_body_chars: usize,
) -> Result<(Vec<Comment>, usize), PipelineError> {
    let mut kept = Vec::with_capacity(raw.len());
    let mut dropped = 0_usize;
    for record in raw {
        let comment = Comment::try_from(record)?;
        if comment.is_unusable(min_body_chars) {
            tracing::debug!(comment_id = %comment.id, "dropping unusable comment body");
            dropped += 1;
            continue;
        }
        kept.push(comment);
    }
    Ok((kept, dropped))
}

fn analysis_queue(to_analyze: &[Comment], max_chars: usize) -> Vec<AnalysisRequest> {
    to_analyze
        .iter()
        .map(|c| AnalysisRequest {
            comment_id: c.id.clone(),
            post_id: c.post_id.clone(),
            author: c.author.clone(),
            body: c.body.clone(),
            parent_context: c.parent_context(ChainOrder::RootFirst, max_chars),
        })
        .collect()
}

fn to_new_post(post: &Post) -> NewPost {
    NewPost {
        post_id: post.id.clone(),
        subreddit: post.subreddit.clone(),
        title: post.title.clone(),
        author: post.author.clone(),
        score: post.score,
        num_comments: post.num_comments,
        created_utc: post.created_utc,
    }
}

fn to_new_comment(comment: &Comment) -> Result<NewComment, PipelineError> {
    let invalid = |reason: &str| PipelineError::InvalidComment {
        comment_id: comment.id.clone(),
        reason: reason.to_string(),
    };
    let scores = comment.scores.ok_or_else(|| invalid("stored before scoring"))?;
    let depth = i32::try_from(comment.depth).map_err(|_| invalid("depth out of range"))?;

    Ok(NewComment {
        comment_id: comment.id.clone(),
        post_id: comment.post_id.clone(),
        author: comment.author.clone(),
        body: comment.body.clone(),
        score: comment.score,
        depth,
        created_utc: comment.created_utc,
        parent_chain: serde_json::to_value(&comment.parent_chain)?,
        financial_score: scores.financial,
        author_trust_score: scores.author_trust,
        engagement_normalized: scores.engagement_normalized,
        priority_score: scores.priority,
    })
}

fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

async fn fail_run_best_effort(pool: &PgPool, ctx: &RunContext, message: &str) {
    let warnings = ctx.warnings().serialize().ok().flatten();
    if let Err(mark_err) =
        sift_db::fail_analysis_run(pool, ctx.run_id(), message, warnings.as_deref()).await
    {
        tracing::error!(
            run_id = ctx.run_id(),
            error = %mark_err,
            "failed to mark analysis run as failed"
        );
    }
}
