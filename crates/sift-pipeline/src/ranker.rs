//! Priority scoring and per-post top-N selection.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use sift_core::{RankingConfig, RankingWeights};

use crate::engagement::normalize_engagement;
use crate::error::PipelineError;
use crate::scorer::financial_relevance_score;
use crate::trust::trust_or_default;
use crate::types::{Comment, CommentScores, Post};

/// Weighted blend of the three ranking inputs.
///
/// The unbounded relevance score is squashed with `x / (1 + x)` so all three
/// inputs share the `[0, 1]` range before weighting.
#[must_use]
pub fn priority_score(
    weights: &RankingWeights,
    financial: f64,
    author_trust: f64,
    engagement_normalized: f64,
) -> f64 {
    let financial = financial.max(0.0);
    let squashed = financial / (1.0 + financial);
    weights.financial * squashed
        + weights.trust * author_trust
        + weights.engagement * engagement_normalized
}

/// Score every comment of one post in place.
///
/// All comments must belong to the same post; engagement is normalized
/// against this slice only.
#[allow(clippy::implicit_hasher)]
pub fn score_post_comments(
    comments: &mut [Comment],
    trust: &HashMap<String, f64>,
    config: &RankingConfig,
) {
    let raw: Vec<f64> = comments.iter().map(Comment::engagement_proxy).collect();
    let normalized = normalize_engagement(&raw);

    for (comment, engagement) in comments.iter_mut().zip(normalized) {
        let financial = financial_relevance_score(&comment.body);
        let author_trust = trust_or_default(trust, &comment.author, config.default_author_trust);
        comment.scores = Some(CommentScores {
            financial,
            author_trust,
            engagement_normalized: engagement,
            priority: priority_score(&config.weights, financial, author_trust, engagement),
        });
    }
}

/// Ordering used for selection: priority descending, then raw engagement
/// proxy descending, then comment id ascending.
fn selection_order(a: &Comment, b: &Comment) -> Ordering {
    let pa = a.scores.map_or(f64::NEG_INFINITY, |s| s.priority);
    let pb = b.scores.map_or(f64::NEG_INFINITY, |s| s.priority);
    pb.total_cmp(&pa)
        .then_with(|| b.engagement_proxy().total_cmp(&a.engagement_proxy()))
        .then_with(|| a.id.cmp(&b.id))
}

/// Keep the `n` best comments of one post, sorted best first.
#[must_use]
pub fn select_top_n(mut comments: Vec<Comment>, n: usize) -> Vec<Comment> {
    comments.sort_by(selection_order);
    comments.truncate(n);
    comments
}

/// Score and select comments for every post independently.
///
/// Returns one entry per post in `posts` (possibly empty), keyed by post id,
/// each holding at most `config.top_n_per_post` comments sorted by priority.
///
/// # Errors
///
/// Returns [`PipelineError::MissingPost`] if any comment references a post
/// that is not in `posts`.
#[allow(clippy::implicit_hasher)]
pub fn rank_and_select(
    posts: &[Post],
    comments: Vec<Comment>,
    trust: &HashMap<String, f64>,
    config: &RankingConfig,
) -> Result<BTreeMap<String, Vec<Comment>>, PipelineError> {
    let mut by_post: BTreeMap<String, Vec<Comment>> = posts
        .iter()
        .map(|p| (p.id.clone(), Vec::new()))
        .collect();
    let mut orphans: BTreeMap<String, usize> = BTreeMap::new();

    for comment in comments {
        match by_post.get_mut(&comment.post_id) {
            Some(bucket) => bucket.push(comment),
            None => *orphans.entry(comment.post_id).or_default() += 1,
        }
    }

    if let Some((post_id, comment_count)) = orphans.into_iter().next() {
        return Err(PipelineError::MissingPost {
            post_id,
            comment_count,
        });
    }

    for (post_id, bucket) in &mut by_post {
        let before = bucket.len();
        score_post_comments(bucket, trust, config);
        *bucket = select_top_n(std::mem::take(bucket), config.top_n_per_post);
        tracing::debug!(
            post_id = %post_id,
            scored = before,
            selected = bucket.len(),
            "ranked post comments"
        );
    }

    Ok(by_post)
}

#[cfg(test)]
#[path = "ranker_test.rs"]
mod tests;
