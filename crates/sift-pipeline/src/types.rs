//! Comment, post and annotation records flowing through the pipeline.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// A Reddit submission whose comments are being ranked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub subreddit: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub score: i32,
    #[serde(default)]
    pub num_comments: i32,
    pub created_utc: i64,
}

/// One ancestor of a comment.
///
/// Built once at intake and never changed afterwards; [`Self::truncated`]
/// returns a shortened copy instead of editing in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentChainEntry {
    id: String,
    body: String,
    depth: u32,
    author: String,
}

impl ParentChainEntry {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        body: impl Into<String>,
        depth: u32,
        author: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            depth,
            author: author.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    #[must_use]
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Copy of this entry with the body cut to at most `max_chars` characters.
    ///
    /// A cut body ends in `…` (counted within `max_chars`).
    #[must_use]
    pub fn truncated(&self, max_chars: usize) -> Self {
        Self {
            body: truncate_chars(&self.body, max_chars),
            ..self.clone()
        }
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

/// Order in which a comment's ancestors are handed to a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOrder {
    /// Immediate parent first (the order chains are collected in).
    NearestFirst,
    /// Top-level comment first, immediate parent last.
    RootFirst,
}

/// A comment record as delivered by the fetch layer.
///
/// All fields except `parent_chain` are required; a record missing one
/// fails deserialization rather than being patched with a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawComment {
    pub id: String,
    pub post_id: String,
    pub author: String,
    pub body: String,
    pub score: i32,
    pub depth: i32,
    pub created_utc: i64,
    /// Ancestors, nearest first.
    #[serde(default)]
    pub parent_chain: Vec<ParentChainEntry>,
}

/// Derived ranking inputs and their combined priority.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommentScores {
    pub financial: f64,
    pub author_trust: f64,
    /// Only comparable with comments of the same post.
    pub engagement_normalized: f64,
    pub priority: f64,
}

/// A validated comment, optionally carrying its ranking scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author: String,
    pub body: String,
    pub score: i32,
    pub depth: u32,
    pub created_utc: i64,
    pub parent_chain: Vec<ParentChainEntry>,
    /// `None` until the ranker has scored the comment.
    pub scores: Option<CommentScores>,
}

impl TryFrom<RawComment> for Comment {
    type Error = PipelineError;

    fn try_from(raw: RawComment) -> Result<Self, Self::Error> {
        if raw.id.trim().is_empty() {
            return Err(PipelineError::InvalidComment {
                comment_id: raw.id,
                reason: "empty identifier".to_string(),
            });
        }
        if raw.post_id.trim().is_empty() {
            return Err(PipelineError::InvalidComment {
                comment_id: raw.id,
                reason: "empty post identifier".to_string(),
            });
        }
        let depth = u32::try_from(raw.depth).map_err(|_| PipelineError::InvalidComment {
            comment_id: raw.id.clone(),
            reason: format!("negative depth {}", raw.depth),
        })?;

        Ok(Self {
            id: raw.id,
            post_id: raw.post_id,
            author: raw.author,
            body: raw.body,
            score: raw.score,
            depth,
            created_utc: raw.created_utc,
            parent_chain: raw.parent_chain,
            scores: None,
        })
    }
}

impl Comment {
    /// Raw attention signal: upvote score discounted by nesting depth.
    #[must_use]
    pub fn engagement_proxy(&self) -> f64 {
        f64::from(self.score) / (f64::from(self.depth) + 1.0)
    }

    /// `true` for bodies Reddit has blanked or that are too short to analyze.
    #[must_use]
    pub fn is_unusable(&self, min_body_chars: usize) -> bool {
        let body = self.body.trim();
        body == "[deleted]" || body == "[removed]" || body.chars().count() < min_body_chars.max(1)
    }

    /// Ancestors in the requested order with each body capped at `max_chars`.
    #[must_use]
    pub fn parent_context(&self, order: ChainOrder, max_chars: usize) -> Vec<ParentChainEntry> {
        let truncated = self.parent_chain.iter().map(|e| e.truncated(max_chars));
        match order {
            ChainOrder::NearestFirst => truncated.collect(),
            ChainOrder::RootFirst => truncated.rev().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl Sentiment {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Bullish => "bullish",
            Sentiment::Bearish => "bearish",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bullish" => Ok(Sentiment::Bullish),
            "bearish" => Ok(Sentiment::Bearish),
            "neutral" => Ok(Sentiment::Neutral),
            other => Err(format!("unknown sentiment '{other}'")),
        }
    }
}

/// A completed AI annotation attached to a comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub sentiment: Sentiment,
    pub sarcasm_detected: bool,
    pub has_reasoning: bool,
    /// In `[0, 1]`.
    pub confidence: Decimal,
    pub reasoning_summary: Option<String>,
    pub author_trust_snapshot: Option<f64>,
}

/// What the store knows about a comment's annotation.
///
/// `Missing` and `Pending` both send the comment to analysis; they are kept
/// apart so logs can tell "never stored" from "stored but never analyzed".
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationState {
    Missing,
    Pending,
    Annotated(Annotation),
}

impl From<&sift_db::AnnotationRow> for AnnotationState {
    fn from(row: &sift_db::AnnotationRow) -> Self {
        let Some(raw) = row.sentiment.as_deref() else {
            return AnnotationState::Pending;
        };
        match raw.parse::<Sentiment>() {
            Ok(sentiment) => {
                let missing = missing_annotation_fields(row);
                if !missing.is_empty() {
                    tracing::warn!(
                        comment_id = %row.comment_id,
                        missing = %missing.join(","),
                        "annotated comment has null fields; reading them as false/0"
                    );
                }
                AnnotationState::Annotated(Annotation {
                    sentiment,
                    sarcasm_detected: row.sarcasm_detected.unwrap_or(false),
                    has_reasoning: row.has_reasoning.unwrap_or(false),
                    confidence: row.confidence.unwrap_or(Decimal::ZERO),
                    reasoning_summary: row.reasoning_summary.clone(),
                    author_trust_snapshot: row.author_trust_snapshot,
                })
            }
            Err(reason) => {
                tracing::warn!(
                    comment_id = %row.comment_id,
                    %reason,
                    "stored sentiment is unreadable; treating annotation as pending"
                );
                AnnotationState::Pending
            }
        }
    }
}

/// Names of annotation columns that are null on a row carrying a sentiment.
fn missing_annotation_fields(row: &sift_db::AnnotationRow) -> Vec<&'static str> {
    [
        ("sarcasm_detected", row.sarcasm_detected.is_none()),
        ("has_reasoning", row.has_reasoning.is_none()),
        ("confidence", row.confidence.is_none()),
    ]
    .into_iter()
    .filter_map(|(name, missing)| missing.then_some(name))
    .collect()
}
