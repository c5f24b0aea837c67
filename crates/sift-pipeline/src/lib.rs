//! Comment prioritization, deduplication and run-state tracking.
//!
//! Raw Reddit comments are scored for financial relevance, blended with
//! author trust and per-post engagement into a priority score, trimmed to
//! the top N per post, stored, and then split into comments whose earlier
//! AI annotation can be reused and comments that still need analysis.
//! Degraded conditions are collected per run and surfaced through the
//! run-status read model.

pub mod dedup;
pub mod engagement;
pub mod error;
pub mod pipeline;
pub mod ranker;
pub mod retry;
pub mod run_status;
pub mod scorer;
pub mod trust;
pub mod types;
pub mod warnings;

pub use dedup::{partition_for_run, Partition, PartitionStats, ReusableComment};
pub use engagement::normalize_engagement;
pub use error::PipelineError;
pub use pipeline::{
    finish_run, run_ingest, AnalysisRequest, IngestBatch, IngestOutcome, RunContext,
};
pub use ranker::{priority_score, rank_and_select};
pub use retry::{retry_any, retry_with_backoff, AttemptError, RetryPolicy};
pub use run_status::{get_run_status, phase_label, RunState, RunStatus};
pub use scorer::financial_relevance_score;
pub use trust::{resolve_author_trust, trust_or_default};
pub use types::{
    Annotation, AnnotationState, ChainOrder, Comment, CommentScores, ParentChainEntry, Post,
    RawComment, Sentiment,
};
pub use warnings::{Warning, WarningError, WarningKind, WarningsCollector};
