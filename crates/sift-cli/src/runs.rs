//! Analysis-run command handlers for the CLI.

use std::path::Path;

use anyhow::Context;
use rust_decimal::Decimal;
use sift_core::AppConfig;
use sift_db::{AnnotationInput, RunResults};
use sift_pipeline::{IngestBatch, RetryPolicy, RunContext, RunStatus, Sentiment};

/// Read a batch from `input` and run intake, ranking, storage and the
/// dedup partition under a new analysis run.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, the ranking
/// config is invalid, or the run fails.
pub(crate) async fn run_ingest_file(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    input: &Path,
) -> anyhow::Result<()> {
    let ranking = sift_core::load_ranking_config(&config.ranking_path)?;
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let batch: IngestBatch = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", input.display()))?;

    let policy = RetryPolicy::from_app_config(config);
    let outcome = sift_pipeline::run_ingest(pool, &ranking, &policy, batch).await?;
    let stats = outcome.partition.stats;

    println!("run {} ingested", outcome.run_id);
    println!(
        "  selected {} (dropped {} unusable), stored {}",
        outcome.selected, outcome.dropped_unusable, outcome.stored
    );
    println!(
        "  reused {}, to analyze {}, skipped {}",
        stats.reused, stats.new, stats.skipped
    );
    for request in &outcome.analysis_queue {
        println!(
            "  analyze {} (post {}, {} parent(s))",
            request.comment_id,
            request.post_id,
            request.parent_context.len()
        );
        for parent in &request.parent_context {
            println!("    > {}: {}", parent.author(), parent.body());
        }
    }
    Ok(())
}

/// Validate CLI annotation arguments into a storable record.
///
/// # Errors
///
/// Returns an error if `confidence` lies outside `[0, 1]`.
pub(crate) fn annotation_input(
    sentiment: Sentiment,
    confidence: Decimal,
    sarcasm_detected: bool,
    has_reasoning: bool,
    reasoning_summary: Option<String>,
) -> anyhow::Result<AnnotationInput> {
    if confidence < Decimal::ZERO || confidence > Decimal::ONE {
        anyhow::bail!("confidence must be within [0, 1], got {confidence}");
    }
    Ok(AnnotationInput {
        sentiment: sentiment.as_str().to_string(),
        sarcasm_detected,
        has_reasoning,
        confidence,
        reasoning_summary,
        author_trust_snapshot: None,
    })
}

/// Record `annotation` for `comment_id` under `run_id`.
///
/// # Errors
///
/// Returns an error if the comment is unknown or already annotated.
pub(crate) async fn run_annotate(
    pool: &sqlx::PgPool,
    comment_id: &str,
    run_id: i64,
    annotation: &AnnotationInput,
) -> anyhow::Result<()> {
    let snapshot = sift_db::get_comment(pool, comment_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("comment '{comment_id}' not found"))?
        .author_trust_score;
    let annotation = AnnotationInput {
        author_trust_snapshot: snapshot,
        ..annotation.clone()
    };
    sift_db::record_annotation(pool, comment_id, run_id, &annotation).await?;
    println!("annotated {comment_id} as {}", annotation.sentiment);
    Ok(())
}

/// Complete run `run_id` with its result counters.
///
/// # Errors
///
/// Returns an error if the run is missing or no longer in progress.
pub(crate) async fn run_finish(
    pool: &sqlx::PgPool,
    run_id: i64,
    results: RunResults,
) -> anyhow::Result<()> {
    sift_pipeline::finish_run(pool, &RunContext::new(run_id), results).await?;
    println!("run {run_id} completed");
    Ok(())
}

/// Print the status of run `run_id`.
///
/// # Errors
///
/// Returns an error if the run does not exist or the query fails.
pub(crate) async fn run_status(pool: &sqlx::PgPool, run_id: i64, json: bool) -> anyhow::Result<()> {
    let status = sift_pipeline::get_run_status(pool, run_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("analysis run {run_id} not found"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print!("{}", render_status(&status));
    }
    Ok(())
}

fn render_status(status: &RunStatus) -> String {
    let mut out = format!(
        "run {}: {} (phase {})\n  progress {}/{}\n",
        status.run_id,
        status.status,
        status.phase_label,
        status.progress_current,
        status.progress_total
    );
    if status.is_terminal {
        out.push_str(&format!(
            "  signals {}, positions {}, exits {}\n",
            status.signals_created, status.positions_opened, status.exits_triggered
        ));
    }
    if let Some(message) = &status.error_message {
        out.push_str(&format!("  error: {message}\n"));
    }
    for warning in &status.warnings {
        out.push_str(&format!(
            "  warning [{}] {}\n",
            warning.kind, warning.message
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn status(state: &str, terminal: bool) -> RunStatus {
        RunStatus {
            run_id: 7,
            status: state.to_string(),
            is_terminal: terminal,
            phase: Some(4),
            phase_label: sift_pipeline::phase_label(Some(4)),
            progress_current: 3,
            progress_total: 5,
            signals_created: 2,
            positions_opened: 1,
            exits_triggered: 0,
            warnings: Vec::new(),
            error_message: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn confidence_outside_unit_interval_is_rejected() {
        let err = annotation_input(Sentiment::Bullish, Decimal::new(15, 1), false, false, None);
        assert!(err.is_err());
        let ok = annotation_input(Sentiment::Neutral, Decimal::ONE, false, true, None).unwrap();
        assert_eq!(ok.sentiment, "neutral");
        assert!(ok.has_reasoning);
    }

    #[test]
    fn running_status_hides_result_counters() {
        let text = render_status(&status("running", false));
        assert!(text.starts_with("run 7: running"));
        assert!(text.contains("progress 3/5"));
        assert!(!text.contains("signals"));
    }

    #[test]
    fn terminal_status_shows_counters_and_error() {
        let mut failed = status("failed", true);
        failed.error_message = Some("store unavailable".to_string());
        let text = render_status(&failed);
        assert!(text.contains("signals 2, positions 1, exits 0"));
        assert!(text.contains("error: store unavailable"));
    }
}
