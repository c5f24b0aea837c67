//! Polling-friendly read model over `analysis_runs`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sift_db::{AnalysisRunRow, DbError};
use sqlx::PgPool;

use crate::warnings::{parse_stored_warnings, Warning};

/// Human-readable labels for phases 1 through 7.
pub const PHASE_LABELS: [&str; 7] = [
    "Fetching Reddit data",
    "Scoring and selecting comments",
    "Storing comments",
    "Deduplicating annotations",
    "Analyzing sentiment",
    "Generating signals",
    "Evaluating positions",
];

/// Label for `phase`: `"Not started"` when absent, `"Unknown"` when out of range.
#[must_use]
pub fn phase_label(phase: Option<i16>) -> &'static str {
    let Some(phase) = phase else {
        return "Not started";
    };
    usize::try_from(phase)
        .ok()
        .and_then(|p| p.checked_sub(1))
        .and_then(|idx| PHASE_LABELS.get(idx))
        .copied()
        .unwrap_or("Unknown")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    InProgress,
    Completed,
    Failed,
}

impl RunState {
    /// Parse a stored status. `running` is accepted as an alias of `in_progress`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "in_progress" | "running" => Some(RunState::InProgress),
            "completed" => Some(RunState::Completed),
            "failed" => Some(RunState::Failed),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }

    /// Status string reported to pollers.
    #[must_use]
    pub fn polling_label(self) -> &'static str {
        match self {
            RunState::InProgress => "running",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        }
    }
}

/// Snapshot of a run for status polling. Every field degrades on its own:
/// null counters read as `0`, unreadable warnings as an empty list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatus {
    pub run_id: i64,
    pub status: String,
    pub is_terminal: bool,
    pub phase: Option<i16>,
    pub phase_label: &'static str,
    pub progress_current: i32,
    pub progress_total: i32,
    pub signals_created: i32,
    pub positions_opened: i32,
    pub exits_triggered: i32,
    pub warnings: Vec<Warning>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&AnalysisRunRow> for RunStatus {
    fn from(row: &AnalysisRunRow) -> Self {
        let state = RunState::parse(&row.status);
        Self {
            run_id: row.id,
            status: state.map_or_else(|| row.status.clone(), |s| s.polling_label().to_string()),
            is_terminal: state.is_some_and(RunState::is_terminal),
            phase: row.current_phase,
            phase_label: phase_label(row.current_phase),
            progress_current: row.progress_current.unwrap_or(0),
            progress_total: row.progress_total.unwrap_or(0),
            signals_created: row.signals_created.unwrap_or(0),
            positions_opened: row.positions_opened.unwrap_or(0),
            exits_triggered: row.exits_triggered.unwrap_or(0),
            warnings: parse_stored_warnings(row.warnings.as_deref()),
            error_message: row.error_message.clone(),
            started_at: row.started_at,
            completed_at: row.completed_at,
        }
    }
}

/// Status of run `run_id`, or `None` if no such run exists.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the lookup query fails.
pub async fn get_run_status(pool: &PgPool, run_id: i64) -> Result<Option<RunStatus>, DbError> {
    let row = sift_db::get_analysis_run(pool, run_id).await?;
    Ok(row.as_ref().map(RunStatus::from))
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn bare_row(status: &str) -> AnalysisRunRow {
        AnalysisRunRow {
            id: 7,
            public_id: Uuid::new_v4(),
            status: status.to_string(),
            current_phase: None,
            progress_current: None,
            progress_total: None,
            signals_created: None,
            positions_opened: None,
            exits_triggered: None,
            warnings: None,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
        }
    }

    #[test]
    fn phase_labels_cover_one_through_seven() {
        assert_eq!(phase_label(Some(1)), "Fetching Reddit data");
        assert_eq!(phase_label(Some(7)), "Evaluating positions");
    }

    #[test]
    fn absent_phase_is_not_started() {
        assert_eq!(phase_label(None), "Not started");
    }

    #[test]
    fn out_of_range_phase_is_unknown() {
        assert_eq!(phase_label(Some(0)), "Unknown");
        assert_eq!(phase_label(Some(8)), "Unknown");
        assert_eq!(phase_label(Some(-3)), "Unknown");
    }

    #[test]
    fn null_fields_degrade_to_defaults() {
        let status = RunStatus::from(&bare_row("in_progress"));
        assert_eq!(status.status, "running");
        assert!(!status.is_terminal);
        assert_eq!(status.phase_label, "Not started");
        assert_eq!(status.progress_current, 0);
        assert_eq!(status.progress_total, 0);
        assert_eq!(status.signals_created, 0);
        assert_eq!(status.positions_opened, 0);
        assert_eq!(status.exits_triggered, 0);
        assert!(status.warnings.is_empty());
    }

    #[test]
    fn garbage_warnings_degrade_to_empty_list() {
        let mut row = bare_row("failed");
        row.warnings = Some("{not json".to_string());
        row.error_message = Some("boom".to_string());
        let status = RunStatus::from(&row);
        assert!(status.warnings.is_empty());
        assert!(status.is_terminal);
        assert_eq!(status.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn stored_warnings_are_deserialized() {
        let mut row = bare_row("completed");
        row.current_phase = Some(4);
        row.signals_created = Some(2);
        row.warnings = Some(
            r#"[{"type":"pricing_unavailable","message":"no quote","timestamp":"2026-01-02T03:04:05Z","context":{}}]"#
                .to_string(),
        );
        let status = RunStatus::from(&row);
        assert_eq!(status.status, "completed");
        assert_eq!(status.phase_label, "Deduplicating annotations");
        assert_eq!(status.signals_created, 2);
        assert_eq!(status.warnings.len(), 1);
        assert_eq!(status.warnings[0].message, "no quote");
    }

    #[test]
    fn running_alias_and_unknown_status() {
        assert_eq!(RunState::parse("running"), Some(RunState::InProgress));
        let status = RunStatus::from(&bare_row("paused"));
        assert_eq!(status.status, "paused");
        assert!(!status.is_terminal);
    }

    #[test]
    fn status_serializes_counters_as_numbers() {
        let json = serde_json::to_value(RunStatus::from(&bare_row("in_progress"))).unwrap();
        assert_eq!(json["signals_created"], 0);
        assert!(json["warnings"].as_array().is_some_and(Vec::is_empty));
    }
}
