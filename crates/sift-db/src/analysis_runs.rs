//! Database operations for `analysis_runs`.
//!
//! A run is created `in_progress`, mutated phase by phase, and ends in either
//! `completed` or `failed`. Terminal transitions only apply to runs that are
//! still `in_progress`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `analysis_runs` table.
///
/// Counter and phase columns are nullable; readers decide how to default them.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnalysisRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub status: String,
    pub current_phase: Option<i16>,
    pub progress_current: Option<i32>,
    pub progress_total: Option<i32>,
    pub signals_created: Option<i32>,
    pub positions_opened: Option<i32>,
    pub exits_triggered: Option<i32>,
    /// Serialized JSON array, or `None` when no warnings were recorded.
    pub warnings: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// Result counters written once downstream stages finish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunResults {
    pub signals_created: i32,
    pub positions_opened: i32,
    pub exits_triggered: i32,
}

const RUN_COLUMNS: &str = "id, public_id, status, current_phase, progress_current, \
                           progress_total, signals_created, positions_opened, exits_triggered, \
                           warnings, started_at, completed_at, error_message";

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Creates a new run in `in_progress` status with `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_analysis_run(pool: &PgPool) -> Result<AnalysisRunRow, DbError> {
    let row = sqlx::query_as::<_, AnalysisRunRow>(&format!(
        "INSERT INTO analysis_runs (public_id, status) \
         VALUES ($1, 'in_progress') \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Moves a run into `phase`, resetting `progress_current` to zero.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `in_progress`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn set_run_phase(
    pool: &PgPool,
    id: i64,
    phase: i16,
    progress_total: Option<i32>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE analysis_runs \
         SET current_phase = $1, progress_current = 0, progress_total = $2 \
         WHERE id = $3 AND status = 'in_progress'",
    )
    .bind(phase)
    .bind(progress_total)
    .bind(id)
    .execute(pool)
    .await?;

    require_in_progress(result.rows_affected(), id)
}

/// Updates `progress_current` (and optionally `progress_total`) for a run.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `in_progress`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn update_run_progress(
    pool: &PgPool,
    id: i64,
    current: i32,
    total: Option<i32>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE analysis_runs \
         SET progress_current = $1, progress_total = COALESCE($2, progress_total) \
         WHERE id = $3 AND status = 'in_progress'",
    )
    .bind(current)
    .bind(total)
    .bind(id)
    .execute(pool)
    .await?;

    require_in_progress(result.rows_affected(), id)
}

/// Writes the result counters for a run that is still `in_progress`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `in_progress`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn record_run_results(
    pool: &PgPool,
    id: i64,
    results: RunResults,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE analysis_runs \
         SET signals_created = $1, positions_opened = $2, exits_triggered = $3 \
         WHERE id = $4 AND status = 'in_progress'",
    )
    .bind(results.signals_created)
    .bind(results.positions_opened)
    .bind(results.exits_triggered)
    .bind(id)
    .execute(pool)
    .await?;

    require_in_progress(result.rows_affected(), id)
}

/// Replaces the serialized warnings of an `in_progress` run. `None` clears
/// the column.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `in_progress`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn save_run_warnings(
    pool: &PgPool,
    id: i64,
    warnings: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE analysis_runs SET warnings = $1 WHERE id = $2 AND status = 'in_progress'",
    )
    .bind(warnings)
    .bind(id)
    .execute(pool)
    .await?;

    require_in_progress(result.rows_affected(), id)
}

/// Marks a run as `completed` and sets `completed_at = NOW()`.
///
/// Counters in `results` and the status change are written by one guarded
/// statement, so a run that is already terminal is left untouched. `None`
/// keeps the stored counters. `warnings` replaces the stored warnings when
/// `Some`; `None` keeps whatever an earlier stage saved.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `in_progress`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn complete_analysis_run(
    pool: &PgPool,
    id: i64,
    results: Option<RunResults>,
    warnings: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE analysis_runs \
         SET status = 'completed', completed_at = NOW(), \
             signals_created = COALESCE($1, signals_created), \
             positions_opened = COALESCE($2, positions_opened), \
             exits_triggered = COALESCE($3, exits_triggered), \
             warnings = COALESCE($4, warnings) \
         WHERE id = $5 AND status = 'in_progress'",
    )
    .bind(results.map(|r| r.signals_created))
    .bind(results.map(|r| r.positions_opened))
    .bind(results.map(|r| r.exits_triggered))
    .bind(warnings)
    .bind(id)
    .execute(pool)
    .await?;

    require_in_progress(result.rows_affected(), id)
}

/// Marks a run as `failed` with `error_message`, keeping any warnings
/// gathered before the failure.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `in_progress`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn fail_analysis_run(
    pool: &PgPool,
    id: i64,
    error_message: &str,
    warnings: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE analysis_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1, \
             warnings = COALESCE($2, warnings) \
         WHERE id = $3 AND status = 'in_progress'",
    )
    .bind(error_message)
    .bind(warnings)
    .bind(id)
    .execute(pool)
    .await?;

    require_in_progress(result.rows_affected(), id)
}

fn require_in_progress(rows_affected: u64, id: i64) -> Result<(), DbError> {
    if rows_affected == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "in_progress",
        });
    }
    Ok(())
}

/// Fetches a run by its internal `id`, or `None` if it does not exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_analysis_run(pool: &PgPool, id: i64) -> Result<Option<AnalysisRunRow>, DbError> {
    let row = sqlx::query_as::<_, AnalysisRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM analysis_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
