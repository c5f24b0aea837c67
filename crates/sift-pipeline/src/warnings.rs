//! Per-run collector for non-fatal degraded conditions.
//!
//! One [`WarningsCollector`] belongs to one run and is passed explicitly to
//! the stages that may degrade. Appends from concurrent tasks or threads go
//! through a single mutex.

use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// The fixed set of degraded-but-non-fatal conditions a run can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    MarketDataUnavailable,
    PricingUnavailable,
    ImageAnalysisFailed,
    MarketHoursSkipped,
    InsufficientFunds,
    PredictionDataUnavailable,
    DataIntegrity,
}

impl WarningKind {
    pub const ALL: [WarningKind; 7] = [
        WarningKind::MarketDataUnavailable,
        WarningKind::PricingUnavailable,
        WarningKind::ImageAnalysisFailed,
        WarningKind::MarketHoursSkipped,
        WarningKind::InsufficientFunds,
        WarningKind::PredictionDataUnavailable,
        WarningKind::DataIntegrity,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WarningKind::MarketDataUnavailable => "market_data_unavailable",
            WarningKind::PricingUnavailable => "pricing_unavailable",
            WarningKind::ImageAnalysisFailed => "image_analysis_failed",
            WarningKind::MarketHoursSkipped => "market_hours_skipped",
            WarningKind::InsufficientFunds => "insufficient_funds",
            WarningKind::PredictionDataUnavailable => "prediction_data_unavailable",
            WarningKind::DataIntegrity => "data_integrity",
        }
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WarningKind {
    type Err = WarningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WarningKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| WarningError::UnknownKind(s.to_string()))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WarningError {
    #[error("unknown warning type '{0}'")]
    UnknownKind(String),
}

/// One recorded degraded condition. Never changed once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    #[serde(rename = "type")]
    pub kind: WarningKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub context: Map<String, Value>,
}

#[derive(Debug, Default)]
pub struct WarningsCollector {
    entries: Mutex<Vec<Warning>>,
}

impl WarningsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning stamped with the current UTC time.
    pub fn append(
        &self,
        kind: WarningKind,
        message: impl Into<String>,
        context: Map<String, Value>,
    ) {
        let warning = Warning {
            kind,
            message: message.into(),
            timestamp: Utc::now(),
            context,
        };
        tracing::warn!(
            warning_type = %warning.kind,
            message = %warning.message,
            "run warning recorded"
        );
        self.lock().push(warning);
    }

    /// Record a warning whose type arrives as a string.
    ///
    /// # Errors
    ///
    /// Returns [`WarningError::UnknownKind`] for a type outside the fixed set;
    /// nothing is recorded in that case.
    pub fn try_append(
        &self,
        kind: &str,
        message: impl Into<String>,
        context: Map<String, Value>,
    ) -> Result<(), WarningError> {
        let kind = kind.parse::<WarningKind>()?;
        self.append(kind, message, context);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the warnings recorded so far, in append order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Warning> {
        self.lock().clone()
    }

    /// JSON array of the recorded warnings, or `None` when nothing was recorded.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if a warning cannot be serialized.
    pub fn serialize(&self) -> Result<Option<String>, serde_json::Error> {
        let entries = self.lock();
        if entries.is_empty() {
            return Ok(None);
        }
        serde_json::to_string(&*entries).map(Some)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Warning>> {
        // Entries are pushed whole, so a poisoned lock still guards a valid list.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Parse a stored warnings column, yielding an empty list for `None`, empty
/// text, or anything that does not deserialize.
#[must_use]
pub fn parse_stored_warnings(raw: Option<&str>) -> Vec<Warning> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str(raw) {
        Ok(warnings) => warnings,
        Err(e) => {
            tracing::warn!(error = %e, "stored warnings are unreadable; reporting none");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;

    fn ctx(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn empty_collector_serializes_to_none() {
        let collector = WarningsCollector::new();
        assert_eq!(collector.serialize().unwrap(), None);
    }

    #[test]
    fn serialized_warnings_keep_append_order_and_type_names() {
        let collector = WarningsCollector::new();
        collector.append(
            WarningKind::PricingUnavailable,
            "quote endpoint timed out",
            ctx(json!({"symbol": "TSLA"})),
        );
        collector.append(WarningKind::MarketHoursSkipped, "market closed", Map::new());

        let raw = collector.serialize().unwrap().expect("some warnings");
        let parsed: Vec<Value> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["type"], "pricing_unavailable");
        assert_eq!(parsed[0]["context"]["symbol"], "TSLA");
        assert_eq!(parsed[1]["type"], "market_hours_skipped");
        assert!(parsed[0]["timestamp"].is_string());
    }

    #[test]
    fn unknown_type_is_rejected_without_mutation() {
        let collector = WarningsCollector::new();
        collector.append(WarningKind::InsufficientFunds, "cash low", Map::new());

        let err = collector
            .try_append("cosmic_rays", "bit flip", Map::new())
            .unwrap_err();

        assert_eq!(err, WarningError::UnknownKind("cosmic_rays".to_string()));
        assert_eq!(collector.len(), 1);
    }

    #[test]
    fn known_type_string_is_accepted() {
        let collector = WarningsCollector::new();
        collector
            .try_append("prediction_data_unavailable", "no odds", Map::new())
            .unwrap();
        assert_eq!(
            collector.snapshot()[0].kind,
            WarningKind::PredictionDataUnavailable
        );
    }

    #[test]
    fn every_kind_round_trips_through_its_name() {
        for kind in WarningKind::ALL {
            assert_eq!(kind.as_str().parse::<WarningKind>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn timestamp_is_stamped_at_append_time() {
        let before = Utc::now();
        let collector = WarningsCollector::new();
        collector.append(
            WarningKind::ImageAnalysisFailed,
            "vision call failed",
            Map::new(),
        );
        let after = Utc::now();
        let stamped = collector.snapshot()[0].timestamp;
        assert!(stamped >= before && stamped <= after);
    }

    #[test]
    fn concurrent_appends_lose_nothing() {
        let collector = Arc::new(WarningsCollector::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let collector = Arc::clone(&collector);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        collector.append(
                            WarningKind::MarketDataUnavailable,
                            format!("worker {worker} item {i}"),
                            Map::new(),
                        );
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(collector.len(), 2_000);
        let raw = collector.serialize().unwrap().unwrap();
        let parsed: Vec<Warning> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.len(), 2_000);
    }

    #[test]
    fn stored_warnings_parse_leniently() {
        assert!(parse_stored_warnings(None).is_empty());
        assert!(parse_stored_warnings(Some("")).is_empty());
        assert!(parse_stored_warnings(Some("not json")).is_empty());
        assert!(parse_stored_warnings(Some("[]")).is_empty());

        let collector = WarningsCollector::new();
        collector.append(WarningKind::DataIntegrity, "orphan", Map::new());
        let raw = collector.serialize().unwrap();
        let parsed = parse_stored_warnings(raw.as_deref());
        assert_eq!(parsed, collector.snapshot());
    }
}
