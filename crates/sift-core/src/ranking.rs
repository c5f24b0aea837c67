use std::path::Path;

use serde::Deserialize;

use crate::ConfigError;

/// Weights combined into a comment's priority score.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    pub financial: f64,
    pub trust: f64,
    pub engagement: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            financial: 0.4,
            trust: 0.3,
            engagement: 0.3,
        }
    }
}

/// Selection settings read from `config/ranking.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub weights: RankingWeights,
    pub top_n_per_post: usize,
    pub default_author_trust: f64,
    pub parent_context_max_chars: usize,
    pub min_body_chars: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            weights: RankingWeights::default(),
            top_n_per_post: 25,
            default_author_trust: 0.5,
            parent_context_max_chars: 500,
            min_body_chars: 1,
        }
    }
}

impl RankingConfig {
    /// Reject weights and limits that would make ranking meaningless.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRanking`] describing the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = self.weights;
        for (name, value) in [
            ("financial", w.financial),
            ("trust", w.trust),
            ("engagement", w.engagement),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidRanking(format!(
                    "weight '{name}' must be a finite value >= 0, got {value}"
                )));
            }
        }
        if w.financial + w.trust + w.engagement <= 0.0 {
            return Err(ConfigError::InvalidRanking(
                "at least one weight must be positive".to_string(),
            ));
        }
        if self.top_n_per_post == 0 {
            return Err(ConfigError::InvalidRanking(
                "top_n_per_post must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.default_author_trust) {
            return Err(ConfigError::InvalidRanking(format!(
                "default_author_trust must be within [0, 1], got {}",
                self.default_author_trust
            )));
        }
        Ok(())
    }
}

/// Load and validate the ranking configuration from a YAML file.
///
/// Fields omitted from the file fall back to [`RankingConfig::default`].
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_ranking_config(path: &Path) -> Result<RankingConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let config: RankingConfig = serde_yaml::from_str(&content).map_err(|e| ConfigError::Yaml {
        path: path.display().to_string(),
        source: e,
    })?;

    config.validate()?;
    Ok(config)
}
