//! Per-post engagement normalization.

/// Output for every comment when a post's engagement values are all equal
/// (including the single-comment case).
pub const DEGENERATE_ENGAGEMENT: f64 = 0.5;

/// Min-max rescale `raw` engagement values of one post into `[0, 1]`.
///
/// Values must all come from the same post; the result is positionally
/// aligned with the input. When the spread is zero (one comment, or all
/// equal) every entry becomes [`DEGENERATE_ENGAGEMENT`]. Non-finite inputs
/// are treated as `0.0`.
#[must_use]
pub fn normalize_engagement(raw: &[f64]) -> Vec<f64> {
    let clean: Vec<f64> = raw
        .iter()
        .map(|v| if v.is_finite() { *v } else { 0.0 })
        .collect();

    let min = clean.iter().copied().fold(f64::INFINITY, f64::min);
    let max = clean.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let spread = max - min;

    if clean.is_empty() || spread <= f64::EPSILON {
        return vec![DEGENERATE_ENGAGEMENT; clean.len()];
    }

    clean.iter().map(|v| (v - min) / spread).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_returns_empty() {
        assert!(normalize_engagement(&[]).is_empty());
    }

    #[test]
    fn single_value_is_degenerate_constant() {
        assert_eq!(normalize_engagement(&[42.0]), vec![DEGENERATE_ENGAGEMENT]);
    }

    #[test]
    fn all_equal_values_are_degenerate_constant() {
        assert_eq!(
            normalize_engagement(&[3.0, 3.0, 3.0]),
            vec![DEGENERATE_ENGAGEMENT; 3]
        );
    }

    #[test]
    fn min_max_rescales_into_unit_interval() {
        let out = normalize_engagement(&[-10.0, 0.0, 10.0]);
        assert_eq!(out, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn order_is_preserved() {
        let out = normalize_engagement(&[5.0, 1.0, 3.0]);
        assert_eq!(out, vec![1.0, 0.0, 0.5]);
    }

    #[test]
    fn non_finite_values_are_zeroed() {
        let out = normalize_engagement(&[f64::NAN, 4.0]);
        assert_eq!(out, vec![0.0, 1.0]);
    }
}
