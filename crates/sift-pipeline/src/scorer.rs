//! Financial relevance scorer for comment text.

use std::sync::LazyLock;

use regex::Regex;

/// Ticker mentions such as `$TSLA` or `$spy`.
static CASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$[A-Za-z]{1,5}$").expect("valid cashtag regex"));

/// Weight of a cashtag hit relative to a vocabulary hit.
const CASHTAG_WEIGHT: f64 = 2.0;

/// Market and trading jargon. Keys are lowercase single words.
pub(crate) const VOCABULARY: &[&str] = &[
    // Instruments and positions
    "stock", "stocks", "shares", "calls", "call", "puts", "put", "options", "leaps", "strike",
    "expiry", "position", "positions", "portfolio", "margin", "float", "etf", "spy", "qqq",
    // Fundamentals and macro
    "earnings", "revenue", "guidance", "eps", "dividend", "valuation", "ipo", "fed", "rates",
    "inflation", "cpi",
    // Direction and sentiment
    "bullish", "bearish", "long", "short", "squeeze", "buy", "buying", "bought", "sell",
    "selling", "sold", "hold", "holding", "rally", "crash", "dip", "moon", "tendies", "yolo",
    "dd", "iv", "theta", "gamma",
];

/// Score how much `text` talks about markets.
///
/// Each vocabulary word counts `1.0` and each cashtag counts
/// [`CASHTAG_WEIGHT`]; the sum is divided by the square root of the word
/// count so long comments are not rewarded for length alone. Always `>= 0`;
/// empty or whitespace-only text scores `0.0`.
#[must_use]
pub fn financial_relevance_score(text: &str) -> f64 {
    let mut words = 0_u32;
    let mut hits = 0.0_f64;

    for token in text.split_whitespace() {
        words += 1;
        let trimmed = token.trim_matches(|c: char| !c.is_alphanumeric() && c != '$');
        if CASHTAG.is_match(trimmed) {
            hits += CASHTAG_WEIGHT;
            continue;
        }
        let w = trimmed.trim_start_matches('$').to_lowercase();
        if VOCABULARY.contains(&w.as_str()) {
            hits += 1.0;
        }
    }

    if words == 0 {
        return 0.0;
    }
    hits / f64::from(words).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_returns_zero() {
        assert_eq!(financial_relevance_score(""), 0.0);
    }

    #[test]
    fn whitespace_only_returns_zero() {
        assert_eq!(financial_relevance_score(" \t\n "), 0.0);
    }

    #[test]
    fn unrelated_text_returns_zero() {
        assert_eq!(financial_relevance_score("my cat likes the sunshine"), 0.0);
    }

    #[test]
    fn cashtag_outweighs_single_keyword() {
        let cashtag = financial_relevance_score("$TSLA");
        let keyword = financial_relevance_score("earnings");
        assert!((cashtag - 2.0).abs() < 1e-9, "got {cashtag}");
        assert!((keyword - 1.0).abs() < 1e-9, "got {keyword}");
    }

    #[test]
    fn punctuation_and_case_are_ignored() {
        let score = financial_relevance_score("CALLS! Puts? ($spy)");
        // calls + puts + cashtag over sqrt(3)
        let expected = 4.0 / 3.0_f64.sqrt();
        assert!((score - expected).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn too_long_ticker_is_not_a_cashtag() {
        assert_eq!(financial_relevance_score("$ABCDEFG"), 0.0);
    }

    #[test]
    fn padding_dilutes_the_score() {
        let dense = financial_relevance_score("bought calls before earnings");
        let padded = financial_relevance_score(
            "so yesterday after a long walk with my dog I finally bought calls before earnings",
        );
        assert!(dense > padded, "dense {dense} should beat padded {padded}");
        assert!(padded > 0.0);
    }

    #[test]
    fn scoring_is_deterministic() {
        let text = "$NVDA to the moon, loading up on leaps before the fed meeting";
        let first = financial_relevance_score(text);
        for _ in 0..10 {
            assert_eq!(financial_relevance_score(text).to_bits(), first.to_bits());
        }
    }

    #[test]
    fn any_string_is_accepted() {
        for text in ["$", "$$$", "🚀🚀🚀", "\u{0}", "$1234"] {
            assert!(financial_relevance_score(text) >= 0.0);
        }
    }
}
