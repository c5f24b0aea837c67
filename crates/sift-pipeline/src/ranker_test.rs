use std::collections::HashMap;

use sift_core::{RankingConfig, RankingWeights};

use super::*;
use crate::types::ParentChainEntry;

fn post(id: &str) -> Post {
    Post {
        id: id.to_string(),
        subreddit: "wallstreetbets".to_string(),
        title: format!("post {id}"),
        author: "op".to_string(),
        score: 1,
        num_comments: 0,
        created_utc: 1_700_000_000,
    }
}

fn comment(id: &str, post_id: &str, body: &str, score: i32, depth: u32) -> Comment {
    Comment {
        id: id.to_string(),
        post_id: post_id.to_string(),
        author: format!("author_{id}"),
        body: body.to_string(),
        score,
        depth,
        created_utc: 1_700_000_100,
        parent_chain: Vec::new(),
        scores: None,
    }
}

fn config(top_n: usize) -> RankingConfig {
    RankingConfig {
        top_n_per_post: top_n,
        ..RankingConfig::default()
    }
}

fn priorities(comments: &[Comment]) -> Vec<f64> {
    comments
        .iter()
        .map(|c| c.scores.expect("scored").priority)
        .collect()
}

#[test]
fn priority_is_weighted_blend() {
    let weights = RankingWeights {
        financial: 0.5,
        trust: 0.25,
        engagement: 0.25,
    };
    // financial 1.0 squashes to 0.5
    let p = priority_score(&weights, 1.0, 0.8, 0.4);
    assert!((p - (0.25 + 0.2 + 0.1)).abs() < 1e-12, "got {p}");
}

#[test]
fn selector_returns_min_of_m_and_n_sorted_descending() {
    let posts = vec![post("p1"), post("p2")];
    let mut comments = Vec::new();
    for i in 0..7 {
        comments.push(comment(&format!("a{i}"), "p1", "$GME calls", i, 0));
    }
    for i in 0..2 {
        comments.push(comment(&format!("b{i}"), "p2", "nice weather", i, 0));
    }

    let selected = rank_and_select(&posts, comments, &HashMap::new(), &config(5)).unwrap();

    let p1 = &selected["p1"];
    let p2 = &selected["p2"];
    assert_eq!(p1.len(), 5);
    assert_eq!(p2.len(), 2);
    assert!(p1.iter().all(|c| c.post_id == "p1"));
    assert!(p2.iter().all(|c| c.post_id == "p2"));

    let pr = priorities(p1);
    assert!(
        pr.windows(2).all(|w| w[0] >= w[1]),
        "not descending: {pr:?}"
    );
}

#[test]
fn posts_without_comments_get_empty_lists() {
    let selected =
        rank_and_select(&[post("p1")], Vec::new(), &HashMap::new(), &config(3)).unwrap();
    assert!(selected["p1"].is_empty());
}

#[test]
fn comment_for_unknown_post_is_a_contract_violation() {
    let result = rank_and_select(
        &[post("p1")],
        vec![
            comment("c1", "ghost", "calls", 1, 0),
            comment("c2", "ghost", "puts", 1, 0),
        ],
        &HashMap::new(),
        &config(3),
    );
    assert!(matches!(
        result,
        Err(PipelineError::MissingPost { ref post_id, comment_count: 2 }) if post_id == "ghost"
    ));
}

#[test]
fn engagement_is_normalized_within_each_post_only() {
    // p1's lone comment has huge engagement, p2's spread is small.
    let posts = vec![post("p1"), post("p2")];
    let comments = vec![
        comment("big", "p1", "hello", 10_000, 0),
        comment("low", "p2", "hello", 1, 0),
        comment("high", "p2", "hello", 3, 0),
    ];
    let selected = rank_and_select(&posts, comments, &HashMap::new(), &config(10)).unwrap();

    let big = selected["p1"][0].scores.unwrap();
    assert!((big.engagement_normalized - 0.5).abs() < f64::EPSILON);

    let p2 = &selected["p2"];
    assert_eq!(p2[0].id, "high");
    assert!((p2[0].scores.unwrap().engagement_normalized - 1.0).abs() < f64::EPSILON);
    assert!(p2[1].scores.unwrap().engagement_normalized.abs() < f64::EPSILON);
}

#[test]
fn known_author_trust_outranks_default() {
    let posts = vec![post("p1")];
    let comments = vec![
        comment("x", "p1", "same text", 5, 0),
        comment("y", "p1", "same text", 5, 0),
    ];
    let trust = HashMap::from([("author_y".to_string(), 0.95)]);
    let selected = rank_and_select(&posts, comments, &trust, &config(10)).unwrap();

    let p1 = &selected["p1"];
    assert_eq!(p1[0].id, "y");
    assert!((p1[0].scores.unwrap().author_trust - 0.95).abs() < f64::EPSILON);
    assert!((p1[1].scores.unwrap().author_trust - 0.5).abs() < f64::EPSILON);
}

#[test]
fn ties_break_on_raw_engagement_then_id() {
    // Zero engagement weight makes every priority equal.
    let cfg = RankingConfig {
        weights: RankingWeights {
            financial: 0.0,
            trust: 1.0,
            engagement: 0.0,
        },
        top_n_per_post: 10,
        ..RankingConfig::default()
    };
    let posts = vec![post("p1")];
    let comments = vec![
        comment("c", "p1", "x", 1, 0),
        comment("b", "p1", "x", 9, 0),
        comment("a", "p1", "x", 1, 0),
    ];
    let selected = rank_and_select(&posts, comments, &HashMap::new(), &cfg).unwrap();
    let ids: Vec<&str> = selected["p1"].iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a", "c"]);
}

#[test]
fn ranking_is_deterministic_regardless_of_input_order() {
    let posts = vec![post("p1")];
    let base = vec![
        comment("c1", "p1", "$AMD earnings play", 4, 1),
        comment("c2", "p1", "lol", 40, 0),
        comment("c3", "p1", "buying puts on $SPY", 4, 1),
        comment("c4", "p1", "buying puts on $SPY", 4, 1),
    ];
    let mut reversed = base.clone();
    reversed.reverse();

    let a = rank_and_select(&posts, base, &HashMap::new(), &config(3)).unwrap();
    let b = rank_and_select(&posts, reversed, &HashMap::new(), &config(3)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn selection_keeps_parent_chain_intact() {
    let mut c = comment("c1", "p1", "$TSLA", 1, 2);
    c.parent_chain = vec![
        ParentChainEntry::new("par", "parent text", 1, "pa"),
        ParentChainEntry::new("root", "root text", 0, "ra"),
    ];
    let expected_chain = c.parent_chain.clone();

    let selected = rank_and_select(&[post("p1")], vec![c], &HashMap::new(), &config(1)).unwrap();
    let kept = &selected["p1"][0];
    assert_eq!(kept.parent_chain, expected_chain);
    assert_eq!(kept.body, "$TSLA");
    assert!(kept.scores.is_some());
}
