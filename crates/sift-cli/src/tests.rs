use super::*;

#[test]
fn parses_db_migrate_command() {
    let cli = Cli::try_parse_from(["sift-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["sift-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn ingest_requires_input() {
    assert!(Cli::try_parse_from(["sift-cli", "ingest"]).is_err());

    let cli = Cli::try_parse_from(["sift-cli", "ingest", "--input", "batch.json"]).unwrap();
    match cli.command {
        Some(Commands::Ingest { input }) => {
            assert_eq!(input, std::path::PathBuf::from("batch.json"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn annotate_parses_sentiment_and_confidence() {
    let cli = Cli::try_parse_from([
        "sift-cli",
        "annotate",
        "--comment-id",
        "c1",
        "--run-id",
        "4",
        "--sentiment",
        "bearish",
        "--confidence",
        "0.75",
        "--sarcasm",
    ])
    .unwrap();

    match cli.command {
        Some(Commands::Annotate {
            comment_id,
            run_id,
            sentiment,
            confidence,
            sarcasm,
            has_reasoning,
            summary,
        }) => {
            assert_eq!(comment_id, "c1");
            assert_eq!(run_id, 4);
            assert_eq!(sentiment, Sentiment::Bearish);
            assert_eq!(confidence, Decimal::new(75, 2));
            assert!(sarcasm);
            assert!(!has_reasoning);
            assert!(summary.is_none());
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn annotate_rejects_unknown_sentiment() {
    let result = Cli::try_parse_from([
        "sift-cli",
        "annotate",
        "--comment-id",
        "c1",
        "--run-id",
        "4",
        "--sentiment",
        "moon",
        "--confidence",
        "0.5",
    ]);
    assert!(result.is_err());
}

#[test]
fn finish_counters_default_to_zero() {
    let cli =
        Cli::try_parse_from(["sift-cli", "finish", "--run-id", "9", "--signals", "2"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Finish {
            run_id: 9,
            signals: 2,
            positions: 0,
            exits: 0
        })
    ));
}

#[test]
fn status_takes_positional_run_id() {
    let cli = Cli::try_parse_from(["sift-cli", "status", "12", "--json"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Status {
            run_id: 12,
            json: true
        })
    ));
}
