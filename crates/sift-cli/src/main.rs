mod runs;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sift_pipeline::Sentiment;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "sift-cli")]
#[command(about = "Comment prioritization and analysis-run tracking")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Rank, store and partition a batch of fetched posts and comments
    Ingest {
        /// JSON file with `posts` and `comments` arrays
        #[arg(long)]
        input: std::path::PathBuf,
    },
    /// Record the AI annotation of one comment
    Annotate {
        #[arg(long)]
        comment_id: String,
        /// Run the annotation belongs to
        #[arg(long)]
        run_id: i64,
        /// One of bullish, bearish, neutral
        #[arg(long)]
        sentiment: Sentiment,
        /// Model confidence in [0, 1]
        #[arg(long)]
        confidence: Decimal,
        #[arg(long)]
        sarcasm: bool,
        #[arg(long)]
        has_reasoning: bool,
        #[arg(long)]
        summary: Option<String>,
    },
    /// Mark an ingested run completed with its downstream result counts
    Finish {
        #[arg(long)]
        run_id: i64,
        #[arg(long, default_value = "0")]
        signals: i32,
        #[arg(long, default_value = "0")]
        positions: i32,
        #[arg(long, default_value = "0")]
        exits: i32,
    },
    /// Show status, phase, progress and warnings of a run
    Status {
        run_id: i64,
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("sift-cli ready; run `sift-cli --help` for commands");
        return Ok(());
    };

    let config = sift_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = sift_db::PoolConfig::from_app_config(&config);
    let pool = sift_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            sqlx::query("SELECT 1").execute(&pool).await?;
            println!("database reachable");
        }
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let applied = sift_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::Ingest { input } => runs::run_ingest_file(&pool, &config, &input).await?,
        Commands::Annotate {
            comment_id,
            run_id,
            sentiment,
            confidence,
            sarcasm,
            has_reasoning,
            summary,
        } => {
            let annotation =
                runs::annotation_input(sentiment, confidence, sarcasm, has_reasoning, summary)?;
            runs::run_annotate(&pool, &comment_id, run_id, &annotation).await?;
        }
        Commands::Finish {
            run_id,
            signals,
            positions,
            exits,
        } => {
            let results = sift_db::RunResults {
                signals_created: signals,
                positions_opened: positions,
                exits_triggered: exits,
            };
            runs::run_finish(&pool, run_id, results).await?;
        }
        Commands::Status { run_id, json } => runs::run_status(&pool, run_id, json).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests;
