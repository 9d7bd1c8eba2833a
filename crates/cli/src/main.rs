//! Command-line front end for the verification engine.
//!
//! `sqlshadow optimize` runs one statement through the full loop and prints
//! either a human-readable report or the raw outcome as JSON. `health` and
//! `config` exist for operating the service: a quick collaborator probe and
//! a dump of the effective configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use sqlshadow_core::config::EngineConfig;
use sqlshadow_core::types::{Dialect, OptimizationRequest};
use sqlshadow_core::verdict::{OutcomeStatus, RequestOutcome};
use sqlshadow_db::PgShadowDatabase;
use sqlshadow_engine::Orchestrator;
use sqlshadow_llm::{LlmConfig, OpenAiChatClient};

#[derive(Parser)]
#[command(
    name = "sqlshadow",
    version,
    about = "Verify LLM-proposed SQL optimizations against a shadow database"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Diagnose a statement, request proposals, and verify them.
    Optimize {
        /// The SQL statement to optimize.
        #[arg(long, conflicts_with = "file")]
        sql: Option<String>,
        /// Read the SQL statement from a file instead.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Target database dialect.
        #[arg(long, default_value = "postgres")]
        database: String,
        /// Print the raw outcome as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Probe the shadow database and report collaborator status.
    Health,
    /// Print the effective engine configuration.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sqlshadow=info".into()),
        )
        .init();

    match Cli::parse().command {
        Command::Optimize {
            sql,
            file,
            database,
            json,
        } => optimize(sql, file, &database, json).await,
        Command::Health => health().await,
        Command::Config => {
            print_config();
            Ok(())
        }
    }
}

async fn optimize(
    sql: Option<String>,
    file: Option<PathBuf>,
    database: &str,
    json: bool,
) -> anyhow::Result<()> {
    let sql = match (sql, file) {
        (Some(sql), _) => sql,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("could not read {}", path.display()))?,
        (None, None) => anyhow::bail!("provide the statement via --sql or --file"),
    };
    let sql = sql.trim();
    anyhow::ensure!(!sql.is_empty(), "the statement is empty");
    let dialect: Dialect = database.parse()?;

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = sqlshadow_db::create_pool(&database_url)
        .await
        .context("could not connect to the shadow database")?;

    let llm_config = LlmConfig::from_env();
    let client = OpenAiChatClient::new(llm_config)
        .map_err(|e| anyhow::anyhow!("could not build the proposal-source client: {e}"))?;

    let orchestrator = Orchestrator::new(
        Arc::new(PgShadowDatabase::new(pool.clone())),
        Arc::new(client),
        EngineConfig::from_env(),
    );

    // Ctrl-C stops the loop cleanly instead of killing an in-flight scope.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing the current attempt");
            signal_cancel.cancel();
        }
    });

    let request = OptimizationRequest::new(sql, dialect);
    let outcome = orchestrator.optimize(&request, cancel).await;
    pool.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_report(&outcome);
    }

    if outcome.status == OutcomeStatus::FatalError {
        anyhow::bail!(
            "{}",
            outcome.error.as_deref().unwrap_or("engine failure")
        );
    }
    Ok(())
}

fn print_report(outcome: &RequestOutcome) {
    println!("request:  {}", outcome.request_id);
    println!("status:   {:?}", outcome.status);
    println!("attempts: {}", outcome.attempts);
    println!("diagnosis: {}", outcome.diagnosis.summary);

    for verdict in &outcome.verdicts {
        match &verdict.rejection {
            None => println!(
                "  attempt {}: accepted ({:.2}x speedup)",
                verdict.attempt,
                verdict.speedup_ratio.unwrap_or(0.0)
            ),
            Some(reason) => {
                println!("  attempt {}: rejected -- {}", verdict.attempt, reason.feedback())
            }
        }
    }

    match outcome.status {
        OutcomeStatus::Accepted => {
            if let Some(ratio) = outcome.speedup_ratio {
                println!("speedup:  {ratio:.2}x");
            }
            if let Some(sql) = &outcome.optimized_sql {
                println!("\noptimized statement:\n{sql}");
            }
            if let Some(ddl) = &outcome.index_ddl {
                println!("\nrecommended index:\n{ddl}");
            }
            if let Some(rationale) = &outcome.rationale {
                println!("\nrationale: {rationale}");
            }
        }
        OutcomeStatus::Exhausted => {
            println!("no verified optimization found; keep the original statement");
        }
        OutcomeStatus::Cancelled => println!("cancelled before completion"),
        OutcomeStatus::FatalError => {
            println!("failed: {}", outcome.error.as_deref().unwrap_or("unknown"));
        }
    }
}

async fn health() -> anyhow::Result<()> {
    let llm_config = LlmConfig::from_env();
    println!("proposal source: {} @ {}", llm_config.model, llm_config.base_url);
    println!(
        "credentials:     {}",
        if llm_config.has_credentials() {
            "configured"
        } else {
            "none"
        }
    );

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = sqlshadow_db::create_pool_lazy(&database_url)?;
    match sqlshadow_db::server_version(&pool).await {
        Ok(version) => println!("shadow database: ok (PostgreSQL {version})"),
        Err(error) => {
            println!("shadow database: unreachable ({error})");
            anyhow::bail!("shadow database is unreachable");
        }
    }
    Ok(())
}

fn print_config() {
    let config = EngineConfig::from_env();
    let llm_config = LlmConfig::from_env();

    println!("max_attempts:            {}", config.max_attempts);
    println!("min_speedup:             {}", config.min_speedup);
    println!("timing_repeat_count:     {}", config.timing_repeat_count);
    println!("variance_tolerance:      {}", config.variance_tolerance);
    println!("float_epsilon:           {}", config.float_epsilon);
    println!("shadow_timeout_secs:     {}", config.shadow_timeout_secs);
    println!("proposal_timeout_secs:   {}", config.proposal_timeout_secs);
    println!("max_result_rows:         {}", config.max_result_rows);
    println!("full_scan_row_threshold: {}", config.full_scan_row_threshold);
    println!(
        "forbidden_operations:    {}",
        config.forbidden_operations.join(", ")
    );
    println!("llm_base_url:            {}", llm_config.base_url);
    println!("llm_model:               {}", llm_config.model);
    println!(
        "llm_api_key:             {}",
        if llm_config.has_credentials() {
            "***"
        } else {
            "(not set)"
        }
    );
    println!("llm_timeout_secs:        {}", llm_config.timeout_secs);
}
