//! studyd - study-assistant service entry point

use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use tracing::info;

use studyd::agents::{PlanningAgent, RefineEngine};
use studyd::cli::{Cli, Command, OutputFormat};
use studyd::config::Config;
use studyd::llm;
use studyd::metrics::Metrics;
use studyd::orchestrator::Orchestrator;
use studyd::server::{self, AppState};
use studyd::session::SessionService;
use studyd::tools::{CodeExecutor, Dispatcher, StudyPlanBuilder, WebSearch};

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

/// Wire the full service from configuration
fn build_state(config: &Config) -> Result<Arc<AppState>> {
    config.validate()?;

    let llm = llm::create_client(&config.llm).context("Failed to create LLM client")?;
    let sessions = Arc::new(
        SessionService::open(&config.storage.sessions_dir).context("Failed to open session store")?,
    );
    let metrics = Arc::new(Metrics::default());

    let planner = Arc::new(PlanningAgent::new(llm.clone()));
    let refiner = Arc::new(RefineEngine::new(llm.clone(), config.refine.clone()));
    let dispatcher = Dispatcher::new(
        StudyPlanBuilder::new(planner, refiner),
        CodeExecutor::new(config.sandbox.clone()),
        WebSearch::new(config.search.clone()),
    );

    let orchestrator = Arc::new(Orchestrator::new(
        llm,
        sessions.clone(),
        dispatcher,
        metrics.clone(),
        config.orchestrator.clone(),
    ));

    Ok(Arc::new(AppState {
        orchestrator,
        sessions,
        metrics,
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!(
        "studyd loaded config: provider={}, model={}",
        config.llm.provider, config.llm.model
    );

    match cli.command {
        Some(Command::Serve { bind }) => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            cmd_serve(&config, &bind).await
        }
        None => cmd_serve(&config, &config.server.bind.clone()).await,
        Some(Command::Ask { message, session }) => cmd_ask(&config, &message, session).await,
        Some(Command::Sessions { format }) => cmd_sessions(&config, format),
    }
}

async fn cmd_serve(config: &Config, bind: &str) -> Result<()> {
    let state = build_state(config)?;
    server::serve(state, bind).await
}

async fn cmd_ask(config: &Config, message: &str, session: Option<String>) -> Result<()> {
    let state = build_state(config)?;

    let session_id = match session {
        Some(id) => id,
        None => state.sessions.create()?,
    };

    let outcome = state.orchestrator.handle_turn(&session_id, message).await?;

    println!("{}", outcome.response);
    if let Some(result) = &outcome.execution_result
        && let Some(output) = &result.output
    {
        println!("\n{}", output);
    }
    println!("\n[session: {}]", session_id);

    Ok(())
}

fn cmd_sessions(config: &Config, format: OutputFormat) -> Result<()> {
    // Listing needs no LLM client; open the store directly
    let sessions = SessionService::open(&config.storage.sessions_dir)?;
    let summaries = sessions.list_summaries()?;

    match format {
        OutputFormat::Text => {
            if summaries.is_empty() {
                println!("No sessions found");
            } else {
                for summary in summaries {
                    println!("{}  {}", summary.session_id, summary.first_message);
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
    }

    Ok(())
}
