use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use gpt_agent::config::{
    BrowserEngine, MAX_STEPS_PER_TASK, PROPOSAL_TIMEOUT_SECS, Provider, RunConfig,
    default_profile_dir,
};
use gpt_agent::credentials::KeyStore;
use gpt_agent::face::TerminalFace;
use gpt_agent::hands::BrowserSession;
use gpt_agent::{ActionType, Orchestrator, TurnOutcome};

#[derive(Parser)]
#[command(name = "gpt-agent", version, about = "Drive a browser toward a goal, one confirmed action at a time")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the agent. Without TASK, tasks are read from the terminal.
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    task: Option<String>,

    #[arg(long, value_enum, default_value_t = Provider::OpenAi)]
    provider: Provider,

    /// Defaults to the provider's recommended model.
    #[arg(long)]
    model: Option<String>,

    #[arg(long, value_enum, default_value_t = BrowserEngine::Chrome)]
    browser: BrowserEngine,

    #[arg(long)]
    profile_dir: Option<PathBuf>,

    #[arg(long, default_value_t = MAX_STEPS_PER_TASK)]
    max_steps: usize,

    /// Verbose logging of every turn.
    #[arg(long)]
    trace: bool,

    /// Model request timeout in seconds.
    #[arg(long, default_value_t = PROPOSAL_TIMEOUT_SECS)]
    timeout: u64,

    #[arg(long)]
    headless: bool,

    /// Send a screenshot of the page with every proposal request.
    #[arg(long)]
    screenshot: bool,
}

impl RunArgs {
    fn to_config(&self) -> RunConfig {
        RunConfig {
            provider: self.provider,
            model: self
                .model
                .clone()
                .unwrap_or_else(|| self.provider.default_model().to_string()),
            browser: self.browser,
            profile_dir: self.profile_dir.clone().unwrap_or_else(default_profile_dir),
            max_steps: self.max_steps,
            trace: self.trace,
            timeout: Duration::from_secs(self.timeout),
            headless: self.headless,
            screenshot: self.screenshot,
        }
    }
}

fn init_tracing(trace: bool) {
    let default_filter = if trace { "gpt_agent=debug,info" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args).await,
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let cfg = args.to_config();
    init_tracing(cfg.trace);
    cfg.validate().context("invalid configuration")?;

    let face = Arc::new(TerminalFace::new());
    face.show_banner(&cfg);

    let Some(api_key) = resolve_api_key(&cfg, &face).await? else {
        return Ok(());
    };

    tracing::info!("launching browser");
    let launch_cfg = cfg.clone();
    let session = tokio::task::spawn_blocking(move || BrowserSession::launch(&launch_cfg))
        .await
        .map_err(|e| anyhow!("browser launch panicked: {e}"))??;

    let orchestrator = Orchestrator::from_config(&cfg, &api_key, Arc::new(session))?
        .with_clarifier(face.clone())
        .with_narrator(face.clone());

    if let Some(task) = args.task {
        run_task(&orchestrator, &task, cfg.max_steps).await;
        return Ok(());
    }

    loop {
        let task = tokio::select! {
            task = face.read_task() => task?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(task) = task else { break };
        run_task(&orchestrator, &task, cfg.max_steps).await;
    }

    Ok(())
}

/// Key store first, then the provider's environment variable, then ask.
/// A key typed at the prompt is saved for next time.
async fn resolve_api_key(cfg: &RunConfig, face: &TerminalFace) -> Result<Option<String>> {
    let store = KeyStore::open_default();
    let name = cfg.provider.as_str();

    if let Some(key) = store.get(name)? {
        return Ok(Some(key));
    }
    if let Ok(key) = std::env::var(cfg.provider.env_var()) {
        if !key.trim().is_empty() {
            return Ok(Some(key));
        }
    }

    let key = tokio::select! {
        key = face.read_api_key(name) => key?,
        _ = tokio::signal::ctrl_c() => None,
    };
    if let Some(key) = &key {
        store.save(name, key)?;
    }
    Ok(key)
}

/// Repeat turns until the model says done, the user declines, a turn fails,
/// or the step budget runs out.
async fn run_task(orchestrator: &Orchestrator, task: &str, max_steps: usize) {
    tracing::info!(task, "starting task");

    for step in 1..=max_steps {
        let outcome = tokio::select! {
            outcome = orchestrator.run(task) => outcome,
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!(step, "turn interrupted");
                println!("Interrupted.");
                return;
            }
        };

        match outcome {
            Ok(outcome) => {
                tracing::debug!(step, risk = %outcome.action().risk, "turn finished");
                if !outcome.ends_task() {
                    continue;
                }
                match outcome {
                    TurnOutcome::Executed(action) if action.action_type == ActionType::Done => {
                        println!("Done: {}", action.summary);
                    }
                    _ => println!("Action declined; task stopped."),
                }
                return;
            }
            Err(e) => {
                tracing::error!(step, error = %e, "turn failed");
                println!("Task failed: {e}");
                return;
            }
        }
    }

    tracing::warn!(max_steps, "step limit reached");
    println!("Reached maximum step limit ({max_steps}).");
}
