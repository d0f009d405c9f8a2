use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use switchboard_core::{AnthropicProvider, Coordinator, GoogleProvider, KeywordRouter};

mod config;

use config::SwitchboardConfig;

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(version)]
#[command(about = "Send a prompt to Claude or Gemini, picked by keyword")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,

    /// Prompt to send; asked for interactively when omitted
    prompt: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config directory and default config
    Init,

    /// Show current configuration
    Config,

    /// Show which provider a prompt would be routed to, without calling it
    Route {
        /// The prompt to classify
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout only carries the conversation
    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Some(Commands::Init) => cmd_init().await,
        Some(Commands::Config) => cmd_config(&cli.config),
        Some(Commands::Route { prompt }) => cmd_route(&cli.config, &prompt),
        None => cmd_ask(&cli.config, cli.prompt).await,
    }
}

async fn cmd_init() -> Result<()> {
    let config_dir = config::config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
        return Ok(());
    }

    tokio::fs::write(&config_path, config::DEFAULT_CONFIG)
        .await
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    // The loader refuses configs readable by group or other
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&config_path, std::fs::Permissions::from_mode(0o600)).await?;
    }

    info!("Created default config at {}", config_path.display());
    println!("Switchboard initialized at {}", config_dir.display());
    println!(
        "Export {} and {} (or edit {}) to configure your API keys.",
        config::ANTHROPIC_KEY_VAR,
        config::GEMINI_KEY_VAR,
        config_path.display()
    );
    Ok(())
}

fn cmd_config(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = SwitchboardConfig::load(config_path)?;
    println!("{:#?}", cfg);
    Ok(())
}

fn cmd_route(config_path: &Option<PathBuf>, prompt: &str) -> Result<()> {
    let cfg = SwitchboardConfig::load(config_path)?;
    let router = KeywordRouter::new(&cfg.routing.keywords);
    let decision = router.select(prompt);
    match router.matched_keyword(prompt) {
        Some(keyword) => println!("{} (matched \"{}\")", decision, keyword),
        None => println!("{} (no keyword matched)", decision),
    }
    Ok(())
}

async fn cmd_ask(config_path: &Option<PathBuf>, prompt: Option<String>) -> Result<()> {
    let cfg = SwitchboardConfig::load(config_path)?;
    let coordinator = build_coordinator(&cfg)?;

    let prompt = match prompt {
        Some(p) => p,
        None => read_prompt(io::stdin().lock(), io::stdout())?,
    };

    let response = coordinator.get_response(&prompt).await;
    println!("\nResponse:\n{}", response);
    Ok(())
}

/// Build both adapters once; missing keys only fail the call that needs them
fn build_coordinator(cfg: &SwitchboardConfig) -> Result<Coordinator> {
    let anthropic_cfg = &cfg.providers.anthropic;
    if anthropic_cfg.api_key.trim().is_empty() {
        warn!(
            "{} is not set; Claude requests will fail",
            config::ANTHROPIC_KEY_VAR
        );
    }
    let anthropic = AnthropicProvider::new(
        anthropic_cfg.api_key.clone(),
        anthropic_cfg.model.clone(),
        anthropic_cfg.base_url.clone(),
        anthropic_cfg.max_tokens,
        anthropic_cfg.timeout(),
    )
    .context("Failed to create Anthropic provider")?;

    let google_cfg = &cfg.providers.google;
    if google_cfg.api_key.trim().is_empty() {
        warn!(
            "{} is not set; Gemini requests will fail",
            config::GEMINI_KEY_VAR
        );
    }
    let mut google = GoogleProvider::new(
        google_cfg.api_key.clone(),
        google_cfg.model.clone(),
        google_cfg.base_url.clone(),
        google_cfg.timeout(),
    )
    .context("Failed to create Gemini provider")?;
    if let Some(max) = google_cfg.max_output_tokens {
        google = google.with_max_output_tokens(max);
    }

    Ok(Coordinator::new(
        KeywordRouter::new(&cfg.routing.keywords),
        Box::new(anthropic),
        Box::new(google),
    ))
}

/// Ask for a prompt on `output` and read one line from `input`. End of input
/// before any line is an error rather than an empty prompt.
fn read_prompt<R: BufRead, W: Write>(mut input: R, mut output: W) -> Result<String> {
    write!(output, "Enter your prompt: ")?;
    output.flush()?;
    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .context("Failed to read prompt from stdin")?;
    if read == 0 {
        return Err(anyhow!("No prompt provided on stdin"));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
