//! `ghost`: turn a natural-language request into shell commands, run them, and explain
//! the results.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use ghost::display::Renderer;
use ghost::exit_codes;
use ghost::generator::CommandGenerator;
use ghost::io::completion::OpenAiClient;
use ghost::io::config::{GhostConfig, load_config, resolve_config_path};
use ghost::io::confirm::StdinPrompter;
use ghost::io::editor::AssistedEditor;
use ghost::io::process::install_interrupt_handler;
use ghost::io::shell::SystemShell;
use ghost::io::system::capture_system_context;
use ghost::logging;
use ghost::looping::{Collaborators, LoopConfig, run_loop, summarize};

#[derive(Parser, Debug)]
#[command(
    name = "ghost",
    version,
    about = "Execute shell commands from natural-language requests"
)]
struct Cli {
    /// What you want done, in plain language.
    request: String,

    /// Show detailed command outputs.
    #[arg(short, long)]
    verbose: bool,

    /// Show the first command without executing it.
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Execute potentially dangerous commands without confirmation.
    #[arg(short, long)]
    force: bool,

    /// Do not ask for an alternative when a command fails.
    #[arg(long)]
    no_retry: bool,

    /// Maximum number of commands to execute.
    #[arg(long, value_name = "N")]
    max_commands: Option<usize>,

    /// Chat model to use.
    #[arg(long, value_name = "ID")]
    model: Option<String>,

    /// Per-command timeout in seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// TOML config file (defaults to $GHOST_CONFIG).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() {
    dotenvy::dotenv().ok();
    logging::init();
    if let Err(err) = run(Cli::parse()) {
        eprintln!("{:#}", err);
        std::process::exit(exit_codes::INVALID);
    }
}

fn run(cli: Cli) -> Result<()> {
    install_interrupt_handler(exit_codes::INTERRUPTED)?;
    let cfg = load_settings(&cli)?;
    let client = OpenAiClient::from_config(&cfg).context("initialize completion client")?;

    let context = capture_system_context();
    let renderer = Renderer::new(cli.verbose);
    println!("{}", renderer.header(&cli.request));
    if cli.verbose {
        println!("{}", renderer.system_info(&context));
    }

    let generator = CommandGenerator::new(&client, cfg.tokens.clone());
    let shell = SystemShell::new(cfg.output_limit_bytes);
    let prompter = StdinPrompter;
    let editor = AssistedEditor::new(&client, prompter, cfg.tokens.file_content);
    let loop_config = LoopConfig {
        force: cli.force,
        dry_run: cli.dry_run,
        ..LoopConfig::from_config(&cfg)
    };

    let outcome = run_loop(
        Collaborators {
            generator: &generator,
            shell: &shell,
            prompter: &prompter,
            editor: &editor,
        },
        &cli.request,
        &context,
        &loop_config,
        |event| {
            if let Some(text) = renderer.event(event) {
                println!("{text}");
            }
        },
    )?;
    if let Some(text) = renderer.stop(&outcome.stop) {
        println!("{text}");
    }

    let summary = summarize(
        &generator,
        &cli.request,
        &outcome.history,
        &context,
        cli.verbose,
    )?;
    println!("{}", renderer.summary(&summary));
    Ok(())
}

/// Config file (or defaults), then environment, then flags; validated last.
fn load_settings(cli: &Cli) -> Result<GhostConfig> {
    let mut cfg = match resolve_config_path(cli.config.as_deref()) {
        Some(path) => load_config(&path)?,
        None => GhostConfig::default(),
    };
    cfg.apply_env_overrides();
    apply_cli_overrides(&mut cfg, cli);
    cfg.validate().context("invalid settings")?;
    Ok(cfg)
}

fn apply_cli_overrides(cfg: &mut GhostConfig, cli: &Cli) {
    if let Some(max_commands) = cli.max_commands {
        cfg.max_commands = max_commands;
    }
    if cli.no_retry {
        cfg.retry = false;
    }
    if let Some(model) = &cli.model {
        cfg.model = model.clone();
    }
    if let Some(timeout) = cli.timeout {
        cfg.command_timeout_secs = timeout;
    }
}
