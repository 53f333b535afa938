//! `mir-cli` – interactive operator console for a MiR robot.
//!
//! This binary (`mirctl`):
//!
//! 1. Loads `~/.mir/config.toml`, running a **First-Run Wizard** when the
//!    file is absent.
//! 2. Connects to the robot's REST API, or to the in-process simulator when
//!    `host = "sim"` (or `MIR_HOST=sim`).
//! 3. Drops the user into an **interactive REPL** for queueing intents and
//!    driving the orchestrator (`/move`, `/dock`, `/run`, `/help`, ...).
//! 4. Intercepts **Ctrl-C**: a running `/run` loop stops and pauses the
//!    robot; at the prompt it exits after the current line.

mod config;
mod repl;

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use mir_client::{CatalogResolver, HttpRemote, RemoteInterface, RobotApi, SimRemote};
use mir_runtime::{MissionBuilder, QueueOrchestrator};
use mir_types::MirError;
use tracing::{info, warn};

use crate::config::Config;

/// The orchestrator the REPL drives, over whichever remote the config picks.
pub type Orchestrator = QueueOrchestrator<Box<dyn RemoteInterface>>;

fn main() -> ExitCode {
    // Hold the guard until exit so pending spans are flushed.
    let _telemetry = mir_runtime::telemetry::init_tracing("mirctl");

    print_banner();

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let interrupt = Arc::new(AtomicBool::new(false));
    let interrupt_clone = interrupt.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping …".yellow().bold());
        interrupt_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; /run cannot be interrupted");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => run_first_run_wizard(),
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };

    let orchestrator = match connect(&cfg) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            eprintln!("{}: {}", "Cannot connect".red(), e);
            return ExitCode::FAILURE;
        }
    };

    // ── Robot probe ───────────────────────────────────────────────────────
    print!("\n  Probing robot at {} … ", cfg.host.dimmed());
    std::io::stdout().flush().ok();
    match orchestrator.remote().status() {
        Ok(status) => println!(
            "{} ({}, battery {:.0}%)",
            "online".green(),
            status.state_text,
            status.battery_percentage
        ),
        Err(e) => {
            println!("{}", "offline".yellow());
            println!("  {}", e.to_string().dimmed());
        }
    }

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(orchestrator, &cfg, interrupt);
    ExitCode::SUCCESS
}

/// Build the orchestrator stack for `cfg`.
///
/// Credential problems surface here as [`MirError::Configuration`], before
/// any request is made.
fn connect(cfg: &Config) -> Result<Orchestrator, MirError> {
    let remote: Box<dyn RemoteInterface> = if cfg.is_sim() {
        info!("using simulated robot");
        Box::new(SimRemote::demo())
    } else {
        let credential = cfg.credential()?;
        Box::new(HttpRemote::with_timeout(
            cfg.host.clone(),
            credential,
            cfg.request_timeout(),
        )?)
    };

    let catalog = match cfg.catalog_refresh() {
        Some(interval) => CatalogResolver::with_refresh_interval(remote, interval),
        None => CatalogResolver::new(remote),
    };
    Ok(QueueOrchestrator::new(MissionBuilder::new(
        catalog,
        cfg.templates.clone(),
    )))
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║        mirctl First-Run Wizard       ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's connect to a robot.\n");

    let mut cfg = Config::default();

    let host = prompt_line(
        &format!("  Robot API URL, or \"sim\" for a dry run [{}]: ", cfg.host),
        &cfg.host,
    );
    cfg.host = host;

    if !cfg.is_sim() {
        let auth = prompt_line("  Authorization header value (blank to use a file): ", "");
        if auth.is_empty() {
            let file = prompt_line("  Credential JSON file: ", "");
            if !file.is_empty() {
                cfg.auth_file = Some(file.into());
            }
        } else {
            cfg.auth = auth;
        }
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }

    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   __ _  (_) _ __  ___ | |_ | |"#.bold().cyan());
    println!("{}", r#"  |  ' \ | || '_|/ _| |  _|| |"#.bold().cyan());
    println!("{}", r#"  |_|_|_||_||_|  \__|  \__||_|"#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "mirctl".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  MiR mission orchestrator");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::BufRead;
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
