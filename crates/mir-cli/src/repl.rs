//! REPL – Read-Eval-Print Loop for the mirctl interactive shell.
//!
//! Supported slash-commands:
//!   /help                  – show this list
//!   /status                – robot status, queue state, latest mission
//!   /positions, /missions  – list the robot's catalog
//!   /move <name>           – queue a move to a named position
//!   /dock <name>           – queue a docking at a named L-marker
//!   /relmove <metres>      – queue a relative straight move
//!   /scream <sound>        – queue a sound mission
//!   /pending, /clear       – show or drop intents not yet submitted
//!   /load <plan.json>      – queue every intent in a JSON array
//!   /schema                – print the intent JSON Schema
//!   /start, /pause         – set the robot to Ready / Pause
//!   /state <id>            – request a raw operational state id
//!   /step                  – one orchestrator step
//!   /run                   – step until idle, stalled, or Ctrl-C
//!   /register <i> [value]  – read or write a PLC register
//!   /target <station> <pt> – legacy register target signalling
//!   /audio <clip>          – legacy register audio signalling
//!   /quit | /exit          – exit the CLI

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use colored::Colorize;
use mir_client::{RemoteInterface, RobotApi};
use mir_runtime::{AdvanceOutcome, OrchestratorState, QueueOrchestrator, StallWatchdog, WaitReason};
use mir_types::{Intent, MirError};

use crate::config::Config;

// ─────────────────────────────────────────────────────────────────────────────
// Command parsing
// ─────────────────────────────────────────────────────────────────────────────

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Status,
    Positions,
    Missions,
    Enqueue(Intent),
    Pending,
    Clear,
    Load(PathBuf),
    Schema,
    Start,
    Pause,
    State(u32),
    Step,
    Run,
    Register { index: u32, value: Option<f64> },
    Target { station: u32, point: u32 },
    Audio(u32),
    Quit,
}

/// Parse a slash-command line.  The error is a user-facing message.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (cmd, rest) = match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (line, ""),
    };

    let command = match cmd {
        "/help" => Command::Help,
        "/status" => Command::Status,
        "/positions" => Command::Positions,
        "/missions" => Command::Missions,
        "/move" => Command::Enqueue(Intent::MoveTo {
            name: required(rest, "/move <position>")?,
        }),
        "/dock" => Command::Enqueue(Intent::DockTo {
            name: required(rest, "/dock <l-marker>")?,
        }),
        "/relmove" => {
            let distance: f64 = parse_arg(rest, "/relmove <metres>")?;
            if !distance.is_finite() {
                return Err("distance must be a finite number".to_string());
            }
            Command::Enqueue(Intent::MoveFor { distance })
        }
        "/scream" => Command::Enqueue(Intent::Scream {
            sound: required(rest, "/scream <sound>")?,
        }),
        "/pending" => Command::Pending,
        "/clear" => Command::Clear,
        "/load" => Command::Load(PathBuf::from(required(rest, "/load <plan.json>")?)),
        "/schema" => Command::Schema,
        "/start" => Command::Start,
        "/pause" => Command::Pause,
        "/state" => Command::State(parse_arg(rest, "/state <id>")?),
        "/step" => Command::Step,
        "/run" => Command::Run,
        "/register" => {
            let usage = "/register <index> [value]";
            let mut args = rest.split_whitespace();
            let index = parse_arg(args.next().unwrap_or(""), usage)?;
            let value = args.next().map(|v| parse_arg(v, usage)).transpose()?;
            Command::Register { index, value }
        }
        "/target" => {
            let usage = "/target <station> <point>";
            let mut args = rest.split_whitespace();
            let station = parse_arg(args.next().unwrap_or(""), usage)?;
            let point = parse_arg(args.next().unwrap_or(""), usage)?;
            Command::Target { station, point }
        }
        "/audio" => Command::Audio(parse_arg(rest, "/audio <clip>")?),
        "/quit" | "/exit" => Command::Quit,
        other => return Err(format!("Unknown command '{other}'")),
    };
    Ok(command)
}

fn required(arg: &str, usage: &str) -> Result<String, String> {
    if arg.is_empty() {
        Err(format!("usage: {usage}"))
    } else {
        Ok(arg.to_string())
    }
}

fn parse_arg<T: std::str::FromStr>(arg: &str, usage: &str) -> Result<T, String> {
    arg.trim()
        .parse()
        .map_err(|_| format!("usage: {usage}"))
}

/// Read a JSON array of intents, e.g.
/// `[{"intent": "move_to", "args": {"name": "Home"}}]`.
pub fn load_plan(path: &Path) -> Result<Vec<Intent>, MirError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        MirError::Configuration(format!("failed to read plan {}: {e}", path.display()))
    })?;
    serde_json::from_str(&raw).map_err(|e| MirError::Decode {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// REPL
// ─────────────────────────────────────────────────────────────────────────────

/// Entry point for the interactive REPL.
///
/// `interrupt` is set by the Ctrl-C handler.  Inside `/run` it stops the
/// loop; at the prompt it ends the session.
pub fn run<R: RemoteInterface>(
    orchestrator: QueueOrchestrator<R>,
    cfg: &Config,
    interrupt: Arc<AtomicBool>,
) {
    let mut repl = Repl::new(orchestrator, cfg, interrupt.clone());
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if interrupt.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "mir>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(msg) => {
                println!(
                    "{} {}. Type {} for available commands.",
                    "Error:".red(),
                    msg.yellow(),
                    "/help".bold()
                );
                continue;
            }
        };
        if command == Command::Quit {
            println!("{}", "Goodbye.".green());
            break;
        }
        if let Err(e) = repl.execute(command) {
            println!("{} {}", "Error:".red(), e);
        }
    }
}

/// Session state shared by the command handlers.
pub struct Repl<R> {
    orchestrator: QueueOrchestrator<R>,
    watchdog: StallWatchdog,
    poll_interval: Duration,
    acceptance_radius: f64,
    interrupt: Arc<AtomicBool>,
}

impl<R: RemoteInterface> Repl<R> {
    pub fn new(orchestrator: QueueOrchestrator<R>, cfg: &Config, interrupt: Arc<AtomicBool>) -> Self {
        Self {
            orchestrator,
            watchdog: StallWatchdog::new(cfg.stall_timeout()),
            poll_interval: cfg.poll_interval(),
            acceptance_radius: cfg.acceptance_radius,
            interrupt,
        }
    }

    pub fn execute(&mut self, command: Command) -> Result<(), MirError> {
        match command {
            Command::Help => cmd_help(),
            Command::Status => self.cmd_status()?,
            Command::Positions => self.cmd_positions()?,
            Command::Missions => self.cmd_missions()?,
            Command::Enqueue(intent) => {
                let label = intent.to_string();
                self.orchestrator.enqueue(intent);
                println!(
                    "  {} queued {} ({} pending)",
                    "✓".green(),
                    label.bold(),
                    self.orchestrator.pending().len()
                );
            }
            Command::Pending => self.cmd_pending(),
            Command::Clear => {
                let dropped = self.orchestrator.clear_pending();
                println!("  Dropped {dropped} pending intent(s).");
            }
            Command::Load(path) => {
                let plan = load_plan(&path)?;
                let count = plan.len();
                for intent in plan {
                    self.orchestrator.enqueue(intent);
                }
                println!("  {} queued {count} intent(s) from {}", "✓".green(), path.display());
            }
            Command::Schema => {
                let schema = schemars::schema_for!(Intent);
                let pretty = serde_json::to_string_pretty(&schema)
                    .map_err(|e| MirError::Decode {
                        path: "schema".to_string(),
                        message: e.to_string(),
                    })?;
                println!("{pretty}");
            }
            Command::Start => {
                self.orchestrator.start_draining()?;
                println!("  {} robot set to {}", "✓".green(), "Ready".bold());
            }
            Command::Pause => {
                self.orchestrator.pause_draining()?;
                println!("  {} robot set to {}", "✓".green(), "Pause".bold());
            }
            Command::State(id) => {
                let state = self.orchestrator.request_state_id(id)?;
                println!("  {} robot set to {}", "✓".green(), state.to_string().bold());
            }
            Command::Step => {
                let outcome = self.step();
                print_outcome(&outcome);
            }
            Command::Run => self.cmd_run()?,
            Command::Register { index, value } => {
                let remote = self.orchestrator.remote();
                if let Some(value) = value {
                    remote.write_register(index, value)?;
                }
                let register = remote.read_register(index)?;
                println!("  register {} = {} {}", index, register.value, register.label.dimmed());
            }
            Command::Target { station, point } => {
                self.orchestrator.remote().set_target(station, point)?;
                println!("  {} target set to station {station}, point {point}", "✓".green());
            }
            Command::Audio(clip) => {
                self.orchestrator.remote().play_audio(clip)?;
                println!("  {} audio clip {clip} requested", "✓".green());
            }
            Command::Quit => {}
        }
        Ok(())
    }

    fn step(&mut self) -> AdvanceOutcome {
        let outcome = self.orchestrator.advance();
        self.watchdog.observe(&outcome);
        outcome
    }

    /// Step until the queue is idle, the mission stalls, or Ctrl-C.
    fn cmd_run(&mut self) -> Result<(), MirError> {
        self.interrupt.store(false, Ordering::SeqCst);
        let mut last: Option<AdvanceOutcome> = None;
        loop {
            let outcome = self.step();
            if last.as_ref() != Some(&outcome) {
                print_outcome(&outcome);
            }
            if outcome == AdvanceOutcome::Idle {
                println!("  {} queue drained", "✓".green());
                return Ok(());
            }
            if let Some(stall) = self.watchdog.check() {
                println!(
                    "  {} mission {} outstanding for {}s; stopping",
                    "⚠".yellow(),
                    stall.mission_id.as_str().bold(),
                    stall.elapsed.as_secs()
                );
                return Ok(());
            }
            if self.interrupt.swap(false, Ordering::SeqCst) {
                println!("  Interrupted; pausing robot.");
                return self.orchestrator.pause_draining();
            }
            last = Some(outcome);
            thread::sleep(self.poll_interval);
        }
    }

    fn cmd_status(&self) -> Result<(), MirError> {
        let remote = self.orchestrator.remote();
        let status = remote.status()?;
        let available = status.is_available(self.acceptance_radius);

        println!("{}", "Robot Status".bold().underline());
        println!("  State     : {} ({})", status.state_text.bold(), status.state_id);
        println!("  Battery   : {:.1}%", status.battery_percentage);
        println!(
            "  Available : {}",
            if available { "yes".green() } else { "no".yellow() }
        );
        if !status.mission_text.is_empty() {
            println!("  Mission   : {}", status.mission_text.dimmed());
        }
        if let Some(entry) = remote.latest_history_entry()? {
            println!("  Latest    : #{} {}", entry.id, entry.state);
        }
        match self.orchestrator.state() {
            OrchestratorState::Idle => println!("  Queue     : idle"),
            OrchestratorState::AwaitingCompletion {
                mission_id,
                intent,
                submitted_at,
            } => println!(
                "  Queue     : awaiting {} for {} since {}",
                mission_id.as_str().bold(),
                intent.intent,
                submitted_at.format("%H:%M:%S")
            ),
        }
        println!("  Pending   : {}", self.orchestrator.pending().len());
        Ok(())
    }

    fn cmd_positions(&mut self) -> Result<(), MirError> {
        let catalog = self.orchestrator.builder_mut().catalog_mut();
        println!("{}", "Positions".bold().underline());
        for p in catalog.positions()? {
            println!("  {:<24} {:<14} {}", p.name.bold(), format!("{:?}", p.kind()), p.id.as_str().dimmed());
        }
        Ok(())
    }

    fn cmd_missions(&mut self) -> Result<(), MirError> {
        let catalog = self.orchestrator.builder_mut().catalog_mut();
        println!("{}", "Missions".bold().underline());
        for m in catalog.missions()? {
            println!("  {:<24} {}", m.name.bold(), m.id.as_str().dimmed());
        }
        Ok(())
    }

    fn cmd_pending(&self) {
        let pending = self.orchestrator.pending();
        if pending.is_empty() {
            println!("  Nothing pending.");
            return;
        }
        for (i, p) in pending.iter().enumerate() {
            println!(
                "  {:>2}. {} {} {}",
                i + 1,
                p.intent.to_string().bold(),
                p.enqueued_at.format("%H:%M:%S").to_string().dimmed(),
                p.id.to_string().dimmed()
            );
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output helpers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "mirctl Commands".bold().underline());
    let rows = [
        ("/status", "robot status and queue state"),
        ("/positions  /missions", "list the robot's catalog"),
        ("/move <name>", "queue a move to a position"),
        ("/dock <name>", "queue docking at an L-marker"),
        ("/relmove <m>", "queue a relative move"),
        ("/scream <sound>", "queue a sound mission"),
        ("/pending  /clear", "show or drop queued intents"),
        ("/load <plan.json>", "queue intents from a file"),
        ("/schema", "print the intent JSON Schema"),
        ("/start  /pause", "set the robot Ready / Pause"),
        ("/state <id>", "request an operational state id"),
        ("/step  /run", "advance once / until idle"),
        ("/register <i> [v]", "read or write a PLC register"),
        ("/target <s> <p>", "legacy station/point registers"),
        ("/audio <clip>", "legacy audio register"),
        ("/quit  /exit", "exit the CLI"),
    ];
    for (cmd, what) in rows {
        println!("  {:<24} – {}", cmd.bold().cyan(), what);
    }
    println!();
}

fn print_outcome(outcome: &AdvanceOutcome) {
    match outcome {
        AdvanceOutcome::Advanced { intent, mission_id } => println!(
            "  {} submitted {} as {}",
            "▶".green(),
            intent.intent.to_string().bold(),
            mission_id.as_str().dimmed()
        ),
        AdvanceOutcome::Idle => println!("  idle"),
        AdvanceOutcome::Waiting(WaitReason::InFlight(state)) => {
            println!("  waiting: current mission is {}", state.to_string().yellow())
        }
        AdvanceOutcome::Waiting(WaitReason::Failed(err)) => {
            println!("  {} {}", "step failed:".red(), err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mir_client::{CatalogResolver, SimRemote};
    use mir_runtime::{MissionBuilder, MissionTemplates};
    use mir_types::MissionState;

    fn repl(sim: &SimRemote) -> Repl<&SimRemote> {
        let orchestrator = QueueOrchestrator::new(MissionBuilder::new(
            CatalogResolver::new(sim),
            MissionTemplates::default(),
        ));
        let cfg = Config {
            poll_interval_ms: 0,
            ..Config::default()
        };
        Repl::new(orchestrator, &cfg, Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn parses_intent_commands() {
        assert_eq!(
            parse_command("/move Charging station 2").unwrap(),
            Command::Enqueue(Intent::MoveTo {
                name: "Charging station 2".into()
            })
        );
        assert_eq!(
            parse_command("  /relmove -0.5 ").unwrap(),
            Command::Enqueue(Intent::MoveFor { distance: -0.5 })
        );
        assert_eq!(
            parse_command("/scream beep").unwrap(),
            Command::Enqueue(Intent::Scream {
                sound: "beep".into()
            })
        );
    }

    #[test]
    fn parses_register_forms() {
        assert_eq!(
            parse_command("/register 20").unwrap(),
            Command::Register {
                index: 20,
                value: None
            }
        );
        assert_eq!(
            parse_command("/register 20 3.5").unwrap(),
            Command::Register {
                index: 20,
                value: Some(3.5)
            }
        );
        assert_eq!(
            parse_command("/target 5 2").unwrap(),
            Command::Target {
                station: 5,
                point: 2
            }
        );
    }

    #[test]
    fn rejects_missing_or_bad_arguments() {
        assert!(parse_command("/move").is_err());
        assert!(parse_command("/relmove far").is_err());
        assert!(parse_command("/relmove inf").is_err());
        assert!(parse_command("/state -1").is_err());
        assert!(parse_command("/target 5").is_err());
        assert!(parse_command("/fly").is_err());
    }

    #[test]
    fn load_plan_reads_tagged_intents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(
            &path,
            r#"[{"intent": "move_to", "args": {"name": "Home"}},
                {"intent": "scream", "args": {"sound": "end"}}]"#,
        )
        .unwrap();
        let plan = load_plan(&path).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(
            plan[1],
            Intent::Scream {
                sound: "end".into()
            }
        );

        std::fs::write(&path, r#"[{"intent": "teleport"}]"#).unwrap();
        assert!(matches!(load_plan(&path).unwrap_err(), MirError::Decode { .. }));
    }

    #[test]
    fn run_drains_queue_against_simulator() {
        let sim = SimRemote::demo();
        let mut repl = repl(&sim);
        repl.execute(parse_command("/move Home").unwrap()).unwrap();
        repl.execute(parse_command("/dock shelfA").unwrap()).unwrap();
        repl.execute(Command::Run).unwrap();

        assert!(repl.orchestrator.pending().is_empty());
        assert_eq!(sim.submissions().len(), 2);
        assert_eq!(
            sim.latest_history_entry().unwrap().unwrap().state,
            MissionState::Done
        );
        assert!(!repl.watchdog.is_armed());
    }

    #[test]
    fn run_stops_on_interrupt_and_pauses_robot() {
        let sim = SimRemote::new().with_history(MissionState::Executing);
        let mut repl = repl(&sim);
        // `/run` clears the flag on entry, so raise it once the loop is going.
        let flag = repl.interrupt.clone();
        thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(Duration::from_millis(20));
                flag.store(true, Ordering::SeqCst);
            });
            repl.execute(Command::Run).unwrap();
        });
        assert_eq!(sim.robot_state(), mir_types::OperationalState::Pause.id());
    }

    #[test]
    fn invalid_state_command_surfaces_error() {
        let sim = SimRemote::new();
        let mut repl = repl(&sim);
        let err = repl.execute(Command::State(99)).unwrap_err();
        assert_eq!(err, MirError::InvalidStateRequest(99));
        assert!(sim.writes().is_empty());
    }

    #[test]
    fn register_command_writes_then_reads() {
        let sim = SimRemote::new();
        let mut repl = repl(&sim);
        repl.execute(Command::Register {
            index: 7,
            value: Some(1.0),
        })
        .unwrap();
        assert_eq!(sim.read_register(7).unwrap().value, 1.0);
    }
}
