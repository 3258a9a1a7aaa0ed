//! LiftRunner CLI Entry Point
//!
//! Runs a workout session in the terminal, driven by typed commands while
//! the session clock ticks in the background.
//!
//! # Usage
//!
//! ```bash
//! # Start a workout
//! liftrunner push_day.yaml --user alice
//!
//! # Resume a session after a restart
//! liftrunner push_day.yaml --user alice --resume 5f0c...
//!
//! # Rest between exercises too, with settings from a file
//! liftrunner push_day.yaml --config liftrunner.yaml --rest-between-exercises
//! ```

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use colored::Colorize;
use log::{error, info, warn};

use liftrunner::execution::{LogFeedbackSink, SessionManager};
use liftrunner::monitoring::{format_seconds, SessionTimeline};
use liftrunner::session::{progress_fraction, FileSessionRepository, SessionId};
use liftrunner::{
    load_workout, EngineConfig, EngineError, SessionState, SessionStatus, WorkoutDefinition,
    APP_NAME, VERSION,
};

/// Default user when `--user` is not given.
const DEFAULT_USER: &str = "local";

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct Config {
    workout_path: Option<String>,
    config_path: Option<PathBuf>,
    user: Option<String>,
    resume: Option<String>,
    state_dir: Option<PathBuf>,
    tick_ms: Option<u64>,
    rest_between_exercises: bool,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| match record.level() {
            log::Level::Warn | log::Level::Error => {
                writeln!(buf, "[{}] {}", record.level(), record.args())
            }
            _ => writeln!(buf, "{}", record.args()),
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Workout Execution Engine");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: liftrunner [OPTIONS] <WORKOUT_FILE>");
    println!();
    println!("Arguments:");
    println!("  <WORKOUT_FILE>            Path to workout YAML file");
    println!();
    println!("Options:");
    println!("  --user ID                 User running the session (default: {})", DEFAULT_USER);
    println!("  --resume SESSION_ID       Resume a persisted session");
    println!("  --config PATH             Engine config YAML");
    println!("  --state-dir PATH          Directory for session state");
    println!("  --tick-ms N               Milliseconds per clock tick (default: 1000)");
    println!("  --rest-between-exercises  Rest after the last set of each exercise");
    println!("  --verbose                 Enable debug logging");
    println!("  --help                    Show this help message");
    println!("  --version                 Show version information");
}

/// Prints the in-session commands.
fn print_commands() {
    println!("Commands: [d]one  [s]kip rest  [p]ause/resume  [q]uit (abandon)  status  [h]elp");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut i = 1; // Skip program name

    fn value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, String> {
        *i += 1;
        args.get(*i)
            .map(String::as_str)
            .ok_or_else(|| format!("{} requires an argument", flag))
    }

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => config.verbose = true,
            "--rest-between-exercises" => config.rest_between_exercises = true,
            "--user" => config.user = Some(value(args, &mut i, "--user")?.to_string()),
            "--resume" => config.resume = Some(value(args, &mut i, "--resume")?.to_string()),
            "--config" => config.config_path = Some(PathBuf::from(value(args, &mut i, "--config")?)),
            "--state-dir" => {
                config.state_dir = Some(PathBuf::from(value(args, &mut i, "--state-dir")?))
            }
            "--tick-ms" => {
                let raw = value(args, &mut i, "--tick-ms")?;
                config.tick_ms = Some(
                    raw.parse()
                        .map_err(|_| format!("Invalid tick value: {}", raw))?,
                );
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if config.workout_path.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                config.workout_path = Some(arg.clone());
            }
        }
        i += 1;
    }

    if config.workout_path.is_none() {
        return Err("Missing workout file".to_string());
    }
    Ok(config)
}

/// Builds the engine config from the optional file and CLI overrides.
fn engine_config(config: &Config) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut engine = match config.config_path {
        Some(ref path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    if config.rest_between_exercises {
        engine.rest_between_exercises = true;
    }
    if let Some(ref dir) = config.state_dir {
        engine.state_dir = dir.clone();
    }
    if let Some(ms) = config.tick_ms {
        engine.tick_interval_ms = ms;
    }
    Ok(engine)
}

/// One-line rendering of a snapshot.
fn format_status(state: &SessionState, workout: &WorkoutDefinition) -> String {
    let percent = (progress_fraction(state, workout) * 100.0).round();
    let clock = format_seconds(state.total_elapsed_seconds);

    let position = match workout.exercise(state.current_exercise_index) {
        Some(plan) if !state.is_terminal() => format!(
            "{} set {}/{} ({} reps)",
            plan.exercise_id.bold(),
            state.current_set_number,
            plan.target_sets,
            plan.target_reps
        ),
        _ => String::new(),
    };

    let status = match state.status {
        SessionStatus::Active => "GO".green().bold(),
        SessionStatus::Resting => {
            format!("REST {}", format_seconds(state.rest_remaining_seconds as u64))
                .yellow()
                .bold()
        }
        SessionStatus::Paused => "PAUSED".blue().bold(),
        SessionStatus::Completed => "COMPLETED".green().bold(),
        SessionStatus::Abandoned => "ABANDONED".red().bold(),
        SessionStatus::NotStarted => "READY".normal(),
    };

    format!("[{}] {:>3}% {} {}", clock, percent, status, position)
}

/// Prints a status line when the position or status changes, and at rest
/// milestones.
fn attach_renderer(manager: &SessionManager, workout: Arc<WorkoutDefinition>) {
    let last: Mutex<Option<(SessionStatus, usize, u32)>> = Mutex::new(None);

    manager.on_state_change(move |state| {
        let key = (
            state.status,
            state.current_exercise_index,
            state.current_set_number,
        );
        let mut last = last.lock().unwrap_or_else(|p| p.into_inner());
        let countdown = state.status == SessionStatus::Resting
            && (state.rest_remaining_seconds % 10 == 0 || state.rest_remaining_seconds <= 3);

        if *last != Some(key) || countdown {
            println!("{}", format_status(state, &workout));
        }
        *last = Some(key);
    });
}

/// Reads commands from stdin until the session finishes or input ends.
fn command_loop(manager: &SessionManager, workout: &WorkoutDefinition) -> io::Result<()> {
    print_commands();
    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        let result = match line.trim() {
            "d" | "done" => manager.complete_set(),
            "s" | "skip" => manager.skip_rest(),
            "p" | "pause" => manager.pause_resume(),
            "q" | "quit" | "stop" => manager.stop(),
            "" | "status" => manager.snapshot().map(|state| {
                println!("{}", format_status(&state, workout));
                state
            }),
            "h" | "help" => {
                print_commands();
                continue;
            }
            other => {
                warn!("Unknown command: {}", other);
                continue;
            }
        };

        match result {
            Ok(state) if state.is_terminal() => return Ok(()),
            Ok(_) => {}
            Err(e) => error!("{}", e),
        }
    }

    // Input closed: leave the session resumable.
    if let Ok(state) = manager.snapshot() {
        if state.status.is_running() {
            if let Err(e) = manager.pause_resume() {
                error!("Failed to pause session: {}", e);
            }
        }
        if !state.is_terminal() {
            info!(
                "Session {} left open; continue with --resume {}",
                state.session_id, state.session_id
            );
        }
    }
    Ok(())
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(config.verbose);
    print_banner();

    let engine = engine_config(&config)?;
    let workout_path = config.workout_path.clone().unwrap_or_default();
    let workout = Arc::new(load_workout(&workout_path).map_err(|e| {
        error!("Failed to load workout: {}", e);
        format!("Could not load workout from '{}': {}", workout_path, e)
    })?);

    info!(
        "Workout '{}': {} exercises, {} sets",
        workout.name,
        workout.len(),
        workout.total_sets()
    );

    let user = config.user.clone().unwrap_or_else(|| DEFAULT_USER.to_string());
    let repository = Arc::new(FileSessionRepository::open(&engine.state_dir)?);
    let manager = SessionManager::builder(user.clone(), repository)
        .with_config(&engine)
        .with_feedback(Arc::new(LogFeedbackSink))
        .build();

    let timeline = SessionTimeline::attach(&manager);
    attach_renderer(&manager, Arc::clone(&workout));

    let state = match config.resume {
        Some(ref raw) => {
            let session_id = SessionId::parse(raw)
                .map_err(|e| format!("Invalid session id '{}': {}", raw, e))?;
            manager.restore(session_id, &workout)?
        }
        None => match manager.start(&workout) {
            Err(EngineError::Conflict {
                session_id: Some(session_id),
                ..
            }) => {
                return Err(format!(
                    "User '{}' already has session {} in progress; resume it with --resume {}",
                    user, session_id, session_id
                )
                .into());
            }
            Err(EngineError::Conflict { session_id: None, .. }) => {
                return Err(format!(
                    "User '{}' has an unreadable active session record under {}",
                    user,
                    engine.state_dir.join("active").display()
                )
                .into());
            }
            other => other?,
        },
    };
    info!("Session {}", state.session_id);

    command_loop(&manager, &workout)?;

    let summary = timeline
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .summary(&workout);
    println!("{}", summary);
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("liftrunner")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_flags() {
        let config = parse_arguments(&args(&[
            "push.yaml",
            "--user",
            "alice",
            "--tick-ms",
            "250",
            "--rest-between-exercises",
        ]))
        .unwrap();

        assert_eq!(config.workout_path.as_deref(), Some("push.yaml"));
        assert_eq!(config.user.as_deref(), Some("alice"));
        assert_eq!(config.tick_ms, Some(250));
        assert!(config.rest_between_exercises);

        let engine = engine_config(&config).unwrap();
        assert!(engine.rest_between_exercises);
        assert_eq!(engine.tick_interval_ms, 250);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_arguments(&args(&[])).is_err());
        assert!(parse_arguments(&args(&["a.yaml", "b.yaml"])).is_err());
        assert!(parse_arguments(&args(&["a.yaml", "--user"])).is_err());
        assert!(parse_arguments(&args(&["a.yaml", "--tick-ms", "fast"])).is_err());
        assert!(parse_arguments(&args(&["a.yaml", "--bogus"])).is_err());
    }
}
