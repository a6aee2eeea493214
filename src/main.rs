//! Relaunch - restart flaky command-line programs on triggers.

use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use relaunch::config::{ConfigLoader, RunSettings};
use relaunch::display;
use relaunch::supervisor::{RunOutcome, Supervisor};

/// Exit status used when the run fails before the child's result is known.
const FATAL_EXIT_CODE: i32 = 1;

#[derive(Parser, Debug)]
#[command(
    name = "relaunch",
    about = "Restart command-line programs with irritating failure modes",
    long_about = "Restarts a command when it prints a matching line or exits with a matching \
                  code, and otherwise passes through standard input, output and the exit code \
                  verbatim.",
    after_help = "Exit status: the program's own exit code when it finishes without a \
                  trigger; 7 when every attempt triggered a restart (indistinguishable from \
                  a real exit code of 7); 130 when interrupted; 1 on a startup error.",
    version
)]
struct Cli {
    /// Print attempt banners on stderr; repeat for more logging (-vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Maximum number of attempts; negative means unlimited [default: unlimited]
    #[arg(short = 'a', long, value_name = "N", allow_negative_numbers = true)]
    max_attempts: Option<i32>,

    /// Exit codes to restart the program on
    #[arg(
        short = 'c',
        long,
        value_name = "CODE",
        value_delimiter = ',',
        allow_negative_numbers = true
    )]
    codes: Vec<i32>,

    /// Literal strings to restart the program on, anywhere in a line of stdout or stderr
    #[arg(short = 's', long = "strings", value_name = "TEXT")]
    strings: Vec<String>,

    /// Regex patterns to restart the program on, on any line of stdout or stderr
    #[arg(short = 'p', long = "patterns", value_name = "REGEX")]
    patterns: Vec<String>,

    /// Config file to read instead of the default search locations
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// How long output may stay silent after the program exits before it is no longer read
    #[arg(long, value_name = "MS")]
    drain_timeout_ms: Option<u64>,

    /// Send SIGTERM and wait this long before killing on restart
    #[arg(long, value_name = "MS")]
    kill_grace_ms: Option<u64>,

    /// The program to run, followed by its arguments
    #[arg(
        value_name = "COMMAND",
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    command: Vec<String>,
}

impl Cli {
    /// Settings given on the command line, layered over the config file.
    fn settings(&self) -> RunSettings {
        RunSettings {
            max_attempts: self.max_attempts,
            codes: self.codes.clone(),
            strings: self.strings.clone(),
            patterns: self.patterns.clone(),
            drain_timeout_ms: self.drain_timeout_ms,
            kill_grace_ms: self.kill_grace_ms,
        }
    }
}

fn init_tracing(verbosity: u8) {
    // A single -v only turns on attempt banners.
    let level = match verbosity {
        0 | 1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<RunOutcome, relaunch::Error> {
    let loader = cli
        .config
        .clone()
        .map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let settings = loader.load()?.merge(cli.settings());
    let config = settings.into_run_config(cli.command, cli.verbose > 0)?;

    tracing::info!(
        program = %config.program(),
        args = ?config.args(),
        max_attempts = ?config.attempt_limit(),
        triggers = config.trigger_set().len(),
        "Starting supervised run"
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping child");
            interrupt.cancel();
        }
    });

    let mut supervisor = Supervisor::new(config).with_cancellation(cancel);
    Ok(supervisor.run().await?)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(outcome) => {
            tracing::debug!(?outcome, "Run finished");
            std::process::exit(outcome.process_exit_code());
        }
        Err(e) => {
            display::print_error(&e.to_string());
            std::process::exit(FATAL_EXIT_CODE);
        }
    }
}
