//! switch-harness - run and watch the gst-switch server
//!
//! Subcommands:
//! - `switch-harness serve` - start the server, wait until it is ready and
//!   keep it running until interrupted
//! - `switch-harness watch --pattern P -- CMD...` - run any command and wait
//!   for a pattern in its output
//! - `switch-harness check-config` - validate the configuration file

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use switch_harness::config::{Config, RecordSetting};
use switch_harness::fixture::ServerSession;
use switch_harness::logging::init_tracing;
use switch_harness::monitor::{MirrorSink, MonitorError, ProcessMonitor, ReadOutcome};

/// How long `serve` waits for output before re-checking for a stop signal.
const SERVE_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "switch-harness")]
#[command(about = "Process-control harness for the gst-switch server")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start gst-switch-srv and keep it running until SIGINT/SIGTERM
    Serve {
        /// Config file (default: ~/.config/switch-harness/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory containing gst-switch-srv (default: search $PATH)
        #[arg(long)]
        path: Option<PathBuf>,

        #[arg(long)]
        video_port: Option<i64>,

        #[arg(long)]
        audio_port: Option<i64>,

        /// Remote-control address, e.g. tcp:host=0.0.0.0,port=5000
        #[arg(long)]
        controller_address: Option<String>,

        /// Record output; optionally into the given file name
        #[arg(long, num_args = 0..=1, default_missing_value = "")]
        record: Option<String>,

        #[arg(long)]
        video_format: Option<String>,

        /// Extra option string passed verbatim to the server
        #[arg(long, allow_hyphen_values = true)]
        gst_option: Option<String>,

        /// Mirror server output to stderr instead of the log file
        #[arg(long)]
        no_log_file: bool,

        /// Flush and collect gcov coverage before stopping
        #[arg(long)]
        coverage: bool,
    },

    /// Run a command and wait until its output contains a pattern
    Watch {
        /// Literal text to wait for
        #[arg(short, long)]
        pattern: String,

        /// Required number of occurrences
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,

        /// Timeout in seconds
        #[arg(short, long, default_value = "5")]
        timeout: f64,

        /// Copy the command's output into this file
        #[arg(long)]
        log: Option<PathBuf>,

        /// Copy the command's output to stderr
        #[arg(long, conflicts_with = "log")]
        echo: bool,

        /// Command and arguments to run
        #[arg(required = true, last = true)]
        command: Vec<String>,
    },

    /// Load and validate the configuration file
    CheckConfig {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Serve {
            config,
            path,
            video_port,
            audio_port,
            controller_address,
            record,
            video_format,
            gst_option,
            no_log_file,
            coverage,
        } => load_config(config.as_ref()).and_then(|mut cfg| {
            let server = &mut cfg.server;
            if path.is_some() {
                server.path = path;
            }
            if let Some(port) = video_port {
                server.video_port = port;
            }
            if let Some(port) = audio_port {
                server.audio_port = port;
            }
            if let Some(address) = controller_address {
                server.controller_address = address;
            }
            if let Some(record) = record {
                server.record = if record.is_empty() {
                    RecordSetting::Flag(true)
                } else {
                    RecordSetting::Name(record)
                };
            }
            if video_format.is_some() {
                server.video_format = video_format;
            }
            if let Some(option) = gst_option {
                server.gst_option = option;
            }
            if no_log_file {
                cfg.harness.log_to_file = false;
            }
            serve(&cfg, coverage)
        }),
        Commands::Watch {
            pattern,
            count,
            timeout,
            log,
            echo,
            command,
        } => watch(&pattern, count, timeout, log, echo, command),
        Commands::CheckConfig { config } => load_config(config.as_ref()).and_then(|cfg| {
            print!("{}", toml::to_string_pretty(&cfg)?);
            Ok(ExitCode::SUCCESS)
        }),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

fn serve(config: &Config, coverage: bool) -> Result<ExitCode> {
    config.validate()?;

    let stop = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&stop))
            .context("Failed to install signal handler")?;
    }

    let mut session = ServerSession::from_config(config)?.with_coverage(coverage);
    tracing::info!("Server ready, press Ctrl-C to stop");

    let mut died = false;
    while !stop.load(Ordering::SeqCst) {
        if session.server_mut().read_available(SERVE_POLL_INTERVAL)? == ReadOutcome::Closed {
            tracing::error!("Server closed its output");
            died = true;
            break;
        }
    }

    let report = session.finish(&mut io::stdout())?;
    tracing::info!("Server stopped ({})", report);
    if died || report.is_segfault() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn watch(
    pattern: &str,
    count: usize,
    timeout: f64,
    log: Option<PathBuf>,
    echo: bool,
    command: Vec<String>,
) -> Result<ExitCode> {
    let timeout = Duration::try_from_secs_f64(timeout).context("Invalid timeout")?;
    let mirror = match log {
        Some(path) => Some(
            MirrorSink::create_file(&path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?,
        ),
        None if echo => Some(MirrorSink::stderr()),
        None => None,
    };

    let mut monitor = ProcessMonitor::new(command, mirror);
    monitor.start()?;
    let mut monitor = scopeguard::guard(monitor, |mut monitor| {
        if monitor.has_process() {
            if let Err(e) = monitor.terminate() {
                tracing::warn!("Failed to terminate command: {}", e);
            }
        }
    });

    match monitor.wait_for_output(pattern, timeout, count) {
        Ok(()) => {
            tracing::info!("matched '{}' {}x", pattern, count);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            Ok(ExitCode::from(watch_exit_code(&err)))
        }
    }
}

/// Exit status of `watch` when the pattern was not matched. `2` is left to
/// clap for usage errors.
fn watch_exit_code(err: &MonitorError) -> u8 {
    match err {
        MonitorError::MatchTimeout { .. } => 124,
        MonitorError::PrematureExit { .. } => 3,
        MonitorError::Wait { .. } => 4,
        MonitorError::Launch(_) | MonitorError::ProcessControl(_) => 1,
    }
}
