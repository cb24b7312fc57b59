//! buildlog - replay a recorded build event stream
//!
//! Reads one JSON `EventEnvelope` per line and feeds the stream through the
//! output handlers exactly as a live run would: job logs and `events.log`
//! under the log base, cohesion blocks and the summary on stdout, stderr
//! batches on stderr.
//!
//! ```text
//! {"event":{"type":"JobQueued","data":{"identifier":"pkg_a"}},"job":{"id":"pkg_a","package":"pkg_a"}}
//! {"event":{"type":"StdoutLine","data":{"line":"building\n"}},"job":{"id":"pkg_a","package":"pkg_a"}}
//! {"event":{"type":"JobEnded","data":{"identifier":"pkg_a","rc":0}},"job":{"id":"pkg_a","package":"pkg_a"}}
//! {"event":{"type":"EventReactorShutdown"}}
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use buildlog_core::{
    init_tracing, CohesionStrategy, ColorChoice, Event, EventEnvelope, OutputConfig,
    OutputPipeline,
};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "buildlog")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build output handlers: job logs, event log, transcripts and summary", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines event stream through the output handlers
    Replay {
        /// Event stream, one JSON event envelope per line
        events: PathBuf,

        /// JSON configuration file
        #[arg(short, long, env = "BUILDLOG_CONFIG")]
        config: Option<PathBuf>,

        /// Directory for events.log and the per-job logs (overrides config)
        #[arg(long)]
        log_base: Option<PathBuf>,

        /// How job output reaches the console (overrides config)
        #[arg(long, value_enum)]
        cohesion: Option<CohesionArg>,

        /// Colorize the summary (overrides config)
        #[arg(long, value_enum)]
        color: Option<ColorArg>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CohesionArg {
    Off,
    Buffered,
    LogReread,
}

impl From<CohesionArg> for CohesionStrategy {
    fn from(arg: CohesionArg) -> Self {
        match arg {
            CohesionArg::Off => CohesionStrategy::Off,
            CohesionArg::Buffered => CohesionStrategy::Buffered,
            CohesionArg::LogReread => CohesionStrategy::LogReread,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ColorArg {
    Auto,
    Always,
    Never,
}

impl From<ColorArg> for ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => ColorChoice::Auto,
            ColorArg::Always => ColorChoice::Always,
            ColorArg::Never => ColorChoice::Never,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    init_tracing(cli.json, level);

    match cli.command {
        Commands::Replay {
            events,
            config,
            log_base,
            cohesion,
            color,
        } => {
            let mut config = match config {
                Some(path) => OutputConfig::from_json_file(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => OutputConfig::default(),
            };
            if let Some(log_base) = log_base {
                config.log_base = log_base;
            }
            if let Some(cohesion) = cohesion {
                config.cohesion = cohesion.into();
            }
            if let Some(color) = color {
                config.color = color.into();
            }
            cmd_replay(&events, &config)
        }
    }
}

fn cmd_replay(events: &Path, config: &OutputConfig) -> Result<()> {
    let mut pipeline =
        OutputPipeline::from_config(config).context("Failed to set up output handlers")?;

    let file = File::open(events)
        .with_context(|| format!("Failed to open event stream {}", events.display()))?;

    let mut delivered = 0usize;
    let mut failures = 0usize;
    let mut saw_shutdown = false;

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", events.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let envelope: EventEnvelope = serde_json::from_str(&line)
            .with_context(|| format!("Invalid event on line {}", index + 1))?;
        if saw_shutdown {
            warn!(line = index + 1, "ignoring event after reactor shutdown");
            continue;
        }
        saw_shutdown = matches!(envelope.event, Event::ReactorShutdown);
        failures += pipeline.dispatch(&envelope).len();
        delivered += 1;
    }

    if !saw_shutdown {
        // A stream cut short still gets its summary.
        failures += pipeline
            .dispatch(&EventEnvelope::job_agnostic(Event::ReactorShutdown))
            .len();
    }

    info!(
        delivered = delivered,
        failures = failures,
        log_base = %config.log_base.display(),
        "Replay complete"
    );
    if failures > 0 {
        warn!(failures = failures, "Some events could not be fully processed; see events.log");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_replay_args_parse() {
        let cli = Cli::try_parse_from([
            "buildlog",
            "replay",
            "events.jsonl",
            "--log-base",
            "/tmp/logs",
            "--cohesion",
            "log-reread",
            "--color",
            "never",
        ])
        .unwrap();
        match cli.command {
            Commands::Replay {
                events,
                log_base,
                cohesion,
                color,
                ..
            } => {
                assert_eq!(events, PathBuf::from("events.jsonl"));
                assert_eq!(log_base, Some(PathBuf::from("/tmp/logs")));
                assert_eq!(
                    cohesion.map(CohesionStrategy::from),
                    Some(CohesionStrategy::LogReread)
                );
                assert_eq!(color.map(ColorChoice::from), Some(ColorChoice::Never));
            }
        }
    }

    #[test]
    fn test_replay_writes_logs_and_synthesizes_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let stream = dir.path().join("events.jsonl");
        let mut file = File::create(&stream).unwrap();
        writeln!(
            file,
            r#"{{"event":{{"type":"JobQueued","data":{{"identifier":"pkg_a"}}}},"job":{{"id":"pkg_a","package":"pkg_a"}}}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r#"{{"event":{{"type":"StdoutLine","data":{{"line":"hello\n"}}}},"job":{{"id":"pkg_a","package":"pkg_a"}}}}"#
        )
        .unwrap();
        writeln!(
            file,
            r#"{{"event":{{"type":"JobEnded","data":{{"identifier":"pkg_a","rc":0}}}},"job":{{"id":"pkg_a","package":"pkg_a"}}}}"#
        )
        .unwrap();
        drop(file);

        let log_base = dir.path().join("log");
        let config = OutputConfig {
            cohesion: CohesionStrategy::Off,
            summary: false,
            color: ColorChoice::Never,
            ..OutputConfig::with_log_base(&log_base)
        };
        cmd_replay(&stream, &config).unwrap();

        assert_eq!(
            std::fs::read_to_string(log_base.join("pkg_a").join("stdout.log")).unwrap(),
            "hello\n"
        );
        let events_log = std::fs::read_to_string(log_base.join("events.log")).unwrap();
        assert_eq!(events_log.lines().count(), 4);
        assert!(events_log
            .lines()
            .last()
            .unwrap()
            .ends_with("(-) EventReactorShutdown: {}"));
    }

    #[test]
    fn test_replay_rejects_malformed_line() {
        let dir = tempfile::tempdir().unwrap();
        let stream = dir.path().join("events.jsonl");
        std::fs::write(&stream, "{not json}\n").unwrap();
        let config = OutputConfig::with_log_base(dir.path().join("log"));
        let err = cmd_replay(&stream, &config).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
