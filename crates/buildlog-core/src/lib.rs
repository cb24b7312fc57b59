//! buildlog core
//!
//! Turns a build orchestrator's event stream into:
//! - per-job log files (`command.log`, `stdout.log`, `stderr.log`,
//!   `stdout_stderr.log`, `streams.log`)
//! - a global `events.log` with relative timestamps
//! - one cohesive console transcript per job, printed when the job ends
//! - a classification of all jobs, printed when the run ends
//!
//! Every handler implements [`EventHandler`] and processes one event at a
//! time. The caller (the orchestrator's reactor, or [`OutputPipeline`])
//! delivers events in causal order and in descending handler priority.

pub mod config;
pub mod encoding;
pub mod error;
pub mod event;
pub mod handler;
pub mod obs;
pub mod pipeline;
pub mod style;
pub mod telemetry;

pub use config::{CohesionStrategy, ColorChoice, OutputConfig};
pub use encoding::OutputEncoding;
pub use error::{OutputError, Result};
pub use event::{
    Command, Describe, Event, EventEnvelope, ExtensionEvent, JobEnded, JobProgress, JobQueued,
    JobRef, JobStarted, OutputLine, ReturnCode, TestFailure,
};
pub use handler::summary::{render_summary, OutcomeSet, Outcomes};
pub use handler::{
    CohesionHandler, EventHandler, EventLogHandler, LogWriter, PackageListHandler,
    StderrBatchHandler, SummaryHandler,
};
pub use pipeline::{HandlerFailure, OutputPipeline};
pub use style::{Painter, Severity};
pub use telemetry::init_tracing;

/// buildlog core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
