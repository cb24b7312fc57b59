//! Event handlers.
//!
//! Each handler consumes the event stream independently through
//! [`EventHandler::handle`]. The caller delivers events one at a time, in
//! causal order per job, and in descending [`EventHandler::priority`] across
//! handlers for the same event.

use crate::error::Result;
use crate::event::EventEnvelope;

pub mod cohesion;
pub mod event_log;
pub mod log_writer;
pub mod package_list;
pub mod stderr;
pub mod summary;

pub use cohesion::CohesionHandler;
pub use event_log::EventLogHandler;
pub use log_writer::LogWriter;
pub use package_list::PackageListHandler;
pub use stderr::StderrBatchHandler;
pub use summary::SummaryHandler;

/// Delivery priorities, highest first.
pub mod priority {
    /// The global event log sees every event before anyone else acts on it
    pub const EVENT_LOG: u32 = 200;
    /// Job logs must exist before the cohesion handler rereads them
    pub const LOG_WRITER: u32 = 150;
    pub const COHESION: u32 = 130;
    /// Below cohesion so a job's stderr block prints after its output block
    pub const STDERR_BATCH: u32 = 110;
    pub const PACKAGE_LIST: u32 = 100;
    /// Last, so the summary follows everything else
    pub const SUMMARY: u32 = 50;
}

/// A consumer of the build event stream.
pub trait EventHandler {
    /// Short name used in diagnostics and the event log.
    fn name(&self) -> &'static str;

    fn priority(&self) -> u32;

    /// Process one event. Errors affect this event only; the handler stays
    /// usable for the rest of the run.
    fn handle(&mut self, envelope: &EventEnvelope) -> Result<()>;
}
