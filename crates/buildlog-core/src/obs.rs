//! Structured diagnostics for the output handlers.
//!
//! These go through `tracing` and are independent of the `events.log`
//! artifact, which records the build's own events.

use tracing::{debug, info, warn};

/// Emit event: a job's log directory was created and its files truncated.
pub fn emit_job_logs_initialized(job_id: &str, dir: &std::path::Path) {
    debug!(event = "job_logs.initialized", job_id = %job_id, dir = %dir.display());
}

/// Emit event: a cohesion block was written for a job.
pub fn emit_cohesion_flushed(job_id: &str, bytes: usize) {
    debug!(event = "cohesion.flushed", job_id = %job_id, bytes = bytes);
}

/// Emit event: buffered output was dropped without printing.
pub fn emit_cohesion_dropped(job_id: &str, reason: &str, chunks: usize) {
    debug!(event = "cohesion.dropped", job_id = %job_id, reason = %reason, chunks = chunks);
}

/// Emit event: an event could not be rendered into the event log.
pub fn emit_event_skipped(kind: &str, error: &dyn std::fmt::Display) {
    warn!(event = "event_log.skipped", kind = %kind, error = %error);
}

/// Emit event: a handler failed on an event (warning level).
pub fn emit_handler_failed(handler: &str, job_id: Option<&str>, error: &dyn std::fmt::Display) {
    warn!(
        event = "handler.failed",
        handler = %handler,
        job_id = %job_id.unwrap_or("-"),
        error = %error,
    );
}

/// Emit event: the run summary was rendered.
pub fn emit_summary_rendered(finished: usize, failed: usize, interrupted: usize, duration_secs: f64) {
    info!(
        event = "summary.rendered",
        finished = finished,
        failed = failed,
        interrupted = interrupted,
        duration_secs = duration_secs,
    );
}
