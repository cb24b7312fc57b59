//! Global event log (`events.log`).
//!
//! One line per delivered event:
//!
//! ```text
//! [0.000000] (-) JobQueued: {identifier: "pkg_a", dependencies: []}
//! [0.004211] (pkg_a) StdoutLine: {line: b"building\n"}
//! ```
//!
//! Times are seconds since the first event on a monotonic clock. The file is
//! truncated when the first event arrives and appended to afterwards.

use std::fmt::Display;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::{OutputError, Result};
use crate::event::describe::field;
use crate::event::{render_fields, Describe, EventEnvelope};
use crate::handler::{priority, EventHandler};
use crate::obs;

pub const EVENT_LOG_FILENAME: &str = "events.log";

pub struct EventLogHandler {
    path: PathBuf,
    start: Option<Instant>,
    skipped: usize,
}

impl EventLogHandler {
    pub fn new(log_base: impl AsRef<Path>) -> Self {
        Self {
            path: log_base.as_ref().join(EVENT_LOG_FILENAME),
            start: None,
            skipped: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Events that could not be rendered and were left out of the log.
    pub fn skipped_events(&self) -> usize {
        self.skipped
    }

    /// Record that `handler` failed while processing an event of `job`.
    pub fn record_failure(
        &mut self,
        job_id: Option<&str>,
        handler: &str,
        error: &dyn Display,
    ) -> Result<()> {
        let fields = vec![
            field("handler", handler),
            field("error", error.to_string().as_str()),
        ];
        let elapsed = self.elapsed_secs()?;
        self.write_line(elapsed, job_id, "HandlerFailed", &render_fields(&fields))
    }

    /// Create the log and start the clock on the first event, whether or not
    /// that event ends up in the log. Returns the elapsed time of the current
    /// event, which is exactly zero for the first one.
    fn elapsed_secs(&mut self) -> Result<f64> {
        if let Some(start) = self.start {
            return Ok(start.elapsed().as_secs_f64());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| OutputError::io(parent, e))?;
        }
        fs::File::create(&self.path).map_err(|e| OutputError::io(&self.path, e))?;
        self.start = Some(Instant::now());
        Ok(0.0)
    }

    fn write_line(
        &self,
        elapsed: f64,
        job_id: Option<&str>,
        kind: &str,
        fields: &str,
    ) -> Result<()> {
        let line = format!("[{elapsed:.6}] ({}) {kind}: {fields}\n", job_id.unwrap_or("-"));

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| OutputError::io(&self.path, e))?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| OutputError::io(&self.path, e))
    }
}

impl EventHandler for EventLogHandler {
    fn name(&self) -> &'static str {
        "event_log"
    }

    fn priority(&self) -> u32 {
        priority::EVENT_LOG
    }

    fn handle(&mut self, envelope: &EventEnvelope) -> Result<()> {
        let elapsed = self.elapsed_secs()?;
        let event = &envelope.event;
        let fields = match event.describe() {
            Ok(fields) => fields,
            Err(e) => {
                // The rest of the log stays usable; only this line is lost.
                self.skipped += 1;
                obs::emit_event_skipped(event.kind_name(), &e);
                return Ok(());
            }
        };
        self.write_line(
            elapsed,
            envelope.job_id(),
            event.kind_name(),
            &render_fields(&fields),
        )
    }
}
