//! Per-job stderr batches on the process stderr.
//!
//! Error output of parallel jobs would interleave on the terminal, so each
//! job's stderr lines are held until the job ends and printed as one block:
//!
//! ```text
//! --- stderr: <job id>
//! <stderr lines>
//! ---
//! ```

use std::collections::HashMap;
use std::io::{self, Stderr, Write};

use crate::encoding::OutputEncoding;
use crate::error::{OutputError, Result};
use crate::event::{Event, EventEnvelope};
use crate::handler::{priority, EventHandler};

pub struct StderrBatchHandler<W: Write = Stderr> {
    encoding: OutputEncoding,
    lines: HashMap<String, Vec<Vec<u8>>>,
    out: W,
}

impl StderrBatchHandler<Stderr> {
    pub fn stderr(encoding: OutputEncoding) -> Self {
        Self::new(encoding, io::stderr())
    }
}

impl<W: Write> StderrBatchHandler<W> {
    pub fn new(encoding: OutputEncoding, out: W) -> Self {
        Self {
            encoding,
            lines: HashMap::new(),
            out,
        }
    }

    pub fn buffered_jobs(&self) -> usize {
        self.lines.len()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> EventHandler for StderrBatchHandler<W> {
    fn name(&self) -> &'static str {
        "console_stderr"
    }

    fn priority(&self) -> u32 {
        priority::STDERR_BATCH
    }

    fn handle(&mut self, envelope: &EventEnvelope) -> Result<()> {
        match &envelope.event {
            Event::StderrLine(output) => {
                if let Some(job_id) = envelope.job_id() {
                    self.lines
                        .entry(job_id.to_string())
                        .or_default()
                        .push(output.line.clone());
                }
                Ok(())
            }
            Event::JobEnded(ended) => {
                let job_id = envelope.job_id().unwrap_or(ended.identifier.as_str());
                // Interrupted jobs still show what they wrote to stderr.
                let Some(lines) = self.lines.remove(job_id) else {
                    return Ok(());
                };
                let content = lines.concat();
                let text = self.encoding.decode(job_id, &content)?;
                let block = format!("--- stderr: {job_id}\n{text}---\n");
                self.out
                    .write_all(block.as_bytes())
                    .and_then(|()| self.out.flush())
                    .map_err(OutputError::Console)
            }
            _ => Ok(()),
        }
    }
}
