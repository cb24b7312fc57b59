//! Queued jobs listed in topological order.
//!
//! The scheduler queues jobs in dependency order before starting any of
//! them. The list is printed once, when the first job starts.

use std::io::{self, Stdout, Write};

use crate::error::{OutputError, Result};
use crate::event::{Event, EventEnvelope, JobRef};
use crate::handler::{priority, EventHandler};

pub struct PackageListHandler<W: Write = Stdout> {
    queued: Vec<JobRef>,
    printed: bool,
    out: W,
}

impl PackageListHandler<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> PackageListHandler<W> {
    pub fn new(out: W) -> Self {
        Self {
            queued: Vec::new(),
            printed: false,
            out,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> EventHandler for PackageListHandler<W> {
    fn name(&self) -> &'static str {
        "console_package_list"
    }

    fn priority(&self) -> u32 {
        priority::PACKAGE_LIST
    }

    fn handle(&mut self, envelope: &EventEnvelope) -> Result<()> {
        match (&envelope.event, &envelope.job) {
            (Event::JobQueued(_), Some(job)) if !self.printed => {
                self.queued.push(job.clone());
                Ok(())
            }
            (Event::JobStarted(_), _) if !self.printed && !self.queued.is_empty() => {
                self.printed = true;
                let mut block = String::from("Topological order\n");
                for job in self.queued.drain(..) {
                    let package_type = job.package_type.as_deref().unwrap_or("unknown");
                    block.push_str(&format!("- {job} ({package_type})\n"));
                }
                self.out
                    .write_all(block.as_bytes())
                    .and_then(|()| self.out.flush())
                    .map_err(OutputError::Console)
            }
            _ => Ok(()),
        }
    }
}
