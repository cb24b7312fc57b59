//! In-process delivery of events to the enabled handlers.
//!
//! The orchestrator's reactor normally owns delivery. `OutputPipeline` plays
//! that role for replays and tests: it hands every event to each handler in
//! descending priority order, one event at a time. The global event log, when
//! enabled, always goes first and also receives a line for every handler
//! failure.

use std::cmp::Reverse;

use tracing::debug;

use crate::config::{CohesionStrategy, OutputConfig};
use crate::error::{OutputError, Result};
use crate::event::EventEnvelope;
use crate::handler::{
    CohesionHandler, EventHandler, EventLogHandler, LogWriter, PackageListHandler,
    StderrBatchHandler, SummaryHandler,
};
use crate::obs;
use crate::style::{Painter, Stream};

/// A handler error for one event. Delivery to the other handlers continues.
#[derive(Debug)]
pub struct HandlerFailure {
    pub handler: &'static str,
    pub job_id: Option<String>,
    pub error: OutputError,
}

pub struct OutputPipeline {
    event_log: Option<EventLogHandler>,
    handlers: Vec<Box<dyn EventHandler>>,
}

impl OutputPipeline {
    pub fn new(event_log: Option<EventLogHandler>) -> Self {
        Self {
            event_log,
            handlers: Vec::new(),
        }
    }

    /// Build the handlers `config` enables, writing to the process stdout
    /// and stderr.
    pub fn from_config(config: &OutputConfig) -> Result<Self> {
        config.validate()?;

        let event_log = config
            .event_log
            .then(|| EventLogHandler::new(&config.log_base));
        let mut pipeline = Self::new(event_log);

        if config.job_logs {
            pipeline.add_handler(Box::new(LogWriter::new(&config.log_base)));
        }
        if config.cohesion != CohesionStrategy::Off {
            pipeline.add_handler(Box::new(CohesionHandler::stdout(
                config.cohesion,
                &config.log_base,
                config.encoding,
            )));
        }
        if config.stderr_batch {
            pipeline.add_handler(Box::new(StderrBatchHandler::stderr(config.encoding)));
        }
        if config.package_list {
            pipeline.add_handler(Box::new(PackageListHandler::stdout()));
        }
        if config.summary {
            pipeline.add_handler(Box::new(SummaryHandler::stdout(Painter::new(
                config.color,
                Stream::Stdout,
            ))));
        }
        Ok(pipeline)
    }

    /// Register a handler. Handlers of equal priority keep registration order.
    pub fn add_handler(&mut self, handler: Box<dyn EventHandler>) {
        debug!(handler = handler.name(), priority = handler.priority(), "registering handler");
        self.handlers.push(handler);
        self.handlers.sort_by_key(|h| Reverse(h.priority()));
    }

    /// Handler names in delivery order.
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.event_log
            .as_ref()
            .map(|log| log.name())
            .into_iter()
            .chain(self.handlers.iter().map(|h| h.name()))
            .collect()
    }

    pub fn event_log(&self) -> Option<&EventLogHandler> {
        self.event_log.as_ref()
    }

    /// Deliver one event to every handler.
    pub fn dispatch(&mut self, envelope: &EventEnvelope) -> Vec<HandlerFailure> {
        let mut failures = Vec::new();
        let job_id = envelope.job_id();

        if let Some(log) = self.event_log.as_mut() {
            if let Err(error) = log.handle(envelope) {
                obs::emit_handler_failed(log.name(), job_id, &error);
                failures.push(HandlerFailure {
                    handler: log.name(),
                    job_id: job_id.map(str::to_string),
                    error,
                });
            }
        }

        for handler in &mut self.handlers {
            let Err(error) = handler.handle(envelope) else {
                continue;
            };
            obs::emit_handler_failed(handler.name(), job_id, &error);
            if let Some(log) = self.event_log.as_mut() {
                if let Err(log_error) = log.record_failure(job_id, handler.name(), &error) {
                    obs::emit_handler_failed(log.name(), job_id, &log_error);
                }
            }
            failures.push(HandlerFailure {
                handler: handler.name(),
                job_id: job_id.map(str::to_string),
                error,
            });
        }

        failures
    }
}
