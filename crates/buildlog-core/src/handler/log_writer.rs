//! Per-job log files.
//!
//! Layout: `<log_base>/<job id>/{command,stdout,stderr,stdout_stderr,streams}.log`
//!
//! All five files are truncated the first time a job produces a command or
//! output line, and only appended to afterwards. Every append opens, writes
//! and closes the file before returning.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use crate::error::{OutputError, Result};
use crate::event::{Event, EventEnvelope, JobRef};
use crate::handler::{priority, EventHandler};
use crate::obs;

pub const COMMAND_LOG_FILENAME: &str = "command.log";
pub const STDOUT_LOG_FILENAME: &str = "stdout.log";
pub const STDERR_LOG_FILENAME: &str = "stderr.log";
pub const STDOUT_STDERR_LOG_FILENAME: &str = "stdout_stderr.log";
pub const ALL_STREAMS_LOG_FILENAME: &str = "streams.log";

pub const ALL_LOG_FILENAMES: [&str; 5] = [
    COMMAND_LOG_FILENAME,
    STDOUT_LOG_FILENAME,
    STDERR_LOG_FILENAME,
    STDOUT_STDERR_LOG_FILENAME,
    ALL_STREAMS_LOG_FILENAME,
];

const COMMAND_FILES: &[&str] = &[COMMAND_LOG_FILENAME];
const STDOUT_FILES: &[&str] = &[
    STDOUT_LOG_FILENAME,
    STDOUT_STDERR_LOG_FILENAME,
    ALL_STREAMS_LOG_FILENAME,
];
const STDERR_FILES: &[&str] = &[
    STDERR_LOG_FILENAME,
    STDOUT_STDERR_LOG_FILENAME,
    ALL_STREAMS_LOG_FILENAME,
];

/// Files an event is appended to, or `None` for events without job logs.
pub fn log_files_for(event: &Event) -> Option<&'static [&'static str]> {
    match event {
        Event::Command(_) => Some(COMMAND_FILES),
        Event::StdoutLine(_) => Some(STDOUT_FILES),
        Event::StderrLine(_) => Some(STDERR_FILES),
        _ => None,
    }
}

/// Directory holding the logs of one job.
///
/// The job id must be a single plain path component, so a job can never
/// write outside `log_base`.
pub fn job_log_dir(log_base: &Path, job_id: &str) -> Result<PathBuf> {
    let mut components = Path::new(job_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if name.to_str() == Some(job_id) => {
            Ok(log_base.join(job_id))
        }
        _ => Err(OutputError::InvalidJobId(job_id.to_string())),
    }
}

pub struct LogWriter {
    log_base: PathBuf,
    initialized: HashSet<String>,
}

impl LogWriter {
    pub fn new(log_base: impl Into<PathBuf>) -> Self {
        Self {
            log_base: log_base.into(),
            initialized: HashSet::new(),
        }
    }

    pub fn log_base(&self) -> &Path {
        &self.log_base
    }

    pub fn is_initialized(&self, job_id: &str) -> bool {
        self.initialized.contains(job_id)
    }

    fn init_logs(&mut self, job: &JobRef) -> Result<PathBuf> {
        let dir = job_log_dir(&self.log_base, &job.id)?;
        if self.initialized.contains(&job.id) {
            return Ok(dir);
        }

        fs::create_dir_all(&dir).map_err(|e| OutputError::io(&dir, e))?;
        for filename in ALL_LOG_FILENAMES {
            let path = dir.join(filename);
            fs::File::create(&path).map_err(|e| OutputError::io(&path, e))?;
        }
        self.initialized.insert(job.id.clone());
        obs::emit_job_logs_initialized(&job.id, &dir);
        Ok(dir)
    }
}

fn append(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .map_err(|e| OutputError::io(path, e))?;
    file.write_all(bytes).map_err(|e| OutputError::io(path, e))
}

impl EventHandler for LogWriter {
    fn name(&self) -> &'static str {
        "log"
    }

    fn priority(&self) -> u32 {
        priority::LOG_WRITER
    }

    fn handle(&mut self, envelope: &EventEnvelope) -> Result<()> {
        let Some(job) = &envelope.job else {
            return Ok(());
        };
        let Some(filenames) = log_files_for(&envelope.event) else {
            return Ok(());
        };

        let line: Cow<'_, [u8]> = match &envelope.event {
            Event::Command(command) => {
                let mut text = command.to_line();
                if !text.ends_with('\n') {
                    text.push('\n');
                }
                Cow::Owned(text.into_bytes())
            }
            Event::StdoutLine(output) | Event::StderrLine(output) => {
                Cow::Borrowed(output.line.as_slice())
            }
            _ => return Ok(()),
        };

        let dir = self.init_logs(job)?;
        for filename in filenames {
            append(&dir.join(filename), &line)?;
        }
        Ok(())
    }
}
