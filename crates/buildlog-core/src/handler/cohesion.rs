//! Cohesive per-job transcripts on the console.
//!
//! Output of parallel jobs arrives interleaved. This handler holds each job's
//! stdout and stderr lines back and prints them as a single block when the job
//! ends:
//!
//! ```text
//! --- output: <job id>
//! <everything the job printed, in arrival order>
//! ---
//! ```
//!
//! With [`CohesionStrategy::LogReread`] nothing is kept in memory; the block
//! is built from the job's `stdout_stderr.log` instead, so the log writer must
//! run first. Interrupted jobs and jobs without output never print a block.

use std::collections::HashMap;
use std::io::{self, Stdout, Write};
use std::path::PathBuf;

use crate::config::CohesionStrategy;
use crate::encoding::OutputEncoding;
use crate::error::{OutputError, Result};
use crate::event::{Event, EventEnvelope, JobEnded};
use crate::handler::log_writer::{job_log_dir, STDOUT_STDERR_LOG_FILENAME};
use crate::handler::{priority, EventHandler};
use crate::obs;

pub struct CohesionHandler<W: Write = Stdout> {
    strategy: CohesionStrategy,
    log_base: PathBuf,
    encoding: OutputEncoding,
    buffers: HashMap<String, Vec<Vec<u8>>>,
    out: W,
}

impl CohesionHandler<Stdout> {
    /// Handler printing to the process stdout.
    pub fn stdout(
        strategy: CohesionStrategy,
        log_base: impl Into<PathBuf>,
        encoding: OutputEncoding,
    ) -> Self {
        Self::new(strategy, log_base, encoding, io::stdout())
    }
}

impl<W: Write> CohesionHandler<W> {
    pub fn new(
        strategy: CohesionStrategy,
        log_base: impl Into<PathBuf>,
        encoding: OutputEncoding,
        out: W,
    ) -> Self {
        Self {
            strategy,
            log_base: log_base.into(),
            encoding,
            buffers: HashMap::new(),
            out,
        }
    }

    pub fn strategy(&self) -> CohesionStrategy {
        self.strategy
    }

    /// Number of jobs with output currently held in memory.
    pub fn buffered_jobs(&self) -> usize {
        self.buffers.len()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn on_job_ended(&mut self, job_id: &str, ended: &JobEnded) -> Result<()> {
        let content = match self.strategy {
            CohesionStrategy::Off => return Ok(()),
            CohesionStrategy::Buffered => {
                // Always retire the entry, whether or not it gets printed.
                let Some(chunks) = self.buffers.remove(job_id) else {
                    return Ok(());
                };
                if ended.rc.is_interrupted() {
                    obs::emit_cohesion_dropped(job_id, "interrupted", chunks.len());
                    return Ok(());
                }
                chunks.concat()
            }
            CohesionStrategy::LogReread => {
                if ended.rc.is_interrupted() {
                    return Ok(());
                }
                let path =
                    job_log_dir(&self.log_base, job_id)?.join(STDOUT_STDERR_LOG_FILENAME);
                match std::fs::read(&path) {
                    Ok(bytes) => bytes,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
                    Err(e) => return Err(OutputError::io(&path, e)),
                }
            }
        };

        if content.is_empty() {
            return Ok(());
        }

        let text = self.encoding.decode(job_id, &content)?;
        let block = format!("--- output: {job_id}\n{text}---\n");
        self.out
            .write_all(block.as_bytes())
            .and_then(|()| self.out.flush())
            .map_err(OutputError::Console)?;
        obs::emit_cohesion_flushed(job_id, content.len());
        Ok(())
    }
}

impl<W: Write> EventHandler for CohesionHandler<W> {
    fn name(&self) -> &'static str {
        "console_cohesion"
    }

    fn priority(&self) -> u32 {
        priority::COHESION
    }

    fn handle(&mut self, envelope: &EventEnvelope) -> Result<()> {
        match &envelope.event {
            Event::StdoutLine(output) | Event::StderrLine(output) => {
                if self.strategy != CohesionStrategy::Buffered {
                    return Ok(());
                }
                if let Some(job_id) = envelope.job_id() {
                    self.buffers
                        .entry(job_id.to_string())
                        .or_default()
                        .push(output.line.clone());
                }
                Ok(())
            }
            Event::JobEnded(ended) => {
                let job_id = envelope
                    .job_id()
                    .unwrap_or(ended.identifier.as_str())
                    .to_string();
                self.on_job_ended(&job_id, ended)
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{JobRef, OutputLine, ReturnCode};
    use crate::handler::LogWriter;

    fn buffered() -> CohesionHandler<Vec<u8>> {
        CohesionHandler::new(
            CohesionStrategy::Buffered,
            "unused",
            OutputEncoding::Utf8,
            Vec::new(),
        )
    }

    fn stdout(job: &JobRef, line: &[u8]) -> EventEnvelope {
        EventEnvelope::for_job(job, Event::StdoutLine(OutputLine::new(line)))
    }

    fn stderr(job: &JobRef, line: &[u8]) -> EventEnvelope {
        EventEnvelope::for_job(job, Event::StderrLine(OutputLine::new(line)))
    }

    fn ended(job: &JobRef, rc: ReturnCode) -> EventEnvelope {
        EventEnvelope::for_job(
            job,
            Event::JobEnded(JobEnded {
                identifier: job.package.clone(),
                rc,
            }),
        )
    }

    fn output(handler: CohesionHandler<Vec<u8>>) -> String {
        String::from_utf8(handler.into_inner()).unwrap()
    }

    #[test]
    fn test_block_contains_lines_in_arrival_order() {
        let mut handler = buffered();
        let job = JobRef::new("pkg_a", "pkg_a");
        handler.handle(&stdout(&job, b"configuring\n")).unwrap();
        handler.handle(&stderr(&job, b"warning: unused\n")).unwrap();
        handler.handle(&stdout(&job, b"done\n")).unwrap();
        handler.handle(&ended(&job, ReturnCode::Exit(0))).unwrap();

        assert_eq!(
            output(handler),
            "--- output: pkg_a\nconfiguring\nwarning: unused\ndone\n---\n"
        );
    }

    #[test]
    fn test_jobs_do_not_interleave() {
        let mut handler = buffered();
        let a = JobRef::new("a", "a");
        let b = JobRef::new("b", "b");
        handler.handle(&stdout(&a, b"a1\n")).unwrap();
        handler.handle(&stdout(&b, b"b1\n")).unwrap();
        handler.handle(&stdout(&a, b"a2\n")).unwrap();
        handler.handle(&ended(&b, ReturnCode::Exit(1))).unwrap();
        handler.handle(&stdout(&a, b"a3\n")).unwrap();
        handler.handle(&ended(&a, ReturnCode::Exit(0))).unwrap();

        assert_eq!(
            output(handler),
            "--- output: b\nb1\n---\n--- output: a\na1\na2\na3\n---\n"
        );
    }

    #[test]
    fn test_multibyte_split_across_lines_decodes_as_whole() {
        let mut handler = buffered();
        let job = JobRef::new("pkg", "pkg");
        let text = "größe\n".as_bytes();
        // Split inside the two-byte 'ö'.
        handler.handle(&stdout(&job, &text[..3])).unwrap();
        handler.handle(&stdout(&job, &text[3..])).unwrap();
        handler.handle(&ended(&job, ReturnCode::Exit(0))).unwrap();
        assert_eq!(output(handler), "--- output: pkg\ngröße\n---\n");
    }

    #[test]
    fn test_interrupted_job_prints_nothing_and_releases_buffer() {
        let mut handler = buffered();
        let job = JobRef::new("pkg", "pkg");
        handler.handle(&stdout(&job, b"partial\n")).unwrap();
        assert_eq!(handler.buffered_jobs(), 1);
        handler.handle(&ended(&job, ReturnCode::Interrupted)).unwrap();
        assert_eq!(handler.buffered_jobs(), 0);
        assert!(output(handler).is_empty());
    }

    #[test]
    fn test_job_without_output_prints_nothing() {
        let mut handler = buffered();
        let job = JobRef::new("quiet", "quiet");
        handler.handle(&ended(&job, ReturnCode::Exit(0))).unwrap();
        assert_eq!(handler.buffered_jobs(), 0);
        assert!(output(handler).is_empty());
    }

    #[test]
    fn test_decode_failure_fails_job_only() {
        let mut handler = buffered();
        let bad = JobRef::new("bad", "bad");
        let good = JobRef::new("good", "good");
        handler.handle(&stdout(&bad, b"\xff\xfe\n")).unwrap();
        handler.handle(&stdout(&good, b"fine\n")).unwrap();

        let err = handler.handle(&ended(&bad, ReturnCode::Exit(0))).unwrap_err();
        assert!(matches!(err, OutputError::Decode { ref job, .. } if job == "bad"));
        assert_eq!(handler.buffered_jobs(), 1);

        handler.handle(&ended(&good, ReturnCode::Exit(0))).unwrap();
        assert_eq!(handler.buffered_jobs(), 0);
        assert_eq!(output(handler), "--- output: good\nfine\n---\n");
    }

    #[test]
    fn test_lossy_encoding_prints_replacement() {
        let mut handler = CohesionHandler::new(
            CohesionStrategy::Buffered,
            "unused",
            OutputEncoding::LossyUtf8,
            Vec::new(),
        );
        let job = JobRef::new("pkg", "pkg");
        handler.handle(&stdout(&job, b"a\xffb\n")).unwrap();
        handler.handle(&ended(&job, ReturnCode::Exit(0))).unwrap();
        assert_eq!(output(handler), "--- output: pkg\na\u{fffd}b\n---\n");
    }

    #[test]
    fn test_log_reread_matches_buffered() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = LogWriter::new(dir.path());
        let mut reread = CohesionHandler::new(
            CohesionStrategy::LogReread,
            dir.path(),
            OutputEncoding::Utf8,
            Vec::new(),
        );
        let mut memory = buffered();
        let job = JobRef::new("pkg", "pkg");
        let events = [
            stdout(&job, b"one\n"),
            stderr(&job, b"two\n"),
            ended(&job, ReturnCode::Exit(0)),
        ];
        for event in &events {
            writer.handle(event).unwrap();
            reread.handle(event).unwrap();
            memory.handle(event).unwrap();
        }
        assert_eq!(reread.buffered_jobs(), 0);
        assert_eq!(output(reread), output(memory));
    }

    #[test]
    fn test_log_reread_missing_log_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let mut handler = CohesionHandler::new(
            CohesionStrategy::LogReread,
            dir.path(),
            OutputEncoding::Utf8,
            Vec::new(),
        );
        let job = JobRef::new("never_logged", "never_logged");
        handler.handle(&ended(&job, ReturnCode::Exit(0))).unwrap();
        assert!(output(handler).is_empty());
    }

    #[test]
    fn test_log_reread_skips_interrupted() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = LogWriter::new(dir.path());
        let mut handler = CohesionHandler::new(
            CohesionStrategy::LogReread,
            dir.path(),
            OutputEncoding::Utf8,
            Vec::new(),
        );
        let job = JobRef::new("pkg", "pkg");
        writer.handle(&stdout(&job, b"partial\n")).unwrap();
        handler.handle(&ended(&job, ReturnCode::Interrupted)).unwrap();
        assert!(output(handler).is_empty());
    }
}
