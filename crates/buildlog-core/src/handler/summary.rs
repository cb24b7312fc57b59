//! End-of-run summary.
//!
//! Jobs are sorted into outcome sets while the run progresses. When the
//! reactor shuts down the sets are printed once:
//!
//! ```text
//!
//! Summary: 1 package finished [3.42s]
//!   1 package failed: pkg_c
//!   1 package aborted: pkg_b
//!   1 package had stderr output: pkg_c
//! ```

use std::collections::BTreeMap;
use std::io::{self, Stdout, Write};
use std::time::{Duration, Instant};

use crate::error::{OutputError, Result};
use crate::event::{Event, EventEnvelope, JobRef};
use crate::handler::{priority, EventHandler};
use crate::obs;
use crate::style::{Painter, Severity};

/// A set of jobs, keyed by job id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeSet {
    jobs: BTreeMap<String, String>,
}

impl OutcomeSet {
    pub fn insert(&mut self, job: &JobRef) {
        self.jobs.insert(job.id.clone(), job.package.clone());
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.jobs.contains_key(job_id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn job_ids(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(String::as_str)
    }

    /// Members of `self` that are in none of `others`.
    pub fn without(&self, others: &[&OutcomeSet]) -> OutcomeSet {
        OutcomeSet {
            jobs: self
                .jobs
                .iter()
                .filter(|(id, _)| !others.iter().any(|o| o.contains(id)))
                .map(|(id, pkg)| (id.clone(), pkg.clone()))
                .collect(),
        }
    }

    /// Sorted package names joined by single spaces.
    pub fn package_names(&self) -> String {
        let mut names: Vec<&str> = self.jobs.values().map(String::as_str).collect();
        names.sort_unstable();
        names.join(" ")
    }
}

/// Classification of every job seen during the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcomes {
    pub queued: OutcomeSet,
    pub ended: OutcomeSet,
    pub failed: OutcomeSet,
    pub interrupted: OutcomeSet,
    pub with_stderr: OutcomeSet,
    pub with_test_failures: OutcomeSet,
}

impl Outcomes {
    /// Ended jobs that neither failed nor were interrupted.
    pub fn finished(&self) -> OutcomeSet {
        self.ended.without(&[&self.failed, &self.interrupted])
    }

    /// Queued jobs that never ended.
    pub fn not_processed(&self) -> OutcomeSet {
        self.queued.without(&[&self.ended])
    }

    pub fn record(&mut self, envelope: &EventEnvelope) {
        let Some(job) = &envelope.job else {
            return;
        };
        match &envelope.event {
            Event::JobQueued(_) => self.queued.insert(job),
            Event::StderrLine(_) => self.with_stderr.insert(job),
            Event::TestFailure(_) => self.with_test_failures.insert(job),
            Event::JobEnded(ended) => {
                self.ended.insert(job);
                if ended.rc.is_interrupted() {
                    self.interrupted.insert(job);
                } else if ended.rc.is_failure() {
                    self.failed.insert(job);
                }
            }
            _ => {}
        }
    }
}

fn package_count(count: usize) -> String {
    let suffix = if count == 1 { "" } else { "s" };
    format!("{count} package{suffix}")
}

/// Render the summary block, including the leading blank separator line.
pub fn render_summary(outcomes: &Outcomes, duration: Duration, painter: &Painter) -> String {
    let mut lines = vec![String::new()];

    lines.push(painter.paint(
        Severity::Neutral,
        &format!(
            "Summary: {} finished [{:.2}s]",
            package_count(outcomes.finished().len()),
            duration.as_secs_f64()
        ),
    ));

    let listed = [
        (&outcomes.failed, "failed", Severity::Alert),
        (&outcomes.interrupted, "aborted", Severity::Alert),
        (&outcomes.with_stderr, "had stderr output", Severity::Warning),
        (&outcomes.with_test_failures, "had test failures", Severity::Warning),
    ];
    for (set, label, severity) in listed {
        if set.is_empty() {
            continue;
        }
        let text = format!(
            "  {} {label}: {}",
            package_count(set.len()),
            set.package_names()
        );
        lines.push(painter.paint(severity, &text));
    }

    if outcomes.queued.len() > outcomes.ended.len() {
        let text = format!(
            "  {} not processed",
            package_count(outcomes.not_processed().len())
        );
        lines.push(painter.paint(Severity::Muted, &text));
    }

    let mut block = lines.join("\n");
    block.push('\n');
    block
}

pub struct SummaryHandler<W: Write = Stdout> {
    outcomes: Outcomes,
    start: Instant,
    painter: Painter,
    rendered: bool,
    out: W,
}

impl SummaryHandler<Stdout> {
    pub fn stdout(painter: Painter) -> Self {
        Self::new(painter, io::stdout())
    }
}

impl<W: Write> SummaryHandler<W> {
    pub fn new(painter: Painter, out: W) -> Self {
        Self {
            outcomes: Outcomes::default(),
            start: Instant::now(),
            painter,
            rendered: false,
            out,
        }
    }

    pub fn outcomes(&self) -> &Outcomes {
        &self.outcomes
    }

    pub fn is_rendered(&self) -> bool {
        self.rendered
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn print_summary(&mut self) -> Result<()> {
        self.rendered = true;
        let duration = self.start.elapsed();
        let block = render_summary(&self.outcomes, duration, &self.painter);
        self.out
            .write_all(block.as_bytes())
            .and_then(|()| self.out.flush())
            .map_err(OutputError::Console)?;
        obs::emit_summary_rendered(
            self.outcomes.finished().len(),
            self.outcomes.failed.len(),
            self.outcomes.interrupted.len(),
            duration.as_secs_f64(),
        );
        Ok(())
    }
}

impl<W: Write> EventHandler for SummaryHandler<W> {
    fn name(&self) -> &'static str {
        "summary"
    }

    fn priority(&self) -> u32 {
        priority::SUMMARY
    }

    fn handle(&mut self, envelope: &EventEnvelope) -> Result<()> {
        if self.rendered {
            return Ok(());
        }
        if matches!(envelope.event, Event::ReactorShutdown) {
            return self.print_summary();
        }
        self.outcomes.record(envelope);
        Ok(())
    }
}
