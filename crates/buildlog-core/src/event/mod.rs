//! Build orchestrator events as seen by the output handlers.
//!
//! The scheduler produces these; the handlers only observe them. Every event
//! travels inside an [`EventEnvelope`] that optionally names the job it
//! belongs to. Job-agnostic events (such as [`Event::ReactorShutdown`]) carry
//! no job.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{OutputError, Result};

pub mod describe;
mod line;

pub use describe::{render_fields, Describe, Field, FieldValue};
use describe::field;

// ============================================================================
// JOBS
// ============================================================================

/// Reference to a job owned by the scheduler.
///
/// `id` is the stable identity for the run and names the job's log directory.
/// `package` is only used for display in the summary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobRef {
    pub id: String,
    pub package: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_type: Option<String>,
}

impl JobRef {
    pub fn new(id: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            package: package.into(),
            package_type: None,
        }
    }

    pub fn with_package_type(mut self, package_type: impl Into<String>) -> Self {
        self.package_type = Some(package_type.into());
        self
    }
}

impl fmt::Display for JobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// How a job ended.
///
/// `Interrupted` is the sentinel for jobs stopped by an external interrupt
/// (serialized as `"SIGINT"`); every other outcome is a numeric exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ReturnCodeRepr", into = "ReturnCodeRepr")]
pub enum ReturnCode {
    Exit(i32),
    Interrupted,
}

const INTERRUPTED_SENTINEL: &str = "SIGINT";

impl ReturnCode {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, ReturnCode::Interrupted)
    }

    /// A non-zero exit code. Interruption is not a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, ReturnCode::Exit(code) if *code != 0)
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnCode::Exit(code) => write!(f, "{code}"),
            ReturnCode::Interrupted => f.write_str(INTERRUPTED_SENTINEL),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ReturnCodeRepr {
    Code(i32),
    Signal(String),
}

impl TryFrom<ReturnCodeRepr> for ReturnCode {
    type Error = String;

    fn try_from(repr: ReturnCodeRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            ReturnCodeRepr::Code(code) => Ok(ReturnCode::Exit(code)),
            ReturnCodeRepr::Signal(s) if s == INTERRUPTED_SENTINEL => Ok(ReturnCode::Interrupted),
            ReturnCodeRepr::Signal(s) => Err(format!("unknown return code sentinel: {s}")),
        }
    }
}

impl From<ReturnCode> for ReturnCodeRepr {
    fn from(rc: ReturnCode) -> Self {
        match rc {
            ReturnCode::Exit(code) => ReturnCodeRepr::Code(code),
            ReturnCode::Interrupted => ReturnCodeRepr::Signal(INTERRUPTED_SENTINEL.to_string()),
        }
    }
}

// ============================================================================
// EVENT TYPES
// ============================================================================

/// Events delivered by the reactor, in delivery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// The job was added to the run
    JobQueued(JobQueued),

    /// The job began executing
    JobStarted(JobStarted),

    /// Free-form progress update from a running job
    JobProgress(JobProgress),

    /// The job finished, was aborted, or failed
    JobEnded(JobEnded),

    /// A job is about to invoke a command
    Command(Command),

    /// One line the job wrote to stdout, as raw bytes
    StdoutLine(OutputLine),

    /// One line the job wrote to stderr, as raw bytes
    StderrLine(OutputLine),

    /// A test inside the job failed
    TestFailure(TestFailure),

    /// Terminal event: no further events follow
    #[serde(rename = "EventReactorShutdown")]
    ReactorShutdown,

    /// An event type the handlers have no dedicated support for
    Extension(ExtensionEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobQueued {
    pub identifier: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStarted {
    pub identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub identifier: String,
    pub progress: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEnded {
    pub identifier: String,
    pub rc: ReturnCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub cmd: Vec<String>,
    pub cwd: String,
    /// Environment variables the job sets on top of the inherited ones
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Command {
    /// Human-readable invocation, e.g. `Invoking command in '/src': A=1 make`.
    pub fn to_line(&self) -> String {
        let mut line = format!("Invoking command in '{}': ", self.cwd);
        for (key, value) in &self.env {
            line.push_str(&format!("{key}={value} "));
        }
        line.push_str(&self.cmd.join(" "));
        line
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    #[serde(with = "line")]
    pub line: Vec<u8>,
}

impl OutputLine {
    pub fn new(line: impl Into<Vec<u8>>) -> Self {
        Self { line: line.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFailure {
    pub identifier: String,
}

/// Opaque event from an orchestrator extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionEvent {
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

// ============================================================================
// ENVELOPE
// ============================================================================

/// An event together with the job it belongs to, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: Event,
    #[serde(default)]
    pub job: Option<JobRef>,
}

impl EventEnvelope {
    pub fn new(event: Event, job: Option<JobRef>) -> Self {
        Self { event, job }
    }

    pub fn for_job(job: &JobRef, event: Event) -> Self {
        Self {
            event,
            job: Some(job.clone()),
        }
    }

    pub fn job_agnostic(event: Event) -> Self {
        Self { event, job: None }
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job.as_ref().map(|job| job.id.as_str())
    }
}

// ============================================================================
// DESCRIBE
// ============================================================================

impl Describe for Event {
    fn kind_name(&self) -> &str {
        match self {
            Event::JobQueued(_) => "JobQueued",
            Event::JobStarted(_) => "JobStarted",
            Event::JobProgress(_) => "JobProgress",
            Event::JobEnded(_) => "JobEnded",
            Event::Command(_) => "Command",
            Event::StdoutLine(_) => "StdoutLine",
            Event::StderrLine(_) => "StderrLine",
            Event::TestFailure(_) => "TestFailure",
            Event::ReactorShutdown => "EventReactorShutdown",
            Event::Extension(ext) => &ext.kind,
        }
    }

    fn describe(&self) -> Result<Vec<Field>> {
        Ok(match self {
            Event::JobQueued(e) => vec![
                field("identifier", &e.identifier),
                field("dependencies", e.dependencies.as_slice()),
            ],
            Event::JobStarted(e) => vec![field("identifier", &e.identifier)],
            Event::JobProgress(e) => vec![
                field("identifier", &e.identifier),
                field("progress", &e.progress),
            ],
            Event::JobEnded(e) => vec![
                field("identifier", &e.identifier),
                match e.rc {
                    ReturnCode::Exit(code) => field("rc", code),
                    ReturnCode::Interrupted => field("rc", INTERRUPTED_SENTINEL),
                },
            ],
            Event::Command(e) => vec![
                field("cmd", e.cmd.as_slice()),
                field("cwd", &e.cwd),
                (
                    "env".to_string(),
                    FieldValue::Map(e.env.iter().map(|(k, v)| field(k, v)).collect()),
                ),
            ],
            Event::StdoutLine(e) | Event::StderrLine(e) => vec![field("line", e.line.as_slice())],
            Event::TestFailure(e) => vec![field("identifier", &e.identifier)],
            Event::ReactorShutdown => Vec::new(),
            Event::Extension(ext) => return ext.describe(),
        })
    }
}

impl Describe for ExtensionEvent {
    fn kind_name(&self) -> &str {
        &self.kind
    }

    /// Object payloads list their members. Payloads recorded as a list of
    /// `[name, value]` pairs are accepted as a second form. Anything else
    /// cannot be described.
    fn describe(&self) -> Result<Vec<Field>> {
        if let Value::Object(map) = &self.payload {
            return Ok(map
                .iter()
                .map(|(k, v)| (k.clone(), FieldValue::from(v)))
                .collect());
        }
        if let Some(pairs) = self.payload.as_array().and_then(|items| as_pairs(items)) {
            return Ok(pairs);
        }
        Err(OutputError::Undescribable {
            kind: self.kind.clone(),
            reason: format!(
                "payload is neither an object nor a list of [name, value] pairs: {}",
                self.payload
            ),
        })
    }
}

fn as_pairs(items: &[Value]) -> Option<Vec<Field>> {
    items
        .iter()
        .map(|item| match item.as_array().map(Vec::as_slice) {
            Some([Value::String(name), value]) => Some((name.clone(), FieldValue::from(value))),
            _ => None,
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_return_code_classification() {
        assert!(!ReturnCode::Exit(0).is_failure());
        assert!(ReturnCode::Exit(2).is_failure());
        assert!(ReturnCode::Interrupted.is_interrupted());
        assert!(!ReturnCode::Interrupted.is_failure());
    }

    #[test]
    fn test_return_code_serialization() {
        assert_eq!(serde_json::to_value(ReturnCode::Exit(3)).unwrap(), json!(3));
        assert_eq!(
            serde_json::to_value(ReturnCode::Interrupted).unwrap(),
            json!("SIGINT")
        );
        let rc: ReturnCode = serde_json::from_value(json!("SIGINT")).unwrap();
        assert_eq!(rc, ReturnCode::Interrupted);
        assert!(serde_json::from_value::<ReturnCode>(json!("SIGTERM")).is_err());
    }

    #[test]
    fn test_envelope_from_json() {
        let raw = r#"{"event":{"type":"StdoutLine","data":{"line":"hello\n"}},"job":{"id":"pkg_a","package":"pkg_a"}}"#;
        let envelope: EventEnvelope = serde_json::from_str(raw).expect("should deserialize");
        assert_eq!(envelope.job_id(), Some("pkg_a"));
        assert_eq!(envelope.event, Event::StdoutLine(OutputLine::new(&b"hello\n"[..])));
    }

    #[test]
    fn test_binary_line_accepts_byte_array() {
        let raw = r#"{"type":"StderrLine","data":{"line":[255,10]}}"#;
        let event: Event = serde_json::from_str(raw).expect("should deserialize");
        assert_eq!(event, Event::StderrLine(OutputLine::new(vec![0xff, b'\n'])));
    }

    #[test]
    fn test_shutdown_is_job_agnostic_unit() {
        let raw = r#"{"event":{"type":"EventReactorShutdown"}}"#;
        let envelope: EventEnvelope = serde_json::from_str(raw).expect("should deserialize");
        assert_eq!(envelope.event, Event::ReactorShutdown);
        assert!(envelope.job.is_none());
    }

    #[test]
    fn test_command_line_rendering() {
        let mut env = BTreeMap::new();
        env.insert("CFLAGS".to_string(), "-O2".to_string());
        let command = Command {
            cmd: vec!["make".to_string(), "install".to_string()],
            cwd: "/ws/build/pkg".to_string(),
            env,
        };
        assert_eq!(
            command.to_line(),
            "Invoking command in '/ws/build/pkg': CFLAGS=-O2 make install"
        );
    }

    #[test]
    fn test_describe_job_ended() {
        let event = Event::JobEnded(JobEnded {
            identifier: "pkg".to_string(),
            rc: ReturnCode::Interrupted,
        });
        let fields = event.describe().unwrap();
        assert_eq!(render_fields(&fields), r#"{identifier: "pkg", rc: "SIGINT"}"#);
    }

    #[test]
    fn test_describe_command_renders_env_map() {
        let mut env = BTreeMap::new();
        env.insert("PATH".to_string(), "/opt/bin".to_string());
        env.insert("CC".to_string(), "clang".to_string());
        let event = Event::Command(Command {
            cmd: vec!["cmake".to_string(), "..".to_string()],
            cwd: "/ws/build/pkg".to_string(),
            env,
        });
        let fields = event.describe().unwrap();
        assert_eq!(
            render_fields(&fields),
            r#"{cmd: ["cmake", ".."], cwd: "/ws/build/pkg", env: {CC: "clang", PATH: "/opt/bin"}}"#
        );
    }

    #[test]
    fn test_describe_extension_pairs_fallback() {
        let ext = ExtensionEvent {
            kind: "Custom".to_string(),
            payload: json!([["b", 1], ["a", "x"]]),
        };
        let fields = ext.describe().unwrap();
        assert_eq!(render_fields(&fields), r#"{b: 1, a: "x"}"#);
    }

    #[test]
    fn test_describe_extension_rejects_scalar() {
        let ext = ExtensionEvent {
            kind: "Custom".to_string(),
            payload: json!(42),
        };
        assert!(matches!(
            ext.describe(),
            Err(OutputError::Undescribable { .. })
        ));
    }
}
