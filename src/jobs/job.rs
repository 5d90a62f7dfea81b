use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::command::JobSpec;

/// Lifecycle state of a job.
///
/// `Pending → Running → {Succeeded, Failed, Cancelled}`; the three
/// right-hand states are terminal and absorb all further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Cancelled
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        };
        write!(f, "{name}")
    }
}

/// One appended progress record. `percent` is strictly increasing over a
/// job's lifetime and reaches 100 exactly when the last step completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub timestamp: DateTime<Utc>,
    pub percent: f64,
    pub message: String,
}

/// Final payload of a succeeded job: human summary plus the metrics and
/// artifact names the simulated platform produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub summary: String,
    pub metrics: BTreeMap<String, f64>,
    pub artifacts: Vec<String>,
}

/// Distinguishes a failing simulated dependency from a failure inside
/// the job's own step logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Dependency,
    Execution,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Dependency => write!(f, "dependency"),
            FailureKind::Execution => write!(f, "execution"),
        }
    }
}

/// Structured failure descriptor recorded on a `Failed` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: FailureKind,
    pub message: String,
    /// The step that was executing when the failure happened, when known
    /// (for pipelines, the failing stage).
    pub failed_step: Option<String>,
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.failed_step {
            Some(step) => write!(f, "{} failure in `{step}`: {}", self.kind, self.message),
            None => write!(f, "{} failure: {}", self.kind, self.message),
        }
    }
}

/// A tracked asynchronous execution of one validated command.
///
/// Owned exclusively by the registry; everything handed out is a
/// snapshot clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub spec: JobSpec,
    pub requester: String,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Append-only progress history.
    pub progress: Vec<ProgressEvent>,
    /// Present only in `Succeeded`.
    pub result: Option<JobReport>,
    /// Present only in `Failed`.
    pub error: Option<JobError>,
    /// Monotonic: once true, stays true.
    pub cancel_requested: bool,
}

impl Job {
    pub fn new(spec: JobSpec, requester: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            spec,
            requester: requester.into(),
            state: JobState::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            progress: Vec::new(),
            result: None,
            error: None,
            cancel_requested: false,
        }
    }

    pub fn latest_progress(&self) -> Option<&ProgressEvent> {
        self.progress.last()
    }

    pub(crate) fn mark_started(&mut self) {
        self.state = JobState::Running;
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn mark_succeeded(&mut self, report: JobReport) {
        self.state = JobState::Succeeded;
        self.finished_at = Some(Utc::now());
        self.result = Some(report);
    }

    pub(crate) fn mark_failed(&mut self, error: JobError) {
        self.state = JobState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.state = JobState::Cancelled;
        self.finished_at = Some(Utc::now());
    }
}

/// What observers receive: every progress append in order, then exactly
/// one terminal event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Progress(ProgressEvent),
    Finished {
        state: JobState,
        result: Option<JobReport>,
        error: Option<JobError>,
    },
}
