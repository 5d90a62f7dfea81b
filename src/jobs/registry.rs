//! The authoritative in-memory job table.
//!
//! [`JobRegistry`] is the single owner of every [`Job`] record. It is
//! constructed once at startup and shared via `Arc`; all mutation goes
//! through its methods, under one process-wide mutex with short critical
//! sections and never across an await point. Progress appends and
//! terminal transitions are mirrored onto a per-job broadcast channel so
//! observers see events in exactly the order they were recorded.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use tokio::sync::broadcast;

use super::job::{Job, JobError, JobEvent, JobReport, JobState, ProgressEvent};
use super::stream::JobStream;
use crate::command::JobSpec;

struct JobEntry {
    job: Job,
    events: broadcast::Sender<JobEvent>,
}

struct Inner {
    jobs: HashMap<String, JobEntry>,
    /// Job ids in creation order, the order `list` reports.
    order: Vec<String>,
}

pub struct JobRegistry {
    inner: Mutex<Inner>,
    event_capacity: usize,
    max_finished: usize,
}

impl JobRegistry {
    /// `event_capacity` sizes each job's broadcast buffer; an observer
    /// that falls further behind than that starts losing events
    /// (best-effort delivery). `max_finished` caps how many terminal
    /// jobs are retained before the oldest are evicted.
    pub fn new(event_capacity: usize, max_finished: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                jobs: HashMap::new(),
                order: Vec::new(),
            }),
            event_capacity: event_capacity.max(1),
            max_finished: max_finished.max(1),
        }
    }

    /// Register a new `Pending` job. Does not schedule execution —
    /// that is the caller's responsibility, which keeps creation
    /// testable without a runtime.
    pub fn create(&self, spec: JobSpec, requester: impl Into<String>) -> Job {
        let job = Job::new(spec, requester);
        let (events, _) = broadcast::channel(self.event_capacity);

        let mut inner = self.lock();
        inner.order.push(job.id.clone());
        inner.jobs.insert(
            job.id.clone(),
            JobEntry {
                job: job.clone(),
                events,
            },
        );
        tracing::info!(job_id = %job.id, kind = job.spec.kind(), "job created");
        job
    }

    /// Snapshot of a job, or `None` for an unknown id.
    pub fn get(&self, id: &str) -> Option<Job> {
        self.lock().jobs.get(id).map(|entry| entry.job.clone())
    }

    /// Snapshots of all jobs in creation order, optionally filtered by
    /// state.
    pub fn list(&self, filter: Option<JobState>) -> Vec<Job> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|id| inner.jobs.get(id))
            .map(|entry| entry.job.clone())
            .filter(|job| filter.is_none_or(|state| job.state == state))
            .collect()
    }

    /// Jobs that are still `Pending` or `Running`.
    pub fn active(&self) -> Vec<Job> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|id| inner.jobs.get(id))
            .map(|entry| entry.job.clone())
            .filter(|job| !job.state.is_terminal())
            .collect()
    }

    /// `Pending → Running`, recording `started_at`. Any other starting
    /// state is a lifecycle violation: logged, not propagated.
    pub fn mark_started(&self, id: &str) -> bool {
        let mut inner = self.lock();
        let Some(entry) = inner.jobs.get_mut(id) else {
            return false;
        };
        if entry.job.state != JobState::Pending {
            tracing::warn!(job_id = %id, state = %entry.job.state, "start on non-pending job ignored");
            return false;
        }
        entry.job.mark_started();
        tracing::info!(job_id = %id, "job running");
        true
    }

    /// Append a progress record and publish it to observers.
    ///
    /// Valid only while `Running`. A late append racing a concurrent
    /// cancellation is benign and is logged and dropped.
    pub fn append_progress(&self, id: &str, percent: f64, message: impl Into<String>) {
        let mut inner = self.lock();
        let Some(entry) = inner.jobs.get_mut(id) else {
            tracing::warn!(job_id = %id, "progress append on unknown job ignored");
            return;
        };
        if entry.job.state != JobState::Running {
            tracing::warn!(job_id = %id, state = %entry.job.state, "progress append on non-running job ignored");
            return;
        }
        let event = ProgressEvent {
            timestamp: Utc::now(),
            percent,
            message: message.into(),
        };
        entry.job.progress.push(event.clone());
        // SendError only means there are zero observers right now.
        let _ = entry.events.send(JobEvent::Progress(event));
    }

    /// Record a cancellation request. Fire-and-forget and idempotent:
    /// the flag is monotonic and a terminal job is left untouched.
    /// Returns `false` only for an unknown id.
    pub fn request_cancel(&self, id: &str) -> bool {
        let mut inner = self.lock();
        let Some(entry) = inner.jobs.get_mut(id) else {
            return false;
        };
        if entry.job.state.is_terminal() {
            return true;
        }
        if !entry.job.cancel_requested {
            entry.job.cancel_requested = true;
            tracing::info!(job_id = %id, "cancellation requested");
        }
        true
    }

    /// Whether cancellation has been requested — the executor polls this
    /// at every step boundary.
    pub fn cancel_requested(&self, id: &str) -> bool {
        self.lock()
            .jobs
            .get(id)
            .map(|entry| entry.job.cancel_requested)
            .unwrap_or(false)
    }

    /// `Running → Succeeded`, exactly once.
    pub fn complete(&self, id: &str, report: JobReport) {
        self.finish(id, |job| job.mark_succeeded(report));
    }

    /// `Running → Failed`, exactly once.
    pub fn fail(&self, id: &str, error: JobError) {
        tracing::warn!(job_id = %id, error = %error, "job failed");
        self.finish(id, |job| job.mark_failed(error));
    }

    /// `Running → Cancelled`, called by the executor once it has
    /// observed the cancellation flag at a step boundary.
    pub fn cancel(&self, id: &str) {
        self.finish(id, Job::mark_cancelled);
    }

    fn finish(&self, id: &str, transition: impl FnOnce(&mut Job)) {
        let mut inner = self.lock();
        let Some(entry) = inner.jobs.get_mut(id) else {
            tracing::warn!(job_id = %id, "terminal transition on unknown job ignored");
            return;
        };
        if entry.job.state.is_terminal() {
            // Duplicate completion events are expected in cancellation
            // races; first writer wins.
            tracing::debug!(job_id = %id, state = %entry.job.state, "duplicate terminal transition ignored");
            return;
        }
        if entry.job.state != JobState::Running {
            tracing::warn!(job_id = %id, state = %entry.job.state, "terminal transition on non-running job ignored");
            return;
        }
        transition(&mut entry.job);
        tracing::info!(job_id = %id, state = %entry.job.state, "job finished");
        let _ = entry.events.send(JobEvent::Finished {
            state: entry.job.state,
            result: entry.job.result.clone(),
            error: entry.job.error.clone(),
        });
        Self::evict_finished(&mut inner, self.max_finished);
    }

    /// Attach an observer to a job. For a live job the stream replays
    /// the recorded history and then follows the broadcast channel; for
    /// a terminal job it replays history plus the terminal event and
    /// closes. History snapshot and channel subscription happen under
    /// the same lock acquisition, so no event is missed or duplicated.
    pub fn subscribe(&self, id: &str) -> Option<JobStream> {
        let inner = self.lock();
        let entry = inner.jobs.get(id)?;

        let mut history: Vec<JobEvent> = entry
            .job
            .progress
            .iter()
            .cloned()
            .map(JobEvent::Progress)
            .collect();

        let live = if entry.job.state.is_terminal() {
            history.push(JobEvent::Finished {
                state: entry.job.state,
                result: entry.job.result.clone(),
                error: entry.job.error.clone(),
            });
            None
        } else {
            Some(entry.events.subscribe())
        };

        Some(JobStream::new(history, live))
    }

    /// Drop the oldest terminal jobs beyond the retention cap. Live jobs
    /// are never evicted.
    fn evict_finished(inner: &mut Inner, max_finished: usize) {
        let Inner { jobs, order } = inner;
        let finished = order
            .iter()
            .filter(|id| jobs.get(*id).is_some_and(|entry| entry.job.state.is_terminal()))
            .count();
        if finished <= max_finished {
            return;
        }

        let mut to_evict = finished - max_finished;
        order.retain(|id| {
            if to_evict == 0 {
                return true;
            }
            let terminal = jobs
                .get(id)
                .is_some_and(|entry| entry.job.state.is_terminal());
            if terminal {
                tracing::debug!(job_id = %id, "evicting finished job past retention cap");
                jobs.remove(id);
                to_evict -= 1;
                false
            } else {
                true
            }
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Registry methods never panic while holding the lock, so a
        // poisoned mutex can only follow a panicking test harness.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
