//! Front door of the bot: one entry point per review-thread comment.
//!
//! [`JobManager`] owns the registry and an executor handle. `submit`
//! interprets raw comment text and either answers immediately (help,
//! status, rejection hints) or registers a job and spawns its executor
//! task, returning the `Pending` snapshot without waiting for the run.

use std::sync::Arc;

use crate::command::{CommandName, JobSpec, SpecDefaults, help_text, parse};
use crate::error::BotError;
use crate::jobs::{Job, JobExecutor, JobRegistry, JobState, JobStream};
use crate::platform::StepRunner;

/// What a submitted comment produced.
///
/// The three message variants carry markdown ready to post back to the
/// review thread.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// A job was registered and its execution spawned.
    Submitted { job: Job },
    Help(String),
    Status(String),
    /// The text was not a recognized command; the hint quotes it and
    /// appends the command overview.
    Rejected(String),
}

pub struct JobManager<P> {
    registry: Arc<JobRegistry>,
    executor: JobExecutor<P>,
    defaults: SpecDefaults,
}

impl<P: StepRunner + Clone + Send + Sync + 'static> JobManager<P> {
    pub fn new(registry: Arc<JobRegistry>, platform: P, defaults: SpecDefaults) -> Self {
        let executor = JobExecutor::new(registry.clone(), platform, defaults.clone());
        Self {
            registry,
            executor,
            defaults,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Interpret one comment.
    ///
    /// Unrecognized text is answered with a hint, never an error; the
    /// only `Err` is a validation failure on a job command, in which
    /// case no job is created.
    pub fn submit(&self, raw_text: &str, requester: &str) -> Result<CommandOutcome, BotError> {
        let command = parse(raw_text);
        tracing::debug!(name = %command.name, requester, "command received");

        match command.name {
            CommandName::Unknown => Ok(CommandOutcome::Rejected(format!(
                "Unrecognized command: `{}`\n\n{}",
                command.raw_text.trim(),
                help_text(None)
            ))),
            CommandName::Help => {
                let target = command.flags.iter().find_map(|word| CommandName::from_word(word));
                Ok(CommandOutcome::Help(help_text(target)))
            }
            CommandName::Status => Ok(CommandOutcome::Status(
                self.status_report(command.option("job")),
            )),
            _ => {
                let spec = JobSpec::from_command(&command, &self.defaults)?;
                let job = self.registry.create(spec, requester);

                let executor = self.executor.clone();
                let id = job.id.clone();
                tokio::spawn(async move { executor.run(&id).await });

                Ok(CommandOutcome::Submitted { job })
            }
        }
    }

    /// Request cancellation of a job. Fire-and-forget: the run winds
    /// down at its next step boundary.
    pub fn cancel(&self, id: &str) -> Result<(), BotError> {
        if self.registry.request_cancel(id) {
            Ok(())
        } else {
            Err(BotError::JobNotFound(id.to_string()))
        }
    }

    /// Attach a progress stream to a job.
    pub fn subscribe(&self, id: &str) -> Result<JobStream, BotError> {
        self.registry
            .subscribe(id)
            .ok_or_else(|| BotError::JobNotFound(id.to_string()))
    }

    /// Markdown status report: one job when `job_id` is given, otherwise
    /// every active job.
    pub fn status_report(&self, job_id: Option<&str>) -> String {
        match job_id {
            Some(id) => match self.registry.get(id) {
                Some(job) => format_job_status(&job),
                None => format!("Job `{id}` not found."),
            },
            None => {
                let active = self.registry.active();
                if active.is_empty() {
                    return "No active jobs.".to_string();
                }
                let mut out = String::from("**Active Jobs:**\n");
                for job in &active {
                    let percent = job.latest_progress().map_or(0.0, |p| p.percent);
                    out.push_str(&format!(
                        "- `{}` {} {} {} {:.0}%\n",
                        job.id,
                        job.spec.kind(),
                        state_emoji(job.state),
                        progress_bar(percent),
                        percent,
                    ));
                }
                out
            }
        }
    }
}

fn format_job_status(job: &Job) -> String {
    let mut out = format!(
        "**Job `{}`** ({})\n\nStatus: {} {}\n",
        job.id,
        job.spec.kind(),
        state_emoji(job.state),
        job.state,
    );
    if let Some(progress) = job.latest_progress() {
        out.push_str(&format!(
            "Progress: {} {:.0}% — {}\n",
            progress_bar(progress.percent),
            progress.percent,
            progress.message,
        ));
    }
    if let Some(report) = &job.result {
        out.push_str(&format!("Result: {}\n", report.summary));
    }
    if let Some(error) = &job.error {
        out.push_str(&format!("Error: {error}\n"));
    }
    out
}

fn state_emoji(state: JobState) -> &'static str {
    match state {
        JobState::Pending => "⏳",
        JobState::Running => "🔄",
        JobState::Succeeded => "✅",
        JobState::Failed => "❌",
        JobState::Cancelled => "🚫",
    }
}

/// Ten-slot unicode progress bar, e.g. `[█████░░░░░]` at 50%.
fn progress_bar(percent: f64) -> String {
    let filled = ((percent / 10.0).round() as usize).min(10);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(10 - filled))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::jobs::JobEvent;
    use crate::platform::SimPlatform;

    fn manager() -> JobManager<SimPlatform> {
        JobManager::new(
            Arc::new(JobRegistry::new(64, 100)),
            SimPlatform::new(Duration::ZERO),
            SpecDefaults::default(),
        )
    }

    #[tokio::test]
    async fn unknown_command_gets_a_hint_and_no_job() {
        let mgr = manager();
        let outcome = mgr.submit("deploy the model please", "alice").unwrap();
        match outcome {
            CommandOutcome::Rejected(hint) => {
                assert!(hint.contains("`deploy the model please`"));
                assert!(hint.contains("**Available Commands:**"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert!(mgr.registry().list(None).is_empty());
    }

    #[tokio::test]
    async fn help_without_target_is_the_overview() {
        let outcome = manager().submit("/help", "alice").unwrap();
        assert!(matches!(
            outcome,
            CommandOutcome::Help(text) if text.contains("**Available Commands:**")
        ));
    }

    #[tokio::test]
    async fn help_with_target_is_scoped() {
        let outcome = manager().submit("/help train", "alice").unwrap();
        assert!(matches!(
            outcome,
            CommandOutcome::Help(text) if text.contains("**Train Command Usage:**")
        ));
    }

    #[tokio::test]
    async fn validation_failure_creates_no_job() {
        let mgr = manager();
        let err = mgr.submit("/train --epochs=0", "alice").unwrap_err();
        assert!(matches!(err, BotError::Validation(_)));
        assert!(mgr.registry().list(None).is_empty());
    }

    #[tokio::test]
    async fn submitted_job_runs_to_completion() {
        let mgr = manager();
        let outcome = mgr.submit("/test --type=smoke --samples=5", "alice").unwrap();
        let CommandOutcome::Submitted { job } = outcome else {
            panic!("expected submission");
        };
        assert_eq!(job.state, JobState::Pending);

        let events = mgr.subscribe(&job.id).unwrap().collect().await;
        assert!(matches!(
            events.last(),
            Some(JobEvent::Finished {
                state: JobState::Succeeded,
                ..
            })
        ));

        let finished = mgr.registry().get(&job.id).unwrap();
        let report = finished.result.unwrap();
        assert_eq!(
            report.metrics["tests_passed"] + report.metrics["tests_failed"],
            5.0
        );
    }

    #[tokio::test]
    async fn status_of_unknown_job() {
        assert_eq!(
            manager().status_report(Some("zzz")),
            "Job `zzz` not found."
        );
    }

    #[tokio::test]
    async fn status_with_no_jobs() {
        let outcome = manager().submit("/status", "alice").unwrap();
        assert_eq!(outcome, CommandOutcome::Status("No active jobs.".into()));
    }

    #[tokio::test]
    async fn status_report_shows_progress_and_result() {
        let mgr = manager();
        let CommandOutcome::Submitted { job } =
            mgr.submit("/train --epochs=2", "alice").unwrap()
        else {
            panic!("expected submission");
        };
        mgr.subscribe(&job.id).unwrap().collect().await;

        let report = mgr.status_report(Some(&job.id));
        assert!(report.contains(&format!("**Job `{}`** (train)", job.id)));
        assert!(report.contains("✅ succeeded"));
        assert!(report.contains("[██████████] 100%"));
        assert!(report.contains("Result: trained config `default` for 2 epochs"));
    }

    #[tokio::test]
    async fn cancel_unknown_job_is_an_error() {
        assert!(matches!(
            manager().cancel("missing"),
            Err(BotError::JobNotFound(_))
        ));
    }

    #[test]
    fn progress_bar_rendering() {
        assert_eq!(progress_bar(0.0), "[░░░░░░░░░░]");
        assert_eq!(progress_bar(50.0), "[█████░░░░░]");
        assert_eq!(progress_bar(100.0), "[██████████]");
    }
}
