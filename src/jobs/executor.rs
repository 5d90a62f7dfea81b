//! Runs one job specification to completion.
//!
//! The executor decomposes a spec into discrete steps (one per epoch,
//! per model, per test phase, per pipeline stage), delegates each step
//! to the platform, appends progress after every step and polls the
//! cancellation flag before every step. It suspends only at step
//! boundaries and holds no registry lock across an await.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::command::{
    EvalSpec, JobSpec, PipelineSpec, PipelineStep, SpecDefaults, TestSpec, TrainSpec,
};
use crate::platform::{PlatformError, StepRequest, StepRunner};

use super::job::{FailureKind, JobError, JobReport};
use super::registry::JobRegistry;

/// Slice of the 0–100 progress range a step loop reports into.
///
/// Single commands own the whole range; pipeline stage `i` of `k` owns
/// `[i/k*100, (i+1)/k*100)`, which keeps percent strictly increasing
/// across stage boundaries and ending at exactly 100.
#[derive(Debug, Clone, Copy)]
struct Window {
    start: f64,
    end: f64,
}

impl Window {
    const FULL: Window = Window {
        start: 0.0,
        end: 100.0,
    };

    /// Percent after `done` of `total` steps. The last step lands on
    /// `end` exactly, so a completed run always reports 100.
    fn percent(self, done: usize, total: usize) -> f64 {
        let total = total.max(1);
        if done >= total {
            self.end
        } else {
            self.start + (self.end - self.start) * done as f64 / total as f64
        }
    }
}

/// How a step loop ended.
enum StageEnd {
    Done(StageSummary),
    Cancelled,
    Failed(JobError),
}

struct StageSummary {
    summary: String,
    metrics: BTreeMap<String, f64>,
    artifacts: Vec<String>,
}

#[derive(Clone)]
pub struct JobExecutor<P> {
    registry: Arc<JobRegistry>,
    platform: P,
    /// Pipeline stages derive their sub-specs from these defaults.
    defaults: SpecDefaults,
}

impl<P: StepRunner + Clone + Send + Sync + 'static> JobExecutor<P> {
    pub fn new(registry: Arc<JobRegistry>, platform: P, defaults: SpecDefaults) -> Self {
        Self {
            registry,
            platform,
            defaults,
        }
    }

    /// Drive `job_id` from `Pending` to a terminal state. Invoked exactly
    /// once per job, from its own spawned task.
    pub async fn run(&self, job_id: &str) {
        let Some(job) = self.registry.get(job_id) else {
            tracing::warn!(job_id = %job_id, "executor asked to run unknown job");
            return;
        };
        if !self.registry.mark_started(job_id) {
            return;
        }

        let end = match &job.spec {
            JobSpec::Train(spec) => self.run_train(job_id, spec, Window::FULL).await,
            JobSpec::Eval(spec) => self.run_eval(job_id, spec, Window::FULL).await,
            JobSpec::Test(spec) => self.run_test(job_id, spec, Window::FULL).await,
            JobSpec::Pipeline(spec) => self.run_pipeline(job_id, spec).await,
        };

        match end {
            StageEnd::Done(stage) => self.registry.complete(
                job_id,
                JobReport {
                    summary: stage.summary,
                    metrics: stage.metrics,
                    artifacts: stage.artifacts,
                },
            ),
            StageEnd::Cancelled => self.registry.cancel(job_id),
            StageEnd::Failed(error) => self.registry.fail(job_id, error),
        }
    }

    /// One platform call bracketed by the cancellation check and the
    /// progress append. Returns `None` when the loop must stop.
    async fn step(
        &self,
        job_id: &str,
        kind: &'static str,
        index: usize,
        total: usize,
        detail: String,
        window: Window,
    ) -> Result<BTreeMap<String, f64>, StageEnd> {
        if self.registry.cancel_requested(job_id) {
            return Err(StageEnd::Cancelled);
        }

        let request = StepRequest {
            job_id: job_id.to_string(),
            kind,
            step_index: index,
            total_steps: total,
            detail: detail.clone(),
        };
        let metrics = self.platform.run_step(&request).await.map_err(|err| {
            StageEnd::Failed(JobError {
                kind: failure_kind(&err),
                message: err.to_string(),
                failed_step: Some(detail.clone()),
            })
        })?;

        self.registry
            .append_progress(job_id, window.percent(index + 1, total), detail);
        Ok(metrics)
    }

    async fn run_train(&self, job_id: &str, spec: &TrainSpec, window: Window) -> StageEnd {
        let total = spec.epochs as usize;
        let mut last = BTreeMap::new();

        for index in 0..total {
            let detail = format!("epoch {}/{total}", index + 1);
            match self.step(job_id, "train", index, total, detail, window).await {
                Ok(metrics) => last = metrics,
                Err(end) => return end,
            }
        }

        let mut metrics = BTreeMap::new();
        metrics.insert("epochs".to_string(), f64::from(spec.epochs));
        metrics.insert("learning_rate".to_string(), spec.learning_rate);
        if let Some(loss) = last.get("loss") {
            metrics.insert("final_loss".to_string(), *loss);
        }
        if let Some(accuracy) = last.get("accuracy") {
            metrics.insert("accuracy".to_string(), *accuracy);
        }

        StageEnd::Done(StageSummary {
            summary: format!(
                "trained config `{}` for {} epochs",
                spec.config_name, spec.epochs
            ),
            metrics,
            artifacts: vec!["model.bin".to_string(), "training_log.txt".to_string()],
        })
    }

    async fn run_eval(&self, job_id: &str, spec: &EvalSpec, window: Window) -> StageEnd {
        let total = spec.models.len();
        let mut metrics = BTreeMap::new();
        let mut best: Option<(String, f64)> = None;

        for (index, model) in spec.models.iter().enumerate() {
            let detail = format!("evaluating `{model}`");
            let measured = match self.step(job_id, "eval", index, total, detail, window).await {
                Ok(measured) => measured,
                Err(end) => return end,
            };

            let score = measured.get("score").copied().unwrap_or(0.0);
            for metric in &spec.metrics {
                metrics.insert(format!("{model}.{metric}"), score);
            }
            if best.as_ref().is_none_or(|(_, top)| score > *top) {
                best = Some((model.clone(), score));
            }
        }

        let summary = match &best {
            Some((model, score)) => format!(
                "evaluated {} model(s) on {} metric(s); best: `{model}` ({score:.3})",
                spec.models.len(),
                spec.metrics.len()
            ),
            None => "evaluated 0 models".to_string(),
        };

        StageEnd::Done(StageSummary {
            summary,
            metrics,
            artifacts: vec!["eval_report.json".to_string()],
        })
    }

    async fn run_test(&self, job_id: &str, spec: &TestSpec, window: Window) -> StageEnd {
        let phases = [
            format!("preparing {} test environment", spec.test_type),
            format!(
                "running {} suite over {} samples",
                spec.test_type, spec.sample_count
            ),
            "collecting results".to_string(),
        ];
        let total = phases.len();

        for (index, detail) in phases.into_iter().enumerate() {
            if let Err(end) = self.step(job_id, "test", index, total, detail, window).await {
                return end;
            }
        }

        // The simulator passes every sample; failure paths are exercised
        // through the platform error channel instead.
        let passed = f64::from(spec.sample_count);
        let mut metrics = BTreeMap::new();
        metrics.insert("tests_passed".to_string(), passed);
        metrics.insert("tests_failed".to_string(), 0.0);
        metrics.insert("samples".to_string(), f64::from(spec.sample_count));

        StageEnd::Done(StageSummary {
            summary: format!(
                "{}/{} samples passed ({} suite)",
                spec.sample_count, spec.sample_count, spec.test_type
            ),
            metrics,
            artifacts: vec!["test_report.xml".to_string()],
        })
    }

    /// Model-validation stage: compare the reference artifact against
    /// the candidate and report compatibility.
    async fn run_validate(&self, job_id: &str, window: Window) -> StageEnd {
        let phases = [
            "fetching reference artifact".to_string(),
            "comparing configurations".to_string(),
        ];
        let total = phases.len();
        let mut last = BTreeMap::new();

        for (index, detail) in phases.into_iter().enumerate() {
            match self
                .step(job_id, "validate", index, total, detail, window)
                .await
            {
                Ok(metrics) => last = metrics,
                Err(end) => return end,
            }
        }

        let compatible = last.get("compatible").copied().unwrap_or(1.0);
        let mut metrics = BTreeMap::new();
        metrics.insert("compatible".to_string(), compatible);

        StageEnd::Done(StageSummary {
            summary: "reference and candidate configurations are compatible".to_string(),
            metrics,
            artifacts: vec!["model_card.md".to_string()],
        })
    }

    /// A pipeline composes the single-command loops, one window per
    /// stage. The first failing stage fails the whole pipeline and
    /// records which stage it was; later stages never run.
    async fn run_pipeline(&self, job_id: &str, spec: &PipelineSpec) -> StageEnd {
        let stage_count = spec.steps.len();
        let mut metrics = BTreeMap::new();
        let mut artifacts = Vec::new();
        let mut completed = Vec::new();

        for (index, stage) in spec.steps.iter().enumerate() {
            let window = Window {
                start: 100.0 * index as f64 / stage_count as f64,
                end: 100.0 * (index + 1) as f64 / stage_count as f64,
            };

            let end = match stage {
                PipelineStep::Train => {
                    self.run_train(job_id, &self.stage_train_spec(), window).await
                }
                PipelineStep::Eval => {
                    self.run_eval(job_id, &self.stage_eval_spec(), window).await
                }
                PipelineStep::Test => {
                    self.run_test(job_id, &self.stage_test_spec(), window).await
                }
                PipelineStep::Validate => self.run_validate(job_id, window).await,
            };

            match end {
                StageEnd::Done(stage_summary) => {
                    for (key, value) in stage_summary.metrics {
                        metrics.insert(format!("{stage}.{key}"), value);
                    }
                    artifacts.extend(stage_summary.artifacts);
                    completed.push(stage.to_string());
                }
                StageEnd::Cancelled => return StageEnd::Cancelled,
                StageEnd::Failed(mut error) => {
                    error.failed_step = Some(stage.to_string());
                    return StageEnd::Failed(error);
                }
            }
        }

        metrics.insert("steps_completed".to_string(), completed.len() as f64);
        StageEnd::Done(StageSummary {
            summary: format!("pipeline completed: {}", completed.join(" → ")),
            metrics,
            artifacts,
        })
    }

    fn stage_train_spec(&self) -> TrainSpec {
        TrainSpec {
            epochs: self.defaults.epochs,
            learning_rate: self.defaults.learning_rate,
            gpu_count: 0,
            config_name: "default".to_string(),
        }
    }

    fn stage_eval_spec(&self) -> EvalSpec {
        EvalSpec {
            models: vec!["baseline".to_string(), "candidate".to_string()],
            metrics: vec!["accuracy".to_string()],
        }
    }

    fn stage_test_spec(&self) -> TestSpec {
        TestSpec {
            test_type: crate::command::TestType::Smoke,
            sample_count: self.defaults.sample_count,
        }
    }
}

fn failure_kind(err: &PlatformError) -> FailureKind {
    match err {
        PlatformError::Unavailable(_) => FailureKind::Dependency,
        PlatformError::Step(_) => FailureKind::Execution,
    }
}
