//! The simulated ML platform the executor delegates its work to.
//!
//! [`StepRunner`] is the seam between the job engine and the platform:
//! one call per discrete unit of work, returning the measurements that
//! step produced. The shipped [`SimPlatform`] sleeps for a bounded,
//! configured duration and returns deterministic numbers so runs are
//! reproducible; tests swap in doubles that fail or block on demand.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;

#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    #[error("platform dependency unavailable: {0}")]
    Unavailable(String),

    #[error("step execution failed: {0}")]
    Step(String),
}

/// Measurements produced by one simulated step.
pub type StepMetrics = BTreeMap<String, f64>;

/// One unit of simulated work.
#[derive(Debug, Clone)]
pub struct StepRequest {
    pub job_id: String,
    /// Which single-command logic is running: train, eval, test or
    /// validate. Pipelines issue requests under their stage's kind.
    pub kind: &'static str,
    /// 0-based index of this step.
    pub step_index: usize,
    pub total_steps: usize,
    /// Human-readable step label, e.g. `epoch 3/5`.
    pub detail: String,
}

pub trait StepRunner: Send + Sync {
    /// Perform one unit of work. Must not block the executor beyond the
    /// step itself; cancellation is only observed between calls.
    fn run_step(
        &self,
        req: &StepRequest,
    ) -> impl Future<Output = Result<StepMetrics, PlatformError>> + Send;
}

/// Deterministic in-process platform simulator.
#[derive(Debug, Clone)]
pub struct SimPlatform {
    step_delay: Duration,
}

impl SimPlatform {
    pub fn new(step_delay: Duration) -> Self {
        Self { step_delay }
    }
}

impl StepRunner for SimPlatform {
    async fn run_step(&self, req: &StepRequest) -> Result<StepMetrics, PlatformError> {
        sleep(self.step_delay).await;

        let done = (req.step_index + 1) as f64;
        let total = req.total_steps.max(1) as f64;

        let mut metrics = StepMetrics::new();
        match req.kind {
            "train" => {
                // Loss decays, accuracy climbs with each epoch.
                metrics.insert("loss".into(), 1.0 / (done + 1.0));
                metrics.insert("accuracy".into(), 0.80 + 0.15 * done / total);
            }
            "eval" => {
                metrics.insert("score".into(), 0.90 + 0.01 * req.step_index as f64);
            }
            "test" => {
                metrics.insert("batch_ms".into(), 42.0);
            }
            "validate" => {
                metrics.insert("compatible".into(), 1.0);
            }
            _ => {}
        }
        Ok(metrics)
    }
}
