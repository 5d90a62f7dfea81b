//! Job lifecycle engine: registry, executor and progress streaming.

mod executor;
mod job;
mod registry;
mod stream;

pub use executor::JobExecutor;
pub use job::{FailureKind, Job, JobError, JobEvent, JobReport, JobState, ProgressEvent};
pub use registry::JobRegistry;
pub use stream::JobStream;
