mod help;
mod parser;
mod spec;

pub use help::help_text;
pub use parser::{Command, CommandName, parse};
pub use spec::{
    EvalSpec, JobSpec, PipelineSpec, PipelineStep, SpecDefaults, TestSpec, TestType, TrainSpec,
};
