//! Builds typed job specifications from parsed commands.
//!
//! One builder per command kind, selected by exhaustive match on
//! [`CommandName`]. All numeric coercion, range checking, comma
//! splitting and defaulting happens here; a failed build produces a
//! field-attributed [`ValidationError`] and never a partial spec.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::parser::{Command, CommandName};
use crate::error::ValidationError;

/// Documented defaults applied when an option is absent.
///
/// Loaded from configuration so an operator can tune them without a
/// rebuild; the values below are the shipped baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecDefaults {
    /// `--epochs` when absent from `/train`.
    pub epochs: u32,
    /// `--lr` when absent from `/train`.
    pub learning_rate: f64,
    /// `--samples` when absent from `/test`.
    pub sample_count: u32,
}

impl Default for SpecDefaults {
    fn default() -> Self {
        Self {
            epochs: 10,
            learning_rate: 0.001,
            sample_count: 100,
        }
    }
}

/// Validated, per-kind job configuration. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobSpec {
    Train(TrainSpec),
    Eval(EvalSpec),
    Test(TestSpec),
    Pipeline(PipelineSpec),
}

impl JobSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            JobSpec::Train(_) => "train",
            JobSpec::Eval(_) => "eval",
            JobSpec::Test(_) => "test",
            JobSpec::Pipeline(_) => "pipeline",
        }
    }

    /// Build the spec matching `cmd.name`.
    ///
    /// Only the four job-starting commands have builders; `status`,
    /// `help` and `unknown` are answered synchronously by the manager
    /// and are rejected here.
    pub fn from_command(cmd: &Command, defaults: &SpecDefaults) -> Result<Self, ValidationError> {
        match cmd.name {
            CommandName::Train => TrainSpec::build(cmd, defaults).map(JobSpec::Train),
            CommandName::Eval => EvalSpec::build(cmd).map(JobSpec::Eval),
            CommandName::Test => TestSpec::build(cmd, defaults).map(JobSpec::Test),
            CommandName::Pipeline => PipelineSpec::build(cmd).map(JobSpec::Pipeline),
            CommandName::Status | CommandName::Help | CommandName::Unknown => Err(
                ValidationError::new("command", format!("`{}` does not start a job", cmd.name)),
            ),
        }
    }
}

/// `/train --config=<name> --epochs=<int> --lr=<float> --gpu=<int>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainSpec {
    pub epochs: u32,
    pub learning_rate: f64,
    pub gpu_count: u32,
    pub config_name: String,
}

impl TrainSpec {
    fn build(cmd: &Command, defaults: &SpecDefaults) -> Result<Self, ValidationError> {
        let epochs = parse_u32(cmd, "epochs")?.unwrap_or(defaults.epochs);
        if epochs == 0 {
            return Err(ValidationError::new("epochs", "must be greater than 0"));
        }

        let learning_rate = parse_f64(cmd, "lr")?.unwrap_or(defaults.learning_rate);
        if !(learning_rate > 0.0) || !learning_rate.is_finite() {
            return Err(ValidationError::new("lr", "must be a positive number"));
        }

        // gpu_count of 0 means CPU-only, which is valid.
        let gpu_count = parse_u32(cmd, "gpu")?.unwrap_or(0);

        let config_name = cmd.option("config").unwrap_or("default").to_string();

        Ok(Self {
            epochs,
            learning_rate,
            gpu_count,
            config_name,
        })
    }
}

/// `/eval --model=<csv> --metrics=<csv>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalSpec {
    /// Models to compare, first-seen order, deduplicated.
    pub models: Vec<String>,
    pub metrics: Vec<String>,
}

impl EvalSpec {
    fn build(cmd: &Command) -> Result<Self, ValidationError> {
        // An absent or empty list falls back to the canonical comparison
        // pair; only a list that names something is taken literally.
        let mut models = csv_list(cmd.option("model"));
        if models.is_empty() {
            models = vec!["baseline".to_string(), "candidate".to_string()];
        }

        let mut metrics = csv_list(cmd.option("metrics"));
        if metrics.is_empty() {
            metrics = vec!["accuracy".to_string()];
        }

        Ok(Self { models, metrics })
    }
}

/// The closed set of test suites `/test --type=` accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    Smoke,
    Integration,
    Performance,
    All,
}

impl TestType {
    fn parse(value: &str) -> Result<Self, ValidationError> {
        match value {
            "smoke" => Ok(TestType::Smoke),
            "integration" => Ok(TestType::Integration),
            "performance" => Ok(TestType::Performance),
            "all" => Ok(TestType::All),
            other => Err(ValidationError::new(
                "type",
                format!("unknown test type \"{other}\" (expected smoke, integration, performance or all)"),
            )),
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TestType::Smoke => "smoke",
            TestType::Integration => "integration",
            TestType::Performance => "performance",
            TestType::All => "all",
        };
        write!(f, "{name}")
    }
}

/// `/test --type={smoke|integration|performance|all} --samples=<int>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSpec {
    pub test_type: TestType,
    pub sample_count: u32,
}

impl TestSpec {
    fn build(cmd: &Command, defaults: &SpecDefaults) -> Result<Self, ValidationError> {
        let test_type = match cmd.option("type") {
            Some(value) => TestType::parse(value)?,
            None => TestType::Smoke,
        };

        let sample_count = parse_u32(cmd, "samples")?.unwrap_or(defaults.sample_count);
        if sample_count == 0 {
            return Err(ValidationError::new("samples", "must be greater than 0"));
        }

        Ok(Self {
            test_type,
            sample_count,
        })
    }
}

/// A stage of a `/pipeline` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Train,
    Eval,
    Test,
    Validate,
}

impl PipelineStep {
    /// The full pipeline, in execution order.
    pub const ALL: [PipelineStep; 4] = [
        PipelineStep::Train,
        PipelineStep::Eval,
        PipelineStep::Test,
        PipelineStep::Validate,
    ];

    fn parse(value: &str, field: &str) -> Result<Self, ValidationError> {
        match value {
            "train" => Ok(PipelineStep::Train),
            "eval" => Ok(PipelineStep::Eval),
            "test" => Ok(PipelineStep::Test),
            "validate" => Ok(PipelineStep::Validate),
            other => Err(ValidationError::new(
                field,
                format!("unknown step \"{other}\" (expected train, eval, test or validate)"),
            )),
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStep::Train => "train",
            PipelineStep::Eval => "eval",
            PipelineStep::Test => "test",
            PipelineStep::Validate => "validate",
        };
        write!(f, "{name}")
    }
}

/// `/pipeline --steps=<csv|all> --skip=<csv>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Final stage sequence after `all` expansion and `--skip` removal.
    pub steps: Vec<PipelineStep>,
}

impl PipelineSpec {
    fn build(cmd: &Command) -> Result<Self, ValidationError> {
        let requested = csv_list(cmd.option("steps"));
        let mut steps: Vec<PipelineStep> =
            if requested.is_empty() || requested.iter().any(|s| s == "all") {
                PipelineStep::ALL.to_vec()
            } else {
                let mut parsed = Vec::new();
                for value in &requested {
                    let step = PipelineStep::parse(value, "steps")?;
                    if !parsed.contains(&step) {
                        parsed.push(step);
                    }
                }
                parsed
            };

        let mut skip = HashSet::new();
        for value in csv_list(cmd.option("skip")) {
            skip.insert(PipelineStep::parse(&value, "skip")?);
        }
        steps.retain(|step| !skip.contains(step));

        if steps.is_empty() {
            return Err(ValidationError::new(
                "skip",
                "no pipeline steps left after applying --skip",
            ));
        }

        Ok(Self { steps })
    }
}

/// Comma-split, trim, drop empty segments, deduplicate first-seen order.
fn csv_list(value: Option<&str>) -> Vec<String> {
    let Some(value) = value else {
        return Vec::new();
    };
    let mut out: Vec<String> = Vec::new();
    for item in value.split(',') {
        let item = item.trim();
        if !item.is_empty() && !out.iter().any(|seen| seen == item) {
            out.push(item.to_string());
        }
    }
    out
}

fn parse_u32(cmd: &Command, key: &str) -> Result<Option<u32>, ValidationError> {
    match cmd.option(key) {
        None => Ok(None),
        Some(raw) => raw.parse::<u32>().map(Some).map_err(|_| {
            ValidationError::new(key, format!("expected an integer, got \"{raw}\""))
        }),
    }
}

fn parse_f64(cmd: &Command, key: &str) -> Result<Option<f64>, ValidationError> {
    match cmd.option(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|_| ValidationError::new(key, format!("expected a number, got \"{raw}\""))),
    }
}
