use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Job not found: {0}")]
    JobNotFound(String),
}

/// A field-attributed rejection produced while building a job spec.
///
/// Carries the offending option name so the requester sees exactly which
/// part of the command was wrong, e.g. `invalid --epochs: must be greater
/// than 0`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid --{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_the_field() {
        let err = ValidationError::new("epochs", "must be greater than 0");
        assert_eq!(err.to_string(), "invalid --epochs: must be greater than 0");
    }

    #[test]
    fn bot_error_wraps_validation() {
        let err: BotError = ValidationError::new("lr", "not a number").into();
        assert_eq!(
            err.to_string(),
            "Validation error: invalid --lr: not a number"
        );
    }
}
