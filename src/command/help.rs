//! Help text posted back to the review thread.

use super::parser::CommandName;

/// Help for one command, or the full overview when `target` is `None`
/// (or names `help` itself).
pub fn help_text(target: Option<CommandName>) -> String {
    match target {
        Some(CommandName::Train) => "\
**Train Command Usage:**
`/train --config=<name> --epochs=<int> --lr=<float> --gpu=<int>`

Examples:
- `/train --config=resnet --epochs=10 --lr=0.001`
- `/train --epochs=50 --gpu=2`"
            .to_string(),

        Some(CommandName::Eval) => "\
**Eval Command Usage:**
`/eval --model=<csv> --metrics=<csv>`

Examples:
- `/eval --model=baseline,candidate --metrics=accuracy,f1`
- `/eval --metrics=latency`"
            .to_string(),

        Some(CommandName::Test) => "\
**Test Command Usage:**
`/test --type={smoke|integration|performance|all} --samples=<int>`

Examples:
- `/test --type=smoke --samples=100`
- `/test --type=integration`"
            .to_string(),

        Some(CommandName::Pipeline) => "\
**Pipeline Command Usage:**
`/pipeline --steps=<csv|all> --skip=<csv>`

Steps run in order: train, eval, test, validate.

Examples:
- `/pipeline --steps=train,eval`
- `/pipeline --steps=all --skip=test`"
            .to_string(),

        Some(CommandName::Status) => "\
**Status Command Usage:**
`/status --job=<job_id>`

Examples:
- `/status --job=abc123`
- `/status` (shows all active jobs)"
            .to_string(),

        Some(CommandName::Help) | Some(CommandName::Unknown) | None => "\
**Available Commands:**
- `/train` — train a model with the given parameters
- `/eval` — evaluate and compare models
- `/test` — run a test suite against the candidate model
- `/pipeline` — run a multi-step train/eval/test/validate pipeline
- `/status` — check job status
- `/help` — show this message

Use `/help <command>` for detailed usage."
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overview_lists_every_command() {
        let text = help_text(None);
        for cmd in ["/train", "/eval", "/test", "/pipeline", "/status", "/help"] {
            assert!(text.contains(cmd), "overview missing {cmd}");
        }
    }

    #[test]
    fn scoped_help_shows_usage_line() {
        let text = help_text(Some(CommandName::Pipeline));
        assert!(text.contains("--steps=<csv|all>"));
        assert!(text.contains("--skip=<csv>"));
    }

    #[test]
    fn help_about_help_is_the_overview() {
        assert_eq!(help_text(Some(CommandName::Help)), help_text(None));
    }
}
