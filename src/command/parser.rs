//! Lexer for chat-style slash commands.
//!
//! [`parse`] turns the raw text of a review-thread comment into a
//! [`Command`]. It never rejects input: anything that does not start with
//! a recognized `/name` token is classified as [`CommandName::Unknown`]
//! so the caller can answer with a hint that quotes the literal text.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of commands the bot understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandName {
    Train,
    Eval,
    Test,
    Pipeline,
    Status,
    Help,
    Unknown,
}

impl CommandName {
    /// Match a leading token against the command set.
    ///
    /// The token must carry the `/` prefix and match case-sensitively;
    /// everything else maps to `Unknown`.
    fn from_token(token: &str) -> Self {
        match token {
            "/train" => CommandName::Train,
            "/eval" => CommandName::Eval,
            "/test" => CommandName::Test,
            "/pipeline" => CommandName::Pipeline,
            "/status" => CommandName::Status,
            "/help" => CommandName::Help,
            _ => CommandName::Unknown,
        }
    }

    /// Match a bare word (no slash), used for `/help <command>` targets.
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "train" => Some(CommandName::Train),
            "eval" => Some(CommandName::Eval),
            "test" => Some(CommandName::Test),
            "pipeline" => Some(CommandName::Pipeline),
            "status" => Some(CommandName::Status),
            "help" => Some(CommandName::Help),
            _ => None,
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandName::Train => "train",
            CommandName::Eval => "eval",
            CommandName::Test => "test",
            CommandName::Pipeline => "pipeline",
            CommandName::Status => "status",
            CommandName::Help => "help",
            CommandName::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

/// A parsed slash command: name plus raw key/value options and flags.
///
/// Values are kept verbatim at this layer — numeric coercion and comma
/// splitting belong to the spec builder, which can then attribute errors
/// to a specific field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub name: CommandName,
    pub options: HashMap<String, String>,
    pub flags: BTreeSet<String>,
    pub raw_text: String,
}

impl Command {
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }
}

/// Parse raw comment text into a [`Command`]. Never fails.
///
/// Lexical rules:
/// - the first whitespace-delimited token names the command and must
///   begin with `/`; anything unrecognized yields `Unknown`;
/// - `--key=value` tokens populate `options`, last occurrence wins;
/// - `--key` tokens (no `=`) and bare words populate `flags` — bare
///   words are what makes `/help train` work;
/// - empty or whitespace-only input yields `Unknown` with empty maps.
pub fn parse(raw_text: &str) -> Command {
    let mut tokens = raw_text.split_whitespace();

    let name = match tokens.next() {
        Some(first) if first.starts_with('/') => CommandName::from_token(first),
        Some(_) | None => CommandName::Unknown,
    };

    let mut options = HashMap::new();
    let mut flags = BTreeSet::new();

    for token in tokens {
        if let Some(rest) = token.strip_prefix("--") {
            if rest.is_empty() {
                continue;
            }
            match rest.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    options.insert(key.to_string(), value.to_string());
                }
                Some(_) => {}
                None => {
                    flags.insert(rest.to_string());
                }
            }
        } else {
            flags.insert(token.to_string());
        }
    }

    Command {
        name,
        options,
        flags,
        raw_text: raw_text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_train_with_options() {
        let cmd = parse("/train --config=resnet --epochs=10 --lr=0.001");
        assert_eq!(cmd.name, CommandName::Train);
        assert_eq!(cmd.option("config"), Some("resnet"));
        assert_eq!(cmd.option("epochs"), Some("10"));
        assert_eq!(cmd.option("lr"), Some("0.001"));
        assert!(cmd.flags.is_empty());
    }

    #[test]
    fn unrecognized_leading_token_is_unknown() {
        for raw in ["deploy now", "train --epochs=3", "/deploy --target=prod"] {
            let cmd = parse(raw);
            assert_eq!(cmd.name, CommandName::Unknown, "for {raw:?}");
        }
    }

    #[test]
    fn unknown_still_extracts_options_and_flags() {
        let cmd = parse("/deploy --target=prod --force");
        assert_eq!(cmd.name, CommandName::Unknown);
        assert_eq!(cmd.option("target"), Some("prod"));
        assert!(cmd.has_flag("force"));
    }

    #[test]
    fn empty_input_parses_to_unknown() {
        for raw in ["", "   ", "\n\t"] {
            let cmd = parse(raw);
            assert_eq!(cmd.name, CommandName::Unknown);
            assert!(cmd.options.is_empty());
            assert!(cmd.flags.is_empty());
        }
    }

    #[test]
    fn bare_flag_without_value() {
        let cmd = parse("/train --dry-run --epochs=2");
        assert!(cmd.has_flag("dry-run"));
        assert_eq!(cmd.option("epochs"), Some("2"));
    }

    #[test]
    fn duplicate_key_last_occurrence_wins() {
        let cmd = parse("/train --epochs=5 --epochs=20");
        assert_eq!(cmd.option("epochs"), Some("20"));
    }

    #[test]
    fn comma_values_are_preserved_verbatim() {
        let cmd = parse("/eval --model=baseline,candidate --metrics=accuracy,f1");
        assert_eq!(cmd.option("model"), Some("baseline,candidate"));
        assert_eq!(cmd.option("metrics"), Some("accuracy,f1"));
    }

    #[test]
    fn positional_word_becomes_flag() {
        let cmd = parse("/help train");
        assert_eq!(cmd.name, CommandName::Help);
        assert!(cmd.has_flag("train"));
    }

    #[test]
    fn command_match_is_case_sensitive() {
        assert_eq!(parse("/Train --epochs=1").name, CommandName::Unknown);
        assert_eq!(parse("/TEST").name, CommandName::Unknown);
    }

    #[test]
    fn empty_value_is_kept() {
        let cmd = parse("/train --config=");
        assert_eq!(cmd.option("config"), Some(""));
    }

    #[test]
    fn raw_text_is_recorded() {
        let raw = "/test --type=smoke --samples=10";
        assert_eq!(parse(raw).raw_text, raw);
    }

    #[test]
    fn from_word_maps_bare_names() {
        assert_eq!(CommandName::from_word("eval"), Some(CommandName::Eval));
        assert_eq!(CommandName::from_word("nonsense"), None);
    }
}
