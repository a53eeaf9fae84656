//! Argument builder for model CLI invocations.
//!
//! The argv is `config.args`, then `<schema_flag> <schema-json>` when both a
//! schema flag and a schema are present, then the prompt (argument mode).
//! In stdin mode the prompt is written to the child's stdin instead.
//!
//! ## Examples
//! | Config | Invocation |
//! |--------|------------|
//! | `args = ["run", "llama3.1"]` | `ollama run llama3.1 "<prompt>"` |
//! | `args = ["run", "llama3.1"]`, `schema_flag = "--format"` | `ollama run llama3.1 --format '{...}' "<prompt>"` |
//! | `args = ["-m", "model.gguf", "-f", "/dev/stdin"]`, stdin mode | `llama-cli -m model.gguf -f /dev/stdin < prompt` |

use crate::types::{CommandConfig, Invocation, PromptMode};
use serde_json::Value;
use std::ffi::OsString;

/// Builds the invocation for one prompt.
#[must_use]
pub fn build_invocation(prompt: &str, schema: Option<&Value>, config: &CommandConfig) -> Invocation {
    let mut args: Vec<OsString> = config.args.iter().map(OsString::from).collect();

    if let (Some(flag), Some(schema)) = (&config.schema_flag, schema) {
        args.push(OsString::from(flag));
        args.push(OsString::from(schema.to_string()));
    }

    let effective_prompt = match schema {
        Some(schema) if config.schema_hint => with_schema_hint(prompt, schema),
        _ => prompt.to_string(),
    };

    match config.prompt_mode {
        PromptMode::Argument => {
            args.push(OsString::from(effective_prompt));
            Invocation { args, stdin: None }
        }
        PromptMode::Stdin => Invocation {
            args,
            stdin: Some(effective_prompt),
        },
    }
}

/// CLIs have no structured-output channel of their own; the schema goes
/// into the prompt text.
fn with_schema_hint(prompt: &str, schema: &Value) -> String {
    let rendered = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    format!(
        "{prompt}\n\nRespond with a single JSON object matching this JSON schema, and nothing else:\n{rendered}"
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({"type": "object", "properties": {"is_valid": {"type": "boolean"}}})
    }

    fn strs(invocation: &Invocation) -> Vec<&str> {
        invocation.args.iter().filter_map(|s| s.to_str()).collect()
    }

    #[test]
    fn test_prompt_is_last_argument() {
        let config = CommandConfig::default().with_args(["run", "llama3.1"]);
        let invocation = build_invocation("Fix: He go.", None, &config);

        assert_eq!(strs(&invocation), vec!["run", "llama3.1", "Fix: He go."]);
        assert!(invocation.stdin.is_none());
    }

    #[test]
    fn test_schema_flag_precedes_prompt() {
        let config = CommandConfig::default()
            .with_args(["run", "llama3.1"])
            .with_schema_flag("--format")
            .with_schema_hint(false);
        let invocation = build_invocation("Check.", Some(&schema()), &config);
        let args = strs(&invocation);

        assert!(
            args.windows(2)
                .any(|w| w[0] == "--format" && w[1].contains("\"is_valid\"")),
            "Expected '--format <schema>' but got: {args:?}",
        );
        assert_eq!(args.last(), Some(&"Check."));
    }

    #[test]
    fn test_schema_flag_ignored_without_schema() {
        let config = CommandConfig::default().with_schema_flag("--format");
        let invocation = build_invocation("Extract.", None, &config);

        assert_eq!(strs(&invocation), vec!["Extract."]);
    }

    #[test]
    fn test_schema_hint_appended_to_prompt() {
        let config = CommandConfig::default();
        let invocation = build_invocation("Check.", Some(&schema()), &config);
        let prompt = strs(&invocation).pop().unwrap().to_string();

        assert!(prompt.starts_with("Check.\n\nRespond with a single JSON object"));
        assert!(prompt.contains("\"is_valid\""));
    }

    #[test]
    fn test_stdin_mode_keeps_prompt_off_argv() {
        let config = CommandConfig::default()
            .with_args(["-f", "/dev/stdin"])
            .with_prompt_mode(PromptMode::Stdin);
        let invocation = build_invocation("Extract.", None, &config);

        assert_eq!(strs(&invocation), vec!["-f", "/dev/stdin"]);
        assert_eq!(invocation.stdin.as_deref(), Some("Extract."));
    }
}
