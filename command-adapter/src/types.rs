use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How the prompt reaches the child process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    /// Appended as the last argument.
    #[default]
    Argument,
    /// Written to stdin, which is then closed.
    Stdin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Arguments placed before the prompt, e.g. `["run", "llama3.1"]`.
    pub args: Vec<String>,
    pub prompt_mode: PromptMode,
    /// Flag that receives the response schema as compact JSON, e.g. `--format`.
    pub schema_flag: Option<String>,
    /// Append the response schema to the prompt as an instruction.
    pub schema_hint: bool,
    pub cwd: Option<PathBuf>,
    pub env_vars: Vec<(String, String)>,
    pub timeout: Duration,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            prompt_mode: PromptMode::default(),
            schema_flag: None,
            schema_hint: true,
            cwd: None,
            env_vars: Vec::new(),
            timeout: Duration::from_secs(300),
        }
    }
}

impl CommandConfig {
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn with_prompt_mode(mut self, mode: PromptMode) -> Self {
        self.prompt_mode = mode;
        self
    }

    #[must_use]
    pub fn with_schema_flag(mut self, flag: impl Into<String>) -> Self {
        self.schema_flag = Some(flag.into());
        self
    }

    #[must_use]
    pub const fn with_schema_hint(mut self, enabled: bool) -> Self {
        self.schema_hint = enabled;
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Fully resolved invocation: argv plus optional stdin payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub args: Vec<std::ffi::OsString>,
    pub stdin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_ms: u64,
}
