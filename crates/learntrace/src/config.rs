//! Process-wide configuration.
//!
//! Built once at startup (from defaults or a TOML file) and handed to the
//! components that need it; nothing reads configuration from global state.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, repr::ReprLimits};

/// Filename the execution engine gives the learner's program by default.
pub const DEFAULT_PROGRAM_FILENAME: &str = "my_program.py";

/// Upper bound for either side of the [`ContextWindow`].
pub const MAX_CONTEXT_LINES: u32 = 100;

/// Which source lines around the executing statement a frame shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContextWindow {
    /// Lines shown before the executing statement.
    pub before: u32,
    /// Lines shown after the executing statement.
    pub after: u32,
    /// Also show the first line of the enclosing function definition,
    /// separated from the window by a gap when not adjacent.
    pub include_signature: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LearntraceConfig {
    /// Sentinel filename identifying frames of the learner's program.
    pub program_filename: String,
    /// A (code, line) pair occurring at least this many times in a stack is
    /// collapsed into a repeated-frames summary.
    pub min_repeats: usize,
    pub context: ContextWindow,
    pub repr: ReprLimits,
    /// Name of a bundled syntect theme.
    pub theme: String,
    /// CSS color behind the expression being executed on the current line.
    pub executing_background: String,
    /// Written as stdout after every run, so it also ends the checked output.
    /// Empty disables it.
    pub shell_prompt: Option<String>,
}

impl Default for LearntraceConfig {
    fn default() -> Self {
        Self {
            program_filename: DEFAULT_PROGRAM_FILENAME.to_owned(),
            min_repeats: 3,
            context: ContextWindow::default(),
            repr: ReprLimits::default(),
            theme: "base16-mocha.dark".to_owned(),
            executing_background: "#005080".to_owned(),
            shell_prompt: Some(">>> ".to_owned()),
        }
    }
}

impl LearntraceConfig {
    /// Parses a TOML document; missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml_edit::de::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Rejects settings that would make rendering meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.program_filename.is_empty() {
            return Err(ConfigError::Validation("program_filename must not be empty".to_owned()));
        }
        if self.min_repeats < 2 {
            return Err(ConfigError::Validation(format!(
                "min_repeats must be at least 2, got {}",
                self.min_repeats
            )));
        }
        if self.context.before > MAX_CONTEXT_LINES || self.context.after > MAX_CONTEXT_LINES {
            return Err(ConfigError::Validation(format!(
                "context window may show at most {MAX_CONTEXT_LINES} lines on either side"
            )));
        }
        if self.repr.max_parts == 0 || self.repr.max_string_len < 5 {
            return Err(ConfigError::Validation(
                "repr limits must allow at least one part and five characters".to_owned(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_program_filename(mut self, filename: impl Into<String>) -> Self {
        self.program_filename = filename.into();
        self
    }

    #[must_use]
    pub fn with_min_repeats(mut self, min_repeats: usize) -> Self {
        self.min_repeats = min_repeats;
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: ContextWindow) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn with_repr_limits(mut self, limits: ReprLimits) -> Self {
        self.repr = limits;
        self
    }

    #[must_use]
    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = theme.into();
        self
    }

    #[must_use]
    pub fn with_shell_prompt(mut self, prompt: Option<String>) -> Self {
        self.shell_prompt = prompt;
        self
    }

    /// The shell prompt to show after a run, if any.
    #[must_use]
    pub fn prompt(&self) -> Option<&str> {
        self.shell_prompt.as_deref().filter(|prompt| !prompt.is_empty())
    }
}
