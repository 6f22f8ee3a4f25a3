//! Typed plugin configuration.
//!
//! Hosts hand over a partial settings object (any serde source works,
//! [`Config::from_value`] covers the common JSON case); missing fields take
//! their defaults and the result is validated once when the session is
//! built. Fields are read-only after that.

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::Deserialize;

pub const DEFAULT_COMMAND: &str = "codex";
pub const DEFAULT_PROBE_DEBOUNCE_MS: u64 = 120;
pub const DEFAULT_READY_FALLBACK_MS: u64 = 1200;

const DEFAULT_FLOAT_WIDTH: f32 = 0.8;
const DEFAULT_FLOAT_HEIGHT: f32 = 0.8;
const DEFAULT_PANEL_WIDTH: f32 = 0.35;

/// Command to launch: a single executable name or a full argument list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    Line(String),
    Argv(Vec<String>),
}

impl CommandSpec {
    /// Executable token, used for presence checks and the status indicator.
    pub fn primary(&self) -> &str {
        match self {
            CommandSpec::Line(cmd) => cmd,
            CommandSpec::Argv(argv) => argv.first().map(String::as_str).unwrap_or(""),
        }
    }
}

impl Default for CommandSpec {
    fn default() -> Self {
        CommandSpec::Line(DEFAULT_COMMAND.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkingDirPolicy {
    /// Spawn in the editor process's own working directory.
    #[default]
    ProcessCwd,
    /// Spawn in the active buffer's directory when it exists.
    BufferDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Centered floating window sized as a fraction of the viewport.
    #[default]
    Float,
    /// Fixed side panel sized as a fraction of the viewport width.
    Panel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Live interactive terminal; output feeds the readiness probe.
    #[default]
    Terminal,
    /// stdout/stderr captured line by line into a plain output surface.
    /// The input stream is not writable in this mode.
    Buffered,
}

/// Key bindings for the host to wire up. The core carries them, nothing more.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Keymaps {
    pub toggle: Option<String>,
    pub send_selection: Option<String>,
    pub quit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub command: CommandSpec,
    /// Model override, appended to the command as `-m <model>`.
    pub model: Option<String>,
    pub working_dir: WorkingDirPolicy,
    pub placement: Placement,
    pub capture: CaptureMode,
    /// Offer to install the executable when it is missing.
    pub autoinstall: bool,
    pub float_width: f32,
    pub float_height: f32,
    pub panel_width: f32,
    /// Output must match this pattern (after ANSI stripping) to count as a
    /// readiness probe signal. Unset means any output counts.
    pub ready_pattern: Option<String>,
    pub probe_debounce_ms: u64,
    pub ready_fallback_ms: u64,
    pub keymaps: Keymaps,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command: CommandSpec::default(),
            model: None,
            working_dir: WorkingDirPolicy::default(),
            placement: Placement::default(),
            capture: CaptureMode::default(),
            autoinstall: false,
            float_width: DEFAULT_FLOAT_WIDTH,
            float_height: DEFAULT_FLOAT_HEIGHT,
            panel_width: DEFAULT_PANEL_WIDTH,
            ready_pattern: None,
            probe_debounce_ms: DEFAULT_PROBE_DEBOUNCE_MS,
            ready_fallback_ms: DEFAULT_READY_FALLBACK_MS,
            keymaps: Keymaps::default(),
        }
    }
}

impl Config {
    /// Builds a validated configuration from a host settings object.
    /// Missing fields take their defaults.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let config: Config = serde_json::from_value(value).context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.command.primary().trim().is_empty() {
            bail!("command must name an executable");
        }
        for (name, value) in [
            ("float_width", self.float_width),
            ("float_height", self.float_height),
            ("panel_width", self.panel_width),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                bail!("{name} must be a fraction in (0, 1], got {value}");
            }
        }
        if self.probe_debounce_ms == 0 {
            bail!("probe_debounce_ms must be positive");
        }
        if self.ready_fallback_ms == 0 {
            bail!("ready_fallback_ms must be positive");
        }
        self.compile_ready_pattern()?;
        Ok(())
    }

    pub(crate) fn compile_ready_pattern(&self) -> Result<Option<Regex>> {
        self.ready_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .with_context(|| format!("invalid ready pattern {:?}", self.ready_pattern))
    }
}
