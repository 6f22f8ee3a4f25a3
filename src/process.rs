//! Process-spawner collaborator and the event channel it feeds.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::Result;
use crossbeam_channel::Receiver;

use crate::config::CaptureMode;
use crate::host::SurfaceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProcessId(pub u64);

/// Lifecycle events the spawner delivers over the session's event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// Raw combined output (terminal capture).
    Output(Vec<u8>),
    /// One stdout line (buffered capture).
    Stdout(String),
    /// One stderr line (buffered capture).
    Stderr(String),
    Exit(i32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    pub argv: Vec<String>,
    /// None means the spawner's own working directory.
    pub cwd: Option<PathBuf>,
    pub capture: CaptureMode,
    /// Surface the process renders into (terminal capture).
    pub surface: Option<SurfaceId>,
}

/// Handle returned by a successful spawn. The session drains `events`
/// cooperatively via `Session::pump_events`.
pub struct SpawnedProcess {
    pub id: ProcessId,
    pub events: Receiver<ProcessEvent>,
}

pub trait ProcessOps {
    fn command_exists(&self, name: &str) -> bool;
    fn spawn(&mut self, request: SpawnRequest) -> Result<SpawnedProcess>;
    fn write(&mut self, id: ProcessId, bytes: &[u8]) -> Result<()>;
    fn kill(&mut self, id: ProcessId) -> Result<()>;
}

/// PATH lookup usable as a `command_exists` implementation. A command
/// containing a path separator is checked directly.
pub fn command_in_path(command: &str) -> bool {
    if command.trim().is_empty() {
        return false;
    }
    let path = Path::new(command);
    if path.is_absolute() || command.contains(std::path::MAIN_SEPARATOR) {
        return path.exists();
    }
    let Ok(path_var) = env::var("PATH") else {
        return false;
    };
    env::split_paths(&path_var).any(|dir| dir.join(command).exists())
}
