//! Embeddable session core for driving a CLI coding agent from a text
//! editor.
//!
//! The crate owns the hard parts of such a plugin: the lifecycle around a
//! single agent subprocess, the readiness and queueing protocol for payloads
//! sent before that process can accept input, and the extraction of editor
//! selections into normalized payloads. Everything visual (windows, keymaps,
//! prompts) stays in the host and is reached through the collaborator traits
//! in [`host`], [`process`], and [`schedule`].

pub mod command;
pub mod config;
pub mod host;
pub mod process;
pub mod schedule;
pub mod selection;
pub mod session;

pub use config::{CaptureMode, CommandSpec, Config, Keymaps, Placement, WorkingDirPolicy};
pub use host::{
    EditorMode, EditorOps, Installer, Notifier, NotifyLevel, SurfaceId, SurfaceSpec, WindowId,
};
pub use process::{
    command_in_path, ProcessEvent, ProcessId, ProcessOps, SpawnRequest, SpawnedProcess,
};
pub use schedule::{Scheduler, TimerKind};
pub use selection::{Mark, Selection, SelectionKind, TabPolicy, COL_EOL};
pub use session::{OpenOptions, Phase, SendOptions, Session, SessionHost};

use tracing::Level;

/// Install a process-wide fmt subscriber. Hosts that bring their own
/// subscriber skip this; a second call is a no-op.
pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}
