//! Collaborator interfaces provided by the embedding editor.
//!
//! The session core never touches editor internals directly; windows,
//! buffers, notifications and the install prompt are all reached through
//! these traits. Implementations must not block: long-running work finishes
//! later via the session's callback entry points.

use anyhow::Result;

use crate::config::Placement;
use crate::selection::{Mark, SelectionKind, TabPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SurfaceId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WindowId(pub u64);

/// How the session wants its display surface laid out. Sizes are fractions
/// of the host viewport; the host owns actual geometry and centering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSpec {
    pub placement: Placement,
    pub width: f32,
    pub height: f32,
    /// When false the surface opens in the background and input focus stays
    /// where it is.
    pub focus: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorMode {
    #[default]
    Normal,
    VisualChar,
    VisualLine,
    VisualBlock,
    Other,
}

impl EditorMode {
    pub fn selection_kind(self) -> Option<SelectionKind> {
        match self {
            EditorMode::VisualChar => Some(SelectionKind::Character),
            EditorMode::VisualLine => Some(SelectionKind::Line),
            EditorMode::VisualBlock => Some(SelectionKind::Block),
            EditorMode::Normal | EditorMode::Other => None,
        }
    }
}

/// Editor-surface collaborator: the buffer and window access the session
/// core needs. Surface ids may outlive their surface (the user can close a
/// window at any time); implementations must tolerate stale ids.
pub trait EditorOps {
    fn create_surface(&mut self, spec: &SurfaceSpec) -> Result<SurfaceId>;
    fn destroy_surface(&mut self, id: SurfaceId);
    fn surface_visible(&self, id: SurfaceId) -> bool;
    fn surface_focused(&self, id: SurfaceId) -> bool;
    fn focus_surface(&mut self, id: SurfaceId);
    /// Window holding input focus right now.
    fn current_window(&self) -> WindowId;
    fn focus_window(&mut self, window: WindowId);
    /// Name of the active buffer; empty for an unnamed buffer.
    fn buffer_name(&self) -> String;
    fn buffer_lines(&self) -> Vec<String>;
    fn mode(&self) -> EditorMode;
    /// Start and end marks of the current or last selection.
    fn selection_marks(&self) -> (Mark, Mark);
    /// Restore the previous selection so its marks can be read.
    fn reselect(&mut self) -> Result<()>;
    fn exit_visual(&mut self);
    fn tab_policy(&self) -> TabPolicy;
    /// Replace the surface content with a static message.
    fn render_message(&mut self, id: SurfaceId, lines: &[String]);
    /// Append one line of captured process output to the surface.
    fn append_output(&mut self, id: SurfaceId, line: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Warn,
    Error,
}

/// User-facing notification sink, distinct from tracing logs.
pub trait Notifier {
    fn notify(&mut self, level: NotifyLevel, message: &str);
}

/// Install-prompt collaborator. `prompt_install` returns once the prompt is
/// showing; the host reports the outcome later through
/// `Session::install_finished`.
pub trait Installer {
    fn prompt_install(&mut self, tool: &str) -> Result<()>;
}
