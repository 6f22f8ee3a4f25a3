//! Session lifecycle, send pipeline, and readiness protocol.
//!
//! One [`Session`] pairs at most one agent subprocess with at most one
//! display surface. The host owns the session and calls back into it from
//! its event loop: [`Session::pump_events`] for process events,
//! [`Session::timer_fired`] for scheduled delays, and
//! [`Session::install_finished`] for the autoinstall prompt. All state
//! mutation happens synchronously inside those calls.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::Receiver;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::command::build_args;
use crate::config::{CaptureMode, Config, Placement, WorkingDirPolicy};
use crate::host::{EditorOps, Installer, Notifier, NotifyLevel, SurfaceId, SurfaceSpec};
use crate::process::{ProcessEvent, ProcessId, ProcessOps, SpawnRequest};
use crate::schedule::{Scheduler, TimerKind, TimerSlots};
use crate::selection::{self, Selection, SelectionKind};

/// Everything the embedding host provides, in one bound. An editor bridge
/// implements the individual collaborator traits on a single adapter type.
pub trait SessionHost: EditorOps + ProcessOps + Scheduler + Notifier + Installer {}

impl<T: EditorOps + ProcessOps + Scheduler + Notifier + Installer> SessionHost for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No surface and no process.
    #[default]
    Closed,
    /// Surface exists; waiting on the install flow before a process can start.
    Opening,
    /// Surface exists without a live process.
    Open,
    Running,
}

impl Phase {
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    /// Move input focus into the surface.
    pub focus: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SendOptions {
    /// Append a trailing newline to emulate pressing enter.
    pub submit: bool,
}

struct ProcessHandle {
    id: ProcessId,
    capture: CaptureMode,
    events: Receiver<ProcessEvent>,
}

pub struct Session<H: SessionHost> {
    host: H,
    config: Config,
    ready_pattern: Option<Regex>,
    phase: Phase,
    surface: Option<SurfaceId>,
    process: Option<ProcessHandle>,
    ready: bool,
    pending: VecDeque<String>,
    timers: TimerSlots,
    awaiting_install: bool,
}

impl<H: SessionHost> Session<H> {
    /// Validates the configuration and binds the collaborators. The
    /// configuration is read-only for the life of the session.
    pub fn new(host: H, config: Config) -> Result<Self> {
        config.validate()?;
        let ready_pattern = config.compile_ready_pattern()?;
        Ok(Self {
            host,
            config,
            ready_pattern,
            phase: Phase::default(),
            surface: None,
            process: None,
            ready: false,
            pending: VecDeque::new(),
            timers: TimerSlots::default(),
            awaiting_install: false,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Opens (or re-focuses) the session surface and makes sure a process is
    /// running behind it. Returns before the process is ready; readiness is
    /// settled later through `pump_events` and `timer_fired`.
    pub fn open(&mut self, opts: OpenOptions) -> Result<()> {
        if let Some(surface) = self.surface {
            if self.host.surface_visible(surface) {
                if opts.focus && !self.host.surface_focused(surface) {
                    self.host.focus_surface(surface);
                }
                return Ok(());
            }
            // The host closed it behind our back; the handle is stale.
            self.surface = None;
        }
        let spec = self.surface_spec(opts.focus);
        let surface = self
            .host
            .create_surface(&spec)
            .context("failed to create surface")?;
        self.surface = Some(surface);
        if self.process.is_some() {
            debug!("surface recreated over running process");
            return Ok(());
        }
        self.phase = Phase::Opening;
        let primary = self.config.command.primary().to_string();
        if !self.host.command_exists(&primary) {
            return self.handle_missing_executable(&primary);
        }
        let argv = build_args(&self.config.command, self.config.model.as_deref());
        self.spawn(argv)
    }

    /// Destroys the surface. The process, if any, keeps running detached;
    /// `status_text` reflects that.
    pub fn close(&mut self) {
        if let Some(surface) = self.surface.take() {
            self.host.destroy_surface(surface);
        }
        self.phase = if self.process.is_some() {
            Phase::Running
        } else {
            Phase::Closed
        };
    }

    /// Close when the surface is visible, otherwise open with focus.
    pub fn toggle(&mut self) -> Result<()> {
        let visible = self
            .surface
            .map_or(false, |surface| self.host.surface_visible(surface));
        if visible {
            self.close();
            Ok(())
        } else {
            self.open(OpenOptions { focus: true })
        }
    }

    /// Tears the whole session down: kills the process and destroys the
    /// surface. For host teardown, not the close/toggle path.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.process.take() {
            if let Err(err) = self.host.kill(handle.id) {
                warn!("failed to kill agent process: {err:#}");
            }
        }
        self.ready = false;
        self.pending.clear();
        self.timers.reset();
        self.close();
    }

    /// Sends a payload to the agent's input stream, queueing it when the
    /// process has not signalled readiness yet.
    pub fn send(&mut self, text: &str, opts: SendOptions) -> Result<()> {
        if text.is_empty() {
            self.host.notify(NotifyLevel::Warn, "nothing to send");
            bail!("empty payload");
        }
        let (id, capture) = match &self.process {
            Some(handle) => (handle.id, handle.capture),
            None => {
                self.host.notify(NotifyLevel::Warn, "no active session");
                bail!("no active session");
            }
        };
        if capture == CaptureMode::Buffered {
            self.host
                .notify(NotifyLevel::Warn, "no input stream in buffered capture mode");
            bail!("buffered capture has no input stream");
        }
        let mut payload = text.to_string();
        if opts.submit {
            payload.push('\n');
        }
        if self.ready {
            if let Err(err) = self.host.write(id, payload.as_bytes()) {
                let message = format!("failed to write to agent: {err:#}");
                self.host.notify(NotifyLevel::Error, &message);
                return Err(err);
            }
            return Ok(());
        }
        self.pending.push_back(payload);
        self.arm_timer(
            TimerKind::ReadyFallback,
            Duration::from_millis(self.config.ready_fallback_ms),
        );
        debug!(queued = self.pending.len(), "payload queued until agent is ready");
        Ok(())
    }

    /// Extracts the current (or last) selection and sends it prefixed with a
    /// `File: <name>:<start>-<end>` header. The original window focus and
    /// editor mode are restored regardless of the outcome.
    pub fn send_selection(&mut self, opts: SendOptions) -> Result<()> {
        let kind = match self.resolve_selection_kind() {
            Some(kind) => kind,
            // A failed reselect reads as "no selection".
            None => return Err(anyhow!("no selection")),
        };
        let (start, end) = self.host.selection_marks();
        let lines = self.host.buffer_lines();
        let tabs = self.host.tab_policy();
        let Some(sel) = selection::extract(kind, start, end, &lines, tabs) else {
            self.host.notify(NotifyLevel::Warn, "selection is empty");
            self.host.exit_visual();
            bail!("empty selection");
        };
        let name = self.host.buffer_name();
        let payload = selection_payload(&name, &sel);
        let origin = self.host.current_window();
        let surface_visible = self
            .surface
            .map_or(false, |surface| self.host.surface_visible(surface));
        let result = if self.process.is_none() || !surface_visible {
            self.open(OpenOptions { focus: false })
                .and_then(|_| self.send(&payload, opts))
        } else {
            self.send(&payload, opts)
        };
        self.host.focus_window(origin);
        self.host.exit_visual();
        result
    }

    /// Short statusline indicator: the command name while the process runs
    /// without a visible surface, empty otherwise.
    pub fn status_text(&self) -> String {
        if self.process.is_none() {
            return String::new();
        }
        let visible = self
            .surface
            .map_or(false, |surface| self.host.surface_visible(surface));
        if visible {
            String::new()
        } else {
            format!("[{}]", self.config.command.primary())
        }
    }

    /// Drains pending process events. The host calls this from its event
    /// loop whenever the spawner may have produced output or an exit.
    /// Returns the number of events handled.
    pub fn pump_events(&mut self) -> usize {
        let mut events = Vec::new();
        if let Some(handle) = &self.process {
            while let Ok(event) = handle.events.try_recv() {
                events.push(event);
            }
        }
        let handled = events.len();
        for event in events {
            self.handle_event(event);
        }
        handled
    }

    /// Host callback when a scheduled delay elapses. The slot is cleared
    /// before readiness is evaluated; a timer for a dead process is ignored.
    pub fn timer_fired(&mut self, kind: TimerKind) {
        if !self.timers.clear(kind) {
            return;
        }
        if self.process.is_none() {
            return;
        }
        self.mark_ready();
    }

    /// Host callback for the autoinstall flow. On success the open flow is
    /// retried; on failure a static message is rendered into the surface.
    pub fn install_finished(&mut self, success: bool) -> Result<()> {
        if !self.awaiting_install {
            return Ok(());
        }
        self.awaiting_install = false;
        let primary = self.config.command.primary().to_string();
        let surface_ok = self
            .surface
            .map_or(false, |surface| self.host.surface_visible(surface));
        if !surface_ok {
            let spec = self.surface_spec(false);
            let surface = self
                .host
                .create_surface(&spec)
                .context("failed to create surface")?;
            self.surface = Some(surface);
        }
        if !success {
            self.render_install_failed(&primary);
            self.phase = Phase::Open;
            return Ok(());
        }
        if !self.host.command_exists(&primary) {
            self.render_missing(&primary);
            self.phase = Phase::Open;
            return Ok(());
        }
        let argv = build_args(&self.config.command, self.config.model.as_deref());
        self.spawn(argv)
    }

    fn resolve_selection_kind(&mut self) -> Option<SelectionKind> {
        if let Some(kind) = self.host.mode().selection_kind() {
            return Some(kind);
        }
        // Invoked outside an active selection: bring the last one back.
        if self.host.reselect().is_err() {
            return None;
        }
        self.host.mode().selection_kind()
    }

    fn handle_missing_executable(&mut self, primary: &str) -> Result<()> {
        if self.config.autoinstall {
            self.awaiting_install = true;
            if let Err(err) = self.host.prompt_install(primary) {
                self.awaiting_install = false;
                warn!("install prompt failed: {err:#}");
                self.render_install_failed(primary);
                self.phase = Phase::Open;
            }
            return Ok(());
        }
        self.render_missing(primary);
        self.phase = Phase::Open;
        Ok(())
    }

    fn spawn(&mut self, argv: Vec<String>) -> Result<()> {
        let cwd = self.resolve_cwd();
        let request = SpawnRequest {
            argv,
            cwd,
            capture: self.config.capture,
            surface: self.surface,
        };
        let spawned = match self.host.spawn(request) {
            Ok(spawned) => spawned,
            Err(err) => {
                self.phase = Phase::Open;
                let message = format!(
                    "failed to start `{}`: {err:#}",
                    self.config.command.primary()
                );
                self.host.notify(NotifyLevel::Error, &message);
                return Err(err);
            }
        };
        info!(id = spawned.id.0, "agent process started");
        self.process = Some(ProcessHandle {
            id: spawned.id,
            capture: self.config.capture,
            events: spawned.events,
        });
        self.ready = false;
        self.pending.clear();
        self.timers.reset();
        self.phase = Phase::Running;
        Ok(())
    }

    fn resolve_cwd(&self) -> Option<PathBuf> {
        match self.config.working_dir {
            WorkingDirPolicy::ProcessCwd => None,
            WorkingDirPolicy::BufferDir => {
                let name = self.host.buffer_name();
                if name.is_empty() {
                    return None;
                }
                let dir = Path::new(&name).parent()?;
                if dir.as_os_str().is_empty() || !dir.is_dir() {
                    return None;
                }
                Some(dir.to_path_buf())
            }
        }
    }

    fn surface_spec(&self, focus: bool) -> SurfaceSpec {
        SurfaceSpec {
            placement: self.config.placement,
            width: match self.config.placement {
                Placement::Float => self.config.float_width,
                Placement::Panel => self.config.panel_width,
            },
            height: self.config.float_height,
            focus,
        }
    }

    fn handle_event(&mut self, event: ProcessEvent) {
        match event {
            ProcessEvent::Output(bytes) => self.on_output(&bytes),
            ProcessEvent::Stdout(line) => self.append_line(&line),
            ProcessEvent::Stderr(line) => self.append_line(&format!("[stderr] {line}")),
            ProcessEvent::Exit(code) => self.on_exit(code),
        }
    }

    fn on_output(&mut self, bytes: &[u8]) {
        let capture = match &self.process {
            Some(handle) => handle.capture,
            None => return,
        };
        if capture != CaptureMode::Terminal || self.ready {
            return;
        }
        if let Some(pattern) = &self.ready_pattern {
            let cleaned = String::from_utf8_lossy(&strip_ansi_escapes::strip(bytes)).into_owned();
            if !pattern.is_match(&cleaned) {
                return;
            }
        }
        self.arm_timer(
            TimerKind::ReadyProbe,
            Duration::from_millis(self.config.probe_debounce_ms),
        );
    }

    fn on_exit(&mut self, code: i32) {
        let Some(handle) = self.process.take() else {
            return;
        };
        if !self.pending.is_empty() {
            warn!(
                dropped = self.pending.len(),
                "agent exited with queued payloads"
            );
        }
        self.ready = false;
        self.pending.clear();
        self.timers.reset();
        if handle.capture == CaptureMode::Buffered {
            self.append_line(&format!("[process exited with code {code}]"));
        }
        self.phase = if self.surface.is_some() {
            Phase::Open
        } else {
            Phase::Closed
        };
        info!(code, "agent process exited");
    }

    fn append_line(&mut self, line: &str) {
        if let Some(surface) = self.surface {
            self.host.append_output(surface, line);
        }
    }

    fn arm_timer(&mut self, kind: TimerKind, delay: Duration) {
        if self.timers.arm(kind) {
            self.host.schedule(kind, delay);
        }
    }

    fn mark_ready(&mut self) {
        if self.ready {
            return;
        }
        self.ready = true;
        debug!("agent input ready");
        self.flush_pending();
    }

    fn flush_pending(&mut self) {
        let Some(id) = self.process.as_ref().map(|handle| handle.id) else {
            return;
        };
        while let Some(payload) = self.pending.pop_front() {
            if let Err(err) = self.host.write(id, payload.as_bytes()) {
                // Keep the failing payload and everything behind it, in order.
                self.pending.push_front(payload);
                let message = format!("failed to flush queued message: {err:#}");
                self.host.notify(NotifyLevel::Error, &message);
                return;
            }
        }
    }

    fn render_missing(&mut self, primary: &str) {
        let Some(surface) = self.surface else { return };
        let lines = vec![
            format!("`{primary}` was not found on this system."),
            String::new(),
            String::from("Install it and reopen, or enable autoinstall to be prompted here."),
        ];
        self.host.render_message(surface, &lines);
    }

    fn render_install_failed(&mut self, primary: &str) {
        let Some(surface) = self.surface else { return };
        let lines = vec![
            format!("Installation of `{primary}` did not complete."),
            String::from("Install it manually and reopen."),
        ];
        self.host.render_message(surface, &lines);
    }
}

/// Payload header and body for a sent selection, always ending with a blank
/// line so the agent sees a complete block.
fn selection_payload(buffer_name: &str, sel: &Selection) -> String {
    let base = Path::new(buffer_name)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| buffer_name.to_string());
    let base = if base.is_empty() {
        "[No Name]".to_string()
    } else {
        base
    };
    let mut payload = format!(
        "File: {}:{}-{}\n\n{}",
        base, sel.start_line, sel.end_line, sel.text
    );
    while !payload.ends_with("\n\n") {
        payload.push('\n');
    }
    payload
}
