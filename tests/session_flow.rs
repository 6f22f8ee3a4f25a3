//! Drives a full session through the public API with a scripted host.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{bail, Result};
use crossbeam_channel::{unbounded, Sender};
use serde_json::json;

use agentdock::{
    Config, EditorMode, EditorOps, Installer, Mark, Notifier, NotifyLevel, OpenOptions, Phase,
    ProcessEvent, ProcessId, ProcessOps, Scheduler, SendOptions, Session, SpawnRequest,
    SpawnedProcess, SurfaceId, SurfaceSpec, TabPolicy, TimerKind, WindowId,
};

#[derive(Default)]
struct HostState {
    next_surface: u64,
    visible: HashSet<u64>,
    focused: Option<SurfaceId>,
    buffer_name: String,
    buffer_lines: Vec<String>,
    mode: EditorMode,
    marks: (Mark, Mark),
    appended: Vec<String>,
    notes: Vec<(NotifyLevel, String)>,
    spawns: Vec<SpawnRequest>,
    event_tx: Option<Sender<ProcessEvent>>,
    writes: Vec<String>,
    scheduled: Vec<TimerKind>,
}

struct ScriptedHost {
    state: Rc<RefCell<HostState>>,
}

impl EditorOps for ScriptedHost {
    fn create_surface(&mut self, spec: &SurfaceSpec) -> Result<SurfaceId> {
        let mut state = self.state.borrow_mut();
        state.next_surface += 1;
        let id = SurfaceId(state.next_surface);
        state.visible.insert(id.0);
        if spec.focus {
            state.focused = Some(id);
        }
        Ok(id)
    }

    fn destroy_surface(&mut self, id: SurfaceId) {
        self.state.borrow_mut().visible.remove(&id.0);
    }

    fn surface_visible(&self, id: SurfaceId) -> bool {
        self.state.borrow().visible.contains(&id.0)
    }

    fn surface_focused(&self, id: SurfaceId) -> bool {
        self.state.borrow().focused == Some(id)
    }

    fn focus_surface(&mut self, id: SurfaceId) {
        self.state.borrow_mut().focused = Some(id);
    }

    fn current_window(&self) -> WindowId {
        WindowId(1)
    }

    fn focus_window(&mut self, _window: WindowId) {}

    fn buffer_name(&self) -> String {
        self.state.borrow().buffer_name.clone()
    }

    fn buffer_lines(&self) -> Vec<String> {
        self.state.borrow().buffer_lines.clone()
    }

    fn mode(&self) -> EditorMode {
        self.state.borrow().mode
    }

    fn selection_marks(&self) -> (Mark, Mark) {
        self.state.borrow().marks
    }

    fn reselect(&mut self) -> Result<()> {
        bail!("nothing to reselect")
    }

    fn exit_visual(&mut self) {
        self.state.borrow_mut().mode = EditorMode::Normal;
    }

    fn tab_policy(&self) -> TabPolicy {
        TabPolicy::default()
    }

    fn render_message(&mut self, _id: SurfaceId, _lines: &[String]) {}

    fn append_output(&mut self, _id: SurfaceId, line: &str) {
        self.state.borrow_mut().appended.push(line.to_string());
    }
}

impl ProcessOps for ScriptedHost {
    fn command_exists(&self, _name: &str) -> bool {
        true
    }

    fn spawn(&mut self, request: SpawnRequest) -> Result<SpawnedProcess> {
        let mut state = self.state.borrow_mut();
        state.spawns.push(request);
        let (tx, rx) = unbounded();
        state.event_tx = Some(tx);
        Ok(SpawnedProcess {
            id: ProcessId(7),
            events: rx,
        })
    }

    fn write(&mut self, _id: ProcessId, bytes: &[u8]) -> Result<()> {
        self.state
            .borrow_mut()
            .writes
            .push(String::from_utf8_lossy(bytes).into_owned());
        Ok(())
    }

    fn kill(&mut self, _id: ProcessId) -> Result<()> {
        Ok(())
    }
}

impl Scheduler for ScriptedHost {
    fn schedule(&mut self, kind: TimerKind, _delay: Duration) {
        self.state.borrow_mut().scheduled.push(kind);
    }
}

impl Notifier for ScriptedHost {
    fn notify(&mut self, level: NotifyLevel, message: &str) {
        self.state
            .borrow_mut()
            .notes
            .push((level, message.to_string()));
    }
}

impl Installer for ScriptedHost {
    fn prompt_install(&mut self, _tool: &str) -> Result<()> {
        bail!("install prompt unavailable")
    }
}

fn new_session(config: Config) -> (Session<ScriptedHost>, Rc<RefCell<HostState>>) {
    let state = Rc::new(RefCell::new(HostState::default()));
    let host = ScriptedHost {
        state: state.clone(),
    };
    (Session::new(host, config).expect("valid config"), state)
}

fn push_event(state: &Rc<RefCell<HostState>>, event: ProcessEvent) {
    let tx = state.borrow().event_tx.clone().expect("process running");
    tx.send(event).expect("event delivered");
}

#[test]
fn terminal_session_round_trip() {
    let config = Config::from_value(json!({
        "model": "o3-mini",
        "ready_pattern": "codex> "
    }))
    .expect("config");
    let (mut session, state) = new_session(config);

    {
        let mut state = state.borrow_mut();
        state.buffer_name = "/work/selection_test.lua".to_string();
        state.buffer_lines = vec!["print(1)".to_string(), "print(2)".to_string()];
        state.mode = EditorMode::VisualLine;
        state.marks = (Mark::new(1, 0), Mark::new(2, 0));
    }

    session.open(OpenOptions { focus: true }).unwrap();
    assert_eq!(session.phase(), Phase::Running);
    assert_eq!(
        state.borrow().spawns[0].argv,
        vec!["codex", "-m", "o3-mini"]
    );

    // Queued until the agent shows its prompt.
    session.send("hello", SendOptions::default()).unwrap();
    assert_eq!(session.pending_len(), 1);
    assert!(state.borrow().writes.is_empty());

    push_event(
        &state,
        ProcessEvent::Output(b"\x1b[32mcodex> \x1b[0m".to_vec()),
    );
    session.pump_events();
    assert!(state
        .borrow()
        .scheduled
        .contains(&TimerKind::ReadyProbe));
    session.timer_fired(TimerKind::ReadyProbe);
    assert!(session.is_ready());
    assert_eq!(state.borrow().writes, vec!["hello"]);

    // Selection rides on the live session.
    session
        .send_selection(SendOptions { submit: true })
        .unwrap();
    assert_eq!(
        state.borrow().writes[1],
        "File: selection_test.lua:1-2\n\nprint(1)\nprint(2)\n\n\n"
    );
    assert_eq!(state.borrow().mode, EditorMode::Normal);

    // Closing hides the surface but keeps the agent alive.
    session.close();
    assert_eq!(session.status_text(), "[codex]");
    push_event(&state, ProcessEvent::Exit(0));
    session.pump_events();
    assert_eq!(session.status_text(), "");
    assert_eq!(session.phase(), Phase::Closed);
    assert!(session.send("late", SendOptions::default()).is_err());
    let state = state.borrow();
    let (level, message) = state.notes.last().expect("warning surfaced");
    assert_eq!(*level, NotifyLevel::Warn);
    assert!(message.contains("no active session"));
}

#[test]
fn buffered_session_collects_tagged_output() {
    let config = Config::from_value(json!({ "capture": "buffered" })).expect("config");
    let (mut session, state) = new_session(config);

    session.open(OpenOptions::default()).unwrap();
    push_event(&state, ProcessEvent::Stdout("building".to_string()));
    push_event(&state, ProcessEvent::Stderr("deprecated flag".to_string()));
    push_event(&state, ProcessEvent::Exit(2));
    session.pump_events();

    let state = state.borrow();
    assert_eq!(
        state.appended,
        vec![
            "building",
            "[stderr] deprecated flag",
            "[process exited with code 2]"
        ]
    );
    assert!(state.scheduled.is_empty());
}
