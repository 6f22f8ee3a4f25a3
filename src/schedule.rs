//! One-shot timer scheduling for the readiness protocol.

use std::time::Duration;

/// The two timers racing to declare the agent's input stream consumable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Debounce after observed output before declaring readiness.
    ReadyProbe,
    /// Upper bound on how long readiness may stay unconfirmed.
    ReadyFallback,
}

/// Host-side timer service. The session arms at most one timer per kind and
/// expects a `Session::timer_fired` call with the same kind once the delay
/// elapses. Implementations must not block.
pub trait Scheduler {
    fn schedule(&mut self, kind: TimerKind, delay: Duration);
}

/// Tracks which one-shot timers are outstanding so a kind is never armed
/// twice concurrently.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimerSlots {
    probe: bool,
    fallback: bool,
}

impl TimerSlots {
    /// Marks `kind` outstanding. Returns false when it already was.
    pub fn arm(&mut self, kind: TimerKind) -> bool {
        let slot = self.slot_mut(kind);
        if *slot {
            return false;
        }
        *slot = true;
        true
    }

    /// Clears `kind`. Returns true when it was outstanding.
    pub fn clear(&mut self, kind: TimerKind) -> bool {
        std::mem::replace(self.slot_mut(kind), false)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        match kind {
            TimerKind::ReadyProbe => self.probe,
            TimerKind::ReadyFallback => self.fallback,
        }
    }

    fn slot_mut(&mut self, kind: TimerKind) -> &mut bool {
        match kind {
            TimerKind::ReadyProbe => &mut self.probe,
            TimerKind::ReadyFallback => &mut self.fallback,
        }
    }
}
