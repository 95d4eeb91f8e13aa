//! Progress notifications for UIs.
//!
//! A paid request moves through `paying` (wallet and confirmation),
//! `registering` (retry with the proof) and ends in `done` or `error`.
//! Free requests emit nothing.

use std::fmt;
use std::sync::Arc;

/// A user-visible stage of a paid request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Settling the transfer.
    Paying,
    /// Retrying the request with the payment proof.
    Registering,
    /// The paid response was received.
    Done,
    /// The paid request failed.
    Error,
}

impl Phase {
    /// Lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paying => "paying",
            Self::Registering => "registering",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives [`Phase`] changes. Called inline; keep it quick.
pub trait PhaseListener: Send + Sync {
    /// Called on entering `phase`.
    fn on_phase(&self, phase: Phase);
}

impl<F> PhaseListener for F
where
    F: Fn(Phase) + Send + Sync,
{
    fn on_phase(&self, phase: Phase) {
        self(phase);
    }
}

/// An ordered set of listeners.
#[derive(Clone, Default)]
pub struct PhaseListeners(Vec<Arc<dyn PhaseListener>>);

impl PhaseListeners {
    /// Appends a listener.
    pub fn push(&mut self, listener: impl PhaseListener + 'static) {
        self.0.push(Arc::new(listener));
    }

    /// Notifies every listener in registration order.
    pub fn emit(&self, phase: Phase) {
        for listener in &self.0 {
            listener.on_phase(phase);
        }
    }

    /// Number of listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no listeners.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for PhaseListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseListeners")
            .field("len", &self.0.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn listeners_run_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = PhaseListeners::default();
        let first = Arc::clone(&seen);
        listeners.push(move |phase: Phase| first.lock().unwrap().push(format!("a:{phase}")));
        let second = Arc::clone(&seen);
        listeners.push(move |phase: Phase| second.lock().unwrap().push(format!("b:{phase}")));

        listeners.emit(Phase::Paying);
        listeners.emit(Phase::Done);

        assert_eq!(
            *seen.lock().unwrap(),
            ["a:paying", "b:paying", "a:done", "b:done"]
        );
    }
}
