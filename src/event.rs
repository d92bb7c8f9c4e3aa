//! Event values delivered to notification handlers.

use tokio::signal::unix::SignalKind;

/// What woke a listening unit.
///
/// `Cancelled` plays the role of an out-of-band sentinel: it tells the
/// handler that the invocation was triggered by token cancellation, not by
/// a real OS signal. Being a separate variant, it cannot collide with any
/// signal number on any platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A registered OS signal arrived.
    Signal(SignalKind),
    /// The governing cancellation token became cancelled.
    Cancelled,
}

impl Event {
    /// The signal that triggered this event, if there was one.
    pub fn signal(&self) -> Option<SignalKind> {
        match self {
            Event::Signal(kind) => Some(*kind),
            Event::Cancelled => None,
        }
    }

    /// Whether this event was produced by cancellation rather than a signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Event::Cancelled)
    }
}
