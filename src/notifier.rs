//! Signal notifiers and their listening units.
//!
//! # Responsibilities
//! - Register interest in a set of OS signals
//! - Dispatch a handler on signal arrival or token cancellation
//! - Enforce the once/repeat dispatch policy
//! - Release every OS registration on every exit path
//!
//! # Design Decisions
//! - One spawned task per `notify` call; no central event loop
//! - Registration happens synchronously in `notify`, so failures surface
//!   to the caller instead of dying silently inside the task
//! - The select loop is biased: when a signal and cancellation are ready
//!   in the same poll, cancellation wins
//! - Handler panics are caught so they cannot corrupt the loop; their
//!   disposition is the caller's choice via `panic_hook`

use std::any::Any;
use std::fmt;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures_util::future::select_all;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio_util::sync::CancellationToken;

use crate::event::Event;

/// Hook invoked with the payload of a panicking handler.
pub type PanicHook = Arc<dyn Fn(Box<dyn Any + Send>) + Send + Sync>;

/// Errors surfaced by [`Notifier::notify`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The OS-level registration for a signal failed.
    #[error("failed to register listener for signal {signal:?}")]
    Register {
        /// The signal whose registration was refused.
        signal: SignalKind,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },
}

/// Dispatch policy for a [`Notifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// The handler fires for at most one event, then the unit stops.
    Once,
    /// The handler fires for every signal delivery until cancellation.
    Repeat,
}

/// Immutable description of a signal subscription.
///
/// A `Notifier` captures a signal set and a dispatch policy. Calling
/// [`notify`](Notifier::notify) starts an independent listening unit; the
/// same value can be used for any number of `notify` calls, each with its
/// own OS registration and its own delivery stream.
///
/// The signal set may be empty, in which case the handler only ever fires
/// on cancellation. Duplicate entries are permitted; each entry gets its
/// own delivery stream, so a repeating unit fires once per entry per
/// delivery.
#[derive(Clone)]
pub struct Notifier {
    policy: Policy,
    signals: Vec<SignalKind>,
    panic_hook: Option<PanicHook>,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("policy", &self.policy)
            .field("signals", &self.signals)
            .finish_non_exhaustive()
    }
}

impl Notifier {
    /// Build a notifier with an explicit policy.
    pub fn new<I>(policy: Policy, signals: I) -> Self
    where
        I: IntoIterator<Item = SignalKind>,
    {
        Self {
            policy,
            signals: signals.into_iter().collect(),
            panic_hook: None,
        }
    }

    /// Build a one-shot notifier: the handler fires for the first signal or
    /// for cancellation, whichever comes first, then the unit stops.
    pub fn once<I>(signals: I) -> Self
    where
        I: IntoIterator<Item = SignalKind>,
    {
        Self::new(Policy::Once, signals)
    }

    /// Build a repeating notifier: the handler fires for every signal
    /// delivery until the token is cancelled, then fires one final
    /// [`Event::Cancelled`] and stops.
    pub fn repeat<I>(signals: I) -> Self
    where
        I: IntoIterator<Item = SignalKind>,
    {
        Self::new(Policy::Repeat, signals)
    }

    /// Install a hook that receives the payload of a panicking handler.
    ///
    /// Without a hook, panics are caught and logged at error level. The
    /// listening unit keeps running either way.
    pub fn panic_hook<H>(mut self, hook: H) -> Self
    where
        H: Fn(Box<dyn Any + Send>) + Send + Sync + 'static,
    {
        self.panic_hook = Some(Arc::new(hook));
        self
    }

    /// This notifier's dispatch policy.
    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// The configured signal set, in registration order.
    pub fn signals(&self) -> &[SignalKind] {
        &self.signals
    }

    /// Start a listening unit bound to `token` and `handler`.
    ///
    /// Registers one delivery stream per configured signal, then spawns the
    /// unit and returns immediately. The handler runs on the unit's task:
    /// with [`Event::Signal`] for each delivery (subject to the policy) and
    /// with [`Event::Cancelled`] exactly once if the token is cancelled
    /// first, after which the unit stops regardless of policy.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Register`] if the OS refuses any registration; no
    /// unit is spawned and any streams already created are released.
    pub fn notify<F>(&self, token: CancellationToken, handler: F) -> Result<(), Error>
    where
        F: FnMut(Event) + Send + 'static,
    {
        let mut streams = Vec::with_capacity(self.signals.len());
        for &kind in &self.signals {
            let stream = signal(kind).map_err(|source| Error::Register {
                signal: kind,
                source,
            })?;
            streams.push(stream);
        }

        let unit = ListenUnit {
            kinds: self.signals.clone(),
            streams,
            policy: self.policy,
            token,
            panic_hook: self.panic_hook.clone(),
        };
        tokio::spawn(unit.run(handler));
        Ok(())
    }
}

/// One spawned listening task.
///
/// Owns its OS registrations (the `Signal` streams) for its whole lifetime;
/// dropping them on return releases the registrations on every exit path.
struct ListenUnit {
    kinds: Vec<SignalKind>,
    streams: Vec<Signal>,
    policy: Policy,
    token: CancellationToken,
    panic_hook: Option<PanicHook>,
}

impl ListenUnit {
    async fn run<F>(mut self, mut handler: F)
    where
        F: FnMut(Event) + Send + 'static,
    {
        tracing::trace!(signals = ?self.kinds, policy = ?self.policy, "listening unit started");
        loop {
            let event = tokio::select! {
                biased;
                _ = self.token.cancelled() => Event::Cancelled,
                received = next_signal(&mut self.streams) => match received {
                    Some(idx) => Event::Signal(self.kinds[idx]),
                    None => {
                        tracing::debug!("listening unit stopped: signal streams closed");
                        return;
                    }
                },
            };

            self.dispatch(&mut handler, event);

            match event {
                Event::Cancelled => {
                    tracing::trace!("listening unit stopped: token cancelled");
                    return;
                }
                Event::Signal(_) if self.policy == Policy::Once => {
                    tracing::trace!("listening unit stopped: one-shot event dispatched");
                    return;
                }
                Event::Signal(_) => {}
            }
        }
    }

    /// Invoke the handler, isolating the loop from handler panics.
    fn dispatch<F>(&self, handler: &mut F, event: Event)
    where
        F: FnMut(Event),
    {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| handler(event))) {
            match &self.panic_hook {
                Some(hook) => hook(payload),
                None => {
                    tracing::error!(
                        ?event,
                        panic = panic_message(&*payload),
                        "notification handler panicked"
                    );
                }
            }
        }
    }
}

/// Resolves with the index of the next stream that yields a delivery, or
/// `None` once every stream has closed. Pends forever on an empty set.
async fn next_signal(streams: &mut [Signal]) -> Option<usize> {
    if streams.is_empty() {
        return std::future::pending().await;
    }
    let recvs = streams.iter_mut().map(|s| Box::pin(s.recv()));
    let (received, idx, _) = select_all(recvs).await;
    received.map(|()| idx)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "opaque panic payload"
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use super::*;

    #[test]
    fn factories_store_policy_and_signals() {
        let notifier = Notifier::once([SignalKind::hangup(), SignalKind::hangup()]);
        assert_eq!(notifier.policy(), Policy::Once);
        assert_eq!(
            notifier.signals(),
            &[SignalKind::hangup(), SignalKind::hangup()]
        );

        let notifier = Notifier::repeat([]);
        assert_eq!(notifier.policy(), Policy::Repeat);
        assert!(notifier.signals().is_empty());
    }

    #[tokio::test]
    async fn empty_set_fires_only_on_cancellation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        Notifier::repeat([])
            .notify(token.clone(), move |event| {
                tx.send(event).unwrap();
            })
            .unwrap();

        token.cancel();
        let event = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(event, Some(Event::Cancelled));

        // The unit is gone; the channel closes with nothing further in it.
        let end = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(end, None);
    }

    #[tokio::test]
    async fn forbidden_signal_registration_fails() {
        let token = CancellationToken::new();
        let result =
            Notifier::once([SignalKind::from_raw(libc::SIGKILL)]).notify(token, |_| {});
        assert!(matches!(result, Err(Error::Register { .. })));
    }

    #[test]
    fn panic_message_downcasts() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_message(&*payload), "owned boom");

        let payload: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(&*payload), "opaque panic payload");
    }
}
