//! Derived cancellation: signal arrival expressed as token cancellation.

use tokio::signal::unix::SignalKind;
use tokio_util::sync::CancellationToken;

use crate::notifier::{Error, Notifier};

/// Return a child of `parent` that becomes cancelled when `parent` is
/// cancelled, when any signal in `signals` arrives, or when the returned
/// token's own [`cancel`](CancellationToken::cancel) is called, whichever
/// happens first. `cancel` is idempotent; repeated calls are no-ops.
///
/// The internal one-shot listener is bound to `parent`, not to the child:
/// cancelling the child must not tear the listener down while a signal is
/// in flight, and parent cancellation still winds everything up.
///
/// # Errors
///
/// Returns [`Error::Register`] if the OS refuses any signal registration.
pub fn cancel_on_signal<I>(
    parent: &CancellationToken,
    signals: I,
) -> Result<CancellationToken, Error>
where
    I: IntoIterator<Item = SignalKind>,
{
    let child = parent.child_token();
    let cancel = child.clone();
    Notifier::once(signals).notify(parent.clone(), move |_| cancel.cancel())?;
    Ok(child)
}

/// [`cancel_on_signal`] preconfigured for SIGINT and SIGTERM, the usual
/// graceful-shutdown pair.
pub fn cancel_on_termination(parent: &CancellationToken) -> Result<CancellationToken, Error> {
    cancel_on_signal(parent, [SignalKind::interrupt(), SignalKind::terminate()])
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn explicit_cancel_marks_child_done() {
        let parent = CancellationToken::new();
        let child = cancel_on_signal(&parent, []).unwrap();
        assert!(!child.is_cancelled());

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        // Idempotent.
        child.cancel();
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn parent_cancellation_propagates() {
        let parent = CancellationToken::new();
        let child = cancel_on_signal(&parent, []).unwrap();

        parent.cancel();
        timeout(Duration::from_secs(1), child.cancelled())
            .await
            .expect("derived token not cancelled by parent");
    }
}
