//! Callback-based OS signal notification, unified with cooperative
//! cancellation.
//!
//! A [`Notifier`] captures a signal set and a dispatch policy. Calling
//! [`Notifier::notify`] spawns an independent listening unit that waits for
//! the first of two events: a registered signal arrives, or the supplied
//! [`CancellationToken`] is cancelled. Either way the handler is invoked
//! with an [`Event`] saying which it was. One-shot notifiers stop after the
//! first event; repeating notifiers fire for every delivery until
//! cancellation, which always produces one final [`Event::Cancelled`].
//!
//! [`cancel_on_signal`] builds on this to derive a child token that is
//! cancelled by signal arrival, by parent cancellation, or explicitly.
//!
//! Unix only.
//!
//! # Example
//!
//! ```no_run
//! use signal_notify::{Event, Notifier};
//! use tokio::signal::unix::SignalKind;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), signal_notify::Error> {
//!     let token = CancellationToken::new();
//!     Notifier::repeat([SignalKind::hangup()]).notify(token.clone(), |event| {
//!         match event {
//!             Event::Signal(_) => println!("reload requested"),
//!             Event::Cancelled => println!("shutting down"),
//!         }
//!     })?;
//!
//!     // ... run the application ...
//!     token.cancel();
//!     Ok(())
//! }
//! ```
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod cancel;
pub mod event;
pub mod notifier;

pub use cancel::{cancel_on_signal, cancel_on_termination};
pub use event::Event;
pub use notifier::{Error, Notifier, PanicHook, Policy};
