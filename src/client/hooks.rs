//! Lifecycle callbacks invoked from [`GameClient::tick`](super::GameClient::tick).

use std::panic::{AssertUnwindSafe, catch_unwind};

use log::error;

use crate::{
    panic::format_panic,
    session::{DisconnectReason, SessionEvent},
};

/// Callback run after a connection is established.
pub type ConnectedHook = Box<dyn FnMut() + Send>;

/// Callback run when the session stops without being closed.
pub type DisconnectedHook = Box<dyn FnMut(&DisconnectReason) + Send>;

/// Callback run when recovery of a lost connection starts. Receives the
/// attempt number and the configured maximum.
pub type ReconnectingHook = Box<dyn FnMut(u32, u32) + Send>;

/// Registered lifecycle callbacks, each list run in registration order.
#[derive(Default)]
pub(crate) struct LifecycleHooks {
    pub(crate) connected: Vec<ConnectedHook>,
    pub(crate) disconnected: Vec<DisconnectedHook>,
    pub(crate) reconnecting: Vec<ReconnectingHook>,
}

impl LifecycleHooks {
    /// Run every callback registered for `event`.
    pub(crate) fn fire(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Connected => {
                for hook in &mut self.connected {
                    guarded("on_connected", || hook());
                }
            }
            SessionEvent::Disconnected(reason) => {
                for hook in &mut self.disconnected {
                    guarded("on_disconnected", || hook(reason));
                }
            }
            SessionEvent::Reconnecting {
                attempt,
                max_attempts,
            } => {
                for hook in &mut self.reconnecting {
                    guarded("on_reconnecting", || hook(*attempt, *max_attempts));
                }
            }
        }
    }
}

fn guarded(name: &str, call: impl FnOnce()) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(call)) {
        error!("{name} callback panicked: {}", format_panic(panic));
        crate::metrics::inc_handler_errors();
    }
}
