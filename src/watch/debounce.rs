// src/watch/debounce.rs

//! Fixed-window coalescing of raw change signals.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

use crate::engine::RuntimeEvent;
use crate::types::BindingName;

/// Collapse bursts of change signals into one trigger per window.
///
/// The window opens on the first signal after a quiet period and closes
/// `window` later, regardless of how many more signals arrive; then exactly
/// one `BindingTriggered` is sent. Returns when `signals` closes or the
/// runtime stops listening.
pub async fn coalesce(
    binding: BindingName,
    mut signals: mpsc::UnboundedReceiver<()>,
    window: Duration,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    loop {
        if signals.recv().await.is_none() {
            break;
        }

        let deadline = Instant::now() + window;
        let mut absorbed = 0usize;
        let mut closed = false;

        loop {
            tokio::select! {
                _ = sleep_until(deadline) => break,
                msg = signals.recv() => match msg {
                    Some(()) => absorbed += 1,
                    None => {
                        closed = true;
                        break;
                    }
                },
            }
        }

        trace!(binding = %binding, absorbed, "coalescing window closed");
        debug!(binding = %binding, "change detected; triggering binding");

        let event = RuntimeEvent::BindingTriggered {
            binding: binding.clone(),
        };
        if runtime_tx.send(event).await.is_err() {
            debug!(binding = %binding, "runtime channel closed; stopping coalescer");
            return;
        }

        if closed {
            break;
        }
    }

    debug!(binding = %binding, "coalescer finished");
}
