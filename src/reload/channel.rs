// src/reload/channel.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace};

/// Per-client buffer. A client that falls this far behind already has a
/// reload pending, so further signals are dropped for it.
const CLIENT_BUFFER: usize = 16;

/// The set of currently connected browser clients.
///
/// Delivery is best-effort: `notify_all` never fails, and clients whose
/// receiver is gone are pruned the next time a delivery to them fails.
#[derive(Debug, Default)]
pub struct ReloadChannel {
    clients: Mutex<HashMap<usize, mpsc::Sender<()>>>,
    next_id: AtomicUsize,
}

impl ReloadChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client. Each `()` received on the returned channel means
    /// "reload".
    pub fn subscribe(&self) -> (usize, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(CLIENT_BUFFER);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut clients) = self.clients.lock() {
            clients.insert(id, tx);
        }
        debug!(client = id, "live-reload client connected");
        (id, rx)
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Push a reload signal to every client. Returns how many clients it
    /// reached; zero clients is not an error.
    pub fn notify_all(&self) -> usize {
        let Ok(mut clients) = self.clients.lock() else {
            return 0;
        };

        let mut delivered = 0;
        clients.retain(|id, tx| match tx.try_send(()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(())) => {
                trace!(client = *id, "client already has a reload pending");
                delivered += 1;
                true
            }
            Err(TrySendError::Closed(())) => {
                debug!(client = *id, "pruning disconnected live-reload client");
                false
            }
        });
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_without_clients_is_a_no_op() {
        let channel = ReloadChannel::new();
        assert_eq!(channel.notify_all(), 0);
    }

    #[test]
    fn each_client_receives_exactly_one_signal() {
        let channel = ReloadChannel::new();
        let (_, mut a) = channel.subscribe();
        let (_, mut b) = channel.subscribe();

        assert_eq!(channel.notify_all(), 2);

        assert_eq!(a.try_recv(), Ok(()));
        assert!(a.try_recv().is_err());
        assert_eq!(b.try_recv(), Ok(()));
        assert!(b.try_recv().is_err());
    }

    #[test]
    fn disconnected_clients_are_pruned_on_failed_delivery() {
        let channel = ReloadChannel::new();
        let (_, keep) = channel.subscribe();
        let (_, gone) = channel.subscribe();
        drop(gone);

        assert_eq!(channel.client_count(), 2);
        assert_eq!(channel.notify_all(), 1);
        assert_eq!(channel.client_count(), 1);
        drop(keep);
    }

    #[test]
    fn slow_client_does_not_fail_notification() {
        let channel = ReloadChannel::new();
        let (_, _slow) = channel.subscribe();
        for _ in 0..(CLIENT_BUFFER * 2) {
            assert_eq!(channel.notify_all(), 1);
        }
    }
}
