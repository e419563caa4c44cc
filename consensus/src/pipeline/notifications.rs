//! Chain notifications
//!
//! Events raised while a block is being accepted are buffered and only
//! delivered once the acceptance succeeded. A failed acceptance discards them.

use consensus_core::Hash;
use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The block entered the DAG
    BlockAccepted { hash: Hash, main_tip_changed: bool },
    /// The block's effects were applied at `order`
    BlockConnected { hash: Hash, order: u64 },
    /// The block's effects were reverted
    BlockDisconnected { hash: Hash },
    Reorganization { old_tip: Hash, new_tip: Hash, detached: usize, attached: usize },
}

#[derive(Default)]
pub struct NotificationHub {
    subscribers: Mutex<Vec<Sender<Notification>>>,
    pending: Mutex<Vec<Notification>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<Notification> {
        let (sender, receiver) = unbounded();
        self.subscribers.lock().push(sender);
        receiver
    }

    pub(crate) fn queue(&self, notification: Notification) {
        self.pending.lock().push(notification);
    }

    /// Delivers buffered events in the order they were raised. Subscribers
    /// that dropped their receiver are forgotten.
    pub(crate) fn flush(&self) {
        let pending = std::mem::take(&mut *self.pending.lock());
        if pending.is_empty() {
            return;
        }
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|s| pending.iter().all(|n| s.send(n.clone()).is_ok()));
        debug!("Delivered {} notifications to {} subscribers", pending.len(), subscribers.len());
    }

    pub(crate) fn discard(&self) {
        self.pending.lock().clear();
    }
}
