use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::LedgerEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for ledger changes, one channel per calendar day.
pub struct NotifyHub {
    channels: DashMap<NaiveDate, broadcast::Sender<LedgerEvent>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to bookings and cancellations on `date`. Creates the channel if needed.
    pub fn subscribe(&self, date: NaiveDate) -> broadcast::Receiver<LedgerEvent> {
        let sender = self
            .channels
            .entry(date)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification on the event's day. No-op if nobody is listening;
    /// a channel whose subscribers have all gone is dropped here.
    pub fn send(&self, event: &LedgerEvent) {
        let date = event.appointment().date;
        let Some(sender) = self.channels.get(&date) else { return };
        let _ = sender.send(event.clone());
        let idle = sender.receiver_count() == 0;
        // Release the shard guard before removing from the same map
        drop(sender);
        if idle {
            self.channels.remove_if(&date, |_, s| s.receiver_count() == 0);
        }
    }

    /// Drop channels whose subscribers have all gone away.
    pub fn prune(&self) {
        self.channels.retain(|_, sender| sender.receiver_count() > 0);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
