//! Change notification between contexts
//!
//! A pulse is a timestamp written under a channel's pulse key. It carries no
//! payload; it only tells listeners to re-read. Notices reach handlers on two
//! paths:
//!
//! - `Origin::Local`: dispatched synchronously inside [`ChangeBus::pulse`],
//!   because the backend change feed never reports a context's own writes.
//! - `Origin::Remote`: queued by the backend when another context writes a
//!   watched key, delivered when this context calls [`ChangeBus::pump`] or
//!   [`ChangeBus::wait`].
//!
//! Handlers can be invoked more than once for one logical change (a task
//! write touches both the data key and the pulse key) and must re-read state
//! rather than apply deltas.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::keys::Channel;
use crate::storage::{KeyedStore, StorageChange};

/// Where a change notice came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Local,
    Remote,
}

/// Delivered to subscribers of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeNotice {
    pub channel: Channel,
    pub key: String,
    pub origin: Origin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&ChangeNotice) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    channels: Vec<Channel>,
    handler: Handler,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Publish/subscribe notifications for one context.
#[derive(Clone)]
pub struct ChangeBus {
    store: KeyedStore,
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
    next_id: Arc<AtomicU64>,
    last_stamp: Arc<Mutex<i64>>,
    feed: Arc<Mutex<Option<Receiver<StorageChange>>>>,
}

impl ChangeBus {
    pub fn new(store: KeyedStore) -> Self {
        Self {
            store,
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            last_stamp: Arc::new(Mutex::new(0)),
            feed: Arc::new(Mutex::new(None)),
        }
    }

    /// Write a fresh timestamp under the channel's pulse key and notify
    /// same-context subscribers. Returns the stamp written.
    pub fn pulse(&self, channel: Channel) -> i64 {
        self.pulse_with(channel, |stamp| stamp.to_string())
    }

    /// Like [`ChangeBus::pulse`], with the stored value rendered by `render`.
    ///
    /// The stamp is epoch milliseconds, bumped past the previously stored
    /// value so two pulses within one millisecond still differ.
    pub(crate) fn pulse_with(&self, channel: Channel, render: impl FnOnce(i64) -> String) -> i64 {
        let key = channel.pulse_key();
        let stored = self
            .store
            .get_text(key)
            .and_then(|text| parse_stamp(&text))
            .unwrap_or(0);

        let stamp = {
            let mut last = lock(&self.last_stamp);
            let stamp = Utc::now().timestamp_millis().max(stored + 1).max(*last + 1);
            *last = stamp;
            stamp
        };

        self.store.set_text(key, &render(stamp));
        self.dispatch(&ChangeNotice {
            channel,
            key: key.to_string(),
            origin: Origin::Local,
        });
        stamp
    }

    /// Register `handler` for every change on any of `channels`.
    pub fn subscribe<F>(&self, channels: &[Channel], handler: F) -> SubscriptionId
    where
        F: Fn(&ChangeNotice) + Send + Sync + 'static,
    {
        self.attach_feed();
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.subscriptions).push(Subscription {
            id,
            channels: channels.to_vec(),
            handler: Arc::new(handler),
        });
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = lock(&self.subscriptions);
        let before = subscriptions.len();
        subscriptions.retain(|sub| sub.id != id);
        subscriptions.len() != before
    }

    /// Deliver every queued cross-context change. Returns the number of
    /// storage changes processed.
    pub fn pump(&self) -> usize {
        let mut changes = Vec::new();
        {
            let feed = lock(&self.feed);
            let Some(rx) = feed.as_ref() else {
                return 0;
            };
            loop {
                match rx.try_recv() {
                    Ok(change) => changes.push(change),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        tracing::debug!("change feed closed");
                        break;
                    }
                }
            }
        }
        let count = changes.len();
        for change in changes {
            self.deliver_remote(&change);
        }
        count
    }

    /// Block up to `timeout` for a cross-context change, then deliver it and
    /// anything else already queued.
    pub fn wait(&self, timeout: Duration) -> usize {
        self.attach_feed();
        let first = {
            let feed = lock(&self.feed);
            let Some(rx) = feed.as_ref() else {
                return 0;
            };
            match rx.recv_timeout(timeout) {
                Ok(change) => change,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return 0,
            }
        };
        self.deliver_remote(&first);
        1 + self.pump()
    }

    fn attach_feed(&self) {
        let mut feed = lock(&self.feed);
        if feed.is_some() {
            return;
        }
        match self.store.backend().watch() {
            Ok(rx) => *feed = Some(rx),
            Err(err) => {
                tracing::warn!(error = %err, "cross-context change feed unavailable");
            }
        }
    }

    fn deliver_remote(&self, change: &StorageChange) {
        for channel in Channel::for_key(&change.key) {
            self.dispatch(&ChangeNotice {
                channel,
                key: change.key.clone(),
                origin: Origin::Remote,
            });
        }
    }

    fn dispatch(&self, notice: &ChangeNotice) {
        // Handlers may subscribe or pulse again; call them outside the lock.
        let handlers: Vec<Handler> = lock(&self.subscriptions)
            .iter()
            .filter(|sub| sub.channels.contains(&notice.channel))
            .map(|sub| Arc::clone(&sub.handler))
            .collect();

        tracing::debug!(
            channel = %notice.channel,
            key = %notice.key,
            origin = ?notice.origin,
            handlers = handlers.len(),
            "dispatching change notice"
        );
        for handler in handlers {
            handler(notice);
        }
    }
}

/// Extract the timestamp of a stored pulse: plain digits, or a record with `ts`.
fn parse_stamp(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(stamp) = text.trim_matches('"').parse::<i64>() {
        return Some(stamp);
    }
    serde_json::from_str::<serde_json::Value>(text)
        .ok()?
        .get("ts")?
        .as_i64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys;
    use crate::storage::MemoryArea;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn pulses_are_strictly_increasing() {
        let store = KeyedStore::new(MemoryArea::new().context());
        let bus = ChangeBus::new(store.clone());

        let first = bus.pulse(Channel::Tasks);
        let second = bus.pulse(Channel::Tasks);
        assert!(second > first);
        assert_eq!(store.get_text(keys::TASKS_PULSE), Some(second.to_string()));
    }

    #[test]
    fn pulse_moves_past_a_future_stored_value() {
        let store = KeyedStore::new(MemoryArea::new().context());
        let future = Utc::now().timestamp_millis() + 60_000;
        store.set_text(keys::ROOMS_PULSE, &future.to_string());

        let bus = ChangeBus::new(store);
        assert_eq!(bus.pulse(Channel::Rooms), future + 1);
    }

    #[test]
    fn local_dispatch_is_synchronous_and_filtered() {
        let bus = ChangeBus::new(KeyedStore::new(MemoryArea::new().context()));
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let id = bus.subscribe(&[Channel::Staff], move |notice| {
            assert_eq!(notice.origin, Origin::Local);
            seen.fetch_add(1, Ordering::SeqCst);
        });

        bus.pulse(Channel::Staff);
        bus.pulse(Channel::Tasks);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.pulse(Channel::Staff);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stamp_parsing_accepts_records() {
        assert_eq!(parse_stamp("1718000000000"), Some(1_718_000_000_000));
        assert_eq!(parse_stamp(r#"{"type":"reset","ts":42}"#), Some(42));
        assert_eq!(parse_stamp("junk"), None);
    }
}
