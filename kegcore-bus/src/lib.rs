// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-process typed pub/sub event bus.
//!
//! Subscribers register for a named event kind (see [`kegcore_events::Event::kind`])
//! and are invoked, in an unspecified but stable order, whenever an event of
//! that kind is dispatched. Dispatch is strictly FIFO by publish order: one
//! call to [`EventHub::dispatch_next`] pulls the oldest queued event and
//! runs every subscriber registered for its kind before returning.
//!
//! This replaces the source system's decorator-based handler discovery
//! (`GetEventHandlers` introspection over an object's methods) with an
//! explicit registration step: callers build a `(kind, subscriber)` list at
//! construction time and feed it to the hub.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kegcore_events::Event;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, warn};

/// A subscriber invoked whenever an event of a kind it registered for is
/// dispatched. Implementations should be cheap and non-blocking; anything
/// that needs to make a network call should hand the work off to its own
/// task rather than await it inline, so one slow subscriber cannot stall
/// the dispatcher for every other subscriber of the same event.
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn handle(&self, event: &Event);
}

#[derive(Default)]
struct Subscriptions {
    by_kind: HashMap<&'static str, Vec<Arc<dyn Subscriber>>>,
}

/// The in-process event bus: a queue plus a subscription table.
pub struct EventHub {
    sender: mpsc::UnboundedSender<Event>,
    receiver: Mutex<mpsc::UnboundedReceiver<Event>>,
    subscriptions: RwLock<Subscriptions>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            subscriptions: RwLock::new(Subscriptions::default()),
        }
    }

    /// Registers `subscriber` for `kind`. Registering the same subscriber
    /// for the same kind twice is idempotent: the subscriber is compared by
    /// pointer identity, and a duplicate is not appended.
    pub async fn subscribe(&self, kind: &'static str, subscriber: Arc<dyn Subscriber>) {
        let mut subs = self.subscriptions.write().await;
        let list = subs.by_kind.entry(kind).or_default();
        if !list.iter().any(|existing| Arc::ptr_eq(existing, &subscriber)) {
            list.push(subscriber);
        }
    }

    /// Removes `subscriber` from `kind`'s subscription list. Removing an
    /// absent subscriber is tolerated.
    pub async fn unsubscribe(&self, kind: &'static str, subscriber: &Arc<dyn Subscriber>) {
        let mut subs = self.subscriptions.write().await;
        if let Some(list) = subs.by_kind.get_mut(kind) {
            list.retain(|existing| !Arc::ptr_eq(existing, subscriber));
        }
    }

    /// Enqueues `event`. Never blocks: the queue is unbounded in-memory,
    /// matching the default backpressure policy for this core.
    pub fn publish(&self, event: Event) {
        if self.sender.send(event).is_err() {
            // The receiver only disappears if the hub itself was dropped
            // mid-flight; nothing downstream can observe this event.
            warn!("publish on a hub with no dispatcher attached, event dropped");
        }
    }

    /// Waits up to `timeout` for the next queued event and dispatches it to
    /// every subscriber registered for its kind. Returns `true` if an event
    /// was dispatched, `false` on timeout (used by workers to poll a quit
    /// signal between dispatches).
    pub async fn dispatch_next(&self, timeout: Duration) -> bool {
        let event = {
            let mut receiver = self.receiver.lock().await;
            match tokio::time::timeout(timeout, receiver.recv()).await {
                Ok(Some(event)) => event,
                Ok(None) | Err(_) => return false,
            }
        };
        self.dispatch(event).await;
        true
    }

    /// Dispatches every event currently queued, without waiting for more to
    /// arrive. Returns the number dispatched.
    pub async fn flush(&self) -> usize {
        let mut count = 0;
        loop {
            let event = {
                let mut receiver = self.receiver.lock().await;
                match receiver.try_recv() {
                    Ok(event) => event,
                    Err(_) => break,
                }
            };
            self.dispatch(event).await;
            count += 1;
        }
        count
    }

    async fn dispatch(&self, event: Event) {
        let kind = event.kind();
        let subscribers = {
            let subs = self.subscriptions.read().await;
            subs.by_kind.get(kind).cloned().unwrap_or_default()
        };
        debug!(kind, subscriber_count = subscribers.len(), "dispatching event");

        let event = Arc::new(event);
        let mut joins = Vec::with_capacity(subscribers.len());
        for subscriber in subscribers {
            let event = Arc::clone(&event);
            joins.push(tokio::spawn(async move {
                subscriber.handle(&event).await;
            }));
        }
        // A subscriber panic must not prevent its siblings from having run
        // (they were already spawned) or from being waited on here; only
        // log it.
        for join in joins {
            if let Err(err) = join.await {
                warn!(kind, error = %err, "subscriber panicked while handling event");
            }
        }
    }
}
