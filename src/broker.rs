//! # Notification Broker
//!
//! Correlates notifications pushed by an agent with the tasks waiting on
//! them.
//!
//! The broker keeps a single registry of waiters and a buffer of
//! notifications nobody has asked for yet. Both sit behind one mutex so a
//! notification is either handed to exactly one waiter or buffered, never
//! both and never neither.
//!
//! Routing rules:
//!
//! - A waiter first scans the buffer, oldest first, and takes the first
//!   notification on its topic that satisfies its predicate.
//! - An arriving notification goes to the first registered waiter (in
//!   registration order) whose topic and predicate match. Otherwise it is
//!   buffered.
//! - Buffered notifications are discarded once older than the configured TTL
//!   or when the buffer is full (oldest first).
//! - A notification identical to one already delivered or buffered within
//!   the TTL is treated as a redelivery and ignored.
//! - Dropping a waiting future (timeout or caller cancellation) removes its
//!   registration. If a notification was handed to it in the same instant,
//!   that notification is routed again: to the next matching waiter, or to
//!   the front of the buffer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::notification::{Notification, Predicate};

/// Default time unmatched notifications are kept.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Default maximum number of unmatched notifications kept.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Shared waiter registry and notification buffer.
///
/// Cloning is cheap; clones share the same registry.
#[derive(Clone, Debug)]
pub struct Broker {
    registry: Arc<Mutex<Registry>>,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

impl Broker {
    /// Create a broker that keeps unmatched notifications for `ttl`, up to
    /// `capacity` of them.
    #[must_use]
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                ttl,
                capacity: capacity.max(1),
                next_id: 0,
                waiters: Vec::new(),
                buffer: VecDeque::new(),
                seen: VecDeque::new(),
            })),
        }
    }

    /// Route a notification to the first matching waiter or buffer it.
    pub fn publish(&self, notification: Notification) {
        let mut registry = lock(&self.registry);
        registry.prune();

        if registry.is_redelivery(&notification) {
            tracing::debug!("ignoring redelivered `{}` notification", notification.topic);
            return;
        }
        registry.remember(notification.clone());

        if let Some(notification) = registry.deliver(notification) {
            tracing::debug!("buffering unmatched `{}` notification", notification.topic);
            registry.buffer(notification);
        }
    }

    /// Wait for the first notification on `topic` satisfying `predicate`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] when nothing matches within `timeout`. The
    /// waiter's registration is removed before returning.
    pub async fn wait(
        &self, topic: &str, predicate: impl Predicate, timeout: Duration,
    ) -> Result<Notification> {
        let mut pending = {
            let mut registry = lock(&self.registry);
            registry.prune();

            if let Some(notification) = registry.take_buffered(topic, &predicate) {
                return Ok(notification);
            }

            let (tx, rx) = oneshot::channel();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.waiters.push(Waiter {
                id,
                topic: topic.to_string(),
                predicate: Box::new(predicate),
                tx,
            });
            tracing::debug!("waiter {id} registered for `{topic}`");

            Pending {
                id,
                rx,
                registry: Arc::clone(&self.registry),
                settled: false,
            }
        };

        match tokio::time::timeout(timeout, &mut pending.rx).await {
            Ok(Ok(notification)) => {
                pending.settled = true;
                Ok(notification)
            }
            Ok(Err(_)) | Err(_) => pending.settle().map_or_else(
                || {
                    Err(Error::Timeout {
                        topic: topic.to_string(),
                        timeout,
                    })
                },
                Ok,
            ),
        }
    }

    /// Number of waiters currently registered.
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.registry).waiters.len()
    }

    /// Number of unmatched notifications currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        let mut registry = lock(&self.registry);
        registry.prune();
        registry.buffer.len()
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    // registry invariants hold between statements, so a poisoned lock is
    // still usable
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct Registry {
    ttl: Duration,
    capacity: usize,
    next_id: u64,
    waiters: Vec<Waiter>,
    buffer: VecDeque<Received>,
    seen: VecDeque<Received>,
}

impl Registry {
    fn prune(&mut self) {
        let ttl = self.ttl;
        let before = self.buffer.len();
        self.buffer.retain(|r| r.at.elapsed() < ttl);
        if self.buffer.len() < before {
            tracing::debug!("aged out {} buffered notifications", before - self.buffer.len());
        }
        self.seen.retain(|r| r.at.elapsed() < ttl);
    }

    fn is_redelivery(&self, notification: &Notification) -> bool {
        self.seen.iter().any(|r| r.notification == *notification)
    }

    fn remember(&mut self, notification: Notification) {
        if self.seen.len() >= self.capacity {
            self.seen.pop_front();
        }
        self.seen.push_back(Received::now(notification));
    }

    // Hand the notification to the first live waiter that accepts it,
    // returning it if there is none.
    fn deliver(&mut self, mut notification: Notification) -> Option<Notification> {
        while let Some(pos) = self.waiters.iter().position(|w| w.accepts(&notification)) {
            let waiter = self.waiters.remove(pos);
            match waiter.tx.send(notification) {
                Ok(()) => {
                    tracing::debug!("notification delivered to waiter {}", waiter.id);
                    return None;
                }
                // receiver already gone: try the next waiter
                Err(returned) => notification = returned,
            }
        }
        Some(notification)
    }

    fn buffer(&mut self, notification: Notification) {
        if self.buffer.len() >= self.capacity {
            if let Some(dropped) = self.buffer.pop_front() {
                tracing::warn!(
                    "notification buffer full, discarding `{}` notification",
                    dropped.notification.topic
                );
            }
        }
        self.buffer.push_back(Received::now(notification));
    }

    fn take_buffered(&mut self, topic: &str, predicate: &dyn Predicate) -> Option<Notification> {
        let pos = self.buffer.iter().position(|r| {
            r.notification.topic == topic && predicate.matches(&r.notification.payload)
        })?;
        self.buffer.remove(pos).map(|r| r.notification)
    }

    // Route a notification a cancelled waiter was handed: to the next waiter
    // that accepts it, otherwise back to the front of the buffer ahead of
    // anything that arrived later.
    fn requeue(&mut self, notification: Notification) {
        if let Some(notification) = self.deliver(notification) {
            self.buffer.push_front(Received::now(notification));
        }
    }
}

#[derive(Debug)]
struct Received {
    notification: Notification,
    at: Instant,
}

impl Received {
    fn now(notification: Notification) -> Self {
        Self {
            notification,
            at: Instant::now(),
        }
    }
}

struct Waiter {
    id: u64,
    topic: String,
    predicate: Box<dyn Predicate>,
    tx: oneshot::Sender<Notification>,
}

impl Waiter {
    fn accepts(&self, notification: &Notification) -> bool {
        self.topic == notification.topic && self.predicate.matches(&notification.payload)
    }
}

impl std::fmt::Debug for Waiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter").field("id", &self.id).field("topic", &self.topic).finish()
    }
}

// A registered waiter. Dropping it deregisters the waiter.
struct Pending {
    id: u64,
    rx: oneshot::Receiver<Notification>,
    registry: Arc<Mutex<Registry>>,
    settled: bool,
}

impl Pending {
    // Deregister the waiter. When the waiter has already been removed by
    // `publish`, a notification is either sitting in the channel or was
    // never sent; claim it if present.
    fn settle(&mut self) -> Option<Notification> {
        if self.settled {
            return None;
        }
        self.settled = true;

        let mut registry = lock(&self.registry);
        if let Some(pos) = registry.waiters.iter().position(|w| w.id == self.id) {
            registry.waiters.remove(pos);
            tracing::debug!("waiter {} deregistered", self.id);
            return None;
        }
        drop(registry);
        self.rx.try_recv().ok()
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        if let Some(notification) = self.settle() {
            tracing::debug!("waiter {} cancelled, requeueing notification", self.id);
            lock(&self.registry).requeue(notification);
        }
    }
}
