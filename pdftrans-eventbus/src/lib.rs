//! # pdftrans-eventbus
//!
//! An in-process, task-keyed publish/subscribe fan-out of [`Event`]s.
//! Decouples agents from the transport that eventually ships events to
//! clients (the SSE endpoint in `pdftrans-server`). The bus never persists
//! events; replay after a crash is out of scope.

use pdftrans_core::{Event, EventPublisher};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

/// A subscriber's FIFO handle. Dropping it (or calling `EventBus::unsubscribe`
/// with its id) detaches it from the bus.
pub struct Subscription {
    task_id: String,
    id: u64,
    receiver: UnboundedReceiver<Event>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Receive the next event, or `None` once the bus side has been dropped.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }
}

struct Subscriber {
    id: u64,
    sender: UnboundedSender<Event>,
}

#[derive(Default)]
struct Subscribers {
    by_task: HashMap<String, Vec<Subscriber>>,
}

/// Process-wide fan-out of progress events, keyed by task id. Multiple
/// subscribers for the same task each receive an independent copy; different
/// task ids are fully isolated.
pub struct EventBus {
    subscribers: Mutex<Subscribers>,
    next_id: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self { subscribers: Mutex::new(Subscribers::default()), next_id: AtomicU64::new(1) }
    }

    /// Returns the process-global singleton, lazily initialized.
    pub fn global() -> &'static EventBus {
        static INSTANCE: OnceLock<EventBus> = OnceLock::new();
        INSTANCE.get_or_init(EventBus::new)
    }

    pub fn subscribe(&self, task_id: impl Into<String>) -> Subscription {
        let task_id = task_id.into();
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let mut subscribers = self.subscribers.lock().expect("eventbus mutex poisoned");
        subscribers.by_task.entry(task_id.clone()).or_default().push(Subscriber { id, sender });

        Subscription { task_id, id, receiver }
    }

    /// Idempotent; safe to call for an unknown task or an already-removed id.
    pub fn unsubscribe(&self, task_id: &str, subscriber_id: u64) {
        let mut subscribers = self.subscribers.lock().expect("eventbus mutex poisoned");
        if let Some(list) = subscribers.by_task.get_mut(task_id) {
            list.retain(|s| s.id != subscriber_id);
            if list.is_empty() {
                subscribers.by_task.remove(task_id);
            }
        }
    }

    /// Enqueue `event` on every queue registered for `task_id`. A no-op when
    /// there are no subscribers (the event is dropped silently).
    pub fn publish(&self, task_id: &str, event: Event) {
        let subscribers = self.subscribers.lock().expect("eventbus mutex poisoned");
        let Some(list) = subscribers.by_task.get(task_id) else {
            trace!(task_id, "publish with no subscribers, dropping event");
            return;
        };
        for subscriber in list {
            // A closed receiver (subscriber dropped without unsubscribing)
            // simply fails to deliver; it is cleaned up lazily on next publish.
            let _ = subscriber.sender.send(event.clone());
        }
    }

    pub fn subscriber_count(&self, task_id: &str) -> usize {
        let subscribers = self.subscribers.lock().expect("eventbus mutex poisoned");
        subscribers.by_task.get(task_id).map(|l| l.len()).unwrap_or(0)
    }
}

/// A per-task handle implementing `EventPublisher`, bound to one `task_id`,
/// for threading through an `AgentContext` without agents depending on the
/// rest of the bus's API surface.
pub struct TaskPublisher {
    bus: &'static EventBus,
    task_id: String,
}

impl TaskPublisher {
    pub fn new(bus: &'static EventBus, task_id: impl Into<String>) -> Self {
        Self { bus, task_id: task_id.into() }
    }
}

impl EventPublisher for TaskPublisher {
    fn publish(&self, event: Event) {
        self.bus.publish(&self.task_id, event);
    }
}
