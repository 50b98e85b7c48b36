//! In-memory task store that announces every mutation on the event bus.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::domain::EventBus;

/// Publication name the store announces changes under.
pub const TASKS_PUBLICATION: &str = "tasks";

/// A single to-do item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Stable identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Completion flag.
    pub done: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Insertion-ordered task list.
#[derive(Debug)]
pub struct TaskStore {
    tasks: RwLock<IndexMap<String, Task>>,
    next_id: AtomicU64,
    event_bus: EventBus,
}

impl TaskStore {
    /// Creates an empty store publishing to `event_bus`.
    #[must_use]
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            tasks: RwLock::new(IndexMap::new()),
            next_id: AtomicU64::new(1),
            event_bus,
        }
    }

    /// Appends a task and returns it.
    pub async fn add(&self, title: &str) -> Task {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let task = Task {
            id: id.clone(),
            title: title.to_string(),
            done: false,
            created_at: Utc::now(),
        };
        self.tasks.write().await.insert(id, task.clone());
        self.changed();
        task
    }

    /// Removes a task. Returns `false` if it did not exist.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.tasks.write().await.shift_remove(id).is_some();
        if removed {
            self.changed();
        }
        removed
    }

    /// Flips the completion flag and returns the updated task.
    pub async fn toggle(&self, id: &str) -> Option<Task> {
        let updated = {
            let mut tasks = self.tasks.write().await;
            let task = tasks.get_mut(id)?;
            task.done = !task.done;
            task.clone()
        };
        self.changed();
        Some(updated)
    }

    /// Returns one task.
    pub async fn get(&self, id: &str) -> Option<Task> {
        self.tasks.read().await.get(id).cloned()
    }

    /// Returns all tasks in insertion order.
    pub async fn list(&self) -> Vec<Task> {
        self.tasks.read().await.values().cloned().collect()
    }

    fn changed(&self) {
        let receivers = self.event_bus.notify(TASKS_PUBLICATION);
        tracing::trace!(receivers, "task store changed");
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mutations_keep_order_and_notify() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let store = TaskStore::new(bus);

        let a = store.add("write docs").await;
        let b = store.add("ship").await;
        assert_ne!(a.id, b.id);
        assert_eq!(
            store.list().await.iter().map(|t| t.title.as_str()).collect::<Vec<_>>(),
            vec!["write docs", "ship"]
        );

        let Some(toggled) = store.toggle(&a.id).await else {
            panic!("task should exist");
        };
        assert!(toggled.done);
        assert!(store.remove(&b.id).await);
        assert!(!store.remove(&b.id).await);
        assert!(store.toggle("missing").await.is_none());

        let mut notified = 0;
        while let Ok(change) = rx.try_recv() {
            assert_eq!(change.publication, TASKS_PUBLICATION);
            notified += 1;
        }
        assert_eq!(notified, 4);
    }
}
