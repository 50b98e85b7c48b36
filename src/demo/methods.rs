//! Task mutation methods: `tasks.add`, `tasks.remove`, `tasks.toggle`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::store::TaskStore;
use crate::method::{MethodHandler, MethodOutcome};

/// `tasks.add({title})` → the new task, or `false` for a blank title.
#[derive(Debug)]
pub struct AddTask(pub Arc<TaskStore>);

/// `tasks.remove({id})` → the removed id, or `false` if absent.
#[derive(Debug)]
pub struct RemoveTask(pub Arc<TaskStore>);

/// `tasks.toggle({id})` → the updated task, or `false` if absent.
#[derive(Debug)]
pub struct ToggleTask(pub Arc<TaskStore>);

fn string_arg<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Wraps a serialized task, reporting a serialization failure explicitly.
fn task_outcome(method: &str, serialized: serde_json::Result<Value>) -> MethodOutcome {
    match serialized {
        Ok(task) => MethodOutcome::Success(task),
        Err(err) => {
            tracing::warn!(method, error = %err, "task serialization failed");
            MethodOutcome::Failure(json!({
                "name": "Server error",
                "message": format!("{method} could not serialize the task"),
            }))
        }
    }
}

#[async_trait]
impl MethodHandler for AddTask {
    async fn call(&self, params: Value) -> MethodOutcome {
        let Some(title) = string_arg(&params, "title") else {
            return MethodOutcome::Failure(json!(false));
        };
        let task = self.0.add(title).await;
        task_outcome("tasks.add", serde_json::to_value(task))
    }
}

#[async_trait]
impl MethodHandler for RemoveTask {
    async fn call(&self, params: Value) -> MethodOutcome {
        match string_arg(&params, "id") {
            Some(id) if self.0.remove(id).await => MethodOutcome::Success(json!(id)),
            _ => MethodOutcome::Failure(json!(false)),
        }
    }
}

#[async_trait]
impl MethodHandler for ToggleTask {
    async fn call(&self, params: Value) -> MethodOutcome {
        let Some(id) = string_arg(&params, "id") else {
            return MethodOutcome::Failure(json!(false));
        };
        match self.0.toggle(id).await {
            Some(task) => task_outcome("tasks.toggle", serde_json::to_value(task)),
            None => MethodOutcome::Failure(json!(false)),
        }
    }
}
