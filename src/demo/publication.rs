//! The `tasks` publication.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::escape_html;
use super::store::TaskStore;
use crate::error::GatewayError;
use crate::publication::{Publication, Record};

/// Publishes every task in the store, in insertion order.
#[derive(Debug)]
pub struct TasksPublication {
    store: Arc<TaskStore>,
}

impl TasksPublication {
    /// Creates the publication over `store`.
    #[must_use]
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Publication for TasksPublication {
    async fn fetch(&self) -> Result<Vec<Record>, GatewayError> {
        self.store
            .list()
            .await
            .into_iter()
            .map(|task| -> Result<Record, GatewayError> {
                let content = serde_json::to_value(&task).map_err(|e| {
                    GatewayError::PublicationFailed {
                        name: super::TASKS_PUBLICATION.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(Record::new(task.id, content))
            })
            .collect()
    }

    fn render(&self, record: &Record, parent: &str) -> Value {
        let title = record
            .content
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let done = record
            .content
            .get("done")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        json!({
            "_id": record.id,
            "parent": parent,
            "content": record.content,
            "html": format!(
                r#"<li id="task-{}" class="{}"><a href="/tasks/{}">{}</a></li>"#,
                escape_html(&record.id),
                if done { "done" } else { "open" },
                escape_html(&record.id),
                escape_html(title),
            ),
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::EventBus;

    #[tokio::test]
    async fn fetch_and_render_escape_titles() {
        let store = Arc::new(TaskStore::new(EventBus::new(4)));
        let _ = store.add("<b>bold</b>").await;
        let publication = TasksPublication::new(Arc::clone(&store));

        let Ok(records) = publication.fetch().await else {
            panic!("fetch should succeed");
        };
        assert_eq!(records.len(), 1);
        let Some(record) = records.first() else {
            panic!("one record");
        };

        let instance = publication.render(record, "root");
        assert_eq!(instance.get("parent"), Some(&json!("root")));
        let html = instance.get("html").and_then(Value::as_str).unwrap_or_default();
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt;"));
        assert!(html.contains(r#"class="open""#));
    }
}
