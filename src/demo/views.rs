//! Demo views: the task list at `/` and a task detail at `/tasks/<id>`.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;

use super::escape_html;
use super::store::TaskStore;
use crate::view::View;

/// Renders the full task list.
#[derive(Debug)]
pub struct HomeView {
    store: Arc<TaskStore>,
}

impl HomeView {
    /// Creates the view over `store`.
    #[must_use]
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl View for HomeView {
    async fn on_create(&mut self, _path: &str) {}

    async fn on_url(&mut self, _path: &str) -> bool {
        true
    }

    async fn render(&self) -> String {
        let tasks = self.store.list().await;
        let mut html = String::from(r#"<ul id="tasks">"#);
        for task in &tasks {
            let _ = write!(
                html,
                r#"<li id="task-{0}"><a href="/tasks/{0}">{1}</a></li>"#,
                escape_html(&task.id),
                escape_html(&task.title),
            );
        }
        html.push_str("</ul>");
        html
    }
}

/// Shows one task; navigates in place between existing tasks.
#[derive(Debug)]
pub struct TaskView {
    store: Arc<TaskStore>,
    task_id: String,
}

impl TaskView {
    /// Creates the view over `store`.
    #[must_use]
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self {
            store,
            task_id: String::new(),
        }
    }
}

/// Extracts `<id>` from `/tasks/<id>`.
pub(crate) fn task_id(path: &str) -> &str {
    path.strip_prefix("/tasks/").unwrap_or_default()
}

#[async_trait]
impl View for TaskView {
    async fn on_create(&mut self, path: &str) {
        self.task_id = task_id(path).to_string();
    }

    async fn on_url(&mut self, path: &str) -> bool {
        let id = task_id(path);
        if self.store.get(id).await.is_none() {
            return false;
        }
        self.task_id = id.to_string();
        true
    }

    async fn render(&self) -> String {
        match self.store.get(&self.task_id).await {
            Some(task) => format!(
                r#"<article id="task-{}"><h1>{}</h1><p>{}</p></article>"#,
                escape_html(&task.id),
                escape_html(&task.title),
                if task.done { "done" } else { "open" },
            ),
            None => format!(
                r#"<article class="missing">No task {}</article>"#,
                escape_html(&self.task_id)
            ),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::EventBus;

    #[tokio::test]
    async fn task_view_only_navigates_to_existing_tasks() {
        let store = Arc::new(TaskStore::new(EventBus::new(4)));
        let first = store.add("one").await;
        let second = store.add("two").await;

        let mut view = TaskView::new(Arc::clone(&store));
        view.on_create(&format!("/tasks/{}", first.id)).await;
        assert!(view.render().await.contains("<h1>one</h1>"));

        assert!(view.on_url(&format!("/tasks/{}", second.id)).await);
        assert!(view.render().await.contains("<h1>two</h1>"));

        assert!(!view.on_url("/tasks/999").await);
        assert!(view.render().await.contains("<h1>two</h1>"));
    }

    #[tokio::test]
    async fn home_lists_tasks_in_order() {
        let store = Arc::new(TaskStore::new(EventBus::new(4)));
        let _ = store.add("a & b").await;
        let _ = store.add("c").await;
        let html = HomeView::new(store).render().await;
        let Some(first) = html.find("a &amp; b") else {
            panic!("first task rendered escaped: {html}");
        };
        assert!(html.find(">c<").is_some_and(|second| second > first));
    }

    #[test]
    fn task_id_strips_prefix() {
        assert_eq!(task_id("/tasks/42"), "42");
        assert_eq!(task_id("/other"), "");
    }
}
