//! Built-in task list application.
//!
//! Registers the `tasks` publication, the `tasks.add`, `tasks.remove` and
//! `tasks.toggle` methods, and the `home` and `task` routes. Every mutation
//! goes through the [`TaskStore`], which announces it on the event bus so
//! subscribed sessions receive the diff.

pub mod methods;
pub mod publication;
pub mod store;
pub mod views;

use std::sync::Arc;

use crate::error::GatewayError;
use crate::service::Collaborators;
use crate::view::{RouteTable, View};

pub use methods::{AddTask, RemoveTask, ToggleTask};
pub use publication::TasksPublication;
pub use store::{TASKS_PUBLICATION, Task, TaskStore};
pub use views::{HomeView, TaskView};

/// Builds the demo collaborators over `store`.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] if a route pattern fails to
/// compile.
pub fn collaborators(store: &Arc<TaskStore>) -> Result<Collaborators, GatewayError> {
    let mut collaborators = Collaborators::default();
    register(&mut collaborators, store)?;
    Ok(collaborators)
}

/// Adds the demo publication, methods and routes to `collaborators`.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] if a route name is already
/// taken or a pattern fails to compile.
pub fn register(
    collaborators: &mut Collaborators,
    store: &Arc<TaskStore>,
) -> Result<(), GatewayError> {
    collaborators.publications.register(
        TASKS_PUBLICATION,
        Arc::new(TasksPublication::new(Arc::clone(store))),
    );

    collaborators
        .methods
        .register("tasks.add", Arc::new(AddTask(Arc::clone(store))));
    collaborators
        .methods
        .register("tasks.remove", Arc::new(RemoveTask(Arc::clone(store))));
    collaborators
        .methods
        .register("tasks.toggle", Arc::new(ToggleTask(Arc::clone(store))));

    let home = Arc::clone(store);
    let task = Arc::clone(store);
    let routes = std::mem::take(&mut collaborators.routes)
        .route("home", "^/$", move |_| -> Box<dyn View> {
            Box::new(HomeView::new(Arc::clone(&home)))
        })?
        .route("task", r"^/tasks/[^/]+$", move |_| -> Box<dyn View> {
            Box::new(TaskView::new(Arc::clone(&task)))
        })?;
    collaborators.routes = routes;
    Ok(())
}

/// Escapes text for inclusion in HTML content or attribute values.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
