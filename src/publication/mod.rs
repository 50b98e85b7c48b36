//! Publications: named record sources clients can subscribe to.
//!
//! A [`Publication`] yields the records currently matching its query. The
//! [`PublicationRunner`] diffs successive fetches per subscription and pushes
//! `inserted`/`changed`/`removed` events to the subscribing channel.

pub mod runner;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::GatewayError;

pub use runner::PublicationRunner;

/// One record matched by a publication.
///
/// `content` is the serialized representation compared between fetches:
/// any difference is pushed as a `changed` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable record identifier.
    pub id: String,
    /// Serialized record content.
    pub content: Value,
}

impl Record {
    /// Creates a record.
    #[must_use]
    pub fn new(id: impl Into<String>, content: Value) -> Self {
        Self {
            id: id.into(),
            content,
        }
    }
}

/// A named server-side query.
#[async_trait]
pub trait Publication: Send + Sync {
    /// Returns the records currently matching, in display order.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PublicationFailed`] when the data source
    /// cannot be read.
    async fn fetch(&self) -> Result<Vec<Record>, GatewayError>;

    /// Builds the component instance pushed to the client for `record`.
    fn render(&self, record: &Record, parent: &str) -> Value {
        json!({
            "_id": record.id,
            "parent": parent,
            "content": record.content,
        })
    }
}

/// Registered publications, keyed by unique name.
#[derive(Clone, Default)]
pub struct PublicationRegistry {
    publications: BTreeMap<String, Arc<dyn Publication>>,
}

impl PublicationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `publication` under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, publication: Arc<dyn Publication>) {
        self.publications.insert(name.into(), publication);
    }

    /// Looks up a publication by name.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PublicationNotFound`] for unknown names.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Publication>, GatewayError> {
        self.publications
            .get(name)
            .cloned()
            .ok_or_else(|| GatewayError::PublicationNotFound(name.to_string()))
    }

    /// Returns `true` if a publication is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.publications.contains_key(name)
    }

    /// Returns the registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.publications.keys().cloned().collect()
    }
}

impl fmt::Debug for PublicationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicationRegistry")
            .field("publications", &self.publications.keys().collect::<Vec<_>>())
            .finish()
    }
}
