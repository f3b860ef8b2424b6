//! Search hits tagged with their repository

use crate::federation::repository::RepositoryId;
use serde::Serialize;
use serde_json::{Map, Value};

const LINKS_FIELD: &str = "_links";

/// Link to the canonical resource of a hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub title: String,
    pub href: String,
}

/// Presentation links attached to a hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Links {
    #[serde(rename = "self")]
    pub self_link: Link,
}

impl Links {
    /// `{"self": {"title": <repo>, "href": "/<repo>/<id>"}}`
    pub fn self_for(repo: RepositoryId, id: &str) -> Self {
        Self {
            self_link: Link {
                title: repo.as_str().to_string(),
                href: format!("/{}/{}", repo.as_str(), id),
            },
        }
    }
}

/// One document returned by a federated search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    /// Repository the backend placed the document in
    #[serde(skip)]
    pub repo: RepositoryId,

    /// Backend document id
    #[serde(skip)]
    pub id: String,

    /// Position in the backend's result order
    #[serde(skip)]
    pub rank: usize,

    /// Document content
    #[serde(flatten)]
    pub document: Map<String, Value>,

    /// Presentation metadata, kept apart from the document
    #[serde(rename = "_links", skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}

impl Hit {
    /// Wrap a backend document. A stored `_links` key is dropped; links are
    /// attached by the dispatcher.
    pub fn new(repo: RepositoryId, id: impl Into<String>, rank: usize, mut document: Map<String, Value>) -> Self {
        document.remove(LINKS_FIELD);
        Self {
            repo,
            id: id.into(),
            rank,
            document,
            links: None,
        }
    }

    /// Document field by name
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.document.get(field)
    }

    /// The document as a JSON value, for filter evaluation
    pub fn document_value(&self) -> Value {
        Value::Object(self.document.clone())
    }
}
