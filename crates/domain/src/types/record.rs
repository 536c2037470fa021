//! Cached record handles
//!
//! Only the identifier and the optional display label are kept client-side;
//! clinical data is fetched through server calls.

use serde::{Deserialize, Serialize};

/// A record the authenticated user granted this app access to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    /// Server-assigned record identifier
    pub id: String,

    /// Human readable label (usually the patient's name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Record {
    /// Create a record handle
    #[must_use]
    pub fn new(id: impl Into<String>, label: Option<String>) -> Self {
        Self { id: id.into(), label }
    }

    /// Label if present, otherwise the id
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}
