//! Academy (tenant) model.

use serde::{Deserialize, Serialize};

/// A tenant organization. All sessions belong to exactly one academy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Academy {
    /// Unique identifier.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Subdomain, used as the room name prefix.
    pub subdomain: String,
    /// Inactive academies are skipped by the background jobs.
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Academy {
    /// Creates an active academy.
    pub fn new(id: u64, name: impl Into<String>, subdomain: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            subdomain: subdomain.into(),
            is_active: true,
        }
    }
}
