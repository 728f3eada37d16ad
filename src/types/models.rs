use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::DataType;

/// Tree position of a record within its entity type's forest.
///
/// `path` is a dot-joined sequence of zero-padded hex sibling positions, so
/// ascending lexicographic order is pre-order traversal. `lft`/`rgt` form a
/// nested-set interval: B is a descendant of A iff `A.lft < B.lft < A.rgt`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub depth: i64,
    pub path: String,
    pub lft: i64,
    pub rgt: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Open key/value map for extensibility. Always a JSON object.
    pub properties: Value,
    #[serde(flatten)]
    pub tree: TreeFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub id: String,
    pub slug: String,
    pub name: String,
    /// Stored as text regardless of `data_type`; see [`DataType`] for the
    /// presentation-side parsing rules.
    pub value: String,
    pub data_type: DataType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
    pub metadata: Value,
    #[serde(flatten)]
    pub tree: TreeFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organisation {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    pub is_active: bool,
    pub metadata: Value,
    #[serde(flatten)]
    pub tree: TreeFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Admin API token. Only the hash is persisted; the raw token is shown once
/// at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    #[serde(skip)]
    pub token_hash: String,
    #[serde(skip)]
    pub token_lookup: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}
