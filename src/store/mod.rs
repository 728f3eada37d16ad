mod schema;
pub mod slug;
mod sqlite;
pub mod tree;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Sort column for entity listings. `Path` is pre-order traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Path,
    Name,
    CreatedAt,
    UpdatedAt,
}

impl SortKey {
    pub(crate) fn column(self) -> &'static str {
        match self {
            SortKey::Path => "path",
            SortKey::Name => "name",
            SortKey::CreatedAt => "created_at",
            SortKey::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sort {
    pub key: SortKey,
    pub descending: bool,
}

impl Sort {
    /// Parses a sort expression like `name` or `-created_at`.
    pub fn parse(s: &str) -> Option<Sort> {
        let (descending, key) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let key = match key {
            "path" => SortKey::Path,
            "name" => SortKey::Name,
            "created_at" => SortKey::CreatedAt,
            "updated_at" => SortKey::UpdatedAt,
            _ => return None,
        };
        Some(Sort { key, descending })
    }
}

/// Listing parameters shared by the general and admin surfaces.
///
/// `cursor` is the id of the last record of the previous page; pagination is
/// keyset-based over `(sort column, id)`. Filter fields that a table does not
/// carry (e.g. `is_active` for applications) are ignored.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub cursor: Option<String>,
    pub limit: i64,
    pub sort: Sort,
    pub parent_id: Option<String>,
    pub is_active: Option<bool>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

/// Store defines the database interface.
///
/// Structural mutations (create with a parent, parent change, delete) rebuild
/// the affected table's hierarchy index inside the same transaction; callers
/// never observe stale `depth`/`path`/`lft`/`rgt` values.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Application operations
    fn create_application(&self, app: &Application) -> Result<Application>;
    fn get_application(&self, id: &str) -> Result<Option<Application>>;
    fn get_application_by_slug(&self, slug: &str) -> Result<Option<Application>>;
    fn list_applications(&self, filter: &ListFilter) -> Result<Vec<Application>>;
    fn update_application(&self, app: &Application) -> Result<Application>;
    fn delete_application(&self, id: &str) -> Result<bool>;
    fn application_ancestors(&self, id: &str) -> Result<Vec<Application>>;
    fn application_descendants(&self, id: &str) -> Result<Vec<Application>>;
    fn application_children(&self, id: &str) -> Result<Vec<Application>>;

    // Attribute operations
    fn create_attribute(&self, attr: &Attribute) -> Result<Attribute>;
    fn get_attribute(&self, id: &str) -> Result<Option<Attribute>>;
    fn get_attribute_by_slug(&self, slug: &str) -> Result<Option<Attribute>>;
    fn list_attributes(&self, filter: &ListFilter) -> Result<Vec<Attribute>>;
    fn update_attribute(&self, attr: &Attribute) -> Result<Attribute>;
    fn delete_attribute(&self, id: &str) -> Result<bool>;
    fn attribute_ancestors(&self, id: &str) -> Result<Vec<Attribute>>;
    fn attribute_descendants(&self, id: &str) -> Result<Vec<Attribute>>;
    fn attribute_children(&self, id: &str) -> Result<Vec<Attribute>>;

    // Organisation operations
    fn create_organisation(&self, org: &Organisation) -> Result<Organisation>;
    fn get_organisation(&self, id: &str) -> Result<Option<Organisation>>;
    fn get_organisation_by_slug(&self, slug: &str) -> Result<Option<Organisation>>;
    fn list_organisations(&self, filter: &ListFilter) -> Result<Vec<Organisation>>;
    fn update_organisation(&self, org: &Organisation) -> Result<Organisation>;
    fn delete_organisation(&self, id: &str) -> Result<bool>;
    fn organisation_ancestors(&self, id: &str) -> Result<Vec<Organisation>>;
    fn organisation_descendants(&self, id: &str) -> Result<Vec<Organisation>>;
    fn organisation_children(&self, id: &str) -> Result<Vec<Organisation>>;

    // Application-Attribute M2M operations
    fn set_application_attributes(&self, application_id: &str, attribute_ids: &[String])
    -> Result<()>;
    fn add_application_attribute(&self, application_id: &str, attribute_id: &str) -> Result<()>;
    fn remove_application_attribute(&self, application_id: &str, attribute_id: &str)
    -> Result<bool>;
    fn list_application_attributes(&self, application_id: &str) -> Result<Vec<Attribute>>;

    // Application-Organisation M2M operations
    fn set_application_organisations(
        &self,
        application_id: &str,
        organisation_ids: &[String],
    ) -> Result<()>;
    fn add_application_organisation(&self, application_id: &str, organisation_id: &str)
    -> Result<()>;
    fn remove_application_organisation(
        &self,
        application_id: &str,
        organisation_id: &str,
    ) -> Result<bool>;
    fn list_application_organisations(&self, application_id: &str) -> Result<Vec<Organisation>>;

    // Token operations
    fn create_token(&self, token: &Token) -> Result<()>;
    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>>;
    fn list_tokens(&self) -> Result<Vec<Token>>;
    fn delete_token(&self, id: &str) -> Result<bool>;
    fn update_token_last_used(&self, id: &str) -> Result<()>;
    fn has_tokens(&self) -> Result<bool>;
}
