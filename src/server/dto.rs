use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::server::response::{ApiError, DEFAULT_PAGE_SIZE};
use crate::store::{ListFilter, Sort};
use crate::types::{Attribute, Token};

#[derive(Debug, Deserialize)]
pub struct CreateApplicationRequest {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub properties: Option<Value>,
    #[serde(default)]
    pub attribute_ids: Option<Vec<String>>,
    #[serde(default)]
    pub organisation_ids: Option<Vec<String>>,
}

/// Partial update. Absent fields are left unchanged; `parent_id` uses the
/// nested option so an explicit `null` detaches the record to a root.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateApplicationRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<Option<String>>,
    #[serde(default)]
    pub properties: Option<Value>,
    #[serde(default)]
    pub attribute_ids: Option<Vec<String>>,
    #[serde(default)]
    pub organisation_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAttributeRequest {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAttributeRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<Option<String>>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrganisationRequest {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateOrganisationRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub parent_id: Option<Option<String>>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct SetAttributesRequest {
    pub attribute_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetOrganisationsRequest {
    pub organisation_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
}

impl ListParams {
    pub fn to_filter(&self) -> Result<ListFilter, ApiError> {
        Ok(ListFilter {
            cursor: self.cursor.clone(),
            limit: DEFAULT_PAGE_SIZE + 1,
            sort: parse_sort(self.sort.as_deref())?,
            ..ListFilter::default()
        })
    }
}

/// Admin listing parameters: pagination plus parent/status/date-range filters
/// and free-text search.
#[derive(Debug, Default, Deserialize)]
pub struct AdminListParams {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub created_after: Option<String>,
    #[serde(default)]
    pub created_before: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
}

impl AdminListParams {
    pub fn to_filter(&self) -> Result<ListFilter, ApiError> {
        Ok(ListFilter {
            cursor: self.cursor.clone(),
            limit: DEFAULT_PAGE_SIZE + 1,
            sort: parse_sort(self.sort.as_deref())?,
            parent_id: self.parent.clone(),
            is_active: self.is_active,
            created_after: parse_date(self.created_after.as_deref(), "created_after")?,
            created_before: parse_date(self.created_before.as_deref(), "created_before")?,
            search: self.q.clone(),
        })
    }
}

fn parse_sort(sort: Option<&str>) -> Result<Sort, ApiError> {
    match sort {
        None | Some("") => Ok(Sort::default()),
        Some(s) => Sort::parse(s).ok_or_else(|| ApiError::bad_request(format!("Invalid sort '{s}'"))),
    }
}

fn parse_date(value: Option<&str>, field: &str) -> Result<Option<DateTime<Utc>>, ApiError> {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(Some(date.and_time(chrono::NaiveTime::MIN).and_utc()));
    }
    Err(ApiError::bad_request(format!(
        "Invalid {field} '{value}', expected RFC 3339 or YYYY-MM-DD"
    )))
}

/// Attribute with its stored text value parsed under the declared data type.
/// `typed_value` is absent when the value is empty or does not parse.
#[derive(Debug, Serialize)]
pub struct AttributeResponse {
    #[serde(flatten)]
    pub attribute: Attribute,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typed_value: Option<Value>,
}

impl From<Attribute> for AttributeResponse {
    fn from(attribute: Attribute) -> Self {
        let typed_value = if attribute.value.is_empty() {
            None
        } else {
            attribute.data_type.parse_value(&attribute.value).ok()
        };
        Self {
            attribute,
            typed_value,
        }
    }
}

/// Slim row for the admin tree pickers, in pre-order with an em-dash
/// indented label.
#[derive(Debug, Serialize)]
pub struct TreeEntry {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub label: String,
    pub depth: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl TreeEntry {
    pub fn new(id: String, slug: String, name: String, depth: i64, parent_id: Option<String>) -> Self {
        let label = if depth > 0 {
            format!("{} {name}", "—".repeat(depth as usize))
        } else {
            name.clone()
        };
        Self {
            id,
            slug,
            name,
            label,
            depth,
            parent_id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateTokenRequest {
    #[serde(default)]
    pub expires_in_seconds: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<Token> for TokenResponse {
    fn from(token: Token) -> Self {
        Self {
            id: token.id,
            created_at: token.created_at,
            expires_at: token.expires_at,
            last_used_at: token.last_used_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateTokenResponse {
    pub token: String,
    pub metadata: TokenResponse,
}
