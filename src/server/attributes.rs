use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::server::AppState;
use crate::server::dto::{AttributeResponse, CreateAttributeRequest, ListParams, UpdateAttributeRequest};
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, StoreOptionExt, StoreResultExt,
    paginate,
};
use crate::server::{non_empty, validation};
use crate::types::{Attribute, DataType, TreeFields};

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

fn parse_data_type(raw: &str, fields: &mut BTreeMap<String, String>) -> DataType {
    match raw.parse() {
        Ok(dt) => dt,
        Err(e) => {
            fields.insert("data_type".to_string(), e);
            DataType::default()
        }
    }
}

pub async fn list_attributes(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let filter = params.to_filter()?;
    let attrs = state
        .store
        .list_attributes(&filter)
        .api_err("Failed to list attributes")?;

    let (attrs, next_cursor, has_more) =
        paginate(attrs, DEFAULT_PAGE_SIZE as usize, |a| a.id.clone());
    let attrs: Vec<AttributeResponse> = attrs.into_iter().map(AttributeResponse::from).collect();

    Ok::<_, ApiError>(Json(PaginatedResponse::new(attrs, next_cursor, has_more)))
}

pub async fn get_attribute(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let attr = state
        .store
        .get_attribute(&id)
        .api_err("Failed to get attribute")?
        .or_not_found("Attribute not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(AttributeResponse::from(attr))))
}

pub async fn get_attribute_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    let attr = state
        .store
        .get_attribute_by_slug(&slug)
        .api_err("Failed to get attribute")?
        .or_not_found("Attribute not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(AttributeResponse::from(attr))))
}

pub async fn create_attribute(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAttributeRequest>,
) -> impl IntoResponse {
    let mut fields = BTreeMap::new();

    if let Err(e) = validation::validate_name(&req.name) {
        fields.insert("name".to_string(), e);
    }
    if let Some(slug) = req.slug.as_deref().filter(|s| !s.is_empty()) {
        if let Err(e) = validation::validate_slug(slug) {
            fields.insert("slug".to_string(), e);
        }
    }
    let data_type = match req.data_type.as_deref().filter(|d| !d.is_empty()) {
        Some(raw) => parse_data_type(raw, &mut fields),
        None => DataType::default(),
    };
    if let Some(metadata) = &req.metadata {
        if let Err(e) = validation::validate_object(metadata) {
            fields.insert("metadata".to_string(), e);
        }
    }
    if !fields.is_empty() {
        return Err(ApiError::validation(fields));
    }

    let now = Utc::now();
    let attr = Attribute {
        id: Uuid::new_v4().to_string(),
        slug: req.slug.unwrap_or_default(),
        name: req.name,
        value: req.value.unwrap_or_default(),
        data_type,
        description: non_empty(req.description),
        is_active: req.is_active.unwrap_or(true),
        metadata: req.metadata.unwrap_or_else(empty_object),
        tree: TreeFields {
            parent_id: non_empty(req.parent_id),
            ..TreeFields::default()
        },
        created_at: now,
        updated_at: now,
    };

    let created = state
        .store
        .create_attribute(&attr)
        .domain_err("Attribute not found")?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(AttributeResponse::from(created))),
    ))
}

pub async fn update_attribute(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateAttributeRequest>,
) -> impl IntoResponse {
    let mut attr = state
        .store
        .get_attribute(&id)
        .api_err("Failed to get attribute")?
        .or_not_found("Attribute not found")?;

    let mut fields = BTreeMap::new();

    if let Some(name) = &req.name {
        if let Err(e) = validation::validate_name(name) {
            fields.insert("name".to_string(), e);
        }
        attr.name = name.clone();
    }
    if let Some(slug) = &req.slug {
        if !slug.is_empty() {
            if let Err(e) = validation::validate_slug(slug) {
                fields.insert("slug".to_string(), e);
            }
        }
        attr.slug = slug.clone();
    }
    if let Some(value) = &req.value {
        attr.value = value.clone();
    }
    if let Some(raw) = req.data_type.as_deref().filter(|d| !d.is_empty()) {
        attr.data_type = parse_data_type(raw, &mut fields);
    }
    if let Some(description) = req.description.clone() {
        attr.description = non_empty(Some(description));
    }
    if let Some(is_active) = req.is_active {
        attr.is_active = is_active;
    }
    if let Some(metadata) = &req.metadata {
        if let Err(e) = validation::validate_object(metadata) {
            fields.insert("metadata".to_string(), e);
        }
        attr.metadata = metadata.clone();
    }
    if let Some(parent_id) = req.parent_id.clone() {
        attr.tree.parent_id = non_empty(parent_id);
    }
    if !fields.is_empty() {
        return Err(ApiError::validation(fields));
    }

    let updated = state
        .store
        .update_attribute(&attr)
        .domain_err("Attribute not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(AttributeResponse::from(updated))))
}

pub async fn delete_attribute(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let deleted = state
        .store
        .delete_attribute(&id)
        .api_err("Failed to delete attribute")?;

    if !deleted {
        return Err(ApiError::not_found("Attribute not found"));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn attribute_ancestors(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let ancestors = state
        .store
        .attribute_ancestors(&id)
        .domain_err("Attribute not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(ancestors)))
}

pub async fn attribute_descendants(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let descendants = state
        .store
        .attribute_descendants(&id)
        .domain_err("Attribute not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(descendants)))
}

pub async fn attribute_children(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let children = state
        .store
        .attribute_children(&id)
        .domain_err("Attribute not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(children)))
}
