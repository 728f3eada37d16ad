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
use crate::server::dto::{CreateOrganisationRequest, ListParams, UpdateOrganisationRequest};
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, StoreOptionExt, StoreResultExt,
    paginate,
};
use crate::server::{non_empty, validation};
use crate::types::{Organisation, TreeFields};

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

fn validate_contact_fields(
    code: Option<&str>,
    email: Option<&str>,
    phone: Option<&str>,
    website: Option<&str>,
    fields: &mut BTreeMap<String, String>,
) {
    if let Some(code) = code.filter(|c| !c.is_empty()) {
        if let Err(e) = validation::validate_code(code) {
            fields.insert("code".to_string(), e);
        }
    }
    if let Some(email) = email.filter(|e| !e.is_empty()) {
        if let Err(e) = validation::validate_email(email) {
            fields.insert("email".to_string(), e);
        }
    }
    if let Some(phone) = phone.filter(|p| !p.is_empty()) {
        if let Err(e) = validation::validate_phone(phone) {
            fields.insert("phone".to_string(), e);
        }
    }
    if let Some(website) = website.filter(|w| !w.is_empty()) {
        if let Err(e) = validation::validate_url(website) {
            fields.insert("website".to_string(), e);
        }
    }
}

pub async fn list_organisations(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let filter = params.to_filter()?;
    let orgs = state
        .store
        .list_organisations(&filter)
        .api_err("Failed to list organisations")?;

    let (orgs, next_cursor, has_more) =
        paginate(orgs, DEFAULT_PAGE_SIZE as usize, |o| o.id.clone());

    Ok::<_, ApiError>(Json(PaginatedResponse::new(orgs, next_cursor, has_more)))
}

pub async fn get_organisation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let org = state
        .store
        .get_organisation(&id)
        .api_err("Failed to get organisation")?
        .or_not_found("Organisation not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(org)))
}

pub async fn get_organisation_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    let org = state
        .store
        .get_organisation_by_slug(&slug)
        .api_err("Failed to get organisation")?
        .or_not_found("Organisation not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(org)))
}

pub async fn create_organisation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrganisationRequest>,
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
    validate_contact_fields(
        req.code.as_deref(),
        req.email.as_deref(),
        req.phone.as_deref(),
        req.website.as_deref(),
        &mut fields,
    );
    if let Some(metadata) = &req.metadata {
        if let Err(e) = validation::validate_object(metadata) {
            fields.insert("metadata".to_string(), e);
        }
    }
    if !fields.is_empty() {
        return Err(ApiError::validation(fields));
    }

    let now = Utc::now();
    let org = Organisation {
        id: Uuid::new_v4().to_string(),
        slug: req.slug.unwrap_or_default(),
        name: req.name,
        description: non_empty(req.description),
        code: non_empty(req.code),
        email: non_empty(req.email),
        phone: non_empty(req.phone),
        address: non_empty(req.address),
        website: non_empty(req.website),
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
        .create_organisation(&org)
        .domain_err("Organisation not found")?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

pub async fn update_organisation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateOrganisationRequest>,
) -> impl IntoResponse {
    let mut org = state
        .store
        .get_organisation(&id)
        .api_err("Failed to get organisation")?
        .or_not_found("Organisation not found")?;

    let mut fields = BTreeMap::new();

    if let Some(name) = &req.name {
        if let Err(e) = validation::validate_name(name) {
            fields.insert("name".to_string(), e);
        }
        org.name = name.clone();
    }
    if let Some(slug) = &req.slug {
        if !slug.is_empty() {
            if let Err(e) = validation::validate_slug(slug) {
                fields.insert("slug".to_string(), e);
            }
        }
        org.slug = slug.clone();
    }
    validate_contact_fields(
        req.code.as_deref(),
        req.email.as_deref(),
        req.phone.as_deref(),
        req.website.as_deref(),
        &mut fields,
    );
    if let Some(description) = req.description.clone() {
        org.description = non_empty(Some(description));
    }
    if let Some(code) = req.code.clone() {
        org.code = non_empty(Some(code));
    }
    if let Some(email) = req.email.clone() {
        org.email = non_empty(Some(email));
    }
    if let Some(phone) = req.phone.clone() {
        org.phone = non_empty(Some(phone));
    }
    if let Some(address) = req.address.clone() {
        org.address = non_empty(Some(address));
    }
    if let Some(website) = req.website.clone() {
        org.website = non_empty(Some(website));
    }
    if let Some(is_active) = req.is_active {
        org.is_active = is_active;
    }
    if let Some(metadata) = &req.metadata {
        if let Err(e) = validation::validate_object(metadata) {
            fields.insert("metadata".to_string(), e);
        }
        org.metadata = metadata.clone();
    }
    if let Some(parent_id) = req.parent_id.clone() {
        org.tree.parent_id = non_empty(parent_id);
    }
    if !fields.is_empty() {
        return Err(ApiError::validation(fields));
    }

    let updated = state
        .store
        .update_organisation(&org)
        .domain_err("Organisation not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(updated)))
}

pub async fn delete_organisation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let deleted = state
        .store
        .delete_organisation(&id)
        .api_err("Failed to delete organisation")?;

    if !deleted {
        return Err(ApiError::not_found("Organisation not found"));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn organisation_ancestors(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let ancestors = state
        .store
        .organisation_ancestors(&id)
        .domain_err("Organisation not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(ancestors)))
}

pub async fn organisation_descendants(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let descendants = state
        .store
        .organisation_descendants(&id)
        .domain_err("Organisation not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(descendants)))
}

pub async fn organisation_children(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let children = state
        .store
        .organisation_children(&id)
        .domain_err("Organisation not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(children)))
}
