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
use crate::server::dto::{
    CreateApplicationRequest, ListParams, SetAttributesRequest, SetOrganisationsRequest,
    UpdateApplicationRequest,
};
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, StoreOptionExt, StoreResultExt,
    paginate,
};
use crate::server::{non_empty, validation};
use crate::types::{Application, TreeFields};

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

fn check_attribute_ids(
    state: &AppState,
    ids: &[String],
    fields: &mut BTreeMap<String, String>,
) -> Result<(), ApiError> {
    for id in ids {
        if state
            .store
            .get_attribute(id)
            .api_err("Failed to check attributes")?
            .is_none()
        {
            fields.insert("attribute_ids".to_string(), format!("attribute '{id}' not found"));
            break;
        }
    }
    Ok(())
}

fn check_organisation_ids(
    state: &AppState,
    ids: &[String],
    fields: &mut BTreeMap<String, String>,
) -> Result<(), ApiError> {
    for id in ids {
        if state
            .store
            .get_organisation(id)
            .api_err("Failed to check organisations")?
            .is_none()
        {
            fields.insert(
                "organisation_ids".to_string(),
                format!("organisation '{id}' not found"),
            );
            break;
        }
    }
    Ok(())
}

pub async fn list_applications(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let filter = params.to_filter()?;
    let apps = state
        .store
        .list_applications(&filter)
        .api_err("Failed to list applications")?;

    let (apps, next_cursor, has_more) =
        paginate(apps, DEFAULT_PAGE_SIZE as usize, |a| a.id.clone());

    Ok::<_, ApiError>(Json(PaginatedResponse::new(apps, next_cursor, has_more)))
}

pub async fn get_application(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let app = state
        .store
        .get_application(&id)
        .api_err("Failed to get application")?
        .or_not_found("Application not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(app)))
}

pub async fn get_application_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    let app = state
        .store
        .get_application_by_slug(&slug)
        .api_err("Failed to get application")?
        .or_not_found("Application not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(app)))
}

pub async fn create_application(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateApplicationRequest>,
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
    if let Some(properties) = &req.properties {
        if let Err(e) = validation::validate_object(properties) {
            fields.insert("properties".to_string(), e);
        }
    }
    if let Some(ids) = &req.attribute_ids {
        check_attribute_ids(&state, ids, &mut fields)?;
    }
    if let Some(ids) = &req.organisation_ids {
        check_organisation_ids(&state, ids, &mut fields)?;
    }
    if !fields.is_empty() {
        return Err(ApiError::validation(fields));
    }

    let now = Utc::now();
    let app = Application {
        id: Uuid::new_v4().to_string(),
        slug: req.slug.unwrap_or_default(),
        name: req.name,
        description: non_empty(req.description),
        properties: req.properties.unwrap_or_else(empty_object),
        tree: TreeFields {
            parent_id: non_empty(req.parent_id),
            ..TreeFields::default()
        },
        created_at: now,
        updated_at: now,
    };

    let created = state
        .store
        .create_application(&app)
        .domain_err("Application not found")?;

    if let Some(ids) = &req.attribute_ids {
        state
            .store
            .set_application_attributes(&created.id, ids)
            .domain_err("Application not found")?;
    }
    if let Some(ids) = &req.organisation_ids {
        state
            .store
            .set_application_organisations(&created.id, ids)
            .domain_err("Application not found")?;
    }

    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

pub async fn update_application(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateApplicationRequest>,
) -> impl IntoResponse {
    let mut app = state
        .store
        .get_application(&id)
        .api_err("Failed to get application")?
        .or_not_found("Application not found")?;

    let mut fields = BTreeMap::new();

    if let Some(name) = &req.name {
        if let Err(e) = validation::validate_name(name) {
            fields.insert("name".to_string(), e);
        }
        app.name = name.clone();
    }
    if let Some(slug) = &req.slug {
        // an empty slug re-derives from the name
        if !slug.is_empty() {
            if let Err(e) = validation::validate_slug(slug) {
                fields.insert("slug".to_string(), e);
            }
        }
        app.slug = slug.clone();
    }
    if let Some(description) = req.description.clone() {
        app.description = non_empty(Some(description));
    }
    if let Some(properties) = &req.properties {
        if let Err(e) = validation::validate_object(properties) {
            fields.insert("properties".to_string(), e);
        }
        app.properties = properties.clone();
    }
    if let Some(parent_id) = req.parent_id.clone() {
        app.tree.parent_id = non_empty(parent_id);
    }
    if let Some(ids) = &req.attribute_ids {
        check_attribute_ids(&state, ids, &mut fields)?;
    }
    if let Some(ids) = &req.organisation_ids {
        check_organisation_ids(&state, ids, &mut fields)?;
    }
    if !fields.is_empty() {
        return Err(ApiError::validation(fields));
    }

    let updated = state
        .store
        .update_application(&app)
        .domain_err("Application not found")?;

    if let Some(ids) = &req.attribute_ids {
        state
            .store
            .set_application_attributes(&updated.id, ids)
            .domain_err("Application not found")?;
    }
    if let Some(ids) = &req.organisation_ids {
        state
            .store
            .set_application_organisations(&updated.id, ids)
            .domain_err("Application not found")?;
    }

    Ok::<_, ApiError>(Json(ApiResponse::success(updated)))
}

pub async fn delete_application(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let deleted = state
        .store
        .delete_application(&id)
        .api_err("Failed to delete application")?;

    if !deleted {
        return Err(ApiError::not_found("Application not found"));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn application_ancestors(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let ancestors = state
        .store
        .application_ancestors(&id)
        .domain_err("Application not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(ancestors)))
}

pub async fn application_descendants(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let descendants = state
        .store
        .application_descendants(&id)
        .domain_err("Application not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(descendants)))
}

pub async fn application_children(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let children = state
        .store
        .application_children(&id)
        .domain_err("Application not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(children)))
}

pub async fn list_application_attributes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let attributes = state
        .store
        .list_application_attributes(&id)
        .domain_err("Application not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(attributes)))
}

pub async fn set_application_attributes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetAttributesRequest>,
) -> impl IntoResponse {
    state
        .store
        .set_application_attributes(&id, &req.attribute_ids)
        .domain_err("Application not found")?;

    let attributes = state
        .store
        .list_application_attributes(&id)
        .domain_err("Application not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(attributes)))
}

pub async fn add_application_attribute(
    State(state): State<Arc<AppState>>,
    Path((id, attribute_id)): Path<(String, String)>,
) -> impl IntoResponse {
    state
        .store
        .add_application_attribute(&id, &attribute_id)
        .domain_err("Application not found")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn remove_application_attribute(
    State(state): State<Arc<AppState>>,
    Path((id, attribute_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let removed = state
        .store
        .remove_application_attribute(&id, &attribute_id)
        .api_err("Failed to remove attribute")?;

    if !removed {
        return Err(ApiError::not_found("Association not found"));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn list_application_organisations(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let organisations = state
        .store
        .list_application_organisations(&id)
        .domain_err("Application not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(organisations)))
}

pub async fn set_application_organisations(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetOrganisationsRequest>,
) -> impl IntoResponse {
    state
        .store
        .set_application_organisations(&id, &req.organisation_ids)
        .domain_err("Application not found")?;

    let organisations = state
        .store
        .list_application_organisations(&id)
        .domain_err("Application not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(organisations)))
}

pub async fn add_application_organisation(
    State(state): State<Arc<AppState>>,
    Path((id, organisation_id)): Path<(String, String)>,
) -> impl IntoResponse {
    state
        .store
        .add_application_organisation(&id, &organisation_id)
        .domain_err("Application not found")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn remove_application_organisation(
    State(state): State<Arc<AppState>>,
    Path((id, organisation_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let removed = state
        .store
        .remove_application_organisation(&id, &organisation_id)
        .api_err("Failed to remove organisation")?;

    if !removed {
        return Err(ApiError::not_found("Association not found"));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
