use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crate::auth::RequireAdmin;
use crate::server::AppState;
use crate::server::dto::{AdminListParams, TreeEntry};
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, StoreResultExt, paginate,
};
use crate::store::ListFilter;

pub async fn list_organisations(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Query(params): Query<AdminListParams>,
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

/// Full forest in pre-order, for tree-indented pickers.
pub async fn organisation_tree(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let filter = ListFilter {
        limit: -1, // SQLite: no limit
        ..ListFilter::default()
    };
    let orgs = state
        .store
        .list_organisations(&filter)
        .api_err("Failed to list organisations")?;

    let entries: Vec<TreeEntry> = orgs
        .into_iter()
        .map(|o| TreeEntry::new(o.id, o.slug, o.name, o.tree.depth, o.tree.parent_id))
        .collect();

    Ok::<_, ApiError>(Json(ApiResponse::success(entries)))
}
