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

pub async fn list_applications(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Query(params): Query<AdminListParams>,
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

/// Full forest in pre-order, for tree-indented pickers.
pub async fn application_tree(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let filter = ListFilter {
        limit: -1, // SQLite: no limit
        ..ListFilter::default()
    };
    let apps = state
        .store
        .list_applications(&filter)
        .api_err("Failed to list applications")?;

    let entries: Vec<TreeEntry> = apps
        .into_iter()
        .map(|a| TreeEntry::new(a.id, a.slug, a.name, a.tree.depth, a.tree.parent_id))
        .collect();

    Ok::<_, ApiError>(Json(ApiResponse::success(entries)))
}
