use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crate::auth::RequireAdmin;
use crate::server::AppState;
use crate::server::dto::{AdminListParams, AttributeResponse, TreeEntry};
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, StoreResultExt, paginate,
};
use crate::store::ListFilter;

pub async fn list_attributes(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Query(params): Query<AdminListParams>,
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

/// Full forest in pre-order, for tree-indented pickers.
pub async fn attribute_tree(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let filter = ListFilter {
        limit: -1, // SQLite: no limit
        ..ListFilter::default()
    };
    let attrs = state
        .store
        .list_attributes(&filter)
        .api_err("Failed to list attributes")?;

    let entries: Vec<TreeEntry> = attrs
        .into_iter()
        .map(|a| TreeEntry::new(a.id, a.slug, a.name, a.tree.depth, a.tree.parent_id))
        .collect();

    Ok::<_, ApiError>(Json(ApiResponse::success(entries)))
}
