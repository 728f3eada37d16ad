mod applications;
mod attributes;
mod organisations;
mod tokens;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::server::AppState;

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        // Application routes
        .route("/applications", get(applications::list_applications))
        .route("/applications/tree", get(applications::application_tree))
        // Attribute routes
        .route("/attributes", get(attributes::list_attributes))
        .route("/attributes/tree", get(attributes::attribute_tree))
        // Organisation routes
        .route("/organisations", get(organisations::list_organisations))
        .route("/organisations/tree", get(organisations::organisation_tree))
        // Token routes
        .route("/tokens", get(tokens::list_tokens))
        .route("/tokens", post(tokens::create_token))
        .route("/tokens/{id}", delete(tokens::delete_token))
}
