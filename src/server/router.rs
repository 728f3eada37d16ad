use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::{Redirect, Response};
use axum::{
    Router,
    routing::{delete, get},
};

use super::admin::admin_router;
use super::{applications, attributes, organisations};
use crate::auth::TokenGenerator;
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub tokens: TokenGenerator,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            tokens: TokenGenerator::new(),
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn home() -> Redirect {
    Redirect::temporary("/api/v1/applications")
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

fn crud_router() -> Router<Arc<AppState>> {
    Router::new()
        // Application routes
        .route(
            "/applications",
            get(applications::list_applications).post(applications::create_application),
        )
        .route(
            "/applications/slug/{slug}",
            get(applications::get_application_by_slug),
        )
        .route(
            "/applications/{id}",
            get(applications::get_application)
                .put(applications::update_application)
                .delete(applications::delete_application),
        )
        .route(
            "/applications/{id}/ancestors",
            get(applications::application_ancestors),
        )
        .route(
            "/applications/{id}/descendants",
            get(applications::application_descendants),
        )
        .route(
            "/applications/{id}/children",
            get(applications::application_children),
        )
        .route(
            "/applications/{id}/attributes",
            get(applications::list_application_attributes)
                .put(applications::set_application_attributes),
        )
        .route(
            "/applications/{id}/attributes/{attribute_id}",
            delete(applications::remove_application_attribute)
                .post(applications::add_application_attribute),
        )
        .route(
            "/applications/{id}/organisations",
            get(applications::list_application_organisations)
                .put(applications::set_application_organisations),
        )
        .route(
            "/applications/{id}/organisations/{organisation_id}",
            delete(applications::remove_application_organisation)
                .post(applications::add_application_organisation),
        )
        // Attribute routes
        .route(
            "/attributes",
            get(attributes::list_attributes).post(attributes::create_attribute),
        )
        .route(
            "/attributes/slug/{slug}",
            get(attributes::get_attribute_by_slug),
        )
        .route(
            "/attributes/{id}",
            get(attributes::get_attribute)
                .put(attributes::update_attribute)
                .delete(attributes::delete_attribute),
        )
        .route("/attributes/{id}/ancestors", get(attributes::attribute_ancestors))
        .route(
            "/attributes/{id}/descendants",
            get(attributes::attribute_descendants),
        )
        .route("/attributes/{id}/children", get(attributes::attribute_children))
        // Organisation routes
        .route(
            "/organisations",
            get(organisations::list_organisations).post(organisations::create_organisation),
        )
        .route(
            "/organisations/slug/{slug}",
            get(organisations::get_organisation_by_slug),
        )
        .route(
            "/organisations/{id}",
            get(organisations::get_organisation)
                .put(organisations::update_organisation)
                .delete(organisations::delete_organisation),
        )
        .route(
            "/organisations/{id}/ancestors",
            get(organisations::organisation_ancestors),
        )
        .route(
            "/organisations/{id}/descendants",
            get(organisations::organisation_descendants),
        )
        .route(
            "/organisations/{id}/children",
            get(organisations::organisation_children),
        )
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/", get(home))
        .nest("/api/v1/admin", admin_router())
        .nest("/api/v1", crud_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::store::SqliteStore;

    fn test_router() -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = SqliteStore::new(dir.path().join("arbor.db")).expect("open store");
        store.initialize().expect("initialize store");
        let state = Arc::new(AppState::new(Arc::new(store)));
        (dir, create_router(state))
    }

    #[tokio::test]
    async fn test_health() {
        let (_dir, app) = test_router();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_home_redirects_to_application_list() {
        let (_dir, app) = test_router();
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(response.headers()["location"], "/api/v1/applications");
    }

    #[tokio::test]
    async fn test_admin_routes_require_token() {
        let (_dir, app) = test_router();
        let response = app
            .oneshot(
                Request::get("/api/v1/admin/applications")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
