mod admin;
mod applications;
mod attributes;
pub mod dto;
mod organisations;
pub mod response;
mod router;
pub mod validation;

pub use admin::admin_router;
pub use router::{AppState, create_router};

/// Optional strings from request bodies: empty means "clear the field".
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
