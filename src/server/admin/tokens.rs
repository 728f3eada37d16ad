use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::auth::RequireAdmin;
use crate::server::AppState;
use crate::server::dto::{CreateTokenRequest, CreateTokenResponse, TokenResponse};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::types::Token;

pub async fn list_tokens(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let tokens = state.store.list_tokens().api_err("Failed to list tokens")?;
    let tokens: Vec<TokenResponse> = tokens.into_iter().map(TokenResponse::from).collect();

    Ok::<_, ApiError>(Json(ApiResponse::success(tokens)))
}

pub async fn create_token(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTokenRequest>,
) -> impl IntoResponse {
    let expires_at = match req.expires_in_seconds {
        Some(seconds) if seconds <= 0 => {
            return Err(ApiError::bad_request("expires_in_seconds must be positive"));
        }
        Some(seconds) => Some(Utc::now() + Duration::seconds(seconds)),
        None => None,
    };

    let (raw_token, lookup, hash) = state
        .tokens
        .generate()
        .map_err(|_| ApiError::internal("Failed to generate token"))?;

    let token = Token {
        id: Uuid::new_v4().to_string(),
        token_hash: hash,
        token_lookup: lookup,
        created_at: Utc::now(),
        expires_at,
        last_used_at: None,
    };

    state
        .store
        .create_token(&token)
        .api_err("Failed to create token")?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(CreateTokenResponse {
            token: raw_token,
            metadata: TokenResponse::from(token),
        })),
    ))
}

pub async fn delete_token(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let deleted = state
        .store
        .delete_token(&id)
        .api_err("Failed to delete token")?;

    if !deleted {
        return Err(ApiError::not_found("Token not found"));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
