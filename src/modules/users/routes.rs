use std::sync::Arc;

use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use covers_authz::{Identity, TokenIssuer};
use covers_http::{error::AppError, extract::ApiJson};

use super::models::{AuthResponse, LoginRequest, PublicUser, RegisterUser};
use super::service::UserService;

#[derive(Clone)]
pub struct UsersState {
    pub service: Arc<UserService>,
    pub tokens: Arc<TokenIssuer>,
}

impl FromRef<UsersState> for Arc<TokenIssuer> {
    fn from_ref(state: &UsersState) -> Self {
        state.tokens.clone()
    }
}

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/health", get(health_check))
        .with_state(state)
}

async fn register(
    State(state): State<UsersState>,
    ApiJson(input): ApiJson<RegisterUser>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let response = state.service.register(input).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn login(
    State(state): State<UsersState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    Ok(Json(state.service.login(request).await?))
}

async fn me(
    State(state): State<UsersState>,
    identity: Identity,
) -> Result<Json<PublicUser>, AppError> {
    Ok(Json(state.service.me(&identity).await?))
}

async fn health_check() -> &'static str {
    "Users module is healthy"
}
