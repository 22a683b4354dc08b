//! HTTP 服务端路由

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};
use uuid::Uuid;

use super::wire::{CreateUserResponse, GetUserResponse, HealthResponse, ListUsersResponse, PatchUserResponse};
use crate::auth::{TokenClaims, TokenService};
use crate::error::ServiceError;
use crate::service::UserService;
use crate::types::{NewUser, User};

/// 路由共享状态
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<dyn UserService>,
    pub tokens: Arc<TokenService>,
}

impl AppState {
    pub fn new(service: Arc<dyn UserService>, tokens: Arc<TokenService>) -> Self {
        Self { service, tokens }
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<TokenClaims, ApiError> {
        let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        self.tokens
            .validate_header(header)
            .map_err(|e| ApiError(ServiceError::Unauthorized(e.to_string())))
    }
}

/// 业务错误到 HTTP 响应的映射
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(ServiceError::BadRequest(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.code().http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0.to_body())).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// 创建路由
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/users/", get(list_users).post(create_user))
        .route("/users/{id}", get(get_user).patch(patch_user))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn create_user(
    State(state): State<AppState>,
    body: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<CreateUserResponse> {
    let Json(new_user) = body?;
    let user = User {
        id: Uuid::new_v4().to_string(),
        name: new_user.name,
        email: new_user.email,
        password: new_user.password,
    };

    let token = state.tokens.generate_token(&user).map_err(|e| {
        error!(error = %e, "failed to issue token");
        ServiceError::Internal(e.to_string())
    })?;
    let id = user.id.clone();
    state.service.post_user(user).await?;

    Ok(Json(CreateUserResponse { token, id }))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<GetUserResponse> {
    let claims = state.authorize(&headers)?;
    debug!(id = %id, subject = %claims.sub, "get user");
    let user = state.service.get_user(&id).await?;
    Ok(Json(GetUserResponse { user }))
}

async fn patch_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<User>, JsonRejection>,
) -> ApiResult<PatchUserResponse> {
    let claims = state.authorize(&headers)?;
    let Json(user) = body?;
    debug!(id = %id, subject = %claims.sub, "patch user");
    state.service.patch_user(&id, user).await?;
    Ok(Json(PatchUserResponse { id }))
}

async fn list_users(State(state): State<AppState>) -> ApiResult<ListUsersResponse> {
    let users = state.service.get_users().await?;
    Ok(Json(ListUsersResponse { users }))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
