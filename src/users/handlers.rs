use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection},
        FromRef, Path, State,
    },
    http::StatusCode,
    routing::{get, post},
    Form, Json, Router,
};
use tracing::instrument;

use super::{
    dto::{LoginForm, PublicUser, RegisterResponse, TokenResponse, UserPayload},
    services,
};
use crate::{
    auth::{AuthUser, JwtKeys},
    error::{AppError, AppResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/me", get(get_me))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let Json(payload) = payload?;
    let created = services::register(state.store.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    form: Result<Form<LoginForm>, FormRejection>,
) -> AppResult<Json<TokenResponse>> {
    let Form(form) = form?;
    if let Some(grant_type) = form.grant_type.as_deref() {
        if grant_type != "password" {
            return Err(AppError::InvalidArgument("unsupported grant_type".into()));
        }
    }
    let keys = JwtKeys::from_ref(&state);
    let token = services::login(state.store.as_ref(), &keys, form.into()).await?;
    Ok(Json(token))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(email): AuthUser,
) -> AppResult<Json<PublicUser>> {
    let user = services::get_current_user(state.store.as_ref(), &email).await?;
    Ok(Json(user))
}

#[instrument(skip(state, _auth))]
pub async fn list_users(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> AppResult<Json<Vec<PublicUser>>> {
    Ok(Json(services::list_users(state.store.as_ref()).await?))
}

#[instrument(skip(state, _auth, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    let Json(payload) = payload?;
    let user = services::create_user(state.store.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, _auth))]
pub async fn get_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<PublicUser>> {
    Ok(Json(services::get_user(state.store.as_ref(), &id).await?))
}

#[instrument(skip(state, _auth, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> AppResult<Json<PublicUser>> {
    let Json(payload) = payload?;
    let user = services::update_user(state.store.as_ref(), &id, payload).await?;
    Ok(Json(user))
}

#[instrument(skip(state, _auth))]
pub async fn delete_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    services::delete_user(state.store.as_ref(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
