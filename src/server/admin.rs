//! Account administration. Every handler here needs a global `manager`,
//! except reading your own group memberships.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, put},
};

use crate::auth::CurrentPrincipal;
use crate::server::AppState;
use crate::server::dto::{
    ChangedResponse, GrantRequest, SetGroupsRequest, UpdateGroupRequest, UpdateUserRequest,
    to_role_set,
};
use crate::server::response::{ApiError, ApiResponse};

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{name}", put(update_user))
        .route("/users/{name}/groups", get(get_groups).put(set_groups))
        .route("/groups", get(list_groups))
        .route("/groups/{name}", put(update_group))
        .route("/grants", put(set_global_grant))
}

async fn list_users(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let users = state.registry.list_users(&principal)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(users)))
}

async fn update_user(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> impl IntoResponse {
    let roles = req.roles.as_deref().map(to_role_set);
    let user = state.registry.update_user(
        &principal,
        &name,
        req.password.as_deref(),
        req.email.as_deref(),
        roles.as_ref(),
    )?;

    Ok::<_, ApiError>(Json(ApiResponse::success(user)))
}

async fn get_groups(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let groups = state.registry.get_groups(&principal, &name)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(groups)))
}

async fn set_groups(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<SetGroupsRequest>,
) -> impl IntoResponse {
    let groups: BTreeSet<String> = req
        .groups
        .iter()
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .collect();
    let changed = state.registry.set_groups(&principal, &name, &groups)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(ChangedResponse { changed })))
}

async fn list_groups(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let groups = state.registry.list_groups(&principal)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(groups)))
}

async fn update_group(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<UpdateGroupRequest>,
) -> impl IntoResponse {
    let roles = req.roles.as_deref().map(to_role_set);
    let group = state
        .registry
        .update_group(&principal, &name, roles.as_ref())?;

    Ok::<_, ApiError>(Json(ApiResponse::success(group)))
}

async fn set_global_grant(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Json(req): Json<GrantRequest>,
) -> impl IntoResponse {
    let subject = req.subject()?;
    let changed = state
        .registry
        .set_roles(&principal, None, &subject, &req.role_set())?;

    Ok::<_, ApiError>(Json(ApiResponse::success(ChangedResponse { changed })))
}
