use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};

use crate::auth::CurrentPrincipal;
use crate::server::AppState;
use crate::server::dto::{
    AddPinRequest, ChangedResponse, FindRequest, FindResult, GrantRequest, ListDistrosParams,
    RegisterRequest, ReplaceIndexRequest, SubmitDistroRequest, WhoAmIResponse,
};
use crate::server::response::{ApiError, ApiResponse, DEFAULT_PAGE_SIZE, paginate};
use crate::store::DistroOrder;

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/whoami", get(whoami))
        .route("/register", post(register))
        .route("/find", post(find))
        .route("/distros", get(list_distros).post(submit_distro))
        .route("/distros/{id}", get(get_distro).delete(delete_distro))
        .route("/distros/{id}/roles", get(distro_roles))
        .route("/distros/{id}/grants", get(list_grants).put(set_grant))
        .route("/distros/{id}/public", post(make_public))
        .route("/distros/{id}/files", get(list_files))
        .route("/distros/{id}/files/{filename}", get(file_info))
        .route("/distros/{id}/indexes", get(list_indexes))
        .route(
            "/distros/{id}/indexes/{index}",
            get(resolve_index).put(replace_index).delete(clear_index),
        )
        .route("/distros/{id}/indexes/{index}/pins", post(add_pin))
        .route(
            "/distros/{id}/indexes/{index}/pins/{target}",
            delete(remove_pin),
        )
}

async fn whoami(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let roles = state.registry.roles(&principal, None)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(WhoAmIResponse {
        username: principal.name().to_string(),
        anonymous: principal.is_anonymous(),
        roles,
    })))
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    let user = state.registry.register_user(
        &req.username,
        &req.password,
        &req.confirm,
        req.email.as_deref(),
    )?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

async fn find(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Json(req): Json<FindRequest>,
) -> impl IntoResponse {
    let found = state
        .registry
        .find_by_requirement(&principal, &req.requirements)
        .await?;

    let results: Vec<FindResult> = found
        .into_iter()
        .map(|(distro, files)| FindResult { distro, files })
        .collect();

    Ok::<_, ApiError>(Json(ApiResponse::success(results)))
}

async fn list_distros(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListDistrosParams>,
) -> impl IntoResponse {
    let order = match params.order.as_deref() {
        None | Some("id") => DistroOrder::DistroId,
        Some("updated") => DistroOrder::LastUpdated,
        Some(other) => {
            return Err(ApiError::bad_request(format!(
                "Unknown order \"{other}\", expected \"id\" or \"updated\""
            )));
        }
    };

    let distros = match params.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => state.registry.search(&principal, q, order)?,
        _ => state.registry.list_distros(&principal, order)?,
    };

    Ok::<_, ApiError>(Json(paginate(
        distros,
        params.page.unwrap_or(1),
        DEFAULT_PAGE_SIZE,
    )))
}

async fn submit_distro(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitDistroRequest>,
) -> impl IntoResponse {
    let distro = state
        .registry
        .upsert_metadata(&principal, &req.name, req.metadata)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(distro)))
}

async fn get_distro(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let distro = state.registry.get_distro(&principal, &id)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(distro)))
}

async fn delete_distro(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    state.registry.delete_distro(&principal, &id).await?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

async fn distro_roles(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let roles = state.registry.roles(&principal, Some(&id))?;

    Ok::<_, ApiError>(Json(ApiResponse::success(roles)))
}

async fn list_grants(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let grants = state.registry.list_grants(&principal, &id)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(grants)))
}

async fn set_grant(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<GrantRequest>,
) -> impl IntoResponse {
    let subject = req.subject()?;
    let changed = state
        .registry
        .set_roles(&principal, Some(&id), &subject, &req.role_set())?;

    Ok::<_, ApiError>(Json(ApiResponse::success(ChangedResponse { changed })))
}

async fn make_public(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let changed = state.registry.make_public(&principal, &id)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(ChangedResponse { changed })))
}

async fn list_files(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let files = state.registry.list_files(&principal, &id).await?;

    Ok::<_, ApiError>(Json(ApiResponse::success(files)))
}

async fn file_info(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Path((id, filename)): Path<(String, String)>,
) -> impl IntoResponse {
    let info = state.registry.file_info(&principal, &id, &filename).await?;

    Ok::<_, ApiError>(Json(ApiResponse::success(info)))
}

async fn list_indexes(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let indexes = state.registry.list_indexes(&principal, &id)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(indexes)))
}

async fn resolve_index(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(String, String)>,
) -> impl IntoResponse {
    let entries = state.registry.resolve_index(&principal, &id, &index).await?;

    Ok::<_, ApiError>(Json(ApiResponse::success(entries)))
}

async fn replace_index(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(String, String)>,
    Json(req): Json<ReplaceIndexRequest>,
) -> impl IntoResponse {
    let pins = state.registry.replace_index(
        &principal,
        &id,
        &index,
        &req.requirements,
        req.overwrite,
    )?;

    Ok::<_, ApiError>(Json(ApiResponse::success(pins)))
}

async fn clear_index(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(String, String)>,
) -> impl IntoResponse {
    state.registry.clear_index(&principal, &id, &index)?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

async fn add_pin(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(String, String)>,
    Json(req): Json<AddPinRequest>,
) -> impl IntoResponse {
    let pin = state
        .registry
        .add_pin(&principal, &id, &index, &req.requirement)?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(pin))))
}

async fn remove_pin(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Path((id, index, target)): Path<(String, String, String)>,
) -> impl IntoResponse {
    if !state.registry.remove_pin(&principal, &id, &index, &target)? {
        return Err(ApiError::not_found(format!(
            "no pin of \"{target}\" in index \"{index}\""
        )));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
