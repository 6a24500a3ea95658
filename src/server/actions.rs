use std::sync::Arc;

use axum::extract::{Multipart, State};

use crate::auth::CurrentPrincipal;
use crate::registry::Action;
use crate::server::AppState;
use crate::server::response::ApiError;

/// The distutils-style upload endpoint: a multipart form whose `:action`
/// field picks `submit`, `file_upload` or `user`.
pub async fn form_action(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<&'static str, ApiError> {
    let mut action = None;
    let mut fields = Vec::new();
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed form: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);

        if name == "content" {
            let filename = file_name
                .ok_or_else(|| ApiError::bad_request("File content has no filename"))?;
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {e}")))?;
            upload = Some((filename, data));
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::bad_request(format!("Malformed form field: {e}")))?;
        if name == ":action" {
            action = Some(value);
        } else {
            fields.push((name, value));
        }
    }

    let action = action.ok_or_else(|| ApiError::bad_request("Missing :action field"))?;
    let action = Action::from_form(&action, &fields, upload)?;

    state.registry.perform(&principal, action).await?;
    Ok("OK")
}
