//! Package-manager facing pages: the simple listing, file downloads and
//! custom index pages.

use std::fmt::Write;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use tokio_util::io::ReaderStream;

use crate::auth::CurrentPrincipal;
use crate::error::Error;
use crate::server::AppState;
use crate::server::response::ApiError;
use crate::store::DistroOrder;
use crate::types::{FileEntry, IndexEntry, Principal, make_distro_id};

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(items: &[String]) -> Html<String> {
    let mut body = String::from("<html><body><ul>\n");
    for item in items {
        let _ = writeln!(body, "<li>{item}</li>");
    }
    body.push_str("</ul></body></html>\n");
    Html(body)
}

fn link(href: &str, text: &str) -> String {
    format!("<a href=\"{}\">{}</a>", escape(href), escape(text))
}

pub async fn redirect_simple_root() -> Redirect {
    Redirect::permanent("/simple/")
}

pub async fn simple_root(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
) -> Result<Html<String>, ApiError> {
    let distros = state
        .registry
        .list_distros(&principal, DistroOrder::DistroId)?;

    let items: Vec<String> = distros
        .iter()
        .map(|d| link(&format!("{}/", d.distro_id), &d.name))
        .collect();
    Ok(page(&items))
}

pub async fn redirect_simple_distro(Path(distro): Path<String>) -> Redirect {
    Redirect::permanent(&format!("/simple/{}/", urlencoding::encode(&distro)))
}

/// Lists a distribution's files, newest first. When the distribution is
/// not held locally, configured upstream indexes are tried before
/// answering 404.
pub async fn simple_distro(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Path(distro): Path<String>,
) -> Result<Html<String>, ApiError> {
    let distro_id = make_distro_id(&distro);

    let files = match state.registry.list_files(&principal, &distro_id).await {
        Err(Error::NotFound(msg)) => {
            if !import_from_upstream(&state, &principal, &distro_id).await {
                return Err(ApiError::not_found(msg));
            }
            state.registry.list_files(&principal, &distro_id).await?
        }
        other => other?,
    };

    Ok(page(&file_links(&distro_id, &files)))
}

fn file_links(distro_id: &str, files: &[FileEntry]) -> Vec<String> {
    files
        .iter()
        .map(|f| {
            link(
                &format!("../../d/{}/f/{}", distro_id, urlencoding::encode(&f.filename)),
                &f.filename,
            )
        })
        .collect()
}

async fn import_from_upstream(state: &AppState, principal: &Principal, distro_id: &str) -> bool {
    let Some(upstream) = &state.upstream else {
        return false;
    };
    let Some(project) = upstream.fetch(distro_id).await else {
        return false;
    };

    match state.registry.import_project(principal, project).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!("Could not import \"{}\" from upstream: {e}", distro_id);
            false
        }
    }
}

pub async fn download_file(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Path((distro_id, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let (reader, size) = state
        .registry
        .open_file(&principal, &distro_id, &filename)
        .await?;

    let body = Body::from_stream(ReaderStream::new(reader));

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, size)
        .header("X-Content-Type-Options", "nosniff")
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()))
}

pub async fn redirect_custom_index(Path((distro_id, indexname)): Path<(String, String)>) -> Redirect {
    Redirect::permanent(&format!(
        "/d/{}/i/{}/",
        urlencoding::encode(&distro_id),
        urlencoding::encode(&indexname)
    ))
}

/// A pip-compatible page listing exactly the archives the index pins.
pub async fn custom_index(
    CurrentPrincipal(principal): CurrentPrincipal,
    State(state): State<Arc<AppState>>,
    Path((distro_id, indexname)): Path<(String, String)>,
) -> Result<Html<String>, ApiError> {
    if !state
        .registry
        .has_index(&principal, &distro_id, &indexname)?
    {
        return Err(ApiError::not_found(format!(
            "no index \"{indexname}\" for \"{distro_id}\""
        )));
    }

    let entries = state
        .registry
        .resolve_index(&principal, &distro_id, &indexname)
        .await?;

    let items: Vec<String> = entries
        .iter()
        .map(|entry| match entry {
            IndexEntry::Resolved { target, file } => link(
                &format!(
                    "../../../{}/f/{}",
                    target.distro_id,
                    urlencoding::encode(&file.filename)
                ),
                &file.filename,
            ),
            IndexEntry::Tombstone { target_distro_id } => {
                format!("{} (no such distro)", escape(target_distro_id))
            }
        })
        .collect();
    Ok(page(&items))
}
