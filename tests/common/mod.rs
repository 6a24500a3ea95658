//! In-process harness: a router over a temp database, plus an unrestricted
//! registry on the same store for seeding fixtures.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pkgvault::registry::Registry;
use pkgvault::security::{AllowAllPolicy, EnforcingPolicy};
use pkgvault::server::{AppState, create_router};
use pkgvault::storage::ArchiveStorage;
use pkgvault::store::{SqliteStore, Store};
use pkgvault::types::{DistroMetadata, Principal, RoleSet, Subject};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "s3cret";

pub struct TestApp {
    pub temp_dir: TempDir,
    pub admin: Registry,
    router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response is JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_self_register(false)
    }

    pub fn with_self_register(self_register: bool) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let store = Arc::new(SqliteStore::new(temp_dir.path().join("pkgvault.db")).expect("open db"));
        store.initialize().expect("init schema");
        let files = temp_dir.path().join("files");

        let registry = Registry::new(
            store.clone(),
            ArchiveStorage::new(&files),
            Arc::new(EnforcingPolicy),
        )
        .with_self_register(self_register);
        let admin = Registry::new(store, ArchiveStorage::new(&files), Arc::new(AllowAllPolicy));

        let state = Arc::new(AppState::new(Arc::new(registry), None));
        Self {
            temp_dir,
            admin,
            router: create_router(state),
        }
    }

    fn root() -> Principal {
        Principal::new("admin")
    }

    /// Creates a user whose password is [`PASSWORD`], with optional global roles.
    pub fn user(&self, name: &str, roles: &[&str]) {
        let roles: RoleSet = roles.iter().map(|r| r.to_string()).collect();
        self.admin
            .update_user(&Self::root(), name, Some(PASSWORD), None, Some(&roles))
            .expect("create user");
    }

    /// Creates a distribution owned by `owner`.
    pub fn distro(&self, name: &str, owner: &str) {
        self.admin
            .upsert_metadata(
                &Principal::new(owner),
                name,
                DistroMetadata {
                    summary: Some(format!("{name} summary")),
                    ..Default::default()
                },
            )
            .expect("create distro");
    }

    pub async fn file(&self, name: &str, filename: &str, content: &[u8]) {
        self.admin
            .upload_file(&Self::root(), name, filename, content)
            .await
            .expect("store file");
    }

    pub fn grant(&self, distro_id: Option<&str>, subject: Subject, roles: &[&str]) {
        let roles: RoleSet = roles.iter().map(|r| r.to_string()).collect();
        self.admin
            .set_roles(&Self::root(), distro_id, &subject, &roles)
            .expect("grant roles");
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body")
            .to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, user: Option<&str>) -> TestResponse {
        self.send(request(Method::GET, uri, user).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str, user: Option<&str>) -> TestResponse {
        self.send(request(Method::DELETE, uri, user).body(Body::empty()).unwrap())
            .await
    }

    pub async fn json(&self, method: Method, uri: &str, user: Option<&str>, body: Value) -> TestResponse {
        self.send(
            request(method, uri, user)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Posts a multipart form to `/`. `file` becomes the `content` part.
    pub async fn form(
        &self,
        user: Option<&str>,
        fields: &[(&str, &str)],
        file: Option<(&str, &[u8])>,
    ) -> TestResponse {
        let boundary = "pkgvault-test-boundary";
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((filename, content)) = file {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"content\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        self.send(
            request(Method::POST, "/", user)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }
}

pub fn basic_auth(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}

fn request(method: Method, uri: &str, user: Option<&str>) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match user {
        Some(user) => builder.header(header::AUTHORIZATION, basic_auth(user, PASSWORD)),
        None => builder,
    }
}
