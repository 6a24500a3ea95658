//! Fallback to upstream package indexes for distributions not held locally.
//!
//! A project is fetched through the index's JSON API
//! (`<base>/pypi/<name>/json`) and every release file is downloaded before
//! anything is registered, so an interrupted fetch leaves no trace.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::{DistroMetadata, make_distro_id};
use crate::version::ArchiveName;

#[derive(Debug, Deserialize)]
struct ProjectJson {
    info: InfoJson,
    #[serde(default)]
    releases: BTreeMap<String, Vec<ReleaseFileJson>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InfoJson {
    name: String,
    author: Option<String>,
    author_email: Option<String>,
    classifiers: Vec<String>,
    description: Option<String>,
    download_url: Option<String>,
    home_page: Option<String>,
    keywords: Option<String>,
    license: Option<String>,
    metadata_version: Option<String>,
    platform: Option<String>,
    summary: Option<String>,
    version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ReleaseFileJson {
    filename: String,
    url: String,
}

/// A release file to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub filename: String,
    pub url: String,
}

/// Project metadata and file list as published upstream.
#[derive(Debug, Clone)]
pub struct RemoteProject {
    pub name: String,
    pub metadata: DistroMetadata,
    pub files: Vec<RemoteFile>,
}

/// A project with every archive already downloaded.
#[derive(Debug, Clone)]
pub struct FetchedProject {
    pub name: String,
    pub metadata: DistroMetadata,
    pub files: Vec<(String, Bytes)>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_project(body: &str) -> Result<RemoteProject> {
    let project: ProjectJson = serde_json::from_str(body)
        .map_err(|e| Error::Upstream(format!("malformed project json: {e}")))?;
    let info = project.info;

    let classifiers = if info.classifiers.is_empty() {
        None
    } else {
        Some(info.classifiers.join("\n"))
    };

    // Only archives the local listing can order are imported.
    let files = project
        .releases
        .into_values()
        .flatten()
        .filter(|f| ArchiveName::parse(&f.filename).is_some())
        .map(|f| RemoteFile {
            filename: f.filename,
            url: f.url,
        })
        .collect();

    Ok(RemoteProject {
        metadata: DistroMetadata {
            author: non_empty(info.author),
            author_email: non_empty(info.author_email),
            classifiers,
            description: non_empty(info.description),
            download_url: non_empty(info.download_url),
            home_page: non_empty(info.home_page),
            keywords: non_empty(info.keywords),
            license: non_empty(info.license),
            metadata_version: non_empty(info.metadata_version),
            platform: non_empty(info.platform),
            summary: non_empty(info.summary),
            version: non_empty(info.version),
        },
        name: info.name,
        files,
    })
}

#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
    indexes: Vec<String>,
}

impl UpstreamClient {
    pub fn new(indexes: Vec<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("pkgvault/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Upstream(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            indexes: indexes
                .into_iter()
                .map(|i| i.trim_end_matches('/').to_string())
                .collect(),
        })
    }

    /// Tries each configured index in order. Returns `None` when no index
    /// knows the project or all of them fail.
    pub async fn fetch(&self, distro_id: &str) -> Option<FetchedProject> {
        for base in &self.indexes {
            match self.fetch_from(base, distro_id).await {
                Ok(Some(project)) => return Some(project),
                Ok(None) => {
                    tracing::debug!("{} has no project \"{}\"", base, distro_id);
                }
                Err(e) => {
                    tracing::warn!("Fetching \"{}\" from {} failed: {e}", distro_id, base);
                }
            }
        }
        None
    }

    async fn fetch_from(&self, base: &str, distro_id: &str) -> Result<Option<FetchedProject>> {
        let url = format!("{base}/pypi/{}/json", urlencoding::encode(distro_id));
        let resp = self.client.get(&url).send().await.map_err(upstream)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = resp.error_for_status().map_err(upstream)?;
        let body = resp.text().await.map_err(upstream)?;

        let project = parse_project(&body)?;
        if make_distro_id(&project.name) != distro_id {
            return Ok(None);
        }

        let mut files = Vec::with_capacity(project.files.len());
        for file in &project.files {
            let content = self
                .client
                .get(&file.url)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(upstream)?
                .bytes()
                .await
                .map_err(upstream)?;
            files.push((file.filename.clone(), content));
        }

        tracing::info!(
            "Fetched \"{}\" with {} files from {}",
            project.name,
            files.len(),
            base
        );
        Ok(Some(FetchedProject {
            name: project.name,
            metadata: project.metadata,
            files,
        }))
    }
}

fn upstream(e: reqwest::Error) -> Error {
    Error::Upstream(e.to_string())
}
