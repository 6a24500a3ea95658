use bytes::Bytes;

use super::Registry;
use crate::error::{Error, Result};
use crate::types::{Distribution, DistroMetadata, FileEntry, Principal, User};

/// A command submitted through the legacy `POST /` form, selected by its
/// `:action` field.
#[derive(Debug, Clone)]
pub enum Action {
    Submit {
        name: String,
        metadata: DistroMetadata,
    },
    FileUpload {
        name: String,
        filename: String,
        content: Bytes,
    },
    Register {
        username: String,
        password: String,
        confirm: String,
        email: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub enum ActionOutcome {
    Submitted(Distribution),
    Uploaded(FileEntry),
    Registered(User),
}

impl Action {
    /// Builds an action from decoded form fields. Fields may repeat
    /// (`classifiers` usually does); repeated values are joined by newlines.
    pub fn from_form(
        action: &str,
        fields: &[(String, String)],
        upload: Option<(String, Bytes)>,
    ) -> Result<Self> {
        match action {
            "submit" => Ok(Self::Submit {
                name: required(fields, "name")?,
                metadata: DistroMetadata {
                    author: joined(fields, "author"),
                    author_email: joined(fields, "author_email"),
                    classifiers: joined(fields, "classifiers"),
                    description: joined(fields, "description"),
                    download_url: joined(fields, "download_url"),
                    home_page: joined(fields, "home_page"),
                    keywords: joined(fields, "keywords"),
                    license: joined(fields, "license"),
                    metadata_version: joined(fields, "metadata_version"),
                    platform: joined(fields, "platform"),
                    summary: joined(fields, "summary"),
                    version: joined(fields, "version"),
                },
            }),
            "file_upload" => {
                let (filename, content) =
                    upload.ok_or_else(|| Error::invalid("missing \"content\" file"))?;
                Ok(Self::FileUpload {
                    name: required(fields, "name")?,
                    filename,
                    content,
                })
            }
            "user" => Ok(Self::Register {
                username: joined(fields, "name").unwrap_or_default(),
                password: joined(fields, "password").unwrap_or_default(),
                confirm: joined(fields, "confirm").unwrap_or_default(),
                email: joined(fields, "email"),
            }),
            other => Err(Error::invalid(format!(
                "action \"{other}\" is not handled by this server"
            ))),
        }
    }
}

fn joined(fields: &[(String, String)], key: &str) -> Option<String> {
    let values: Vec<&str> = fields
        .iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join("\n"))
    }
}

fn required(fields: &[(String, String)], key: &str) -> Result<String> {
    joined(fields, key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::invalid(format!("missing \"{key}\" field")))
}

impl Registry {
    pub async fn perform(&self, principal: &Principal, action: Action) -> Result<ActionOutcome> {
        match action {
            Action::Submit { name, metadata } => self
                .upsert_metadata(principal, &name, metadata)
                .map(ActionOutcome::Submitted),
            Action::FileUpload {
                name,
                filename,
                content,
            } => self
                .upload_file(principal, &name, &filename, &content)
                .await
                .map(ActionOutcome::Uploaded),
            Action::Register {
                username,
                password,
                confirm,
                email,
            } => self
                .register_user(&username, &password, &confirm, email.as_deref())
                .map(ActionOutcome::Registered),
        }
    }
}
