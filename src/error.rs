use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("\"{principal}\" is not permitted to access \"{resource}\"")]
    PermissionDenied { principal: String, resource: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("disabled: {0}")]
    Disabled(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("upstream error: {0}")]
    Upstream(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn no_such_distro(distro_id: &str) -> Self {
        Self::NotFound(format!("no such distro \"{distro_id}\""))
    }

    pub fn denied(principal: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::PermissionDenied {
            principal: principal.into(),
            resource: resource.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
