use std::fmt;

use super::role::ANONYMOUS;

/// The identity a request acts as. Threaded explicitly through every
/// registry operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Principal(Option<String>);

impl Principal {
    #[must_use]
    pub fn anonymous() -> Self {
        Self(None)
    }

    /// Empty names and the reserved name "anonymous" both map to the anonymous principal.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        let username = username.into();
        if username.is_empty() || username == ANONYMOUS {
            Self(None)
        } else {
            Self(Some(username))
        }
    }

    #[must_use]
    pub fn from_option(username: Option<&str>) -> Self {
        username.map(Self::new).unwrap_or_default()
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.0.is_none()
    }

    /// The username the principal is recorded under; "anonymous" when unauthenticated.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.as_deref().unwrap_or(ANONYMOUS)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
