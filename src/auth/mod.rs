mod helpers;
mod middleware;
mod password;

pub use helpers::extract_basic_credentials;
pub use middleware::{AuthError, BASIC_CHALLENGE, CurrentPrincipal};
pub use password::CredentialHasher;
