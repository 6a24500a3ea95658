use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Extracts `(username, password)` from a Basic auth header.
/// Expects format: Basic base64(username:password)
pub fn extract_basic_credentials(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    let (username, password) = credentials.split_once(':')?;
    if username.is_empty() {
        return None;
    }

    Some((username.to_string(), password.to_string()))
}
