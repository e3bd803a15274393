use axum::http::HeaderMap;

use crate::error::ApiError;

/// Client identity captured from the request headers at login.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub device: String,
    pub version: String,
}

/// Precondition gate for every credential path: `device` and `version`
/// must be present and non-empty.
pub fn client_headers(headers: &HeaderMap) -> Result<ClientInfo, ApiError> {
    let device = non_empty(headers, "device").ok_or(ApiError::InvalidHeaders)?;
    let version = non_empty(headers, "version").ok_or(ApiError::InvalidHeaders)?;
    Ok(ClientInfo { device, version })
}

pub(crate) fn non_empty(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
