use crate::models::ApiError;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{self, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{collections::HashMap, convert::Infallible, env, sync::Arc};
use tracing::{info, warn};

pub const ADMIN_KEY_HEADER: &str = "X-Admin-Key";

#[derive(Clone)]
pub struct AdminAuth {
    keys: Arc<HashMap<String, AdminContext>>,
}

/// Who is operating the import screen; attached to each authorized request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminContext {
    pub operator: String,
    pub api_key_id: String,
}

impl AdminAuth {
    pub fn from_env() -> Self {
        let raw = env::var("ADMIN_API_KEYS").unwrap_or_else(|_| "demo-admin:demo-key".to_string());
        Self::from_keys(&raw)
    }

    /// Parses `operator:key` pairs separated by commas.
    pub fn from_keys(raw: &str) -> Self {
        let mut entries = HashMap::new();
        for (idx, token) in raw.split(',').enumerate() {
            let trimmed = token.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut parts = trimmed.splitn(2, ':');
            let operator = parts.next().map(str::trim).filter(|s| !s.is_empty());
            let key = parts.next().map(str::trim).filter(|s| !s.is_empty());
            match (operator, key) {
                (Some(operator), Some(secret)) => {
                    entries.insert(
                        secret.to_string(),
                        AdminContext {
                            operator: operator.to_string(),
                            api_key_id: format!("key-{:02}", idx + 1),
                        },
                    );
                }
                _ => warn!(
                    target = "maison.api",
                    entry = idx + 1,
                    "ignored malformed ADMIN_API_KEYS entry"
                ),
            }
        }

        if entries.is_empty() {
            warn!(
                target = "maison.api",
                "ADMIN_API_KEYS produced no keys; falling back to demo credentials"
            );
            entries.insert(
                "demo-key".to_string(),
                AdminContext {
                    operator: "demo-admin".to_string(),
                    api_key_id: "key-01".to_string(),
                },
            );
        } else {
            info!(target = "maison.api", key_count = entries.len(), "loaded admin keys");
        }

        Self {
            keys: Arc::new(entries),
        }
    }

    fn authenticate(&self, presented: &str) -> Option<AdminContext> {
        self.keys.get(presented).cloned()
    }
}

pub async fn require_admin_auth(
    State(auth): State<AdminAuth>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Infallible> {
    let Some(presented) = extract_api_key(request.headers()) else {
        return Ok(unauthorized_response(
            "missing_api_key",
            "Provide X-Admin-Key or Bearer token",
        ));
    };

    let Some(context) = auth.authenticate(&presented) else {
        return Ok(unauthorized_response("invalid_api_key", "Key not recognized"));
    };

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

fn extract_api_key(headers: &http::HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(http::header::AUTHORIZATION)
        && let Ok(raw) = value.to_str()
        && raw.len() >= 7
        && raw[..6].eq_ignore_ascii_case("bearer")
    {
        return Some(raw[6..].trim().to_string());
    }
    headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn unauthorized_response(code: &str, message: &str) -> Response {
    let payload = ApiError {
        error: code.to_string(),
        detail: Some(message.to_string()),
    };
    (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn parses_operator_key_pairs_and_skips_malformed() {
        let auth = AdminAuth::from_keys("alice:k1, bad-entry ,bob:k2,:k3");
        assert_eq!(auth.keys.len(), 2);
        let bob = auth.authenticate("k2").expect("bob");
        assert_eq!(bob.operator, "bob");
        assert_eq!(bob.api_key_id, "key-03");
        assert!(auth.authenticate("k3").is_none());
    }

    #[test]
    fn empty_config_falls_back_to_demo_key() {
        let auth = AdminAuth::from_keys(" , ");
        assert_eq!(
            auth.authenticate("demo-key").map(|c| c.operator),
            Some("demo-admin".to_string())
        );
    }

    #[test]
    fn key_from_bearer_or_header() {
        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_KEY_HEADER, HeaderValue::from_static(" k1 "));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("k1"));

        headers.insert(http::header::AUTHORIZATION, HeaderValue::from_static("Bearer k2"));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("k2"));

        assert_eq!(extract_api_key(&HeaderMap::new()), None);
    }
}
