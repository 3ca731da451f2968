// http/web.rs - axum host for the dispatch pipeline
//
// axum only owns /health; every other path goes through the fallback into
// the core router.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, warn};

use super::Request;
use crate::app::Application;
use crate::config::AppConfig;
use crate::session::{SessionManager, SessionStore};

#[derive(Clone)]
struct WebState {
    app: Application,
    sessions: SessionManager,
}

/// axum router serving `app`
pub fn router(app: Application, sessions: SessionManager) -> Router {
    let config = app.config().clone();
    let state = WebState { app, sessions };

    let router = Router::new()
        .route("/health", get(health))
        .fallback(dispatch)
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .layer(cors_layer(&config));

    if config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.is_development() || config.security.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health(State(state): State<WebState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let status = state.app.services().databases.primary_status().await;

    if status.is_ok() {
        (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database": format!("{:?}", status)
                }
            })),
        )
    }
}

async fn dispatch(
    State(state): State<WebState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    let request = match Request::new(method, path) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };
    let fields = decode_body(&headers, &body);
    let request = request.with_body(fields).with_headers(headers.clone());

    let cookie_name = &state.app.config().session.cookie_name;
    let (session, created) = state.sessions.open(session_cookie(&headers, cookie_name).as_deref()).await;
    let session_id = session.id().to_string();

    let response = state.app.handle(request, Box::new(session)).await;
    let mut response = response.into_axum();

    if created {
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            cookie_name,
            session_id,
            state.sessions.ttl().num_seconds()
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}

/// Value of the session cookie, if the client sent one
pub fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

fn json_field(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// JSON objects and urlencoded forms become body fields; anything else is ignored
pub fn decode_body(headers: &HeaderMap, body: &[u8]) -> HashMap<String, String> {
    if body.is_empty() {
        return HashMap::new();
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("application/json") {
        match serde_json::from_slice::<Map<String, Value>>(body) {
            Ok(object) => object.into_iter().map(|(k, v)| (k, json_field(v))).collect(),
            Err(e) => {
                debug!("Ignoring undecodable JSON body: {}", e);
                HashMap::new()
            }
        }
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        url::form_urlencoded::parse(body).into_owned().collect()
    } else {
        HashMap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; sid=abc123"));
        assert_eq!(session_cookie(&headers, "sid").as_deref(), Some("abc123"));
        assert_eq!(session_cookie(&headers, "other"), None);
    }

    #[test]
    fn decodes_json_and_forms() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let fields = decode_body(&headers, br#"{"user": "admin", "id": 4}"#);
        assert_eq!(fields["user"], "admin");
        assert_eq!(fields["id"], "4");

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded; charset=utf-8"),
        );
        let fields = decode_body(&headers, b"user=admin&pass=or%20ange");
        assert_eq!(fields["pass"], "or ange");

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert!(decode_body(&headers, b"user=admin").is_empty());
    }
}
