use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use std::collections::HashMap;
use url::Url;

use crate::error::ApiError;
use crate::types::{AccountId, RouteVerb, GUEST_ACCOUNT};

/// One logical request as seen by the dispatch core
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: String,
    path: String,
    segments: Vec<String>,
    query: HashMap<String, String>,
    body: HashMap<String, String>,
    headers: HeaderMap,
    account: AccountId,
}

impl Request {
    /// Parse `uri` (path with optional query) into a request
    pub fn new(method: Method, uri: &str) -> Result<Self, ApiError> {
        // glued onto a fixed origin so `//host/..` stays a path
        let trimmed = uri.trim();
        let slash = if trimmed.starts_with('/') { "" } else { "/" };
        let url = Url::parse(&format!("http://localhost{}{}", slash, trimmed))
            .map_err(|e| ApiError::bad_request(format!("Invalid request URI '{}': {}", uri, e)))?;

        let path = url.path().to_string();
        let segments = url
            .path_segments()
            .map(|parts| parts.filter(|p| !p.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();
        let query = url.query_pairs().into_owned().collect();

        let uri = match url.query() {
            Some(q) if !q.is_empty() => format!("{}?{}", path, q),
            _ => path.clone(),
        };

        Ok(Self {
            method,
            uri,
            path,
            segments,
            query,
            body: HashMap::new(),
            headers: HeaderMap::new(),
            account: GUEST_ACCOUNT,
        })
    }

    pub fn get(uri: &str) -> Result<Self, ApiError> {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: &str) -> Result<Self, ApiError> {
        Self::new(Method::POST, uri)
    }

    pub fn with_body(mut self, body: HashMap<String, String>) -> Self {
        self.body = body;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.body.insert(key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn verb(&self) -> RouteVerb {
        RouteVerb::from_method(&self.method)
    }

    /// Path plus query string, as used for response keys
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Zero-based non-empty path segment
    pub fn segment(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(String::as_str)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Body field, falling back to the query parameter of the same name
    pub fn field(&self, key: &str) -> Option<&str> {
        self.body
            .get(key)
            .or_else(|| self.query.get(key))
            .map(String::as_str)
    }

    pub fn body(&self) -> &HashMap<String, String> {
        &self.body
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub(crate) fn set_account(&mut self, account: AccountId) {
        self.account = account;
    }

    /// Two-letter language from the first path segment, else from Accept-Language
    pub fn language(&self) -> Option<String> {
        if let Some(first) = self.segment(0) {
            if first.len() == 2 && first.chars().all(|c| c.is_ascii_alphabetic()) {
                return Some(first.to_ascii_lowercase());
            }
        }

        self.headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|tag| tag.split(';').next().unwrap_or(tag).trim())
            .and_then(|tag| tag.split('-').next())
            .filter(|primary| primary.len() == 2)
            .map(str::to_ascii_lowercase)
    }

    /// Path with a leading language segment removed
    pub fn path_without_language(&self) -> String {
        let skip = match self.segment(0) {
            Some(first) if first.len() == 2 && first.chars().all(|c| c.is_ascii_alphabetic()) => 1,
            _ => 0,
        };

        format!("/{}", self.segments[skip.min(self.segments.len())..].join("/"))
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_path_and_query() {
        let request = Request::get("/en/backend/admin?id=3&r=%5B%5D").unwrap();
        assert_eq!(request.path(), "/en/backend/admin");
        assert_eq!(request.segment(1), Some("backend"));
        assert_eq!(request.segment(5), None);
        assert_eq!(request.query("id"), Some("3"));
        assert_eq!(request.query("r"), Some("[]"));
        assert_eq!(request.uri(), "/en/backend/admin?id=3&r=%5B%5D");
    }

    #[test]
    fn scheme_relative_paths_stay_paths() {
        let request = Request::get("//evil.example/en/news?id=2").unwrap();
        assert_eq!(request.path(), "//evil.example/en/news");
        assert_eq!(request.uri(), "//evil.example/en/news?id=2");
        assert_eq!(request.segments(), ["evil.example", "en", "news"]);

        let request = Request::get("en/news").unwrap();
        assert_eq!(request.path(), "/en/news");
    }

    #[test]
    fn body_fields_shadow_query() {
        let request = Request::post("/en/api/login?user=a")
            .unwrap()
            .with_field("user", "b");
        assert_eq!(request.field("user"), Some("b"));
        assert_eq!(request.query("user"), Some("a"));
        assert_eq!(request.verb(), RouteVerb::SET);
    }

    #[test]
    fn language_from_path_then_header() {
        assert_eq!(Request::get("/DE/news").unwrap().language().as_deref(), Some("de"));

        let request = Request::get("/api/news")
            .unwrap()
            .with_header(header::ACCEPT_LANGUAGE, HeaderValue::from_static("fr-CH, fr;q=0.9"));
        assert_eq!(request.language().as_deref(), Some("fr"));

        assert_eq!(Request::get("/api/news").unwrap().language(), None);
    }

    #[test]
    fn strips_language_segment() {
        assert_eq!(Request::get("/en/backend/admin").unwrap().path_without_language(), "/backend/admin");
        assert_eq!(Request::get("/api/x").unwrap().path_without_language(), "/api/x");
        assert_eq!(Request::get("/").unwrap().path_without_language(), "/");
    }

    #[test]
    fn starts_as_guest() {
        assert_eq!(Request::get("/").unwrap().account(), GUEST_ACCOUNT);
    }
}
