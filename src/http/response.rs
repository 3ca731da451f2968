use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::types::{AccountId, GUEST_ACCOUNT};

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Keyed entries rendered as one JSON object in insertion order
    Entries(Vec<(String, Value)>),
    /// Complete JSON document that replaces the entries
    Document(Value),
    Raw { content_type: String, bytes: Vec<u8> },
}

/// Mutable response built up by the pipeline and the handlers
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    language: String,
    account: AccountId,
    body: ResponseBody,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            language: String::new(),
            account: GUEST_ACCOUNT,
            body: ResponseBody::Entries(Vec::new()),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn set_language(&mut self, language: impl Into<String>) {
        self.language = language.into();
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn set_account(&mut self, account: AccountId) {
        self.account = account;
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// Set `key`, replacing an earlier value under the same key in place
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();

        if !matches!(self.body, ResponseBody::Entries(_)) {
            self.body = ResponseBody::Entries(Vec::new());
        }

        if let ResponseBody::Entries(entries) = &mut self.body {
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => entries.push((key, value)),
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match &self.body {
            ResponseBody::Entries(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn entries(&self) -> &[(String, Value)] {
        match &self.body {
            ResponseBody::Entries(entries) => entries,
            _ => &[],
        }
    }

    pub fn set_document(&mut self, document: Value) {
        self.body = ResponseBody::Document(document);
    }

    pub fn set_raw(&mut self, content_type: impl Into<String>, bytes: Vec<u8>) {
        self.body = ResponseBody::Raw {
            content_type: content_type.into(),
            bytes,
        };
    }

    /// Replace whatever was built so far with the error document
    pub fn fail(&mut self, error: &ApiError) {
        self.status = error.status();
        self.body = ResponseBody::Document(error.to_json());
    }

    /// Body as a JSON value; raw bodies have none
    pub fn to_json(&self) -> Option<Value> {
        match &self.body {
            ResponseBody::Entries(entries) => Some(Value::Object(
                entries.iter().cloned().collect::<Map<String, Value>>(),
            )),
            ResponseBody::Document(document) => Some(document.clone()),
            ResponseBody::Raw { .. } => None,
        }
    }

    /// Content type and serialized body
    pub fn render(&self) -> (String, Vec<u8>) {
        match &self.body {
            ResponseBody::Raw { content_type, bytes } => (content_type.clone(), bytes.clone()),
            _ => {
                let json = self.to_json().unwrap_or(Value::Null);
                (
                    "application/json".to_string(),
                    serde_json::to_vec(&json).unwrap_or_default(),
                )
            }
        }
    }

    pub fn into_axum(self) -> axum::response::Response {
        let (content_type, bytes) = self.render();
        let mut response = axum::response::Response::new(axum::body::Body::from(bytes));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;

        if let Ok(value) = HeaderValue::from_str(&content_type) {
            response.headers_mut().insert(header::CONTENT_TYPE, value);
        }
        if !self.language.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&self.language) {
                response.headers_mut().insert(header::CONTENT_LANGUAGE, value);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entries_keep_insertion_order() {
        let mut response = Response::new();
        response.set("b", json!(1));
        response.set("a", json!(2));
        response.set("b", json!(3));

        let keys: Vec<&str> = response.entries().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(response.get("b"), Some(&json!(3)));

        let (content_type, bytes) = response.render();
        assert_eq!(content_type, "application/json");
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"b":3,"a":2}"#);
    }

    #[test]
    fn fail_replaces_body_and_status() {
        let mut response = Response::new();
        response.set("partial", json!(true));
        response.fail(&ApiError::forbidden("CSRF token mismatch"));

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.entries().is_empty());
        assert_eq!(response.to_json().unwrap()["code"], "FORBIDDEN");
    }

    #[test]
    fn set_after_raw_starts_entries() {
        let mut response = Response::new();
        response.set_raw("text/plain", b"hi".to_vec());
        assert!(response.to_json().is_none());

        response.set("x", json!(1));
        assert_eq!(response.to_json(), Some(json!({"x": 1})));
    }

    #[test]
    fn axum_conversion_sets_headers() {
        let mut response = Response::new();
        response.set_language("de");
        response.set_status(StatusCode::NOT_FOUND);

        let converted = response.into_axum();
        assert_eq!(converted.status(), StatusCode::NOT_FOUND);
        assert_eq!(converted.headers()[header::CONTENT_LANGUAGE], "de");
        assert_eq!(converted.headers()[header::CONTENT_TYPE], "application/json");
    }
}
