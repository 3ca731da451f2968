pub mod language;

use axum::http::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::app::RequestContext;
use crate::error::ApiError;
use crate::http::{Request, Response};
use crate::router::RouteTarget;
use crate::session::{SessionStore, CSRF};

pub use language::negotiate_language;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    /// Handler with this id ran
    Dispatched(String),
    /// No route matched
    Empty,
}

impl DispatchResult {
    pub fn is_empty(&self) -> bool {
        matches!(self, DispatchResult::Empty)
    }
}

/// A request without a `CSRF` field passes; one with the field must match the session token
pub fn verify_csrf(request: &Request, session: &dyn SessionStore) -> Result<(), ApiError> {
    let supplied = match request.field(CSRF) {
        Some(token) => token,
        None => return Ok(()),
    };

    match session.get(CSRF).and_then(Value::as_str) {
        Some(expected) if expected == supplied => Ok(()),
        _ => {
            warn!("CSRF token mismatch for {}", request);
            Err(ApiError::forbidden("CSRF token mismatch"))
        }
    }
}

/// 404 with an empty entry keyed by the request URI
pub fn not_found(request: &Request, response: &mut Response) {
    response.set_status(StatusCode::NOT_FOUND);
    response.set(request.uri(), json!(""));
}

pub struct Dispatcher;

impl Dispatcher {
    /// Run the handler behind `target`. CSRF is re-checked here so that no handler
    /// ever runs for a request carrying a foreign token.
    pub async fn dispatch(
        target: Option<&RouteTarget>,
        ctx: &mut RequestContext,
        request: &Request,
        response: &mut Response,
    ) -> Result<DispatchResult, ApiError> {
        verify_csrf(request, ctx.session.as_ref())?;

        let target = match target {
            Some(target) => target,
            None => return Ok(DispatchResult::Empty),
        };

        debug!("Dispatching {} to {}", request, target.id);
        target.handler.handle(ctx, request, response).await?;

        Ok(DispatchResult::Dispatched(target.id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::HandlerRegistry;
    use crate::testing::{RecordingSession, TestServices};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_target(calls: Arc<AtomicUsize>) -> RouteTarget {
        let mut registry = HandlerRegistry::new();
        registry.register_fn("News:list", move |_, request, response| {
            calls.fetch_add(1, Ordering::SeqCst);
            response.set(request.uri(), json!("news"));
            Ok(())
        });

        RouteTarget {
            id: "News:list".into(),
            handler: registry.get("News:list").unwrap(),
        }
    }

    #[test]
    fn csrf_is_optional_but_must_match() {
        let session = RecordingSession::new().with(CSRF, json!("token"));

        let plain = Request::post("/en/news").unwrap();
        assert!(verify_csrf(&plain, &session).is_ok());

        let good = Request::post("/en/news").unwrap().with_field(CSRF, "token");
        assert!(verify_csrf(&good, &session).is_ok());

        let bad = Request::post("/en/news").unwrap().with_field(CSRF, "other");
        assert_eq!(verify_csrf(&bad, &session).unwrap_err().status_code(), 403);

        let no_token = RecordingSession::new();
        assert!(verify_csrf(&good, &no_token).is_err());
    }

    #[tokio::test]
    async fn dispatch_runs_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let target = counting_target(calls.clone());
        let mut ctx = TestServices::new().build().context();

        let request = Request::get("/en/news").unwrap();
        let mut response = Response::new();
        let result = Dispatcher::dispatch(Some(&target), &mut ctx, &request, &mut response)
            .await
            .unwrap();

        assert_eq!(result, DispatchResult::Dispatched("News:list".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(response.get("/en/news"), Some(&json!("news")));
    }

    #[tokio::test]
    async fn csrf_mismatch_never_reaches_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let target = counting_target(calls.clone());
        let session = RecordingSession::new().with(CSRF, json!("token"));
        let mut ctx = TestServices::new().build().context_with(Box::new(session));

        let request = Request::post("/en/news").unwrap().with_field(CSRF, "forged");
        let mut response = Response::new();
        let err = Dispatcher::dispatch(Some(&target), &mut ctx, &request, &mut response)
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 403);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_target_is_empty_result() {
        let mut ctx = TestServices::new().build().context();
        let request = Request::get("/en/nothing?x=1").unwrap();
        let mut response = Response::new();

        let result = Dispatcher::dispatch(None, &mut ctx, &request, &mut response).await.unwrap();
        assert!(result.is_empty());

        not_found(&request, &mut response);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.to_json(), Some(json!({"/en/nothing?x=1": ""})));
    }
}
