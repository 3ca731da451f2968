// batch/mod.rs - fan-out of the `r` query parameter
//
// Every descriptor becomes its own sub-request with its own response. The
// results are merged afterwards, in list order, into one array keyed by the
// original request URI, so no item can overwrite another.

use axum::http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::app::RequestContext;
use crate::dispatch::{not_found, DispatchResult, Dispatcher};
use crate::error::ApiError;
use crate::http::{Request, Response};
use crate::module::ModuleManager;
use crate::router::Router;

/// Query parameter carrying the JSON list of sub-requests
pub const BATCH_PARAM: &str = "r";

/// One element of the batch list: a bare URI or a URI with method and fields
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BatchDescriptor {
    Uri(String),
    Detailed {
        uri: String,
        #[serde(default)]
        method: Option<String>,
        #[serde(default)]
        data: HashMap<String, Value>,
    },
}

impl BatchDescriptor {
    pub fn uri(&self) -> &str {
        match self {
            BatchDescriptor::Uri(uri) => uri,
            BatchDescriptor::Detailed { uri, .. } => uri,
        }
    }
}

/// Outcome of one sub-request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRecord {
    pub index: usize,
    pub uri: String,
    pub status: u16,
    pub response: Value,
}

/// Decode the `r` parameter; anything but a JSON list of descriptors fails the whole batch
pub fn parse_batch(raw: &str) -> Result<Vec<BatchDescriptor>, ApiError> {
    serde_json::from_str(raw).map_err(|e| {
        warn!("Rejecting batch payload: {}", e);
        ApiError::validation_error(format!("Invalid batch request: {}", e), None)
    })
}

fn field_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Sub-request for `descriptor`, inheriting headers and identity from `original`
pub fn derive_request(original: &Request, descriptor: &BatchDescriptor) -> Result<Request, ApiError> {
    let (method, data) = match descriptor {
        BatchDescriptor::Uri(_) => (original.method().clone(), HashMap::new()),
        BatchDescriptor::Detailed { method, data, .. } => {
            let method = match method {
                Some(name) => Method::from_bytes(name.to_ascii_uppercase().as_bytes())
                    .map_err(|_| ApiError::bad_request(format!("Invalid batch method '{}'", name)))?,
                None => original.method().clone(),
            };
            (method, data.iter().map(|(k, v)| (k.clone(), field_value(v))).collect())
        }
    };

    let mut request = Request::new(method, descriptor.uri())?
        .with_headers(original.headers().clone())
        .with_body(data);
    request.set_account(original.account());

    Ok(request)
}

async fn run_item(
    ctx: &mut RequestContext,
    router: &Router,
    modules: &ModuleManager,
    original: &Request,
    descriptor: &BatchDescriptor,
) -> Response {
    let mut response = Response::new();
    response.set_language(ctx.language.clone());
    response.set_account(original.account());

    let request = match derive_request(original, descriptor) {
        Ok(request) => request,
        Err(e) => {
            response.fail(&e);
            return response;
        }
    };

    modules.initialize_for(&request, &mut ctx.modules);

    let target = router.route(request.verb(), request.path());
    match Dispatcher::dispatch(target, ctx, &request, &mut response).await {
        Ok(DispatchResult::Empty) => not_found(&request, &mut response),
        Ok(DispatchResult::Dispatched(_)) => {}
        Err(e) => response.fail(&e),
    }

    response
}

/// Run every descriptor in list order; a failing item never stops the ones after it
pub async fn run_batch(
    ctx: &mut RequestContext,
    router: &Router,
    modules: &ModuleManager,
    original: &Request,
    descriptors: &[BatchDescriptor],
) -> Vec<BatchRecord> {
    let mut records = Vec::with_capacity(descriptors.len());

    for (index, descriptor) in descriptors.iter().enumerate() {
        let response = run_item(ctx, router, modules, original, descriptor).await;
        debug!("Batch item {} ({}) finished with {}", index, descriptor.uri(), response.status());

        let body = match response.to_json() {
            Some(json) => json,
            None => Value::String(String::from_utf8_lossy(&response.render().1).into_owned()),
        };

        records.push(BatchRecord {
            index,
            uri: descriptor.uri().to_string(),
            status: response.status().as_u16(),
            response: body,
        });
    }

    info!("Batch of {} items completed for {}", records.len(), original.uri());
    records
}

/// Write the records into `response` under the original URI
pub fn merge(response: &mut Response, original: &Request, records: Vec<BatchRecord>) {
    let merged = records
        .into_iter()
        .map(|r| serde_json::to_value(r).unwrap_or(Value::Null))
        .collect();

    response.set_status(StatusCode::OK);
    response.set(original.uri(), Value::Array(merged));
}
