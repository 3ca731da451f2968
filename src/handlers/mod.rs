// handlers/mod.rs - typed handler registry
//
// Route destinations in the route file are string ids ("Module:action").
// They are resolved against this registry once, when the route table loads,
// so dispatch only ever sees handler values.

pub mod auth;
pub mod builtin;

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::app::RequestContext;
use crate::error::ApiError;
use crate::http::{Request, Response};

pub use auth::{LoginHandler, LogoutHandler};
pub use builtin::{StatusHandler, WhoamiHandler};

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(
        &self,
        ctx: &mut RequestContext,
        request: &Request,
        response: &mut Response,
    ) -> Result<(), ApiError>;
}

type HandlerFn = dyn Fn(&mut RequestContext, &Request, &mut Response) -> Result<(), ApiError> + Send + Sync;

/// Adapter for synchronous closures
pub struct FnHandler {
    f: Box<HandlerFn>,
}

impl FnHandler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut RequestContext, &Request, &mut Response) -> Result<(), ApiError> + Send + Sync + 'static,
    {
        Self { f: Box::new(f) }
    }
}

#[async_trait]
impl Handler for FnHandler {
    async fn handle(
        &self,
        ctx: &mut RequestContext,
        request: &Request,
        response: &mut Response,
    ) -> Result<(), ApiError> {
        (self.f)(ctx, request, response)
    }
}

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the `Core:*` handlers
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("Core:status", StatusHandler);
        registry.register("Core:whoami", WhoamiHandler);
        registry
    }

    /// Register `handler` under `id`, replacing any previous entry
    pub fn register<H: Handler + 'static>(&mut self, id: impl Into<String>, handler: H) {
        self.handlers.insert(id.into(), Arc::new(handler));
    }

    pub fn register_fn<F>(&mut self, id: impl Into<String>, f: F)
    where
        F: Fn(&mut RequestContext, &Request, &mut Response) -> Result<(), ApiError> + Send + Sync + 'static,
    {
        self.register(id, FnHandler::new(f));
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(id).cloned()
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry").field("ids", &self.ids()).finish()
    }
}
