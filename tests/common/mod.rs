#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;

use orange_dispatch::account::{Account, Group, MemoryAccountStore, MemoryGrantSource, PermissionGrant};
use orange_dispatch::app::{Application, Services};
use orange_dispatch::auth::MemoryAuthenticator;
use orange_dispatch::config::AppConfig;
use orange_dispatch::database::{DatabasePool, MemoryConnection, MemorySettings, DEFAULT_LANGUAGE, SITE_NAME};
use orange_dispatch::event::EventBus;
use orange_dispatch::handlers::HandlerRegistry;
use orange_dispatch::http::web;
use orange_dispatch::module::ModuleManager;
use orange_dispatch::router::{RouteTable, Router};
use orange_dispatch::session::SessionManager;
use orange_dispatch::types::PermissionAction;

pub const ADMIN_ID: i64 = 1;
pub const ADMIN_LOGIN: &str = "admin";
pub const ADMIN_PASSWORD: &str = "orange";

const ROUTES: &str = r#"
modules:
  - name: Core
    load: /api
  - name: News
    load: /news
routes:
  - pattern: '/[a-z]{2}/api/status'
    verb: GET
    dest: Core:status
  - pattern: '/[a-z]{2}/api/whoami'
    verb: GET
    dest: Core:whoami
  - pattern: '/[a-z]{2}/news.*'
    verb: [GET, SET]
    dest: News:list
"#;

/// In-memory application plus handles for flipping its state from a test
pub struct TestApp {
    pub router: axum::Router,
    pub connection: Arc<MemoryConnection>,
    pub sessions: SessionManager,
}

pub fn build() -> Result<TestApp> {
    let mut registry = HandlerRegistry::with_builtins();
    registry.register_fn("News:list", |ctx, request, response| {
        response.set(
            request.uri(),
            json!({
                "language": ctx.language,
                "modules": ctx.modules.names(),
                "item": request.field("id"),
            }),
        );
        Ok(())
    });

    let table = RouteTable::from_yaml(ROUTES)?;
    let router = Router::from_table(&table, &registry)?;

    let accounts = Arc::new(MemoryAccountStore::new());
    accounts.insert(Account::new(ADMIN_ID, ADMIN_LOGIN).with_group(Group::new(1, "admin")));

    let grants = Arc::new(MemoryGrantSource::new());
    grants.add(PermissionGrant::for_group(1, PermissionAction::ALL).with_module("Admin"));
    grants.add(PermissionGrant::for_account(ADMIN_ID, PermissionAction::READ).with_module("News"));

    let connection = Arc::new(MemoryConnection::new(DatabasePool::PRIMARY));
    let config = AppConfig::development();
    let sessions = SessionManager::new(config.session.ttl_secs);

    let services = Services {
        databases: DatabasePool::with_primary(connection.clone()),
        router: Arc::new(router),
        modules: Arc::new(ModuleManager::new(table.modules.clone())),
        accounts,
        grants,
        settings: Arc::new(
            MemorySettings::new()
                .with(SITE_NAME, "Orange Integration")
                .with(DEFAULT_LANGUAGE, "en"),
        ),
        authenticator: Arc::new(MemoryAuthenticator::new().with_user(ADMIN_LOGIN, ADMIN_PASSWORD, ADMIN_ID)),
        events: EventBus::new(),
        config,
    };

    Ok(TestApp {
        router: web::router(Application::new(services), sessions.clone()),
        connection,
        sessions,
    })
}

/// Serve `router` on an ephemeral local port; returns the base URL
pub async fn spawn(router: axum::Router) -> Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind test listener")?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    Ok(format!("http://{}", addr))
}

/// `name=value` pair from the Set-Cookie header, ready to send back
pub fn session_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("sid="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}
