// handlers/builtin.rs - Core:status and Core:whoami

use async_trait::async_trait;
use serde_json::json;

use super::Handler;
use crate::app::RequestContext;
use crate::error::ApiError;
use crate::http::{Request, Response};
use crate::session::CSRF;

/// Site name, negotiated language, account id, the session's CSRF token
/// and the connection bound to this request
pub struct StatusHandler;

#[async_trait]
impl Handler for StatusHandler {
    async fn handle(
        &self,
        ctx: &mut RequestContext,
        request: &Request,
        response: &mut Response,
    ) -> Result<(), ApiError> {
        response.set(
            request.uri(),
            json!({
                "site": ctx.site_name,
                "language": ctx.language,
                "account": ctx.account.id,
                "modules": ctx.modules.names(),
                "csrf": ctx.session.get(CSRF),
                "database": ctx.db.name(),
            }),
        );
        Ok(())
    }
}

/// The resolved account with its groups and grants
pub struct WhoamiHandler;

#[async_trait]
impl Handler for WhoamiHandler {
    async fn handle(
        &self,
        ctx: &mut RequestContext,
        request: &Request,
        response: &mut Response,
    ) -> Result<(), ApiError> {
        let account = &ctx.account;
        let permissions: Vec<_> = account.permissions.iter().collect();

        response.set(
            request.uri(),
            json!({
                "id": account.id,
                "name": account.name,
                "guest": account.is_guest(),
                "groups": account.group_ids(),
                "permissions": permissions,
            }),
        );
        Ok(())
    }
}
