// handlers/auth.rs - login and logout short-circuits
//
// These are invoked by the pipeline directly, never through the route table.

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use super::Handler;
use crate::app::RequestContext;
use crate::error::ApiError;
use crate::http::{Message, NotificationLevel, Request, Response};
use crate::session::UID;

pub const LOGIN_EVENT: &str = "login";
pub const LOGOUT_EVENT: &str = "logout";

/// Checks `user`/`pass` and binds the account to the session on success
pub struct LoginHandler;

#[async_trait]
impl Handler for LoginHandler {
    async fn handle(
        &self,
        ctx: &mut RequestContext,
        request: &Request,
        response: &mut Response,
    ) -> Result<(), ApiError> {
        let user = request.field("user").unwrap_or_default();
        let pass = request.field("pass").unwrap_or_default();

        let outcome = ctx.authenticator.login(user, pass).await;

        match outcome.account() {
            Some(id) => {
                ctx.session.set(UID, json!(id));
                ctx.session.save().await?;

                info!("Account {} logged in", id);
                response.set(request.uri(), Message::reload().to_value());
                ctx.events.trigger(LOGIN_EVENT, &json!({ "account": id }));
            }
            None => {
                warn!("Login for '{}' rejected with code {}", user, outcome.code());
                response.set(
                    request.uri(),
                    Message::notify("Login", "Login failed due to wrong login information.", NotificationLevel::Info)
                        .to_value(),
                );
            }
        }

        Ok(())
    }
}

/// Unbinds the account from the session
pub struct LogoutHandler;

#[async_trait]
impl Handler for LogoutHandler {
    async fn handle(
        &self,
        ctx: &mut RequestContext,
        request: &Request,
        response: &mut Response,
    ) -> Result<(), ApiError> {
        let account = request.account();

        ctx.session.remove(UID);
        ctx.session.save().await?;

        info!("Account {} logged out", account);
        response.set(request.uri(), Message::reload().to_value());
        ctx.events.trigger(LOGOUT_EVENT, &json!({ "account": account }));

        Ok(())
    }
}
