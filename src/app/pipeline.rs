// app/pipeline.rs - the ordered per-request pipeline
//
// db health -> csrf -> bind db -> per-request services -> auth -> settings
// -> account -> language -> batch | login | logout | module init + dispatch

use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use super::{Application, RequestContext};
use crate::auth::authenticate;
use crate::batch::{self, BATCH_PARAM};
use crate::database::{DEFAULT_LANGUAGE, SITE_NAME};
use crate::dispatch::{negotiate_language, not_found, verify_csrf, DispatchResult, Dispatcher};
use crate::error::ApiError;
use crate::handlers::{Handler, LoginHandler, LogoutHandler};
use crate::http::{Request, Response};
use crate::session::{SessionStore, CSRF};
use crate::types::is_authenticated;

/// Pipeline states in the order a request passes through them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    DbHealthChecked,
    CsrfChecked,
    Authenticated,
    LangResolved,
    Login,
    Logout,
    Batch,
    SingleDispatch,
    Finalized,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Finalized response plus the stages the request went through
#[derive(Debug)]
pub struct PipelineOutcome {
    pub response: Response,
    pub stages: Vec<Stage>,
}

impl PipelineOutcome {
    /// Last stage reached before finalization
    pub fn last_stage(&self) -> Stage {
        self.stages
            .iter()
            .rev()
            .find(|s| **s != Stage::Finalized)
            .copied()
            .unwrap_or(Stage::Init)
    }

    pub fn reached(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }
}

struct Trace {
    stages: Vec<Stage>,
}

impl Trace {
    fn new() -> Self {
        Self { stages: vec![Stage::Init] }
    }

    fn enter(&mut self, stage: Stage) {
        debug!("Pipeline stage {}", stage);
        self.stages.push(stage);
    }

    fn finish(mut self, response: Response) -> PipelineOutcome {
        self.stages.push(Stage::Finalized);
        PipelineOutcome {
            response,
            stages: self.stages,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Branch {
    Batch,
    Login,
    Logout,
    Dispatch,
}

fn choose_branch(request: &Request) -> Branch {
    if request.query(BATCH_PARAM).is_some() {
        return Branch::Batch;
    }

    match request.segment(1) {
        Some("login") if !is_authenticated(request.account()) => Branch::Login,
        Some("logout") if request.field(CSRF).is_some() => Branch::Logout,
        _ => Branch::Dispatch,
    }
}

impl Application {
    /// Run one request through the pipeline; the returned response is final
    pub async fn handle(&self, request: Request, session: Box<dyn SessionStore>) -> Response {
        self.run(request, session).await.response
    }

    pub async fn run(&self, mut request: Request, session: Box<dyn SessionStore>) -> PipelineOutcome {
        let services = self.services();
        let mut trace = Trace::new();
        let mut response = Response::new();
        response.set_language(services.config.localization.default_language.clone());

        // 1. primary database must be reachable
        let db = match services.databases.primary() {
            Some(db) => db,
            None => {
                warn!("No primary database configured, rejecting {}", request);
                response.fail(&ApiError::service_unavailable("Database unavailable"));
                return trace.finish(response);
            }
        };
        let status = db.status().await;
        if !status.is_ok() {
            warn!("Primary database '{}' is {:?}, rejecting {}", db.name(), status, request);
            response.fail(&ApiError::service_unavailable("Database unavailable"));
            return trace.finish(response);
        }
        trace.enter(Stage::DbHealthChecked);

        // 2. csrf, before anything is tied to an account
        if let Err(e) = verify_csrf(&request, session.as_ref()) {
            response.fail(&e);
            return trace.finish(response);
        }
        trace.enter(Stage::CsrfChecked);

        // 3 + 4. bind the connection and build the request's own services
        let mut ctx = services.context(session, db);

        // 5. identity
        let account_id = authenticate(ctx.session.as_mut()).await;
        request.set_account(account_id);
        response.set_account(account_id);
        trace.enter(Stage::Authenticated);

        if let Err(e) = self.prepare(&mut ctx, &request, &mut response).await {
            response.fail(&e);
            return trace.finish(response);
        }
        trace.enter(Stage::LangResolved);

        // 9. branch
        let result = match choose_branch(&request) {
            Branch::Batch => {
                trace.enter(Stage::Batch);
                self.run_batch(&mut ctx, &request, &mut response).await
            }
            Branch::Login => {
                trace.enter(Stage::Login);
                LoginHandler.handle(&mut ctx, &request, &mut response).await
            }
            Branch::Logout => {
                trace.enter(Stage::Logout);
                LogoutHandler.handle(&mut ctx, &request, &mut response).await
            }
            Branch::Dispatch => {
                trace.enter(Stage::SingleDispatch);
                self.dispatch_single(&mut ctx, &request, &mut response).await
            }
        };

        if let Err(e) = result {
            response.fail(&e);
        }

        info!(
            "{} -> {} (account {}, language {})",
            request,
            response.status(),
            ctx.account.id,
            ctx.language
        );
        trace.finish(response)
    }

    /// Steps 6 to 8: global settings, full account, response language
    async fn prepare(
        &self,
        ctx: &mut RequestContext,
        request: &Request,
        response: &mut Response,
    ) -> Result<(), ApiError> {
        let localization = &self.services().config.localization;

        let settings = ctx.settings.get(&mut ctx.cache, &[SITE_NAME, DEFAULT_LANGUAGE]).await?;
        ctx.site_name = settings.get(&SITE_NAME).cloned();
        let fallback = settings
            .get(&DEFAULT_LANGUAGE)
            .filter(|lang| !lang.is_empty())
            .cloned()
            .unwrap_or_else(|| localization.default_language.clone());

        ctx.account = ctx.accounts.get(request.account()).await?;

        let language = negotiate_language(
            request.language().as_deref(),
            &localization.supported_languages,
            &fallback,
        );
        response.set_language(language.clone());
        ctx.language = language;

        Ok(())
    }

    async fn run_batch(
        &self,
        ctx: &mut RequestContext,
        request: &Request,
        response: &mut Response,
    ) -> Result<(), ApiError> {
        let raw = request.query(BATCH_PARAM).unwrap_or_default();
        let descriptors = batch::parse_batch(raw)?;
        let services = self.services();

        let records = batch::run_batch(ctx, &services.router, &services.modules, request, &descriptors).await;
        batch::merge(response, request, records);
        Ok(())
    }

    async fn dispatch_single(
        &self,
        ctx: &mut RequestContext,
        request: &Request,
        response: &mut Response,
    ) -> Result<(), ApiError> {
        let services = self.services();
        services.modules.initialize_for(request, &mut ctx.modules);

        let target = services.router.route(request.verb(), request.path());
        if Dispatcher::dispatch(target, ctx, request, response).await? == DispatchResult::Empty {
            not_found(request, response);
        }

        Ok(())
    }
}
