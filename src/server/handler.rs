use super::identity::IdentityResolver;
use super::types::RequestContext;
use crate::engine::{decide, BlocklistStore, RouteDecision};
use crate::logger::{RequestAction, RequestLogEntry, RequestLogger};
use crate::site::StaticSite;
use crate::stats::StatsCollector;
use axum::body::Bytes;
use axum::extract::Request;
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const TRAP_BODY: &str = "ok";

fn respond(status: StatusCode, content_type: &str, body: Bytes) -> Response {
    (status, [(header::CONTENT_TYPE, content_type.to_string())], body).into_response()
}

/// Shared plumbing every handler needs to count and log a request.
#[derive(Clone)]
pub struct Telemetry {
    pub stats: Arc<StatsCollector>,
    pub logger: Arc<RequestLogger>,
}

impl Telemetry {
    fn finish(&self, ctx: RequestContext, action: RequestAction, response: Response) -> Response {
        self.logger.log(RequestLogEntry {
            client: ctx.identity,
            path: ctx.path,
            user_agent: ctx.user_agent,
            action,
            status: response.status().as_u16(),
            latency_ms: ctx.start.elapsed().as_millis() as u64,
        });
        response
    }
}

/// Blocks whoever requests the trap path. The answer is always `200 ok`,
/// whatever happened to the block.
pub struct TrapHandler {
    store: Arc<BlocklistStore>,
    resolver: IdentityResolver,
    telemetry: Telemetry,
}

impl TrapHandler {
    pub fn new(
        store: Arc<BlocklistStore>,
        resolver: IdentityResolver,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            store,
            resolver,
            telemetry,
        }
    }

    pub async fn handle(&self, req: Request) -> Response {
        let ctx = RequestContext::new(self.resolver, &req);
        let stats = &self.telemetry.stats;
        stats.inc_requests();
        stats.inc_trap_hits();

        match ctx.identity.clone() {
            None => {
                stats.inc_anonymous_trap_hits();
                error!(
                    "Client identity not present in trap request (user-agent={:?}).",
                    ctx.user_agent
                );
            }
            Some(identity) => {
                info!(
                    "blocking identity={} user-agent={:?}",
                    identity, ctx.user_agent
                );
                self.block(identity).await;
            }
        }

        let response = respond(
            StatusCode::OK,
            "text/plain; charset=utf-8",
            Bytes::from_static(TRAP_BODY.as_bytes()),
        );
        self.telemetry.finish(ctx, RequestAction::Trapped, response)
    }

    async fn block(&self, identity: String) {
        let stats = &self.telemetry.stats;
        let store = self.store.clone();
        let task_identity = identity.clone();

        match tokio::task::spawn_blocking(move || store.block(&task_identity)).await {
            Ok(Ok(true)) => stats.inc_new_blocks(),
            Ok(Ok(false)) => debug!("{} was already blocked", identity),
            Ok(Err(e)) => {
                stats.inc_flush_failures();
                error!(
                    "Blocked {} in memory but failed to persist it: {} ({:?})",
                    identity,
                    e,
                    std::error::Error::source(&e)
                );
            }
            Err(e) => error!("Blocklist write task for {} failed: {}", identity, e),
        }
    }
}

/// Serves the precomputed robots.txt to everyone, blocked or not.
pub struct RobotsHandler {
    body: Bytes,
    resolver: IdentityResolver,
    telemetry: Telemetry,
}

impl RobotsHandler {
    pub fn new(body: impl Into<Bytes>, resolver: IdentityResolver, telemetry: Telemetry) -> Self {
        Self {
            body: body.into(),
            resolver,
            telemetry,
        }
    }

    pub async fn handle(&self, req: Request) -> Response {
        let ctx = RequestContext::new(self.resolver, &req);
        self.telemetry.stats.inc_requests();
        self.telemetry.stats.inc_robots();

        let response = respond(
            StatusCode::OK,
            "text/plain; charset=utf-8",
            self.body.clone(),
        );
        self.telemetry.finish(ctx, RequestAction::Robots, response)
    }
}

/// Routes every other request to real content, the decoy, or the 404 page.
pub struct ContentRouter {
    store: Arc<BlocklistStore>,
    site: StaticSite,
    resolver: IdentityResolver,
    decoy: Bytes,
    not_found: Bytes,
    telemetry: Telemetry,
}

impl ContentRouter {
    pub fn new(
        store: Arc<BlocklistStore>,
        site: StaticSite,
        resolver: IdentityResolver,
        decoy: impl Into<Bytes>,
        not_found: impl Into<Bytes>,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            store,
            site,
            resolver,
            decoy: decoy.into(),
            not_found: not_found.into(),
            telemetry,
        }
    }

    pub async fn handle(&self, req: Request) -> Response {
        let ctx = RequestContext::new(self.resolver, &req);
        let stats = &self.telemetry.stats;
        stats.inc_requests();

        let readable = matches!(*req.method(), Method::GET | Method::HEAD);
        let decision = decide(
            self.store.as_ref(),
            &self.site,
            ctx.identity.as_deref(),
            &ctx.path,
        );

        let (action, response) = match decision {
            RouteDecision::Decoy => {
                stats.inc_decoys();
                (RequestAction::Decoy, self.decoy_response())
            }
            RouteDecision::Serve(file) if readable => match tokio::fs::read(&file.path).await {
                Ok(body) => {
                    stats.inc_served();
                    let response = respond(StatusCode::OK, &file.content_type, Bytes::from(body));
                    (RequestAction::Served, response)
                }
                Err(e) => {
                    warn!("Failed to read {}: {}", file.path.display(), e);
                    stats.inc_not_found();
                    (RequestAction::NotFound, self.not_found_response())
                }
            },
            RouteDecision::Serve(_) | RouteDecision::NotFound => {
                stats.inc_not_found();
                (RequestAction::NotFound, self.not_found_response())
            }
        };

        self.telemetry.finish(ctx, action, response)
    }

    fn decoy_response(&self) -> Response {
        respond(StatusCode::OK, "text/html; charset=utf-8", self.decoy.clone())
    }

    fn not_found_response(&self) -> Response {
        respond(
            StatusCode::NOT_FOUND,
            "text/html; charset=utf-8",
            self.not_found.clone(),
        )
    }
}
