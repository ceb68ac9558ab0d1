use super::identity::IdentityResolver;
use axum::extract::{ConnectInfo, Request};
use axum::http::header;
use percent_encoding::percent_decode_str;
use std::net::SocketAddr;
use std::time::Instant;

/// Per-request facts gathered before routing.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub identity: Option<String>,
    /// Percent-decoded request path.
    pub path: String,
    pub user_agent: Option<String>,
    pub start: Instant,
}

impl RequestContext {
    pub fn new(resolver: IdentityResolver, req: &Request) -> Self {
        let remote = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let user_agent = req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Self {
            identity: resolver.resolve(req.headers(), remote),
            path: percent_decode_str(req.uri().path())
                .decode_utf8_lossy()
                .into_owned(),
            user_agent,
            start: Instant::now(),
        }
    }
}
