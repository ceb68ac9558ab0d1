use axum::http::HeaderMap;
use std::net::SocketAddr;

/// How a client is identified. Picked once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityResolver {
    /// The transport-level peer address.
    Direct,
    /// The first entry of `X-Forwarded-For`, set by a trusted reverse proxy.
    Forwarded,
}

impl IdentityResolver {
    pub fn new(behind_proxy: bool) -> Self {
        if behind_proxy {
            IdentityResolver::Forwarded
        } else {
            IdentityResolver::Direct
        }
    }

    pub fn resolve(&self, headers: &HeaderMap, remote: Option<SocketAddr>) -> Option<String> {
        match self {
            IdentityResolver::Direct => remote.map(|addr| addr.ip().to_string()),
            IdentityResolver::Forwarded => forwarded_for(headers),
        }
    }
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("x-forwarded-for")?.to_str().ok()?;
    let first = value.split(',').next()?.trim();
    if first.is_empty() {
        return None;
    }
    Some(first.to_string())
}
