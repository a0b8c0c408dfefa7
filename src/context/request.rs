//! Request boundary
//!
//! Binds actor, correlation id and client address at the start of a
//! request and releases them when the request ends, whether it completes,
//! fails or panics. The host's web stack adapts its request type into a
//! [`RequestInfo`].

use std::future::Future;
use std::net::SocketAddr;

use super::cid::CidResolver;
use super::{scope, set_actor, set_cid, set_remote_addr, ContextGuard};
use crate::models::{Actor, RemoteAddr};

/// The parts of an inbound request the boundary looks at
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    headers: Vec<(String, String)>,
    peer_addr: Option<SocketAddr>,
    actor: Option<Actor>,
}

impl RequestInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn peer(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    /// Authenticated actor, if any
    pub fn actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Case-insensitive header lookup
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Client address: the first `X-Forwarded-For` hop when a proxy set
    /// one, otherwise the socket peer
    pub fn remote_addr(&self) -> Option<RemoteAddr> {
        match self.get_header("X-Forwarded-For") {
            Some(forwarded) if !forwarded.trim().is_empty() => forwarded
                .split(',')
                .next()
                .and_then(RemoteAddr::parse),
            _ => self.peer_addr.map(RemoteAddr::from),
        }
    }
}

/// Ambient values bound for the duration of one request
///
/// Guards end in reverse order of creation because fields drop in
/// declaration order.
#[must_use = "the request context ends as soon as the scope is dropped"]
#[derive(Debug)]
pub struct RequestScope {
    _remote: ContextGuard,
    _cid: ContextGuard,
    _actor: ContextGuard,
}

#[derive(Debug, Clone)]
struct Resolved {
    actor: Option<Actor>,
    cid: Option<String>,
    remote: Option<RemoteAddr>,
}

impl Resolved {
    fn enter(self) -> RequestScope {
        let actor = set_actor(self.actor);
        let cid = set_cid(self.cid);
        let remote = set_remote_addr(self.remote);
        RequestScope {
            _remote: remote,
            _cid: cid,
            _actor: actor,
        }
    }
}

/// Opens request scopes
#[derive(Debug, Clone, Default)]
pub struct RequestBoundary {
    cid: CidResolver,
}

impl RequestBoundary {
    pub fn new(cid: CidResolver) -> Self {
        Self { cid }
    }

    fn resolve(&self, request: &RequestInfo) -> Resolved {
        Resolved {
            actor: request.actor.clone(),
            cid: self.cid.for_request(|name| request.get_header(name)),
            remote: request.remote_addr(),
        }
    }

    /// Bind the request's context on the current execution unit
    pub fn begin(&self, request: &RequestInfo) -> RequestScope {
        let resolved = self.resolve(request);
        tracing::debug!(
            actor = ?resolved.actor.as_ref().map(|a| &a.id),
            cid = ?resolved.cid,
            "request context bound"
        );
        resolved.enter()
    }

    /// Run a request handler in its own task-local context
    pub fn run<F: Future>(&self, request: &RequestInfo, handler: F) -> impl Future<Output = F::Output> {
        let resolved = self.resolve(request);
        scope(async move {
            let _scope = resolved.enter();
            handler.await
        })
    }
}
