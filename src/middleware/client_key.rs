//! Client identity resolution for rate limiting.
//!
//! Every request is bucketed under a key derived from its metadata:
//!
//! | Source                              | Key                 |
//! |-------------------------------------|---------------------|
//! | `Authorization: Bearer <token>`     | `user:<token[..32]>`|
//! | `X-Forwarded-For: <client>, ...`    | `ip:<client>`       |
//! | peer socket address                 | `ip:<peer ip>`      |
//!
//! Authenticated callers are limited per identity, so users sharing a NAT
//! are not throttled together. Anonymous callers fall back to network
//! identity.
//!
//! # Security Warning: Header Spoofing
//!
//! Both headers are client-controlled. A caller rotating bearer tokens or
//! `X-Forwarded-For` values gets a fresh bucket each time. The token is not
//! validated here (authentication runs later in the pipeline), and forwarding
//! headers should only be honored from a proxy tier configured in
//! `TRUSTED_PROXIES` that overwrites them:
//!
//! ```nginx
//! proxy_set_header X-Forwarded-For $remote_addr;
//! ```
//!
//! # Peer Address
//!
//! The peer address is read from Axum's [`ConnectInfo`] extension, which is
//! only present when the app is served with
//! `into_make_service_with_connect_info::<SocketAddr>()`. Without it, the
//! fallback key is `ip:unknown` and all such requests share one bucket.

use std::borrow::Cow;
use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::http::header::AUTHORIZATION;
use tracing::debug;

use super::proxy::TrustedProxies;

/// Key prefix for callers identified by bearer token.
pub const USER_KEY_PREFIX: &str = "user:";

/// Key prefix for callers identified by network address.
pub const IP_KEY_PREFIX: &str = "ip:";

/// Placeholder used when no peer address is available.
pub const UNKNOWN_PEER: &str = "unknown";

/// Maximum number of token characters kept in a `user:` key.
///
/// Bounds key size and keeps full credentials out of logs and metrics.
pub const MAX_TOKEN_KEY_CHARS: usize = 32;

const BEARER_PREFIX: &str = "Bearer ";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Where a key was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum KeySource<'a> {
    Bearer(Cow<'a, str>),
    ForwardedFor(&'a str),
    Peer(Option<IpAddr>),
}

/// Derives the rate limit key for a request.
#[derive(Debug, Clone, Default)]
pub struct ClientKeyResolver {
    trusted_proxies: TrustedProxies,
}

impl ClientKeyResolver {
    /// Resolver that honors `X-Forwarded-For` from any peer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver that honors `X-Forwarded-For` only from `trusted_proxies`.
    pub fn with_trusted_proxies(trusted_proxies: TrustedProxies) -> Self {
        Self { trusted_proxies }
    }

    /// Compute the client key. Never fails and never returns an empty string.
    pub fn resolve<B>(&self, req: &Request<B>) -> String {
        match self.classify(req) {
            KeySource::Bearer(token) => {
                let truncated: String = token.chars().take(MAX_TOKEN_KEY_CHARS).collect();
                format!("{USER_KEY_PREFIX}{truncated}")
            }
            KeySource::ForwardedFor(client) => format!("{IP_KEY_PREFIX}{client}"),
            KeySource::Peer(Some(ip)) => format!("{IP_KEY_PREFIX}{ip}"),
            KeySource::Peer(None) => format!("{IP_KEY_PREFIX}{UNKNOWN_PEER}"),
        }
    }

    fn classify<'a, B>(&self, req: &'a Request<B>) -> KeySource<'a> {
        let headers = req.headers();

        // Header values may carry obs-text, so match on raw bytes.
        if let Some(value) = headers.get(AUTHORIZATION)
            && let Some(token) = value.as_bytes().strip_prefix(BEARER_PREFIX.as_bytes())
        {
            return KeySource::Bearer(String::from_utf8_lossy(token));
        }

        let peer = peer_ip(req);

        if let Some(value) = headers.get(X_FORWARDED_FOR)
            && let Ok(value) = value.to_str()
            && let Some(first) = value.split(',').next().map(str::trim)
            && !first.is_empty()
        {
            match peer {
                Some(peer) if !self.trusted_proxies.trusts(peer) => {
                    debug!(
                        peer = %peer,
                        forwarded_for = first,
                        "Ignoring X-Forwarded-For from untrusted peer"
                    );
                }
                _ => return KeySource::ForwardedFor(first),
            }
        }

        if peer.is_none() {
            debug!("No peer address on request; is ConnectInfo configured?");
        }
        KeySource::Peer(peer)
    }
}

#[inline]
fn peer_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}
