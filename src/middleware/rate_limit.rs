//! Per-client token bucket rate limiting keyed by IP address.

use crate::config::LimiterConfig;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub type ClientLimiter = DefaultKeyedRateLimiter<IpAddr>;

/// How often idle client buckets are dropped.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Build the keyed limiter, or `None` when limiting is disabled or the rate is zero.
pub fn build_limiter(config: &LimiterConfig) -> Option<Arc<ClientLimiter>> {
    if !config.enabled {
        return None;
    }
    let Some(rps) = NonZeroU32::new(config.rps) else {
        tracing::warn!("LIMITER_RPS is 0, rate limiting disabled");
        return None;
    };
    let burst = NonZeroU32::new(config.burst).unwrap_or(rps);
    let quota = Quota::per_second(rps).allow_burst(burst);
    Some(Arc::new(RateLimiter::keyed(quota)))
}

/// Periodically forget clients whose buckets have refilled.
pub fn spawn_pruner(limiter: Arc<ClientLimiter>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            limiter.retain_recent();
            limiter.shrink_to_fit();
            tracing::trace!(clients = limiter.len(), "rate limiter pruned");
        }
    })
}

pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(limiter) = state.limiter() {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let ip = client_ip(request.headers(), peer);
        if limiter.check_key(&ip).is_err() {
            tracing::debug!(%ip, "rate limit exceeded");
            return Err(AppError::RateLimitExceeded);
        }
    }
    Ok(next.run(request).await)
}

/// Client address: first `X-Forwarded-For` entry, then `X-Real-IP`, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> IpAddr {
    let header_ip = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };
    header_ip("x-forwarded-for")
        .or_else(|| header_ip("x-real-ip"))
        .or(peer)
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}
