use crate::auth::{ClientIpPolicy, RequestContext};
use crate::middleware::RequestIdExt;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::time::Instant;
use tracing::info;

/// Structured request/response logging for the `/auth` and `/health` routes.
/// Bodies are never logged; they carry passwords and tokens.
pub async fn request_response_logger(
    State(policy): State<ClientIpPolicy>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    if !(path.starts_with("/auth") || path.starts_with("/health")) {
        return next.run(req).await;
    }

    let method = req.method().to_string();
    let request_id = req.extensions().request_id();
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = RequestContext::resolve(req.headers(), peer, policy).ip_address;

    info!(
        method = %method,
        path = %path,
        ip = %ip,
        request_id = %request_id,
        "API request"
    );

    let start = Instant::now();
    let response = next.run(req).await;

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        request_id = %request_id,
        "API response"
    );

    response
}
