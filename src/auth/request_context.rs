use axum::{
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

/// Recorded when no source address can be determined
pub const UNKNOWN_IP: &str = "unknown";

const MAX_USER_AGENT_LEN: usize = 500;

/// Whether `X-Forwarded-For`, `X-Real-IP` and `Forwarded` may name the client.
/// Off unless the service sits behind a proxy that overwrites them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientIpPolicy {
    pub trust_proxy_headers: bool,
}

/// Client details recorded with login attempts and token issuance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub ip_address: String,
    pub user_agent: String,
}

impl RequestContext {
    /// Resolve from proxy headers when trusted, otherwise from the socket peer address
    pub fn resolve(headers: &HeaderMap, peer: Option<SocketAddr>, policy: ClientIpPolicy) -> Self {
        let forwarded = if policy.trust_proxy_headers {
            extract_client_ip(headers)
        } else {
            None
        };
        let ip_address = forwarded
            .or_else(|| peer.map(|addr| addr.ip().to_string()))
            .unwrap_or_else(|| UNKNOWN_IP.to_string());

        Self {
            ip_address,
            user_agent: extract_user_agent(headers),
        }
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    ClientIpPolicy: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(Self::resolve(
            &parts.headers,
            peer,
            ClientIpPolicy::from_ref(state),
        ))
    }
}

/// Client IP from proxy headers, in priority order:
/// `X-Forwarded-For` (leftmost entry), `X-Real-IP`, then RFC 7239 `Forwarded`.
fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let header = |name: &str| headers.get(name).and_then(|h| h.to_str().ok());

    if let Some(first) = header("x-forwarded-for").and_then(|v| v.split(',').next()) {
        if let Some(ip) = parse_client_ip(first.trim()) {
            return Some(ip);
        }
    }

    if let Some(ip) = header("x-real-ip").and_then(|v| parse_client_ip(v.trim())) {
        return Some(ip);
    }

    header("forwarded").and_then(extract_rfc7239_ip)
}

/// `for=` parameter of a `Forwarded` header, e.g. `for="[2001:db8::1]:8080";proto=https`
fn extract_rfc7239_ip(forwarded: &str) -> Option<String> {
    // Only the first hop matters
    let first_hop = forwarded.split(',').next()?;

    first_hop
        .split(';')
        .filter_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            key.eq_ignore_ascii_case("for").then_some(value)
        })
        .find_map(|value| {
            let value = value.trim_matches('"');
            let host = if let Some(rest) = value.strip_prefix('[') {
                rest.split(']').next().unwrap_or(rest)
            } else if value.matches(':').count() == 1 {
                // IPv4 with port
                value.split(':').next().unwrap_or(value)
            } else {
                value
            };
            parse_client_ip(host)
        })
}

fn parse_client_ip(candidate: &str) -> Option<String> {
    match candidate.parse::<IpAddr>() {
        Ok(ip) if !ip.is_unspecified() => Some(ip.to_string()),
        _ => None,
    }
}

/// User agent, cut to the column width of the attempt ledger
fn extract_user_agent(headers: &HeaderMap) -> String {
    let Some(ua) = headers.get("user-agent").and_then(|h| h.to_str().ok()) else {
        return String::new();
    };

    if ua.len() > MAX_USER_AGENT_LEN {
        let mut end = MAX_USER_AGENT_LEN - 3;
        while !ua.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &ua[..end])
    } else {
        ua.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, value.parse().unwrap());
        }
        map
    }

    #[test]
    fn test_x_forwarded_for_takes_first_entry() {
        let h = headers(&[("x-forwarded-for", "203.0.113.195, 70.41.3.18, 150.172.238.178")]);
        assert_eq!(extract_client_ip(&h), Some("203.0.113.195".to_string()));
    }

    #[test]
    fn test_header_priority() {
        let h = headers(&[
            ("x-forwarded-for", "203.0.113.195"),
            ("x-real-ip", "198.51.100.17"),
            ("forwarded", "for=192.0.2.60"),
        ]);
        assert_eq!(extract_client_ip(&h), Some("203.0.113.195".to_string()));

        let h = headers(&[("x-real-ip", "198.51.100.17"), ("forwarded", "for=192.0.2.60")]);
        assert_eq!(extract_client_ip(&h), Some("198.51.100.17".to_string()));
    }

    #[test]
    fn test_invalid_forwarded_for_falls_through() {
        let h = headers(&[("x-forwarded-for", "not-an-ip"), ("x-real-ip", "198.51.100.17")]);
        assert_eq!(extract_client_ip(&h), Some("198.51.100.17".to_string()));
    }

    #[test]
    fn test_rfc7239_forms() {
        assert_eq!(
            extract_rfc7239_ip("for=203.0.113.195;proto=https;by=198.51.100.17"),
            Some("203.0.113.195".to_string())
        );
        assert_eq!(
            extract_rfc7239_ip("for=\"203.0.113.195:8080\""),
            Some("203.0.113.195".to_string())
        );
        assert_eq!(
            extract_rfc7239_ip("For=\"[2001:db8::1]:8080\";proto=https"),
            Some("2001:db8::1".to_string())
        );
        assert_eq!(
            extract_rfc7239_ip("for=192.0.2.43, for=198.51.100.17"),
            Some("192.0.2.43".to_string())
        );
        assert_eq!(extract_rfc7239_ip("proto=https;by=198.51.100.17"), None);
        assert_eq!(extract_rfc7239_ip("for=unknown"), None);
    }

    #[test]
    fn test_unspecified_address_ignored() {
        let h = headers(&[("x-real-ip", "0.0.0.0")]);
        assert_eq!(extract_client_ip(&h), None);
    }

    const TRUSTED: ClientIpPolicy = ClientIpPolicy {
        trust_proxy_headers: true,
    };

    #[test]
    fn test_resolve_falls_back_to_peer_then_unknown() {
        let peer: SocketAddr = "10.1.2.3:54321".parse().unwrap();
        let ctx = RequestContext::resolve(&HeaderMap::new(), Some(peer), TRUSTED);
        assert_eq!(ctx.ip_address, "10.1.2.3");
        assert_eq!(ctx.user_agent, "");

        let ctx = RequestContext::resolve(&HeaderMap::new(), None, TRUSTED);
        assert_eq!(ctx.ip_address, UNKNOWN_IP);
    }

    #[test]
    fn test_proxy_headers_ignored_unless_trusted() {
        let peer: SocketAddr = "10.1.2.3:54321".parse().unwrap();
        let h = headers(&[
            ("x-forwarded-for", "203.0.113.195"),
            ("x-real-ip", "198.51.100.17"),
            ("forwarded", "for=192.0.2.60"),
        ]);

        let ctx = RequestContext::resolve(&h, Some(peer), ClientIpPolicy::default());
        assert_eq!(ctx.ip_address, "10.1.2.3");
        let ctx = RequestContext::resolve(&h, None, ClientIpPolicy::default());
        assert_eq!(ctx.ip_address, UNKNOWN_IP);

        let ctx = RequestContext::resolve(&h, Some(peer), TRUSTED);
        assert_eq!(ctx.ip_address, "203.0.113.195");
    }

    #[test]
    fn test_user_agent_truncated() {
        let long_ua = "a".repeat(600);
        let h = headers(&[("user-agent", long_ua.as_str())]);
        let ua = extract_user_agent(&h);
        assert_eq!(ua.len(), MAX_USER_AGENT_LEN);
        assert!(ua.ends_with("..."));

        let h = headers(&[("user-agent", "curl/8.5.0")]);
        assert_eq!(extract_user_agent(&h), "curl/8.5.0");
    }

    #[tokio::test]
    async fn test_extractor_uses_connect_info() {
        let mut request = Request::builder()
            .uri("/auth/login")
            .header("user-agent", "test-agent")
            .header("x-forwarded-for", "203.0.113.195")
            .body(())
            .unwrap();
        let peer: SocketAddr = "192.0.2.10:4000".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));

        let (mut parts, _) = request.into_parts();
        let ctx = RequestContext::from_request_parts(&mut parts, &ClientIpPolicy::default())
            .await
            .unwrap();
        assert_eq!(ctx.ip_address, "192.0.2.10");
        assert_eq!(ctx.user_agent, "test-agent");

        let ctx = RequestContext::from_request_parts(&mut parts, &TRUSTED)
            .await
            .unwrap();
        assert_eq!(ctx.ip_address, "203.0.113.195");
    }
}
