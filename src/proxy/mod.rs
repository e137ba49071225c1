use crate::guard::{DenyReason, RequestGuard, Verdict};
use crate::metrics::MetricsCollector;
use async_trait::async_trait;
use bytes::Bytes;
use log::{error, info};
use pingora::http::ResponseHeader;
use pingora::prelude::*;
use pingora::upstreams::peer::HttpPeer;
use pingora_proxy::{ProxyHttp, Session};
use std::net::IpAddr;
use std::sync::Arc;

/// Proxy headers consulted for the client IP when `trust_proxy` is on,
/// in priority order.
const PROXY_IP_HEADERS: [&str; 3] = ["CF-Connecting-IP", "X-Forwarded-For", "X-Real-IP"];

pub struct GuardProxy {
    pub guard: Arc<RequestGuard>,
    pub metrics: Arc<MetricsCollector>,
    pub upstream_addr: (String, u16),
    pub trust_proxy: bool,
}

impl GuardProxy {
    pub fn new(
        upstream_addr: (String, u16),
        guard: Arc<RequestGuard>,
        metrics: Arc<MetricsCollector>,
        trust_proxy: bool,
    ) -> Self {
        Self {
            guard,
            metrics,
            upstream_addr,
            trust_proxy,
        }
    }

    /// Determine the client IP, or None when it cannot be established.
    /// Header values must parse as an address; garbage falls through to the
    /// socket peer rather than being treated as an identity.
    fn client_ip(&self, session: &Session) -> Option<String> {
        if self.trust_proxy {
            for header in PROXY_IP_HEADERS {
                let candidate = session
                    .req_header()
                    .headers
                    .get(header)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.split(',').next())
                    .map(str::trim);
                if let Some(candidate) = candidate {
                    if candidate.parse::<IpAddr>().is_ok() {
                        return Some(candidate.to_string());
                    }
                }
            }
        }

        session
            .client_addr()
            .and_then(|addr| addr.as_inet())
            .map(|inet| inet.ip().to_string())
    }

    async fn deny(&self, session: &mut Session, reason: DenyReason) -> Result<()> {
        let body = Bytes::from_static(reason.message().as_bytes());

        let mut header = ResponseHeader::build(reason.status(), Some(4))?;
        header.insert_header("Content-Type", "text/plain; charset=utf-8")?;
        header.insert_header("Content-Length", body.len().to_string())?;
        header.insert_header("X-Content-Type-Options", "nosniff")?;
        header.insert_header("X-Frame-Options", "DENY")?;

        session.write_response_header(Box::new(header), false).await?;
        session.write_response_body(Some(body), true).await?;
        Ok(())
    }
}

#[async_trait]
impl ProxyHttp for GuardProxy {
    type CTX = ();

    fn new_ctx(&self) -> Self::CTX {}

    async fn request_filter(&self, session: &mut Session, _ctx: &mut Self::CTX) -> Result<bool>
    where
        Self::CTX: Send + Sync,
    {
        let client_ip = self.client_ip(session);
        let req = session.req_header();
        let target = match req.uri.query() {
            Some(query) => format!("{}?{}", req.uri.path(), query),
            None => req.uri.path().to_string(),
        };

        match self.guard.evaluate(client_ip.as_deref(), &target) {
            Verdict::Pass => {
                self.metrics.increment_allowed_requests();
                Ok(false)
            }
            Verdict::Deny(reason) => {
                self.metrics.increment_denied_requests(reason.metric_label());
                self.deny(session, reason).await?;
                Ok(true)
            }
        }
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        let peer = Box::new(HttpPeer::new(
            (self.upstream_addr.0.as_str(), self.upstream_addr.1),
            false,
            "".to_string(),
        ));
        Ok(peer)
    }

    async fn logging(&self, session: &mut Session, e: Option<&pingora::Error>, _ctx: &mut Self::CTX) {
        let response_code = session
            .response_written()
            .map_or(0, |resp| resp.status.as_u16());

        let client_ip = self
            .client_ip(session)
            .unwrap_or_else(|| "unknown".to_string());
        let method = session.req_header().method.as_str();
        let uri = session.req_header().uri.to_string();

        if let Some(error) = e {
            error!(
                "Request failed - IP: {}, Method: {}, URI: {}, Error: {:?}",
                client_ip, method, uri, error
            );
        } else {
            info!(
                "Request completed - IP: {}, Method: {}, URI: {}, Status: {}",
                client_ip, method, uri, response_code
            );
        }
    }
}
