//! Fire-and-forget replay of captured requests to a forward target.
//!
//! The target receives the captured header set as-is. The client only fills
//! in `host` and `content-length` for the new connection; it never adds
//! `accept`, `accept-encoding` or `user-agent`.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{self, HeaderMap, Method, Request};
use http_body_util::Full;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tokio::time::timeout;
use tracing::{error, info, warn};

use super::headers::forwardable_headers;

type HttpClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// One captured request bound for a forward target.
#[derive(Debug, Clone)]
pub struct ForwardJob {
    pub webhook_id: String,
    pub target: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ForwardJob {
    /// The outbound request: same method, forwardable headers and body.
    pub fn to_request(&self) -> Result<Request<Full<Bytes>>, http::Error> {
        let mut request = Request::builder()
            .method(self.method.clone())
            .uri(self.target.as_str())
            .body(Full::new(self.body.clone()))?;
        *request.headers_mut() = forwardable_headers(&self.headers);
        Ok(request)
    }
}

/// Result of a single forward attempt. Only ever logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Target answered with a 2xx status.
    Delivered(u16),
    /// Target answered with any other status.
    Rejected(u16),
    /// No response: invalid URL, connection error or timeout.
    Failed,
}

/// Sends captured requests to their forward target, once, with a timeout.
#[derive(Clone)]
pub struct Forwarder {
    client: HttpClient,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(timeout: Duration) -> Self {
        let connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(16)
            .build(connector);

        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `forward` on its own task and return immediately.
    ///
    /// No handle is kept: the task may outlive the request that spawned it,
    /// and forwards still in flight at shutdown are dropped.
    pub fn spawn(&self, job: ForwardJob) {
        let forwarder = self.clone();
        tokio::spawn(async move {
            forwarder.forward(&job).await;
        });
    }

    /// Replay `job` to its target. Never retried.
    pub async fn forward(&self, job: &ForwardJob) -> ForwardOutcome {
        info!(
            webhook_id = %job.webhook_id,
            target = %job.target,
            method = %job.method,
            body_length = job.body.len(),
            "webhook_forward_starting"
        );

        let request = match job.to_request() {
            Ok(request) => request,
            Err(e) => {
                error!(
                    webhook_id = %job.webhook_id,
                    target = %job.target,
                    error = %e,
                    "webhook_forward_invalid_target"
                );
                return ForwardOutcome::Failed;
            }
        };

        match timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(resp)) => {
                let status = resp.status().as_u16();
                if resp.status().is_success() {
                    info!(
                        webhook_id = %job.webhook_id,
                        target = %job.target,
                        status_code = status,
                        "webhook_forwarded"
                    );
                    ForwardOutcome::Delivered(status)
                } else {
                    warn!(
                        webhook_id = %job.webhook_id,
                        target = %job.target,
                        status_code = status,
                        "webhook_forward_rejected"
                    );
                    ForwardOutcome::Rejected(status)
                }
            }
            Ok(Err(e)) => {
                error!(
                    webhook_id = %job.webhook_id,
                    target = %job.target,
                    connect = e.is_connect(),
                    error = %e,
                    "webhook_forward_failed"
                );
                ForwardOutcome::Failed
            }
            Err(_) => {
                error!(
                    webhook_id = %job.webhook_id,
                    target = %job.target,
                    timeout_seconds = self.timeout.as_secs_f64(),
                    "webhook_forward_timeout"
                );
                ForwardOutcome::Failed
            }
        }
    }
}
