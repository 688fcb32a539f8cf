//! Proxy checker module for probing a candidate with one TLS request

use crate::proxy::models::{Candidate, ProbeResult};
use crate::Result;
use futures::future::BoxFuture;
use serde::Deserialize;
use std::io::ErrorKind;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_native_tls::TlsConnector;

/// Default timeout for a whole probe exchange in milliseconds
const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Server name presented during the TLS handshake and in the Host header
pub const DEFAULT_SERVER_NAME: &str = "speed.cloudflare.com";

/// Path of the metadata endpoint
pub const DEFAULT_PATH: &str = "/meta";

/// Header/body boundary of an HTTP/1.x response
const HEADER_TERMINATOR: &str = "\r\n\r\n";

/// Configuration for proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Timeout covering connect, handshake, request and response
    pub timeout: Duration,
    /// TLS server name and Host header
    pub server_name: String,
    /// Request path on the upstream endpoint
    pub path: String,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            server_name: DEFAULT_SERVER_NAME.to_string(),
            path: DEFAULT_PATH.to_string(),
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_server_name(mut self, server_name: String) -> Self {
        self.server_name = server_name;
        self
    }

    pub fn with_path(mut self, path: String) -> Self {
        self.path = path;
        self
    }
}

/// Something that can validate one candidate.
///
/// The engine only talks to this trait, so the worker pool and orchestrator
/// can run against a scripted prober in tests.
pub trait Prober: Send + Sync + 'static {
    /// Validate `candidate` (a `host:port` string). Every failure resolves to
    /// `None`.
    fn probe<'a>(
        &'a self,
        candidate: &'a str,
        own_ip: &'a str,
    ) -> BoxFuture<'a, Option<ProbeResult>>;
}

/// Body of the metadata endpoint, only the fields we keep
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetaResponse {
    client_ip: Option<String>,
    country: Option<String>,
    as_organization: Option<String>,
    city: Option<String>,
    colo: Option<String>,
}

/// Proxy checker speaking raw TLS to the metadata endpoint through a candidate
#[derive(Clone)]
pub struct ProxyChecker {
    config: CheckerConfig,
    connector: TlsConnector,
}

impl ProxyChecker {
    /// Create a new proxy checker with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(CheckerConfig::default())
    }

    /// Create a new proxy checker with custom configuration.
    ///
    /// Certificate and hostname validation are disabled: the candidate's own
    /// certificate is irrelevant, only whether it relays the request.
    pub fn with_config(config: CheckerConfig) -> Result<Self> {
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()?;

        Ok(Self {
            config,
            connector: TlsConnector::from(connector),
        })
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// The fixed request written once the handshake completes
    pub fn request(&self) -> String {
        format!(
            "GET {path} HTTP/1.1\r\n\
             Host: {host}\r\n\
             User-Agent: Mozilla/5.0\r\n\
             Referer: https://{host}/\r\n\
             Connection: close\r\n\r\n",
            path = self.config.path,
            host = self.config.server_name,
        )
    }

    /// Check a single candidate
    pub async fn check_proxy(&self, candidate: &str, own_ip: &str) -> Option<ProbeResult> {
        let Some(target) = Candidate::parse(candidate) else {
            tracing::trace!(candidate, "rejected malformed candidate");
            return None;
        };

        let start = Instant::now();
        match tokio::time::timeout(self.config.timeout, self.exchange(&target)).await {
            Ok(Ok(raw)) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                let result = evaluate_response(&raw, &target, own_ip, latency_ms);
                if result.is_none() {
                    tracing::trace!(candidate, "response did not prove a working relay");
                }
                result
            }
            Ok(Err(e)) => {
                tracing::trace!(candidate, error = %e, "probe failed");
                None
            }
            Err(_) => {
                tracing::trace!(candidate, "probe timed out");
                None
            }
        }
    }

    /// Connect, handshake, send the request and read until end-of-stream.
    ///
    /// The stream is owned here; it is closed when dropped, either at the end
    /// of this function or together with the future when the timeout wins.
    async fn exchange(&self, target: &Candidate) -> Result<Vec<u8>> {
        let tcp = TcpStream::connect((target.host.as_str(), target.port)).await?;
        let mut tls = self
            .connector
            .connect(&self.config.server_name, tcp)
            .await?;

        tls.write_all(self.request().as_bytes()).await?;
        tls.flush().await?;

        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            match tls.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => raw.extend_from_slice(&buf[..n]),
                // Peers that skip close_notify still count as end-of-stream
                Err(e) if e.kind() == ErrorKind::UnexpectedEof && !raw.is_empty() => break,
                Err(e) => return Err(e.into()),
            }
        }

        drop(tls);
        Ok(raw)
    }
}

impl Prober for ProxyChecker {
    fn probe<'a>(
        &'a self,
        candidate: &'a str,
        own_ip: &'a str,
    ) -> BoxFuture<'a, Option<ProbeResult>> {
        Box::pin(self.check_proxy(candidate, own_ip))
    }
}

/// Decide whether a raw response proves a working relay.
///
/// Succeeds only when the body carries a `clientIp` that differs from
/// `own_ip`; a proxy that reports our own address is transparent.
pub fn evaluate_response(
    raw: &[u8],
    target: &Candidate,
    own_ip: &str,
    latency_ms: u64,
) -> Option<ProbeResult> {
    let text = String::from_utf8_lossy(raw);
    let meta = parse_meta(response_body(&text))?;

    let client_ip = meta.client_ip.filter(|ip| !ip.is_empty())?;
    if client_ip == own_ip {
        return None;
    }

    Some(ProbeResult {
        host: target.host.clone(),
        port: target.port,
        client_ip,
        latency_ms,
        country: meta.country,
        organization: meta.as_organization,
        city: meta.city,
        colo: meta.colo,
    })
}

/// Everything after the first blank line, or the whole payload if there is none
fn response_body(text: &str) -> &str {
    match text.find(HEADER_TERMINATOR) {
        Some(idx) => &text[idx + HEADER_TERMINATOR.len()..],
        None => text,
    }
}

/// Parse the body as JSON, falling back to the span between the first `{`
/// and the last `}` to skip chunked-encoding size lines.
///
/// The fallback is a heuristic: a body holding several unrelated JSON
/// fragments can still produce a wrong or failed parse.
fn parse_meta(body: &str) -> Option<MetaResponse> {
    if body.is_empty() {
        return None;
    }
    if let Ok(meta) = serde_json::from_str(body) {
        return Some(meta);
    }

    let first = body.find('{')?;
    let last = body.rfind('}')?;
    if last < first {
        return None;
    }
    serde_json::from_str(&body[first..=last]).ok()
}

impl std::fmt::Debug for ProxyChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyChecker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
