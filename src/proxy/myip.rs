//! Resolution of the caller's own external address

use crate::Result;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Default timeout for each lookup request in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Primary lookup service, same endpoint the probes target
const PRIMARY_URL: &str = "https://speed.cloudflare.com/meta";

/// Referer the primary service requires
const PRIMARY_REFERER: &str = "https://speed.cloudflare.com/";

/// Fallback lookup service
const FALLBACK_URL: &str = "https://api.ipify.org?format=json";

/// Address used when every lookup fails
pub const SENTINEL_IP: &str = "0.0.0.0";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrimaryResponse {
    client_ip: String,
}

#[derive(Debug, Deserialize)]
struct FallbackResponse {
    ip: String,
}

/// Best-effort resolver for the address the internet sees us as
pub struct OwnIpResolver {
    client: Client,
    primary_url: String,
    fallback_url: String,
}

impl OwnIpResolver {
    /// Create a resolver with the default lookup timeout
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            primary_url: PRIMARY_URL.to_string(),
            fallback_url: FALLBACK_URL.to_string(),
        })
    }

    pub fn with_urls(mut self, primary_url: String, fallback_url: String) -> Self {
        self.primary_url = primary_url;
        self.fallback_url = fallback_url;
        self
    }

    /// Resolve the own address, falling back to the secondary service and
    /// finally to [`SENTINEL_IP`]. Never fails.
    pub async fn resolve(&self) -> String {
        match self.lookup_primary().await {
            Ok(ip) => return ip,
            Err(e) => tracing::debug!(error = %e, "primary own-address lookup failed"),
        }

        match self.lookup_fallback().await {
            Ok(ip) => ip,
            Err(e) => {
                tracing::warn!(error = %e, "own-address lookup failed, using {}", SENTINEL_IP);
                SENTINEL_IP.to_string()
            }
        }
    }

    /// Resolve with a freshly built resolver, or return [`SENTINEL_IP`] if
    /// the HTTP client could not be built.
    pub async fn resolve_or_sentinel(resolver: Result<Self>) -> String {
        match resolver {
            Ok(resolver) => resolver.resolve().await,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "own-address lookup unavailable, using {}",
                    SENTINEL_IP
                );
                SENTINEL_IP.to_string()
            }
        }
    }

    async fn lookup_primary(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.primary_url)
            .header(reqwest::header::REFERER, PRIMARY_REFERER)
            .send()
            .await?
            .error_for_status()?;
        let body: PrimaryResponse = response.json().await?;
        Ok(body.client_ip)
    }

    async fn lookup_fallback(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.fallback_url)
            .send()
            .await?
            .error_for_status()?;
        let body: FallbackResponse = response.json().await?;
        Ok(body.ip)
    }
}
