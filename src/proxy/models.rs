//! Proxy data models

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

/// A candidate proxy address under test
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub host: String,
    pub port: u16,
}

impl Candidate {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }

    /// Parse a `host:port` candidate string.
    ///
    /// Returns `None` when the host is empty, the port is missing, or the
    /// port is not a valid port number.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split(':');
        let host = parts.next()?.trim();
        let port = parts.next()?.trim();
        if host.is_empty() {
            return None;
        }
        let port: u16 = port.parse().ok()?;
        if port == 0 {
            return None;
        }
        Some(Self::new(host.to_string(), port))
    }

    /// Get the candidate string in HOST:PORT format
    pub fn key(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Accepted outcome of a successful probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Host of the proxy that was probed
    #[serde(rename = "proxy")]
    pub host: String,
    pub port: u16,
    /// Client address reported by the upstream endpoint
    #[serde(rename = "ip")]
    pub client_ip: String,
    /// Round-trip latency in milliseconds
    #[serde(rename = "latency")]
    pub latency_ms: u64,
    pub country: Option<String>,
    #[serde(rename = "asOrganization")]
    pub organization: Option<String>,
    pub city: Option<String>,
    pub colo: Option<String>,
}

impl ProbeResult {
    /// Deduplication key in HOST:PORT format
    pub fn key(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Uppercased country code, or `UNK` when the endpoint did not report one
    pub fn country_or_unknown(&self) -> String {
        match self.country.as_deref().map(str::trim) {
            Some(cc) if !cc.is_empty() => cc.to_uppercase(),
            _ => "UNK".to_string(),
        }
    }
}

/// Running totals of a validation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub total: usize,
    pub checked: usize,
    pub found: usize,
    /// Checked candidates per second since the run started
    pub speed: f64,
    /// Execution units that have not terminated yet
    pub running_units: usize,
}

impl RunStats {
    pub fn new(total: usize, running_units: usize) -> Self {
        Self {
            total,
            running_units,
            ..Default::default()
        }
    }

    /// Recompute throughput from the elapsed wall time
    pub fn update_speed(&mut self, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        self.speed = if secs > 0.0 {
            self.checked as f64 / secs
        } else {
            0.0
        };
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.checked)
    }

    /// Percentage of candidates checked so far
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.checked as f64 / self.total as f64 * 100.0
        }
    }

    /// Estimated time left at the current throughput; zero when nothing has
    /// been checked yet.
    pub fn eta(&self) -> Duration {
        if self.speed > 0.0 {
            Duration::from_secs_f64(self.remaining() as f64 / self.speed)
        } else {
            Duration::ZERO
        }
    }

    pub fn is_complete(&self) -> bool {
        self.running_units == 0
    }
}

/// Insertion-ordered set of verified proxies, deduplicated by HOST:PORT
#[derive(Debug, Clone, Default)]
pub struct VerifiedSet {
    seen: HashSet<String>,
    results: Vec<ProbeResult>,
}

impl VerifiedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a result; returns `false` when its key was already present.
    pub fn insert(&mut self, result: ProbeResult) -> bool {
        if !self.seen.insert(result.key()) {
            return false;
        }
        self.results.push(result);
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProbeResult> {
        self.results.iter()
    }

    pub fn as_slice(&self) -> &[ProbeResult] {
        &self.results
    }

    pub fn into_vec(self) -> Vec<ProbeResult> {
        self.results
    }
}

impl<'a> IntoIterator for &'a VerifiedSet {
    type Item = &'a ProbeResult;
    type IntoIter = std::slice::Iter<'a, ProbeResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(host: &str, port: u16) -> ProbeResult {
        ProbeResult {
            host: host.to_string(),
            port,
            client_ip: "9.9.9.9".to_string(),
            latency_ms: 120,
            country: Some("us".to_string()),
            organization: Some("Acme".to_string()),
            city: None,
            colo: Some("SJC".to_string()),
        }
    }

    #[test]
    fn test_candidate_parse() {
        let c = Candidate::parse("1.2.3.4:8080").unwrap();
        assert_eq!(c.host, "1.2.3.4");
        assert_eq!(c.port, 8080);
        assert_eq!(c.key(), "1.2.3.4:8080");
    }

    #[test]
    fn test_candidate_parse_rejects_malformed() {
        assert!(Candidate::parse("1.2.3.4").is_none());
        assert!(Candidate::parse(":8080").is_none());
        assert!(Candidate::parse("1.2.3.4:abc").is_none());
        assert!(Candidate::parse("1.2.3.4:0").is_none());
        assert!(Candidate::parse("1.2.3.4:70000").is_none());
    }

    #[test]
    fn test_probe_result_serialized_field_names() {
        let json = serde_json::to_value(sample("1.2.3.4", 443)).unwrap();
        assert_eq!(json["proxy"], "1.2.3.4");
        assert_eq!(json["port"], 443);
        assert_eq!(json["ip"], "9.9.9.9");
        assert_eq!(json["latency"], 120);
        assert_eq!(json["asOrganization"], "Acme");
        assert!(json["city"].is_null());
    }

    #[test]
    fn test_country_or_unknown() {
        let mut r = sample("1.2.3.4", 443);
        assert_eq!(r.country_or_unknown(), "US");
        r.country = None;
        assert_eq!(r.country_or_unknown(), "UNK");
        r.country = Some("  ".to_string());
        assert_eq!(r.country_or_unknown(), "UNK");
    }

    #[test]
    fn test_verified_set_dedup() {
        let mut set = VerifiedSet::new();
        assert!(set.insert(sample("1.2.3.4", 443)));
        assert!(!set.insert(sample("1.2.3.4", 443)));
        assert!(set.insert(sample("1.2.3.4", 8443)));
        assert_eq!(set.len(), 2);
        assert!(set.contains("1.2.3.4:8443"));
    }

    #[test]
    fn test_run_stats_eta() {
        let mut stats = RunStats::new(100, 4);
        assert_eq!(stats.eta(), Duration::ZERO);

        stats.checked = 50;
        stats.update_speed(Duration::from_secs(10));
        assert_eq!(stats.speed, 5.0);
        assert_eq!(stats.eta(), Duration::from_secs(10));
        assert_eq!(stats.percent(), 50.0);
        assert!(!stats.is_complete());
    }
}
