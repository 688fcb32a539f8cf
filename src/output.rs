//! Persisting verified proxies as JSON, flat lists and per-country files

use crate::proxy::models::ProbeResult;
use crate::Result;
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Characters removed from organization names
static ORG_STRIP_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\s]").expect("Invalid org strip regex"));

/// Runs of whitespace collapsed to one space
static WHITESPACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

/// Where the result files go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub json: PathBuf,
    pub txt: PathBuf,
    pub csv: PathBuf,
    /// Directory receiving one `<COUNTRY>.txt` per country
    pub country_dir: PathBuf,
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            json: PathBuf::from("proxyip.json"),
            txt: PathBuf::from("proxyip.txt"),
            csv: PathBuf::from("proxyip.csv"),
            country_dir: PathBuf::from("active_proxies"),
        }
    }
}

impl OutputPaths {
    /// Default file names placed under `dir`
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        let defaults = Self::default();
        Self {
            json: dir.join(defaults.json),
            txt: dir.join(defaults.txt),
            csv: dir.join(defaults.csv),
            country_dir: dir.join(defaults.country_dir),
        }
    }
}

/// What [`write_all`] produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub records: usize,
    pub country_files: usize,
}

/// Strip an organization name down to ASCII alphanumerics and single spaces
pub fn sanitize_org(org: Option<&str>) -> String {
    let org = org.unwrap_or("Unknown");
    let stripped = ORG_STRIP_REGEX.replace_all(org, "");
    WHITESPACE_REGEX
        .replace_all(&stripped, " ")
        .trim()
        .to_string()
}

/// `host,port,country,organization` line for one result
pub fn flat_line(result: &ProbeResult) -> String {
    let country = result
        .country
        .as_deref()
        .filter(|cc| !cc.is_empty())
        .unwrap_or("UNK");
    format!(
        "{},{},{},{}",
        result.host,
        result.port,
        country,
        sanitize_org(result.organization.as_deref())
    )
}

fn flat_content<'a>(results: impl IntoIterator<Item = &'a ProbeResult>) -> String {
    results
        .into_iter()
        .map(flat_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Group results by uppercased country code, `UNK` when absent
pub fn group_by_country(results: &[ProbeResult]) -> BTreeMap<String, Vec<&ProbeResult>> {
    let mut groups: BTreeMap<String, Vec<&ProbeResult>> = BTreeMap::new();
    for result in results {
        groups
            .entry(result.country_or_unknown())
            .or_default()
            .push(result);
    }
    groups
}

/// Write every output format for `results`
pub fn write_all(results: &[ProbeResult], paths: &OutputPaths) -> Result<WriteSummary> {
    let json = serde_json::to_string_pretty(results)?;
    fs::write(&paths.json, json)
        .with_context(|| format!("failed to write {}", paths.json.display()))?;

    let flat = flat_content(results);
    for path in [&paths.txt, &paths.csv] {
        fs::write(path, &flat).with_context(|| format!("failed to write {}", path.display()))?;
    }

    fs::create_dir_all(&paths.country_dir)
        .with_context(|| format!("failed to create {}", paths.country_dir.display()))?;

    let groups = group_by_country(results);
    for (country, members) in &groups {
        let path = paths.country_dir.join(format!("{}.txt", country));
        fs::write(&path, flat_content(members.iter().copied()))
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(WriteSummary {
        records: results.len(),
        country_files: groups.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(host: &str, country: Option<&str>, org: Option<&str>) -> ProbeResult {
        ProbeResult {
            host: host.to_string(),
            port: 443,
            client_ip: "9.9.9.9".to_string(),
            latency_ms: 10,
            country: country.map(String::from),
            organization: org.map(String::from),
            city: None,
            colo: None,
        }
    }

    #[test]
    fn test_sanitize_org() {
        assert_eq!(sanitize_org(Some("Acme, Inc.")), "Acme Inc");
        assert_eq!(sanitize_org(Some("  Foo   -  Bar\tLLC ")), "Foo Bar LLC");
        assert_eq!(sanitize_org(Some("Ünïcode Ltd")), "ncode Ltd");
        assert_eq!(sanitize_org(None), "Unknown");
    }

    #[test]
    fn test_flat_line() {
        let r = result("1.2.3.4", Some("US"), Some("Acme, Inc."));
        assert_eq!(flat_line(&r), "1.2.3.4,443,US,Acme Inc");

        let r = result("5.6.7.8", None, None);
        assert_eq!(flat_line(&r), "5.6.7.8,443,UNK,Unknown");
    }

    #[test]
    fn test_group_by_country() {
        let results = vec![
            result("1.1.1.1", Some("us"), None),
            result("2.2.2.2", Some("US"), None),
            result("3.3.3.3", None, None),
        ];
        let groups = group_by_country(&results);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["US"].len(), 2);
        assert_eq!(groups["UNK"][0].host, "3.3.3.3");
    }
}
