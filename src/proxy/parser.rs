//! Candidate list parser for plain-text and JSON proxy lists

use crate::error::LoadError;
use crate::proxy::models::Candidate;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Parser turning candidate files into unique `host:port` strings
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single text line
    ///
    /// Supports formats:
    /// - HOST:PORT
    /// - HOST,PORT
    ///
    /// Extra fields after the port are ignored.
    pub fn parse_line(line: &str) -> Option<Candidate> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        Candidate::parse(&line.replace(',', ":"))
    }

    /// Parse a text list, one candidate per line, deduplicated in first-seen order
    pub fn parse_string(content: &str) -> Vec<String> {
        dedup(content.lines().filter_map(Self::parse_line))
    }

    /// Parse a JSON array of `{ "proxy": ..., "port": ... }` objects.
    ///
    /// Elements that are not objects are skipped like malformed text lines.
    pub fn parse_json(content: &str) -> Result<Vec<String>, serde_json::Error> {
        let entries: Vec<Value> = serde_json::from_str(content)?;
        Ok(dedup(entries.iter().filter_map(|entry| {
            let entry = entry.as_object()?;
            let host = scalar_to_string(entry.get("proxy")?)?;
            let port = scalar_to_string(entry.get("port")?)?;
            Self::parse_line(&format!("{}:{}", host, port))
        })))
    }

    /// Parse candidates from content, detecting the format from the first
    /// non-blank character
    pub fn parse_content(content: &str) -> Result<Vec<String>, serde_json::Error> {
        if content.trim_start().starts_with('[') {
            Self::parse_json(content)
        } else {
            Ok(Self::parse_string(content))
        }
    }

    /// Load candidates from a file
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Vec<String>, LoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse_content(&content).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn dedup(candidates: impl Iterator<Item = Candidate>) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .map(|c| c.key())
        .filter(|key| seen.insert(key.clone()))
        .collect()
}
