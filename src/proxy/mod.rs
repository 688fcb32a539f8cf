//! Proxy module for loading and probing candidates
//!
//! This module provides functionality for:
//! - Parsing candidate lists from plain-text and JSON files
//! - Probing a candidate with a single TLS request to the metadata endpoint
//! - Resolving the caller's own external address

pub mod checker;
pub mod models;
pub mod myip;
pub mod parser;

pub use checker::{CheckerConfig, Prober, ProxyChecker};
pub use models::{Candidate, ProbeResult, RunStats, VerifiedSet};
pub use myip::{OwnIpResolver, SENTINEL_IP};
pub use parser::ProxyParser;
