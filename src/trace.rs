//! Request trace identifiers.
//!
//! Every HTTP response and every `ProcessingContext` carries a `traceId` of
//! the form `tr-YYYYMMDD-HHMMSS-<6 base36>` (spec §6), generated by a single
//! constructor so the HTTP layer and the orchestrator never disagree on
//! format.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::fmt;

const BASE36_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraceId(String);

impl TraceId {
    /// Generate a new trace id stamped with the given time (pass `Utc::now()`
    /// in production call sites; tests pass a fixed time for determinism).
    pub fn generate_at(now: DateTime<Utc>) -> Self {
        let mut rng = rand::rng();
        let suffix: String = (0..6)
            .map(|_| {
                let idx = rng.random_range(0..BASE36_ALPHABET.len());
                BASE36_ALPHABET[idx] as char
            })
            .collect();
        TraceId(format!("tr-{}-{}", now.format("%Y%m%d-%H%M%S"), suffix))
    }

    pub fn new() -> Self {
        Self::generate_at(Utc::now())
    }

    /// Parse an externally-supplied trace id (e.g. echoed from a client
    /// header) without validating its internal structure beyond non-empty.
    pub fn from_header(value: &str) -> Option<Self> {
        if value.is_empty() {
            None
        } else {
            Some(TraceId(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_matches_spec() {
        let t = Utc.with_ymd_and_hms(2026, 7, 27, 10, 5, 3).unwrap();
        let id = TraceId::generate_at(t);
        let s = id.to_string();
        assert!(s.starts_with("tr-20260727-100503-"));
        assert_eq!(s.len(), "tr-20260727-100503-".len() + 6);
    }

    #[test]
    fn from_header_rejects_empty() {
        assert!(TraceId::from_header("").is_none());
        assert!(TraceId::from_header("tr-x").is_some());
    }
}
