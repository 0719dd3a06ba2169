//! Dangerous-operation deny-list — spec §4.8, §9.
//!
//! Substring-based, case-insensitive matching against a configured pattern
//! set. Per spec §9's design note this is documented as a best-effort
//! inspection layer, not a SQL firewall: rejection is intentionally
//! conservative, false positives are preferred over false negatives.

#[derive(Debug, Clone)]
pub struct DenyList {
    patterns: Vec<String>,
}

impl DenyList {
    pub fn new(patterns: Vec<String>) -> Self {
        DenyList {
            patterns: patterns.into_iter().map(|p| p.to_ascii_uppercase()).collect(),
        }
    }

    /// Returns the pattern that matched, if any. Whitespace is normalized to
    /// single spaces before comparison so trivial whitespace obfuscation
    /// (e.g. `DROP   DATABASE`) is still caught; comment-obfuscated payloads
    /// (`DROP/**/DATABASE`) are not, and are a known limitation of
    /// substring matching (spec §9).
    pub fn check(&self, sql: &str) -> Option<&str> {
        let normalized = sql
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        self.patterns
            .iter()
            .find(|p| normalized.contains(p.as_str()))
            .map(|p| p.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_deny_list() -> DenyList {
        DenyList::new(
            [
                "DROP DATABASE",
                "DROP SCHEMA",
                "TRUNCATE TABLE",
                "DELETE FROM",
                "ALTER SYSTEM",
                "CREATE ROLE",
                "DROP ROLE",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        )
    }

    #[test]
    fn blocks_drop_database_case_insensitively() {
        let deny = default_deny_list();
        assert_eq!(deny.check("drop database prod;"), Some("DROP DATABASE"));
    }

    #[test]
    fn allows_ordinary_select() {
        let deny = default_deny_list();
        assert!(deny.check("SELECT * FROM files WHERE family_id = $1").is_none());
    }

    #[test]
    fn catches_whitespace_variants() {
        let deny = default_deny_list();
        assert!(deny.check("DROP    DATABASE   prod").is_some());
        assert!(deny.check("DROP\tDATABASE\nprod").is_some());
    }
}
