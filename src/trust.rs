//! Trusted IP list loaded from a JSON side file

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrustError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid trust list: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Default, Deserialize)]
struct TrustFile {
    #[serde(default)]
    ips: Vec<String>,
}

/// Set of pre-authorized IP addresses
#[derive(Debug, Clone, Default)]
pub struct TrustSet {
    ips: HashSet<String>,
}

impl TrustSet {
    /// Read `{"ips": [...]}` from disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TrustError> {
        let contents = std::fs::read_to_string(path)?;
        let file: TrustFile = serde_json::from_str(&contents)?;
        Ok(TrustSet::from_iter(file.ips))
    }

    /// Read the trust list, treating a missing or malformed file as empty
    pub fn load_or_empty<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(&path) {
            Ok(set) => set,
            Err(e) => {
                log::debug!(
                    "Trust list {} unavailable, no IP is trusted: {}",
                    path.as_ref().display(),
                    e
                );
                TrustSet::default()
            }
        }
    }

    pub fn contains(&self, ip: &str) -> bool {
        self.ips.contains(ip)
    }

    pub fn len(&self) -> usize {
        self.ips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ips.is_empty()
    }
}

impl FromIterator<String> for TrustSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        TrustSet {
            ips: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_trust_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"ips": ["10.0.0.5", "203.0.113.7"]}}"#).unwrap();

        let trust = TrustSet::from_file(file.path()).unwrap();
        assert_eq!(trust.len(), 2);
        assert!(trust.contains("203.0.113.7"));
        assert!(!trust.contains("1.2.3.4"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let trust = TrustSet::load_or_empty("/nonexistent/trusted_ips.json");
        assert!(trust.is_empty());
    }

    #[test]
    fn test_malformed_file_is_empty() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        assert!(matches!(TrustSet::from_file(file.path()), Err(TrustError::Parse(_))));
        assert!(TrustSet::load_or_empty(file.path()).is_empty());
    }

    #[test]
    fn test_missing_ips_key_is_empty() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"comment": "nobody"}}"#).unwrap();

        assert!(TrustSet::from_file(file.path()).unwrap().is_empty());
    }
}
