//! SSH authentication log parsing
//!
//! Lines come from `journalctl ... | grep sshd`. Classification is by
//! substring: a failed or rejected attempt is an attack, an accepted
//! password/publickey login is a success, anything else is dropped. Fields
//! are extracted independently and fall back to [`UNKNOWN`].

use regex::Regex;

use crate::models::{AuthEvent, AuthKind, AuthMethod, UNKNOWN};

const SERVICE: &str = "SSH";

/// Turns sshd log lines into [`AuthEvent`]s
#[derive(Debug, Clone)]
pub struct AuthLogParser {
    source_ip: Regex,
    invalid_user: Regex,
    for_user: Regex,
    timestamp: Regex,
}

impl AuthLogParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(AuthLogParser {
            source_ip: Regex::new(r"from (\d+\.\d+\.\d+\.\d+)")?,
            invalid_user: Regex::new(r"user (\w+)")?,
            for_user: Regex::new(r"for (\w+)")?,
            timestamp: Regex::new(r"(\w{3} \d{1,2} \d{2}:\d{2}:\d{2})")?,
        })
    }

    /// Parse every line of `text`, skipping the ones that are not auth events
    pub fn parse<'a>(&'a self, text: &'a str) -> impl Iterator<Item = AuthEvent> + 'a {
        text.lines().filter_map(move |line| self.parse_line(line))
    }

    /// Parse a single line
    ///
    /// Returns `None` when the line matches neither predicate or carries no
    /// source address.
    pub fn parse_line(&self, line: &str) -> Option<AuthEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let kind = classify(line)?;
        let ip = capture(&self.source_ip, line)?;

        let (user, auth_method) = match kind {
            AuthKind::Attack => {
                let user = capture(&self.invalid_user, line).or_else(|| capture(&self.for_user, line));
                (user, None)
            }
            AuthKind::Success => {
                let method = if line.contains("publickey") {
                    AuthMethod::Publickey
                } else {
                    AuthMethod::Password
                };
                (capture(&self.for_user, line), Some(method))
            }
        };

        Some(AuthEvent {
            kind,
            ip,
            user: user.unwrap_or_else(|| UNKNOWN.to_string()),
            timestamp: capture(&self.timestamp, line).unwrap_or_else(|| UNKNOWN.to_string()),
            auth_method,
            service: SERVICE.to_string(),
            raw: line.to_string(),
        })
    }
}

/// Attack predicates are checked first, so the two kinds never overlap
fn classify(line: &str) -> Option<AuthKind> {
    if line.contains("Failed password") || line.contains("Invalid user") {
        Some(AuthKind::Attack)
    } else if line.contains("Accepted") && (line.contains("password") || line.contains("publickey")) {
        Some(AuthKind::Success)
    } else {
        None
    }
}

pub(crate) fn capture(pattern: &Regex, line: &str) -> Option<String> {
    pattern
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
