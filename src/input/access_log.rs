//! OpenProject container log parsing
//!
//! Rails request lines look like
//! `I, [2024-05-01T10:00:00.123 #7]  INFO -- : method=GET path=/ status=200 duration=12.5 user=4 host=...`.
//! Only `status` and `method` are mandatory; every other field has a
//! placeholder.

use regex::Regex;

use super::auth_log::capture;
use crate::models::{AccessEvent, ANONYMOUS, UNKNOWN};

const SERVICE: &str = "OpenProject";

/// Lowest user id that belongs to a real account (1 = System, 2 = Anonymous)
pub const FIRST_REAL_USER_ID: u32 = 3;

/// A `Failed login for 'name' from IP at ts` line
#[derive(Debug, Clone, PartialEq)]
pub struct FailedLoginLine {
    pub username: String,
    pub ip: String,
    pub timestamp: String,
}

/// A request line attributed to a real user id
#[derive(Debug, Clone, PartialEq)]
pub struct UserActivityLine {
    pub user_id: u32,
    pub ip: Option<String>,
    pub timestamp: String,
}

/// Turns OpenProject log lines into typed records
#[derive(Debug, Clone)]
pub struct AccessLogParser {
    duration: Regex,
    status: Regex,
    method: Regex,
    path: Regex,
    host: Regex,
    user: Regex,
    request_time: Regex,
    activity_time: Regex,
    failed_user: Regex,
    source_ip: Regex,
    failed_at: Regex,
    dotted_quad: Regex,
}

impl AccessLogParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(AccessLogParser {
            duration: Regex::new(r"duration=([0-9.]+)")?,
            status: Regex::new(r"status=(\d+)")?,
            method: Regex::new(r"method=(\w+)")?,
            path: Regex::new(r"path=(\S+)")?,
            host: Regex::new(r"host=(\S+)")?,
            user: Regex::new(r"user=(\d+)")?,
            request_time: Regex::new(r"\[([0-9-T:.]+) #")?,
            activity_time: Regex::new(r"\[([0-9-T:.]+)")?,
            failed_user: Regex::new(r"Failed login for '([^']+)'")?,
            source_ip: Regex::new(r"from (\d+\.\d+\.\d+\.\d+)")?,
            failed_at: Regex::new(r"at ([0-9-]+ [0-9:]+)")?,
            dotted_quad: Regex::new(r"^\d+\.\d+\.\d+\.\d+$")?,
        })
    }

    /// Parse every request line of `text`
    pub fn parse<'a>(&'a self, text: &'a str) -> impl Iterator<Item = AccessEvent> + 'a {
        text.lines().filter_map(move |line| self.parse_line(line))
    }

    /// Parse one request line
    ///
    /// The cheap textual pre-filter requires `INFO --`, `duration=`,
    /// `status=` and `method=`; the line is then dropped unless both status
    /// and method actually extract.
    pub fn parse_line(&self, line: &str) -> Option<AccessEvent> {
        let line = line.trim();
        if line.is_empty()
            || !line.contains("INFO --")
            || !line.contains("duration=")
            || !line.contains("status=")
            || !line.contains("method=")
        {
            return None;
        }

        let status_code = capture(&self.status, line)?.parse::<u16>().ok()?;
        let method = capture(&self.method, line)?;

        let duration_ms = capture(&self.duration, line)
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);
        let host = capture(&self.host, line).unwrap_or_else(|| UNKNOWN.to_string());

        Some(AccessEvent {
            ip: self.ip_from_host(&host),
            host,
            user_id: capture(&self.user, line).unwrap_or_else(|| ANONYMOUS.to_string()),
            method,
            path: capture(&self.path, line).unwrap_or_else(|| UNKNOWN.to_string()),
            status_code,
            duration_ms,
            timestamp: capture(&self.request_time, line).unwrap_or_else(|| UNKNOWN.to_string()),
            service: SERVICE.to_string(),
            raw: line.to_string(),
        })
    }

    /// Derive a client address from the `host=` field
    ///
    /// A dotted quad (with or without port) is used as is; other hostnames
    /// are kept verbatim; `localhost` and a missing host become `unknown`.
    pub fn ip_from_host(&self, host: &str) -> String {
        if host == UNKNOWN || host == "localhost" {
            return UNKNOWN.to_string();
        }
        let bare = strip_port(host);
        if bare == "localhost" {
            return UNKNOWN.to_string();
        }
        if self.dotted_quad.is_match(bare) {
            bare.to_string()
        } else {
            host.to_string()
        }
    }

    /// Parse a failed login line; both username and source address are required
    pub fn parse_failed_login(&self, line: &str) -> Option<FailedLoginLine> {
        if !line.contains("Failed login") {
            return None;
        }
        let username = capture(&self.failed_user, line)?;
        let ip = capture(&self.source_ip, line)?;
        Some(FailedLoginLine {
            username,
            ip,
            timestamp: capture(&self.failed_at, line).unwrap_or_else(|| UNKNOWN.to_string()),
        })
    }

    /// Parse any line carrying `user=<id>` for a real account
    pub fn parse_activity(&self, line: &str) -> Option<UserActivityLine> {
        let user_id = capture(&self.user, line)?.parse::<u32>().ok()?;
        if user_id < FIRST_REAL_USER_ID {
            return None;
        }

        let ip = capture(&self.host, line)
            .map(|host| strip_port(&host).to_string())
            .filter(|bare| self.dotted_quad.is_match(bare));

        Some(UserActivityLine {
            user_id,
            ip,
            timestamp: capture(&self.activity_time, line).unwrap_or_else(|| UNKNOWN.to_string()),
        })
    }
}

fn strip_port(host: &str) -> &str {
    host.split(':').next().unwrap_or(host)
}
