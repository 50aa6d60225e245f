//! Parsers for tabular tool output: `netstat`, `w`, `who`,
//! `fail2ban-client` and `psql -t` result rows.

use regex::Regex;

use crate::geolocation::is_loopback;
use crate::models::AppUser;

/// One ESTABLISHED TCP connection from `netstat -tn`
#[derive(Debug, Clone, PartialEq)]
pub struct NetstatEntry {
    pub remote_ip: String,
    pub remote_port: String,
    pub local_port: String,
}

/// One logged-in session from `w` or `who`
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEntry {
    pub user: String,
    pub terminal: String,
    pub login_time: String,
    pub ip: String,
}

/// Row of the recent-login query: `id | login | firstname | lastname | last_login_on`
#[derive(Debug, Clone, PartialEq)]
pub struct LoginRow {
    pub user_id: u32,
    pub login: String,
    pub display_name: String,
    pub last_login: String,
}

/// Regexes shared by the listing parsers
#[derive(Debug, Clone)]
pub struct ListingParser {
    dotted_quad: Regex,
    any_ipv4: Regex,
    who_origin: Regex,
}

impl ListingParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(ListingParser {
            dotted_quad: Regex::new(r"^\d+\.\d+\.\d+\.\d+$")?,
            any_ipv4: Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b")?,
            who_origin: Regex::new(r"\(([^)]+)\)")?,
        })
    }

    /// ESTABLISHED connections whose local side listens on `port`
    ///
    /// Loopback peers are skipped.
    pub fn parse_netstat(&self, text: &str, port: u16) -> Vec<NetstatEntry> {
        let port = port.to_string();
        text.lines()
            .filter(|line| line.contains("ESTABLISHED"))
            .filter_map(|line| {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() < 5 {
                    return None;
                }
                let local_port = parts[3].rsplit(':').next()?;
                let (remote_ip, remote_port) = parts[4].rsplit_once(':')?;
                if local_port != port || is_loopback(remote_ip) {
                    return None;
                }
                Some(NetstatEntry {
                    remote_ip: remote_ip.to_string(),
                    remote_port: remote_port.to_string(),
                    local_port: local_port.to_string(),
                })
            })
            .collect()
    }

    /// Remote sessions from `w`
    ///
    /// The first two lines (uptime banner and column header) are skipped.
    /// Only rows whose FROM column is a dotted quad are kept.
    pub fn parse_w(&self, text: &str) -> Vec<SessionEntry> {
        text.lines()
            .skip(2)
            .filter(|line| !line.trim().is_empty() && !line.starts_with("USER"))
            .filter_map(|line| {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() < 8 || !self.dotted_quad.is_match(parts[2]) {
                    return None;
                }
                Some(SessionEntry {
                    user: parts[0].to_string(),
                    terminal: parts[1].to_string(),
                    login_time: parts[3].to_string(),
                    ip: parts[2].to_string(),
                })
            })
            .collect()
    }

    /// Remote sessions from `who`: `user tty date time (origin)`
    pub fn parse_who(&self, text: &str) -> Vec<SessionEntry> {
        text.lines()
            .filter_map(|line| {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() < 4 {
                    return None;
                }
                let origin = self.who_origin.captures(line)?.get(1)?.as_str();
                if !self.dotted_quad.is_match(origin) {
                    return None;
                }
                Some(SessionEntry {
                    user: parts[0].to_string(),
                    terminal: parts[1].to_string(),
                    login_time: format!("{} {}", parts[2], parts[3]),
                    ip: origin.to_string(),
                })
            })
            .collect()
    }

    /// Every IPv4 address on the `Banned IP list` line
    pub fn parse_banned_ips(&self, text: &str) -> Vec<String> {
        text.lines()
            .filter(|line| line.contains("Banned IP list"))
            .flat_map(|line| self.any_ipv4.find_iter(line).map(|m| m.as_str().to_string()))
            .collect()
    }
}

fn psql_columns(line: &str) -> Option<Vec<&str>> {
    if line.trim().is_empty() || !line.contains('|') {
        return None;
    }
    Some(line.split('|').map(str::trim).collect())
}

fn display_name(user_id: u32, login: &str, firstname: &str, lastname: &str) -> String {
    if !firstname.is_empty() && !lastname.is_empty() {
        format!("{} {}", firstname, lastname)
    } else if !login.is_empty() {
        login.to_string()
    } else {
        format!("User {}", user_id)
    }
}

fn login_or_default(user_id: u32, login: &str) -> String {
    if login.is_empty() {
        format!("user_{}", user_id)
    } else {
        login.to_string()
    }
}

/// Rows of `SELECT id, login, firstname, lastname, mail, status, last_login_on`
pub fn parse_user_rows(text: &str) -> Vec<AppUser> {
    text.lines()
        .filter_map(psql_columns)
        .filter(|cols| cols.len() >= 7)
        .filter_map(|cols| {
            let id = cols[0].parse::<u32>().ok()?;
            let login = login_or_default(id, cols[1]);
            Some(AppUser {
                id,
                display_name: display_name(id, &login, cols[2], cols[3]),
                login,
                email: cols[4].to_string(),
                last_login: Some(cols[6]).filter(|s| !s.is_empty()).map(String::from),
            })
        })
        .collect()
}

/// Rows of `SELECT id, login, firstname, lastname, last_login_on`
pub fn parse_login_rows(text: &str) -> Vec<LoginRow> {
    text.lines()
        .filter_map(psql_columns)
        .filter(|cols| cols.len() >= 5)
        .filter_map(|cols| {
            let user_id = cols[0].parse::<u32>().ok()?;
            let login = login_or_default(user_id, cols[1]);
            Some(LoginRow {
                user_id,
                display_name: display_name(user_id, &login, cols[2], cols[3]),
                login,
                last_login: cols[4].to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> ListingParser {
        ListingParser::new().unwrap()
    }

    const NETSTAT: &str = "\
tcp        0      0 10.0.0.2:22             203.0.113.5:51234       ESTABLISHED
tcp        0      0 10.0.0.2:22             127.0.0.1:40000         ESTABLISHED
tcp        0      0 10.0.0.2:443            198.51.100.7:60000      ESTABLISHED
tcp        0      0 10.0.0.2:52000          192.0.2.1:22            ESTABLISHED
tcp        0      0 10.0.0.2:22             198.51.100.8:51000      TIME_WAIT";

    #[test]
    fn test_netstat_filters_port_and_loopback() {
        let ssh = parser().parse_netstat(NETSTAT, 22);
        assert_eq!(ssh.len(), 1);
        assert_eq!(ssh[0].remote_ip, "203.0.113.5");
        assert_eq!(ssh[0].remote_port, "51234");
        assert_eq!(ssh[0].local_port, "22");

        let https = parser().parse_netstat(NETSTAT, 443);
        assert_eq!(https.len(), 1);
        assert_eq!(https[0].remote_ip, "198.51.100.7");

        assert!(parser().parse_netstat(NETSTAT, 80).is_empty());
    }

    #[test]
    fn test_w_output() {
        let text = "\
 10:15:01 up 3 days,  2:01,  2 users,  load average: 0.00, 0.01, 0.05
USER     TTY      FROM             LOGIN@   IDLE   JCPU   PCPU WHAT
alice    pts/0    203.0.113.5      09:12    1.00s  0.05s  0.00s w
bob      tty1     -                08:00    2:00m  0.01s  0.01s -bash";
        let sessions = parser().parse_w(text);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].user, "alice");
        assert_eq!(sessions[0].terminal, "pts/0");
        assert_eq!(sessions[0].login_time, "09:12");
        assert_eq!(sessions[0].ip, "203.0.113.5");
    }

    #[test]
    fn test_who_output() {
        let text = "\
alice    pts/0        2024-05-01 09:12 (203.0.113.5)
bob      tty1         2024-05-01 08:00
carol    pts/1        2024-05-01 09:30 (laptop.lan)";
        let sessions = parser().parse_who(text);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].user, "alice");
        assert_eq!(sessions[0].login_time, "2024-05-01 09:12");
        assert_eq!(sessions[0].ip, "203.0.113.5");
    }

    #[test]
    fn test_banned_ip_list() {
        let text = "\
Status for the jail: sshd
|- Filter
`- Actions
   |- Currently banned: 2
   `- Banned IP list:   45.12.1.9 198.51.100.22";
        let banned = parser().parse_banned_ips(text);
        assert_eq!(banned, vec!["45.12.1.9", "198.51.100.22"]);
    }

    #[test]
    fn test_banned_ip_list_empty() {
        assert!(parser().parse_banned_ips("").is_empty());
        assert!(parser().parse_banned_ips("   `- Banned IP list:").is_empty());
    }

    #[test]
    fn test_user_rows() {
        let text = "\
  4 | alice | Alice   | Smith  | alice@example.org | 1 | 2024-05-01 09:00:00
  5 |       |         |        |                   | 1 |
 xx | junk  | a       | b      | c                 | 1 | d
  6 | bob   | Bob     |        | bob@example.org   | 1";
        let users = parse_user_rows(text);
        assert_eq!(users.len(), 2);

        assert_eq!(users[0].id, 4);
        assert_eq!(users[0].display_name, "Alice Smith");
        assert_eq!(users[0].last_login.as_deref(), Some("2024-05-01 09:00:00"));

        assert_eq!(users[1].login, "user_5");
        assert_eq!(users[1].display_name, "user_5");
        assert_eq!(users[1].last_login, None);
    }

    #[test]
    fn test_login_rows() {
        let text = " 7 | carol | Carol | | 2024-05-01 08:30:00";
        let rows = parse_login_rows(text);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, 7);
        assert_eq!(rows[0].display_name, "carol");
        assert_eq!(rows[0].last_login, "2024-05-01 08:30:00");
    }
}
