//! Collectors: one method per external source, each composing the command
//! runner, a parser, the geo resolver and the trust list into the records an
//! endpoint serves. Nothing is kept between calls except what the runner
//! itself caches.

use chrono::{Duration, Local};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::aggregation::{
    self, annotate, assess_intrusion, map::tally_points, most_recent, Annotated, IntrusionReport,
    MapMarker, MarkerLayer,
};
use crate::config::{Config, SessionMergePolicy};
use crate::geolocation::GeoResolver;
use crate::input::listing::{parse_login_rows, parse_user_rows, SessionEntry};
use crate::input::{AccessLogParser, AuthLogParser, CommandRunner, ListingParser};
use crate::models::{
    AccessEvent, ActiveAppUser, AppLogin, AppLoginFailure, AppUser, AppUserActivity, AuthEvent,
    BannedIp, ConnectionRecord, Fail2banStats, Fail2banStatus, HostStatus, SshSessions,
    UserSession, UNKNOWN,
};
use crate::trust::TrustSet;

/// Listing endpoints return at most this many recent attacks
pub const RECENT_ATTACKS: usize = 100;
/// Listing endpoints return at most this many recent successful logins
pub const RECENT_SUCCESSES: usize = 50;
/// Listing endpoints return at most this many recent access events
pub const RECENT_ACCESS: usize = 100;
/// The map plots at most this many recent access events
pub const MAP_ACCESS: usize = 50;

/// Counters for the dashboard header
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub ssh_failed_logins: usize,
    pub ssh_successful_logins: usize,
    pub ssh_active_connections: usize,
    pub ssh_blocked_ips: usize,
    pub ssh_distinct_attack_ips: usize,
    pub ssh_total_events: usize,
    pub ssh_distinct_ips: usize,

    pub op_failed_logins: usize,
    pub op_successful_logins: usize,
    pub op_active_users: usize,
    pub op_blocked_users: usize,

    pub total_registered_users: usize,
    pub potential_security_alerts: usize,
    pub total_active_connections: usize,

    pub ssh_attacks_24h: usize,
    pub ssh_successful_24h: usize,
    pub op_active_connections: usize,
}

/// Gathers dashboard data from the host on demand
pub struct Monitor {
    config: Config,
    runner: Arc<dyn CommandRunner>,
    geo: Arc<dyn GeoResolver>,
    auth_parser: AuthLogParser,
    access_parser: AccessLogParser,
    listing_parser: ListingParser,
}

impl Monitor {
    pub fn new(
        config: Config,
        runner: Arc<dyn CommandRunner>,
        geo: Arc<dyn GeoResolver>,
    ) -> Result<Self, regex::Error> {
        Ok(Monitor {
            config,
            runner,
            geo,
            auth_parser: AuthLogParser::new()?,
            access_parser: AccessLogParser::new()?,
            listing_parser: ListingParser::new()?,
        })
    }

    pub fn geo(&self) -> &dyn GeoResolver {
        self.geo.as_ref()
    }

    pub fn history_hours(&self) -> u32 {
        self.config.windows.history_hours
    }

    pub fn active_hours(&self) -> u32 {
        self.config.windows.active_hours
    }

    /// Re-read the trust list; it is never kept between calls
    pub fn trust(&self) -> TrustSet {
        TrustSet::load_or_empty(&self.config.paths.trusted_ips)
    }

    fn app_container(&self) -> &str {
        &self.config.commands.app_container
    }

    fn psql(&self, query: &str) -> String {
        let command = format!(
            "docker exec {} psql -U postgres -d openproject -t -c \"{}\"",
            self.config.commands.db_container, query
        );
        self.runner.run(&command)
    }

    // =====================
    // SSH
    // =====================

    /// Attack and success events from the journal
    pub fn ssh_events(&self, hours: u32) -> Vec<AuthEvent> {
        let command = format!(
            "journalctl --since '{}' --no-pager | grep sshd",
            since_timestamp(hours)
        );
        let output = self.runner.run(&command);
        let events: Vec<AuthEvent> = self.auth_parser.parse(&output).collect();
        log::info!("SSH logs processed: {} entries found", events.len());
        events
    }

    /// Most recent attacks with country and trust flag
    pub fn ssh_attacks(&self, hours: u32) -> Vec<Annotated<AuthEvent>> {
        let (attacks, _) = aggregation::split_by_kind(self.ssh_events(hours));
        let recent = most_recent(&attacks, RECENT_ATTACKS).to_vec();
        log::info!("SSH attacks: {} in window, {} listed", attacks.len(), recent.len());
        aggregation::annotate_auth(recent, self.geo(), &self.trust())
    }

    /// Most recent successful logins with country and trust flag
    pub fn ssh_successful(&self, hours: u32) -> Vec<Annotated<AuthEvent>> {
        let (_, successes) = aggregation::split_by_kind(self.ssh_events(hours));
        let recent = most_recent(&successes, RECENT_SUCCESSES).to_vec();
        aggregation::annotate_auth(recent, self.geo(), &self.trust())
    }

    fn established(&self, port: u16) -> Vec<crate::input::listing::NetstatEntry> {
        let output = self.runner.run("netstat -tn");
        self.listing_parser.parse_netstat(&output, port)
    }

    fn connection(
        &self,
        entry: crate::input::listing::NetstatEntry,
        protocol: &str,
        service: &str,
        trust: &TrustSet,
    ) -> ConnectionRecord {
        ConnectionRecord {
            country: self.geo.resolve(&entry.remote_ip).country,
            is_trusted: trust.contains(&entry.remote_ip),
            remote_ip: entry.remote_ip,
            remote_port: entry.remote_port,
            local_port: entry.local_port,
            protocol: protocol.to_string(),
            service: service.to_string(),
        }
    }

    fn user_session(&self, entry: SessionEntry, trust: &TrustSet) -> UserSession {
        UserSession {
            country: self.geo.resolve(&entry.ip).country,
            is_trusted: trust.contains(&entry.ip),
            user: entry.user,
            terminal: entry.terminal,
            login_time: entry.login_time,
            ip: entry.ip,
            service: "SSH".to_string(),
        }
    }

    /// Login sessions from `w` and `who`, combined per the merge policy
    pub fn login_sessions(&self) -> Vec<SessionEntry> {
        let from_w = self.listing_parser.parse_w(&self.runner.run("w"));
        let from_who = self.listing_parser.parse_who(&self.runner.run("who"));
        merge_sessions(from_w, from_who, self.config.sessions.merge_policy)
    }

    /// Established SSH connections and logged-in remote users
    pub fn ssh_sessions(&self) -> SshSessions {
        let trust = self.trust();

        let network_connections = self
            .established(22)
            .into_iter()
            .map(|entry| self.connection(entry, "SSH", "SSH", &trust))
            .collect();
        let user_sessions = self
            .login_sessions()
            .into_iter()
            .map(|entry| self.user_session(entry, &trust))
            .collect();

        let sessions = SshSessions {
            user_sessions,
            network_connections,
        };
        log::info!("Active SSH sessions: {} total", sessions.total());
        sessions
    }

    /// Current fail2ban jail state for sshd
    pub fn fail2ban_status(&self) -> Fail2banStatus {
        let output = self.runner.run("fail2ban-client status sshd");
        let banned_ips: Vec<BannedIp> = self
            .listing_parser
            .parse_banned_ips(&output)
            .into_iter()
            .map(|ip| BannedIp {
                country: self.geo.resolve(&ip).country,
                ip,
            })
            .collect();

        Fail2banStatus {
            stats: Fail2banStats {
                jail_status: if output.is_empty() { "Inactive" } else { "Active" }.to_string(),
                total_banned: banned_ips.len(),
            },
            banned_ips,
        }
    }

    // =====================
    // OpenProject
    // =====================

    /// Request events from the application container
    pub fn app_access_events(&self, hours: u32) -> Vec<AccessEvent> {
        let command = format!(
            "docker logs {} --since {}h --timestamps 2>&1",
            self.app_container(),
            hours
        );
        let output = self.runner.run(&command);
        let events: Vec<AccessEvent> = self.access_parser.parse(&output).collect();
        log::info!("OpenProject logs processed: {} entries", events.len());
        events
    }

    /// Most recent access events with country and trust flag
    pub fn app_access(&self, hours: u32) -> Vec<Annotated<AccessEvent>> {
        let events = self.app_access_events(hours);
        let recent = most_recent(&events, RECENT_ACCESS).to_vec();
        aggregation::annotate_access(recent, self.geo(), &self.trust())
    }

    /// Per-user request tallies from the access log
    pub fn app_user_activity(&self, hours: u32) -> Vec<AppUserActivity> {
        let events = self.app_access_events(hours);
        let activity = aggregation::user_activity(&events, self.geo(), &self.trust());
        log::info!("OpenProject users with activity: {}", activity.len());
        activity
    }

    /// Established HTTP and HTTPS connections to the web front
    pub fn web_connections(&self) -> Vec<ConnectionRecord> {
        let trust = self.trust();
        let output = self.runner.run("netstat -tn");

        let mut connections = Vec::new();
        for (port, protocol) in [(80, "HTTP"), (443, "HTTPS")] {
            for entry in self.listing_parser.parse_netstat(&output, port) {
                connections.push(self.connection(entry, protocol, "OpenProject", &trust));
            }
        }
        log::info!("Active web connections: {}", connections.len());
        connections
    }

    /// Failed application logins
    pub fn app_failed_logins(&self, hours: u32) -> Vec<AppLoginFailure> {
        let command = format!(
            "docker logs {} --since={}h 2>&1 | grep 'Failed login'",
            self.app_container(),
            hours
        );
        let output = self.runner.run(&command);
        let failures: Vec<AppLoginFailure> = output
            .lines()
            .filter_map(|line| self.access_parser.parse_failed_login(line))
            .map(|failed| AppLoginFailure {
                country: self.geo.resolve(&failed.ip).country,
                username: failed.username,
                ip: failed.ip,
                timestamp: failed.timestamp,
                service: "OpenProject".to_string(),
            })
            .collect();
        log::info!("OpenProject failed logins: {} attempts", failures.len());
        failures
    }

    /// Registered, active accounts from the database
    pub fn app_users(&self) -> Vec<AppUser> {
        let output = self.psql(
            "SELECT id, login, firstname, lastname, mail, status, last_login_on FROM users WHERE status = 1;",
        );
        let users = parse_user_rows(&output);
        log::info!("OpenProject users loaded: {} users", users.len());
        users
    }

    /// Accounts that logged in within the window
    pub fn app_successful_logins(&self, hours: u32) -> Vec<AppLogin> {
        let query = format!(
            "SELECT id, login, firstname, lastname, last_login_on FROM users WHERE status = 1 AND last_login_on >= '{}';",
            since_timestamp(hours)
        );
        let logins: Vec<AppLogin> = parse_login_rows(&self.psql(&query))
            .into_iter()
            .map(|row| AppLogin {
                user_id: row.user_id,
                username: row.display_name,
                login: row.login,
                last_login: row.last_login,
                service: "OpenProject".to_string(),
            })
            .collect();
        log::info!("OpenProject successful logins: {} users", logins.len());
        logins
    }

    /// Accounts with request activity in the window, named via the database
    pub fn app_active_users(&self, hours: u32) -> Vec<ActiveAppUser> {
        let command = format!(
            "docker logs {} --since={}h 2>&1 | grep 'user=' | tail -100",
            self.app_container(),
            hours
        );
        let output = self.runner.run(&command);
        let users: HashMap<u32, AppUser> =
            self.app_users().into_iter().map(|u| (u.id, u)).collect();
        let trust = self.trust();

        let mut order = Vec::new();
        let mut last_seen: HashMap<u32, String> = HashMap::new();
        let mut last_ip: HashMap<u32, String> = HashMap::new();
        for activity in output.lines().filter_map(|line| self.access_parser.parse_activity(line)) {
            if !last_seen.contains_key(&activity.user_id) {
                order.push(activity.user_id);
            }
            last_seen.insert(activity.user_id, activity.timestamp);
            if let Some(ip) = activity.ip {
                last_ip.insert(activity.user_id, ip);
            }
        }

        let active: Vec<ActiveAppUser> = order
            .into_iter()
            .map(|user_id| {
                let account = users.get(&user_id);
                let ip = last_ip.get(&user_id).cloned().unwrap_or_else(|| UNKNOWN.to_string());
                let annotated = annotate((), &ip, self.geo(), &trust);
                ActiveAppUser {
                    user_id,
                    username: account
                        .map(|u| u.display_name.clone())
                        .unwrap_or_else(|| format!("User {}", user_id)),
                    login: account.map(|u| u.login.clone()).unwrap_or_default(),
                    last_activity: last_seen.remove(&user_id).unwrap_or_else(|| UNKNOWN.to_string()),
                    ip,
                    country: annotated.country,
                    is_trusted: annotated.is_trusted,
                    service: "OpenProject".to_string(),
                }
            })
            .collect();
        log::info!("OpenProject active users: {} users", active.len());
        active
    }

    /// Compare active accounts against registered ones
    pub fn intrusion_report(&self) -> IntrusionReport {
        let registered = self.app_users().len();
        let active = self.app_active_users(self.active_hours()).len();
        assess_intrusion(registered, active)
    }

    // =====================
    // Aggregate views
    // =====================

    pub fn summary(&self) -> DashboardSummary {
        let history = self.history_hours();
        let ssh_events = self.ssh_events(history);
        let counts = aggregation::AuthCounts::from_events(&ssh_events);
        let ssh_sessions = self.ssh_sessions();
        let fail2ban = self.fail2ban_status();

        let op_failed = self.app_failed_logins(history).len();
        let op_successful = self.app_successful_logins(history).len();
        let op_active = self.app_active_users(self.active_hours()).len();
        let web = self.web_connections().len();
        let intrusion = self.intrusion_report();

        let summary = DashboardSummary {
            ssh_failed_logins: counts.attacks,
            ssh_successful_logins: counts.successes,
            ssh_active_connections: ssh_sessions.total(),
            ssh_blocked_ips: fail2ban.banned_ips.len(),
            ssh_distinct_attack_ips: counts.distinct_attack_ips,
            ssh_total_events: counts.total,
            ssh_distinct_ips: counts.distinct_ips,

            op_failed_logins: op_failed,
            op_successful_logins: op_successful,
            op_active_users: op_active,
            op_blocked_users: 0,

            total_registered_users: intrusion.total_registered,
            potential_security_alerts: intrusion.alerts.len(),
            total_active_connections: ssh_sessions.total() + web,

            ssh_attacks_24h: counts.attacks,
            ssh_successful_24h: counts.successes,
            op_active_connections: web,
        };
        log::info!(
            "Summary: SSH({} attacks, {} success), OP({} failed, {} success, {} active)",
            summary.ssh_failed_logins,
            summary.ssh_successful_logins,
            summary.op_failed_logins,
            summary.op_successful_logins,
            summary.op_active_users
        );
        summary
    }

    /// Every marker layer of the combined map
    pub fn map_markers(&self) -> Vec<MapMarker> {
        let history = self.history_hours();
        let trust = self.trust();
        let (attacks, successes) = aggregation::split_by_kind(self.ssh_events(history));
        let access = self.app_access_events(history);

        let mut markers = MapMarker::attacks(tally_points(
            most_recent(&attacks, RECENT_ATTACKS).iter().map(|e| e.ip.as_str()),
            self.geo(),
        ));
        markers.extend(MapMarker::ssh_successes(
            tally_points(
                most_recent(&successes, RECENT_SUCCESSES).iter().map(|e| e.ip.as_str()),
                self.geo(),
            ),
            &trust,
        ));
        markers.extend(MapMarker::app_access(
            tally_points(
                most_recent(&access, MAP_ACCESS)
                    .iter()
                    .filter(|e| e.has_ip())
                    .map(|e| e.ip.as_str()),
                self.geo(),
            ),
            &trust,
        ));

        for conn in self.ssh_sessions().network_connections {
            markers.extend(MapMarker::active(
                MarkerLayer::ActiveSsh,
                "SSH",
                &conn.remote_ip,
                &conn.remote_port,
                conn.is_trusted,
                self.geo(),
            ));
        }
        for conn in self.web_connections() {
            markers.extend(MapMarker::active(
                MarkerLayer::ActiveWeb,
                &conn.protocol,
                &conn.remote_ip,
                &conn.remote_port,
                conn.is_trusted,
                self.geo(),
            ));
        }

        log::info!("Map markers: {}", markers.len());
        markers
    }

    pub fn host_status(&self) -> HostStatus {
        crate::host::host_status(self.runner.as_ref())
    }
}

/// Local wall-clock time `hours` ago, truncated to the minute so repeated
/// commands within a minute are textually identical
pub fn since_timestamp(hours: u32) -> String {
    (Local::now() - Duration::hours(i64::from(hours)))
        .format("%Y-%m-%d %H:%M:00")
        .to_string()
}

/// Combine `w` and `who` listings
pub fn merge_sessions(
    from_w: Vec<SessionEntry>,
    from_who: Vec<SessionEntry>,
    policy: SessionMergePolicy,
) -> Vec<SessionEntry> {
    match policy {
        SessionMergePolicy::Duplicate => from_w.into_iter().chain(from_who).collect(),
        SessionMergePolicy::Merge => {
            let mut seen = HashSet::new();
            from_w
                .into_iter()
                .chain(from_who)
                .filter(|s| seen.insert((s.user.clone(), s.terminal.clone(), s.ip.clone())))
                .collect()
        }
    }
}
