use serde::{Deserialize, Serialize};

/// An established TCP connection to one of the monitored services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub remote_ip: String,
    pub remote_port: String,
    pub local_port: String,
    pub protocol: String,
    pub service: String,
    pub country: String,
    pub is_trusted: bool,
}

/// A logged-in shell session as reported by `w` or `who`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    pub user: String,
    pub terminal: String,
    pub login_time: String,
    pub ip: String,
    pub service: String,
    pub country: String,
    pub is_trusted: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SshSessions {
    pub user_sessions: Vec<UserSession>,
    pub network_connections: Vec<ConnectionRecord>,
}

impl SshSessions {
    pub fn total(&self) -> usize {
        self.user_sessions.len() + self.network_connections.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BannedIp {
    pub ip: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fail2banStats {
    pub jail_status: String,
    pub total_banned: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fail2banStatus {
    pub banned_ips: Vec<BannedIp>,
    pub stats: Fail2banStats,
}

impl Fail2banStatus {
    /// Status reported when the handler itself failed
    pub fn error() -> Self {
        Fail2banStatus {
            banned_ips: Vec::new(),
            stats: Fail2banStats {
                jail_status: "Error".to_string(),
                total_banned: 0,
            },
        }
    }
}
