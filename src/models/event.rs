use serde::{Deserialize, Serialize};

/// Placeholder for any field the parser could not extract
pub const UNKNOWN: &str = "unknown";

/// Placeholder user id for requests without an authenticated user
pub const ANONYMOUS: &str = "anonymous";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
    Attack,
    Success,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Password,
    Publickey,
}

/// One SSH authentication attempt taken from an auth log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthEvent {
    #[serde(rename = "type")]
    pub kind: AuthKind,
    pub ip: String,
    pub user: String,
    pub timestamp: String,
    #[serde(rename = "auth_type", skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<AuthMethod>,
    pub service: String,
    pub raw: String,
}

impl AuthEvent {
    pub fn is_attack(&self) -> bool {
        self.kind == AuthKind::Attack
    }

    pub fn is_success(&self) -> bool {
        self.kind == AuthKind::Success
    }
}

/// One OpenProject HTTP request taken from the application log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessEvent {
    pub ip: String,
    pub host: String,
    pub user_id: String,
    pub method: String,
    pub path: String,
    #[serde(rename = "status")]
    pub status_code: u16,
    #[serde(rename = "duration")]
    pub duration_ms: f64,
    pub timestamp: String,
    pub service: String,
    pub raw: String,
}

impl AccessEvent {
    pub fn is_anonymous(&self) -> bool {
        self.user_id == ANONYMOUS
    }

    pub fn has_ip(&self) -> bool {
        self.ip != UNKNOWN
    }
}
