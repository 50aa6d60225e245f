use serde::{Deserialize, Serialize};

/// A failed OpenProject login taken from the container log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppLoginFailure {
    pub username: String,
    pub ip: String,
    pub timestamp: String,
    pub country: String,
    pub service: String,
}

/// A registered, active OpenProject account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppUser {
    pub id: u32,
    pub login: String,
    pub display_name: String,
    pub email: String,
    pub last_login: Option<String>,
}

/// An account that logged in within the history window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppLogin {
    pub user_id: u32,
    pub username: String,
    pub login: String,
    pub last_login: String,
    pub service: String,
}

/// An account with request activity in the active window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveAppUser {
    pub user_id: u32,
    pub username: String,
    pub login: String,
    pub last_activity: String,
    pub ip: String,
    pub country: String,
    pub is_trusted: bool,
    pub service: String,
}

/// Per-user request tally derived from access events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppUserActivity {
    pub user_id: String,
    pub host: String,
    pub ip: String,
    pub last_activity: String,
    pub requests: usize,
    pub country: String,
    pub is_trusted: bool,
}
