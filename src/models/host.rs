use serde::{Deserialize, Serialize};

/// Point-in-time resource usage of the monitored host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostStatus {
    pub hostname: String,
    pub uptime: String,
    pub uptime_hours: u64,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub disk_usage: f64,
}
