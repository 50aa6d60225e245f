//! Host resource snapshot read from `/proc` and `df`
//!
//! Everything goes through the command runner, so an unreadable source
//! reports `0` rather than failing the request.

use crate::input::CommandRunner;
use crate::models::HostStatus;

const HOSTNAME_CMD: &str = "hostname";
const UPTIME_CMD: &str = "cat /proc/uptime";
const MEMINFO_CMD: &str = "cat /proc/meminfo";
// Two samples half a second apart
const CPU_CMD: &str = "head -n1 /proc/stat; sleep 0.5; head -n1 /proc/stat";
const DISK_CMD: &str = "df -P /";

/// Collect a [`HostStatus`] snapshot
pub fn host_status(runner: &dyn CommandRunner) -> HostStatus {
    let hostname = runner.run(HOSTNAME_CMD);
    let uptime_secs = parse_uptime_secs(&runner.run(UPTIME_CMD)).unwrap_or(0);

    HostStatus {
        hostname: if hostname.is_empty() {
            "unknown".to_string()
        } else {
            hostname
        },
        uptime: format_uptime(uptime_secs),
        uptime_hours: uptime_secs / 3600,
        cpu_usage: round1(parse_cpu_usage(&runner.run(CPU_CMD)).unwrap_or(0.0)),
        memory_usage: round1(parse_memory_usage(&runner.run(MEMINFO_CMD)).unwrap_or(0.0)),
        disk_usage: round1(parse_disk_usage(&runner.run(DISK_CMD)).unwrap_or(0.0)),
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// First field of `/proc/uptime`, in whole seconds
pub fn parse_uptime_secs(text: &str) -> Option<u64> {
    let secs = text.split_whitespace().next()?.parse::<f64>().ok()?;
    Some(secs as u64)
}

/// `7d 12h 34m`
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    format!("{}d {}h {}m", days, hours, minutes)
}

/// Used share of memory from `MemTotal` and `MemAvailable`
pub fn parse_memory_usage(text: &str) -> Option<f64> {
    let field = |name: &str| -> Option<f64> {
        text.lines()
            .find(|line| line.starts_with(name))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|v| v.parse::<f64>().ok())
    };
    let total = field("MemTotal:")?;
    let available = field("MemAvailable:")?;
    if total <= 0.0 {
        return None;
    }
    Some((total - available) / total * 100.0)
}

fn cpu_times(line: &str) -> Option<(u64, u64)> {
    let mut fields = line.split_whitespace();
    if fields.next()? != "cpu" {
        return None;
    }
    let values: Vec<u64> = fields.filter_map(|v| v.parse().ok()).collect();
    if values.len() < 4 {
        return None;
    }
    // idle + iowait
    let idle = values[3] + values.get(4).copied().unwrap_or(0);
    Some((idle, values.iter().sum()))
}

/// Busy share between two aggregate `cpu` lines of `/proc/stat`
pub fn parse_cpu_usage(text: &str) -> Option<f64> {
    let samples: Vec<(u64, u64)> = text.lines().filter_map(cpu_times).collect();
    let (first, second) = (samples.first()?, samples.get(1)?);

    let total = second.1.checked_sub(first.1)?;
    let idle = second.0.checked_sub(first.0)?;
    if total == 0 {
        return Some(0.0);
    }
    Some((total.saturating_sub(idle)) as f64 / total as f64 * 100.0)
}

/// Capacity column of `df -P`
pub fn parse_disk_usage(text: &str) -> Option<f64> {
    let line = text.lines().nth(1)?;
    let capacity = line.split_whitespace().nth(4)?;
    capacity.trim_end_matches('%').parse::<f64>().ok()
}
