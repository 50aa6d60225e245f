//! Sanity check of active application users against registered accounts

use serde::{Deserialize, Serialize};

/// Share of registered users above which activity is flagged
const HIGH_ACTIVITY_RATIO: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityAlert {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub severity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntrusionReport {
    pub total_registered: usize,
    pub total_active: usize,
    pub alerts: Vec<SecurityAlert>,
}

/// More active users than accounts is critical; more than 80% active is a warning
pub fn assess_intrusion(total_registered: usize, total_active: usize) -> IntrusionReport {
    let mut alerts = Vec::new();

    if total_active > total_registered {
        alerts.push(SecurityAlert {
            kind: "critical".to_string(),
            message: format!(
                "Active users ({}) exceed registered users ({})",
                total_active, total_registered
            ),
            severity: "high".to_string(),
        });
    }

    if total_active as f64 > total_registered as f64 * HIGH_ACTIVITY_RATIO {
        alerts.push(SecurityAlert {
            kind: "warning".to_string(),
            message: format!(
                "High user activity: {}/{} users active",
                total_active, total_registered
            ),
            severity: "medium".to_string(),
        });
    }

    IntrusionReport {
        total_registered,
        total_active,
        alerts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_instance_has_no_alerts() {
        let report = assess_intrusion(10, 3);
        assert!(report.alerts.is_empty());
        assert_eq!(report.total_registered, 10);
        assert_eq!(report.total_active, 3);
    }

    #[test]
    fn test_nothing_registered_nothing_active() {
        assert!(assess_intrusion(0, 0).alerts.is_empty());
    }

    #[test]
    fn test_high_activity_warning() {
        let report = assess_intrusion(10, 9);
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].kind, "warning");
        assert_eq!(report.alerts[0].severity, "medium");
    }

    #[test]
    fn test_more_active_than_registered() {
        let report = assess_intrusion(2, 5);
        assert_eq!(report.alerts.len(), 2);
        assert_eq!(report.alerts[0].kind, "critical");
        assert!(report.alerts[0].message.contains("(5)"));
    }

    #[test]
    fn test_alert_type_field_name() {
        let json = serde_json::to_value(assess_intrusion(1, 2)).unwrap();
        assert_eq!(json["alerts"][0]["type"], "critical");
    }
}
