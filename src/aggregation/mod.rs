//! Turns parsed records into counts, trust-annotated views and map points.

pub mod intrusion;
pub mod map;

pub use intrusion::{assess_intrusion, IntrusionReport, SecurityAlert};
pub use map::{MapMarker, MapPoint, MarkerLayer, PointTally};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::geolocation::{GeoRecord, GeoResolver};
use crate::models::{AccessEvent, AppUserActivity, AuthEvent, AuthKind, UNKNOWN};
use crate::trust::TrustSet;

/// Scalar counts over a batch of SSH auth events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthCounts {
    pub total: usize,
    pub attacks: usize,
    pub successes: usize,
    pub distinct_ips: usize,
    pub distinct_attack_ips: usize,
}

impl AuthCounts {
    pub fn from_events(events: &[AuthEvent]) -> Self {
        let mut ips = HashSet::new();
        let mut attack_ips = HashSet::new();
        let mut counts = AuthCounts::default();

        for event in events {
            counts.total += 1;
            ips.insert(event.ip.as_str());
            match event.kind {
                AuthKind::Attack => {
                    counts.attacks += 1;
                    attack_ips.insert(event.ip.as_str());
                }
                AuthKind::Success => counts.successes += 1,
            }
        }

        counts.distinct_ips = ips.len();
        counts.distinct_attack_ips = attack_ips.len();
        counts
    }
}

/// A record with the geo country and trust flag attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotated<T> {
    #[serde(flatten)]
    pub record: T,
    pub country: String,
    pub is_trusted: bool,
}

/// Attach country and trust flag for `ip`
///
/// An `unknown` address is not looked up: it is reported as Unknown and
/// untrusted.
pub fn annotate<T>(record: T, ip: &str, geo: &dyn GeoResolver, trust: &TrustSet) -> Annotated<T> {
    if ip == UNKNOWN {
        return Annotated {
            record,
            country: GeoRecord::unknown().country,
            is_trusted: false,
        };
    }
    Annotated {
        country: geo.resolve(ip).country,
        is_trusted: trust.contains(ip),
        record,
    }
}

pub fn annotate_auth(
    events: Vec<AuthEvent>,
    geo: &dyn GeoResolver,
    trust: &TrustSet,
) -> Vec<Annotated<AuthEvent>> {
    events
        .into_iter()
        .map(|event| {
            let ip = event.ip.clone();
            annotate(event, &ip, geo, trust)
        })
        .collect()
}

pub fn annotate_access(
    events: Vec<AccessEvent>,
    geo: &dyn GeoResolver,
    trust: &TrustSet,
) -> Vec<Annotated<AccessEvent>> {
    events
        .into_iter()
        .map(|event| {
            let ip = event.ip.clone();
            annotate(event, &ip, geo, trust)
        })
        .collect()
}

/// The last `n` items, oldest first
pub fn most_recent<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

/// Split a batch into (attacks, successes), preserving order
pub fn split_by_kind(events: Vec<AuthEvent>) -> (Vec<AuthEvent>, Vec<AuthEvent>) {
    events.into_iter().partition(|e| e.kind == AuthKind::Attack)
}

/// Per-user request tallies for authenticated access events
///
/// Later events overwrite host, ip and last activity; order follows the
/// first request of each user.
pub fn user_activity(
    events: &[AccessEvent],
    geo: &dyn GeoResolver,
    trust: &TrustSet,
) -> Vec<AppUserActivity> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_user: HashMap<&str, AppUserActivity> = HashMap::new();

    for event in events.iter().filter(|e| !e.is_anonymous()) {
        let entry = by_user.entry(event.user_id.as_str()).or_insert_with(|| {
            order.push(event.user_id.as_str());
            AppUserActivity {
                user_id: event.user_id.clone(),
                host: String::new(),
                ip: String::new(),
                last_activity: String::new(),
                requests: 0,
                country: String::new(),
                is_trusted: false,
            }
        });
        entry.host = event.host.clone();
        entry.ip = event.ip.clone();
        entry.last_activity = event.timestamp.clone();
        entry.requests += 1;
    }

    order
        .into_iter()
        .filter_map(|user| by_user.remove(user))
        .map(|mut activity| {
            let annotated = annotate((), &activity.ip, geo, trust);
            activity.country = annotated.country;
            activity.is_trusted = annotated.is_trusted;
            activity
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::{AccessEvent, AuthEvent, AuthKind, AuthMethod};

    pub fn attack(ip: &str, user: &str) -> AuthEvent {
        AuthEvent {
            kind: AuthKind::Attack,
            ip: ip.to_string(),
            user: user.to_string(),
            timestamp: "Jan 1 10:00:00".to_string(),
            auth_method: None,
            service: "SSH".to_string(),
            raw: String::new(),
        }
    }

    pub fn success(ip: &str, user: &str) -> AuthEvent {
        AuthEvent {
            kind: AuthKind::Success,
            auth_method: Some(AuthMethod::Publickey),
            ..attack(ip, user)
        }
    }

    pub fn access(ip: &str, user_id: &str, timestamp: &str) -> AccessEvent {
        AccessEvent {
            ip: ip.to_string(),
            host: format!("{}:443", ip),
            user_id: user_id.to_string(),
            method: "GET".to_string(),
            path: "/".to_string(),
            status_code: 200,
            duration_ms: 1.0,
            timestamp: timestamp.to_string(),
            service: "OpenProject".to_string(),
            raw: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::geolocation::StaticGeoResolver;

    fn geo() -> StaticGeoResolver {
        StaticGeoResolver::new()
            .with_entry("1.2.3.4", "Germany", "Berlin", 52.52, 13.40)
            .with_entry("5.6.7.8", "France", "Paris", 48.85, 2.35)
    }

    #[test]
    fn test_counts() {
        let events = vec![
            attack("1.2.3.4", "admin"),
            attack("1.2.3.4", "root"),
            attack("9.9.9.9", "oracle"),
            success("5.6.7.8", "root"),
        ];
        let counts = AuthCounts::from_events(&events);

        assert_eq!(counts.total, 4);
        assert_eq!(counts.attacks, 3);
        assert_eq!(counts.successes, 1);
        assert_eq!(counts.distinct_ips, 3);
        assert_eq!(counts.distinct_attack_ips, 2);
    }

    #[test]
    fn test_annotate_flags_trusted_ip() {
        let trust: TrustSet = vec!["5.6.7.8".to_string()].into_iter().collect();
        let annotated = annotate_auth(
            vec![success("5.6.7.8", "root"), attack("1.2.3.4", "x")],
            &geo(),
            &trust,
        );

        assert_eq!(annotated[0].country, "France");
        assert!(annotated[0].is_trusted);
        assert_eq!(annotated[1].country, "Germany");
        assert!(!annotated[1].is_trusted);
    }

    #[test]
    fn test_annotate_unknown_ip_skips_lookup() {
        let trust: TrustSet = vec![UNKNOWN.to_string()].into_iter().collect();
        let annotated = annotate_access(vec![access(UNKNOWN, "4", "t")], &geo(), &trust);

        assert_eq!(annotated[0].country, "Unknown");
        assert!(!annotated[0].is_trusted);
    }

    #[test]
    fn test_annotated_serializes_flat() {
        let annotated = annotate(attack("1.2.3.4", "admin"), "1.2.3.4", &geo(), &TrustSet::default());
        let json = serde_json::to_value(&annotated).unwrap();

        assert_eq!(json["type"], "attack");
        assert_eq!(json["ip"], "1.2.3.4");
        assert_eq!(json["country"], "Germany");
        assert_eq!(json["is_trusted"], false);
    }

    #[test]
    fn test_most_recent() {
        let items = [1, 2, 3, 4, 5];
        assert_eq!(most_recent(&items, 2), &[4, 5]);
        assert_eq!(most_recent(&items, 10), &items);
        assert!(most_recent(&items, 0).is_empty());
    }

    #[test]
    fn test_split_by_kind() {
        let (attacks, successes) = split_by_kind(vec![
            attack("1.2.3.4", "a"),
            success("5.6.7.8", "b"),
            attack("1.2.3.4", "c"),
        ]);
        assert_eq!(attacks.len(), 2);
        assert_eq!(successes.len(), 1);
        assert_eq!(attacks[1].user, "c");
    }

    #[test]
    fn test_user_activity_tally() {
        let events = vec![
            access("1.2.3.4", "4", "t1"),
            access("1.2.3.4", "anonymous", "t2"),
            access("5.6.7.8", "7", "t3"),
            access("1.2.3.4", "4", "t4"),
        ];
        let trust: TrustSet = vec!["1.2.3.4".to_string()].into_iter().collect();
        let activity = user_activity(&events, &geo(), &trust);

        assert_eq!(activity.len(), 2);
        assert_eq!(activity[0].user_id, "4");
        assert_eq!(activity[0].requests, 2);
        assert_eq!(activity[0].last_activity, "t4");
        assert!(activity[0].is_trusted);
        assert_eq!(activity[1].user_id, "7");
        assert_eq!(activity[1].country, "France");
    }
}
