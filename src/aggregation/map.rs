//! Map point aggregation
//!
//! Points are keyed by rounded coordinate plus IP: the geo database hands
//! out identical city coordinates to many addresses, and the map wants one
//! marker per distinct address. Addresses that resolve to `(0, 0)` are never
//! plotted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::geolocation::GeoResolver;
use crate::trust::TrustSet;

/// Coordinates are compared at four decimal places (about 11 m)
const COORD_SCALE: f64 = 10_000.0;

fn round_coord(value: f64) -> i64 {
    (value * COORD_SCALE).round() as i64
}

/// One distinct address at one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    pub lat: f64,
    pub lon: f64,
    pub ip: String,
    pub count: usize,
}

/// Accumulates `(lat, lon, ip) -> count` in first-seen order
#[derive(Debug, Default)]
pub struct PointTally {
    index: HashMap<(i64, i64, String), usize>,
    points: Vec<MapPoint>,
}

impl PointTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `ip` and count it; returns false when it has no coordinate
    pub fn add(&mut self, ip: &str, geo: &dyn GeoResolver) -> bool {
        let record = geo.resolve(ip);
        if !record.has_coordinates() {
            return false;
        }

        let key = (round_coord(record.lat), round_coord(record.lon), ip.to_string());
        match self.index.get(&key) {
            Some(&i) => self.points[i].count += 1,
            None => {
                self.index.insert(key.clone(), self.points.len());
                self.points.push(MapPoint {
                    lat: key.0 as f64 / COORD_SCALE,
                    lon: key.1 as f64 / COORD_SCALE,
                    ip: ip.to_string(),
                    count: 1,
                });
            }
        }
        true
    }

    pub fn extend<'a, I>(&mut self, ips: I, geo: &dyn GeoResolver)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for ip in ips {
            self.add(ip, geo);
        }
    }

    pub fn into_points(self) -> Vec<MapPoint> {
        self.points
    }
}

/// Tally a batch of addresses in one go
pub fn tally_points<'a, I>(ips: I, geo: &dyn GeoResolver) -> Vec<MapPoint>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tally = PointTally::new();
    tally.extend(ips, geo);
    tally.into_points()
}

/// Radius grows with the count but never past `cap`
pub fn marker_radius(count: usize, per_hit: f64, cap: f64) -> f64 {
    (count as f64 * per_hit).min(cap)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerLayer {
    SshAttack,
    SshSuccess,
    AppAccess,
    ActiveSsh,
    ActiveWeb,
}

/// A styled map marker ready for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapMarker {
    pub layer: MarkerLayer,
    pub lat: f64,
    pub lon: f64,
    pub ip: String,
    pub count: usize,
    pub radius: f64,
    pub color: String,
    pub is_trusted: bool,
    pub label: String,
}

impl MapMarker {
    /// Red markers sized by hit count
    pub fn attacks(points: Vec<MapPoint>) -> Vec<MapMarker> {
        points
            .into_iter()
            .map(|p| MapMarker {
                layer: MarkerLayer::SshAttack,
                radius: marker_radius(p.count, 2.0, 20.0),
                color: "red".to_string(),
                is_trusted: false,
                label: format!("SSH attacks from {} (total: {})", p.ip, p.count),
                lat: p.lat,
                lon: p.lon,
                ip: p.ip,
                count: p.count,
            })
            .collect()
    }

    /// Green markers, blue when the address is trusted
    pub fn ssh_successes(points: Vec<MapPoint>, trust: &TrustSet) -> Vec<MapMarker> {
        points
            .into_iter()
            .map(|p| {
                let is_trusted = trust.contains(&p.ip);
                MapMarker {
                    layer: MarkerLayer::SshSuccess,
                    radius: 8.0,
                    color: if is_trusted { "blue" } else { "green" }.to_string(),
                    is_trusted,
                    label: format!("SSH login from {}{}", p.ip, trusted_suffix(is_trusted)),
                    lat: p.lat,
                    lon: p.lon,
                    ip: p.ip,
                    count: p.count,
                }
            })
            .collect()
    }

    /// Orange markers, purple when the address is trusted
    pub fn app_access(points: Vec<MapPoint>, trust: &TrustSet) -> Vec<MapMarker> {
        points
            .into_iter()
            .map(|p| {
                let is_trusted = trust.contains(&p.ip);
                MapMarker {
                    layer: MarkerLayer::AppAccess,
                    radius: 6.0,
                    color: if is_trusted { "purple" } else { "orange" }.to_string(),
                    is_trusted,
                    label: format!(
                        "OpenProject from {} (requests: {}){}",
                        p.ip,
                        p.count,
                        trusted_suffix(is_trusted)
                    ),
                    lat: p.lat,
                    lon: p.lon,
                    ip: p.ip,
                    count: p.count,
                }
            })
            .collect()
    }

    /// Large markers for connections open right now
    pub fn active(
        layer: MarkerLayer,
        protocol: &str,
        ip: &str,
        port: &str,
        is_trusted: bool,
        geo: &dyn GeoResolver,
    ) -> Option<MapMarker> {
        let record = geo.resolve(ip);
        if !record.has_coordinates() {
            return None;
        }
        let (radius, color) = match layer {
            MarkerLayer::ActiveWeb => (10.0, "purple"),
            _ => (12.0, "blue"),
        };
        Some(MapMarker {
            layer,
            lat: record.lat,
            lon: record.lon,
            ip: ip.to_string(),
            count: 1,
            radius,
            color: color.to_string(),
            is_trusted,
            label: format!(
                "Active {} from {}{} (port {})",
                protocol,
                ip,
                trusted_suffix(is_trusted),
                port
            ),
        })
    }
}

fn trusted_suffix(is_trusted: bool) -> &'static str {
    if is_trusted {
        " [trusted]"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geolocation::StaticGeoResolver;

    fn geo() -> StaticGeoResolver {
        StaticGeoResolver::new()
            .with_entry("1.2.3.4", "Germany", "Berlin", 52.52, 13.405)
            .with_entry("1.2.3.5", "Germany", "Berlin", 52.52, 13.405)
            .with_entry("5.6.7.8", "France", "Paris", 48.8566, 2.3522)
    }

    #[test]
    fn test_same_ip_same_coordinate_is_one_point() {
        let points = tally_points(["1.2.3.4", "1.2.3.4"], &geo());
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].ip, "1.2.3.4");
        assert_eq!(points[0].count, 2);
    }

    #[test]
    fn test_same_city_different_ips_are_separate_points() {
        let points = tally_points(["1.2.3.4", "1.2.3.5", "1.2.3.4"], &geo());
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].count, 2);
        assert_eq!(points[1].count, 1);
        assert_eq!(points[0].lat, points[1].lat);
    }

    #[test]
    fn test_zero_coordinate_addresses_are_excluded() {
        let mut tally = PointTally::new();
        assert!(!tally.add("127.0.0.1", &geo()));
        assert!(!tally.add("9.9.9.9", &geo()));
        assert!(tally.add("5.6.7.8", &geo()));

        let points = tally.into_points();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].ip, "5.6.7.8");
    }

    #[test]
    fn test_marker_radius_is_capped() {
        assert_eq!(marker_radius(1, 2.0, 20.0), 2.0);
        assert_eq!(marker_radius(7, 2.0, 20.0), 14.0);
        assert_eq!(marker_radius(500, 2.0, 20.0), 20.0);
    }

    #[test]
    fn test_attack_markers() {
        let points = tally_points(["1.2.3.4"; 15], &geo());
        let markers = MapMarker::attacks(points);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].radius, 20.0);
        assert_eq!(markers[0].color, "red");
        assert!(markers[0].label.contains("15"));
    }

    #[test]
    fn test_trusted_success_markers_are_blue() {
        let trust: TrustSet = vec!["5.6.7.8".to_string()].into_iter().collect();
        let points = tally_points(["5.6.7.8", "1.2.3.4"], &geo());
        let markers = MapMarker::ssh_successes(points, &trust);

        assert_eq!(markers[0].color, "blue");
        assert!(markers[0].is_trusted);
        assert_eq!(markers[1].color, "green");
    }

    #[test]
    fn test_active_marker_skips_unlocated() {
        let g = geo();
        assert!(MapMarker::active(MarkerLayer::ActiveSsh, "SSH", "9.9.9.9", "22", false, &g).is_none());

        let marker = MapMarker::active(MarkerLayer::ActiveWeb, "HTTPS", "5.6.7.8", "443", true, &g).unwrap();
        assert_eq!(marker.radius, 10.0);
        assert_eq!(marker.color, "purple");
    }
}
