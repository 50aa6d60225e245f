//! IP geolocation using the MaxMind GeoLite2-City database
//!
//! Every lookup is total: loopback addresses resolve to [`GeoRecord::local`]
//! without touching the database, and any miss or database error resolves to
//! [`GeoRecord::unknown`]. Both sentinels carry `(0, 0)` coordinates, which
//! callers treat as "nothing to plot".

use maxminddb::{geoip2, Reader};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during geolocation lookups
#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Failed to open database: {0}")]
    DatabaseOpen(#[from] maxminddb::MaxMindDBError),

    #[error("IP address not found in database")]
    NotFound,

    #[error("Invalid IP address: {0}")]
    InvalidAddress(String),

    #[error("Database file not found: {0}")]
    FileNotFound(String),
}

/// Best-effort location of an IP address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoRecord {
    pub country: String,
    pub city: String,
    pub lat: f64,
    pub lon: f64,
}

impl GeoRecord {
    /// Sentinel for any address that could not be located
    pub fn unknown() -> Self {
        GeoRecord {
            country: "Unknown".to_string(),
            city: "Unknown".to_string(),
            lat: 0.0,
            lon: 0.0,
        }
    }

    /// Sentinel for loopback addresses
    pub fn local() -> Self {
        GeoRecord {
            country: "Local".to_string(),
            city: "localhost".to_string(),
            lat: 0.0,
            lon: 0.0,
        }
    }

    /// `(0, 0)` encodes "no usable coordinate"
    pub fn has_coordinates(&self) -> bool {
        !(self.lat == 0.0 && self.lon == 0.0)
    }
}

/// Maps an IP string to a location; never fails
pub trait GeoResolver: Send + Sync {
    fn resolve(&self, ip: &str) -> GeoRecord;
}

/// Loopback addresses and the literal `localhost`
pub fn is_loopback(ip: &str) -> bool {
    matches!(ip, "127.0.0.1" | "localhost" | "::1")
}

/// GeoIP lookup service wrapping a MaxMind database reader
pub struct GeoIpService {
    reader: Arc<Reader<Vec<u8>>>,
}

impl GeoIpService {
    /// Open a MaxMind database file
    ///
    /// # Errors
    ///
    /// Returns an error if the database file is missing or invalid.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, GeoError> {
        let path = db_path.as_ref();
        if !path.exists() {
            return Err(GeoError::FileNotFound(path.display().to_string()));
        }

        let reader = Reader::open_readfile(path)?;
        Ok(GeoIpService {
            reader: Arc::new(reader),
        })
    }

    /// Look up the city record of an IP address
    ///
    /// Names missing from a hit become `"Unknown"` and missing coordinates
    /// become `0`.
    pub fn lookup(&self, ip: &IpAddr) -> Result<GeoRecord, GeoError> {
        let city: geoip2::City = self.reader.lookup(*ip).map_err(|e| match e {
            maxminddb::MaxMindDBError::AddressNotFoundError(_) => GeoError::NotFound,
            other => GeoError::DatabaseOpen(other),
        })?;

        let (lat, lon) = city
            .location
            .as_ref()
            .map(|l| (l.latitude.unwrap_or(0.0), l.longitude.unwrap_or(0.0)))
            .unwrap_or((0.0, 0.0));

        Ok(GeoRecord {
            country: english_name(city.country.and_then(|c| c.names)),
            city: english_name(city.city.and_then(|c| c.names)),
            lat,
            lon,
        })
    }

    /// Parse and look up an IP given as text
    pub fn lookup_str(&self, ip: &str) -> Result<GeoRecord, GeoError> {
        let addr = IpAddr::from_str(ip).map_err(|_| GeoError::InvalidAddress(ip.to_string()))?;
        self.lookup(&addr)
    }
}

fn english_name(names: Option<BTreeMap<&str, &str>>) -> String {
    names
        .and_then(|n| n.get("en").copied())
        .map(String::from)
        .unwrap_or_else(|| "Unknown".to_string())
}

impl Clone for GeoIpService {
    fn clone(&self) -> Self {
        GeoIpService {
            reader: Arc::clone(&self.reader),
        }
    }
}

/// Production resolver backed by the offline database
///
/// A missing or unreadable database is not fatal: every lookup then
/// degrades to the Unknown sentinel.
#[derive(Clone)]
pub struct DatabaseResolver {
    service: Option<GeoIpService>,
}

impl DatabaseResolver {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Self {
        match GeoIpService::new(&db_path) {
            Ok(service) => DatabaseResolver {
                service: Some(service),
            },
            Err(e) => {
                log::warn!("GeoIP database unavailable, locations will be Unknown: {}", e);
                DatabaseResolver { service: None }
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.service.is_some()
    }
}

impl GeoResolver for DatabaseResolver {
    fn resolve(&self, ip: &str) -> GeoRecord {
        if is_loopback(ip) {
            return GeoRecord::local();
        }
        let Some(service) = &self.service else {
            return GeoRecord::unknown();
        };
        match service.lookup_str(ip) {
            Ok(record) => record,
            Err(e) => {
                log::debug!("Geo lookup failed for {}: {}", ip, e);
                GeoRecord::unknown()
            }
        }
    }
}

/// Fixed-table resolver for tests and offline demos
#[derive(Debug, Clone, Default)]
pub struct StaticGeoResolver {
    table: HashMap<String, GeoRecord>,
}

impl StaticGeoResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, ip: &str, country: &str, city: &str, lat: f64, lon: f64) -> Self {
        self.table.insert(
            ip.to_string(),
            GeoRecord {
                country: country.to_string(),
                city: city.to_string(),
                lat,
                lon,
            },
        );
        self
    }
}

impl GeoResolver for StaticGeoResolver {
    fn resolve(&self, ip: &str) -> GeoRecord {
        if is_loopback(ip) {
            return GeoRecord::local();
        }
        self.table.get(ip).cloned().unwrap_or_else(GeoRecord::unknown)
    }
}
