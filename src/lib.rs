pub mod aggregation;
pub mod api;
pub mod config;
pub mod geolocation;
pub mod host;
pub mod input;
pub mod models;
pub mod monitor;
pub mod output;
pub mod trust;

// Re-export commonly used types
pub use config::Config;
pub use geolocation::{DatabaseResolver, GeoRecord, GeoResolver, StaticGeoResolver};
pub use input::{CachedRunner, CommandRunner, ShellRunner, StaticRunner};
pub use models::{AccessEvent, AuthEvent};
pub use monitor::{DashboardSummary, Monitor};
pub use trust::TrustSet;
