//! HTTP surface of the dashboard

pub mod routes;

pub use routes::configure;
