use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::aggregation::Annotated;
use crate::models::{AuthEvent, Fail2banStatus, HostStatus, SshSessions};
use crate::monitor::Monitor;
use crate::output::render_map_html;

pub type SharedMonitor = web::Data<Arc<Monitor>>;

const MAP_ERROR_HTML: &str = "<p>Error generating map</p>";

/// Register every dashboard endpoint
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/api/health", web::get().to(health))
        .service(
            web::scope("/api")
                .route("/summary", web::get().to(summary))
                .route("/map", web::get().to(map))
                .route("/geo-data", web::get().to(geo_data))
                .route("/server/status", web::get().to(server_status))
                .route("/fail2ban", web::get().to(fail2ban))
                .route("/security/intrusion-detection", web::get().to(intrusion_detection))
                .service(
                    web::scope("/ssh")
                        .route("/attacks", web::get().to(ssh_attacks))
                        .route("/successful", web::get().to(ssh_successful))
                        .route("/active", web::get().to(ssh_active)),
                )
                .service(
                    web::scope("/openproject")
                        .route("/access", web::get().to(op_access))
                        .route("/users", web::get().to(op_users))
                        .route("/connections", web::get().to(op_connections))
                        .route("/failed-logins", web::get().to(op_failed_logins))
                        .route("/successful-logins", web::get().to(op_successful_logins))
                        .route("/active-users", web::get().to(op_active_users))
                        .route("/users-db", web::get().to(op_users_db)),
                ),
        );
}

/// Run a blocking collector off the async workers
///
/// A panicked collector is logged and reported as `None`.
async fn collect<T, F>(monitor: &SharedMonitor, what: &'static str, f: F) -> Option<T>
where
    F: FnOnce(&Monitor) -> T + Send + 'static,
    T: Send + 'static,
{
    let monitor = Arc::clone(monitor.get_ref());
    match tokio::task::spawn_blocking(move || f(&monitor)).await {
        Ok(value) => Some(value),
        Err(e) => {
            log::error!("Error in {} API: {}", what, e);
            None
        }
    }
}

/// Collect and serve as JSON, falling back to the empty default
async fn collect_or_default<T, F>(monitor: &SharedMonitor, what: &'static str, f: F) -> HttpResponse
where
    F: FnOnce(&Monitor) -> T + Send + 'static,
    T: Serialize + Default + Send + 'static,
{
    let value = collect(monitor, what, f).await.unwrap_or_default();
    HttpResponse::Ok().json(value)
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "timestamp": chrono::Local::now().to_rfc3339(),
    }))
}

async fn summary(monitor: SharedMonitor) -> HttpResponse {
    match collect(&monitor, "summary", |m| m.summary()).await {
        Some(summary) => HttpResponse::Ok().json(summary),
        None => HttpResponse::InternalServerError().json(json!({
            "error": "summary collection failed",
        })),
    }
}

async fn ssh_attacks(monitor: SharedMonitor) -> HttpResponse {
    collect_or_default(&monitor, "SSH attacks", |m| -> Vec<Annotated<AuthEvent>> {
        m.ssh_attacks(m.history_hours())
    })
    .await
}

async fn ssh_successful(monitor: SharedMonitor) -> HttpResponse {
    collect_or_default(&monitor, "SSH successful", |m| m.ssh_successful(m.history_hours())).await
}

async fn ssh_active(monitor: SharedMonitor) -> HttpResponse {
    collect_or_default(&monitor, "SSH active", |m| -> SshSessions { m.ssh_sessions() }).await
}

async fn fail2ban(monitor: SharedMonitor) -> HttpResponse {
    let status = collect(&monitor, "fail2ban", |m| m.fail2ban_status())
        .await
        .unwrap_or_else(Fail2banStatus::error);
    HttpResponse::Ok().json(status)
}

async fn op_access(monitor: SharedMonitor) -> HttpResponse {
    collect_or_default(&monitor, "OpenProject access", |m| m.app_access(m.history_hours())).await
}

async fn op_users(monitor: SharedMonitor) -> HttpResponse {
    collect_or_default(&monitor, "OpenProject users", |m| m.app_user_activity(m.history_hours())).await
}

async fn op_connections(monitor: SharedMonitor) -> HttpResponse {
    collect_or_default(&monitor, "OpenProject connections", |m| m.web_connections()).await
}

async fn op_failed_logins(monitor: SharedMonitor) -> HttpResponse {
    collect_or_default(&monitor, "OpenProject failed logins", |m| {
        m.app_failed_logins(m.history_hours())
    })
    .await
}

async fn op_successful_logins(monitor: SharedMonitor) -> HttpResponse {
    collect_or_default(&monitor, "OpenProject successful logins", |m| {
        m.app_successful_logins(m.history_hours())
    })
    .await
}

async fn op_active_users(monitor: SharedMonitor) -> HttpResponse {
    collect_or_default(&monitor, "OpenProject active users", |m| {
        m.app_active_users(m.active_hours())
    })
    .await
}

async fn op_users_db(monitor: SharedMonitor) -> HttpResponse {
    collect_or_default(&monitor, "OpenProject users database", |m| m.app_users()).await
}

async fn intrusion_detection(monitor: SharedMonitor) -> HttpResponse {
    collect_or_default(&monitor, "intrusion detection", |m| m.intrusion_report()).await
}

async fn map(monitor: SharedMonitor) -> HttpResponse {
    let html = collect(&monitor, "map", |m| m.map_markers())
        .await
        .and_then(|markers| match render_map_html(&markers) {
            Ok(html) => Some(html),
            Err(e) => {
                log::error!("Error rendering map: {}", e);
                None
            }
        })
        .unwrap_or_else(|| MAP_ERROR_HTML.to_string());
    HttpResponse::Ok().json(json!({ "map_html": html }))
}

async fn geo_data(monitor: SharedMonitor) -> HttpResponse {
    collect_or_default(&monitor, "geo data", |m| m.map_markers()).await
}

async fn server_status(monitor: SharedMonitor) -> HttpResponse {
    match collect(&monitor, "server status", |m| -> HostStatus { m.host_status() }).await {
        Some(status) => HttpResponse::Ok().json(status),
        None => HttpResponse::Ok().json(json!({})),
    }
}


// Kept apart from `tests`: that module imports `actix_web::test`, which
// shadows the built-in `#[test]` attribute.
#[cfg(test)]
mod blocking_tests {
    use super::*;
    use crate::config::Config;
    use crate::geolocation::StaticGeoResolver;
    use crate::input::StaticRunner;

    fn shared_monitor() -> SharedMonitor {
        let monitor = Monitor::new(
            Config::default(),
            Arc::new(StaticRunner::new()),
            Arc::new(StaticGeoResolver::new()),
        )
        .unwrap();
        web::Data::new(Arc::new(monitor))
    }

    #[test]
    fn test_collect_turns_panics_into_none() {
        let data = shared_monitor();

        let failed = tokio_test::block_on(collect(&data, "panicking", |_| -> usize {
            panic!("collector blew up")
        }));
        assert_eq!(failed, None);

        let ok = tokio_test::block_on(collect(&data, "windows", |m| m.history_hours()));
        assert_eq!(ok, Some(24));
    }
}
