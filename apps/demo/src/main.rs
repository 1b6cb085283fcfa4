use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use request_kit::{
    views_data, DbGuard, Environment, MiniJinjaViews, PoolProvider, ProcessEnvironment,
    RequestSpan, RequestUtilsConfig,
};
use tracing::{error, info, warn};

mod routes;
mod telemetry;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    telemetry::init_tracing();

    // Server settings come straight from the process environment; values the
    // handlers read (entorno, jdbc/db_pool) go through ProcessEnvironment.
    let host = std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = match std::env::var("APP_PORT") {
        Ok(raw) => raw.parse::<u16>().unwrap_or_else(|_| {
            error!(value = %raw, "APP_PORT must be a valid port number");
            std::process::exit(1);
        }),
        Err(_) => 8080,
    };
    let templates_dir =
        std::env::var("APP_TEMPLATES_DIR").unwrap_or_else(|_| "templates".to_string());

    let env = Arc::new(ProcessEnvironment::with_prefix("APP_"));
    match env.is_production() {
        Ok(production) => info!(production, "Deployment environment resolved"),
        Err(e) => warn!(error = %e, "Deployment environment is not configured"),
    }

    let pool = Arc::new(PoolProvider::new(Arc::clone(&env)));
    let views = views_data(MiniJinjaViews::new(&templates_dir));
    let env_data = web::Data::new(env);

    info!(host = %host, port, templates = %templates_dir, "Starting demo server");

    HttpServer::new(move || {
        App::new()
            .wrap(DbGuard::from_arc(Arc::clone(&pool)))
            .wrap(RequestSpan)
            .app_data(env_data.clone())
            .app_data(views.clone())
            .app_data(RequestUtilsConfig::default())
            .configure(routes::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
