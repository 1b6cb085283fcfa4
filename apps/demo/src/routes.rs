use std::sync::Arc;

use actix_web::{web, HttpResponse};
use request_kit::db::DbError;
use request_kit::{
    trace_ctx, Db, Environment, ProcessEnvironment, RequestUtils, SeaOrmConnection, WebError,
};
use sea_orm::Statement;
use serde_json::json;
use tracing::info;

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

/// Deployment environment as seen through the environment lookup.
async fn entorno(
    env: web::Data<Arc<ProcessEnvironment>>,
    utils: RequestUtils,
) -> Result<HttpResponse, WebError> {
    let name = env.environment_name()?;
    let production = env.is_production()?;
    utils.render_json(&json!({ "entorno": name, "production": production }))
}

async fn db_ping(db: Db<SeaOrmConnection>, utils: RequestUtils) -> Result<HttpResponse, WebError> {
    let one = {
        let conn = db.connection().await?;
        let stmt = Statement::from_string(conn.backend(), "SELECT 1 AS one");
        match conn.query_one(stmt).await? {
            Some(row) => row.try_get::<i32>("", "one").map_err(DbError::from)?,
            None => return Err(WebError::internal("SELECT 1 returned no row")),
        }
    };
    utils.render_json(&json!({ "one": one }))
}

/// Page for a client, or its JSON for XMLHttpRequest callers.
async fn show_cliente(mut utils: RequestUtils) -> Result<HttpResponse, WebError> {
    let params = utils.params_first().await?;
    let ctx = json!({
        "id": utils.id(),
        "params": params,
        "base_url": utils.base_url(),
        "user": utils.remote_user(),
    });

    if utils.is_xhr() {
        utils.render_json(&ctx)
    } else {
        utils.render_template("/clientes/ver.html", &ctx)
    }
}

/// Runs inside a transaction. Answering with an error leaves the rollback
/// to `DbGuard`; `?rechazar=1` exercises that path.
async fn autorizar_cliente(
    db: Db<SeaOrmConnection>,
    mut utils: RequestUtils,
) -> Result<HttpResponse, WebError> {
    let params = utils.params_first().await?;
    let id = utils
        .id()
        .ok_or_else(|| WebError::bad_request("client id missing from path"))?;

    let mut conn = db.connection().await?;
    conn.begin().await?;
    conn.execute_unprepared("SELECT 1").await?;

    if params.get("rechazar").is_some_and(|v| v == "1") {
        return Err(WebError::bad_request(format!("client {id} rejected")));
    }

    conn.commit().await?;
    info!(cliente = id, "Client authorized");
    utils.render_json(&json!({ "id": id, "authorized": true }))
}

/// Items posted as a JSON array of objects, echoed back with a count.
async fn import_items(mut utils: RequestUtils) -> Result<HttpResponse, WebError> {
    let items = utils.json_maps().await?;
    utils.render_json_with_status(
        &json!({ "count": items.len(), "items": items }),
        actix_web::http::StatusCode::CREATED,
    )
}

/// CSV export written to a scratch file, removed once sent.
async fn export(utils: RequestUtils) -> Result<HttpResponse, WebError> {
    let path = std::env::temp_dir().join(format!("export-{}.csv", trace_ctx::request_id()));
    tokio::fs::write(&path, "id,nombre\n1,Ana\n2,Luis\n").await?;
    utils.render_file_download(&path, "clientes.csv", true).await
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/entorno", web::get().to(entorno))
        .route("/db/ping", web::get().to(db_ping))
        .route("/clientes/export", web::get().to(export))
        .route("/clientes/import", web::post().to(import_items))
        .route("/clientes/{id}", web::get().to(show_cliente))
        .route("/clientes/autorizar/{id}", web::post().to(autorizar_cliente));
}
