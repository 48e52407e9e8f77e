mod auth;
mod db;
mod errors;
mod handlers;
mod jobs;
mod logger;
mod models;
mod routes;
mod store;
mod swagger;

use db::get_db;
use log::info;
use tokio_util::sync::CancellationToken;
use utoipa::OpenApi;
use warp::{self, Filter};

#[tokio::main]
async fn main() -> mongodb::error::Result<()> {
    logger::start_log();

    let config = swagger::doc_config();
    let db = get_db().await?;
    db::ensure_indexes(&db).await?;

    let root = warp::path::end().map(|| "Welcome to the Devicehub api");

    let api_doc = warp::path("api-doc.json")
        .and(warp::get())
        .map(|| warp::reply::json(&swagger::DevicehubDoc::openapi()));

    let swagger_ui = warp::path("docs")
        .and(warp::get())
        .and(warp::path::full())
        .and(warp::path::tail())
        .and(warp::any().map(move || config.clone()))
        .and_then(swagger::serve_swagger);

    let api = root
        .or(api_doc)
        .or(swagger_ui)
        .or(routes::device_routes(db.clone()))
        .recover(errors::handle_rejection);

    // The sweeper runs on its own schedule, independent of request traffic
    let shutdown = CancellationToken::new();
    let sweeper = jobs::spawn_sweeper(db.clone(), shutdown.clone());

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3030);

    let (addr, server) =
        warp::serve(api).bind_with_graceful_shutdown(([127, 0, 0, 1], port), async {
            tokio::signal::ctrl_c().await.ok();
        });
    info!("Listening on {}", addr);

    server.await;

    // Stop the sweeper before exiting so a mid-sweep run finishes cleanly
    shutdown.cancel();
    sweeper.await.ok();

    Ok(())
}
