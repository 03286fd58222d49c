mod config;
mod constants;
mod dispatcher;
mod domain;
mod encoder;
mod handlers;
mod models;
mod queue;
mod routes;
mod schema;
mod services;
mod storage;
mod thumbnailer;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::get,
    Router,
};
use config::Config;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
}

async fn health() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(Config::from_env());

    let pool = PgPoolOptions::new()
        .max_connections(config.db_pool_size)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    println!(
        "[startup] Database pool: {} max connections",
        config.db_pool_size
    );

    schema::ensure_schema(&pool)
        .await
        .expect("Failed to bootstrap schema");

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .expect("Failed to create upload dir");
    tokio::fs::create_dir_all(config.thumbs_dir())
        .await
        .expect("Failed to create thumbs dir");

    let state = Arc::new(AppState {
        db: pool.clone(),
        config: config.clone(),
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let dispatcher_handle = tokio::spawn(dispatcher::run(pool.clone(), config.clone(), shutdown_rx));

    let cors_origin = std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "*".to_string());
    let cors = if cors_origin == "*" {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
    } else {
        CorsLayer::new()
            .allow_origin(
                cors_origin
                    .parse::<HeaderValue>()
                    .unwrap_or_else(|_| HeaderValue::from_static("*")),
            )
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
    };

    let app = Router::new()
        .route("/health", get(health))
        .merge(routes::build_routes())
        .layer(DefaultBodyLimit::max(constants::MAX_IMAGE_UPLOAD_SIZE))
        .layer(cors)
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {}: {}", addr, e));

    println!("Listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_tx))
    .await
    .expect("Server failed");

    dispatcher_handle.await.ok();
    Ok(())
}

async fn shutdown_signal(shutdown_tx: tokio::sync::watch::Sender<bool>) {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    println!("[startup] shutdown signal received");
    let _ = shutdown_tx.send(true);
}
