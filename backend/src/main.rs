use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

mod auth;
mod config;
mod db;
mod error;
mod inquiries;
mod listings;
mod models;
mod promotions;
mod schema;
mod transactions;
mod uploads;
mod users;

#[derive(Clone)]
pub struct AppState {
    pub pool: db::DbPool,
    pub config: config::AppConfig,
    pub http: reqwest::Client,
}

async fn health() -> &'static str {
    "OK"
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/listings",
            get(listings::list_listings).post(listings::create_listing),
        )
        .route(
            "/api/listings/:id",
            get(listings::get_listing).put(listings::update_listing),
        )
        .route("/api/listings/:id/like", post(listings::like_listing))
        .route("/api/track-view", post(listings::track_view))
        .route(
            "/api/inquiries",
            get(inquiries::list_inquiries)
                .post(inquiries::create_inquiry)
                .put(inquiries::update_inquiry),
        )
        .route(
            "/api/transactions",
            get(transactions::list_transactions).put(transactions::update_transaction),
        )
        .route("/api/packages", get(promotions::list_packages))
        .route("/api/promotions", post(promotions::create_promotion))
        .route(
            "/api/admin/listings",
            get(listings::admin_list_listings),
        )
        .route(
            "/api/admin/payments",
            get(promotions::list_payments).put(promotions::review_payment),
        )
        .route(
            "/api/profile",
            get(users::get_profile).put(users::upsert_profile),
        )
        .route(
            "/api/upload",
            post(uploads::upload_media)
                .delete(uploads::delete_media)
                .layer(DefaultBodyLimit::max(uploads::MAX_UPLOAD_SIZE + 1024 * 1024)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::load()?;
    let pool = db::establish_pool(&config.database_url).await?;
    db::ping(&pool).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting server on {}", addr);

    let state = AppState {
        pool,
        config,
        http: reqwest::Client::new(),
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
