//! Emporium Storefront - REST API for the shop's single-page client.
//!
//! This binary serves the JSON API on port 3000 and, when `STATIC_DIR` is
//! set, the built client application itself.
//!
//! # Architecture
//!
//! - Axum web framework, JSON in and out
//! - `PostgreSQL` for the catalog, carts, orders and sessions
//! - Stripe for card payments, Gemini for the shopping assistant
//!
//! Migrations, seeding and supplier sync live in the `emporium` CLI.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue, Method, Request, header};
use axum::middleware::from_fn;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use emporium_storefront::config::StorefrontConfig;
use emporium_storefront::logging::{init_sentry, init_tracing};
use emporium_storefront::middleware::{
    create_session_layer, request_id_middleware, security_headers_middleware,
};
use emporium_storefront::state::AppState;
use emporium_storefront::{db, routes};

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);
    init_tracing("emporium_storefront=info,tower_http=debug");

    // Initialize database connection pool
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p emporium-cli -- migrate

    let state = AppState::new(config.clone(), pool);
    if state.stripe().is_none() {
        tracing::warn!("STRIPE_SECRET_KEY not set; payment endpoints will return 503");
    }
    if state.gemini().is_none() {
        tracing::info!("GEMINI_API_KEY not set; chat answers with the fallback reply");
    }

    let session_layer = create_session_layer(state.pool(), state.config());

    let mut app = routes::routes();
    if let Some(static_dir) = &config.static_dir {
        tracing::info!(dir = %static_dir.display(), "Serving client application");
        app = app.fallback_service(routes::spa_fallback(static_dir));
    }

    let app = app
        .layer(session_layer)
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&config))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    // Start server
    let addr = config.socket_addr();
    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    // Peer addresses feed the rate limiter when no proxy header is present
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");
}

/// CORS for a client served from another origin during development.
///
/// Only the configured base URL may call the API with credentials.
fn cors_layer(config: &StorefrontConfig) -> CorsLayer {
    let origin = config.base_url.trim_end_matches('/');

    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-request-id"),
        ])
        .allow_credentials(true);

    match HeaderValue::from_str(origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            tracing::warn!(error = %e, "BASE_URL is not a valid origin; CORS disabled");
            layer
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
