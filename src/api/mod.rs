mod handlers;

use axum::{
    http::HeaderValue,
    routing::{get, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::db::Database;

pub use handlers::Actor;

/// Router with permissive CORS, for local use and tests.
pub fn create_router(db: Database) -> Router {
    create_router_with_config(db, &Config::default())
}

pub fn create_router_with_config(db: Database, config: &Config) -> Router {
    let api = Router::new()
        // Schema ledger
        .route(
            "/schemas",
            get(handlers::get_schema).post(handlers::create_schema),
        )
        .route("/schemas/export", get(handlers::export_schema))
        .route("/schemas/{id}", get(handlers::get_schema_by_id))
        .route("/schemas/{id}/status", put(handlers::update_schema_status))
        // Transformation ledger
        .route(
            "/mappings",
            get(handlers::get_mapping).post(handlers::create_mapping),
        )
        .route("/mappings/{id}", put(handlers::update_mapping))
        // Term sets
        .route("/termsets/mapped", get(handlers::mapped_terms))
        .route("/termsets/status", put(handlers::set_term_set_status))
        .route("/termsets/name", put(handlers::rename_term_set))
        .route("/termsets/tree", get(handlers::term_set_tree))
        .route("/terms/name", put(handlers::rename_term))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(config)),
        )
        .with_state(db)
}

fn cors_layer(config: &Config) -> CorsLayer {
    match &config.cors_origins {
        None => CorsLayer::permissive(),
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}
