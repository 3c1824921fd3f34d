#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the park map catalog.
//!
//! Serves the read-only catalog resources under `/api/v1`, each narrowed
//! either by simple field filters or by one of the explore cross filters.
//! Rows come from `PostGIS`, or from a JSON fixture when
//! `CATALOG_FIXTURE` is set.

pub mod config;
pub mod error;
mod handlers;
pub mod pagination;
pub mod resources;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::{self, NormalizePath};
use actix_web::{App, HttpServer, web};
use park_map_database::memory::MemoryStore;
use park_map_database::postgis::PostgisStore;
use park_map_database::{CatalogStore, db, run_migrations};
use park_map_explore::DuplicatePolicy;

use crate::config::ServerConfig;

/// Shared application state.
pub struct AppState {
    /// Catalog rows, from `PostGIS` or a fixture.
    pub store: Arc<dyn CatalogStore>,
    /// Duplicate handling for the explore queries.
    pub duplicate_policy: DuplicatePolicy,
}

/// Registers the API routes.
///
/// Expects trailing slashes to be trimmed by [`NormalizePath`] before
/// routing, so `/api/v1/park/` and `/api/v1/park` hit the same handler.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::resource("/{resource}")
                    .route(web::get().to(handlers::list))
                    .default_service(web::to(handlers::method_not_allowed)),
            )
            .service(
                web::resource("/{resource}/{id}")
                    .route(web::get().to(handlers::detail))
                    .default_service(web::to(handlers::method_not_allowed)),
            ),
    )
    .service(web::scope("/api").route("/health", web::get().to(handlers::health)));
}

/// Opens the catalog store selected by `config`.
///
/// A configured fixture is loaded into a [`MemoryStore`]. Otherwise the
/// `PostGIS` database named by `DATABASE_URL` is connected and migrated.
///
/// # Errors
///
/// Returns an error if the fixture cannot be read, or if the database
/// connection or migrations fail.
pub async fn open_store(config: &ServerConfig) -> std::io::Result<Arc<dyn CatalogStore>> {
    if let Some(path) = &config.catalog_fixture {
        log::info!("Loading catalog fixture from {}...", path.display());
        let store = MemoryStore::load(path).map_err(std::io::Error::other)?;
        return Ok(Arc::new(store));
    }

    log::info!("Connecting to database...");
    let db_conn = db::connect_from_env()
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to connect to database: {e}")))?;

    log::info!("Running migrations...");
    run_migrations(db_conn.as_ref())
        .await
        .map_err(std::io::Error::other)?;

    Ok(Arc::new(PostgisStore::new(Arc::from(db_conn))))
}

/// Starts the park map API server.
///
/// Opens the catalog store and runs the Actix-Web HTTP server until it is
/// shut down. The caller provides the async runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an error if the store cannot be opened, or if the HTTP server
/// fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server(config: ServerConfig) -> std::io::Result<()> {
    let store = open_store(&config).await?;

    let state = web::Data::new(AppState {
        store,
        duplicate_policy: config.duplicate_policy,
    });

    log::info!(
        "Starting server on {}:{} (explore duplicates: {})",
        config.bind_addr,
        config.port,
        config.duplicate_policy
    );

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(NormalizePath::trim())
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((config.bind_addr, config.port))?
    .run()
    .await
}
