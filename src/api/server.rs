// API server implementation using actix-web

use crate::api::{middleware, routes};
use crate::config::GalleryConfig;
use crate::store::ProductStore;
use crate::util::env::env_opt;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};

pub struct ApiServer {
    pub bind_addr: String,
    pub allowed_origins: String,
}

impl ApiServer {
    /// Bind address from the gallery config; CORS origins from `ALLOWED_ORIGINS`.
    pub fn from_config(config: &GalleryConfig) -> Self {
        let allowed_origins = env_opt("ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000,http://localhost:8000".to_string());

        Self {
            bind_addr: config.http_addr.clone(),
            allowed_origins,
        }
    }

    /// Serve the store until the server is stopped.
    pub async fn run(self, store: ProductStore) -> Result<()> {
        tracing::info!(addr = %self.bind_addr, "starting gallery API server");

        let store_data = web::Data::new(store);
        let allowed_origins = self.allowed_origins.clone();

        HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();
            let cors = middleware::setup_cors(&allowed_origins);

            App::new()
                .app_data(store_data.clone())
                .wrap(logger)
                .wrap(compress)
                .wrap(cors)
                .configure(routes::configure_routes)
        })
        .bind(&self.bind_addr)
        .with_context(|| format!("Failed to bind to {}", self.bind_addr))?
        .run()
        .await
        .context("HTTP server error")?;

        Ok(())
    }
}
