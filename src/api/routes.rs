// API route configuration

use crate::api::handlers;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check
        .route("/health", web::get().to(handlers::health_check))
        .route("/", web::get().to(handlers::health_check))
        .service(
            web::scope("/api/v1")
                .route("/products", web::get().to(handlers::list_products))
                .route("/products/{id}", web::get().to(handlers::get_product))
                .route("/products/{id}/open", web::get().to(handlers::open_product)),
        );
}
