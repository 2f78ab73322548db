// HTTP request handlers for API endpoints

use crate::api::models::*;
use crate::catalog::models::ProductId;
use crate::search::filter_products;
use crate::store::ProductStore;
use actix_web::http::header;
use actix_web::{web, HttpResponse, Result};

/// Health check endpoint
pub async fn health_check(store: web::Data<ProductStore>) -> Result<HttpResponse> {
    let response = ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        store: store.phase(),
        products: store.len(),
        pending: store.pending(),
    });

    Ok(HttpResponse::Ok().json(response))
}

/// Search filter over the current store contents
pub async fn list_products(
    store: web::Data<ProductStore>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse> {
    let q = query.into_inner().q.unwrap_or_default();
    let snapshot = store.snapshot();
    let items: Vec<_> = filter_products(&snapshot, &q).into_iter().cloned().collect();

    let response = ApiResponse::success(ProductListResponse {
        query: q,
        total: items.len(),
        items,
    });

    Ok(HttpResponse::Ok().json(response))
}

/// Single product by id
pub async fn get_product(
    store: web::Data<ProductStore>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let id = ProductId::from(path.into_inner());
    match store.get(&id) {
        Some(product) => Ok(HttpResponse::Ok().json(ApiResponse::success(product))),
        None => Ok(HttpResponse::NotFound()
            .json(ApiResponse::<()>::error(format!("product {id} not found")))),
    }
}

/// Click-through: redirect to the product link without leaking a referrer
pub async fn open_product(
    store: web::Data<ProductStore>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let id = ProductId::from(path.into_inner());
    let Some(product) = store.get(&id) else {
        return Ok(HttpResponse::NotFound()
            .json(ApiResponse::<()>::error(format!("product {id} not found"))));
    };
    if product.link.trim().is_empty() {
        return Ok(HttpResponse::NotFound()
            .json(ApiResponse::<()>::error(format!("product {id} has no link"))));
    }

    tracing::debug!(product_id = %id, link = %product.link, "click-through");
    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, product.link))
        .insert_header((header::REFERRER_POLICY, "no-referrer"))
        .finish())
}
