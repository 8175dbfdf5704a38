use actix_web::dev::Server;
use actix_web::http::StatusCode;
use actix_web::{web, App, HttpResponse, HttpServer, ResponseError};
use std::sync::Arc;

use crate::query::{QueryError, QueryService};

// ============================================================================
// Read Boundary - HTTP API
// ============================================================================
//
// GET /             landing page
// GET /order/{id}   order JSON (200), malformed id (400), absent (404),
//                   store failure (500)
//
// ============================================================================

const INDEX_HTML: &str = include_str!("../../web/index.html");

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("order not found")]
    NotFound,

    #[error("internal error")]
    Internal,
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::InvalidId(e) => ApiError::BadRequest(e.to_string()),
            QueryError::NotFound(_) => ApiError::NotFound,
            // Store details stay in the logs
            QueryError::Store(_) => ApiError::Internal,
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": self.to_string() }))
    }
}

/// Register the API routes on an actix app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index_handler))
        // `.*` so that an empty id reaches the handler and is rejected as malformed
        .route("/order/{id:.*}", web::get().to(order_handler));
}

/// Bind the API server; the returned server must be awaited or spawned.
pub fn start_api_server(query: Arc<QueryService>, addr: &str) -> std::io::Result<Server> {
    tracing::info!("🌐 Starting API server on http://{}", addr);

    let query = web::Data::from(query);
    let server = HttpServer::new(move || App::new().app_data(query.clone()).configure(configure))
        .disable_signals()
        .bind(addr)?
        .run();

    Ok(server)
}

async fn index_handler() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_HTML)
}

async fn order_handler(
    query: web::Data<QueryService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let raw_id = path.into_inner();
    let order = query.get(&raw_id).await?;

    let body = serde_json::to_string_pretty(&*order).map_err(|e| {
        tracing::error!(order_id = %order.id(), error = %e, "Failed to encode order");
        ApiError::Internal
    })?;

    Ok(HttpResponse::Ok()
        .content_type("application/json")
        .body(body))
}
