//! gRPC-Web bridge over the primary server's routes.
//!
//! # Responsibilities
//! - Translate browser-compatible gRPC-Web framing to the registered services
//! - Answer CORS for every path, registered or not, from any origin
//! - Accept non-root resource paths (`/api/pkg.Service/Method`)
//!
//! ```text
//! HTTP request
//!     → TraceLayer
//!     → CorsLayer (preflight answered here)
//!     → strip_resource_prefix (gRPC-Web only)
//!     → GrpcWebService → Routes (same services as the primary server)
//! ```

use std::time::Duration;

use axum::extract::Request;
use axum::http::header::CONTENT_TYPE;
use axum::http::uri::PathAndQuery;
use axum::http::{HeaderMap, HeaderName, Uri};
use axum::Router;
use tonic::service::Routes;
use tonic_web::GrpcWebLayer;
use tower::Layer;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

const GRPC_WEB_CONTENT_TYPE: &str = "application/grpc-web";
const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Build the bridge application for `routes`.
pub fn bridge_router(routes: Routes) -> Router {
    let grpc_web = GrpcWebLayer::new().layer(routes);

    Router::new()
        .fallback_service(grpc_web)
        .layer(axum::middleware::map_request(strip_resource_prefix))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

/// Permissive CORS: any origin, any header, any method.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .expose_headers([
            HeaderName::from_static("grpc-status"),
            HeaderName::from_static("grpc-message"),
            HeaderName::from_static("grpc-status-details-bin"),
        ])
        .max_age(PREFLIGHT_MAX_AGE)
}

fn is_grpc_web(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with(GRPC_WEB_CONTENT_TYPE))
}

/// `/a/b/pkg.Service/Method` → `/pkg.Service/Method`. `None` when the path
/// already has at most two segments.
pub(crate) fn root_resource_path(path: &str) -> Option<String> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [_, .., service, method] => Some(format!("/{}/{}", service, method)),
        _ => None,
    }
}

async fn strip_resource_prefix(mut req: Request) -> Request {
    if !is_grpc_web(req.headers()) {
        return req;
    }
    let Some(path) = root_resource_path(req.uri().path()) else {
        return req;
    };

    let path_and_query = match req.uri().query() {
        Some(query) => format!("{}?{}", path, query),
        None => path,
    };
    let mut parts = req.uri().clone().into_parts();
    match PathAndQuery::try_from(path_and_query) {
        Ok(pq) => {
            parts.path_and_query = Some(pq);
            match Uri::from_parts(parts) {
                Ok(uri) => {
                    tracing::trace!(from = %req.uri(), to = %uri, "Rewrote non-root resource path");
                    *req.uri_mut() = uri;
                }
                Err(e) => tracing::debug!(error = %e, "Keeping original request path"),
            }
        }
        Err(e) => tracing::debug!(error = %e, "Keeping original request path"),
    }
    req
}
