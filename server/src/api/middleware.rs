//! Response middleware
//!
//! Medical data must not be cached by browsers or proxies, and problem documents
//! get the request path as `instance` plus, in development, the error chain.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};

use super::AppState;
use crate::error::{ErrorStack, ProblemDetails};

pub async fn add_no_store_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
        .headers_mut()
        .insert(header::PRAGMA, HeaderValue::from_static("no-cache"));

    response
}

pub async fn enrich_problem_details(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let instance = request.uri().path().to_string();
    let response = next.run(request).await;

    let Some(ErrorStack(stack)) = response.extensions().get::<ErrorStack>().cloned() else {
        return response;
    };

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to buffer problem document");
            return Response::from_parts(parts, Body::empty());
        }
    };

    let Ok(mut problem) = serde_json::from_slice::<ProblemDetails>(&bytes) else {
        return Response::from_parts(parts, Body::from(bytes));
    };
    problem.instance = Some(instance);
    if state.config.is_development() {
        problem.stack = Some(stack);
    }

    match serde_json::to_vec(&problem) {
        Ok(body) => {
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(body))
        }
        Err(_) => Response::from_parts(parts, Body::from(bytes)),
    }
}
