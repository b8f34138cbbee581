//! Unhandled-error translation.
//!
//! Handlers never build error responses themselves; they park the failure in
//! an [`Unhandled`] response extension and the two layers here turn it into
//! wire output. `json_error` refines the status, logs, and answers JSON
//! clients; anything it does not claim falls through to `fallback_error`,
//! which writes the last-resort representation. The split mirrors the layer
//! order: `fallback_error` sits outside `json_error`, so a deferral is just
//! a response that still carries the extension.

use std::io;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use futures_util::stream;
use tracing::{error, warn};

use crate::bridge::BridgedContext;
use crate::config::ErrorLogLevel;
use crate::error::{EnvelopeKind, ErrorEnvelope};

/// An error a handler could not deal with, parked on the response for the
/// translation layers.
#[derive(Clone)]
pub struct Unhandled(pub Arc<dyn std::error::Error + Send + Sync>);

/// Representations offered to failing requests, preference order. HTML is
/// listed first but deliberately has no renderer here, so HTML-preferring
/// clients get the fallback representation.
const ERROR_OFFERS: &[&str] = &["text/html", "application/ld+json", "application/json"];

pub struct TranslateSettings {
    pub log_level: ErrorLogLevel,
    pub dump_exceptions: bool,
}

fn refine(envelope: &ErrorEnvelope, method: &Method, current: StatusCode) -> StatusCode {
    // start from the carried status, never below the error floor
    let mut status = if current.as_u16() < 400 {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        current
    };
    if *method == Method::GET {
        if let EnvelopeKind::PermissionDenied = envelope.kind() {
            status = StatusCode::FORBIDDEN;
        }
    }
    if let EnvelopeKind::NotFound = envelope.kind() {
        status = StatusCode::NOT_FOUND;
    }
    // an explicit status code in the details always wins
    if let Some(code) = envelope.http_status() {
        if let Ok(explicit) = StatusCode::from_u16(code) {
            status = explicit;
        }
    }
    status
}

fn log_unhandled(settings: &TranslateSettings, envelope: &ErrorEnvelope, status: StatusCode) {
    match settings.log_level {
        ErrorLogLevel::None => {}
        ErrorLogLevel::Summary => {
            error!(
                kind = envelope.kind().as_str(),
                message = envelope.message(),
                status = status.as_u16(),
                "unhandled error"
            );
        }
        ErrorLogLevel::Full => {
            error!(
                status = status.as_u16(),
                envelope = %envelope.to_log_value(),
                "unhandled error"
            );
        }
    }
}

/// Translate parked errors for JSON-speaking clients.
pub async fn json_error(
    settings: Arc<TranslateSettings>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let accept = request
        .headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let mut response = next.run(request).await;
    let Some(Unhandled(source)) = response.extensions().get::<Unhandled>().cloned() else {
        return response;
    };

    let envelope = match source.downcast_ref::<ErrorEnvelope>() {
        Some(envelope) => envelope.clone(),
        None => ErrorEnvelope::wrap_foreign(source),
    };

    let status = refine(&envelope, &method, response.status());
    *response.status_mut() = status;
    log_unhandled(&settings, &envelope, status);

    match crate::middleware::accept::preferred(accept.as_deref(), ERROR_OFFERS) {
        Some(media_type) if media_type != "text/html" => {
            let body = envelope.to_public_value().to_string();
            let (mut parts, _) = response.into_parts();
            parts.extensions.remove::<Unhandled>();
            // the placeholder body's framing no longer applies
            parts.headers.remove(header::CONTENT_LENGTH);
            parts.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(if media_type == "application/ld+json" {
                    "application/ld+json"
                } else {
                    "application/json"
                }),
            );
            parts.headers.insert(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            );
            Response::from_parts(parts, Body::from(body))
        }
        // HTML preferred or nothing acceptable: leave the extension in place
        // and let the outer layer render
        _ => {
            response
                .extensions_mut()
                .insert(Unhandled(Arc::new(envelope)));
            response
        }
    }
}

/// Last-resort error representation. Also the place where a failure after
/// the response head has been committed turns into a connection abort: the
/// head cannot be rewritten, so the body stream errors instead.
pub async fn fallback_error(
    settings: Arc<TranslateSettings>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let context = request.extensions().get::<BridgedContext>().cloned();

    let response = next.run(request).await;
    let Some(Unhandled(source)) = response.extensions().get::<Unhandled>().cloned() else {
        return response;
    };

    let headers_sent = context
        .as_ref()
        .map(|ctx| ctx.lock().response.headers_sent())
        .unwrap_or(false);
    if headers_sent {
        warn!("error raised after response head was committed, aborting connection");
        let (mut parts, _) = response.into_parts();
        parts.headers.remove(header::CONTENT_LENGTH);
        let aborted = stream::once(async {
            Err::<Bytes, io::Error>(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "response already committed",
            ))
        });
        return Response::from_parts(parts, Body::from_stream(aborted));
    }

    let status = response.status();
    let (mut parts, _) = response.into_parts();
    parts.extensions.remove::<Unhandled>();
    parts.headers.remove(header::CONTENT_LENGTH);

    if settings.dump_exceptions {
        let detail = source
            .downcast_ref::<ErrorEnvelope>()
            .map(|envelope| envelope.to_log_value().to_string())
            .unwrap_or_else(|| source.to_string());
        let page = format!(
            "<!DOCTYPE html><html><head><title>{status}</title></head>\
             <body><h1>{status}</h1><pre>{detail}</pre></body></html>",
        );
        parts
            .headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        return Response::from_parts(parts, Body::from(page));
    }

    // a public envelope may disclose its message; everything else gets the
    // reason phrase
    let text = source
        .downcast_ref::<ErrorEnvelope>()
        .filter(|envelope| envelope.is_public())
        .map(|envelope| envelope.message().to_string())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Error").to_string());
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    Response::from_parts(parts, Body::from(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{bridge, AdapterSettings, BridgedContext};
    use axum::middleware;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn not_found() -> ErrorEnvelope {
        ErrorEnvelope::new(EnvelopeKind::NotFound, "no such widget")
    }

    fn settings() -> Arc<TranslateSettings> {
        Arc::new(TranslateSettings {
            log_level: ErrorLogLevel::None,
            dump_exceptions: false,
        })
    }

    fn parked(envelope: ErrorEnvelope) -> Response {
        let mut response = Response::new(Body::empty());
        response
            .extensions_mut()
            .insert(Unhandled(Arc::new(envelope)));
        response
    }

    #[tokio::test]
    async fn replaced_bodies_drop_the_placeholder_content_length() {
        let settings = settings();
        let router = Router::new()
            .route(
                "/broken",
                get(|| async {
                    let mut response = parked(
                        ErrorEnvelope::new(EnvelopeKind::UnknownError, "boom").public(true),
                    );
                    response
                        .headers_mut()
                        .insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
                    response
                }),
            )
            .layer(middleware::from_fn(move |request, next| {
                json_error(settings.clone(), request, next)
            }));
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/broken")
                    .header(header::ACCEPT, "application/json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        // the zero-length placeholder framing must not survive the rewrite
        assert!(response.headers().get(header::CONTENT_LENGTH).is_none());
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "boom");
    }

    #[tokio::test]
    async fn failures_after_a_committed_head_abort_the_body_stream() {
        let settings = settings();
        let adapter = Arc::new(AdapterSettings {
            trust_proxy: false,
            secure: false,
        });
        let router = Router::new()
            .route(
                "/late",
                get(|request: Request<Body>| async move {
                    let context = request
                        .extensions()
                        .get::<BridgedContext>()
                        .expect("bridged context")
                        .clone();
                    // the head already went out before the failure surfaced
                    context.lock().response.call("end", &[]);
                    parked(ErrorEnvelope::new(
                        EnvelopeKind::UnknownError,
                        "write raced the handler",
                    ))
                }),
            )
            .layer(middleware::from_fn(move |request, next| {
                fallback_error(settings.clone(), request, next)
            }))
            .layer(middleware::from_fn(move |request, next| {
                bridge(adapter.clone(), request, next)
            }));
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/late")
                    .header(header::HOST, "localhost")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        // the body stream errors so the transport tears the connection down
        assert!(axum::body::to_bytes(response.into_body(), 1024).await.is_err());
    }

    #[test]
    fn successful_placeholder_status_is_refined_to_server_error() {
        let envelope = ErrorEnvelope::new(EnvelopeKind::UnknownError, "boom");
        assert_eq!(
            refine(&envelope, &Method::POST, StatusCode::OK),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn permission_denied_on_get_maps_to_forbidden() {
        let envelope = ErrorEnvelope::new(EnvelopeKind::PermissionDenied, "nope");
        assert_eq!(
            refine(&envelope, &Method::GET, StatusCode::OK),
            StatusCode::FORBIDDEN
        );
        // only safe reads get the mapping
        assert_eq!(
            refine(&envelope, &Method::POST, StatusCode::OK),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_maps_regardless_of_method() {
        assert_eq!(
            refine(&not_found(), &Method::DELETE, StatusCode::OK),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn explicit_status_detail_always_wins() {
        let envelope = not_found().http_status_code(410);
        assert_eq!(
            refine(&envelope, &Method::GET, StatusCode::OK),
            StatusCode::GONE
        );
    }
}
