//! Transport adapter middleware.
//!
//! Outermost layer of the request pipeline. For every request it builds the
//! bridged request/response pair and stores it in a `BridgedContext`
//! extension. Version-2 requests carry their authority in the URI rather
//! than a Host header, so one is synthesized before the target is built;
//! everything downstream then sees a uniform surface regardless of protocol
//! version.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderValue, Request, Version};
use axum::middleware::Next;
use axum::response::Response;
use tracing::trace;

use super::handle::BridgedHandle;
use super::native::NativeMessage;
use super::reflect::{BridgedContext, RequestContext};

/// Immutable adapter parameters, fixed at router build time.
pub struct AdapterSettings {
    /// Honor forwarding headers when deriving ip and protocol.
    pub trust_proxy: bool,
    /// The transport the router is attached to terminates TLS.
    pub secure: bool,
}

pub async fn bridge(
    settings: Arc<AdapterSettings>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let version = request.version();
    if version == Version::HTTP_2 && !request.headers().contains_key(header::HOST) {
        if let Some(authority) = request.uri().authority() {
            if let Ok(value) = HeaderValue::from_str(authority.as_str()) {
                trace!(authority = %authority, "synthesized host header");
                request.headers_mut().insert(header::HOST, value);
            }
        }
    }

    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let request_target = NativeMessage::from_request(
        &request,
        remote_addr,
        settings.secure,
        settings.trust_proxy,
    );
    let response_target = NativeMessage::response();

    // Version-2 targets get a composed surface; version-1 targets keep live
    // delegation through their link.
    let (bridged_request, mut bridged_response) = if version == Version::HTTP_2 {
        (
            BridgedHandle::augment(request_target),
            BridgedHandle::augment(response_target),
        )
    } else {
        (
            BridgedHandle::linked(request_target),
            BridgedHandle::linked(response_target),
        )
    };
    bridged_response.ensure_implicit_header_send();

    let context = BridgedContext::new(RequestContext::new(bridged_request, bridged_response));
    request.extensions_mut().insert(context);

    next.run(request).await
}
