//! Fallible route handlers.
//!
//! Route code returns `Result`; the adapter here parks any error on the
//! response as an [`Unhandled`] extension instead of rendering it, keeping
//! error representation in the translation layers.

use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use super::translate::Unhandled;
use crate::error::BoxError;

/// A fallible request handler, as stored in the install plan.
pub type RouteHandler =
    Arc<dyn Fn(Request<Body>) -> BoxFuture<'static, Result<Response, BoxError>> + Send + Sync>;

/// Box a fallible async closure into a [`RouteHandler`].
pub fn route_handler<F, Fut, R>(f: F) -> RouteHandler
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, BoxError>> + Send + 'static,
    R: IntoResponse,
{
    Arc::new(move |request| {
        let fut = f(request);
        async move { fut.await.map(IntoResponse::into_response) }.boxed()
    })
}

/// Adapt a [`RouteHandler`] into an infallible axum handler. Errors become
/// an empty placeholder response carrying the [`Unhandled`] extension.
pub(crate) fn into_infallible(
    handler: RouteHandler,
) -> impl Fn(Request<Body>) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static {
    move |request| {
        let handler = Arc::clone(&handler);
        async move {
            match handler(request).await {
                Ok(response) => response,
                Err(error) => {
                    let mut placeholder = Response::new(Body::empty());
                    placeholder
                        .extensions_mut()
                        .insert(Unhandled(Arc::from(error)));
                    placeholder
                }
            }
        }
        .boxed()
    }
}
