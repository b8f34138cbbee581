//! Per-request context and surface reflection.
//!
//! Every request carries a `BridgedContext` extension holding the bridged
//! request/response pair and per-request locals. `reflect` derives an
//! application-level handle from an existing pair, reusing the pair's actual
//! surfaces rather than the canonical ones, so a pair bridged with a custom
//! surface yields a matching app handle.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value};

use super::handle::BridgedHandle;
use super::surface::CapabilityDescriptorSet;

/// Application-level view over a bridged pair.
pub struct AppHandle {
    request_proto: Arc<CapabilityDescriptorSet>,
    response_proto: Arc<CapabilityDescriptorSet>,
    reflected: bool,
}

impl AppHandle {
    pub fn request_proto(&self) -> &Arc<CapabilityDescriptorSet> {
        &self.request_proto
    }

    pub fn response_proto(&self) -> &Arc<CapabilityDescriptorSet> {
        &self.response_proto
    }

    /// True when this handle was derived from a live pair instead of the
    /// canonical surfaces.
    pub fn reflected(&self) -> bool {
        self.reflected
    }
}

/// Derive an app handle from the surfaces a pair actually delegates to.
pub fn reflect(request: &BridgedHandle, response: &BridgedHandle) -> AppHandle {
    AppHandle {
        request_proto: request.descriptors(),
        response_proto: response.descriptors(),
        reflected: true,
    }
}

/// Mutable per-request state shared down the middleware chain.
pub struct RequestContext {
    pub request: BridgedHandle,
    pub response: BridgedHandle,
    pub app: Option<AppHandle>,
    pub locals: Map<String, Value>,
}

impl RequestContext {
    pub fn new(request: BridgedHandle, response: BridgedHandle) -> Self {
        Self {
            request,
            response,
            app: None,
            locals: Map::new(),
        }
    }

    /// The app handle for this pair, derived on first use.
    pub fn app(&mut self) -> &AppHandle {
        if self.app.is_none() {
            self.app = Some(reflect(&self.request, &self.response));
        }
        self.app.as_ref().unwrap()
    }
}

/// Shared handle to the request context, inserted as a request extension by
/// the transport adapter.
#[derive(Clone)]
pub struct BridgedContext(Arc<Mutex<RequestContext>>);

impl BridgedContext {
    pub fn new(context: RequestContext) -> Self {
        Self(Arc::new(Mutex::new(context)))
    }

    pub fn lock(&self) -> MutexGuard<'_, RequestContext> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
