//! Bridged handles.
//!
//! A `BridgedHandle` joins a native target with a capability surface. Lookup
//! order is fixed: the target's own fields win, then per-handle additions,
//! then the shared descriptor set. Properties the adapter excluded for this
//! handle never fall through to the shared set, so a transport that provides
//! its own version of a capability keeps it.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use super::native::NativeMessage;
use super::surface::{self, Capability, CapabilityDescriptorSet};

enum SurfaceLink {
    /// Surface composed in at bridge time (dual-protocol path).
    Composed(Arc<CapabilityDescriptorSet>),
    /// Surface resolved through the target's live link (single-protocol
    /// path, established by `NativeMessage::relink`).
    Linked,
}

pub struct BridgedHandle {
    target: NativeMessage,
    link: SurfaceLink,
    extras: BTreeMap<&'static str, Capability>,
    excluded: Vec<&'static str>,
}

impl BridgedHandle {
    /// Compose the archetype's descriptor set onto the target.
    pub fn augment(target: NativeMessage) -> Self {
        let set = surface::descriptor_set(target.role());
        Self {
            target,
            link: SurfaceLink::Composed(set),
            extras: BTreeMap::new(),
            excluded: Vec::new(),
        }
    }

    /// Wrap a target whose link was already pointed at its surface.
    pub fn linked(mut target: NativeMessage) -> Self {
        if target.link().is_none() {
            let role = target.role();
            target.relink(role);
        }
        Self {
            target,
            link: SurfaceLink::Linked,
            extras: BTreeMap::new(),
            excluded: Vec::new(),
        }
    }

    /// Exclude surface properties the target provides natively.
    pub fn with_exclusions(mut self, names: &[&'static str]) -> Self {
        self.excluded.extend_from_slice(names);
        self
    }

    /// The surface this handle delegates to.
    pub fn descriptors(&self) -> Arc<CapabilityDescriptorSet> {
        match &self.link {
            SurfaceLink::Composed(set) => Arc::clone(set),
            SurfaceLink::Linked => {
                let archetype = self.target.link().unwrap_or(self.target.role());
                surface::descriptor_set(archetype)
            }
        }
    }

    pub fn target(&self) -> &NativeMessage {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut NativeMessage {
        &mut self.target
    }

    fn capability(&self, name: &str) -> Option<Capability> {
        if let Some(extra) = self.extras.get(name) {
            return Some(extra.clone());
        }
        if self.excluded.iter().any(|excluded| *excluded == name) {
            return None;
        }
        self.descriptors().get(name).cloned()
    }

    /// Read a property. Own fields shadow the surface.
    pub fn get(&self, name: &str) -> Value {
        if let Some(own) = self.target.field(name) {
            return own.clone();
        }
        match self.capability(name) {
            Some(Capability::Value(value)) => value,
            Some(Capability::Getter(getter)) => getter(&self.target),
            Some(Capability::Method(_)) | None => Value::Null,
        }
    }

    /// Invoke a callable property against the target. Returns `None` when
    /// the handle has no such capability.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Option<Value> {
        match self.capability(name)? {
            Capability::Method(method) => Some(method(&mut self.target, args)),
            Capability::Value(_) | Capability::Getter(_) => None,
        }
    }

    pub fn has_method(&self, name: &str) -> bool {
        matches!(self.capability(name), Some(Capability::Method(_)))
    }

    /// Guarantee the version-1 implicit header send capability on this
    /// handle. Handles whose surface already carries it are left alone; the
    /// shared descriptor set is never touched.
    pub fn ensure_implicit_header_send(&mut self) {
        if !self.has_method("implicit_header_send") {
            self.extras.insert(
                "implicit_header_send",
                Capability::Method(surface::implicit_header_send),
            );
        }
    }

    /// Whether the response head has gone out on the wire.
    pub fn headers_sent(&self) -> bool {
        self.target
            .field("headers_sent")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
