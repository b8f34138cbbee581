//! Dual-protocol capability bridge.
//!
//! Requests can arrive over two transports with different native object
//! models. This module gives handlers one uniform surface: immutable
//! per-archetype descriptor sets, bridged handles that delegate to them, and
//! an adapter layer that installs a bridged pair on every request.

mod adapter;
mod handle;
mod native;
mod reflect;
mod surface;

pub use adapter::{bridge, AdapterSettings};
pub use handle::BridgedHandle;
pub use native::NativeMessage;
pub use reflect::{reflect, AppHandle, BridgedContext, RequestContext};
pub use surface::{
    descriptor_set, Archetype, Capability, CapabilityDescriptorSet, PrototypeLevel,
    TRANSPORT_IDENTITY,
};
