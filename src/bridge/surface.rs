//! Capability surfaces and descriptor sets.
//!
//! Each archetype (request, response) has a reference surface expressed as an
//! ordered list of immutable prototype levels, most-derived first. The full
//! descriptor set for an archetype is computed at most once per process by
//! merging the levels (more-derived definitions win) and stripping the
//! transport-identity properties that must always reflect the live
//! connection. The merged set is therefore a superset of what any one target
//! needs; per-target exclusion happens at lookup time, never in the cache.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde_json::{json, Value};

use super::native::NativeMessage;
use crate::middleware::accept;

/// One of the two canonical object roles whose surface can be bridged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Archetype {
    Request,
    Response,
}

/// Accessor or value definition for one surface property.
#[derive(Clone)]
pub enum Capability {
    /// Constant value.
    Value(Value),
    /// Computed from the live target.
    Getter(fn(&NativeMessage) -> Value),
    /// Callable against the live target.
    Method(fn(&mut NativeMessage, &[Value]) -> Value),
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Capability::Getter(_) => f.write_str("Getter"),
            Capability::Method(_) => f.write_str("Method"),
        }
    }
}

/// One level of a reference surface.
pub struct PrototypeLevel {
    pub name: &'static str,
    pub entries: Vec<(&'static str, Capability)>,
}

/// Immutable mapping from property name to definition for one archetype.
#[derive(Debug)]
pub struct CapabilityDescriptorSet {
    entries: BTreeMap<&'static str, Capability>,
}

impl CapabilityDescriptorSet {
    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }
}

/// Properties that must never come from the cached surface: they carry the
/// real network identity of the connection.
pub const TRANSPORT_IDENTITY: &[&str] = &["host", "remote_addr", "remote_addrs"];

static REQUEST_SET: OnceLock<Arc<CapabilityDescriptorSet>> = OnceLock::new();
static RESPONSE_SET: OnceLock<Arc<CapabilityDescriptorSet>> = OnceLock::new();

/// The memoized descriptor set for an archetype. The first computation wins;
/// concurrent computations are idempotent and discardable.
pub fn descriptor_set(archetype: Archetype) -> Arc<CapabilityDescriptorSet> {
    let cell = match archetype {
        Archetype::Request => &REQUEST_SET,
        Archetype::Response => &RESPONSE_SET,
    };
    cell.get_or_init(|| Arc::new(compute(archetype))).clone()
}

fn compute(archetype: Archetype) -> CapabilityDescriptorSet {
    let levels = match archetype {
        Archetype::Request => request_levels(),
        Archetype::Response => response_levels(),
    };
    // merge least-derived first so more-derived definitions win
    let mut entries = BTreeMap::new();
    for level in levels.iter().rev() {
        for (name, capability) in &level.entries {
            entries.insert(*name, capability.clone());
        }
    }
    for name in TRANSPORT_IDENTITY {
        entries.remove(name);
    }
    CapabilityDescriptorSet { entries }
}

fn request_levels() -> Vec<PrototypeLevel> {
    vec![
        PrototypeLevel {
            name: "app.request",
            entries: vec![
                ("protocol", Capability::Getter(request_protocol)),
                ("secure", Capability::Getter(request_secure)),
                ("ip", Capability::Getter(request_ip)),
                ("ips", Capability::Getter(request_ips)),
                ("hostname", Capability::Getter(request_hostname)),
                ("path", Capability::Getter(request_path)),
                ("get", Capability::Method(request_get_header)),
                ("accepts", Capability::Method(request_accepts)),
                ("is", Capability::Method(request_is)),
            ],
        },
        PrototypeLevel {
            name: "incoming",
            entries: vec![
                ("method", Capability::Getter(field_method)),
                ("url", Capability::Getter(field_url)),
                ("http_version", Capability::Getter(field_http_version)),
                ("headers", Capability::Getter(field_headers)),
                // less-derived `protocol` is shadowed by app.request above
                ("protocol", Capability::Getter(field_scheme)),
                ("host", Capability::Getter(field_host)),
                ("remote_addr", Capability::Getter(field_remote_addr)),
                ("remote_addrs", Capability::Getter(field_remote_addrs)),
            ],
        },
    ]
}

fn response_levels() -> Vec<PrototypeLevel> {
    vec![
        PrototypeLevel {
            name: "app.response",
            entries: vec![
                ("status", Capability::Method(response_status)),
                ("set", Capability::Method(response_set_header)),
                ("get", Capability::Method(response_get_header)),
                ("json", Capability::Method(response_json)),
                ("send", Capability::Method(response_send)),
                ("vary", Capability::Method(response_vary)),
            ],
        },
        PrototypeLevel {
            name: "outgoing",
            entries: vec![
                ("status_code", Capability::Getter(field_status_code)),
                ("headers_sent", Capability::Getter(field_headers_sent)),
                ("headers", Capability::Getter(field_headers)),
                ("write_head", Capability::Method(response_write_head)),
                ("end", Capability::Method(response_end)),
            ],
        },
    ]
}

// --- request accessors ---

fn header_of(message: &NativeMessage, name: &str) -> Option<String> {
    message
        .field("headers")
        .and_then(Value::as_object)
        .and_then(|headers| headers.get(name))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn trusts_proxy(message: &NativeMessage) -> bool {
    message
        .field("trust_proxy")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn request_protocol(message: &NativeMessage) -> Value {
    if trusts_proxy(message) {
        if let Some(proto) = header_of(message, "x-forwarded-proto") {
            let first = proto.split(',').next().unwrap_or("").trim();
            if !first.is_empty() {
                return Value::String(first.to_string());
            }
        }
    }
    field_scheme(message)
}

fn request_secure(message: &NativeMessage) -> Value {
    Value::Bool(request_protocol(message).as_str() == Some("https"))
}

fn request_ip(message: &NativeMessage) -> Value {
    if trusts_proxy(message) {
        if let Some(forwarded) = header_of(message, "x-forwarded-for") {
            if let Some(first) = forwarded.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return Value::String(first.to_string());
                }
            }
        }
    }
    message.field("remote_addr").cloned().unwrap_or(Value::Null)
}

fn request_ips(message: &NativeMessage) -> Value {
    if trusts_proxy(message) {
        if let Some(forwarded) = header_of(message, "x-forwarded-for") {
            let ips: Vec<Value> = forwarded
                .split(',')
                .map(|ip| Value::String(ip.trim().to_string()))
                .collect();
            return Value::Array(ips);
        }
    }
    json!([])
}

fn request_hostname(message: &NativeMessage) -> Value {
    match header_of(message, "host") {
        Some(host) => {
            let name = host.rsplit_once(':').map_or(host.as_str(), |(h, _)| h);
            Value::String(name.to_string())
        }
        None => Value::Null,
    }
}

fn request_path(message: &NativeMessage) -> Value {
    match message.field("url").and_then(Value::as_str) {
        Some(url) => Value::String(url.split('?').next().unwrap_or("").to_string()),
        None => Value::Null,
    }
}

fn request_get_header(message: &mut NativeMessage, args: &[Value]) -> Value {
    let Some(name) = args.first().and_then(Value::as_str) else {
        return Value::Null;
    };
    header_of(message, &name.to_ascii_lowercase())
        .map(Value::String)
        .unwrap_or(Value::Null)
}

fn request_accepts(message: &mut NativeMessage, args: &[Value]) -> Value {
    let offers: Vec<&str> = args.iter().filter_map(Value::as_str).collect();
    let accept = header_of(message, "accept");
    match accept::preferred(accept.as_deref(), &offers) {
        Some(media_type) => Value::String(media_type.to_string()),
        None => Value::Bool(false),
    }
}

fn request_is(message: &mut NativeMessage, args: &[Value]) -> Value {
    let patterns: Vec<&str> = args.iter().filter_map(Value::as_str).collect();
    let content_type = header_of(message, "content-type");
    Value::Bool(accept::type_is(content_type.as_deref(), &patterns))
}

// --- response accessors ---

fn response_status(message: &mut NativeMessage, args: &[Value]) -> Value {
    if let Some(code) = args.first().and_then(Value::as_u64) {
        message.set_field("status_code", json!(code));
    }
    Value::Null
}

fn response_set_header(message: &mut NativeMessage, args: &[Value]) -> Value {
    if let (Some(name), Some(value)) = (
        args.first().and_then(Value::as_str).map(str::to_ascii_lowercase),
        args.get(1).cloned(),
    ) {
        message.set_header(&name, value);
    }
    Value::Null
}

fn response_get_header(message: &mut NativeMessage, args: &[Value]) -> Value {
    let Some(name) = args.first().and_then(Value::as_str) else {
        return Value::Null;
    };
    header_of(message, &name.to_ascii_lowercase())
        .map(Value::String)
        .unwrap_or(Value::Null)
}

fn response_json(message: &mut NativeMessage, args: &[Value]) -> Value {
    let body = args.first().cloned().unwrap_or(Value::Null);
    message.set_header("content-type", json!("application/json"));
    message.set_field("body", Value::String(body.to_string()));
    Value::Null
}

fn response_send(message: &mut NativeMessage, args: &[Value]) -> Value {
    let body = match args.first() {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    message.set_field("body", Value::String(body));
    Value::Null
}

fn response_vary(message: &mut NativeMessage, args: &[Value]) -> Value {
    if let Some(name) = args.first().and_then(Value::as_str) {
        let varied = match header_of(message, "vary") {
            Some(existing) if !existing.is_empty() => format!("{existing}, {name}"),
            _ => name.to_string(),
        };
        message.set_header("vary", Value::String(varied));
    }
    Value::Null
}

fn response_write_head(message: &mut NativeMessage, args: &[Value]) -> Value {
    if let Some(code) = args.first().and_then(Value::as_u64) {
        message.set_field("status_code", json!(code));
    }
    message.set_field("headers_sent", Value::Bool(true));
    Value::Null
}

fn response_end(message: &mut NativeMessage, _args: &[Value]) -> Value {
    message.set_field("headers_sent", Value::Bool(true));
    message.set_field("finished", Value::Bool(true));
    Value::Null
}

/// Version-1 compatible implicit header send: write the head with the
/// current status code. Installed per-handle when the surface lacks it.
pub(super) fn implicit_header_send(message: &mut NativeMessage, _args: &[Value]) -> Value {
    let code = message
        .field("status_code")
        .cloned()
        .unwrap_or(json!(200));
    response_write_head(message, &[code])
}

// --- shared field getters ---

fn field_getter(message: &NativeMessage, name: &str) -> Value {
    message.field(name).cloned().unwrap_or(Value::Null)
}

fn field_method(m: &NativeMessage) -> Value {
    field_getter(m, "method")
}
fn field_url(m: &NativeMessage) -> Value {
    field_getter(m, "url")
}
fn field_http_version(m: &NativeMessage) -> Value {
    field_getter(m, "http_version")
}
fn field_headers(m: &NativeMessage) -> Value {
    field_getter(m, "headers")
}
fn field_scheme(m: &NativeMessage) -> Value {
    field_getter(m, "scheme")
}
fn field_host(m: &NativeMessage) -> Value {
    field_getter(m, "host")
}
fn field_remote_addr(m: &NativeMessage) -> Value {
    field_getter(m, "remote_addr")
}
fn field_remote_addrs(m: &NativeMessage) -> Value {
    field_getter(m, "remote_addrs")
}
fn field_status_code(m: &NativeMessage) -> Value {
    field_getter(m, "status_code")
}
fn field_headers_sent(m: &NativeMessage) -> Value {
    field_getter(m, "headers_sent")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_set_is_computed_once_per_archetype() {
        let first = descriptor_set(Archetype::Request);
        let second = descriptor_set(Archetype::Request);
        assert!(Arc::ptr_eq(&first, &second));

        let response = descriptor_set(Archetype::Response);
        assert!(!Arc::ptr_eq(&first, &response));
    }

    #[test]
    fn transport_identity_properties_are_stripped() {
        let set = descriptor_set(Archetype::Request);
        for name in TRANSPORT_IDENTITY {
            assert!(!set.contains(name), "{name} must not be cached");
        }
        assert!(set.contains("hostname"));
        assert!(set.contains("method"));
    }

    #[test]
    fn more_derived_definitions_win_on_merge() {
        // `protocol` is defined on both levels; the app-level getter (which
        // honors forwarding headers) must win over the raw scheme field.
        let set = descriptor_set(Archetype::Request);
        let Some(Capability::Getter(getter)) = set.get("protocol") else {
            panic!("protocol must be a getter");
        };
        let mut message = NativeMessage::request_for_test();
        message.set_field("trust_proxy", Value::Bool(true));
        message.set_header("x-forwarded-proto", json!("https"));
        assert_eq!(getter(&message), json!("https"));
    }

    #[test]
    fn response_surface_has_no_implicit_header_send() {
        // presence is guaranteed per-handle by the adapter, not by the cache
        let set = descriptor_set(Archetype::Response);
        assert!(!set.contains("implicit_header_send"));
        assert!(set.contains("write_head"));
    }
}
