//! Native message targets.
//!
//! A `NativeMessage` is the transport-owned half of a bridged pair: a typed
//! property bag built from the live request or response plus a link slot
//! naming the reference surface it delegates to. Targets own their data;
//! surfaces never do.

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{Request, Version};
use serde_json::{json, Map, Value};

use super::surface::Archetype;

/// Property bag for one side of a bridged exchange.
#[derive(Debug, Clone)]
pub struct NativeMessage {
    role: Archetype,
    fields: Map<String, Value>,
    link: Option<Archetype>,
}

impl NativeMessage {
    /// Build the request-side target from the live request. Header names are
    /// lowercased; multi-valued headers are joined with `, `.
    pub fn from_request(
        request: &Request<Body>,
        remote_addr: Option<SocketAddr>,
        secure: bool,
        trust_proxy: bool,
    ) -> Self {
        let mut headers = Map::new();
        for name in request.headers().keys() {
            let joined = request
                .headers()
                .get_all(name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect::<Vec<_>>()
                .join(", ");
            headers.insert(name.as_str().to_ascii_lowercase(), Value::String(joined));
        }

        let mut fields = Map::new();
        fields.insert("method".into(), json!(request.method().as_str()));
        fields.insert(
            "url".into(),
            json!(request
                .uri()
                .path_and_query()
                .map_or_else(|| request.uri().path(), |pq| pq.as_str())),
        );
        fields.insert(
            "http_version".into(),
            json!(match request.version() {
                Version::HTTP_2 => "2.0",
                Version::HTTP_10 => "1.0",
                _ => "1.1",
            }),
        );
        fields.insert("scheme".into(), json!(if secure { "https" } else { "http" }));
        fields.insert("trust_proxy".into(), json!(trust_proxy));
        if let Some(host) = headers.get("host").cloned() {
            fields.insert("host".into(), host);
        }
        if let Some(addr) = remote_addr {
            fields.insert("remote_addr".into(), json!(addr.ip().to_string()));
            fields.insert("remote_addrs".into(), json!([addr.ip().to_string()]));
        }
        fields.insert("headers".into(), Value::Object(headers));

        Self {
            role: Archetype::Request,
            fields,
            link: None,
        }
    }

    /// Build a fresh response-side target.
    pub fn response() -> Self {
        let mut fields = Map::new();
        fields.insert("status_code".into(), json!(200));
        fields.insert("headers".into(), Value::Object(Map::new()));
        fields.insert("headers_sent".into(), Value::Bool(false));
        fields.insert("finished".into(), Value::Bool(false));
        Self {
            role: Archetype::Response,
            fields,
            link: None,
        }
    }

    pub fn role(&self) -> Archetype {
        self.role
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    /// Set one entry in the `headers` object, creating it if absent.
    pub fn set_header(&mut self, name: &str, value: Value) {
        let headers = self
            .fields
            .entry("headers")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(map) = headers.as_object_mut() {
            map.insert(name.to_string(), value);
        }
    }

    pub fn header(&self, name: &str) -> Option<&Value> {
        self.fields
            .get("headers")
            .and_then(Value::as_object)
            .and_then(|headers| headers.get(name))
    }

    /// Point this target at a reference surface without composing a new
    /// object. This is the single-protocol path: delegation is live, so a
    /// later surface change would be visible here.
    pub fn relink(&mut self, archetype: Archetype) {
        self.link = Some(archetype);
    }

    pub fn link(&self) -> Option<Archetype> {
        self.link
    }

    #[cfg(test)]
    pub(crate) fn request_for_test() -> Self {
        let mut message = Self {
            role: Archetype::Request,
            fields: Map::new(),
            link: None,
        };
        message.set_field("method", json!("GET"));
        message.set_field("url", json!("/widgets?full=true"));
        message.set_field("scheme", json!("http"));
        message.set_field("http_version", json!("1.1"));
        message.set_field("headers", Value::Object(Map::new()));
        message.set_header("host", json!("example.test:8043"));
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_target_captures_transport_identity() {
        let request = Request::builder()
            .method("POST")
            .uri("https://example.test/ping?x=1")
            .header("host", "example.test")
            .header("x-custom", "a")
            .header("x-custom", "b")
            .body(Body::empty())
            .unwrap();
        let addr: SocketAddr = "10.0.0.9:52100".parse().unwrap();

        let message = NativeMessage::from_request(&request, Some(addr), true, false);
        assert_eq!(message.field("method"), Some(&json!("POST")));
        assert_eq!(message.field("url"), Some(&json!("/ping?x=1")));
        assert_eq!(message.field("scheme"), Some(&json!("https")));
        assert_eq!(message.field("remote_addr"), Some(&json!("10.0.0.9")));
        assert_eq!(message.header("x-custom"), Some(&json!("a, b")));
    }

    #[test]
    fn relink_points_at_a_surface_without_copying() {
        let mut message = NativeMessage::response();
        assert_eq!(message.link(), None);
        message.relink(Archetype::Response);
        assert_eq!(message.link(), Some(Archetype::Response));
        // data stays on the target
        assert_eq!(message.field("status_code"), Some(&json!(200)));
    }
}
