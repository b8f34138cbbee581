//! Structured application failures.
//!
//! An [`ErrorEnvelope`] carries a symbolic kind, a human message, a JSON
//! details map and at most one owned cause link. Two details keys are
//! interpreted by the translation layer: `httpStatusCode` (always overrides
//! any status inferred from the kind) and `public` (whether message and
//! details may be disclosed to the client).

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Map, Value};

/// Symbolic failure kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeKind {
    NotFound,
    PermissionDenied,
    /// A handle was used before its initialization phase completed.
    InvalidState,
    UnknownError,
    Other(String),
}

impl EnvelopeKind {
    pub fn as_str(&self) -> &str {
        match self {
            EnvelopeKind::NotFound => "NotFound",
            EnvelopeKind::PermissionDenied => "PermissionDenied",
            EnvelopeKind::InvalidState => "InvalidState",
            EnvelopeKind::UnknownError => "UnknownError",
            EnvelopeKind::Other(name) => name,
        }
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One owned cause link. Chains are non-cyclic by construction: each envelope
/// owns its cause outright.
#[derive(Clone)]
pub enum Cause {
    Envelope(Box<ErrorEnvelope>),
    Foreign(Arc<dyn std::error::Error + Send + Sync>),
}

impl fmt::Debug for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::Envelope(e) => f.debug_tuple("Envelope").field(e).finish(),
            Cause::Foreign(e) => f.debug_tuple("Foreign").field(&e.to_string()).finish(),
        }
    }
}

/// A typed failure value with a kind, message and structured details.
#[derive(Debug, Clone)]
pub struct ErrorEnvelope {
    kind: EnvelopeKind,
    message: String,
    details: Map<String, Value>,
    cause: Option<Cause>,
}

impl ErrorEnvelope {
    pub fn new(kind: EnvelopeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Map::new(),
            cause: None,
        }
    }

    /// Add one details entry.
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Shorthand for the `httpStatusCode` details entry.
    pub fn http_status_code(self, code: u16) -> Self {
        self.detail("httpStatusCode", code)
    }

    /// Shorthand for the `public` details entry.
    pub fn public(self, public: bool) -> Self {
        self.detail("public", public)
    }

    pub fn caused_by(mut self, cause: ErrorEnvelope) -> Self {
        self.cause = Some(Cause::Envelope(Box::new(cause)));
        self
    }

    pub fn caused_by_foreign(mut self, cause: Arc<dyn std::error::Error + Send + Sync>) -> Self {
        self.cause = Some(Cause::Foreign(cause));
        self
    }

    pub fn kind(&self) -> &EnvelopeKind {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }

    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }

    /// The `httpStatusCode` details entry, when present and in range.
    pub fn http_status(&self) -> Option<u16> {
        self.details
            .get("httpStatusCode")
            .and_then(Value::as_u64)
            .and_then(|code| u16::try_from(code).ok())
    }

    /// Whether message and details may be disclosed to the client.
    pub fn is_public(&self) -> bool {
        self.details
            .get("public")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Serialize for a client response. Non-public message and details are
    /// redacted; the kind is always included. The cause chain is never sent.
    pub fn to_public_value(&self) -> Value {
        if self.is_public() {
            json!({
                "message": self.message,
                "type": self.kind.as_str(),
                "details": Value::Object(self.details.clone()),
            })
        } else {
            json!({
                "message": "An error occurred.",
                "type": self.kind.as_str(),
                "details": {},
            })
        }
    }

    /// Serialize the complete envelope, cause chain included, for logging.
    pub fn to_log_value(&self) -> Value {
        let mut value = json!({
            "message": self.message,
            "type": self.kind.as_str(),
            "details": Value::Object(self.details.clone()),
        });
        if let Some(cause) = &self.cause {
            let cause_value = match cause {
                Cause::Envelope(e) => e.to_log_value(),
                Cause::Foreign(e) => json!({ "message": e.to_string(), "type": "Error" }),
            };
            value["cause"] = cause_value;
        }
        value
    }

    /// Wrap a failure that is not a recognized envelope so internal error
    /// shapes never leak to clients.
    pub fn wrap_foreign(error: Arc<dyn std::error::Error + Send + Sync>) -> Self {
        ErrorEnvelope::new(EnvelopeKind::UnknownError, "An error occurred.").caused_by_foreign(error)
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

// the std blanket impl covers `From<ErrorEnvelope> for BoxError`
impl std::error::Error for ErrorEnvelope {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.cause {
            Some(Cause::Envelope(e)) => Some(e.as_ref()),
            Some(Cause::Foreign(e)) => Some(e.as_ref()),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_detail_overrides_kind() {
        let envelope = ErrorEnvelope::new(EnvelopeKind::NotFound, "missing")
            .http_status_code(410);
        assert_eq!(envelope.http_status(), Some(410));
    }

    #[test]
    fn non_public_envelope_is_redacted() {
        let envelope = ErrorEnvelope::new(EnvelopeKind::PermissionDenied, "secret reason")
            .detail("userId", "abc123");
        let value = envelope.to_public_value();
        assert_eq!(value["message"], "An error occurred.");
        assert_eq!(value["type"], "PermissionDenied");
        assert!(value["details"].as_object().unwrap().is_empty());
    }

    #[test]
    fn public_envelope_discloses_message_and_details() {
        let envelope = ErrorEnvelope::new(EnvelopeKind::NotFound, "Not Found.")
            .public(true)
            .detail("resource", "/widgets/1");
        let value = envelope.to_public_value();
        assert_eq!(value["message"], "Not Found.");
        assert_eq!(value["details"]["resource"], "/widgets/1");
    }

    #[test]
    fn envelopes_convert_into_boxed_errors() {
        let boxed: crate::error::BoxError =
            ErrorEnvelope::new(EnvelopeKind::NotFound, "gone").into();
        assert!(boxed.downcast_ref::<ErrorEnvelope>().is_some());
    }

    #[test]
    fn cause_chain_appears_in_log_projection() {
        let inner = ErrorEnvelope::new(EnvelopeKind::UnknownError, "db timeout");
        let outer = ErrorEnvelope::new(EnvelopeKind::NotFound, "lookup failed").caused_by(inner);
        let value = outer.to_log_value();
        assert_eq!(value["cause"]["message"], "db timeout");
        assert!(value["cause"].get("cause").is_none());
    }
}
