//! Failure model for the bootstrap sequence and for request handling.
//!
//! Two layers live here: [`ErrorEnvelope`], the structured representation of
//! an application-level failure that the translation middleware understands,
//! and [`AbortReason`], the startup taxonomy returned by the sequencer.

mod abort;
mod envelope;

pub use abort::AbortReason;
pub use envelope::{Cause, EnvelopeKind, ErrorEnvelope};

/// Boxed error used wherever a failure may be foreign to the envelope model.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
