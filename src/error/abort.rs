//! Startup failure taxonomy.
//!
//! Startup failures are never retried: a failing listener or a canceled
//! readiness gate leaves the transport unattached and the process is expected
//! to treat the abort as fatal.

use thiserror::Error;

use super::BoxError;

/// Why a bootstrap run stopped before attaching to the transport.
#[derive(Debug, Error)]
pub enum AbortReason {
    /// Invalid or missing configuration, fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A listener failed; the sequence stops immediately with no rollback of
    /// already-installed middleware.
    #[error("listener failed during `{phase}`: {source}")]
    Listener {
        phase: &'static str,
        #[source]
        source: BoxError,
    },

    /// A readiness gate was canceled; the transport is never attached.
    #[error("startup canceled at readiness gate `{phase}`")]
    Gate { phase: &'static str },

    /// The sequence runs exactly once per process lifetime.
    #[error("bootstrap sequence has already run")]
    AlreadyRan,

    /// Attaching the handler chain to the listener failed.
    #[error("failed to attach to transport: {0}")]
    Transport(#[from] std::io::Error),
}
