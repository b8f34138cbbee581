//! Second-framework engine handle.
//!
//! In dual-protocol mode the version-2 engine starts inside its own
//! bootstrap phases. Until those complete, the engine must not be reachable:
//! the cell below holds an explicit not-ready state instead of a deferred
//! placeholder, and use before readiness is a typed failure, not a hang.

use std::net::SocketAddr;

use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{EnvelopeKind, ErrorEnvelope};

/// A running engine instance.
#[derive(Debug)]
pub struct Engine {
    local_addr: Option<SocketAddr>,
    shutdown: broadcast::Sender<()>,
}

impl Engine {
    pub fn new(local_addr: Option<SocketAddr>) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            local_addr,
            shutdown,
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    /// Signal every subscriber to stop. Idempotent; lagging receivers just
    /// observe a closed channel.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }
}

/// Slot that makes engine readiness explicit.
pub struct EngineCell {
    slot: ArcSwapOption<Engine>,
}

impl EngineCell {
    pub fn new() -> Self {
        Self {
            slot: ArcSwapOption::const_empty(),
        }
    }

    pub fn ready(&self) -> bool {
        self.slot.load().is_some()
    }

    /// Publish the engine. Later installs replace the handle atomically.
    pub fn install(&self, engine: Engine) {
        debug!(local_addr = ?engine.local_addr(), "engine installed");
        self.slot.store(Some(Arc::new(engine)));
    }

    /// The engine, or a typed failure when its init phase has not run.
    pub fn get(&self) -> Result<Arc<Engine>, ErrorEnvelope> {
        self.slot.load_full().ok_or_else(|| {
            ErrorEnvelope::new(EnvelopeKind::InvalidState, "Engine is not ready.")
        })
    }
}

impl Default for EngineCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn use_before_init_is_a_typed_failure() {
        let cell = EngineCell::new();
        assert!(!cell.ready());
        let err = cell.get().unwrap_err();
        assert_eq!(err.kind(), &EnvelopeKind::InvalidState);
        assert_eq!(err.message(), "Engine is not ready.");
    }

    #[test]
    fn install_makes_the_engine_reachable() {
        let cell = EngineCell::new();
        cell.install(Engine::new(None));
        assert!(cell.ready());
        assert!(cell.get().is_ok());
    }

    #[tokio::test]
    async fn shutdown_reaches_subscribers() {
        let engine = Engine::new(None);
        let mut receiver = engine.subscribe();
        engine.shutdown();
        assert!(receiver.recv().await.is_ok());
    }
}
