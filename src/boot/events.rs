//! Phase listener registry.
//!
//! Listeners attach to named phases and run sequentially in registration
//! order when the phase is emitted. A listener steers the phase with its
//! return [`Signal`]: only an explicit `SkipDefault` suppresses the phase's
//! default action, and it also short-circuits the remaining listeners.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::app::App;
use crate::error::BoxError;

/// Listener verdict for a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Proceed; the phase's default action runs.
    Continue,
    /// Suppress the phase's default action and skip remaining listeners.
    SkipDefault,
}

pub type Listener = Arc<dyn Fn(App) -> BoxFuture<'static, Result<Signal, BoxError>> + Send + Sync>;

/// Registry of phase listeners.
#[derive(Default)]
pub struct Events {
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener to a phase.
    pub fn on<F, Fut>(&self, phase: impl Into<String>, listener: F)
    where
        F: Fn(App) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Signal, BoxError>> + Send + 'static,
    {
        let listener: Listener = Arc::new(move |app| listener(app).boxed());
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(phase.into())
            .or_default()
            .push(listener);
    }

    fn snapshot(&self, phase: &str) -> Vec<Listener> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(phase)
            .cloned()
            .unwrap_or_default()
    }

    /// Run the phase's listeners in registration order.
    pub async fn emit(&self, phase: &str, app: &App) -> Result<Signal, BoxError> {
        for listener in self.snapshot(phase) {
            match listener(app.clone()).await? {
                Signal::Continue => {}
                Signal::SkipDefault => return Ok(Signal::SkipDefault),
            }
        }
        Ok(Signal::Continue)
    }
}
