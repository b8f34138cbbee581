//! The bootstrap sequencer.
//!
//! Drives the phase plan exactly once: emits each phase's listeners, applies
//! the phase's default action unless a listener skipped it, freezes the
//! router at the start phase, and enforces the readiness gates at the end.
//! The transports are attached only after every gate has passed, so an
//! aborted run never serves a request. A sequencer is single-shot; a second
//! run is refused rather than replayed.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::Router;
use tracing::{debug, error, info, warn};

use super::events::{Events, Signal};
use super::phase::{self, names, Phase};
use crate::app::{features, App, Engine};
use crate::config::PlinthConfig;
use crate::error::{AbortReason, BoxError};
use crate::serve::{attach, attach_with_signal, Attachment, Transports};

/// Outcome of one phase emission.
#[derive(Debug)]
pub struct PhaseResult {
    pub phase: String,
    pub signal: Signal,
}

/// Outcome of a completed sequence run. Aborted runs surface as
/// `AbortReason` instead, which names the phase that stopped them.
pub struct SequenceRun {
    results: Vec<PhaseResult>,
    attachment: Option<Attachment>,
}

impl SequenceRun {
    /// Per-phase outcomes, in emission order.
    pub fn results(&self) -> &[PhaseResult] {
        &self.results
    }

    /// The bound address, when the start phase attached a transport.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.attachment.as_ref().map(Attachment::local_addr)
    }

    /// Stop serving and drain in-flight requests.
    pub fn shutdown(&self) {
        if let Some(attachment) = &self.attachment {
            attachment.shutdown();
        }
    }

    /// Wait for the serve loops to finish.
    pub async fn join(self) {
        if let Some(attachment) = self.attachment {
            attachment.join().await;
        }
    }
}

pub struct Sequencer {
    app: App,
    events: Arc<Events>,
    phases: Vec<Phase>,
    ran: AtomicBool,
}

impl Sequencer {
    pub fn new(config: PlinthConfig) -> Self {
        Self {
            app: App::new(config),
            events: Arc::new(Events::new()),
            phases: phase::builtin_phases(),
            ran: AtomicBool::new(false),
        }
    }

    pub fn app(&self) -> App {
        self.app.clone()
    }

    pub fn events(&self) -> &Events {
        &self.events
    }

    /// Attach a listener to a phase.
    pub fn on<F, Fut>(&self, phase: impl Into<String>, listener: F)
    where
        F: Fn(App) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Signal, BoxError>> + Send + 'static,
    {
        self.events.on(phase, listener);
    }

    /// Add a custom phase to the plan.
    pub fn insert_phase(&mut self, phase: Phase) {
        self.phases.push(phase);
    }

    /// Run the full sequence against already-bound transports.
    pub async fn run(&self, transports: Transports) -> Result<SequenceRun, AbortReason> {
        if self.ran.swap(true, Ordering::SeqCst) {
            return Err(AbortReason::AlreadyRan);
        }

        let config = self.app.config();
        let ordered = phase::order(&self.phases, config.dual_protocol)?;
        let secure = transports.is_tls();
        let mut transports = Some(transports);
        let mut router: Option<Router> = None;
        let mut results = Vec::new();

        for phase in &ordered {
            debug!(phase = phase.name, "emitting phase");
            let signal = match self.events.emit(phase.name, &self.app).await {
                Ok(signal) => signal,
                Err(source) => {
                    if phase.hard_gate {
                        error!(phase = phase.name, error = %source, "readiness gate failed");
                        return Err(AbortReason::Gate { phase: phase.name });
                    }
                    error!(phase = phase.name, error = %source, "phase listener failed");
                    return Err(AbortReason::Listener {
                        phase: phase.name,
                        source,
                    });
                }
            };
            results.push(PhaseResult {
                phase: phase.name.to_string(),
                signal,
            });

            if signal == Signal::SkipDefault {
                // canceling a readiness gate stops the whole startup; any
                // other skip only withholds that phase's default install
                if phase.hard_gate {
                    warn!(phase = phase.name, "readiness gate canceled");
                    return Err(AbortReason::Gate { phase: phase.name });
                }
                self.skip_default(phase.name);
                continue;
            }

            match phase.name {
                names::ENGINE_INIT => {
                    self.app.engine().install(Engine::new(None));
                }
                // the route table is frozen here, but attachment waits for
                // the readiness gates
                names::START => {
                    router = Some(self.app.build_router(secure));
                }
                names::ENGINE_READY => {
                    if !self.app.engine().ready() {
                        error!("engine did not come up before its readiness gate");
                        return Err(AbortReason::Gate {
                            phase: names::ENGINE_READY,
                        });
                    }
                }
                names::READY => {
                    info!("bootstrap sequence complete");
                }
                _ => {}
            }
        }

        let attachment = match router {
            Some(router) => {
                let transports = transports.take().ok_or_else(|| {
                    AbortReason::Configuration("transports already consumed".to_string())
                })?;
                let attached = match self.app.engine().get() {
                    Ok(engine) => attach_with_signal(transports, router, engine.subscribe())?,
                    Err(_) => attach(transports, router)?,
                };
                info!(addr = %attached.local_addr(), "listening");
                Some(attached)
            }
            None => None,
        };

        Ok(SequenceRun {
            results,
            attachment,
        })
    }

    fn skip_default(&self, phase: &str) {
        let feature = match phase {
            names::CONFIGURE_LOGGER => Some(features::LOGGER),
            names::CONFIGURE_STATIC => Some(features::STATIC),
            names::CONFIGURE_CACHE => Some(features::CACHE),
            names::CONFIGURE_BODY_PARSER => Some(features::BODY_PARSER),
            names::CONFIGURE_COOKIE_PARSER => Some(features::COOKIE_PARSER),
            names::CONFIGURE_SESSION => Some(features::SESSION),
            names::CONFIGURE_ERROR_HANDLERS => Some(features::ERROR_HANDLERS),
            names::CONFIGURE_UNHANDLED_ERROR_HANDLER => {
                Some(features::UNHANDLED_ERROR_HANDLER)
            }
            _ => None,
        };
        if let Some(feature) = feature {
            self.app.disable(feature);
        }
    }
}
