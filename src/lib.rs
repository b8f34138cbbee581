//! plinth: staged HTTP service bootstrap.
//!
//! A server here is not built in one call. Configuration is validated, a
//! phase plan is resolved, listeners shape the application during named
//! configure phases, and only then is the router attached to transports
//! that were bound up front. Requests are served behind a capability bridge
//! so handlers see one object surface whether the connection speaks
//! protocol version 1 or 2, and unhandled failures are translated into
//! negotiated client responses instead of leaking internals.
//!
//! ```no_run
//! use plinth::boot::{names, Sequencer, Signal};
//! use plinth::config::PlinthConfig;
//! use plinth::serve::Transports;
//!
//! # async fn demo() -> Result<(), plinth::error::AbortReason> {
//! let config = PlinthConfig {
//!     http_only: true,
//!     ..PlinthConfig::default()
//! };
//! let sequencer = Sequencer::new(config);
//! sequencer.on(names::CONFIGURE_ROUTES, |app| async move {
//!     app.get("/healthz", |_request| async { Ok("ok") });
//!     Ok(Signal::Continue)
//! });
//!
//! let transports = Transports::bind_http("127.0.0.1:8080".parse().unwrap()).await?;
//! let run = sequencer.run(transports).await?;
//! run.join().await;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod boot;
pub mod bridge;
pub mod config;
pub mod error;
pub mod middleware;
pub mod serve;

pub use app::{App, Engine, EngineCell};
pub use boot::{SequenceRun, Sequencer, Signal};
pub use config::{load_config, PlinthConfig};
pub use error::{AbortReason, BoxError, EnvelopeKind, ErrorEnvelope};
pub use serve::Transports;

use tracing_subscriber::EnvFilter;

/// Initialize logging from `RUST_LOG`, defaulting to `info`. Safe to call
/// more than once; later calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
