//! Transport binding and attachment.
//!
//! Binding and serving are split so a caller can hand over a socket that is
//! already listening: the sequencer only ever attaches. Plain HTTP is driven
//! by axum's own serve loop; TLS goes through axum-server with certificates
//! loaded from PEM files.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::TlsConfig;
use crate::error::AbortReason;

/// Listening sockets waiting for a router.
pub struct Transports {
    http: Option<TcpListener>,
    https: Option<(std::net::TcpListener, RustlsConfig)>,
}

impl Transports {
    /// Bind a plain HTTP socket.
    pub async fn bind_http(addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self::from_http_listener(listener))
    }

    /// Bind a TLS socket and load its certificate material.
    pub async fn bind_https(addr: SocketAddr, tls: &TlsConfig) -> std::io::Result<Self> {
        let listener = std::net::TcpListener::bind(addr)?;
        let config = load_tls(tls).await?;
        Self::from_https_listener(listener, config)
    }

    /// Adopt a socket that is already listening.
    pub fn from_http_listener(listener: TcpListener) -> Self {
        Self {
            http: Some(listener),
            https: None,
        }
    }

    /// Adopt an already-listening socket for TLS service.
    pub fn from_https_listener(
        listener: std::net::TcpListener,
        config: RustlsConfig,
    ) -> std::io::Result<Self> {
        listener.set_nonblocking(true)?;
        Ok(Self {
            http: None,
            https: Some((listener, config)),
        })
    }

    /// Whether the bound transport terminates TLS.
    pub fn is_tls(&self) -> bool {
        self.https.is_some()
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        if let Some(listener) = &self.http {
            return listener.local_addr();
        }
        if let Some((listener, _)) = &self.https {
            return listener.local_addr();
        }
        Err(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "no transport bound",
        ))
    }
}

/// Load a rustls configuration from PEM files.
pub async fn load_tls(tls: &TlsConfig) -> std::io::Result<RustlsConfig> {
    RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await
}

/// A served router with its shutdown controls.
pub struct Attachment {
    local_addr: SocketAddr,
    shutdown: broadcast::Sender<()>,
    tls_handle: Option<axum_server::Handle>,
    tasks: Vec<JoinHandle<()>>,
}

impl Attachment {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and drain in-flight requests.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
        if let Some(handle) = &self.tls_handle {
            handle.graceful_shutdown(Some(Duration::from_secs(10)));
        }
    }

    /// Wait for the serve loops to finish.
    pub async fn join(self) {
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

/// Attach a router to the bound transports and start serving.
pub fn attach(transports: Transports, router: Router) -> Result<Attachment, AbortReason> {
    let (shutdown, _) = broadcast::channel::<()>(1);
    let mut tasks = Vec::new();
    let mut tls_handle = None;
    let mut local_addr = None;

    if let Some(listener) = transports.http {
        let addr = listener.local_addr()?;
        info!(%addr, "attaching http transport");
        local_addr = Some(addr);
        let mut stop = shutdown.subscribe();
        let service = router
            .clone()
            .into_make_service_with_connect_info::<SocketAddr>();
        tasks.push(tokio::spawn(async move {
            let serve = axum::serve(listener, service).with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            });
            if let Err(error) = serve.await {
                error!(%error, "http transport failed");
            }
        }));
    }

    if let Some((listener, config)) = transports.https {
        let addr = listener.local_addr()?;
        info!(%addr, "attaching https transport");
        local_addr.get_or_insert(addr);
        let handle = axum_server::Handle::new();
        tls_handle = Some(handle.clone());
        let service = router.into_make_service_with_connect_info::<SocketAddr>();
        let server = axum_server::from_tcp_rustls(listener, config).handle(handle);
        tasks.push(tokio::spawn(async move {
            if let Err(error) = server.serve(service).await {
                error!(%error, "https transport failed");
            }
        }));
    }

    let local_addr = local_addr.ok_or_else(|| {
        AbortReason::Configuration("no transport bound before attach".to_string())
    })?;
    Ok(Attachment {
        local_addr,
        shutdown,
        tls_handle,
        tasks,
    })
}

/// Attach and forward an upstream shutdown signal into the serve loops, so
/// one broadcast stops both the engine subscribers and the transport.
pub fn attach_with_signal(
    transports: Transports,
    router: Router,
    mut upstream: broadcast::Receiver<()>,
) -> Result<Attachment, AbortReason> {
    let attachment = attach(transports, router)?;
    let inner = attachment.shutdown.clone();
    let tls = attachment.tls_handle.clone();
    tokio::spawn(async move {
        if upstream.recv().await.is_ok() {
            let _ = inner.send(());
            if let Some(handle) = tls {
                handle.graceful_shutdown(Some(Duration::from_secs(10)));
            }
        }
    });
    Ok(attachment)
}
