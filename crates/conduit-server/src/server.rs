//! HTTP/1.1 accept loop.
//!
//! Connections are served on their own tasks and capped by a
//! [`ConnectionTracker`]. On shutdown the listener stops accepting, the
//! readiness probe flips, open connections are asked to finish their current
//! request, and the loop waits up to the shutdown timeout for them to close.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use conduit_config::ConduitConfig;
use conduit_gateway::Gateway;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};

use crate::health::{HealthCheck, Readiness};
use crate::service::IngestService;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};
use crate::ServerError;

/// Pause after a failed accept before trying again.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// The Conduit HTTP server.
#[derive(Debug)]
pub struct Server {
    service: Arc<IngestService>,
    tracker: ConnectionTracker,
    shutdown_timeout: Duration,
}

impl Server {
    /// Creates a server over `gateway` with default limits.
    pub fn new(gateway: Arc<Gateway>) -> Self {
        let service = IngestService::new(
            gateway,
            HealthCheck::new("conduit", crate::VERSION),
            Readiness::new(),
        );
        Self {
            service: Arc::new(service),
            tracker: ConnectionTracker::new(10_000),
            shutdown_timeout: Duration::from_secs(30),
        }
    }

    /// Creates a server using the limits in `config`.
    pub fn from_config(gateway: Arc<Gateway>, config: &ConduitConfig) -> Self {
        let service = IngestService::new(
            gateway,
            HealthCheck::new(&config.telemetry.service_name, crate::VERSION),
            Readiness::new(),
        )
        .with_request_timeout(config.request_timeout());
        Self {
            service: Arc::new(service),
            tracker: ConnectionTracker::new(config.server.max_connections),
            shutdown_timeout: config.shutdown_timeout(),
        }
    }

    /// Overrides the connection limit.
    #[must_use]
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.tracker = ConnectionTracker::new(max);
        self
    }

    /// Overrides the shutdown timeout.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Readiness probe.
    pub fn readiness(&self) -> &Readiness {
        self.service.readiness()
    }

    /// Open connections.
    pub fn active_connections(&self) -> usize {
        self.tracker.active_connections()
    }

    /// Binds `addr` and serves until SIGINT or SIGTERM.
    pub async fn run(self, addr: SocketAddr) -> Result<(), ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::bind(addr, e))?;
        self.serve(listener, ShutdownSignal::with_os_signals()).await
    }

    /// Serves connections from `listener` until `shutdown` fires.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        let local = listener.local_addr()?;
        tracing::info!(
            addr = %local,
            max_connections = self.tracker.max_connections(),
            "Conduit listening"
        );

        loop {
            let token = tokio::select! {
                token = self.tracker.acquire() => token,
                () = shutdown.recv() => break,
            };

            let (stream, remote) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                        // Errors like EMFILE persist until a connection closes.
                        if accept_backoff(&shutdown).await {
                            continue;
                        }
                        break;
                    }
                },
                () = shutdown.recv() => break,
            };

            let service = Arc::clone(&self.service);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                serve_connection(stream, remote, service, shutdown).await;
                drop(token);
            });
        }

        self.readiness().set_draining();
        drop(listener);

        tracing::info!(
            active = self.tracker.active_connections(),
            timeout_secs = self.shutdown_timeout.as_secs(),
            "Draining connections"
        );
        if tokio::time::timeout(self.shutdown_timeout, self.tracker.wait_idle())
            .await
            .is_err()
        {
            tracing::warn!(
                active = self.tracker.active_connections(),
                "Shutdown timeout reached with connections still open"
            );
        }

        tracing::info!("Conduit stopped");
        Ok(())
    }
}

/// Waits out [`ACCEPT_ERROR_BACKOFF`]. Returns `false` if shutdown fired first.
async fn accept_backoff(shutdown: &ShutdownSignal) -> bool {
    tokio::select! {
        () = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => true,
        () = shutdown.recv() => false,
    }
}

async fn serve_connection(
    stream: TcpStream,
    remote: SocketAddr,
    service: Arc<IngestService>,
    shutdown: ShutdownSignal,
) {
    let _ = stream.set_nodelay(true);
    let io = TokioIo::new(stream);
    let svc = service_fn(move |req: Request<Incoming>| Arc::clone(&service).handle(req));

    let conn = http1::Builder::new().serve_connection(io, svc);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                tracing::debug!(%remote, error = %e, "Connection closed with error");
            }
        }
        () = shutdown.recv() => {
            conn.as_mut().graceful_shutdown();
            if let Err(e) = conn.await {
                tracing::debug!(%remote, error = %e, "Connection closed with error during drain");
            }
        }
    }
}
