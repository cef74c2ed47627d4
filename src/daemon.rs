//! Daemon - the main gateway service
//!
//! Wires the simulated mesh, the diagnostic engine and the dispatch table
//! into the event loop, and serves the loop's mailbox over HTTP.

use tokio::sync::mpsc;

use crate::api::{ApiServer, ApiState};
use crate::diagnostics::DiagnosticEngine;
use crate::mainloop::Mainloop;
use crate::mesh::{SimulatedMesh, diagnostic_channel};
use crate::rest::Resources;
use crate::{Config, Result};

/// The gateway daemon
pub struct Daemon {
    config: Config,
}

impl Daemon {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Build the event loop for this configuration
    ///
    /// Returns the loop and the API state that talks to it.
    #[must_use]
    pub fn build(&self) -> (Mainloop, ApiState) {
        let (sink, events) = diagnostic_channel();
        let mesh = SimulatedMesh::new(self.config.mesh.clone(), Some(sink));
        let engine = DiagnosticEngine::new(
            self.config.diagnostics.collect_timeout,
            self.config.diagnostics.reset_timeout,
        );
        let resources = Resources::new(Box::new(mesh), engine);

        let (mainloop, mailbox) = Mainloop::new(resources, events, self.config.server.tick);
        let state = ApiState::new(mailbox, self.config.server.request_timeout);
        (mainloop, state)
    }

    /// Run the daemon until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if the API server fails to bind
    pub async fn run(self) -> Result<()> {
        let (mainloop, state) = self.build();

        tracing::info!(
            peers = self.config.mesh.peers.len(),
            collect_timeout = ?self.config.diagnostics.collect_timeout,
            reset_timeout = ?self.config.diagnostics.reset_timeout,
            "mesh gateway starting"
        );

        // Set up shutdown signal
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let signal_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = signal_tx.send(()).await;
            }
        });

        let api_handle = ApiServer::new(state, self.config.server.socket_addr()).spawn();
        let loop_handle = tokio::spawn(mainloop.run(shutdown_rx));

        // A server that fails to bind takes the daemon down with it
        let api_result = tokio::select! {
            result = api_handle => Some(result),
            _ = loop_handle => None,
        };
        drop(shutdown_tx);

        match api_result {
            Some(Ok(Err(e))) => return Err(e),
            Some(Err(e)) => {
                tracing::error!(error = %e, "API server task failed");
            }
            Some(Ok(Ok(()))) | None => {}
        }

        tracing::info!("daemon stopped");
        Ok(())
    }
}
