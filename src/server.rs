//! SOCKS5 server and connection supervisor
//!
//! Accepts control connections and runs each one on its own task: handshake
//! under a deadline, dispatch, then cleanup and error logging.

use crate::config::ServerConfig;
use crate::error::Socks5Error;
use crate::socks::{dispatch, handshake, AuthRegistry, CommandOptions};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Shared, read-only state handed to every connection task
#[derive(Debug)]
struct ConnectionContext {
    registry: AuthRegistry,
    handshake_timeout: Duration,
    options: CommandOptions,
}

/// Bound SOCKS5 server
pub struct Server {
    listener: TcpListener,
    context: Arc<ConnectionContext>,
}

impl Server {
    /// Bind the listener, with the auth registry built from `config`
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        Self::bind_with_registry(config, config.auth.registry()).await
    }

    /// Bind the listener with a caller-supplied auth registry
    ///
    /// Use this to plug in a [`UserStore`](crate::socks::UserStore) other
    /// than the configured user list.
    pub async fn bind_with_registry(config: &ServerConfig, registry: AuthRegistry) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", config.listen_addr))?;

        let context = ConnectionContext {
            registry,
            handshake_timeout: config.handshake_timeout(),
            options: config.command_options(),
        };

        Ok(Server {
            listener,
            context: Arc::new(context),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read listener address")
    }

    /// Accept connections until shutdown
    ///
    /// On shutdown the accept loop stops and every open UDP association is
    /// cancelled. CONNECT relays in flight run until their peers close.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
        info!(
            addr = %self.local_addr()?,
            methods = ?self.context.registry.methods(),
            "SOCKS5 server listening"
        );

        let shutdown = CancellationToken::new();
        let _shutdown_guard = shutdown.clone().drop_guard();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(err = %e, "accept failed");
                            continue;
                        }
                    };

                    debug!(%peer, "accepted connection");
                    let context = self.context.clone();
                    let cancel = shutdown.child_token();

                    tokio::spawn(async move {
                        match handle_connection(stream, &context, cancel).await {
                            Ok(()) => debug!(%peer, "connection closed"),
                            Err(e) => error!(%peer, err = %e, "connection failed"),
                        }
                    });
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        info!("Server stopped");
        Ok(())
    }
}

/// Serve one control connection
///
/// `cancel` is attached to the parsed request and is cancelled when this
/// returns, so a UDP relay never outlives its control connection.
async fn handle_connection(
    mut stream: TcpStream,
    context: &ConnectionContext,
    cancel: CancellationToken,
) -> Result<(), Socks5Error> {
    let _guard = cancel.clone().drop_guard();
    let local_ip = stream.local_addr()?.ip();

    let negotiation = handshake(&mut stream, &context.registry);
    let request = match tokio::time::timeout(context.handshake_timeout, negotiation).await {
        Ok(request) => request?,
        Err(_) => return Err(Socks5Error::Timeout("handshake")),
    };

    let request = request.with_cancel(cancel);
    dispatch(&mut stream, &request, local_ip, &context.options).await
}
