//! IEC 60870-5-104 server (outstation).
//!
//! The server accepts any number of connections; each gets its own link
//! state machine and driver task, fully independent of the others. A
//! registry maps peer addresses to link handles so that operator pushes
//! arriving from outside the I/O path (a control surface, a scan task)
//! can address a specific connection.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::client::DEFAULT_TEST_INTERVAL;
use crate::connection::{self, LinkHandle};
use crate::error::{Iec104Error, Result};
use crate::link::{LinkStateMachine, Role};
use crate::operation::Operation;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (host:port)
    pub bind_address: String,
    /// Idle interval before a test frame is sent
    pub test_interval: Duration,
    /// Common address stamped on outbound ASDUs
    pub common_address: u16,
}

impl ServerConfig {
    /// Create a new configuration with the given listen address.
    pub fn new(bind_address: impl Into<String>) -> Self {
        Self {
            bind_address: bind_address.into(),
            test_interval: Duration::from_secs(DEFAULT_TEST_INTERVAL),
            common_address: 0,
        }
    }

    /// Set the idle test frame interval.
    pub fn test_interval(mut self, interval: Duration) -> Self {
        self.test_interval = interval;
        self
    }

    /// Set the common address.
    pub fn common_address(mut self, common_address: u16) -> Self {
        self.common_address = common_address;
        self
    }
}

type Registry = Arc<Mutex<HashMap<SocketAddr, LinkHandle>>>;

/// IEC 60870-5-104 server.
pub struct Iec104Server {
    local_address: SocketAddr,
    registry: Registry,
    events: Option<mpsc::Receiver<(SocketAddr, Operation)>>,
    accept_task: JoinHandle<()>,
}

impl Iec104Server {
    /// Bind the listener and start accepting connections.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(&config.bind_address).await?;
        let local_address = listener.local_addr()?;
        info!(%local_address, "server listening");

        let registry: Registry = Arc::new(Mutex::new(HashMap::new()));
        let (event_tx, event_rx) = mpsc::channel(256);

        let accept_registry = registry.clone();
        let test_interval = config.test_interval;
        let common_address = config.common_address;
        let accept_task = tokio::spawn(async move {
            loop {
                let (stream, peer) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                stream.set_nodelay(true).ok();
                info!(%peer, "connection accepted");

                let (command_tx, command_rx) = mpsc::channel(32);
                let (link_event_tx, mut link_event_rx) = mpsc::channel(100);

                accept_registry
                    .lock()
                    .await
                    .insert(peer, LinkHandle::new(command_tx));

                let machine = LinkStateMachine::new(Role::Server, common_address);
                tokio::spawn(connection::run_link(
                    stream,
                    machine,
                    command_rx,
                    link_event_tx,
                    test_interval,
                    None,
                ));

                // Tag this link's events with the peer address; the link's
                // final event is link-closed, after which the registry entry
                // is dropped.
                let events = event_tx.clone();
                let cleanup_registry = accept_registry.clone();
                tokio::spawn(async move {
                    while let Some(operation) = link_event_rx.recv().await {
                        if events.send((peer, operation)).await.is_err() {
                            break;
                        }
                    }
                    cleanup_registry.lock().await.remove(&peer);
                    info!(%peer, "connection released");
                });
            }
        });

        Ok(Self {
            local_address,
            registry,
            events: Some(event_rx),
            accept_task,
        })
    }

    /// The bound listen address.
    pub fn local_address(&self) -> SocketAddr {
        self.local_address
    }

    /// Take the operation event stream, `(peer, operation)` per event.
    ///
    /// This can only be called once. Returns None if already subscribed.
    pub fn subscribe(&mut self) -> Option<mpsc::Receiver<(SocketAddr, Operation)>> {
        self.events.take()
    }

    /// Peers with a live connection.
    pub async fn connections(&self) -> Vec<SocketAddr> {
        self.registry.lock().await.keys().copied().collect()
    }

    /// Handle for one connection, if it is still live.
    pub async fn handle(&self, peer: SocketAddr) -> Option<LinkHandle> {
        self.registry.lock().await.get(&peer).cloned()
    }

    /// Encode and send an operation on the connection from `peer`.
    ///
    /// Valid pushes are status and measurement reports and the
    /// general-call-end marker.
    pub async fn push(&self, peer: SocketAddr, operation: Operation) -> Result<()> {
        let handle = self
            .handle(peer)
            .await
            .ok_or_else(|| Iec104Error::Connection(format!("no connection from {peer}")))?;
        handle.push(operation).await
    }

    /// Stop accepting and close every live connection. Idempotent.
    pub async fn close(&self) {
        self.accept_task.abort();
        let handles: Vec<LinkHandle> = self.registry.lock().await.values().cloned().collect();
        for handle in handles {
            handle.close().await;
        }
    }
}

impl Drop for Iec104Server {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}
