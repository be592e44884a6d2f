//! IEC 60870-5-104 client (controlling station).
//!
//! `Iec104Client::connect` establishes the TCP connection, spawns the
//! connection task and awaits the STARTDT handshake, so the returned client
//! is immediately ready for pushes.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::info;

use crate::connection::{self, LinkHandle};
use crate::error::{Iec104Error, Result};
use crate::link::{LinkStateMachine, Role};
use crate::operation::Operation;

/// Default IEC 104 port.
pub const DEFAULT_PORT: u16 = 2404;

/// Default idle interval before a test frame is sent, in seconds.
pub const DEFAULT_TEST_INTERVAL: u64 = 30;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address (host:port)
    pub address: String,
    /// Connection and handshake timeout
    pub connect_timeout: Duration,
    /// Idle interval before a test frame is sent
    pub test_interval: Duration,
    /// Common address stamped on outbound ASDUs
    pub common_address: u16,
}

impl ClientConfig {
    /// Create a new configuration with the given address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connect_timeout: Duration::from_secs(10),
            test_interval: Duration::from_secs(DEFAULT_TEST_INTERVAL),
            common_address: 0,
        }
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
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

/// IEC 60870-5-104 client.
pub struct Iec104Client {
    handle: LinkHandle,
    events: Option<mpsc::Receiver<Operation>>,
}

impl Iec104Client {
    /// Connect to a server and start the link.
    ///
    /// Resolves once STARTDT is confirmed; valid pushes are [`Operation::GeneralCall`]
    /// and [`Operation::Telecontrol`].
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let stream = timeout(config.connect_timeout, TcpStream::connect(&config.address))
            .await
            .map_err(|_| Iec104Error::ConnectionTimeout)??;

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true).ok();

        let (command_tx, command_rx) = mpsc::channel(32);
        let (event_tx, event_rx) = mpsc::channel(100);
        let (started_tx, started_rx) = oneshot::channel();

        let machine = LinkStateMachine::new(Role::Client, config.common_address);
        tokio::spawn(connection::run_link(
            stream,
            machine,
            command_rx,
            event_tx,
            config.test_interval,
            Some(started_tx),
        ));

        timeout(config.connect_timeout, started_rx)
            .await
            .map_err(|_| Iec104Error::ConnectionTimeout)?
            .map_err(|_| Iec104Error::Connection("link start failed".into()))?;

        info!(address = %config.address, "link active");
        Ok(Self {
            handle: LinkHandle::new(command_tx),
            events: Some(event_rx),
        })
    }

    /// A cloneable handle to this link, for pushes from other tasks.
    pub fn handle(&self) -> LinkHandle {
        self.handle.clone()
    }

    /// Take the operation event stream.
    ///
    /// This can only be called once. Returns None if already subscribed.
    pub fn subscribe(&mut self) -> Option<mpsc::Receiver<Operation>> {
        self.events.take()
    }

    /// Encode and send an operation.
    pub async fn push(&self, operation: Operation) -> Result<()> {
        self.handle.push(operation).await
    }

    /// Tear the connection down. Idempotent.
    pub async fn close(&self) {
        self.handle.close().await;
    }
}
