//! Per-connection driver.
//!
//! Each TCP connection is owned by exactly one task running [`run_link`]: it
//! holds the framed transport and the link state machine, so sequence
//! stamping and cache insertion stay atomic with respect to the bytes
//! written. Operator pushes from outside the I/O path arrive over the
//! command channel and are serialized the same way.

use std::time::Duration;

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use crate::codec::{Frame, FrameCodec};
use crate::error::{Iec104Error, Result};
use crate::link::{LinkOutput, LinkStateMachine};
use crate::operation::Operation;

/// Commands accepted by a running connection task.
pub(crate) enum Command {
    /// Encode and send an operation; the result is reported back.
    Push(Operation, oneshot::Sender<Result<()>>),
    /// Tear the connection down.
    Close,
}

/// Handle to a running link.
///
/// Cheap to clone; all clones address the same connection. Once the
/// connection ends every call returns [`Iec104Error::ChannelClosed`].
#[derive(Debug, Clone)]
pub struct LinkHandle {
    commands: mpsc::Sender<Command>,
}

impl LinkHandle {
    pub(crate) fn new(commands: mpsc::Sender<Command>) -> Self {
        Self { commands }
    }

    /// Encode and send an operation on this link.
    ///
    /// An operation the link's role cannot encode is a programming error and
    /// is returned immediately, not retried.
    pub async fn push(&self, operation: Operation) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Push(operation, reply_tx))
            .await
            .map_err(|_| Iec104Error::ChannelClosed)?;
        reply_rx.await.map_err(|_| Iec104Error::ChannelClosed)?
    }

    /// Close the link. Idempotent: closing an already-closed link is a no-op.
    pub async fn close(&self) {
        let _ = self.commands.send(Command::Close).await;
    }

    /// Check if the connection task has ended.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Drive one connection until it closes.
///
/// `started` is signalled once the link reaches the active state (the client
/// driver uses it to await the STARTDT handshake). The final event sent is
/// always the link-closed operation.
pub(crate) async fn run_link(
    stream: TcpStream,
    mut machine: LinkStateMachine,
    mut commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<Operation>,
    test_interval: Duration,
    mut started: Option<oneshot::Sender<()>>,
) {
    let mut framed = Framed::new(stream, FrameCodec::new());

    let startup = machine.on_connect();
    if deliver(&mut framed, &events, startup).await.is_err() {
        finish(&mut machine, &events).await;
        return;
    }

    let mut deadline = Instant::now() + test_interval;

    loop {
        tokio::select! {
            inbound = framed.next() => match inbound {
                Some(Ok(frame)) => {
                    deadline = Instant::now() + test_interval;
                    debug!(%frame, "frame received");
                    let out = machine.handle(frame, Utc::now());
                    if deliver(&mut framed, &events, out).await.is_err() {
                        break;
                    }
                    if machine.is_active() {
                        if let Some(tx) = started.take() {
                            let _ = tx.send(());
                        }
                    }
                }
                Some(Err(e)) if e.is_frame_discard() => {
                    warn!(error = %e, "malformed frame dropped");
                }
                Some(Err(e)) => {
                    warn!(error = %e, "transport failure");
                    break;
                }
                None => {
                    debug!("connection closed by peer");
                    break;
                }
            },
            command = commands.recv() => match command {
                Some(Command::Push(operation, reply)) => {
                    let result = match machine.push(operation) {
                        Ok(frames) => send_frames(&mut framed, frames).await,
                        Err(e) => Err(e),
                    };
                    let fatal = matches!(&result, Err(e) if e.is_connection_error());
                    let _ = reply.send(result);
                    if fatal {
                        break;
                    }
                }
                Some(Command::Close) | None => break,
            },
            _ = sleep_until(deadline) => {
                let frame = machine.on_idle();
                if framed.send(frame).await.is_err() {
                    warn!("test frame write failed, closing link");
                    break;
                }
                deadline = Instant::now() + test_interval;
            }
        }
    }

    finish(&mut machine, &events).await;
}

async fn deliver(
    framed: &mut Framed<TcpStream, FrameCodec>,
    events: &mpsc::Sender<Operation>,
    out: LinkOutput,
) -> Result<()> {
    send_frames(framed, out.frames).await?;
    for operation in out.operations {
        // a departed collaborator does not take the link down
        let _ = events.send(operation).await;
    }
    Ok(())
}

async fn send_frames(
    framed: &mut Framed<TcpStream, FrameCodec>,
    frames: Vec<Frame>,
) -> Result<()> {
    for frame in frames {
        debug!(%frame, "frame sent");
        framed.send(frame).await?;
    }
    Ok(())
}

async fn finish(machine: &mut LinkStateMachine, events: &mpsc::Sender<Operation>) {
    let closed = machine.on_close();
    let _ = events.send(closed).await;
}
