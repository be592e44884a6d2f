//! # gridlink_iec104
//!
//! IEC 60870-5-104 telecontrol protocol engine for Rust.
//!
//! This crate implements the IEC 60870-5-104 protocol as used between a
//! SCADA master (client) and an outstation (server) over a persistent TCP
//! link: the binary frame codec, modulo-32768 sequence bookkeeping, the
//! bounded retransmission cache, and the per-connection state machine that
//! drives link startup, keepalive, general interrogation, clock
//! synchronization and select-before-execute remote control.
//!
//! ## Features
//!
//! - **I/O-free core**: the [`LinkStateMachine`] emits frames and events as
//!   values, so every protocol path is unit-testable without a socket
//! - **Full frame support**: I-frames, S-frames, U-frames
//! - **Both roles**: async client and multi-connection server drivers
//! - **Type safe**: closed enums for TypeID, COT and qualifiers; unknown
//!   codes are rejected at decode time
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gridlink_iec104::{ClientConfig, Iec104Client, Operation};
//!
//! #[tokio::main]
//! async fn main() -> gridlink_iec104::Result<()> {
//!     let config = ClientConfig::new("192.168.1.100:2404");
//!     let mut client = Iec104Client::connect(config).await?;
//!
//!     // Request a general interrogation
//!     client.push(Operation::GeneralCall).await?;
//!
//!     // Consume decoded operations
//!     let mut events = client.subscribe().unwrap();
//!     while let Some(operation) = events.recv().await {
//!         println!("Operation: {:?}", operation);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Protocol Overview
//!
//! IEC 60870-5-104 uses TCP/IP (default port 2404). Three frame types share
//! one 6-byte APCI header:
//!
//! - **I-frame**: numbered information transfer, carries an ASDU
//! - **S-frame**: numbered supervisory acknowledgment
//! - **U-frame**: unnumbered control (STARTDT, STOPDT, TESTFR)
//!
//! ```text
//! APCI (6 bytes):
//! +--------+--------+--------+--------+--------+--------+
//! | 0x68   | Length | Control Field (4 bytes)           |
//! +--------+--------+--------+--------+--------+--------+
//! ```
//!
//! Every accepted inbound I-frame is acknowledged with an S-frame, sent
//! frames wait in a bounded retransmission cache until acknowledged, and an
//! idle link is probed with TESTFR keepalives.

pub mod bytecodec;
pub mod cache;
pub mod client;
pub mod codec;
mod connection;
pub mod error;
pub mod factory;
pub mod link;
pub mod operation;
pub mod sequence;
pub mod server;
pub mod types;

// Re-export main types
pub use cache::RetransmissionCache;
pub use client::{ClientConfig, Iec104Client};
pub use codec::{Frame, FrameCodec};
pub use connection::LinkHandle;
pub use error::{Iec104Error, Result};
pub use link::{LinkOutput, LinkState, LinkStateMachine, Role};
pub use operation::Operation;
pub use sequence::SequenceController;
pub use server::{Iec104Server, ServerConfig};
pub use types::*;
