//! Per-connection link state machine.
//!
//! One `LinkStateMachine` exists per TCP connection and owns that
//! connection's sequence counters and retransmission cache. The machine
//! performs no I/O: every entry point returns the frames to transmit and the
//! operations to surface, so the whole protocol is unit-testable without a
//! socket. The driver owning the connection serializes all calls, which
//! keeps sequence stamping and cache insertion atomic with respect to the
//! bytes actually written.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::bytecodec;
use crate::cache::RetransmissionCache;
use crate::codec::Frame;
use crate::error::{Iec104Error, Result};
use crate::factory;
use crate::operation::Operation;
use crate::sequence::SequenceController;
use crate::types::{Apci, Asdu, Cot, TypeId, UFunction};

/// Which end of the link this machine drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Master / controlling station
    Client,
    /// Outstation / controlled station
    Server,
}

impl Role {
    /// Lower-case role name for logging and errors.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }
}

/// Link lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No connection, or torn down
    Closed,
    /// TCP established, STARTDT handshake in progress
    Starting,
    /// Data transfer active
    Active,
}

/// Result of one state machine step: frames to transmit, in order, and
/// operations to hand to the external collaborator.
#[derive(Debug, Default)]
pub struct LinkOutput {
    /// Outbound frames, in transmit order
    pub frames: Vec<Frame>,
    /// Decoded business events
    pub operations: Vec<Operation>,
}

/// The per-connection protocol engine.
pub struct LinkStateMachine {
    role: Role,
    state: LinkState,
    common_address: u16,
    sequence: SequenceController,
    cache: RetransmissionCache,
}

impl LinkStateMachine {
    /// Create a machine for a fresh connection.
    pub fn new(role: Role, common_address: u16) -> Self {
        Self {
            role,
            state: LinkState::Closed,
            common_address,
            sequence: SequenceController::new(),
            cache: RetransmissionCache::new(),
        }
    }

    /// The machine's role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current link state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Check if data transfer is active.
    pub fn is_active(&self) -> bool {
        self.state == LinkState::Active
    }

    /// The retransmission cache (frames sent but not yet acknowledged).
    pub fn cache(&self) -> &RetransmissionCache {
        &self.cache
    }

    /// Transport connected. The client starts the link; the server waits
    /// for the peer's STARTDT.
    pub fn on_connect(&mut self) -> LinkOutput {
        self.state = LinkState::Starting;
        let mut out = LinkOutput::default();
        if self.role == Role::Client {
            info!("requesting link start");
            out.frames.push(Frame::u_frame(UFunction::StartDtAct));
        }
        out
    }

    /// Process one inbound frame.
    ///
    /// Protocol violations below the connection level (bad sequence numbers,
    /// unsupported type/cause combinations) drop the frame and never fail
    /// the call.
    pub fn handle(&mut self, frame: Frame, now: DateTime<Utc>) -> LinkOutput {
        match frame.apci {
            Apci::UFrame { function } => self.handle_u(function),
            Apci::SFrame { recv_seq } => {
                self.cache.remove_less(recv_seq);
                debug!(
                    ack = recv_seq,
                    cached = self.cache.len(),
                    "supervisory acknowledgement"
                );
                LinkOutput::default()
            }
            Apci::IFrame { send_seq, recv_seq } => self.handle_i(frame, send_seq, recv_seq, now),
        }
    }

    /// Encode and queue an operation pushed by the external collaborator.
    ///
    /// Only operations valid for this machine's role are accepted; anything
    /// else is a programming error surfaced to the caller.
    pub fn push(&mut self, operation: Operation) -> Result<Vec<Frame>> {
        if self.state != LinkState::Active {
            return Err(Iec104Error::Connection("link not active".into()));
        }

        let asdu = match (self.role, &operation) {
            (Role::Client, Operation::GeneralCall) => {
                factory::general_call_command(self.common_address)
            }
            (Role::Client, Operation::Telecontrol { points }) => {
                factory::telecontrol_select(self.common_address, points)
            }
            (Role::Server, Operation::Telesignal { points }) => {
                factory::telesignal(self.common_address, false, points)
            }
            (Role::Server, Operation::GeneralCallTelesignal { points }) => {
                factory::telesignal(self.common_address, true, points)
            }
            (Role::Server, Operation::Telemetry { points }) => {
                factory::telemetry(self.common_address, false, points)
            }
            (Role::Server, Operation::GeneralCallTelemetry { points }) => {
                factory::telemetry(self.common_address, true, points)
            }
            (Role::Server, Operation::GeneralCallEnd) => {
                factory::general_call_end(self.common_address)
            }
            (role, operation) => {
                return Err(Iec104Error::UnsupportedOperation {
                    role: role.name(),
                    operation: operation.name(),
                })
            }
        };

        Ok(vec![self.send_i(asdu)])
    }

    /// Idle timeout fired: emit a test frame.
    pub fn on_idle(&mut self) -> Frame {
        info!("idle timeout, sending test frame");
        Frame::u_frame(UFunction::TestFrAct)
    }

    /// Connection closed (locally or by the peer). Idempotent; all
    /// per-connection protocol state is dead after this.
    pub fn on_close(&mut self) -> Operation {
        if self.state != LinkState::Closed {
            info!("link closed");
            self.state = LinkState::Closed;
            self.cache.clear();
        }
        Operation::LinkClosed
    }

    /// Stamp sequence numbers onto an outbound I-frame and cache it.
    fn send_i(&mut self, asdu: Asdu) -> Frame {
        let send_seq = self.sequence.next_send();
        let frame = Frame::i_frame(send_seq, self.sequence.current_receive(), asdu);
        self.cache.add(frame.clone());
        frame
    }

    fn handle_u(&mut self, function: UFunction) -> LinkOutput {
        let mut out = LinkOutput::default();
        match (self.role, function) {
            (Role::Server, UFunction::StartDtAct) => {
                info!("link start requested, confirming");
                out.frames.push(Frame::u_frame(UFunction::StartDtCon));
                self.state = LinkState::Active;
            }
            (Role::Client, UFunction::StartDtCon) => {
                info!("link start confirmed");
                self.state = LinkState::Active;
            }
            (_, UFunction::TestFrAct) => {
                debug!("test frame received, confirming");
                out.frames.push(Frame::u_frame(UFunction::TestFrCon));
            }
            (_, UFunction::TestFrCon) => {
                debug!("test frame confirmed");
            }
            (_, UFunction::StopDtAct) => {
                info!("link stop requested");
            }
            (_, UFunction::StopDtCon) => {
                info!("link stop confirmed");
            }
            (role, function) => {
                warn!(role = role.name(), ?function, "unexpected U-frame dropped");
            }
        }
        out
    }

    fn handle_i(
        &mut self,
        frame: Frame,
        send_seq: u16,
        recv_seq: u16,
        now: DateTime<Utc>,
    ) -> LinkOutput {
        let mut out = LinkOutput::default();

        let accepted = self.sequence.accept_receive(send_seq);
        if accepted {
            self.cache.remove_less(recv_seq);
        } else {
            warn!(
                expected = self.sequence.current_receive(),
                actual = send_seq,
                "sequence mismatch, dropping frame"
            );
        }

        // A received I-frame is always acknowledged, even one that is
        // dropped; the ack carries the connection's actual receive counter.
        out.frames
            .push(Frame::s_frame(self.sequence.current_receive()));

        if accepted {
            if let Some(asdu) = frame.asdu {
                self.dispatch(asdu, now, &mut out);
            }
        }

        out
    }

    fn dispatch(&mut self, asdu: Asdu, now: DateTime<Utc>, out: &mut LinkOutput) {
        match asdu.type_id {
            TypeId::EndOfInit => {
                if asdu.cot == Cot::Initialized {
                    info!("peer initialization complete");
                } else {
                    self.unsupported(&asdu);
                }
            }
            TypeId::GeneralInterrogation => self.dispatch_general_call(asdu, now, out),
            TypeId::ClockSync => self.dispatch_clock(asdu, now, out),
            TypeId::SinglePoint
            | TypeId::DoublePoint
            | TypeId::SinglePointTime
            | TypeId::DoublePointTime => self.dispatch_telesignal(asdu, out),
            TypeId::MeasuredNormalized | TypeId::MeasuredScaled | TypeId::MeasuredFloat => {
                self.dispatch_telemetry(asdu, out)
            }
            TypeId::SingleCommand | TypeId::DoubleCommand => {
                self.dispatch_remote_control(asdu, out)
            }
        }
    }

    fn dispatch_general_call(&mut self, asdu: Asdu, now: DateTime<Utc>, out: &mut LinkOutput) {
        match (self.role, asdu.cot) {
            (Role::Server, Cot::Activation) => {
                info!("general call requested, confirming");
                let confirm = factory::general_call_confirm(self.common_address);
                out.frames.push(self.send_i(confirm));
                out.operations.push(Operation::GeneralCall);
            }
            (Role::Client, Cot::ActivationConfirm) => {
                info!("general call confirmed");
            }
            (Role::Client, Cot::ActivationTermination) => {
                info!("general call ended, requesting clock synchronization");
                out.operations.push(Operation::GeneralCallEnd);
                let sync = factory::clock_sync_command(self.common_address, now);
                out.frames.push(self.send_i(sync));
            }
            _ => self.unsupported(&asdu),
        }
    }

    fn dispatch_clock(&mut self, asdu: Asdu, now: DateTime<Utc>, out: &mut LinkOutput) {
        match (self.role, asdu.cot) {
            (Role::Server, Cot::Activation) => {
                info!("clock synchronization requested, confirming");
                let confirm = factory::clock_sync_confirm(self.common_address, now);
                out.frames.push(self.send_i(confirm));
            }
            (Role::Client, Cot::ActivationConfirm) => {
                info!("clock synchronization confirmed, requesting clock read");
                let read = factory::clock_read_command(self.common_address, now);
                out.frames.push(self.send_i(read));
            }
            (Role::Server, Cot::Request) => {
                info!("clock read requested, replying");
                let reply = factory::clock_read_reply(self.common_address, now);
                out.frames.push(self.send_i(reply));
            }
            (Role::Client, Cot::Request) => {
                info!("clock read confirmed");
            }
            _ => self.unsupported(&asdu),
        }
    }

    fn dispatch_telesignal(&mut self, asdu: Asdu, out: &mut LinkOutput) {
        if self.role != Role::Client {
            self.unsupported(&asdu);
            return;
        }
        let points = status_points(&asdu);
        match asdu.cot {
            Cot::InterrogatedByStation => {
                out.operations
                    .push(Operation::GeneralCallTelesignal { points });
            }
            Cot::Spontaneous => {
                out.operations.push(Operation::Telesignal { points });
            }
            _ => self.unsupported(&asdu),
        }
    }

    fn dispatch_telemetry(&mut self, asdu: Asdu, out: &mut LinkOutput) {
        if self.role != Role::Client {
            self.unsupported(&asdu);
            return;
        }
        let points = measured_points(&asdu);
        match asdu.cot {
            Cot::InterrogatedByStation => {
                out.operations
                    .push(Operation::GeneralCallTelemetry { points });
            }
            Cot::Spontaneous => {
                out.operations.push(Operation::Telemetry { points });
            }
            _ => self.unsupported(&asdu),
        }
    }

    fn dispatch_remote_control(&mut self, asdu: Asdu, out: &mut LinkOutput) {
        let select = asdu
            .objects
            .first()
            .and_then(|object| object.value_byte())
            .map(bytecodec::command_is_select)
            .unwrap_or(false);

        match (self.role, asdu.cot, select) {
            (Role::Server, Cot::Activation, true) => {
                info!("telecontrol select requested, confirming");
                let confirm =
                    factory::echo_with_cot(self.common_address, &asdu, Cot::ActivationConfirm);
                out.frames.push(self.send_i(confirm));
            }
            (Role::Client, Cot::ActivationConfirm, true) => {
                info!("telecontrol select confirmed, executing");
                let execute = factory::telecontrol_execute(self.common_address, &asdu);
                out.frames.push(self.send_i(execute));
            }
            (Role::Server, Cot::Activation, false) => {
                info!("telecontrol execute requested");
                let confirm =
                    factory::echo_with_cot(self.common_address, &asdu, Cot::ActivationConfirm);
                out.frames.push(self.send_i(confirm));
                out.operations.push(Operation::Telecontrol {
                    points: command_points(&asdu),
                });
                let terminate =
                    factory::echo_with_cot(self.common_address, &asdu, Cot::ActivationTermination);
                out.frames.push(self.send_i(terminate));
            }
            (Role::Client, Cot::ActivationConfirm, false) => {
                info!("telecontrol execute confirmed");
            }
            (Role::Client, Cot::ActivationTermination, false) => {
                info!("telecontrol execute terminated");
            }
            _ => self.unsupported(&asdu),
        }
    }

    fn unsupported(&self, asdu: &Asdu) {
        warn!(
            role = self.role.name(),
            type_id = %asdu.type_id,
            cot = %asdu.cot,
            "unsupported frame dropped"
        );
    }
}

/// Status point values keyed by object address.
fn status_points(asdu: &Asdu) -> BTreeMap<u32, u8> {
    asdu.objects
        .iter()
        .map(|object| (object.address, object.value_byte().unwrap_or(0)))
        .collect()
}

/// Measured values keyed by object address. Short floats decode bit-exact;
/// normalized and scaled 2-byte values widen to f32.
fn measured_points(asdu: &Asdu) -> BTreeMap<u32, f32> {
    asdu.objects
        .iter()
        .map(|object| {
            let value = match object.value.as_deref() {
                Some([a, b, c, d]) => f32::from_le_bytes([*a, *b, *c, *d]),
                Some([a, b]) => i16::from_le_bytes([*a, *b]) as f32,
                _ => 0.0,
            };
            (object.address, value)
        })
        .collect()
}

/// Commanded states keyed by object address: double-command state 2 maps to
/// business value 1, everything else to 0.
fn command_points(asdu: &Asdu) -> BTreeMap<u32, u8> {
    asdu.objects
        .iter()
        .map(|object| {
            let value = object.value_byte().unwrap_or(0);
            let state = match asdu.type_id {
                TypeId::SingleCommand => value & 0x01,
                _ => u8::from(bytecodec::dco_state(value) == 2),
            };
            (object.address, state)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FrameCodec;
    use bytes::BytesMut;
    use chrono::TimeZone;
    use tokio_util::codec::Encoder;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 6, 1, 12, 12, 12).unwrap()
    }

    fn encode(frame: &Frame) -> Vec<u8> {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(frame.clone(), &mut buf).unwrap();
        buf.to_vec()
    }

    /// Client and server brought to the active state via the STARTDT
    /// handshake; all sequence counters start at 0.
    fn active_pair() -> (LinkStateMachine, LinkStateMachine) {
        let mut client = LinkStateMachine::new(Role::Client, 0);
        let mut server = LinkStateMachine::new(Role::Server, 0);

        let mut out = client.on_connect();
        assert_eq!(out.frames.len(), 1);
        server.on_connect();

        let server_out = server.handle(out.frames.remove(0), now());
        assert!(server.is_active());
        assert_eq!(
            server_out.frames,
            vec![Frame::u_frame(UFunction::StartDtCon)]
        );

        let client_out = client.handle(server_out.frames[0].clone(), now());
        assert!(client.is_active());
        assert!(client_out.frames.is_empty());

        (client, server)
    }

    #[test]
    fn test_client_connect_sends_startdt() {
        let mut client = LinkStateMachine::new(Role::Client, 0);
        let out = client.on_connect();
        assert_eq!(out.frames, vec![Frame::u_frame(UFunction::StartDtAct)]);
        assert_eq!(client.state(), LinkState::Starting);
    }

    #[test]
    fn test_server_confirms_startdt() {
        let mut server = LinkStateMachine::new(Role::Server, 0);
        server.on_connect();
        assert_eq!(server.state(), LinkState::Starting);

        let out = server.handle(Frame::u_frame(UFunction::StartDtAct), now());
        assert!(server.is_active());
        assert_eq!(out.frames, vec![Frame::u_frame(UFunction::StartDtCon)]);
        assert!(server.cache().is_empty());
    }

    #[test]
    fn test_client_logs_init_end() {
        let (mut client, _) = active_pair();

        let out = client.handle(Frame::i_frame(0, 0, factory::init_end(0)), now());
        assert_eq!(out.frames, vec![Frame::s_frame(1)]);
        assert!(out.operations.is_empty());
        assert!(client.is_active());
    }

    #[test]
    fn test_test_frame_auto_reply() {
        let (mut client, mut server) = active_pair();

        let out = client.handle(Frame::u_frame(UFunction::TestFrAct), now());
        assert_eq!(out.frames, vec![Frame::u_frame(UFunction::TestFrCon)]);

        let out = server.handle(Frame::u_frame(UFunction::TestFrAct), now());
        assert_eq!(out.frames, vec![Frame::u_frame(UFunction::TestFrCon)]);

        let out = client.handle(Frame::u_frame(UFunction::TestFrCon), now());
        assert!(out.frames.is_empty());
    }

    #[test]
    fn test_on_idle_emits_test_frame() {
        let (mut client, _) = active_pair();
        assert_eq!(client.on_idle(), Frame::u_frame(UFunction::TestFrAct));
    }

    #[test]
    fn test_sequence_mismatch_drops_frame_but_acks() {
        let (mut client, _) = active_pair();

        // send sequence 5 while 0 is expected
        let asdu = factory::general_call_confirm(0);
        let out = client.handle(Frame::i_frame(5, 0, asdu), now());

        assert_eq!(out.frames, vec![Frame::s_frame(0)]);
        assert!(out.operations.is_empty());
        assert!(client.is_active());

        // the next in-order frame is still accepted
        let asdu = factory::general_call_confirm(0);
        let out = client.handle(Frame::i_frame(0, 0, asdu), now());
        assert_eq!(out.frames, vec![Frame::s_frame(1)]);
    }

    #[test]
    fn test_supervisory_ack_trims_cache() {
        let (_, mut server) = active_pair();

        for points in [
            BTreeMap::from([(1u32, 1u8)]),
            BTreeMap::from([(2u32, 0u8)]),
        ] {
            server.push(Operation::Telesignal { points }).unwrap();
        }
        assert_eq!(server.cache().send_sequence_numbers(), vec![0, 1]);

        let out = server.handle(Frame::s_frame(1), now());
        assert!(out.frames.is_empty());
        assert_eq!(server.cache().send_sequence_numbers(), vec![1]);

        server.handle(Frame::s_frame(2), now());
        assert!(server.cache().is_empty());
    }

    #[test]
    fn test_inbound_i_frame_ack_trims_cache() {
        let (mut client, mut server) = active_pair();

        // client requests a general interrogation
        let frames = client.push(Operation::GeneralCall).unwrap();
        assert_eq!(client.cache().send_sequence_numbers(), vec![0]);

        // the server's confirmation carries recv_seq 1, acknowledging it
        let server_out = server.handle(frames[0].clone(), now());
        let confirm = server_out.frames[1].clone();
        assert_eq!(confirm.apci.recv_seq(), Some(1));

        client.handle(confirm, now());
        assert!(client.cache().is_empty());
    }

    #[test]
    fn test_push_role_checks() {
        let (mut client, mut server) = active_pair();

        let err = client
            .push(Operation::GeneralCallEnd)
            .unwrap_err();
        assert!(matches!(
            err,
            Iec104Error::UnsupportedOperation {
                role: "client",
                operation: "general call end"
            }
        ));

        let err = server.push(Operation::GeneralCall).unwrap_err();
        assert!(matches!(
            err,
            Iec104Error::UnsupportedOperation {
                role: "server",
                operation: "general call"
            }
        ));

        let err = server
            .push(Operation::Telecontrol {
                points: BTreeMap::new(),
            })
            .unwrap_err();
        assert!(matches!(err, Iec104Error::UnsupportedOperation { .. }));
    }

    #[test]
    fn test_push_requires_active_link() {
        let mut client = LinkStateMachine::new(Role::Client, 0);
        client.on_connect();
        assert!(client.push(Operation::GeneralCall).is_err());
    }

    #[test]
    fn test_unsupported_frame_is_dropped_not_fatal() {
        let (mut client, _) = active_pair();

        // a telesignal with an unexpected cause
        let asdu = Asdu::new(
            TypeId::SinglePoint,
            Cot::Activation,
            0,
            vec![crate::types::InformationObject::new(1)
                .with_value(bytes::Bytes::from_static(&[1]))],
        );
        let out = client.handle(Frame::i_frame(0, 0, asdu), now());

        // acked and dropped; the link stays up and in sequence
        assert_eq!(out.frames, vec![Frame::s_frame(1)]);
        assert!(out.operations.is_empty());
        assert!(client.is_active());
    }

    #[test]
    fn test_on_close_is_idempotent() {
        let (mut client, _) = active_pair();
        assert_eq!(client.on_close(), Operation::LinkClosed);
        assert_eq!(client.state(), LinkState::Closed);
        assert_eq!(client.on_close(), Operation::LinkClosed);
        assert!(client.cache().is_empty());
    }

    #[test]
    fn test_general_interrogation_scenario() {
        let (mut client, mut server) = active_pair();
        let time = now();

        // client requests the general interrogation
        let gi = client.push(Operation::GeneralCall).unwrap();
        assert_eq!(
            encode(&gi[0]),
            vec![
                0x68, 0x0E, 0x00, 0x00, 0x00, 0x00, // I(S=0, R=0)
                0x64, 0x01, 0x06, 0x00, 0x00, 0x00, // TI=100 VSQ=1 COT=6 CA=0
                0x00, 0x00, 0x00, 0x14
            ]
        );

        // server confirms and raises the interrogation request
        let server_out = server.handle(gi[0].clone(), time);
        assert_eq!(server_out.frames[0], Frame::s_frame(1));
        assert_eq!(server_out.operations, vec![Operation::GeneralCall]);
        let confirm = &server_out.frames[1];
        assert_eq!(confirm.asdu.as_ref().unwrap().cot, Cot::ActivationConfirm);

        let out = client.handle(confirm.clone(), time);
        assert_eq!(out.frames, vec![Frame::s_frame(1)]);
        assert!(out.operations.is_empty());

        // the collaborator answers with reports and the end marker
        let signals = server
            .push(Operation::GeneralCallTelesignal {
                points: BTreeMap::from([(1u32, 1u8), (2, 0)]),
            })
            .unwrap();
        let measures = server
            .push(Operation::GeneralCallTelemetry {
                points: BTreeMap::from([(0x4001u32, 31.25f32)]),
            })
            .unwrap();
        let end = server.push(Operation::GeneralCallEnd).unwrap();

        let out = client.handle(signals[0].clone(), time);
        assert_eq!(
            out.operations,
            vec![Operation::GeneralCallTelesignal {
                points: BTreeMap::from([(1u32, 1u8), (2, 0)])
            }]
        );

        let out = client.handle(measures[0].clone(), time);
        assert_eq!(
            out.operations,
            vec![Operation::GeneralCallTelemetry {
                points: BTreeMap::from([(0x4001u32, 31.25f32)])
            }]
        );

        // the end marker raises the event and autonomously requests a
        // clock synchronization
        let out = client.handle(end[0].clone(), time);
        assert_eq!(out.operations, vec![Operation::GeneralCallEnd]);
        assert_eq!(out.frames.len(), 2);
        assert_eq!(out.frames[0], Frame::s_frame(4));
        let sync = &out.frames[1];
        let sync_asdu = sync.asdu.as_ref().unwrap();
        assert_eq!(sync_asdu.type_id, TypeId::ClockSync);
        assert_eq!(sync_asdu.cot, Cot::Activation);
        assert_eq!(sync_asdu.objects[0].timestamp, Some(time));

        // server confirms the clock sync with its own time
        let out = server.handle(sync.clone(), time);
        let sync_confirm = &out.frames[1];
        assert_eq!(
            sync_confirm.asdu.as_ref().unwrap().cot,
            Cot::ActivationConfirm
        );

        // which makes the client issue a clock read
        let out = client.handle(sync_confirm.clone(), time);
        let read = &out.frames[1];
        assert_eq!(read.asdu.as_ref().unwrap().cot, Cot::Request);

        // the server replies, the client only logs the reply
        let out = server.handle(read.clone(), time);
        let read_reply = &out.frames[1];
        assert_eq!(read_reply.asdu.as_ref().unwrap().cot, Cot::Request);

        let out = client.handle(read_reply.clone(), time);
        assert_eq!(out.frames.len(), 1);
        assert!(out.operations.is_empty());
    }

    #[test]
    fn test_select_execute_scenario() {
        let (mut client, mut server) = active_pair();
        let time = now();

        // select double commands at 100 (on) and 200 (off)
        let select = client
            .push(Operation::Telecontrol {
                points: BTreeMap::from([(100u32, 1u8), (200, 0)]),
            })
            .unwrap();
        assert_eq!(
            encode(&select[0]),
            vec![
                0x68, 0x12, 0x00, 0x00, 0x00, 0x00, // I(S=0, R=0)
                0x2E, 0x02, 0x06, 0x00, 0x00, 0x00, // TI=46 VSQ=2 COT=6 CA=0
                0x64, 0x00, 0x00, 0x82, // 100 -> select|on
                0xC8, 0x00, 0x00, 0x80 // 200 -> select|off
            ]
        );

        // server echoes the selection with COT=7
        let out = server.handle(select[0].clone(), time);
        assert!(out.operations.is_empty());
        let select_confirm = out.frames[1].clone();
        let asdu = select_confirm.asdu.as_ref().unwrap();
        assert_eq!(asdu.cot, Cot::ActivationConfirm);
        assert_eq!(asdu.objects[0].value_byte(), Some(0x82));
        assert_eq!(asdu.objects[1].value_byte(), Some(0x80));

        // the confirmation triggers the execute phase: select bit cleared
        let out = client.handle(select_confirm, time);
        assert!(out.operations.is_empty());
        let execute = out.frames[1].clone();
        {
            let asdu = execute.asdu.as_ref().unwrap();
            assert_eq!(asdu.cot, Cot::Activation);
            assert_eq!(asdu.objects[0].value_byte(), Some(0x02));
            assert_eq!(asdu.objects[1].value_byte(), Some(0x00));
        }
        let execute_bytes = encode(&execute);
        assert_eq!(
            &execute_bytes[6..],
            &[
                0x2E, 0x02, 0x06, 0x00, 0x00, 0x00, //
                0x64, 0x00, 0x00, 0x02, //
                0xC8, 0x00, 0x00, 0x00
            ]
        );

        // server confirms, raises the control to the collaborator, then
        // terminates the handshake; both echoes carry the execute payload
        let out = server.handle(execute, time);
        assert_eq!(
            out.operations,
            vec![Operation::Telecontrol {
                points: BTreeMap::from([(100u32, 1u8), (200, 0)])
            }]
        );
        let execute_confirm = out.frames[1].clone();
        let terminate = out.frames[2].clone();
        assert_eq!(
            &encode(&execute_confirm)[6..],
            &[
                0x2E, 0x02, 0x07, 0x00, 0x00, 0x00, //
                0x64, 0x00, 0x00, 0x02, //
                0xC8, 0x00, 0x00, 0x00
            ]
        );
        assert_eq!(
            &encode(&terminate)[6..],
            &[
                0x2E, 0x02, 0x0A, 0x00, 0x00, 0x00, //
                0x64, 0x00, 0x00, 0x02, //
                0xC8, 0x00, 0x00, 0x00
            ]
        );

        // the client logs both without further action
        let out = client.handle(execute_confirm, time);
        assert_eq!(out.frames.len(), 1);
        let out = client.handle(terminate, time);
        assert_eq!(out.frames.len(), 1);
        assert!(out.operations.is_empty());
    }

    #[test]
    fn test_single_command_execute_on_server() {
        let (_, mut server) = active_pair();

        // single command, execute phase, state on
        let asdu = Asdu::new(
            TypeId::SingleCommand,
            Cot::Activation,
            0,
            vec![crate::types::InformationObject::new(42)
                .with_value(bytes::Bytes::from_static(&[0x01]))],
        );
        let out = server.handle(Frame::i_frame(0, 0, asdu), now());

        assert_eq!(
            out.operations,
            vec![Operation::Telecontrol {
                points: BTreeMap::from([(42u32, 1u8)])
            }]
        );
        // ack + confirm + terminate
        assert_eq!(out.frames.len(), 3);
    }

    #[test]
    fn test_spontaneous_reports_reach_client() {
        let (mut client, mut server) = active_pair();

        let signal = server
            .push(Operation::Telesignal {
                points: BTreeMap::from([(7u32, 1u8)]),
            })
            .unwrap();
        let out = client.handle(signal[0].clone(), now());
        assert_eq!(
            out.operations,
            vec![Operation::Telesignal {
                points: BTreeMap::from([(7u32, 1u8)])
            }]
        );

        let measure = server
            .push(Operation::Telemetry {
                points: BTreeMap::from([(8u32, -3.14f32)]),
            })
            .unwrap();
        let out = client.handle(measure[0].clone(), now());
        assert_eq!(
            out.operations,
            vec![Operation::Telemetry {
                points: BTreeMap::from([(8u32, -3.14f32)])
            }]
        );
    }

    #[test]
    fn test_scaled_measurement_widens_to_float() {
        let (mut client, _) = active_pair();

        let asdu = Asdu::new(
            TypeId::MeasuredScaled,
            Cot::Spontaneous,
            0,
            vec![crate::types::InformationObject::new(9)
                .with_value(bytes::Bytes::copy_from_slice(&(-120i16).to_le_bytes()))
                .with_qualifier(crate::types::Qualifier::Measurement)],
        );
        let out = client.handle(Frame::i_frame(0, 0, asdu), now());
        assert_eq!(
            out.operations,
            vec![Operation::Telemetry {
                points: BTreeMap::from([(9u32, -120.0f32)])
            }]
        );
    }
}
