//! ASDU builders.
//!
//! Every ASDU the engine originates is built here: operation-driven frames
//! (interrogation, reports, controls), protocol-driven replies (confirms,
//! terminations, clock responses) and echoes of received command objects.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::bytecodec;
use crate::types::{Asdu, Cot, InformationObject, Qualifier, TypeId};

/// Information object address used by station-wide commands.
const STATION_ADDRESS: u32 = 0;

/// General interrogation command (activation).
pub fn general_call_command(common_address: u16) -> Asdu {
    general_call(common_address, Cot::Activation)
}

/// General interrogation confirmation.
pub fn general_call_confirm(common_address: u16) -> Asdu {
    general_call(common_address, Cot::ActivationConfirm)
}

/// General interrogation termination (end of the report burst).
pub fn general_call_end(common_address: u16) -> Asdu {
    general_call(common_address, Cot::ActivationTermination)
}

fn general_call(common_address: u16, cot: Cot) -> Asdu {
    Asdu::new(
        TypeId::GeneralInterrogation,
        cot,
        common_address,
        vec![InformationObject::new(STATION_ADDRESS).with_qualifier(Qualifier::GeneralInterrogation)],
    )
}

/// End-of-initialization report sent by the server once the link is started.
pub fn init_end(common_address: u16) -> Asdu {
    Asdu::new(
        TypeId::EndOfInit,
        Cot::Initialized,
        common_address,
        vec![InformationObject::new(STATION_ADDRESS).with_value(Bytes::from_static(&[0x00]))],
    )
}

/// Single-point status report (spontaneous, or tagged as part of a general
/// interrogation).
pub fn telesignal(common_address: u16, general_call: bool, points: &BTreeMap<u32, u8>) -> Asdu {
    let objects = points
        .iter()
        .map(|(&address, &value)| {
            InformationObject::new(address).with_value(Bytes::copy_from_slice(&[value]))
        })
        .collect();
    Asdu::new(
        TypeId::SinglePoint,
        report_cot(general_call),
        common_address,
        objects,
    )
}

/// Short-float measurement report (spontaneous, or tagged as part of a
/// general interrogation).
pub fn telemetry(common_address: u16, general_call: bool, points: &BTreeMap<u32, f32>) -> Asdu {
    let objects = points
        .iter()
        .map(|(&address, &value)| {
            InformationObject::new(address)
                .with_value(Bytes::copy_from_slice(&bytecodec::encode_f32(value)))
                .with_qualifier(Qualifier::Measurement)
        })
        .collect();
    Asdu::new(
        TypeId::MeasuredFloat,
        report_cot(general_call),
        common_address,
        objects,
    )
}

fn report_cot(general_call: bool) -> Cot {
    if general_call {
        Cot::InterrogatedByStation
    } else {
        Cot::Spontaneous
    }
}

/// Clock synchronization command carrying the current time.
pub fn clock_sync_command(common_address: u16, time: DateTime<Utc>) -> Asdu {
    clock(common_address, Cot::Activation, time)
}

/// Clock synchronization confirmation carrying the server's time.
pub fn clock_sync_confirm(common_address: u16, time: DateTime<Utc>) -> Asdu {
    clock(common_address, Cot::ActivationConfirm, time)
}

/// Clock read request.
pub fn clock_read_command(common_address: u16, time: DateTime<Utc>) -> Asdu {
    clock(common_address, Cot::Request, time)
}

/// Clock read reply carrying the server's time.
pub fn clock_read_reply(common_address: u16, time: DateTime<Utc>) -> Asdu {
    clock(common_address, Cot::Request, time)
}

fn clock(common_address: u16, cot: Cot, time: DateTime<Utc>) -> Asdu {
    Asdu::new(
        TypeId::ClockSync,
        cot,
        common_address,
        vec![InformationObject::new(STATION_ADDRESS).with_timestamp(time)],
    )
}

/// Remote control select command (double command, select phase).
///
/// Business value 1 maps to command state 2 ("on"), value 0 to state 0.
pub fn telecontrol_select(common_address: u16, points: &BTreeMap<u32, u8>) -> Asdu {
    let objects = points
        .iter()
        .map(|(&address, &value)| {
            let state = if value == 1 { 2 } else { 0 };
            let dco = bytecodec::build_dco(true, 0, state);
            InformationObject::new(address).with_value(Bytes::copy_from_slice(&[dco]))
        })
        .collect();
    Asdu::new(
        TypeId::DoubleCommand,
        Cot::Activation,
        common_address,
        objects,
    )
}

/// Remote control execute command built from a received select confirmation:
/// the same objects with the select flag cleared.
pub fn telecontrol_execute(common_address: u16, received: &Asdu) -> Asdu {
    let objects = received
        .objects
        .iter()
        .map(|object| {
            let value = object.value_byte().unwrap_or(0);
            InformationObject::new(object.address)
                .with_value(Bytes::copy_from_slice(&[bytecodec::command_clear_select(value)]))
        })
        .collect();
    Asdu::new(received.type_id, Cot::Activation, common_address, objects)
}

/// Echo a received ASDU unchanged except for the cause of transmission.
///
/// Used for command confirmations and terminations, which return the
/// received objects verbatim.
pub fn echo_with_cot(common_address: u16, received: &Asdu, cot: Cot) -> Asdu {
    Asdu {
        type_id: received.type_id,
        vsq: received.vsq,
        cot,
        common_address,
        objects: received.objects.clone(),
    }
}
