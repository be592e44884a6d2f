//! Primitive binary helpers.
//!
//! Fixed-width little-endian integer and float codecs, the 7-byte CP56Time2a
//! timestamp codec, and hex/binary string rendering for diagnostics. All
//! multi-byte protocol fields are little-endian.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};

use crate::error::{Iec104Error, Result};

/// Encode a u16 to 2 bytes (little-endian).
#[inline]
pub fn encode_u16(value: u16) -> [u8; 2] {
    value.to_le_bytes()
}

/// Decode a u16 from 2 bytes (little-endian).
#[inline]
pub fn decode_u16(bytes: &[u8]) -> Result<u16> {
    if bytes.len() < 2 {
        return Err(Iec104Error::invalid_asdu("u16 field too short"));
    }
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Encode an IEEE-754 short float to 4 bytes (little-endian).
#[inline]
pub fn encode_f32(value: f32) -> [u8; 4] {
    value.to_le_bytes()
}

/// Decode an IEEE-754 short float from 4 bytes (little-endian).
#[inline]
pub fn decode_f32(bytes: &[u8]) -> Result<f32> {
    if bytes.len() < 4 {
        return Err(Iec104Error::invalid_asdu("f32 field too short"));
    }
    Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Encode a timestamp as CP56Time2a (7 bytes).
///
/// ```text
/// | Milliseconds (D7-D0)                  | milliseconds = 0-59999
/// | Milliseconds (D15-D8)                 | (second * 1000 + millisecond)
/// | IV(D7)  RES1(D6)     Minutes (D5-D0)  | minutes = 0-59
/// | SU(D7)  RES2(D6-D5)  Hours (D4-D0)    | hours = 0-23
/// | DayOfWeek(D7-D5)  DayOfMonth(D4-D0)   | day of week = 1 (Mon) - 7 (Sun)
/// | RES3(D7-D4)          Months (D3-D0)   | months = 1-12
/// | RES4(D7)             Year (D6-D0)     | years since 2000
/// ```
pub fn encode_cp56time2a(time: DateTime<Utc>) -> [u8; 7] {
    let millis = (time.second() * 1000 + time.timestamp_subsec_millis()) as u16;
    let weekday = time.weekday().number_from_monday() as u8;
    [
        (millis & 0xFF) as u8,
        (millis >> 8) as u8,
        time.minute() as u8,
        time.hour() as u8,
        (weekday << 5) | (time.day() as u8 & 0x1F),
        time.month() as u8 & 0x0F,
        (time.year() - 2000) as u8 & 0x7F,
    ]
}

/// Decode a CP56Time2a timestamp (7 bytes) back to an instant.
///
/// The day-of-week bits are ignored; the calendar date is authoritative.
pub fn decode_cp56time2a(bytes: &[u8]) -> Result<DateTime<Utc>> {
    if bytes.len() < 7 {
        return Err(Iec104Error::invalid_asdu("CP56Time2a too short"));
    }

    let millis = u16::from_le_bytes([bytes[0], bytes[1]]) as u32;
    let second = millis / 1000;
    let millisecond = millis % 1000;
    let minute = (bytes[2] & 0x3F) as u32;
    let hour = (bytes[3] & 0x1F) as u32;
    let day = (bytes[4] & 0x1F) as u32;
    let month = (bytes[5] & 0x0F) as u32;
    let year = 2000 + (bytes[6] & 0x7F) as i32;

    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
        .and_then(|t| t.with_nanosecond(millisecond * 1_000_000))
        .ok_or_else(|| Iec104Error::invalid_asdu("CP56Time2a fields out of range"))
}

/// Build a single command (SCO) value byte.
///
/// Bit 7 = select (1) / execute (0), bits 2-6 = output qualifier,
/// bit 0 = command state (0 = off, 1 = on).
#[inline]
pub fn build_sco(select: bool, output_qualifier: u8, state: u8) -> u8 {
    (u8::from(select) << 7) | ((output_qualifier & 0x1F) << 2) | (state & 0x01)
}

/// Build a double command (DCO) value byte.
///
/// Bit 7 = select (1) / execute (0), bits 2-6 = output qualifier,
/// bits 0-1 = command state.
#[inline]
pub fn build_dco(select: bool, output_qualifier: u8, state: u8) -> u8 {
    (u8::from(select) << 7) | ((output_qualifier & 0x1F) << 2) | (state & 0x03)
}

/// Read the select/execute flag of a command value byte.
#[inline]
pub fn command_is_select(value: u8) -> bool {
    value & 0x80 != 0
}

/// Clear the select flag, turning a select command into its execute form.
#[inline]
pub fn command_clear_select(value: u8) -> u8 {
    value & 0x7F
}

/// Read the command state bits of a double command value byte.
#[inline]
pub fn dco_state(value: u8) -> u8 {
    value & 0x03
}

/// Render bytes as upper-case hex, space-separated (`"68 04 07 00"`).
pub fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render bytes as 8-bit binary groups, space-separated (`"01101000 00000100"`).
pub fn binary_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:08b}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
