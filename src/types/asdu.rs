//! IEC 60870-5-104 ASDU (Application Service Data Unit).
//!
//! The ASDU is the typed, addressed payload of an I-frame: a fixed 6-byte
//! header (type id, VSQ, cause of transmission, common address) followed by
//! one or more information objects whose byte layout is determined entirely
//! by the type identifier.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};

use crate::bytecodec;
use crate::error::{Iec104Error, Result};
use crate::types::{Cot, TypeId};

/// Variable Structure Qualifier (VSQ).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vsq {
    /// Number of information objects (1-127)
    pub count: u8,
    /// If true, only the first object carries an explicit address and
    /// subsequent addresses increment from it (SQ=1)
    pub sequential: bool,
}

impl Vsq {
    /// Create a new VSQ.
    #[inline]
    pub const fn new(count: u8, sequential: bool) -> Self {
        Self { count, sequential }
    }

    /// Parse VSQ from byte.
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        Self {
            count: value & 0x7F,
            sequential: (value & 0x80) != 0,
        }
    }

    /// Encode VSQ to byte.
    #[inline]
    pub const fn as_u8(&self) -> u8 {
        (self.count & 0x7F) | if self.sequential { 0x80 } else { 0 }
    }
}

/// Qualifier byte following the value field of some object types.
///
/// Only the two qualifiers the engine speaks are accepted; anything else on
/// the wire is a decode error and the frame is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Qualifier {
    /// Measured-value quality descriptor, all flags clear (0x00)
    Measurement = 0x00,
    /// Station (general) interrogation qualifier (0x14)
    GeneralInterrogation = 0x14,
}

impl Qualifier {
    /// Parse a qualifier byte.
    #[inline]
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(Self::Measurement),
            0x14 => Ok(Self::GeneralInterrogation),
            _ => Err(Iec104Error::UnknownQualifier(value)),
        }
    }

    /// Encode to the raw byte.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// One addressed information object.
///
/// Which of the optional fields are present is not free-form: it follows the
/// [`ObjectLayout`](crate::types::ObjectLayout) of the enclosing ASDU's type
/// identifier, for encode and decode alike.
#[derive(Debug, Clone, PartialEq)]
pub struct InformationObject {
    /// Information object address (24-bit)
    pub address: u32,
    /// Raw value bytes (1, 2 or 4 bytes depending on type)
    pub value: Option<Bytes>,
    /// Qualifier byte
    pub qualifier: Option<Qualifier>,
    /// CP56Time2a timestamp
    pub timestamp: Option<DateTime<Utc>>,
}

impl InformationObject {
    /// Create an object with only an address.
    pub fn new(address: u32) -> Self {
        Self {
            address: address & 0x00FF_FFFF,
            value: None,
            qualifier: None,
            timestamp: None,
        }
    }

    /// Attach raw value bytes.
    pub fn with_value(mut self, value: impl Into<Bytes>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Attach a qualifier.
    pub fn with_qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifier = Some(qualifier);
        self
    }

    /// Attach a timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// First value byte, if any. Command objects carry their select/execute
    /// flag and command state here.
    pub fn value_byte(&self) -> Option<u8> {
        self.value.as_ref().and_then(|v| v.first().copied())
    }

    /// Encode the object address to 3 bytes (little-endian).
    #[inline]
    pub fn address_bytes(&self) -> [u8; 3] {
        [
            (self.address & 0xFF) as u8,
            ((self.address >> 8) & 0xFF) as u8,
            ((self.address >> 16) & 0xFF) as u8,
        ]
    }

    /// Parse a 3-byte little-endian object address.
    #[inline]
    pub fn parse_address(bytes: &[u8]) -> Result<u32> {
        if bytes.len() < 3 {
            return Err(Iec104Error::invalid_asdu("Object address too short"));
        }
        Ok(bytes[0] as u32 | ((bytes[1] as u32) << 8) | ((bytes[2] as u32) << 16))
    }
}

/// Complete ASDU.
#[derive(Debug, Clone, PartialEq)]
pub struct Asdu {
    /// Type identification
    pub type_id: TypeId,
    /// Variable structure qualifier
    pub vsq: Vsq,
    /// Cause of transmission
    pub cot: Cot,
    /// Common address of ASDU (station address)
    pub common_address: u16,
    /// Information objects, `vsq.count` of them
    pub objects: Vec<InformationObject>,
}

impl Asdu {
    /// Create an ASDU with non-sequential object addressing.
    ///
    /// The VSQ count is derived from the object list.
    pub fn new(type_id: TypeId, cot: Cot, common_address: u16, objects: Vec<InformationObject>) -> Self {
        Self {
            type_id,
            vsq: Vsq::new(objects.len() as u8, false),
            cot,
            common_address,
            objects,
        }
    }

    /// Parse an ASDU from the bytes following the APCI.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 6 {
            return Err(Iec104Error::invalid_asdu("ASDU header too short"));
        }

        let type_id = TypeId::from_u8(data[0])?;
        let vsq = Vsq::from_u8(data[1]);
        let cot = Cot::from_u16(bytecodec::decode_u16(&data[2..4])?)?;
        let common_address = bytecodec::decode_u16(&data[4..6])?;

        let layout = type_id.layout();
        let count = vsq.count as usize;
        let mut objects = Vec::with_capacity(count);
        let mut offset = 6;

        let mut sequential_address = if vsq.sequential && count > 0 {
            let address = InformationObject::parse_address(&data[offset..])?;
            offset += 3;
            Some(address)
        } else {
            None
        };

        for _ in 0..count {
            let address = match sequential_address {
                Some(address) => {
                    sequential_address = Some(address + 1);
                    address
                }
                None => {
                    let address = InformationObject::parse_address(&data[offset..])?;
                    offset += 3;
                    address
                }
            };

            let mut object = InformationObject::new(address);

            if layout.value_len > 0 {
                if data.len() < offset + layout.value_len {
                    return Err(Iec104Error::invalid_asdu("Object value truncated"));
                }
                object.value = Some(Bytes::copy_from_slice(
                    &data[offset..offset + layout.value_len],
                ));
                offset += layout.value_len;
            }

            if layout.has_qualifier {
                if data.len() < offset + 1 {
                    return Err(Iec104Error::invalid_asdu("Object qualifier truncated"));
                }
                object.qualifier = Some(Qualifier::from_u8(data[offset])?);
                offset += 1;
            }

            if layout.has_timestamp {
                if data.len() < offset + 7 {
                    return Err(Iec104Error::invalid_asdu("Object timestamp truncated"));
                }
                object.timestamp = Some(bytecodec::decode_cp56time2a(&data[offset..offset + 7])?);
                offset += 7;
            }

            objects.push(object);
        }

        Ok(Self {
            type_id,
            vsq,
            cot,
            common_address,
            objects,
        })
    }

    /// Encode the ASDU into the provided buffer.
    pub fn encode_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.type_id.as_u8());
        buf.put_u8(self.vsq.as_u8());
        buf.put_u16_le(self.cot.as_u16());
        buf.put_u16_le(self.common_address);

        if self.vsq.sequential {
            if let Some(first) = self.objects.first() {
                buf.put_slice(&first.address_bytes());
            }
            for object in &self.objects {
                Self::encode_object_fields(object, buf);
            }
        } else {
            for object in &self.objects {
                buf.put_slice(&object.address_bytes());
                Self::encode_object_fields(object, buf);
            }
        }
    }

    fn encode_object_fields(object: &InformationObject, buf: &mut BytesMut) {
        if let Some(value) = &object.value {
            buf.put_slice(value);
        }
        if let Some(qualifier) = &object.qualifier {
            buf.put_u8(qualifier.as_u8());
        }
        if let Some(timestamp) = &object.timestamp {
            buf.put_slice(&bytecodec::encode_cp56time2a(*timestamp));
        }
    }

    /// Encode the ASDU to a fresh buffer.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_to(&mut buf);
        buf
    }

    /// Calculate the encoded length of this ASDU.
    pub fn encoded_len(&self) -> usize {
        let address_len = if self.vsq.sequential {
            if self.objects.is_empty() {
                0
            } else {
                3
            }
        } else {
            3 * self.objects.len()
        };
        let field_len: usize = self
            .objects
            .iter()
            .map(|object| {
                object.value.as_ref().map_or(0, |v| v.len())
                    + object.qualifier.map_or(0, |_| 1)
                    + object.timestamp.map_or(0, |_| 7)
            })
            .sum();
        6 + address_len + field_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_vsq() {
        let vsq = Vsq::new(10, false);
        assert_eq!(vsq.as_u8(), 10);

        let vsq = Vsq::new(10, true);
        assert_eq!(vsq.as_u8(), 0x8A);

        let vsq = Vsq::from_u8(0x8A);
        assert_eq!(vsq.count, 10);
        assert!(vsq.sequential);
    }

    #[test]
    fn test_qualifier() {
        assert_eq!(Qualifier::from_u8(0x14).unwrap(), Qualifier::GeneralInterrogation);
        assert_eq!(Qualifier::from_u8(0x00).unwrap(), Qualifier::Measurement);
        assert!(Qualifier::from_u8(0x15).is_err());
        assert!(Qualifier::from_u8(0xFF).is_err());
    }

    #[test]
    fn test_object_address_bytes() {
        let object = InformationObject::new(0x123456);
        assert_eq!(object.address_bytes(), [0x56, 0x34, 0x12]);
        assert_eq!(
            InformationObject::parse_address(&[0x56, 0x34, 0x12]).unwrap(),
            0x123456
        );
    }

    #[test]
    fn test_object_address_masked_to_24_bits() {
        let object = InformationObject::new(0xFF123456);
        assert_eq!(object.address, 0x123456);
    }

    #[test]
    fn test_general_interrogation_roundtrip() {
        let asdu = Asdu::new(
            TypeId::GeneralInterrogation,
            Cot::Activation,
            0,
            vec![InformationObject::new(0).with_qualifier(Qualifier::GeneralInterrogation)],
        );

        let encoded = asdu.encode();
        assert_eq!(
            &encoded[..],
            &[0x64, 0x01, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x14]
        );
        assert_eq!(encoded.len(), asdu.encoded_len());

        let decoded = Asdu::parse(&encoded).unwrap();
        assert_eq!(decoded, asdu);
    }

    #[test]
    fn test_clock_sync_roundtrip() {
        let time = Utc.with_ymd_and_hms(2023, 6, 1, 12, 12, 12).unwrap();
        let asdu = Asdu::new(
            TypeId::ClockSync,
            Cot::Activation,
            0,
            vec![InformationObject::new(0).with_timestamp(time)],
        );

        let encoded = asdu.encode();
        assert_eq!(
            &encoded[..],
            &[
                0x67, 0x01, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xE0, 0x2E, 0x0C, 0x0C,
                0x81, 0x06, 0x17
            ]
        );

        let decoded = Asdu::parse(&encoded).unwrap();
        assert_eq!(decoded, asdu);
        assert_eq!(decoded.objects[0].timestamp, Some(time));
    }

    #[test]
    fn test_measured_float_roundtrip() {
        let asdu = Asdu::new(
            TypeId::MeasuredFloat,
            Cot::Spontaneous,
            0,
            vec![
                InformationObject::new(0x4001)
                    .with_value(Bytes::copy_from_slice(&3.14f32.to_le_bytes()))
                    .with_qualifier(Qualifier::Measurement),
                InformationObject::new(0x4002)
                    .with_value(Bytes::copy_from_slice(&(-3.14f32).to_le_bytes()))
                    .with_qualifier(Qualifier::Measurement),
            ],
        );

        let encoded = asdu.encode();
        let decoded = Asdu::parse(&encoded).unwrap();
        assert_eq!(decoded, asdu);
        assert_eq!(decoded.vsq.count, 2);
    }

    #[test]
    fn test_sequential_addressing_roundtrip() {
        let mut asdu = Asdu::new(
            TypeId::SinglePoint,
            Cot::InterrogatedByStation,
            0,
            vec![
                InformationObject::new(100).with_value(Bytes::from_static(&[1])),
                InformationObject::new(101).with_value(Bytes::from_static(&[0])),
                InformationObject::new(102).with_value(Bytes::from_static(&[1])),
            ],
        );
        asdu.vsq = Vsq::new(3, true);

        let encoded = asdu.encode();
        // header + one address + three 1-byte values
        assert_eq!(encoded.len(), 6 + 3 + 3);

        let decoded = Asdu::parse(&encoded).unwrap();
        assert_eq!(decoded.objects.len(), 3);
        assert_eq!(decoded.objects[0].address, 100);
        assert_eq!(decoded.objects[1].address, 101);
        assert_eq!(decoded.objects[2].address, 102);
        assert_eq!(decoded, asdu);
    }

    #[test]
    fn test_time_tagged_point_roundtrip() {
        let time = Utc.with_ymd_and_hms(2024, 2, 29, 8, 30, 0).unwrap();
        let asdu = Asdu::new(
            TypeId::SinglePointTime,
            Cot::Spontaneous,
            0,
            vec![InformationObject::new(7)
                .with_value(Bytes::from_static(&[1]))
                .with_timestamp(time)],
        );

        let decoded = Asdu::parse(&asdu.encode()).unwrap();
        assert_eq!(decoded, asdu);
    }

    #[test]
    fn test_parse_header_too_short() {
        assert!(Asdu::parse(&[0x64, 0x01, 0x06, 0x00, 0x00]).is_err());
    }

    #[test]
    fn test_parse_unknown_type() {
        assert!(matches!(
            Asdu::parse(&[0xFF, 0x01, 0x06, 0x00, 0x00, 0x00]),
            Err(Iec104Error::UnknownTypeId(0xFF))
        ));
    }

    #[test]
    fn test_parse_unknown_cot() {
        assert!(matches!(
            Asdu::parse(&[0x64, 0x01, 0x0B, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x14]),
            Err(Iec104Error::UnknownCot(11))
        ));
    }

    #[test]
    fn test_parse_unknown_qualifier() {
        assert!(matches!(
            Asdu::parse(&[0x64, 0x01, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2A]),
            Err(Iec104Error::UnknownQualifier(0x2A))
        ));
    }

    #[test]
    fn test_parse_truncated_object() {
        // double command missing its value byte
        assert!(Asdu::parse(&[0x2E, 0x01, 0x06, 0x00, 0x00, 0x00, 0x64, 0x00, 0x00]).is_err());
    }
}
