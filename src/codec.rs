//! IEC 60870-5-104 frame codec for tokio.
//!
//! Converts between the typed in-memory [`Frame`] and the exact wire layout
//! (start byte, length, 4-byte control field, optional ASDU) using the
//! tokio-util codec framework. A malformed frame consumes its bytes and
//! surfaces an error item; the connection itself survives.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::Iec104Error;
use crate::types::{Apci, Asdu, UFunction, MAX_APDU_LENGTH, MIN_APDU_LENGTH, START_BYTE};

/// One frame on the wire: APCI control information plus, for I-frames, the
/// application payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// APCI (Application Protocol Control Information)
    pub apci: Apci,
    /// ASDU (Application Service Data Unit) - only present in I-frames
    pub asdu: Option<Asdu>,
}

impl Frame {
    /// Create a new I-frame with ASDU.
    pub fn i_frame(send_seq: u16, recv_seq: u16, asdu: Asdu) -> Self {
        Self {
            apci: Apci::i_frame(send_seq, recv_seq),
            asdu: Some(asdu),
        }
    }

    /// Create a new S-frame.
    pub fn s_frame(recv_seq: u16) -> Self {
        Self {
            apci: Apci::s_frame(recv_seq),
            asdu: None,
        }
    }

    /// Create a new U-frame.
    pub fn u_frame(function: UFunction) -> Self {
        Self {
            apci: Apci::u_frame(function),
            asdu: None,
        }
    }

    /// Check if this is an I-frame.
    pub fn is_i_frame(&self) -> bool {
        self.apci.is_i_frame()
    }

    /// Check if this is an S-frame.
    pub fn is_s_frame(&self) -> bool {
        self.apci.is_s_frame()
    }

    /// Check if this is a U-frame.
    pub fn is_u_frame(&self) -> bool {
        self.apci.is_u_frame()
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.apci)?;
        if let Some(asdu) = &self.asdu {
            write!(
                f,
                " [{}] COT={} CA={}",
                asdu.type_id, asdu.cot, asdu.common_address
            )?;
        }
        Ok(())
    }
}

/// IEC 60870-5-104 frame codec.
///
/// # Example
///
/// ```rust,ignore
/// use tokio_util::codec::Framed;
/// use gridlink_iec104::codec::FrameCodec;
///
/// let stream = TcpStream::connect("192.168.1.100:2404").await?;
/// let mut framed = Framed::new(stream, FrameCodec::new());
///
/// framed.send(Frame::u_frame(UFunction::StartDtAct)).await?;
/// while let Some(frame) = framed.next().await {
///     println!("Received: {:?}", frame?);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    // State for handling partial frames
    state: DecodeState,
}

#[derive(Debug, Clone, Default)]
enum DecodeState {
    #[default]
    WaitingForStart,
    WaitingForLength,
    WaitingForData {
        length: usize,
    },
}

impl FrameCodec {
    /// Create a new frame codec.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Iec104Error;

    fn decode(
        &mut self,
        src: &mut BytesMut,
    ) -> std::result::Result<Option<Self::Item>, Self::Error> {
        loop {
            match &self.state {
                DecodeState::WaitingForStart => {
                    // Skip bytes until the start byte
                    while !src.is_empty() && src[0] != START_BYTE {
                        src.advance(1);
                    }

                    if src.is_empty() {
                        return Ok(None);
                    }

                    self.state = DecodeState::WaitingForLength;
                }

                DecodeState::WaitingForLength => {
                    if src.len() < 2 {
                        return Ok(None);
                    }

                    let length = src[1] as usize;
                    if !(MIN_APDU_LENGTH..=MAX_APDU_LENGTH).contains(&length) {
                        // Invalid length, skip the start byte and resync
                        src.advance(1);
                        self.state = DecodeState::WaitingForStart;
                        continue;
                    }

                    self.state = DecodeState::WaitingForData { length };
                }

                DecodeState::WaitingForData { length } => {
                    let total_length = 2 + length; // start + length byte + APDU content

                    if src.len() < total_length {
                        return Ok(None);
                    }

                    // Consume the complete record before parsing so a
                    // malformed frame never wedges the buffer.
                    let record = src.split_to(total_length);
                    self.state = DecodeState::WaitingForStart;

                    let apci = Apci::parse(&record[2..6])?;
                    let asdu = if apci.is_i_frame() && record.len() > 6 {
                        Some(Asdu::parse(&record[6..])?)
                    } else {
                        None
                    };

                    return Ok(Some(Frame { apci, asdu }));
                }
            }
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Iec104Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> std::result::Result<(), Self::Error> {
        let asdu_len = item.asdu.as_ref().map(|a| a.encoded_len()).unwrap_or(0);

        if asdu_len > MAX_APDU_LENGTH - 4 {
            return Err(Iec104Error::invalid_asdu("ASDU too large"));
        }

        dst.reserve(6 + asdu_len);
        dst.extend_from_slice(&item.apci.encode_header(asdu_len));
        if let Some(asdu) = &item.asdu {
            asdu.encode_to(dst);
        }

        Ok(())
    }
}
