//! IEC 60870-5-104 Type Identification.
//!
//! The type identifier selects the information content of an ASDU and fully
//! determines the byte layout of its information objects.

use crate::error::{Iec104Error, Result};

/// IEC 60870-5-104 Type Identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeId {
    /// Single-point information (M_SP_NA_1)
    SinglePoint = 1,

    /// Double-point information (M_DP_NA_1)
    DoublePoint = 3,

    /// Measured value, normalized (M_ME_NA_1)
    MeasuredNormalized = 9,

    /// Measured value, scaled (M_ME_NB_1)
    MeasuredScaled = 11,

    /// Measured value, short floating point (M_ME_NC_1)
    MeasuredFloat = 13,

    /// Single-point information with time tag CP56Time2a (M_SP_TB_1)
    SinglePointTime = 30,

    /// Double-point information with time tag CP56Time2a (M_DP_TB_1)
    DoublePointTime = 31,

    /// Single command (C_SC_NA_1)
    SingleCommand = 45,

    /// Double command (C_DC_NA_1)
    DoubleCommand = 46,

    /// End of initialization (M_EI_NA_1)
    EndOfInit = 70,

    /// Interrogation command (C_IC_NA_1)
    GeneralInterrogation = 100,

    /// Clock synchronization command (C_CS_NA_1)
    ClockSync = 103,
}

/// Information object byte layout for one type identifier.
///
/// Which fields follow the 3-byte object address is pure data, keyed by the
/// type identifier. Adding a type is a one-line change in [`TypeId::layout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectLayout {
    /// Length of the raw value field in bytes (0, 1, 2 or 4)
    pub value_len: usize,
    /// Whether a 1-byte qualifier follows the value
    pub has_qualifier: bool,
    /// Whether a 7-byte CP56Time2a timestamp closes the object
    pub has_timestamp: bool,
}

const fn layout(value_len: usize, has_qualifier: bool, has_timestamp: bool) -> ObjectLayout {
    ObjectLayout {
        value_len,
        has_qualifier,
        has_timestamp,
    }
}

impl TypeId {
    /// Create TypeId from raw byte value.
    #[inline]
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::SinglePoint),
            3 => Ok(Self::DoublePoint),
            9 => Ok(Self::MeasuredNormalized),
            11 => Ok(Self::MeasuredScaled),
            13 => Ok(Self::MeasuredFloat),
            30 => Ok(Self::SinglePointTime),
            31 => Ok(Self::DoublePointTime),
            45 => Ok(Self::SingleCommand),
            46 => Ok(Self::DoubleCommand),
            70 => Ok(Self::EndOfInit),
            100 => Ok(Self::GeneralInterrogation),
            103 => Ok(Self::ClockSync),
            _ => Err(Iec104Error::UnknownTypeId(value)),
        }
    }

    /// Convert to raw byte value.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Information object layout for this type.
    #[inline]
    pub const fn layout(self) -> ObjectLayout {
        match self {
            Self::SinglePoint => layout(1, false, false),
            Self::DoublePoint => layout(1, false, false),
            Self::MeasuredNormalized => layout(2, true, false),
            Self::MeasuredScaled => layout(2, true, false),
            Self::MeasuredFloat => layout(4, true, false),
            Self::SinglePointTime => layout(1, false, true),
            Self::DoublePointTime => layout(1, false, true),
            Self::SingleCommand => layout(1, false, false),
            Self::DoubleCommand => layout(1, false, false),
            Self::EndOfInit => layout(1, false, false),
            Self::GeneralInterrogation => layout(0, true, false),
            Self::ClockSync => layout(0, false, true),
        }
    }

    /// Check if this type carries status-point information (telesignalling).
    #[inline]
    pub const fn is_telesignal(&self) -> bool {
        matches!(
            self,
            Self::SinglePoint | Self::DoublePoint | Self::SinglePointTime | Self::DoublePointTime
        )
    }

    /// Check if this type carries measured values (telemetry).
    #[inline]
    pub const fn is_telemetry(&self) -> bool {
        matches!(
            self,
            Self::MeasuredNormalized | Self::MeasuredScaled | Self::MeasuredFloat
        )
    }

    /// Check if this type is a remote-control command.
    #[inline]
    pub const fn is_remote_control(&self) -> bool {
        matches!(self, Self::SingleCommand | Self::DoubleCommand)
    }

    /// Get the IEC standard name (e.g., "M_SP_NA_1").
    #[inline]
    pub const fn standard_name(&self) -> &'static str {
        match self {
            Self::SinglePoint => "M_SP_NA_1",
            Self::DoublePoint => "M_DP_NA_1",
            Self::MeasuredNormalized => "M_ME_NA_1",
            Self::MeasuredScaled => "M_ME_NB_1",
            Self::MeasuredFloat => "M_ME_NC_1",
            Self::SinglePointTime => "M_SP_TB_1",
            Self::DoublePointTime => "M_DP_TB_1",
            Self::SingleCommand => "C_SC_NA_1",
            Self::DoubleCommand => "C_DC_NA_1",
            Self::EndOfInit => "M_EI_NA_1",
            Self::GeneralInterrogation => "C_IC_NA_1",
            Self::ClockSync => "C_CS_NA_1",
        }
    }
}

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.standard_name())
    }
}
