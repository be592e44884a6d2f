//! IEC 60870-5-104 Cause of Transmission (COT).
//!
//! Carried as a 2-byte little-endian field on the wire; only the causes the
//! engine actually speaks are accepted.

use crate::error::{Iec104Error, Result};

/// Cause of Transmission (COT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Cot {
    /// Periodic, cyclic (1)
    Periodic = 1,

    /// Spontaneous (3)
    Spontaneous = 3,

    /// Initialized (4)
    Initialized = 4,

    /// Request or requested (5)
    Request = 5,

    /// Activation (6)
    Activation = 6,

    /// Activation confirmation (7)
    ActivationConfirm = 7,

    /// Deactivation (8)
    Deactivation = 8,

    /// Deactivation confirmation (9)
    DeactivationConfirm = 9,

    /// Activation termination (10)
    ActivationTermination = 10,

    /// Interrogated by station interrogation (20)
    InterrogatedByStation = 20,
}

impl Cot {
    /// Create COT from the raw 2-byte wire value.
    #[inline]
    pub fn from_u16(value: u16) -> Result<Self> {
        match value {
            1 => Ok(Self::Periodic),
            3 => Ok(Self::Spontaneous),
            4 => Ok(Self::Initialized),
            5 => Ok(Self::Request),
            6 => Ok(Self::Activation),
            7 => Ok(Self::ActivationConfirm),
            8 => Ok(Self::Deactivation),
            9 => Ok(Self::DeactivationConfirm),
            10 => Ok(Self::ActivationTermination),
            20 => Ok(Self::InterrogatedByStation),
            _ => Err(Iec104Error::UnknownCot(value)),
        }
    }

    /// Convert to the raw 2-byte wire value.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Check if this is a positive confirmation.
    #[inline]
    pub const fn is_confirmation(&self) -> bool {
        matches!(
            self,
            Self::ActivationConfirm | Self::DeactivationConfirm | Self::ActivationTermination
        )
    }
}

impl std::fmt::Display for Cot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Periodic => "Periodic",
            Self::Spontaneous => "Spontaneous",
            Self::Initialized => "Initialized",
            Self::Request => "Request",
            Self::Activation => "Activation",
            Self::ActivationConfirm => "ActivationConfirm",
            Self::Deactivation => "Deactivation",
            Self::DeactivationConfirm => "DeactivationConfirm",
            Self::ActivationTermination => "ActivationTermination",
            Self::InterrogatedByStation => "InterrogatedByStation",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cot_roundtrip() {
        for val in [1u16, 3, 4, 5, 6, 7, 8, 9, 10, 20] {
            let cot = Cot::from_u16(val).unwrap();
            assert_eq!(cot.as_u16(), val, "Roundtrip failed for value {}", val);
        }
    }

    #[test]
    fn test_cot_invalid_values() {
        for val in [0u16, 2, 11, 19, 21, 44, 255, 0x0106] {
            assert!(
                Cot::from_u16(val).is_err(),
                "Expected error for COT value {}",
                val
            );
        }
    }

    #[test]
    fn test_cot_confirmation() {
        assert!(Cot::ActivationConfirm.is_confirmation());
        assert!(Cot::DeactivationConfirm.is_confirmation());
        assert!(Cot::ActivationTermination.is_confirmation());
        assert!(!Cot::Activation.is_confirmation());
        assert!(!Cot::Spontaneous.is_confirmation());
    }

    #[test]
    fn test_cot_display() {
        assert_eq!(Cot::Activation.to_string(), "Activation");
        assert_eq!(Cot::InterrogatedByStation.to_string(), "InterrogatedByStation");
    }
}
