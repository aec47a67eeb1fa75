//! Byte-coded calibration status, wrapped in a typed [`CalError`] for the
//! idiomatic entry points while staying convertible to the raw wire code a
//! caller might already be logging or forwarding.

/// Why a calibration call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalError {
    /// `SEL_PATH_RFE` is neither LNAL (3) nor LNAW (2) during Rx setup.
    UnsupportedRxPath,
    /// Tx band is neither BAND1 nor BAND2.
    UnsupportedTxBand,
    /// CGEN setup returned the wrapped collaborator status.
    Cgen(u8),
    /// SXR retune returned the wrapped collaborator status.
    Sxr(u8),
    /// SXT retune returned the wrapped collaborator status.
    Sxt(u8),
}

impl CalError {
    /// The wire-compatible status byte for this error, matching the
    /// reference's exit codes.
    pub const fn code(self) -> u8 {
        match self {
            Self::UnsupportedRxPath => 1,
            Self::UnsupportedTxBand => 5,
            Self::Cgen(s) => 0x30 + s,
            Self::Sxr(s) => 0x40 + s,
            Self::Sxt(s) => 0x50 + s,
        }
    }

    /// Recover a [`CalError`] from a wire-compatible status byte, if it
    /// names one of the errors this crate can produce.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::UnsupportedRxPath),
            5 => Some(Self::UnsupportedTxBand),
            0x30..=0x3F => Some(Self::Cgen(code - 0x30)),
            0x40..=0x4F => Some(Self::Sxr(code - 0x40)),
            0x50..=0x5F => Some(Self::Sxt(code - 0x50)),
            _ => None,
        }
    }
}

/// Translate a setup sub-step's raw non-zero status into the matching
/// [`CalError`] variant, or `Ok(())` on success.
pub(crate) fn cgen_result(status: u8) -> Result<(), CalError> {
    if status == 0 {
        Ok(())
    } else {
        Err(CalError::Cgen(status))
    }
}

pub(crate) fn sxr_result(status: u8) -> Result<(), CalError> {
    if status == 0 {
        Ok(())
    } else {
        Err(CalError::Sxr(status))
    }
}

pub(crate) fn sxt_result(status: u8) -> Result<(), CalError> {
    if status == 0 {
        Ok(())
    } else {
        Err(CalError::Sxt(status))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn code_roundtrip() {
        for err in [
            CalError::UnsupportedRxPath,
            CalError::UnsupportedTxBand,
            CalError::Cgen(2),
            CalError::Sxr(3),
            CalError::Sxt(7),
        ] {
            assert_eq!(CalError::from_code(err.code()), Some(err));
        }
    }

    #[test]
    fn matches_spec_exit_codes() {
        assert_eq!(CalError::UnsupportedRxPath.code(), 1);
        assert_eq!(CalError::UnsupportedTxBand.code(), 5);
        assert_eq!(CalError::Sxr(2).code(), 0x52 - 0x10);
        assert_eq!(CalError::Sxt(2).code(), 0x52);
    }
}
