//! Clock/PLL control collaborator and the frequency plan driven off it.
//!
//! `Synth` is the out-of-scope tuning primitive this crate depends on: CGEN
//! and SX lock sequencing, VCO power-up, and the actual register writes
//! behind `set_frequency_*` all live on the caller's side of this trait.

use crate::bus::{modify_field, read_field, RegisterBus};
use crate::config::{CalibrationConfig, Direction};
use crate::regmap;

/// Clock generator and LO synthesizer control.
///
/// A non-zero return from either `set_frequency_*` method means the
/// requested lock could not be achieved; the calibration aborts and
/// surfaces that status (offset per §6/§7) rather than retrying.
pub trait Synth {
    fn frequency_cgen(&mut self) -> f64;
    fn set_frequency_cgen(&mut self, hz: f64) -> u8;
    fn frequency_sx(&mut self, dir: Direction) -> f64;
    fn set_frequency_sx(&mut self, dir: Direction, hz: f64) -> u8;
    fn set_nco_frequency(&mut self, dir: Direction, hz: f64);
}

/// Choose the CGEN multiplier and retune, then derive the GFIR3 Rx
/// decimation ratio from it. Returns the raw collaborator status (0 on
/// success), not yet offset into a [`crate::CalError`] — the caller applies
/// the `0x30 +` offset.
pub fn setup_cgen(
    bus: &mut impl RegisterBus,
    synth: &mut impl Synth,
    arith: &impl crate::arith::Arith,
) -> u8 {
    let current = synth.frequency_cgen();
    let mut multiplier = arith.round(current / regmap::CGEN_REF_HZ) as i64;
    if multiplier < 2 {
        multiplier = 2;
    }
    if multiplier > 9 && multiplier < 12 {
        multiplier = 12;
    }
    if multiplier > 13 {
        multiplier = 13;
    }

    let status = synth.set_frequency_cgen(regmap::CGEN_REF_HZ * multiplier as f64);
    if status != 0 {
        return status;
    }

    #[cfg(feature = "defmt")]
    defmt::debug!("cgen multiplier {}", multiplier);

    let mut gfir3n = 4 * multiplier as u32;
    if read_field(bus, regmap::EN_ADCCLKH_CLKGN) == 1 {
        gfir3n /= arith.pow2(read_field(bus, regmap::CLKH_OV_CLKL_CGEN) as u32);
    }
    let k = (arith.ln(gfir3n as f64) / arith.ln(2.0)) as u32;
    let gfir3n = arith.pow2(k) - 1;
    modify_field(bus, regmap::GFIR3_N_RXTSP, gfir3n as u16);
    0
}

/// Rx NCO target while `check_saturation_tx_rx` measures loopback gain.
pub fn tx_setup_saturation_rx_nco(cfg: &CalibrationConfig) -> f64 {
    cfg.sx_offset_hz - cfg.offset_nco_hz + 2.0 * cfg.bw_over_divider()
}

/// Rx NCO target during the Rx-DC null pass of a Tx calibration.
pub fn tx_rx_dc_rx_nco(cfg: &CalibrationConfig) -> f64 {
    cfg.sx_offset_hz - cfg.offset_nco_hz + cfg.bw_over_divider()
}

/// Rx NCO target during the Tx-DC null pass of a Tx calibration.
pub fn tx_dc_null_rx_nco(cfg: &CalibrationConfig) -> f64 {
    cfg.sx_offset_hz - cfg.offset_nco_hz
}

/// Tx NCO target during the Tx-IQ null pass of a Tx calibration (the Rx NCO
/// is left at [`tx_dc_null_rx_nco`]).
pub fn tx_iq_null_tx_nco(cfg: &CalibrationConfig) -> f64 {
    cfg.bw_over_divider()
}

/// Rx NCO target while `check_saturation_rx` measures loopback gain, and
/// while the Rx-DC null pass of an Rx calibration runs.
pub fn rx_dc_rx_nco(cfg: &CalibrationConfig) -> f64 {
    cfg.bw_over_divider() - cfg.offset_nco_hz
}

/// Tx NCO target during Rx setup (a fixed 9 MHz offset tone for loopback).
pub fn rx_setup_tx_nco(_cfg: &CalibrationConfig) -> f64 {
    9e6
}

/// Rx NCO target during the Rx-IQ null pass of an Rx calibration.
pub fn rx_iq_null_rx_nco(cfg: &CalibrationConfig) -> f64 {
    cfg.bw_over_divider() + cfg.offset_nco_hz
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::arith::StdArith;
    use crate::testutil::MockBus;

    struct FixedSynth {
        cgen_hz: f64,
        cgen_status: u8,
    }

    impl Synth for FixedSynth {
        fn frequency_cgen(&mut self) -> f64 {
            self.cgen_hz
        }
        fn set_frequency_cgen(&mut self, hz: f64) -> u8 {
            self.cgen_hz = hz;
            self.cgen_status
        }
        fn frequency_sx(&mut self, _dir: Direction) -> f64 {
            0.0
        }
        fn set_frequency_sx(&mut self, _dir: Direction, _hz: f64) -> u8 {
            0
        }
        fn set_nco_frequency(&mut self, _dir: Direction, _hz: f64) {}
    }

    #[test]
    fn multiplier_clamps_to_valid_range() {
        let mut bus = MockBus::default();
        let arith = StdArith;

        // current freq picks multiplier 10, which must be bumped to 12.
        let mut synth = FixedSynth { cgen_hz: 10.0 * regmap::CGEN_REF_HZ, cgen_status: 0 };
        assert_eq!(setup_cgen(&mut bus, &mut synth, &arith), 0);
        assert_eq!(synth.cgen_hz, 12.0 * regmap::CGEN_REF_HZ);

        // current freq picks multiplier 20, which must be clamped to 13.
        let mut synth = FixedSynth { cgen_hz: 20.0 * regmap::CGEN_REF_HZ, cgen_status: 0 };
        assert_eq!(setup_cgen(&mut bus, &mut synth, &arith), 0);
        assert_eq!(synth.cgen_hz, 13.0 * regmap::CGEN_REF_HZ);

        // current freq picks multiplier 0, which must be bumped to 2.
        let mut synth = FixedSynth { cgen_hz: 0.0, cgen_status: 0 };
        assert_eq!(setup_cgen(&mut bus, &mut synth, &arith), 0);
        assert_eq!(synth.cgen_hz, 2.0 * regmap::CGEN_REF_HZ);
    }

    #[test]
    fn propagates_synth_failure() {
        let mut bus = MockBus::default();
        let arith = StdArith;
        let mut synth = FixedSynth { cgen_hz: 5.0 * regmap::CGEN_REF_HZ, cgen_status: 7 };
        assert_eq!(setup_cgen(&mut bus, &mut synth, &arith), 7);
    }
}
