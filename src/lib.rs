//! Self-calibration engine for a dual-channel direct-conversion RF
//! transceiver.
//!
//! This crate implements the DC-offset and IQ gain/phase calibration flow
//! for a chip in the LMS7002M family: it knows how to drive the
//! [`RegisterBus`](bus::RegisterBus) to set up a loopback measurement, run
//! the RSSI-guided [`binary_search`](search::binary_search) that nulls each
//! impairment, and restore the chip to its pre-calibration state
//! afterward. It does not know how to talk to the chip (that's
//! [`bus::RegisterBus`]), tune the clock or LO synthesizers (that's
//! [`freq::Synth`]), or do floating-point math on a target without an FPU
//! (that's [`arith::Arith`]) — all three are supplied by the caller.
//!
//! ```no_run
//! use txrx_calib::{arith::StdArith, config::CalibrationConfig, Calibrator};
//! # use txrx_calib::{bus::RegisterBus, config::Direction, freq::Synth};
//! # struct MyBus; impl RegisterBus for MyBus {
//! #     fn read_reg(&mut self, addr: u16) -> u16 {
//! #         // Pretend the caller already selected Tx band 1 and Rx path
//! #         // LNAW (2) before asking for calibration, as the real chip
//! #         // would have these set by the radio's own band logic.
//! #         match addr {
//! #             0x0103 => 1 << 10,
//! #             0x010C => 2 << 7,
//! #             _ => 0,
//! #         }
//! #     }
//! #     fn write_reg(&mut self, _addr: u16, _val: u16) {}
//! # }
//! # struct MySynth; impl Synth for MySynth {
//! #     fn frequency_cgen(&mut self) -> f64 { 0.0 }
//! #     fn set_frequency_cgen(&mut self, _hz: f64) -> u8 { 0 }
//! #     fn frequency_sx(&mut self, _dir: Direction) -> f64 { 0.0 }
//! #     fn set_frequency_sx(&mut self, _dir: Direction, _hz: f64) -> u8 { 0 }
//! #     fn set_nco_frequency(&mut self, _dir: Direction, _hz: f64) {}
//! # }
//! # struct MyDelay; impl embedded_hal::delay::DelayNs for MyDelay {
//! #     fn delay_ns(&mut self, _ns: u32) {}
//! # }
//! let mut bus = MyBus;
//! let mut synth = MySynth;
//! let mut delay = MyDelay;
//! let mut cal = Calibrator::new(CalibrationConfig::default());
//! cal.config_mut().bandwidth_rf_hz = 5e6;
//! cal.calibrate_tx(&mut bus, &mut synth, &StdArith, &mut delay)?;
//! cal.calibrate_rx(&mut bus, &mut synth, &StdArith, &mut delay)?;
//! # Ok::<(), txrx_calib::error::CalError>(())
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

pub mod arith;
pub mod bus;
pub mod config;
pub mod error;
pub mod freq;
pub mod regmap;
pub mod rssi;
pub mod saturation;
pub mod search;
pub mod setup;
pub mod tx;
pub mod rx;

#[cfg(test)]
mod testutil;

pub use config::CalibrationConfig;
pub use error::CalError;

use arith::Arith;
use bus::RegisterBus;
use config::Direction;
use embedded_hal::delay::DelayNs;
use freq::Synth;

/// Entry point bundling a [`CalibrationConfig`] with the two calibration
/// passes that share it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Calibrator {
    config: CalibrationConfig,
}

impl Calibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut CalibrationConfig {
        &mut self.config
    }

    /// Set the RF channel bandwidth the frequency plan is built around.
    pub fn set_bandwidth_rf(&mut self, hz: f64) {
        self.config.bandwidth_rf_hz = hz;
    }

    /// Run a full Tx calibration for whichever band `SEL_BAND1_2_TRF` names
    /// at the time of the call. See [`tx::calibrate_tx`].
    pub fn calibrate_tx(
        &self,
        bus: &mut impl RegisterBus,
        synth: &mut impl Synth,
        arith: &impl Arith,
        delay: &mut impl DelayNs,
    ) -> Result<(), CalError> {
        tx::calibrate_tx(bus, synth, arith, delay, &self.config)
    }

    /// Run a full Rx calibration for whichever path `SEL_PATH_RFE` names at
    /// the time of the call. See [`rx::calibrate_rx`].
    pub fn calibrate_rx(
        &self,
        bus: &mut impl RegisterBus,
        synth: &mut impl Synth,
        arith: &impl Arith,
        delay: &mut impl DelayNs,
    ) -> Result<(), CalError> {
        rx::calibrate_rx(bus, synth, arith, delay, &self.config)
    }
}
