//! Bulk register setup ahead of a Tx or Rx calibration pass: load the
//! known-good starting point for every register the search routines touch,
//! point the clock and LO synthesizers where the frequency plan needs them,
//! and wire up the channel-B loopback path the RSSI measurement depends on.
//!
//! Every register this module writes is first captured into the caller's
//! [`RegisterSnapshot`] so the top-level driver can put the chip back the
//! way it found it on every exit path, success or failure.

use crate::bus::{flip_rising_edge, modify_field, RegisterBus};
use crate::config::{CalibrationConfig, Direction};
use crate::error::{cgen_result, sxr_result, sxt_result, CalError};
use crate::freq::{self, Synth};
use crate::regmap::{self, MaskedWrite, RawWrite};

/// Capacity sized for the largest setup table this crate writes: the Rx
/// raw table (34 entries), the masked table (19), the SX defaults (8), the
/// 120-tap GFIR3 bank and the handful of single-bit wiring fields besides.
const SNAPSHOT_CAPACITY: usize = 34 + 19 + 8 + 120 + 8;

/// The registers a setup pass has touched, in first-touched order, so they
/// can be restored in one pass at any exit point.
pub struct RegisterSnapshot {
    entries: [(u16, u16); SNAPSHOT_CAPACITY],
    len: usize,
}

impl Default for RegisterSnapshot {
    fn default() -> Self {
        Self { entries: [(0, 0); SNAPSHOT_CAPACITY], len: 0 }
    }
}

impl RegisterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `addr`'s current value, if it hasn't already been captured
    /// this pass.
    pub fn capture(&mut self, bus: &mut impl RegisterBus, addr: u16) {
        if self.entries[..self.len].iter().any(|&(a, _)| a == addr) {
            return;
        }
        let val = bus.read_reg(addr);
        self.entries[self.len] = (addr, val);
        self.len += 1;
    }

    /// Write every captured register back to its pre-setup value.
    pub fn restore(&self, bus: &mut impl RegisterBus) {
        for &(addr, val) in &self.entries[..self.len] {
            bus.write_reg(addr, val);
        }
    }

    /// Write a single captured register back to its pre-setup value,
    /// leaving the rest of the snapshot untouched. Used mid-flow by the Rx
    /// driver, which needs the channel mask restored before it carries on
    /// rather than at the very end.
    pub fn restore_one(&self, bus: &mut impl RegisterBus, addr: u16) {
        if let Some(&(_, val)) = self.entries[..self.len].iter().find(|&&(a, _)| a == addr) {
            bus.write_reg(addr, val);
        }
    }
}

fn apply_masked(bus: &mut impl RegisterBus, snapshot: &mut RegisterSnapshot, table: &[MaskedWrite]) {
    for w in table {
        snapshot.capture(bus, w.addr);
        let current = bus.read_reg(w.addr);
        bus.write_reg(w.addr, (current & !w.mask) | (w.data & w.mask));
    }
}

fn apply_raw(bus: &mut impl RegisterBus, snapshot: &mut RegisterSnapshot, table: &[RawWrite]) {
    for w in table {
        snapshot.capture(bus, w.addr);
        bus.write_reg(w.addr, w.data);
    }
}

fn load_sx_defaults(bus: &mut impl RegisterBus, snapshot: &mut RegisterSnapshot) {
    apply_raw(bus, snapshot, regmap::SX_DEFAULTS);
}

fn load_gfir3(bus: &mut impl RegisterBus, snapshot: &mut RegisterSnapshot) {
    for index in 0..120 {
        let addr = regmap::gfir3_addr(index);
        snapshot.capture(bus, addr);
        bus.write_reg(addr, regmap::gfir3_coefficient(index) as u16);
    }
}

fn select_channel(bus: &mut impl RegisterBus, snapshot: &mut RegisterSnapshot, mac: u16) {
    snapshot.capture(bus, regmap::MAC.address);
    modify_field(bus, regmap::MAC, mac);
}

/// Write a full-scale then mid-scale value into the Tx DSP's test signal
/// generator and strobe its load pulses, producing the DC tone the Tx-DC
/// null search measures against.
fn inject_tx_dc_tone(bus: &mut impl RegisterBus, snapshot: &mut RegisterSnapshot) {
    snapshot.capture(bus, regmap::TSGDC_ADDR);
    bus.write_reg(regmap::TSGDC_ADDR, 0x7FFF);
    flip_rising_edge(bus, regmap::TSGDCLDI_TXTSP);
    bus.write_reg(regmap::TSGDC_ADDR, 0x8000);
    flip_rising_edge(bus, regmap::TSGDCLDQ_TXTSP);
}

/// Read `PD_LOCH_T2RBUF` to tell whether the synthesizer topology is
/// currently time-division duplex (one LO shared between Tx and Rx) or
/// frequency-division (independent LOs): powered (`0`) means the T2R
/// buffer is in use, i.e. TDD.
fn is_tdd(bus: &mut impl RegisterBus) -> bool {
    crate::bus::read_field(bus, regmap::PD_LOCH_T2RBUF) == 0
}

/// Enable the neighbor channel's AFE/RFE/TRF pass-throughs (§4.E step 7):
/// done only when the channel mask captured at setup entry shows channel B
/// active, since these fields feed this channel's measurement from the
/// other channel's Tx path.
fn enable_neighbor_passthrough(bus: &mut impl RegisterBus, snapshot: &mut RegisterSnapshot) {
    snapshot.capture(bus, regmap::PD_TX_AFE2.address);
    modify_field(bus, regmap::PD_TX_AFE2, 0);
    snapshot.capture(bus, regmap::EN_NEXTRX_RFE.address);
    modify_field(bus, regmap::EN_NEXTRX_RFE, 1);
    snapshot.capture(bus, regmap::EN_NEXTTX_TRF.address);
    modify_field(bus, regmap::EN_NEXTTX_TRF, 1);
}

/// Load the Tx calibration starting point: channel A, the Tx setup tables,
/// SX defaults, GFIR3, CGEN, the Tx DC test tone, and retune to the
/// frequency plan. The Tx band under calibration is read from
/// `SEL_BAND1_2_TRF` (whatever the caller already selected before invoking
/// calibration, not a setup input); any value other than `1` or `2` is
/// rejected before anything is written. If the channel mask at entry shows
/// channel B active, also enables the neighbor channel's AFE/RFE/TRF
/// pass-throughs.
///
/// The single SX retune this setup performs is physically the Rx
/// synthesizer (looped back on-chip into the Rx chain the RSSI
/// measurement reads), but the reference flow reports its failure status
/// in the Sxt range rather than Sxr — preserved here rather than
/// "corrected", since a caller may already depend on the exact byte.
pub fn calibrate_tx_setup(
    bus: &mut impl RegisterBus,
    synth: &mut impl Synth,
    arith: &impl crate::arith::Arith,
    cfg: &CalibrationConfig,
    snapshot: &mut RegisterSnapshot,
) -> Result<(), CalError> {
    let channel_mask = crate::bus::read_field(bus, regmap::MAC);
    let tx_band = crate::bus::read_field(bus, regmap::SEL_BAND1_2_TRF) as u8;
    if tx_band != 1 && tx_band != 2 {
        return Err(CalError::UnsupportedTxBand);
    }

    select_channel(bus, snapshot, 1);
    apply_masked(bus, snapshot, regmap::TX_SETUP_MASKED);
    apply_raw(bus, snapshot, regmap::TX_SETUP_RAW);
    load_sx_defaults(bus, snapshot);
    load_gfir3(bus, snapshot);

    cgen_result(freq::setup_cgen(bus, synth, arith))?;

    let rx_target = synth.frequency_sx(Direction::Tx) - cfg.bw_over_divider() - cfg.sx_offset_hz;
    sxt_result(synth.set_frequency_sx(Direction::Rx, rx_target))?;

    if channel_mask & 0x2 != 0 {
        enable_neighbor_passthrough(bus, snapshot);
    }

    inject_tx_dc_tone(bus, snapshot);

    // Route the Rx loopback path for the band under calibration:
    // `SEL_PATH_RFE` follows the band directly (BAND1 -> LNAW, BAND2 ->
    // LNAL); the loopback power/switch fields follow the band bits
    // complemented, so exactly one of the two loopback branches is live.
    let band_complement = (tx_band ^ 3) as u16;
    snapshot.capture(bus, regmap::SEL_PATH_RFE.address);
    modify_field(bus, regmap::SEL_PATH_RFE, (tx_band + 1) as u16);
    snapshot.capture(bus, regmap::PD_RLOOPB_12_RFE.address);
    modify_field(bus, regmap::PD_RLOOPB_12_RFE, band_complement);
    snapshot.capture(bus, regmap::EN_INSHSW_LB12_RFE.address);
    modify_field(bus, regmap::EN_INSHSW_LB12_RFE, band_complement);

    Ok(())
}

/// Load the Rx calibration starting point: channel A, the Rx setup table,
/// SX defaults, GFIR3, CGEN, and retune to the frequency plan. The Rx path
/// under calibration is read from `SEL_PATH_RFE` (`2` = LNAW, `3` = LNAL,
/// whatever the caller already selected); any other value — notably LNAH
/// (`1`) — is rejected before anything is written. The matching Tx band
/// switches (`SEL_BAND1_TRF`/`SEL_BAND2_TRF`) are then written to follow
/// it. If the channel mask at entry shows channel B active, also enables
/// the neighbor channel's AFE/RFE/TRF pass-throughs (the channel-B Tx path
/// that feeds this channel's Rx front end for loopback).
///
/// Which synthesizer gets retuned depends on whether `PD_LOCH_T2RBUF`
/// shows the chip currently wired TDD or FDD: TDD retunes the Rx
/// synthesizer `BW/BW_DIVIDER + 9 MHz` below the Tx synthesizer (reported
/// in the Sxr range), FDD retunes the Tx synthesizer the same distance
/// above the Rx synthesizer instead (Sxt range).
///
/// Finishes by placing the Tx NCO at the tone-injection setpoint and the
/// Rx NCO at the Rx-DC-null setpoint, so the DC null that immediately
/// follows setup measures against the right bin rather than whatever the
/// chip had the NCO parked at before calibration started.
pub fn calibrate_rx_setup(
    bus: &mut impl RegisterBus,
    synth: &mut impl Synth,
    arith: &impl crate::arith::Arith,
    cfg: &CalibrationConfig,
    snapshot: &mut RegisterSnapshot,
) -> Result<(), CalError> {
    let channel_mask = crate::bus::read_field(bus, regmap::MAC);
    let rx_path = crate::bus::read_field(bus, regmap::SEL_PATH_RFE) as u8;
    if rx_path != 2 && rx_path != 3 {
        return Err(CalError::UnsupportedRxPath);
    }

    select_channel(bus, snapshot, 1);
    apply_masked(bus, snapshot, regmap::RX_SETUP_MASKED);
    load_sx_defaults(bus, snapshot);
    load_gfir3(bus, snapshot);

    snapshot.capture(bus, regmap::SEL_BAND1_TRF.address);
    snapshot.capture(bus, regmap::SEL_BAND2_TRF.address);
    if rx_path == 2 {
        modify_field(bus, regmap::SEL_BAND2_TRF, 1);
        modify_field(bus, regmap::SEL_BAND1_TRF, 0);
    } else {
        modify_field(bus, regmap::SEL_BAND2_TRF, 0);
        modify_field(bus, regmap::SEL_BAND1_TRF, 1);
    }

    cgen_result(freq::setup_cgen(bus, synth, arith))?;

    if is_tdd(bus) {
        let target = synth.frequency_sx(Direction::Tx) - cfg.bw_over_divider() - 9e6;
        sxr_result(synth.set_frequency_sx(Direction::Rx, target))?;
    } else {
        let target = synth.frequency_sx(Direction::Rx) + cfg.bw_over_divider() + 9e6;
        sxt_result(synth.set_frequency_sx(Direction::Tx, target))?;
    }

    // Channel-B Tx path feeds this channel's Rx front end for loopback.
    if channel_mask & 0x2 != 0 {
        enable_neighbor_passthrough(bus, snapshot);
    }

    inject_tx_dc_tone(bus, snapshot);
    synth.set_nco_frequency(Direction::Tx, freq::rx_setup_tx_nco(cfg));
    synth.set_nco_frequency(Direction::Rx, freq::rx_dc_rx_nco(cfg));

    Ok(())
}
