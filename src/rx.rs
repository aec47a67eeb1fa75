//! The Rx calibration driver: load the Rx setup, null the Rx DC offset,
//! wire up the loopback path for the band under calibration, null the Rx
//! IQ imbalance, then restore every register the setup touched.

use embedded_hal::delay::DelayNs;

use crate::bus::{modify_field, read_field, RegisterBus};
use crate::config::{CalibrationConfig, Direction};
use crate::error::CalError;
use crate::freq::{self, Synth};
use crate::regmap;
use crate::saturation::check_saturation_rx;
use crate::search::{null_iq_imbalance, null_rx_dc};
use crate::setup::{calibrate_rx_setup, RegisterSnapshot};

/// Run a full Rx calibration for whichever path is selected in
/// `SEL_PATH_RFE` (`2` = LNAW, `3` = LNAL) at the time of the call.
///
/// On success, `DCOFFI_RFE`/`DCOFFQ_RFE` and
/// `GCORRI_RXTSP`/`GCORRQ_RXTSP`/`IQCORR_RXTSP` hold the calibrated values;
/// every other register this pass touched has been restored to its
/// pre-calibration value.
pub fn calibrate_rx(
    bus: &mut impl RegisterBus,
    synth: &mut impl Synth,
    arith: &impl crate::arith::Arith,
    delay: &mut impl DelayNs,
    cfg: &CalibrationConfig,
) -> Result<(), CalError> {
    let mut snapshot = RegisterSnapshot::new();

    #[cfg(feature = "defmt")]
    defmt::debug!("calibrating rx path {}", lna_name(read_field(bus, regmap::SEL_PATH_RFE) as u8));

    if let Err(e) = calibrate_rx_setup(bus, synth, arith, cfg, &mut snapshot) {
        snapshot.restore(bus);
        return Err(e);
    }

    null_rx_dc(bus, delay);

    enable_loopback_path(bus);

    // Channel B's T2R buffer and channel A's VCO only need attention in
    // TDD topologies, where the two channels share one LO.
    modify_field(bus, regmap::MAC, 2);
    if read_field(bus, regmap::PD_LOCH_T2RBUF) == 0 {
        modify_field(bus, regmap::PD_LOCH_T2RBUF, 1);
        modify_field(bus, regmap::MAC, 1);
        modify_field(bus, regmap::PD_VCO, 0);
    }
    snapshot.restore_one(bus, regmap::MAC.address);

    check_saturation_rx(bus, synth, delay, cfg);
    modify_field(bus, regmap::CMIX_SC_RXTSP, 1);
    synth.set_nco_frequency(Direction::Rx, freq::rx_iq_null_rx_nco(cfg));
    null_iq_imbalance(bus, delay, Direction::Rx);

    snapshot.restore(bus);
    Ok(())
}

/// Name a `SEL_PATH_RFE` encoding for logging, mirroring the reference's
/// `#if VERBOSE` path-name switch with no fallthrough possible.
#[cfg_attr(not(feature = "defmt"), allow(dead_code))]
fn lna_name(sel_path_rfe: u8) -> &'static str {
    match sel_path_rfe {
        1 => "LNAH",
        2 => "LNAW",
        3 => "LNAL",
        _ => "reserved",
    }
}

/// Wire the Rx loopback switch/power fields for whichever path `SEL_PATH_RFE`
/// currently names, mirroring the band-complement encoding
/// [`crate::setup::calibrate_tx_setup`] uses for the same two fields:
/// the path (`2` = LNAW, `3` = LNAL) is first converted to the same 1/2
/// "band" numbering Tx setup complements (`path - 1`), so path 2 enables
/// branch 2 and path 3 enables branch 1, matching the reference's
/// `SEL_PATH_RFE == 2` branch check.
fn enable_loopback_path(bus: &mut impl RegisterBus) {
    let rx_path = read_field(bus, regmap::SEL_PATH_RFE) as u8;
    let band = rx_path - 1;
    let complement = (band ^ 3) as u16;
    modify_field(bus, regmap::PD_RLOOPB_12_RFE, complement);
    modify_field(bus, regmap::EN_INSHSW_LB12_RFE, complement);
}
