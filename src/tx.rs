//! The Tx calibration driver: load the Tx setup, null the loopback Rx DC
//! offset, null the Tx DC offset, null the Tx IQ imbalance, then restore
//! every register the setup touched.
//!
//! The DC/IQ correction fields themselves are deliberately left however the
//! search leaves them — they are this calibration's output, not scaffolding
//! to be cleaned up.

use embedded_hal::delay::DelayNs;

use crate::bus::RegisterBus;
use crate::config::{CalibrationConfig, Direction};
use crate::error::CalError;
use crate::freq::{self, Synth};
use crate::saturation::check_saturation_tx_rx;
use crate::search::{null_iq_imbalance, null_rx_dc, null_tx_dc};
use crate::setup::{calibrate_tx_setup, RegisterSnapshot};

/// Run a full Tx calibration for whichever band is selected in
/// `SEL_BAND1_2_TRF` (`1` or `2`) at the time of the call.
///
/// On success, `DCOFFI_RFE`/`DCOFFQ_RFE`, `DCCORRI_TXTSP`/`DCCORRQ_TXTSP`
/// and `GCORRI_TXTSP`/`GCORRQ_TXTSP`/`IQCORR_TXTSP` hold the calibrated
/// values; every other register this pass touched has been restored to its
/// pre-calibration value.
pub fn calibrate_tx(
    bus: &mut impl RegisterBus,
    synth: &mut impl Synth,
    arith: &impl crate::arith::Arith,
    delay: &mut impl DelayNs,
    cfg: &CalibrationConfig,
) -> Result<(), CalError> {
    let mut snapshot = RegisterSnapshot::new();

    if let Err(e) = calibrate_tx_setup(bus, synth, arith, cfg, &mut snapshot) {
        snapshot.restore(bus);
        return Err(e);
    }

    // Headroom exhaustion is best-effort, not an error: the searches below
    // run with whatever gain was achievable.
    check_saturation_tx_rx(bus, synth, delay, cfg);

    synth.set_nco_frequency(Direction::Rx, freq::tx_rx_dc_rx_nco(cfg));
    null_rx_dc(bus, delay);

    synth.set_nco_frequency(Direction::Rx, freq::tx_dc_null_rx_nco(cfg));
    null_tx_dc(bus, delay);

    synth.set_nco_frequency(Direction::Tx, freq::tx_iq_null_tx_nco(cfg));
    null_iq_imbalance(bus, delay, Direction::Tx);

    snapshot.restore(bus);
    Ok(())
}
