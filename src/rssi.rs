//! RSSI readback: the single measurement every search and saturation check
//! in this crate is driven by.

use embedded_hal::delay::DelayNs;

use crate::arith::Arith;
use crate::bus::{flip_rising_edge, RegisterBus};
use crate::regmap;

/// Full-scale value of the 18-bit RSSI accumulator, used to express a
/// reading in dBFS. The accumulator saturates at `0x15FF4`, not `2^18 - 1`.
pub const RSSI_FULL_SCALE: u32 = 0x15FF4;

/// Minimum dwell before a capture pulse, per §5's stabilization requirement.
pub const STABILIZE_DELAY_MS: u32 = 10;

/// Strobe the capture latch and read back the RSSI accumulator, settling
/// for the delay the front end needs between the strobe and a stable
/// reading.
///
/// The assembled value is nominally 18 bits wide but this entry point
/// truncates it to 16, matching the reference `GetRSSI`'s `uint16_t` return:
/// every comparison this crate makes against it (the binary search, the
/// saturation target) only cares about relative ordering or a target that
/// itself fits in 16 bits. Use [`get_rssi_raw`] for the untruncated value,
/// e.g. for [`dbfs`].
pub fn get_rssi(bus: &mut impl RegisterBus, delay: &mut impl DelayNs) -> u16 {
    get_rssi_raw(bus, delay) as u16
}

/// Strobe the capture latch and read back the full 18-bit RSSI accumulator.
pub fn get_rssi_raw(bus: &mut impl RegisterBus, delay: &mut impl DelayNs) -> u32 {
    delay.delay_ms(STABILIZE_DELAY_MS);
    flip_rising_edge(bus, regmap::CAPTURE);
    let hi = bus.read_reg(regmap::RSSI_HI_ADDR) as u32;
    let lo = bus.read_reg(regmap::RSSI_LO_ADDR) as u32 & 0x3;
    (hi << 2) | lo
}

/// Express a raw RSSI reading relative to full scale, in dBFS. A zero
/// reading is treated as 1 before conversion rather than panicking on the
/// logarithm of zero.
pub fn dbfs(arith: &impl Arith, rssi_raw: u32) -> f64 {
    let rssi_raw = if rssi_raw == 0 { 1 } else { rssi_raw };
    let ratio = rssi_raw as f64 / RSSI_FULL_SCALE as f64;
    20.0 * arith.ln(ratio) / arith.ln(10.0)
}
