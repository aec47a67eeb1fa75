//! The binary search driving every DC-offset and IQ-imbalance null in this
//! crate (§4.C of the calibration flow). One call narrows a single
//! [`Field`] to the value that minimizes RSSI at the current frequency
//! plan point; the caller is responsible for getting the frequency plan and
//! gain stage into the right state beforehand.

use embedded_hal::delay::DelayNs;

use crate::bus::{modify_field, modify_field_cached, Field, RegisterBus};
use crate::config::Direction;
use crate::regmap;
use crate::rssi::get_rssi;

/// One search in progress: the field being tuned, its valid range, and the
/// value the search converged on.
#[derive(Debug, Clone, Copy)]
pub struct SearchParam {
    pub field: Field,
    pub min: i16,
    pub max: i16,
    pub result: i16,
}

impl SearchParam {
    pub const fn new(field: Field, min: i16, max: i16) -> Self {
        Self { field, min, max, result: 0 }
    }
}

/// Sign-magnitude encoding used by the DC-offset fields (`DCOFFI_RFE`,
/// `DCOFFQ_RFE`, `DCCORRI_TXTSP`, `DCCORRQ_TXTSP`): bit 6 is the sign, bits
/// `5:0` the magnitude. The IQ-imbalance fields this search also drives
/// (`GCORR*`, `IQCORR*`) are plain two's-complement and skip this encoding.
pub fn encode_dc(value: i16) -> u16 {
    if value >= 0 {
        value as u16
    } else {
        ((-value) as u16) | 0x40
    }
}

/// Inverse of [`encode_dc`].
pub fn decode_dc(raw: u16) -> i16 {
    let magnitude = (raw & 0x3F) as i16;
    if raw & 0x40 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Write a candidate value against the caller's cached register image
/// instead of re-reading the register, returning the updated image so the
/// next write in the same search can keep threading it through.
fn write_param_cached(
    bus: &mut impl RegisterBus,
    field: Field,
    value: i16,
    dc_sign_magnitude: bool,
    cached: u16,
) -> u16 {
    let encoded = if dc_sign_magnitude { encode_dc(value) } else { value as u16 };
    modify_field_cached(bus, field, encoded, cached)
}

/// Narrow `param.field` to the value in `[param.min, param.max]` that
/// minimizes RSSI, leaving that value both in `param.result` and written to
/// the register.
///
/// `dc_sign_magnitude` selects the encoding used when writing candidate
/// values: `true` for the sign-magnitude DC offset fields, `false` for the
/// two's-complement gain/phase correction fields. The reference flow kept
/// this as a module-global flag flipped before each call; it is a parameter
/// here so the search has no hidden state between calls.
///
/// The register is read once up front and every subsequent candidate write
/// goes through the cached image (`modify_field_cached`), matching the
/// reference's `Modify_SPI_Reg_bits_WrOnly` fast path: one read per search,
/// one write per step, instead of a read-modify-write every step.
pub fn binary_search(
    bus: &mut impl RegisterBus,
    delay: &mut impl DelayNs,
    param: &mut SearchParam,
    dc_sign_magnitude: bool,
) {
    let mut left = param.min;
    let mut right = param.max;
    let mut cached = bus.read_reg(param.field.address);

    cached = write_param_cached(bus, param.field, right, dc_sign_magnitude, cached);
    let mut rssi_right = get_rssi(bus, delay);
    let mut rssi_left = u16::MAX;

    while right - left >= 1 {
        let step = (right - left) / 2;

        if rssi_left < rssi_right {
            cached = write_param_cached(bus, param.field, right, dc_sign_magnitude, cached);
            rssi_right = get_rssi(bus, delay);
        } else {
            cached = write_param_cached(bus, param.field, left, dc_sign_magnitude, cached);
            rssi_left = get_rssi(bus, delay);
        }

        if step == 0 {
            break;
        }

        if rssi_left < rssi_right {
            right -= step;
        } else {
            left += step;
        }
    }

    param.result = if rssi_left < rssi_right { left } else { right };
    write_param_cached(bus, param.field, param.result, dc_sign_magnitude, cached);
}

/// Coarse-then-refine schedule for the Rx front end's analog DC offset,
/// shared by both calibration directions (it's the same loopback receiver
/// either way): I then Q over the full range, I then Q again over
/// `result±8`, then a final I-only refine over `result±4`.
pub fn null_rx_dc(bus: &mut impl RegisterBus, delay: &mut impl DelayNs) -> (i16, i16) {
    let mut i = SearchParam::new(regmap::DCOFFI_RFE, -63, 63);
    binary_search(bus, delay, &mut i, true);
    let mut q = SearchParam::new(regmap::DCOFFQ_RFE, -63, 63);
    binary_search(bus, delay, &mut q, true);

    let mut i = SearchParam::new(regmap::DCOFFI_RFE, i.result - 8, i.result + 8);
    binary_search(bus, delay, &mut i, true);
    let mut q = SearchParam::new(regmap::DCOFFQ_RFE, q.result - 8, q.result + 8);
    binary_search(bus, delay, &mut q, true);

    let mut i = SearchParam::new(regmap::DCOFFI_RFE, i.result - 4, i.result + 4);
    binary_search(bus, delay, &mut i, true);

    (i.result, q.result)
}

/// Coarse-then-refine schedule for the Tx digital DC correction: I then Q
/// over the full range, then both refined once over `result±4`. The two
/// fields share register `0x0204`, so the final pair of writes leaves that
/// register holding the packed `(I << 8) | (Q & 0xFF)` value without any
/// extra step.
pub fn null_tx_dc(bus: &mut impl RegisterBus, delay: &mut impl DelayNs) -> (i16, i16) {
    let mut i = SearchParam::new(regmap::DCCORRI_TXTSP, -128, 127);
    binary_search(bus, delay, &mut i, false);
    let mut q = SearchParam::new(regmap::DCCORRQ_TXTSP, -128, 127);
    binary_search(bus, delay, &mut q, false);

    let mut i = SearchParam::new(regmap::DCCORRI_TXTSP, i.result - 4, i.result + 4);
    binary_search(bus, delay, &mut i, false);
    let mut q = SearchParam::new(regmap::DCCORRQ_TXTSP, q.result - 4, q.result + 4);
    binary_search(bus, delay, &mut q, false);

    (i.result, q.result)
}

/// IQ gain/phase imbalance null, shared by both directions (§4.C.2):
/// a coarse phase search, a one-shot measurement to decide whether the I
/// or Q gain leg needs adjusting, a binary search over that leg, then a
/// fine phase refine around the coarse result.
pub fn null_iq_imbalance(bus: &mut impl RegisterBus, delay: &mut impl DelayNs, dir: Direction) -> (i16, i16) {
    const FULL_SCALE: i16 = 0x7FF;
    const PROBE_DROP: i16 = 64;
    const GAIN_SWEEP: i16 = 512;

    let (phase_field, gcorri_field, gcorrq_field) = match dir {
        Direction::Tx => (regmap::IQCORR_TXTSP, regmap::GCORRI_TXTSP, regmap::GCORRQ_TXTSP),
        Direction::Rx => (regmap::IQCORR_RXTSP, regmap::GCORRI_RXTSP, regmap::GCORRQ_RXTSP),
    };

    let mut phase = SearchParam::new(phase_field, -128, 128);
    binary_search(bus, delay, &mut phase, false);

    modify_field(bus, gcorri_field, (FULL_SCALE - PROBE_DROP) as u16);
    modify_field(bus, gcorrq_field, FULL_SCALE as u16);
    let rssi_i_dropped = get_rssi(bus, delay);

    modify_field(bus, gcorri_field, FULL_SCALE as u16);
    modify_field(bus, gcorrq_field, (FULL_SCALE - PROBE_DROP) as u16);
    let rssi_q_dropped = get_rssi(bus, delay);

    let gain_field = if rssi_i_dropped < rssi_q_dropped {
        modify_field(bus, gcorrq_field, FULL_SCALE as u16);
        modify_field(bus, gcorri_field, (FULL_SCALE - PROBE_DROP) as u16);
        gcorri_field
    } else {
        modify_field(bus, gcorri_field, FULL_SCALE as u16);
        modify_field(bus, gcorrq_field, (FULL_SCALE - PROBE_DROP) as u16);
        gcorrq_field
    };

    let mut gain = SearchParam::new(gain_field, FULL_SCALE - GAIN_SWEEP, FULL_SCALE);
    binary_search(bus, delay, &mut gain, false);

    let mut phase_fine = SearchParam::new(phase_field, phase.result - 16, phase.result + 16);
    binary_search(bus, delay, &mut phase_fine, false);

    (phase_fine.result, gain.result)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::{MockBus, NoopDelay};

    #[test]
    fn dc_encoding_roundtrips() {
        for v in -63i16..=63 {
            assert_eq!(decode_dc(encode_dc(v)), v);
        }
    }

    #[test]
    fn negative_encodes_sign_bit() {
        assert_eq!(encode_dc(-5), 0x45);
        assert_eq!(encode_dc(5), 0x05);
    }

    /// An RSSI landscape with a single minimum at `target`, symmetric V shape.
    struct VShaped {
        target: i16,
    }

    impl VShaped {
        fn rssi_at(&self, value: i16) -> u16 {
            (value - self.target).unsigned_abs() as u16 * 100
        }
    }

    #[test]
    fn converges_on_two_complement_field() {
        let field = Field::new(0x0200, 11, 0);
        let landscape = VShaped { target: 10 };
        let mut delay = NoopDelay;

        // Route RSSI sampling through the landscape by reacting to writes
        // to `field` and updating the registers the mock RSSI reader looks
        // at accordingly.
        struct Watching<'a> {
            inner: MockBus,
            field: Field,
            landscape: &'a VShaped,
        }
        impl<'a> RegisterBus for Watching<'a> {
            fn read_reg(&mut self, addr: u16) -> u16 {
                self.inner.read_reg(addr)
            }
            fn write_reg(&mut self, addr: u16, val: u16) {
                self.inner.write_reg(addr, val);
                if addr == self.field.address {
                    let raw = (val & self.field.mask()) >> self.field.lsb;
                    let sign_bit = 1u16 << (self.field.width() - 1);
                    let value = if raw & sign_bit != 0 {
                        (raw as i16) - (1i16 << self.field.width())
                    } else {
                        raw as i16
                    };
                    let rssi = self.landscape.rssi_at(value) as u32;
                    self.inner.write_reg(crate::regmap::RSSI_LO_ADDR, (rssi & 0x3) as u16);
                    self.inner.write_reg(crate::regmap::RSSI_HI_ADDR, (rssi >> 2) as u16);
                }
            }
        }

        let mut watching = Watching { inner: MockBus::default(), field, landscape: &landscape };

        let mut param = SearchParam::new(field, -31, 31);
        binary_search(&mut watching, &mut delay, &mut param, false);

        assert!((param.result - 10).abs() <= 1, "result {} not near target 10", param.result);
    }

    /// A bus that counts how many times each address is read, so the search
    /// can be checked against the reference's "one read, then writes only"
    /// contract instead of a read-modify-write every step.
    struct CountingReads {
        inner: MockBus,
        reads: std::collections::HashMap<u16, u32>,
    }

    impl RegisterBus for CountingReads {
        fn read_reg(&mut self, addr: u16) -> u16 {
            *self.reads.entry(addr).or_insert(0) += 1;
            self.inner.read_reg(addr)
        }
        fn write_reg(&mut self, addr: u16, val: u16) {
            self.inner.write_reg(addr, val);
        }
    }

    #[test]
    fn binary_search_reads_its_own_field_register_exactly_once() {
        let field = Field::new(0x0200, 11, 0);
        let mut bus = CountingReads { inner: MockBus::default(), reads: std::collections::HashMap::new() };
        let mut delay = NoopDelay;
        let mut param = SearchParam::new(field, -31, 31);

        binary_search(&mut bus, &mut delay, &mut param, false);

        assert_eq!(bus.reads.get(&field.address).copied().unwrap_or(0), 1);
    }
}
