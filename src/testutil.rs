//! Fixtures shared by this crate's own test modules: a register file backed
//! by a hash map and a delay provider that doesn't actually wait.

use std::collections::HashMap;

use embedded_hal::delay::DelayNs;

use crate::bus::RegisterBus;
use crate::config::Direction;
use crate::freq::Synth;

/// An in-memory register file, reading back `0` for any address never
/// written.
#[derive(Debug, Default, Clone)]
pub struct MockBus(pub HashMap<u16, u16>);

impl RegisterBus for MockBus {
    fn read_reg(&mut self, addr: u16) -> u16 {
        *self.0.get(&addr).unwrap_or(&0)
    }
    fn write_reg(&mut self, addr: u16, val: u16) {
        self.0.insert(addr, val);
    }
}

/// A [`DelayNs`] that returns immediately; settling delays are meaningless
/// against a mock bus.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDelay;

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// A [`Synth`] whose `set_frequency_*` calls always succeed and record the
/// last requested frequency, for tests that only care what was asked for.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockSynth {
    pub cgen_hz: f64,
    pub sx_tx_hz: f64,
    pub sx_rx_hz: f64,
    pub last_tx_nco_hz: f64,
    pub last_rx_nco_hz: f64,
    pub cgen_status: u8,
    pub sx_tx_status: u8,
    pub sx_rx_status: u8,
}

impl Synth for MockSynth {
    fn frequency_cgen(&mut self) -> f64 {
        self.cgen_hz
    }
    fn set_frequency_cgen(&mut self, hz: f64) -> u8 {
        self.cgen_hz = hz;
        self.cgen_status
    }
    fn frequency_sx(&mut self, dir: Direction) -> f64 {
        match dir {
            Direction::Tx => self.sx_tx_hz,
            Direction::Rx => self.sx_rx_hz,
        }
    }
    fn set_frequency_sx(&mut self, dir: Direction, hz: f64) -> u8 {
        match dir {
            Direction::Tx => {
                self.sx_tx_hz = hz;
                self.sx_tx_status
            }
            Direction::Rx => {
                self.sx_rx_hz = hz;
                self.sx_rx_status
            }
        }
    }
    fn set_nco_frequency(&mut self, dir: Direction, hz: f64) {
        match dir {
            Direction::Tx => self.last_tx_nco_hz = hz,
            Direction::Rx => self.last_rx_nco_hz = hz,
        }
    }
}
