// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Per-electrode capacitance offsets.
//!
//! The host measures the parasitic capacitance of every electrode once, at some reference voltage,
//! and uploads the table in chunks. Offsets are stored raw and scaled to the present HV target on
//! use. Layout (little-endian, packed):
//!
//! | Bytes | Field |
//! | ----- | ----- |
//! | 0..4 | reference voltage, `f32` |
//! | 4..260 | 128 offsets in ADC counts, `u16` |

use crate::config::{AppConfig, N_PINS};
use crate::error::Error;

/// Size of the calibration structure in bytes.
pub const CALIBRATION_BYTES: usize = 4 + 2 * N_PINS;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ElectrodeCalibration {
    bytes: [u8; CALIBRATION_BYTES],
}

impl ElectrodeCalibration {
    pub const fn new() -> Self {
        Self {
            bytes: [0; CALIBRATION_BYTES],
        }
    }

    /// Copy a chunk into the structure. Chunks extending past the end are rejected whole.
    pub fn write(&mut self, offset: u16, data: &[u8]) -> Result<(), Error> {
        let start = offset as usize;
        let end = start + data.len();
        if end > CALIBRATION_BYTES {
            return Err(Error::CalibrationOverrun {
                offset,
                length: data.len().min(u16::MAX as usize) as u16,
            });
        }
        self.bytes[start..end].copy_from_slice(data);
        Ok(())
    }

    /// Voltage the offsets were measured at.
    pub fn voltage(&self) -> f32 {
        f32::from_le_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]])
    }

    /// Raw stored offset of a pin.
    pub fn raw_offset(&self, pin: usize) -> u16 {
        if pin >= N_PINS {
            return 0;
        }
        let i = 4 + 2 * pin;
        u16::from_le_bytes([self.bytes[i], self.bytes[i + 1]])
    }

    /// Offset of a pin scaled to the configured HV target, and to the low gain resistor when
    /// `low_gain` is set.
    ///
    /// Returns 0 until a positive reference voltage has been loaded.
    pub fn electrode_offset(&self, pin: usize, low_gain: bool, config: &AppConfig) -> u16 {
        let voltage = self.voltage();
        if voltage.is_nan() || voltage <= 0.0 {
            return 0;
        }
        let mut x = self.raw_offset(pin) as f32 * config.hv_target() / voltage;
        if low_gain {
            x *= config.low_gain_r() / config.high_gain_r();
        }
        // float to int casts saturate
        x as u16
    }
}

impl Default for ElectrodeCalibration {
    fn default() -> Self {
        Self::new()
    }
}
