// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Error types for command handling.
//!
//! Hardware operations are infallible at this layer. Errors only arise from commands that carry
//! out-of-range ids or payloads, and a rejected command never modifies engine state.

use core::fmt;

/// Reasons a command is rejected.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Scan group index (group id minus 100) beyond the configured group count.
    InvalidScanGroup(u8),
    /// `SetElectrodes` group id that is neither an actuation group (0, 1) nor a scan group (>= 100).
    InvalidGroupId(u8),
    /// Electrode calibration chunk that would write past the end of the calibration structure.
    CalibrationOverrun {
        /// Byte offset of the first byte in the chunk
        offset: u16,
        /// Chunk length in bytes
        length: u16,
    },
    /// Parameter id outside the option table.
    UnknownParameter(u32),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidScanGroup(g) => write!(f, "invalid scan group {g}"),
            Self::InvalidGroupId(g) => write!(f, "invalid electrode group id {g}"),
            Self::CalibrationOverrun { offset, length } => {
                write!(f, "calibration write overruns buffer: offset {offset}, length {length}")
            }
            Self::UnknownParameter(id) => write!(f, "unknown parameter id {id}"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::InvalidScanGroup(g) => defmt::write!(f, "invalid scan group {}", g),
            Self::InvalidGroupId(g) => defmt::write!(f, "invalid electrode group id {}", g),
            Self::CalibrationOverrun { offset, length } => {
                defmt::write!(f, "calibration overrun: offset {}, length {}", offset, length)
            }
            Self::UnknownParameter(id) => defmt::write!(f, "unknown parameter id {}", id),
        }
    }
}
