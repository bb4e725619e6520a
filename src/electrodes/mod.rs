// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Electrode Engine
//!
//! Drives up to 128 electrodes through the HV507 pair and measures their capacitance between drive
//! pulses.
//!
//! The engine is split in two halves sharing a [`Shared`] block and a bounded result queue:
//!
//! | Half | Context | Role |
//! | ---- | ------- | ---- |
//! | [`ElectrodeDrive`] | scheduling timer interrupt | drive pulses, sampling, scans |
//! | [`ElectrodeControl`] | main loop | host commands, result publication |
//!
//! Each drive cycle is two pulses of [`DRIVE_PERIOD_US`], negative then positive, with the scan
//! group measurement between them. Every [`SCAN_PERIOD`] cycles a full per-electrode scan runs at
//! the start of the positive pulse.

mod calibration;
mod control;
mod drive;
mod pin_mask;
mod sampling;
mod scan_groups;
mod shared;

#[cfg(test)]
pub(crate) mod sim;

pub use calibration::{ElectrodeCalibration, CALIBRATION_BYTES};
pub use control::ElectrodeControl;
pub use drive::{DriveState, ElectrodeDrive, TopState};
pub use pin_mask::{bit_reverse, PinMask};
pub use sampling::{OffsetCalibration, SampleData, CALIBRATION_SAMPLES};
pub use scan_groups::ScanGroups;
pub use shared::{CalibrateStep, Shared};

use crate::config::AppConfig;
use crate::drivers::HvShim;
use crate::hw::{SchedulingTimer, TimingTimer};
use crate::queue::ResultQueue;

/// Length of one drive pulse, µs.
pub const DRIVE_PERIOD_US: u32 = 1000;
/// Drive cycles between full scans.
pub const SCAN_PERIOD: u32 = 500;

/// Build both halves of the engine over one result queue.
pub fn engine<'a, H, S, T>(
    hw: H,
    scheduler: S,
    timing: T,
    config: &'a AppConfig,
    shared: &'a Shared,
    queue: &'a mut ResultQueue,
) -> (ElectrodeDrive<'a, H, S, T>, ElectrodeControl<'a>)
where
    H: HvShim,
    S: SchedulingTimer,
    T: TimingTimer,
{
    let (producer, consumer) = queue.split();
    (
        ElectrodeDrive::new(hw, scheduler, timing, config, shared, producer),
        ElectrodeControl::new(config, shared, consumer),
    )
}
