// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! State shared between the drive interrupt and the main loop.
//!
//! Word-sized control values are atomics. Everything else sits behind a critical-section mutex and
//! is only ever copied in or out; no sampling window runs while the lock is held.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use critical_section::Mutex;

use crate::config::{N_CAP_GROUPS, N_PINS};
use crate::electrodes::sampling::{OffsetCalibration, SampleData};
use crate::electrodes::{ElectrodeCalibration, PinMask, ScanGroups};

/// Progress of a requested offset calibration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CalibrateStep {
    None = 0,
    /// Requested by the host; the next tick blanks the outputs and waits one drive period.
    Requested = 1,
    /// Outputs have settled; the next tick measures.
    Settling = 2,
}

impl CalibrateStep {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => CalibrateStep::Requested,
            2 => CalibrateStep::Settling,
            _ => CalibrateStep::None,
        }
    }
}

pub(crate) struct SharedData {
    pub shift_reg_a: PinMask,
    pub shift_reg_b: PinMask,
    /// Bit set for pins measured at low gain in a full scan
    pub low_gain_flags: PinMask,
    pub scan_groups: ScanGroups,
    /// Summed electrode offsets of each scan group
    pub group_offsets: [u16; N_CAP_GROUPS],
    /// Summed electrode offsets of actuation group A
    pub active_offset: u16,
    pub calibration: ElectrodeCalibration,
    pub offsets: OffsetCalibration,

    pub active_sample: SampleData,
    pub group_data: [u16; N_CAP_GROUPS],
    pub scan_data: [u16; N_PINS],
}

impl SharedData {
    const fn new() -> Self {
        Self {
            shift_reg_a: PinMask::new(),
            shift_reg_b: PinMask::new(),
            low_gain_flags: PinMask::new(),
            scan_groups: ScanGroups::new(),
            group_offsets: [0; N_CAP_GROUPS],
            active_offset: 0,
            calibration: ElectrodeCalibration::new(),
            offsets: OffsetCalibration {
                high_gain: 0,
                low_gain: 0,
            },
            active_sample: SampleData {
                sample0: 0,
                sample1: 0,
            },
            group_data: [0; N_CAP_GROUPS],
            scan_data: [0; N_PINS],
        }
    }
}

pub struct Shared {
    duty_a: AtomicU8,
    duty_b: AtomicU8,
    dirty: AtomicBool,
    calibrate_step: AtomicU8,
    data: Mutex<RefCell<SharedData>>,
}

impl Shared {
    /// Both duty cycles full, all masks clear.
    pub const fn new() -> Self {
        Self {
            duty_a: AtomicU8::new(255),
            duty_b: AtomicU8::new(255),
            dirty: AtomicBool::new(false),
            calibrate_step: AtomicU8::new(CalibrateStep::None as u8),
            data: Mutex::new(RefCell::new(SharedData::new())),
        }
    }

    #[inline]
    pub fn duty_cycles(&self) -> (u8, u8) {
        (
            self.duty_a.load(Ordering::Relaxed),
            self.duty_b.load(Ordering::Relaxed),
        )
    }

    #[inline]
    pub(crate) fn set_duty_a(&self, duty: u8) {
        self.duty_a.store(duty, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn set_duty_b(&self, duty: u8) {
        self.duty_b.store(duty, Ordering::Relaxed);
    }

    /// Flag new actuation masks; the next drive pulse latches them and acknowledges.
    #[inline]
    pub(crate) fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    #[inline]
    pub(crate) fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::Acquire)
    }

    #[inline]
    pub fn calibrate_step(&self) -> CalibrateStep {
        CalibrateStep::from_u8(self.calibrate_step.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn set_calibrate_step(&self, step: CalibrateStep) {
        self.calibrate_step.store(step as u8, Ordering::Release);
    }

    /// Run `f` on the locked data. Keep `f` short: it blocks the drive interrupt.
    #[inline]
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut SharedData) -> R) -> R {
        critical_section::with(|cs| f(&mut self.data.borrow_ref_mut(cs)))
    }

    /// Most recent offset calibration.
    pub fn offset_calibration(&self) -> OffsetCalibration {
        self.with(|d| d.offsets)
    }
}

impl Default for Shared {
    fn default() -> Self {
        Self::new()
    }
}
