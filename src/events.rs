// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Command and result types exchanged with the rest of the firmware.
//!
//! Inbound [`Command`]s arrive from the host link and are applied synchronously from the main
//! loop. Outbound [`Event`]s are produced by the electrode engine (from `poll()` only, never from
//! interrupt context) and handed to a [`Publisher`].

use crate::config::{N_BYTES, N_CAP_GROUPS, N_PINS};
use crate::electrodes::ScanGroups;

/// Number of bytes in a packed 2-bit-per-channel gain bitmap.
pub const GAIN_BYTES: usize = N_PINS.div_ceil(4);

/// Set the electrodes (and duty cycle) of an actuation group, or define a scan group.
///
/// `group_id` 0 and 1 select actuation groups A and B; `setting` is then the duty cycle.
/// `group_id` >= 100 selects scan group `group_id - 100`; `setting` bit 0 selects low gain.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SetElectrodes {
    pub group_id: u8,
    pub setting: u8,
    pub values: [u8; N_BYTES],
}

/// Per-channel gain selection, packed 2 bits per channel (LSB first within each byte).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SetGain {
    pub data: [u8; GAIN_BYTES],
}

impl SetGain {
    pub const fn new() -> Self {
        Self { data: [0; GAIN_BYTES] }
    }

    /// Gain code for a channel; 1 means low gain. Channels past the end read as 0.
    pub fn channel(&self, channel: usize) -> u8 {
        let shift = (channel % 4) * 2;
        self.data.get(channel / 4).map_or(0, |b| (b >> shift) & 0x3)
    }

    pub fn set_channel(&mut self, channel: usize, value: u8) {
        if let Some(b) = self.data.get_mut(channel / 4) {
            let shift = (channel % 4) * 2;
            *b &= !(0x3 << shift);
            *b |= (value & 0x3) << shift;
        }
    }
}

impl Default for SetGain {
    fn default() -> Self {
        Self::new()
    }
}

/// Update one or both actuation duty cycles.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetDutyCycle {
    pub update_a: bool,
    pub update_b: bool,
    pub duty_cycle_a: u8,
    pub duty_cycle_b: u8,
}

/// A chunk of the per-electrode calibration structure.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UpdateElectrodeCalibration<'a> {
    /// Offset of the first byte to update
    pub offset: u16,
    /// Bytes to copy; the chunk length is `data.len()`
    pub data: &'a [u8],
}

/// Capacitance feedback operating mode.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FeedbackMode {
    #[default]
    Disabled,
    /// Regulate the sum of the positive groups.
    Normal,
    /// Regulate positive groups minus negative groups.
    Differential,
}

impl FeedbackMode {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => FeedbackMode::Normal,
            2 => FeedbackMode::Differential,
            _ => FeedbackMode::Disabled,
        }
    }
}

/// Feedback controller setpoint and configuration.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FeedbackCommand {
    /// Target capacitance, pF
    pub target: f32,
    pub mode: FeedbackMode,
    /// Bitmask of scan groups summed positively
    pub measure_groups_p_mask: u8,
    /// Bitmask of scan groups subtracted in differential mode
    pub measure_groups_n_mask: u8,
    /// Duty cycle around which A and B are driven
    pub baseline: u8,
}

/// Inbound commands.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Command<'a> {
    SetElectrodes(SetElectrodes),
    SetGain(SetGain),
    SetDutyCycle(SetDutyCycle),
    RequestOffsetCalibration,
    UpdateElectrodeCalibration(UpdateElectrodeCalibration<'a>),
    Feedback(FeedbackCommand),
}

/// Active capacitance measurement, taken at the start of every positive drive pulse.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CapActive {
    /// Initial integrator value plus calibration offsets
    pub baseline: u16,
    /// Final integrator value
    pub measurement: u16,
    /// Bit 0 indicates low gain
    pub settings: u8,
}

/// Scan group measurements with the group table they were taken against.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CapGroups {
    pub measurements: [u16; N_CAP_GROUPS],
    pub scan_groups: ScanGroups,
}

/// Full per-electrode scan.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CapScan<'a> {
    pub measurements: &'a [u16; N_PINS],
}

/// Current duty cycles, reported after every duty cycle update.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DutyCycleUpdated {
    pub duty_cycle_a: u8,
    pub duty_cycle_b: u8,
}

/// Outbound results.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event<'a> {
    CapActive(CapActive),
    CapGroups(&'a CapGroups),
    CapScan(CapScan<'a>),
    ElectrodesUpdated,
    DutyCycleUpdated(DutyCycleUpdated),
}

/// Sink for outbound events.
///
/// Implemented for any `FnMut(Event)` closure, so a broker fanning events out to several
/// subscribers can be a plain closure over them.
pub trait Publisher {
    fn publish(&mut self, event: Event<'_>);
}

impl<F> Publisher for F
where
    F: FnMut(Event<'_>),
{
    fn publish(&mut self, event: Event<'_>) {
        self(event)
    }
}
