// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Capacitance scan group table.
//!
//! Each group is a set of electrodes measured together in one sample, plus a setting byte
//! (bit 0 selects low gain). A group with an empty mask is inactive.

use crate::config::N_CAP_GROUPS;
use crate::electrodes::PinMask;
use crate::error::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScanGroups {
    masks: [PinMask; N_CAP_GROUPS],
    settings: [u8; N_CAP_GROUPS],
}

impl ScanGroups {
    pub const fn new() -> Self {
        Self {
            masks: [PinMask::new(); N_CAP_GROUPS],
            settings: [0; N_CAP_GROUPS],
        }
    }

    pub fn set(&mut self, group: usize, setting: u8, mask: PinMask) -> Result<(), Error> {
        if group >= N_CAP_GROUPS {
            return Err(Error::InvalidScanGroup(group as u8));
        }
        self.settings[group] = setting;
        self.masks[group] = mask;
        Ok(())
    }

    pub fn is_active(&self, group: usize) -> bool {
        self.masks.get(group).is_some_and(PinMask::any)
    }

    pub fn is_any_active(&self) -> bool {
        (0..N_CAP_GROUPS).any(|g| self.is_active(g))
    }

    /// Mask of a group; empty for out of range groups.
    pub fn mask(&self, group: usize) -> PinMask {
        self.masks.get(group).copied().unwrap_or_default()
    }

    pub fn setting(&self, group: usize) -> u8 {
        self.settings.get(group).copied().unwrap_or(0)
    }

    #[inline]
    pub fn is_low_gain(&self, group: usize) -> bool {
        self.setting(group) & 1 != 0
    }

    #[inline]
    pub fn is_pin_active(&self, group: usize, pin: usize) -> bool {
        self.masks.get(group).is_some_and(|m| m.is_set(pin))
    }
}

impl Default for ScanGroups {
    fn default() -> Self {
        Self::new()
    }
}
