// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Busy-wait delay calibrated against the core clock.
//!
//! Sampling windows are timed with interrupts disabled, so the delay cannot depend on a timer
//! interrupt. Counts core cycles instead.

use embedded_hal::delay::DelayNs;

pub struct CycleDelay {
    sysclk_hz: u32,
}

impl CycleDelay {
    pub fn new(sysclk_hz: u32) -> Self {
        Self { sysclk_hz }
    }
}

impl DelayNs for CycleDelay {
    #[inline]
    fn delay_ns(&mut self, ns: u32) {
        let cycles = (ns as u64 * self.sysclk_hz as u64) / 1_000_000_000;
        if cycles > 0 {
            cortex_m::asm::delay(cycles.min(u32::MAX as u64) as u32);
        }
    }
}
