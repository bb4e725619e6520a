// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Interrupt half of the electrode engine.
//!
//! [`ElectrodeDrive`] is advanced by the scheduling timer interrupt. Each tick performs one step of
//! a two-level state machine and re-arms the timer:
//!
//! ```text
//!   DriveN ──> MeasureGroups ──> DriveP ──> DriveN ...
//! ```
//!
//! Each drive state runs a sub-machine over one polarity half-period:
//!
//! ```text
//!   Start ──> [WaitIntermediate] ──> EndPulse ──> EndCycle
//! ```
//!
//! `Start` latches A ∪ B. When the duty cycles differ, the mask of the longer-duty group alone is
//! loaded and then latched at the shorter duty, turning the other group off early. `EndPulse` blanks
//! at the longer duty, and `EndCycle` returns to the top level after one full drive period.

use crate::config::{AppConfig, N_CAP_GROUPS, N_PINS};
use crate::drivers::{Gain, HvShim};
use crate::electrodes::sampling::{calibrate_offset, sample_capacitance};
use crate::electrodes::shared::{CalibrateStep, Shared};
use crate::electrodes::{PinMask, DRIVE_PERIOD_US, SCAN_PERIOD};
use crate::fmt::{debug, info};
use crate::hw::{SchedulingTimer, TimingTimer};
use crate::queue::{ResultProducer, ResultTag};

/// Sync pin selector firing on the active capacitance measurement.
const SYNC_ACTIVE: i32 = -1;
/// Sync pin selector base for scan groups.
const SYNC_GROUP_BASE: i32 = 10_000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TopState {
    DriveN,
    MeasureGroups,
    DriveP,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveState {
    Start,
    WaitIntermediate,
    EndPulse,
    EndCycle,
}

pub struct ElectrodeDrive<'a, H, S, T> {
    hw: H,
    scheduler: S,
    timing: T,
    config: &'a AppConfig,
    shared: &'a Shared,
    results: ResultProducer<'a>,

    top: TopState,
    drive: DriveState,
    cycles_since_scan: u32,
    /// Duty cycles captured at `Start`, used for the rest of the pulse
    pulse_duty: (u8, u8),
    scan_buf: [u16; N_PINS],
}

impl<'a, H, S, T> ElectrodeDrive<'a, H, S, T>
where
    H: HvShim,
    S: SchedulingTimer,
    T: TimingTimer,
{
    pub fn new(
        hw: H,
        scheduler: S,
        timing: T,
        config: &'a AppConfig,
        shared: &'a Shared,
        results: ResultProducer<'a>,
    ) -> Self {
        Self {
            hw,
            scheduler,
            timing,
            config,
            shared,
            results,
            top: TopState::DriveN,
            drive: DriveState::Start,
            cycles_since_scan: 0,
            pulse_duty: (255, 255),
            scan_buf: [0; N_PINS],
        }
    }

    /// Bring up the hardware, calibrate, and schedule the first tick one drive period out.
    pub fn start(&mut self) {
        self.hw.init();
        self.hw.apply_inversion(self.config.inverted_opto());
        self.calibrate();

        self.timing.reset();
        self.scheduler.init();
        self.scheduler.reset();
        self.scheduler.schedule(DRIVE_PERIOD_US);
        info!("electrode drive started");
    }

    /// Scheduling timer interrupt entry point.
    pub fn on_timer(&mut self) {
        self.scheduler.acknowledge();
        self.tick();
    }

    /// Advance the state machine by one step.
    pub fn tick(&mut self) {
        match self.shared.calibrate_step() {
            CalibrateStep::Requested => {
                // Let the outputs settle for a period before measuring
                self.hw.blank();
                self.hw.set_polarity(true);
                self.shared.set_calibrate_step(CalibrateStep::Settling);
                self.scheduler.schedule(DRIVE_PERIOD_US);
            }
            CalibrateStep::Settling => {
                self.calibrate();
                self.shared.set_calibrate_step(CalibrateStep::None);
                // Whatever cycle was in progress is abandoned
                self.top = TopState::DriveN;
                self.drive = DriveState::Start;
                self.scheduler.schedule(1);
            }
            CalibrateStep::None => self.step(),
        }

        self.hw.apply_inversion(self.config.inverted_opto());
    }

    fn step(&mut self) {
        match self.top {
            TopState::DriveN => {
                if self.drive_step() {
                    self.top = TopState::MeasureGroups;
                    self.hw.blank();
                    self.hw.set_polarity(true);
                    self.scheduler.schedule(1);
                    self.cycles_since_scan += 1;
                }
            }
            TopState::MeasureGroups => {
                self.group_scan();
                self.top = TopState::DriveP;
                self.scheduler.schedule(1);
            }
            TopState::DriveP => {
                if self.cycles_since_scan >= SCAN_PERIOD {
                    self.cycles_since_scan = 0;
                    self.full_scan();
                    self.results.push(ResultTag::ScanCapReady);
                }
                if self.drive_step() {
                    self.top = TopState::DriveN;
                    self.scheduler.schedule(1);
                }
            }
        }
    }

    /// Wake at `target_us` into the current pulse, or immediately if already past it.
    fn schedule_at(&mut self, target_us: u32) {
        let elapsed = self.timing.time_us();
        self.scheduler.schedule(target_us.saturating_sub(elapsed));
    }

    /// Returns true once the half-period is complete.
    fn drive_step(&mut self) -> bool {
        match self.drive {
            DriveState::Start => {
                self.timing.reset();
                self.hw.blank();
                self.hw.set_polarity(self.top != TopState::DriveN);

                let inverted = self.config.inverted_opto();
                let (a, b) = self.shared.with(|d| (d.shift_reg_a, d.shift_reg_b));
                let (duty_a, duty_b) = self.shared.duty_cycles();
                self.pulse_duty = (duty_a, duty_b);

                let shadow = PinMask::drive_image(&a, &b, inverted);
                self.hw.load_shift_register(&shadow);
                self.hw.latch_shift_register();
                if self.shared.take_dirty() {
                    self.results.push(ResultTag::ElectrodesAckReady);
                }

                if self.top == TopState::DriveN {
                    self.hw.unblank();
                } else {
                    let low_gain = self.config.active_cap_low_gain();
                    self.hw.set_gain(Gain::from_low(low_gain));
                    let sync = self.config.scan_sync_pin() == SYNC_ACTIVE;
                    let sample = sample_capacitance(&mut self.hw, self.config, low_gain, sync);
                    self.shared.with(|d| d.active_sample = sample);
                    self.results.push(ResultTag::ActiveCapReady);
                }

                if duty_a != duty_b {
                    // Keep only the longer-duty group for the rest of the pulse
                    let keep = if duty_a < duty_b { b } else { a };
                    let keep = if inverted { keep.inverted() } else { keep };
                    self.hw.load_shift_register(&keep);
                    self.drive = DriveState::WaitIntermediate;
                } else {
                    self.drive = DriveState::EndPulse;
                }

                let min_duty = duty_a.min(duty_b) as u32;
                self.schedule_at(DRIVE_PERIOD_US * min_duty / 255);
                false
            }
            DriveState::WaitIntermediate => {
                let (duty_a, duty_b) = self.pulse_duty;
                let max_duty = duty_a.max(duty_b) as u32;
                self.hw.latch_shift_register();
                self.drive = DriveState::EndPulse;
                self.schedule_at(DRIVE_PERIOD_US * max_duty / 255);
                false
            }
            DriveState::EndPulse => {
                self.hw.blank();
                self.drive = DriveState::EndCycle;
                self.schedule_at(DRIVE_PERIOD_US);
                false
            }
            DriveState::EndCycle => {
                self.drive = DriveState::Start;
                true
            }
        }
    }

    fn calibrate(&mut self) {
        let offsets = calibrate_offset(&mut self.hw, self.config);
        self.shared.with(|d| d.offsets = offsets);
    }

    /// Measure every active scan group.
    fn group_scan(&mut self) {
        let (groups, group_offsets, offsets) =
            self.shared.with(|d| (d.scan_groups, d.group_offsets, d.offsets));

        if !groups.is_any_active() {
            self.shared.with(|d| d.group_data = [0; N_CAP_GROUPS]);
            return;
        }

        let inverted = self.config.inverted_opto();
        let mut data = [0u16; N_CAP_GROUPS];
        for (g, out) in data.iter_mut().enumerate() {
            if !groups.is_active(g) {
                continue;
            }
            let mask = groups.mask(g);
            let mask = if inverted { mask.inverted() } else { mask };
            let low_gain = groups.is_low_gain(g);
            self.hw.set_gain(Gain::from_low(low_gain));

            // Blanking time during the load is the SPI transfer itself
            self.hw.blank();
            self.hw.load_shift_register(&mask);
            self.hw.latch_shift_register();

            let sync = self.config.scan_sync_pin() == SYNC_GROUP_BASE + g as i32;
            let sample = sample_capacitance(&mut self.hw, self.config, low_gain, sync);
            *out = sample.corrected(&[offsets.for_gain(low_gain), group_offsets[g]]);
        }

        self.shared.with(|d| d.group_data = data);
        self.results.push(ResultTag::GroupCapReady);
    }

    /// Measure every electrode by walking a single set bit through the chain, highest pin first.
    fn full_scan(&mut self) {
        let config = self.config;
        let inverted = config.inverted_opto();
        let (low_gain_flags, offsets, calibration) =
            self.shared.with(|d| (d.low_gain_flags, d.offsets, d.calibration));

        self.hw.begin_bit_walk(inverted);
        self.hw.set_polarity(true);
        self.hw.blank();
        self.hw.delay_ns(config.scan_start_delay());

        let top_plate = config.top_plate_pin();
        for pin in (0..N_PINS).rev() {
            let low_gain = low_gain_flags.is_set(pin);
            self.hw.set_gain(Gain::from_low(low_gain));

            if pin as i32 == top_plate {
                self.scan_buf[pin] = 0;
                self.hw.clock_bit();
                continue;
            }

            self.hw.latch_shift_register();
            self.hw.delay_ns(config.scan_blank_delay());

            let sync = pin as i32 == config.scan_sync_pin();
            let sample = sample_capacitance(&mut self.hw, config, low_gain, sync);
            let electrode = calibration.electrode_offset(pin, low_gain, config);
            self.scan_buf[pin] = sample.corrected(&[offsets.for_gain(low_gain), electrode]);

            self.hw.blank();
            self.hw.clock_bit();
        }

        self.hw.end_bit_walk();
        let scan = self.scan_buf;
        self.shared.with(|d| d.scan_data = scan);
        debug!("full scan complete");
    }

    #[inline]
    pub fn top_state(&self) -> TopState {
        self.top
    }

    #[inline]
    pub fn drive_state(&self) -> DriveState {
        self.drive
    }

    #[inline]
    pub fn cycles_since_scan(&self) -> u32 {
        self.cycles_since_scan
    }

    /// Result queue diagnostics.
    pub fn results(&self) -> &ResultProducer<'a> {
        &self.results
    }

    pub fn hw(&self) -> &H {
        &self.hw
    }
}
