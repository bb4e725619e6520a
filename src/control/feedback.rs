// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Closed-loop capacitance feedback.
//!
//! Regulates the capacitance seen by a set of scan groups by steering the duty cycles of the two
//! actuation groups around a baseline. A positive correction lengthens group A, a negative one
//! lengthens group B. Gains are read from the parameter store on every update so they can be tuned
//! live.

use crate::config::{AppConfig, CAP_AMPLIFIER_GAIN};
use crate::control::pid::Pid;
use crate::electrodes::ScanGroups;
use crate::events::{CapGroups, FeedbackCommand, FeedbackMode, SetDutyCycle};
use crate::fmt::{debug, trace};

/// Bound on the integral contribution, in duty cycle counts.
const INTEGRAL_LIMIT: f32 = 40.0;

/// Full scale of the 12-bit ADC over 3.3 V.
const ADC_COUNTS_PER_VOLT: f32 = 4096.0 / 3.3;

/// Scale factor from ADC counts of one group to capacitance.
pub fn counts_to_pf(groups: &ScanGroups, group: usize, config: &AppConfig) -> f32 {
    let r = if groups.is_low_gain(group) {
        config.low_gain_r()
    } else {
        config.high_gain_r()
    };
    1.0 / (CAP_AMPLIFIER_GAIN * config.hv_target() * 1e12 * ADC_COUNTS_PER_VOLT * r)
}

pub struct FeedbackController {
    command: FeedbackCommand,
    pid: Pid,
}

impl FeedbackController {
    pub fn new() -> Self {
        Self {
            command: FeedbackCommand::default(),
            pid: Pid::new(0.0, 0.0, 0.0).with_integral_limits(-INTEGRAL_LIMIT, INTEGRAL_LIMIT),
        }
    }

    /// Replace the setpoint and mode. Controller history carries over.
    pub fn set_command(&mut self, command: FeedbackCommand) {
        debug!("feedback mode {} target {}", command.mode, command.target);
        self.command = command;
    }

    #[inline]
    pub fn command(&self) -> &FeedbackCommand {
        &self.command
    }

    /// Controlled variable: positive groups, minus negative groups in differential mode.
    pub fn measure(&self, groups: &CapGroups, config: &AppConfig) -> f32 {
        let cmd = &self.command;
        let mut x = 0.0;
        for (g, &counts) in groups.measurements.iter().enumerate() {
            let pf = counts as f32 * counts_to_pf(&groups.scan_groups, g, config);
            if cmd.measure_groups_p_mask & (1 << g) != 0 {
                x += pf;
            }
            if cmd.mode == FeedbackMode::Differential && cmd.measure_groups_n_mask & (1 << g) != 0 {
                x -= pf;
            }
        }
        x
    }

    /// Run one control step on a group measurement.
    ///
    /// Returns the duty cycles to apply, or `None` while disabled.
    pub fn update(&mut self, groups: &CapGroups, config: &AppConfig) -> Option<SetDutyCycle> {
        if self.command.mode == FeedbackMode::Disabled {
            return None;
        }

        self.pid
            .set_gains(config.feedback_kp(), config.feedback_ki(), config.feedback_kd());
        let x = self.measure(groups, config);
        // float to int casts saturate
        let feedback = self.pid.update(self.command.target, x) as i16 as i32;

        let baseline = self.command.baseline as i32;
        let (pos, neg) = if feedback > 0 {
            let pos = (baseline + feedback).min(255);
            (pos, (pos - feedback).max(0))
        } else {
            let neg = (baseline - feedback).min(255);
            ((neg + feedback).max(0), neg)
        };
        trace!("feedback x {} out {} -> {} / {}", x, feedback, pos, neg);

        Some(SetDutyCycle {
            update_a: true,
            update_b: true,
            duty_cycle_a: pos as u8,
            duty_cycle_b: neg as u8,
        })
    }
}

impl Default for FeedbackController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{id, OptionValue, N_CAP_GROUPS};
    use crate::electrodes::PinMask;

    fn groups(measurements: [u16; N_CAP_GROUPS]) -> CapGroups {
        let mut scan_groups = ScanGroups::new();
        scan_groups
            .set(1, 1, PinMask::from_bytes([0x01; 16]))
            .unwrap();
        CapGroups {
            measurements,
            scan_groups,
        }
    }

    fn command(mode: FeedbackMode, target: f32, baseline: u8) -> FeedbackCommand {
        FeedbackCommand {
            target,
            mode,
            measure_groups_p_mask: 0b01,
            measure_groups_n_mask: 0b10,
            baseline,
        }
    }

    fn config(kp: f32, ki: f32) -> AppConfig {
        let config = AppConfig::with_defaults();
        config.set_value(id::FEEDBACK_KP, OptionValue::Float(kp)).unwrap();
        config.set_value(id::FEEDBACK_KI, OptionValue::Float(ki)).unwrap();
        config
    }

    #[test]
    fn disabled_emits_nothing() {
        let config = config(1.0, 0.0);
        let mut fb = FeedbackController::new();
        assert_eq!(fb.update(&groups([100; 5]), &config), None);
    }

    #[test]
    fn positive_error_lengthens_a() {
        let config = config(1.0, 0.0);
        let mut fb = FeedbackController::new();
        fb.set_command(command(FeedbackMode::Normal, 10.0, 100));
        let out = fb.update(&groups([0; 5]), &config).unwrap();
        assert!(out.update_a && out.update_b);
        assert_eq!((out.duty_cycle_a, out.duty_cycle_b), (110, 100));
    }

    #[test]
    fn negative_error_lengthens_b() {
        let config = config(1.0, 0.0);
        let mut fb = FeedbackController::new();
        fb.set_command(command(FeedbackMode::Normal, -10.0, 100));
        let out = fb.update(&groups([0; 5]), &config).unwrap();
        assert_eq!((out.duty_cycle_a, out.duty_cycle_b), (100, 110));
    }

    #[test]
    fn outputs_clamp_to_duty_range() {
        let config = config(1.0, 0.0);
        let mut fb = FeedbackController::new();
        fb.set_command(command(FeedbackMode::Normal, 10.0, 250));
        let out = fb.update(&groups([0; 5]), &config).unwrap();
        assert_eq!((out.duty_cycle_a, out.duty_cycle_b), (255, 245));

        fb.set_command(command(FeedbackMode::Normal, -300.0, 250));
        let out = fb.update(&groups([0; 5]), &config).unwrap();
        assert_eq!((out.duty_cycle_a, out.duty_cycle_b), (0, 255));
    }

    #[test]
    fn integral_term_is_bounded() {
        let config = config(0.0, 100.0);
        let mut fb = FeedbackController::new();
        fb.set_command(command(FeedbackMode::Normal, 1.0, 0));
        let out = fb.update(&groups([0; 5]), &config).unwrap();
        assert_eq!((out.duty_cycle_a, out.duty_cycle_b), (40, 0));
    }

    #[test]
    fn differential_subtracts_negative_groups() {
        let config = AppConfig::with_defaults();
        let g = groups([1000, 400, 50, 0, 0]);
        let high = counts_to_pf(&g.scan_groups, 0, &config);
        let low = counts_to_pf(&g.scan_groups, 1, &config);
        assert!(low > high);

        let mut fb = FeedbackController::new();
        fb.set_command(command(FeedbackMode::Normal, 0.0, 0));
        let normal = fb.measure(&g, &config);
        assert!((normal - 1000.0 * high).abs() <= normal * 1e-5);

        fb.set_command(command(FeedbackMode::Differential, 0.0, 0));
        let diff = fb.measure(&g, &config);
        let expected = 1000.0 * high - 400.0 * low;
        assert!((diff - expected).abs() <= expected.abs() * 1e-5);
    }
}
