// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Capacitance sampling primitive and offset calibration.
//!
//! A capacitance sample brackets one charge-transfer window with two ADC reads of the integrator
//! output. The integrator never resets fully to 0 V, so the starting level is re-measured on every
//! call. The whole window runs with interrupts disabled for consistent timing.

use crate::config::AppConfig;
use crate::drivers::{Gain, HvShim};
use crate::fmt::info;

/// Number of samples averaged per gain during offset calibration.
pub const CALIBRATION_SAMPLES: u32 = 100;

/// Integrator output at the start and end of a charge-transfer window.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SampleData {
    pub sample0: u16,
    pub sample1: u16,
}

impl SampleData {
    /// `sample1 - sample0 - offsets`, clipped to 0 when the difference wraps.
    pub fn corrected(&self, offsets: &[u16]) -> u16 {
        let diff = offsets
            .iter()
            .fold(self.sample1.wrapping_sub(self.sample0), |acc, &o| acc.wrapping_sub(o));
        clip_wrapped(diff)
    }
}

/// Differences that underflow show up as values above `i16::MAX`; report them as zero.
#[inline]
pub fn clip_wrapped(diff: u16) -> u16 {
    if diff > i16::MAX as u16 {
        0
    } else {
        diff
    }
}

/// Calibrated no-load offsets, in ADC counts.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OffsetCalibration {
    pub high_gain: u16,
    pub low_gain: u16,
}

impl OffsetCalibration {
    #[inline]
    pub fn for_gain(&self, low_gain: bool) -> u16 {
        if low_gain {
            self.low_gain
        } else {
            self.high_gain
        }
    }
}

/// Take one capacitance sample.
///
/// Expects the outputs blanked and the integrator in reset. Returns with the outputs unblanked and
/// the integrator back in reset.
pub fn sample_capacitance<H: HvShim>(
    hw: &mut H,
    config: &AppConfig,
    low_gain: bool,
    fire_sync_pulse: bool,
) -> SampleData {
    hw.setup_analog();

    critical_section::with(|_| {
        hw.enable_integrator();
        hw.delay_ns(config.integrator_reset_delay());
        if fire_sync_pulse {
            hw.set_scan_sync();
        }
        let sample0 = hw.read_int_vout();

        hw.unblank();

        if config.auto_sample_delay() {
            // Wait for the integrator slope to fall below the threshold
            let threshold = config.auto_sample_threshold();
            let timeout = config.auto_sample_timeout();
            let mut prev: Option<u16> = None;
            for _ in 0..timeout {
                let x = hw.read_int_vout();
                if let Some(p) = prev {
                    if (x as i32) - (p as i32) < threshold {
                        break;
                    }
                }
                prev = Some(x);
            }
            hw.delay_ns(config.auto_sample_holdoff());
        } else if low_gain {
            hw.delay_ns(config.sample_delay_low_gain());
        } else {
            hw.delay_ns(config.sample_delay());
        }

        let sample1 = hw.read_int_vout();

        hw.clear_scan_sync();
        hw.reset_integrator();

        SampleData { sample0, sample1 }
    })
}

fn average_offset<H: HvShim>(hw: &mut H, config: &AppConfig, low_gain: bool) -> u16 {
    hw.set_gain(Gain::from_low(low_gain));
    let mut accum: i32 = 0;
    for _ in 0..CALIBRATION_SAMPLES {
        hw.blank();
        let s = sample_capacitance(hw, config, low_gain, false);
        accum += s.sample1 as i32 - s.sample0 as i32;
    }
    (accum.max(0) / CALIBRATION_SAMPLES as i32) as u16
}

/// Measure the no-load integrator offset at both gains.
///
/// Expects all electrodes to be off and the outputs blanked.
pub fn calibrate_offset<H: HvShim>(hw: &mut H, config: &AppConfig) -> OffsetCalibration {
    let cal = OffsetCalibration {
        high_gain: average_offset(hw, config, false),
        low_gain: average_offset(hw, config, true),
    };
    info!("offset calibration: high {} low {}", cal.high_gain, cal.low_gain);
    cal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{id, OptionValue};
    use crate::electrodes::sim::{new_sim, SimHv, SimOp};
    use std::vec::Vec;

    fn auto_config(timeout: i32) -> AppConfig {
        let config = AppConfig::with_defaults();
        config.set_value(id::AUTO_SAMPLE_DELAY, OptionValue::Bool(true)).unwrap();
        config.set_value(id::AUTO_SAMPLE_TIMEOUT, OptionValue::Int(timeout)).unwrap();
        config.set_value(id::AUTO_SAMPLE_HOLDOFF, OptionValue::Int(2500)).unwrap();
        config
    }

    fn reads(ops: &[SimOp]) -> Vec<u16> {
        ops.iter()
            .filter_map(|op| match op {
                SimOp::Read(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn auto_delay_stops_once_slope_settles() {
        let sim = new_sim();
        sim.borrow_mut()
            .scripted
            .extend([1000, 1100, 1200, 1220, 1230, 9999]);
        let mut hw = SimHv(sim.clone());
        let config = auto_config(35);

        let s = sample_capacitance(&mut hw, &config, false, false);
        assert_eq!(s, SampleData { sample0: 1000, sample1: 1230 });

        let st = sim.borrow();
        assert_eq!(reads(&st.ops), [1000, 1100, 1200, 1220, 1230]);
        // holdoff between the settling read and the final read
        let holdoff = st.ops.iter().position(|op| *op == SimOp::Delay(2500)).unwrap();
        assert_eq!(st.ops[holdoff - 1], SimOp::Read(1220));
        assert_eq!(st.ops[holdoff + 1], SimOp::Read(1230));
        assert!(!st.ops.contains(&SimOp::Delay(10_000)));
    }

    #[test]
    fn auto_delay_is_bounded_by_timeout() {
        let sim = new_sim();
        sim.borrow_mut()
            .scripted
            .extend((0..10).map(|i| 1000 + 100 * i));
        let mut hw = SimHv(sim.clone());
        let config = auto_config(4);

        let s = sample_capacitance(&mut hw, &config, true, false);
        // one start read, four settling reads, one final read
        assert_eq!(reads(&sim.borrow().ops).len(), 6);
        assert_eq!(s, SampleData { sample0: 1000, sample1: 1500 });
        assert!(sim.borrow().ops.contains(&SimOp::Delay(2500)));
    }

    #[test]
    fn fixed_delay_depends_on_gain() {
        let sim = new_sim();
        let mut hw = SimHv(sim.clone());
        let config = AppConfig::with_defaults();

        sample_capacitance(&mut hw, &config, true, true);
        let st = sim.borrow();
        assert!(st.ops.contains(&SimOp::Delay(40_000)));
        assert!(!st.ops.contains(&SimOp::Delay(10_000)));
        assert_eq!(reads(&st.ops).len(), 2);
        assert_eq!(st.count(&SimOp::SyncOn), 1);
        assert_eq!(st.count(&SimOp::SyncOff), 1);
    }

    #[test]
    fn consecutive_calibrations_agree() {
        let sim = new_sim();
        let mut hw = SimHv(sim.clone());
        let config = AppConfig::with_defaults();

        let first = calibrate_offset(&mut hw, &config);
        let second = calibrate_offset(&mut hw, &config);
        assert_eq!(
            first,
            OffsetCalibration {
                high_gain: 200,
                low_gain: 50
            }
        );
        assert_eq!(second, first);
        // every sample starts from blanked outputs
        let st = sim.borrow();
        assert_eq!(st.count(&SimOp::Blank), 4 * CALIBRATION_SAMPLES as usize);
        assert_eq!(st.count(&SimOp::Unblank), 4 * CALIBRATION_SAMPLES as usize);
    }

    #[test]
    fn wrapped_differences_clip_to_zero() {
        let s = SampleData {
            sample0: 1000,
            sample1: 900,
        };
        assert_eq!(s.corrected(&[]), 0);

        let s = SampleData {
            sample0: 100,
            sample1: 900,
        };
        assert_eq!(s.corrected(&[]), 800);
        assert_eq!(s.corrected(&[50, 25]), 725);
        assert_eq!(s.corrected(&[700, 101]), 0);
        assert_eq!(clip_wrapped(32767), 32767);
        assert_eq!(clip_wrapped(32768), 0);
    }

    #[test]
    fn offset_by_gain() {
        let cal = OffsetCalibration {
            high_gain: 3,
            low_gain: 9,
        };
        assert_eq!(cal.for_gain(false), 3);
        assert_eq!(cal.for_gain(true), 9);
    }
}
