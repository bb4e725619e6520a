// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Live-tunable application parameters.
//!
//! Parameters are stored as raw 32-bit words in atomics, so the main loop can update them while the
//! drive interrupt reads them. Accessors always perform a fresh load; nothing in the firmware caches
//! a parameter value across uses.
//!
//! Floats are stored by bit pattern. Each option has a descriptor giving its kind, default, and a
//! human-readable name, mirroring the table exposed to the host software.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::Error;
use crate::fmt::debug;

/// Number of chained HV507 driver chips.
pub const N_HV507: usize = 2;
/// Number of electrode outputs.
pub const N_PINS: usize = N_HV507 * 64;
/// Number of bytes in a full shift-register image.
pub const N_BYTES: usize = N_HV507 * 8;
/// Number of capacitance scan groups.
pub const N_CAP_GROUPS: usize = 5;
/// Number of option slots (maximum option id + 1).
pub const MAX_OPT_ID: usize = 128;

/// Option ids. These are part of the host protocol and must not be renumbered.
pub mod id {
    pub const HV_TARGET: u8 = 11;
    pub const SCAN_SYNC_PIN: u8 = 20;
    pub const SCAN_START_DELAY: u8 = 21;
    pub const SCAN_BLANK_DELAY: u8 = 22;
    pub const SAMPLE_DELAY: u8 = 23;
    pub const INTEGRATOR_RESET_DELAY: u8 = 25;
    pub const AUGMENT_TOP_PLATE_LOW_SIDE: u8 = 26;
    pub const SAMPLE_DELAY_LOW_GAIN: u8 = 27;
    pub const ACTIVE_CAP_LOW_GAIN: u8 = 28;
    pub const TOP_PLATE_PIN: u8 = 30;
    pub const LOW_GAIN_R: u8 = 31;
    pub const HIGH_GAIN_R: u8 = 32;
    pub const AUTO_SAMPLE_DELAY: u8 = 33;
    pub const AUTO_SAMPLE_TIMEOUT: u8 = 34;
    pub const AUTO_SAMPLE_THRESHOLD: u8 = 35;
    pub const AUTO_SAMPLE_HOLDOFF: u8 = 36;
    pub const INVERTED_OPTO: u8 = 75;
    pub const FEEDBACK_KP: u8 = 100;
    pub const FEEDBACK_KI: u8 = 101;
    pub const FEEDBACK_KD: u8 = 102;
}

/// Storage type of an option.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OptionKind {
    Bool,
    Int,
    Float,
}

/// Typed option value.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i32),
    Float(f32),
}

impl OptionValue {
    /// Raw 32-bit storage representation.
    pub fn to_raw(self) -> u32 {
        match self {
            OptionValue::Bool(b) => b as u32,
            OptionValue::Int(i) => i as u32,
            OptionValue::Float(f) => f.to_bits(),
        }
    }

    pub fn kind(&self) -> OptionKind {
        match self {
            OptionValue::Bool(_) => OptionKind::Bool,
            OptionValue::Int(_) => OptionKind::Int,
            OptionValue::Float(_) => OptionKind::Float,
        }
    }
}

/// Static description of one option.
#[derive(Copy, Clone, Debug)]
pub struct OptionDescriptor {
    pub id: u8,
    pub default: OptionValue,
    pub name: &'static str,
    pub description: &'static str,
}

impl OptionDescriptor {
    #[inline]
    pub fn kind(&self) -> OptionKind {
        self.default.kind()
    }
}

const fn opt(id: u8, default: OptionValue, name: &'static str, description: &'static str) -> OptionDescriptor {
    OptionDescriptor {
        id,
        default,
        name,
        description,
    }
}

static DESCRIPTORS: [OptionDescriptor; 20] = [
    opt(id::HV_TARGET, OptionValue::Float(150.0), "HV Voltage Setting", "Target voltage for HV supply"),
    opt(id::SCAN_SYNC_PIN, OptionValue::Int(0), "Scan Sync Pin",
        "Scan channel asserting SYNC out; -1 means active sample, 10000 + N means group N"),
    opt(id::SCAN_START_DELAY, OptionValue::Int(200_000), "Scan Start Delay",
        "ns; delay between polarity switch and first scan measurement"),
    opt(id::SCAN_BLANK_DELAY, OptionValue::Int(4000), "Scan Blank Delay",
        "ns; delay after asserting blank between each scan measurement"),
    opt(id::SAMPLE_DELAY, OptionValue::Int(10_000), "Sample Delay (high gain)", "ns; Duration of current integration"),
    opt(id::SAMPLE_DELAY_LOW_GAIN, OptionValue::Int(40_000), "Sample Delay (low gain)",
        "ns; Duration of current integration"),
    opt(id::ACTIVE_CAP_LOW_GAIN, OptionValue::Bool(false), "Active Cap Uses Low Gain",
        "Use low gain setting to measure active capacitance"),
    opt(id::INTEGRATOR_RESET_DELAY, OptionValue::Int(1000), "Integrator reset delay",
        "ns; time between reset release and first sample"),
    opt(id::AUGMENT_TOP_PLATE_LOW_SIDE, OptionValue::Bool(false), "Enable Top Plate Augment FET",
        "Enable extra FET to drive top plate to GND"),
    opt(id::TOP_PLATE_PIN, OptionValue::Int(97), "Top Plate Pin", "Pin number of HV507 output driving top plate"),
    opt(id::LOW_GAIN_R, OptionValue::Float(33.0), "R Sense Low Gain",
        "Sense resistance for low gain capacitance measurement"),
    opt(id::HIGH_GAIN_R, OptionValue::Float(220.0), "R Sense High Gain",
        "Sense resistance for high gain capacitance measurement"),
    opt(id::AUTO_SAMPLE_DELAY, OptionValue::Bool(false), "Auto Sample Delay",
        "Enable automatic sample delay adjustment based on current (experimental)"),
    opt(id::AUTO_SAMPLE_TIMEOUT, OptionValue::Int(35), "Auto Sample Timeout",
        "Number of sample cycles to wait for current threshold"),
    opt(id::AUTO_SAMPLE_THRESHOLD, OptionValue::Int(50), "Auto sample threshold",
        "ADC counts; threshold for sample cutoff"),
    opt(id::AUTO_SAMPLE_HOLDOFF, OptionValue::Int(1000), "Auto sample holdoff",
        "ns; delay after threshold is reached before ending sampling"),
    opt(id::INVERTED_OPTO, OptionValue::Bool(false), "Inverting Optoisolators",
        "Invert all opto-isolator IOs to support alternative parts"),
    opt(id::FEEDBACK_KP, OptionValue::Float(0.0), "Feedback KP", "Proportional gain for feedback drop control"),
    opt(id::FEEDBACK_KI, OptionValue::Float(0.0), "Feedback KI", "Integral gain for feedback drop control"),
    opt(id::FEEDBACK_KD, OptionValue::Float(0.0), "Feedback KD", "Differential gain for feedback drop control"),
];

/// All option descriptors, in display order.
pub fn descriptors() -> &'static [OptionDescriptor] {
    &DESCRIPTORS
}

/// Look up the descriptor of an option id.
pub fn descriptor(id: u8) -> Option<&'static OptionDescriptor> {
    DESCRIPTORS.iter().find(|d| d.id == id)
}

/// Gain of the integrator after the sense resistor, in V per V-s.
pub const CAP_AMPLIFIER_GAIN: f32 = 2.0 * 22.36 * 25000.0;

/// Parameter store shared between the main loop and the drive interrupt.
pub struct AppConfig {
    values: [AtomicU32; MAX_OPT_ID],
}

#[allow(clippy::declare_interior_mutable_const)]
const ZERO: AtomicU32 = AtomicU32::new(0);

impl AppConfig {
    /// Create a store with every slot zeroed. Call [`AppConfig::load_defaults`] before use.
    pub const fn new() -> Self {
        Self {
            values: [ZERO; MAX_OPT_ID],
        }
    }

    /// Create a store populated with the default of every described option.
    pub fn with_defaults() -> Self {
        let config = Self::new();
        config.load_defaults();
        config
    }

    /// Reset every described option to its default.
    pub fn load_defaults(&self) {
        for d in DESCRIPTORS.iter() {
            self.values[d.id as usize].store(d.default.to_raw(), Ordering::Relaxed);
        }
    }

    /// Read the raw word of an option slot.
    pub fn get(&self, id: u32) -> Result<u32, Error> {
        self.values
            .get(id as usize)
            .map(|v| v.load(Ordering::Relaxed))
            .ok_or(Error::UnknownParameter(id))
    }

    /// Write the raw word of an option slot. Returns the stored value.
    pub fn set(&self, id: u32, raw: u32) -> Result<u32, Error> {
        let slot = self.values.get(id as usize).ok_or(Error::UnknownParameter(id))?;
        slot.store(raw, Ordering::Relaxed);
        debug!("param {} <- {:x}", id, raw);
        Ok(raw)
    }

    /// Write a typed value.
    pub fn set_value(&self, id: u8, value: OptionValue) -> Result<u32, Error> {
        self.set(id as u32, value.to_raw())
    }

    /// Read or write a parameter, as requested by a host `SetParameter` message.
    ///
    /// Returns the value held after the operation.
    pub fn handle_set_parameter(&self, id: u32, raw: u32, write: bool) -> Result<u32, Error> {
        if write {
            self.set(id, raw)
        } else {
            self.get(id)
        }
    }

    #[inline]
    fn raw(&self, id: u8) -> u32 {
        self.values[id as usize].load(Ordering::Relaxed)
    }

    #[inline]
    fn int(&self, id: u8) -> i32 {
        self.raw(id) as i32
    }

    /// Non-negative duration option, in ns.
    #[inline]
    fn delay_ns(&self, id: u8) -> u32 {
        self.int(id).max(0) as u32
    }

    #[inline]
    fn float(&self, id: u8) -> f32 {
        f32::from_bits(self.raw(id))
    }

    #[inline]
    fn flag(&self, id: u8) -> bool {
        self.raw(id) != 0
    }

    /// Target voltage of the HV supply.
    pub fn hv_target(&self) -> f32 {
        self.float(id::HV_TARGET)
    }

    /// Sync pulse selector: pin index for full scan, -1 for the active measurement, 10000 + n for
    /// scan group n.
    pub fn scan_sync_pin(&self) -> i32 {
        self.int(id::SCAN_SYNC_PIN)
    }

    pub fn scan_start_delay(&self) -> u32 {
        self.delay_ns(id::SCAN_START_DELAY)
    }

    pub fn scan_blank_delay(&self) -> u32 {
        self.delay_ns(id::SCAN_BLANK_DELAY)
    }

    pub fn sample_delay(&self) -> u32 {
        self.delay_ns(id::SAMPLE_DELAY)
    }

    pub fn sample_delay_low_gain(&self) -> u32 {
        self.delay_ns(id::SAMPLE_DELAY_LOW_GAIN)
    }

    pub fn integrator_reset_delay(&self) -> u32 {
        self.delay_ns(id::INTEGRATOR_RESET_DELAY)
    }

    pub fn augment_top_plate_low_side(&self) -> bool {
        self.flag(id::AUGMENT_TOP_PLATE_LOW_SIDE)
    }

    pub fn active_cap_low_gain(&self) -> bool {
        self.flag(id::ACTIVE_CAP_LOW_GAIN)
    }

    /// HV507 output driving the common top plate.
    pub fn top_plate_pin(&self) -> i32 {
        self.int(id::TOP_PLATE_PIN)
    }

    /// Sense resistor used for low gain capacitance measurement.
    pub fn low_gain_r(&self) -> f32 {
        self.float(id::LOW_GAIN_R)
    }

    /// Sense resistor used for high gain capacitance measurement.
    pub fn high_gain_r(&self) -> f32 {
        self.float(id::HIGH_GAIN_R)
    }

    pub fn auto_sample_delay(&self) -> bool {
        self.flag(id::AUTO_SAMPLE_DELAY)
    }

    /// Maximum number of ADC reads while waiting for the integrator to settle.
    pub fn auto_sample_timeout(&self) -> u32 {
        self.int(id::AUTO_SAMPLE_TIMEOUT).max(0) as u32
    }

    /// ADC counts per read below which the integrator is considered settled.
    pub fn auto_sample_threshold(&self) -> i32 {
        self.int(id::AUTO_SAMPLE_THRESHOLD)
    }

    pub fn auto_sample_holdoff(&self) -> u32 {
        self.delay_ns(id::AUTO_SAMPLE_HOLDOFF)
    }

    /// Invert all opto-isolated HV507 control lines.
    pub fn inverted_opto(&self) -> bool {
        self.flag(id::INVERTED_OPTO)
    }

    pub fn feedback_kp(&self) -> f32 {
        self.float(id::FEEDBACK_KP)
    }

    pub fn feedback_ki(&self) -> f32 {
        self.float(id::FEEDBACK_KI)
    }

    pub fn feedback_kd(&self) -> f32 {
        self.float(id::FEEDBACK_KD)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}
