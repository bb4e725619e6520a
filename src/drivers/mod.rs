// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Device-Specific Drivers
//!
//! This module contains device-specific drivers that sit above the raw `hw/` layer and below the
//! application logic.
//!
//! ## Existing drivers
//!
//! - [`hv507`] – pair of daisy-chained Microchip HV507 64-channel high-voltage shift registers,
//!   with the integrator front-end used for capacitance sensing

pub mod hv507;

pub use hv507::{Gain, Hv507, Hv507Pins, HvShim, ShiftBus};
