// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # PurpleDrop Firmware
//!
//! This crate contains the electrode drive and capacitance measurement firmware for the PurpleDrop
//! digital-microfluidics board, written in Rust, targeting an STM32F7 MCU.
//!
//! Two daisy-chained HV507 high-voltage shift registers bias up to 128 electrodes with an
//! alternating polarity square wave. Between drive pulses the same hardware is reused to measure
//! picofarad-scale capacitance, either per electrode (full scan) or over configured electrode
//! groups (feedback).
//!
//! ## Crate Structure
//!
//! | Module | Purpose |
//! | ------ | -------- |
//! | [`hw`] | MCU-level wrappers around ADC, SPI, timers, GPIO, USART |
//! | [`drivers`] | Device-level drivers (HV507 shift register pair) |
//! | [`electrodes`] | Drive/measurement state machine, scans and calibration |
//! | [`control`] | Capacitance feedback control (PID) |
//! | [`config`] | Live-tunable parameter store |
//! | [`events`] | Inbound commands and outbound results |
//!
//! ## Getting Started
//!
//! Run the host tests:
//!
//! ```bash
//! cargo test
//! ```
//!
//! Flash the board:
//!
//! ```bash
//! cargo run --release --features board --target thumbv7em-none-eabihf
//! ```
//!
//! ## License
//!
//! Licensed under the **MIT License**.
//! See the `LICENSE` file in the repository root for full terms.
//!
//! © 2025–2026 Christopher Liu

#![cfg_attr(not(test), no_std)]

pub(crate) mod fmt;

pub mod config;
pub mod control;
pub mod drivers;
pub mod electrodes;
pub mod error;
pub mod events;
pub mod hw;
pub mod queue;

pub use config::AppConfig;
pub use error::Error;
