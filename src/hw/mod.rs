// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # MCU-Level Hardware Wrappers
//!
//! The capability traits ([`AdcRead`], [`SchedulingTimer`], [`TimingTimer`]) and [`InvertiblePin`]
//! always compile, so the electrode engine can be tested on the host. STM32F7 implementations are
//! only built with the `board` feature.

pub mod adc;
pub mod invertible;
pub mod timer;

#[cfg(feature = "board")]
pub mod delay;
#[cfg(feature = "board")]
pub mod pins;
#[cfg(feature = "board")]
pub mod spi;
#[cfg(feature = "board")]
pub mod usart;

pub use adc::AdcRead;
pub use invertible::{ActiveLevel, InvertiblePin};
pub use timer::{SchedulingTimer, TimingTimer};

#[cfg(feature = "board")]
pub use adc::Adc;
#[cfg(feature = "board")]
pub use delay::CycleDelay;
#[cfg(feature = "board")]
pub use pins::{BoardPins, Port, RawPin};
#[cfg(feature = "board")]
pub use spi::{HvShiftBus, SpiBus};
#[cfg(feature = "board")]
pub use timer::{Tim2Timing, Tim5Scheduler};
#[cfg(feature = "board")]
pub use usart::Usart;
