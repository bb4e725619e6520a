// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Control Algorithms
//!
//! Closed-loop control on top of the capacitance measurements.
//!
//! ## Modules
//!
//! - [`pid`] - Discrete PID controller.
//! - [`feedback`] - Capacitance feedback steering the actuation duty cycles.

pub mod feedback;
pub mod pid;

pub use feedback::FeedbackController;
pub use pid::Pid;
