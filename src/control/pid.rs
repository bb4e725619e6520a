// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Discrete PID controller.
//!
//! Updated once per measurement, so the gains absorb the sample period. Works in `no_std` and does
//! not allocate memory.

/// PID controller with tunable gains, integral clamping and optional output clamping.
pub struct Pid {
    /// Proportional gain
    kp: f32,
    /// Integral gain
    ki: f32,
    /// Derivative gain
    kd: f32,

    /// Accumulated `ki * error`
    integral: f32,
    /// Error of the previous update (for derivative term)
    prev_error: f32,

    /// Output clamp
    out_min: f32,
    out_max: f32,

    /// Integral anti-windup clamp
    int_min: f32,
    int_max: f32,
}

impl Pid {
    /// Create a new PID controller with unbounded output and integral.
    pub fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self {
            kp,
            ki,
            kd,

            integral: 0.0,
            prev_error: 0.0,

            out_min: f32::NEG_INFINITY,
            out_max: f32::INFINITY,

            int_min: f32::NEG_INFINITY,
            int_max: f32::INFINITY,
        }
    }

    /// Set output limits.
    pub fn with_output_limits(mut self, min: f32, max: f32) -> Self {
        self.out_min = min;
        self.out_max = max;
        self
    }

    /// Set limits on the integral contribution to the output.
    pub fn with_integral_limits(mut self, min: f32, max: f32) -> Self {
        self.int_min = min;
        self.int_max = max;
        self
    }

    /// Retune without disturbing the controller history.
    pub fn set_gains(&mut self, kp: f32, ki: f32, kd: f32) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
    }

    /// Reset integrator + derivative history.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
    }

    /// Update the controller and return the clamped output.
    pub fn update(&mut self, setpoint: f32, measurement: f32) -> f32 {
        let error = setpoint - measurement;

        let p = self.kp * error;

        self.integral = (self.integral + self.ki * error).clamp(self.int_min, self.int_max);
        let i = self.integral;

        let d = self.kd * (error - self.prev_error);
        self.prev_error = error;

        (p + i + d).clamp(self.out_min, self.out_max)
    }
}
