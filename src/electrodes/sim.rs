// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Simulated board for host tests.
//!
//! One [`SimState`] holds a nanosecond clock shared by the simulated HV507, scheduling timer and
//! timing timer. Every hardware call is appended to an operation log. The integrator model returns
//! `adc_base` until the outputs are unblanked within an integration window; from then until the
//! integrator is reset it adds the gain-dependent `delta_*` plus the signal of every electrode
//! currently driven.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use crate::config::N_PINS;
use crate::drivers::{Gain, HvShim};
use crate::electrodes::PinMask;
use crate::hw::{SchedulingTimer, TimingTimer};

#[derive(Clone, Debug, PartialEq)]
pub enum SimOp {
    Init,
    Polarity(bool),
    Blank,
    Unblank,
    Gain(Gain),
    Load(PinMask),
    Latch,
    SyncOn,
    SyncOff,
    IntEnable,
    IntReset,
    SetupAnalog,
    Read(u16),
    BeginWalk(bool),
    ClockBit,
    EndWalk,
    Inverted(bool),
    Delay(u32),
}

pub struct SimState {
    pub now_ns: u64,
    pub ops: Vec<SimOp>,

    pub adc_base: u16,
    pub delta_high: u16,
    pub delta_low: u16,
    /// Added while unblanked for each driven electrode
    pub pin_signal: [u16; N_PINS],
    /// Returned by reads ahead of the model
    pub scripted: VecDeque<u16>,

    pub blanked: bool,
    integrating: bool,
    charging: bool,
    pub gain: Gain,
    pub polarity: bool,
    loaded: PinMask,
    latched: PinMask,
    /// Position of the walking bit during a full scan
    pub walk_pin: Option<usize>,
    /// Pins latched during the bit walk, with the gain selected at the time
    pub walk_latches: Vec<(usize, Gain)>,

    pub scheduled: Vec<u32>,
    timing_reset_ns: u64,
    sched_reset_ns: u64,
}

impl SimState {
    fn log(&mut self, op: SimOp) {
        self.ops.push(op);
    }

    fn model(&self) -> u16 {
        if !self.charging {
            return self.adc_base;
        }
        let delta = match self.gain {
            Gain::High => self.delta_high,
            Gain::Low => self.delta_low,
        };
        let signal: u16 = match self.walk_pin {
            Some(_) => self
                .walk_latches
                .last()
                .map(|&(p, _)| self.pin_signal[p])
                .unwrap_or(0),
            None => self.latched.iter_set().map(|p| self.pin_signal[p]).sum(),
        };
        self.adc_base + delta + signal
    }

    /// Masks latched outside the bit walk, in order.
    pub fn latched_masks(&self) -> Vec<PinMask> {
        let mut loaded = PinMask::new();
        let mut out = Vec::new();
        for op in &self.ops {
            match op {
                SimOp::Load(m) => loaded = *m,
                SimOp::Latch => out.push(loaded),
                _ => {}
            }
        }
        out
    }

    pub fn count(&self, op: &SimOp) -> usize {
        self.ops.iter().filter(|o| *o == op).count()
    }
}

pub type Sim = Rc<RefCell<SimState>>;

pub fn new_sim() -> Sim {
    Rc::new(RefCell::new(SimState {
        now_ns: 0,
        ops: Vec::new(),
        adc_base: 1000,
        delta_high: 200,
        delta_low: 50,
        pin_signal: [0; N_PINS],
        scripted: VecDeque::new(),
        blanked: true,
        integrating: false,
        charging: false,
        gain: Gain::High,
        polarity: false,
        loaded: PinMask::new(),
        latched: PinMask::new(),
        walk_pin: None,
        walk_latches: Vec::new(),
        scheduled: Vec::new(),
        timing_reset_ns: 0,
        sched_reset_ns: 0,
    }))
}

pub struct SimHv(pub Sim);

impl HvShim for SimHv {
    fn init(&mut self) {
        let mut s = self.0.borrow_mut();
        s.blanked = true;
        s.log(SimOp::Init);
    }

    fn set_polarity(&mut self, pol: bool) {
        let mut s = self.0.borrow_mut();
        s.polarity = pol;
        s.now_ns += 50;
        s.log(SimOp::Polarity(pol));
    }

    fn blank(&mut self) {
        let mut s = self.0.borrow_mut();
        s.blanked = true;
        s.log(SimOp::Blank);
    }

    fn unblank(&mut self) {
        let mut s = self.0.borrow_mut();
        s.blanked = false;
        if s.integrating {
            s.charging = true;
        }
        s.log(SimOp::Unblank);
    }

    fn enable_integrator(&mut self) {
        let mut s = self.0.borrow_mut();
        s.integrating = true;
        s.charging = !s.blanked;
        s.log(SimOp::IntEnable);
    }

    fn reset_integrator(&mut self) {
        let mut s = self.0.borrow_mut();
        s.integrating = false;
        s.charging = false;
        s.log(SimOp::IntReset);
    }

    fn set_gain(&mut self, gain: Gain) {
        let mut s = self.0.borrow_mut();
        s.gain = gain;
        s.log(SimOp::Gain(gain));
    }

    fn load_shift_register(&mut self, mask: &PinMask) {
        let mut s = self.0.borrow_mut();
        s.loaded = *mask;
        s.log(SimOp::Load(*mask));
    }

    fn latch_shift_register(&mut self) {
        let mut s = self.0.borrow_mut();
        s.now_ns += 80;
        match s.walk_pin {
            Some(pin) => {
                let gain = s.gain;
                s.walk_latches.push((pin, gain));
            }
            None => s.latched = s.loaded,
        }
        s.log(SimOp::Latch);
    }

    fn set_scan_sync(&mut self) {
        self.0.borrow_mut().log(SimOp::SyncOn);
    }

    fn clear_scan_sync(&mut self) {
        self.0.borrow_mut().log(SimOp::SyncOff);
    }

    fn setup_analog(&mut self) {
        self.0.borrow_mut().log(SimOp::SetupAnalog);
    }

    fn read_int_vout(&mut self) -> u16 {
        let mut s = self.0.borrow_mut();
        let v = match s.scripted.pop_front() {
            Some(v) => v,
            None => s.model(),
        };
        s.now_ns += 500;
        s.log(SimOp::Read(v));
        v
    }

    fn begin_bit_walk(&mut self, inverted: bool) {
        let mut s = self.0.borrow_mut();
        s.walk_pin = Some(N_PINS - 1);
        s.log(SimOp::BeginWalk(inverted));
    }

    fn clock_bit(&mut self) {
        let mut s = self.0.borrow_mut();
        s.walk_pin = s.walk_pin.and_then(|p| p.checked_sub(1));
        s.now_ns += 80;
        s.log(SimOp::ClockBit);
    }

    fn end_bit_walk(&mut self) {
        let mut s = self.0.borrow_mut();
        s.walk_pin = None;
        s.log(SimOp::EndWalk);
    }

    fn apply_inversion(&mut self, inverted: bool) {
        self.0.borrow_mut().log(SimOp::Inverted(inverted));
    }

    fn delay_ns(&mut self, ns: u32) {
        let mut s = self.0.borrow_mut();
        s.now_ns += ns as u64;
        s.log(SimOp::Delay(ns));
    }
}

pub struct SimScheduler(pub Sim);

impl SimScheduler {
    /// Advance the clock to the pending deadline.
    pub fn elapse(sim: &Sim) {
        let mut s = sim.borrow_mut();
        let delay = s.scheduled.last().copied().unwrap_or(0);
        s.now_ns += delay as u64 * 1000;
    }
}

impl SchedulingTimer for SimScheduler {
    fn init(&mut self) {}

    fn reset(&mut self) {
        let mut s = self.0.borrow_mut();
        s.sched_reset_ns = s.now_ns;
    }

    fn schedule(&mut self, delay_us: u32) {
        self.0.borrow_mut().scheduled.push(delay_us);
    }

    fn time_us(&self) -> u32 {
        let s = self.0.borrow();
        ((s.now_ns - s.sched_reset_ns) / 1000) as u32
    }

    fn acknowledge(&mut self) {}
}

pub struct SimTiming(pub Sim);

impl TimingTimer for SimTiming {
    fn reset(&mut self) {
        let mut s = self.0.borrow_mut();
        s.timing_reset_ns = s.now_ns;
    }

    fn time_us(&self) -> u32 {
        let s = self.0.borrow();
        ((s.now_ns - s.timing_reset_ns) / 1000) as u32
    }
}
