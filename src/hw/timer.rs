// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Microsecond timers used by the electrode drive.
//!
//! - [`SchedulingTimer`] fires a single interrupt after a requested delay. The drive re-arms it on
//!   every tick, so it behaves as a self-rescheduling callback rather than a periodic timer.
//! - [`TimingTimer`] is a free-running elapsed-time counter, reset at the start of each drive pulse.
//!
//! On the board both run at 1 MHz from the APB1 timer clock: TIM5 for scheduling, TIM2 for timing.
//! Both are 32-bit, so neither wraps within a drive period.

/// One-shot interrupt source driving the electrode state machine.
pub trait SchedulingTimer {
    /// Configure the peripheral and enable its interrupt line.
    fn init(&mut self);

    /// Restart the time base at zero.
    fn reset(&mut self);

    /// Fire the interrupt `delay_us` microseconds from now. A delay of 0 fires as soon as possible.
    fn schedule(&mut self, delay_us: u32);

    /// Microseconds since the last [`SchedulingTimer::reset`].
    fn time_us(&self) -> u32;

    /// Clear the pending interrupt flag. Called first thing in the interrupt handler.
    fn acknowledge(&mut self);
}

/// Elapsed-time query.
pub trait TimingTimer {
    fn reset(&mut self);
    fn time_us(&self) -> u32;
}

#[cfg(feature = "board")]
pub use board::{Tim2Timing, Tim5Scheduler};

#[cfg(feature = "board")]
mod board {
    use super::{SchedulingTimer, TimingTimer};
    use stm32f7xx_hal::pac::{self, Interrupt};

    const TICK_HZ: u32 = 1_000_000;

    fn prescaler(timclk_hz: u32) -> u16 {
        (timclk_hz / TICK_HZ).saturating_sub(1) as u16
    }

    /// TIM5 compare-channel-1 scheduler.
    pub struct Tim5Scheduler {
        tim: pac::TIM5,
        timclk_hz: u32,
    }

    impl Tim5Scheduler {
        pub fn new(tim: pac::TIM5, timclk_hz: u32) -> Self {
            let rcc = unsafe { &*pac::RCC::ptr() };
            rcc.apb1enr.modify(|_, w| w.tim5en().set_bit());
            Self { tim, timclk_hz }
        }
    }

    impl SchedulingTimer for Tim5Scheduler {
        fn init(&mut self) {
            let psc = prescaler(self.timclk_hz);
            self.tim.cr1.modify(|_, w| w.cen().clear_bit());
            self.tim.psc.write(|w| unsafe { w.bits(psc as u32) });
            self.tim.arr.write(|w| unsafe { w.bits(u32::MAX) });
            // Load the prescaler without raising an update interrupt
            self.tim.egr.write(|w| w.ug().set_bit());
            self.tim.sr.write(|w| unsafe { w.bits(0) });
            self.tim.cr1.modify(|_, w| w.cen().set_bit());

            unsafe { cortex_m::peripheral::NVIC::unmask(Interrupt::TIM5) };
        }

        fn reset(&mut self) {
            self.tim.cnt.write(|w| unsafe { w.bits(0) });
        }

        fn schedule(&mut self, delay_us: u32) {
            // Compare must land strictly after the current count to fire
            let target = self.tim.cnt.read().bits().wrapping_add(delay_us.max(1));
            self.tim.ccr1.write(|w| unsafe { w.bits(target) });
            self.tim.sr.modify(|_, w| w.cc1if().clear_bit());
            self.tim.dier.modify(|_, w| w.cc1ie().set_bit());
        }

        fn time_us(&self) -> u32 {
            self.tim.cnt.read().bits()
        }

        fn acknowledge(&mut self) {
            self.tim.sr.modify(|_, w| w.cc1if().clear_bit());
            self.tim.dier.modify(|_, w| w.cc1ie().clear_bit());
        }
    }

    /// Free-running TIM2 counter.
    pub struct Tim2Timing {
        tim: pac::TIM2,
    }

    impl Tim2Timing {
        pub fn new(tim: pac::TIM2, timclk_hz: u32) -> Self {
            let rcc = unsafe { &*pac::RCC::ptr() };
            rcc.apb1enr.modify(|_, w| w.tim2en().set_bit());

            tim.cr1.modify(|_, w| w.cen().clear_bit());
            tim.psc.write(|w| unsafe { w.bits(prescaler(timclk_hz) as u32) });
            tim.arr.write(|w| unsafe { w.bits(u32::MAX) });
            tim.egr.write(|w| w.ug().set_bit());
            tim.cr1.modify(|_, w| w.cen().set_bit());

            Self { tim }
        }
    }

    impl TimingTimer for Tim2Timing {
        fn reset(&mut self) {
            self.tim.cnt.write(|w| unsafe { w.bits(0) });
        }

        fn time_us(&self) -> u32 {
            self.tim.cnt.read().bits()
        }
    }
}
