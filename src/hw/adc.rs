// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Basic ADC support for STM32F7 using direct PAC register access.
//!
//! Thin wrapper around ADC1 with blocking single-channel reads. The integrator output is sampled
//! back to back inside tight timing windows, so the channel is selected once by [`AdcRead::select`]
//! and subsequent conversions only start and wait.
//!
//! Example:
//! ```no_run
//! let mut adc1 = Adc::adc1(dp.ADC1);
//! adc1.select(2);
//! let value = adc1.convert();
//! ```

/// Trait for reading a single channel from an ADC peripheral.
pub trait AdcRead {
    /// Route `ch` to the converter, leaving it selected for following conversions.
    fn select(&mut self, ch: u8);

    /// Convert the currently selected channel.
    fn convert(&mut self) -> u16;

    /// Select and convert a channel.
    fn read_channel(&mut self, ch: u8) -> u16 {
        self.select(ch);
        self.convert()
    }
}

#[cfg(feature = "board")]
pub use board::Adc;

#[cfg(feature = "board")]
mod board {
    use super::AdcRead;
    use stm32f7xx_hal::pac;

    /// Generic ADC wrapper over a PAC ADCx peripheral.
    pub struct Adc<ADC> {
        adc: ADC,
    }

    impl<ADC> Adc<ADC> {
        #[inline]
        pub fn free(self) -> ADC {
            self.adc
        }
    }

    fn configure_common() {
        let common = unsafe { &*pac::ADC_COMMON::ptr() };

        // ADC prescaler: PCLK2 / 4
        common.ccr.modify(|_, w| w.adcpre().div4());
    }

    fn init_basic_adc(adc: &pac::adc1::RegisterBlock) {
        // Power off to configure
        adc.cr2.modify(|_, w| w.adon().clear_bit());

        // 12-bit, right-aligned, software trigger
        adc.cr1.modify(|_, w| w.res().bits(0b00));
        adc.cr2.modify(|_, w| {
            w.cont().clear_bit();
            w.align().right();
            w.exten().disabled();
            w
        });

        // Shortest sample time; the integrator output is low impedance
        adc.smpr2.modify(|_, w| unsafe { w.bits(0) });

        // Sequence length = 1 conversion
        adc.sqr1.modify(|_, w| w.l().bits(0));

        // Power on
        adc.cr2.modify(|_, w| w.adon().set_bit());
    }

    impl Adc<pac::ADC1> {
        /// Create and initialize ADC1.
        pub fn adc1(adc1: pac::ADC1) -> Self {
            let rcc = unsafe { &*pac::RCC::ptr() };
            rcc.apb2enr.modify(|_, w| w.adc1en().set_bit());

            configure_common();
            init_basic_adc(&adc1);

            Self { adc: adc1 }
        }
    }

    impl AdcRead for Adc<pac::ADC1> {
        fn select(&mut self, ch: u8) {
            self.adc.sqr3.modify(|_, w| unsafe { w.sq1().bits(ch & 0x1F) });
        }

        fn convert(&mut self) -> u16 {
            self.adc.cr2.modify(|_, w| w.swstart().set_bit());
            while self.adc.sr.read().eoc().bit_is_clear() {}
            self.adc.dr.read().data().bits()
        }
    }
}
