// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Pin definitions for the STM32F777 on the PurpleDrop board.
//!
//! The HV507 control lines are toggled inside nanosecond-scale sampling windows, so they are
//! driven through [`RawPin`], a type-erased handle writing the port's BSRR directly. It implements
//! `embedded-hal` 1.0 [`OutputPin`], which is all the HV507 driver needs.
//!
//! `stm32f7xx-hal` 0.8 pins only implement the `embedded-hal` 0.2 traits, and the full scan has to
//! flip SCK/MOSI between SPI and GPIO mode while `Spi` still owns them. Neither is possible through
//! the HAL pin types, hence the register access here.

use core::convert::Infallible;
use core::ptr;

use embedded_hal::digital::{ErrorType, OutputPin};
use stm32f7xx_hal::{
    gpio::{self, gpioa, gpioc, Alternate, Analog},
    pac,
    prelude::*,
};

use crate::drivers::Hv507Pins;

// Register offsets within a GPIO port
const MODER: usize = 0x00;
const BSRR: usize = 0x18;

/// GPIO ports a [`RawPin`] can live on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Port {
    A,
    B,
    C,
    D,
    E,
}

impl Port {
    /// Port of a HAL pin. Unmapped ports fail at compile time.
    const fn from_id(id: char) -> Self {
        match id {
            'A' => Port::A,
            'B' => Port::B,
            'C' => Port::C,
            'D' => Port::D,
            'E' => Port::E,
            _ => panic!("GPIO port has no RawPin mapping"),
        }
    }

    fn base(self) -> usize {
        match self {
            Port::A => pac::GPIOA::ptr() as usize,
            Port::B => pac::GPIOB::ptr() as usize,
            Port::C => pac::GPIOC::ptr() as usize,
            Port::D => pac::GPIOD::ptr() as usize,
            Port::E => pac::GPIOE::ptr() as usize,
        }
    }
}

/// GPIO mode field values.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PinMode {
    Output = 0b01,
    Alternate = 0b10,
}

/// Type-erased push-pull output on any port.
pub struct RawPin {
    port: usize,
    n: u8,
}

// Only ever touches its own bit through atomic BSRR writes; MODER updates happen with the owning
// peripheral idle.
unsafe impl Send for RawPin {}

impl RawPin {
    /// Configure a HAL pin as push-pull output (initially low) and erase its type.
    pub fn output<const P: char, const N: u8, MODE>(pin: gpio::Pin<P, N, MODE>) -> Self {
        let port = const { Port::from_id(P) };
        let mut pin = pin.into_push_pull_output();
        pin.set_low();
        Self {
            port: port.base(),
            n: N,
        }
    }

    /// Create a second handle to a pin already owned elsewhere.
    ///
    /// # Safety
    /// The caller must coordinate with the owner of the pin, e.g. by switching the pin to GPIO mode
    /// only while the owning peripheral is idle.
    pub unsafe fn steal(port: Port, n: u8) -> Self {
        Self {
            port: port.base(),
            n,
        }
    }

    /// Switch the pin between GPIO output and its alternate function.
    pub fn set_mode(&mut self, mode: PinMode) {
        let moder = (self.port + MODER) as *mut u32;
        let shift = 2 * self.n as u32;
        cortex_m::interrupt::free(|_| unsafe {
            let v = ptr::read_volatile(moder);
            ptr::write_volatile(moder, (v & !(0b11 << shift)) | ((mode as u32) << shift));
        });
    }

    #[inline(always)]
    fn write_bsrr(&mut self, bits: u32) {
        unsafe { ptr::write_volatile((self.port + BSRR) as *mut u32, bits) };
    }
}

impl ErrorType for RawPin {
    type Error = Infallible;
}

impl OutputPin for RawPin {
    #[inline(always)]
    fn set_high(&mut self) -> Result<(), Infallible> {
        self.write_bsrr(1 << self.n);
        Ok(())
    }

    #[inline(always)]
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.write_bsrr(1 << (self.n as u32 + 16));
        Ok(())
    }
}

/// All board pins. Construct this once at startup using:
///
/// ```rust
/// let pins = BoardPins::new(dp.GPIOA, dp.GPIOB, dp.GPIOC);
/// ```
pub struct BoardPins {
    pub usart1: Usart1Pins,
    pub spi3: Spi3Pins,
    pub hv507: Hv507Pins<RawPin>,
    /// Integrator output, ADC1_IN2
    pub int_vout: gpioa::PA2<Analog>,
}

pub struct Usart1Pins {
    pub tx: gpioa::PA9<Alternate<7>>,
    pub rx: gpioa::PA10<Alternate<7>>,
}

/// SPI3 SCK/MISO/MOSI feeding the HV507 data chain
pub struct Spi3Pins {
    pub sck: gpioc::PC10<Alternate<6>>,
    pub miso: gpioc::PC11<Alternate<6>>,
    pub mosi: gpioc::PC12<Alternate<6>>,
}

impl BoardPins {
    /// Create all named pins from raw GPIO peripherals.
    pub fn new(gpioa: pac::GPIOA, gpiob: pac::GPIOB, gpioc: pac::GPIOC) -> Self {
        let gpioa = gpioa.split();
        let gpiob = gpiob.split();
        let gpioc = gpioc.split();

        Self {
            usart1: Usart1Pins {
                tx: gpioa.pa9.into_alternate::<7>(),
                rx: gpioa.pa10.into_alternate::<7>(),
            },

            spi3: Spi3Pins {
                sck: gpioc.pc10.into_alternate::<6>(),
                miso: gpioc.pc11.into_alternate::<6>(),
                mosi: gpioc.pc12.into_alternate::<6>(),
            },

            hv507: Hv507Pins {
                pol: RawPin::output(gpiob.pb5),
                bl: RawPin::output(gpiob.pb4),
                le: RawPin::output(gpioc.pc13),
                int_reset: RawPin::output(gpioc.pc2),
                gain_sel: RawPin::output(gpioc.pc3),
                scan_sync: RawPin::output(gpioc.pc1),
                // Top plate low-side augment FET
                augment: RawPin::output(gpioa.pa3),
            },

            int_vout: gpioa.pa2.into_analog(),
        }
    }
}
