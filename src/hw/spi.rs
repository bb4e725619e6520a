// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Serial Peripheral Interface (SPI) abstraction layer.
//!
//! - `SpiBus` wraps a configured HAL SPI instance with 8-bit words.
//! - `HvShiftBus` drives the HV507 data chain over SPI3, and can hand SCK/MOSI over to GPIO so
//!   single bits can be clocked through the chain during a full scan.

use stm32f7xx_hal::{
    pac,
    prelude::*,
    spi::{self, Enabled, Spi},
};

use crate::drivers::ShiftBus;
use crate::hw::pins::{PinMode, Port, RawPin};
use embedded_hal::digital::OutputPin;

/// Wrapper around an enabled HAL SPI instance (8-bit words).
pub struct SpiBus<I, P> {
    spi: Spi<I, P, Enabled<u8>>,
}

impl<I, P> SpiBus<I, P>
where
    I: spi::Instance,
    P: spi::Pins<I>,
{
    pub fn new(spi: Spi<I, P, Enabled<u8>>) -> Self {
        Self { spi }
    }

    /// Perform a blocking, full-duplex transfer of one byte.
    pub fn transfer_byte(&mut self, byte: u8) -> Result<u8, spi::Error> {
        let mut tmp = [byte];
        self.spi.transfer(&mut tmp)?;
        Ok(tmp[0])
    }

    /// Send a byte, ignoring the response.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) -> Result<(), spi::Error> {
        let _ = self.transfer_byte(byte)?;
        Ok(())
    }

    pub fn free(self) -> Spi<I, P, Enabled<u8>> {
        self.spi
    }
}

/// SPI3 plus GPIO handles on its SCK (PC10) and MOSI (PC12) pins.
pub struct HvShiftBus<P> {
    bus: SpiBus<pac::SPI3, P>,
    sck: RawPin,
    mosi: RawPin,
    inverted: bool,
}

impl<P> HvShiftBus<P>
where
    P: spi::Pins<pac::SPI3>,
{
    pub fn new(bus: SpiBus<pac::SPI3, P>) -> Self {
        // Safety: SCK/MOSI are only switched to GPIO between transfers, see `release`.
        let (sck, mosi) = unsafe { (RawPin::steal(Port::C, 10), RawPin::steal(Port::C, 12)) };
        Self {
            bus,
            sck,
            mosi,
            inverted: false,
        }
    }

    fn drive(pin: &mut RawPin, level: bool) {
        if level {
            pin.set_high().ok();
        } else {
            pin.set_low().ok();
        }
    }
}

impl<P> ShiftBus for HvShiftBus<P>
where
    P: spi::Pins<pac::SPI3>,
{
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.bus.write_byte(b).ok();
        }
    }

    fn set_inverted(&mut self, inverted: bool) {
        if inverted == self.inverted {
            return;
        }
        self.inverted = inverted;

        // CPOL may only change with the peripheral disabled
        let spi3 = unsafe { &*pac::SPI3::ptr() };
        spi3.cr1.modify(|_, w| w.spe().clear_bit());
        spi3.cr1.modify(|_, w| w.cpol().bit(inverted));
        spi3.cr1.modify(|_, w| w.spe().set_bit());
    }

    fn release(&mut self) {
        let level = self.inverted;
        Self::drive(&mut self.sck, level);
        Self::drive(&mut self.mosi, level);
        self.sck.set_mode(PinMode::Output);
        self.mosi.set_mode(PinMode::Output);
    }

    fn set_sck(&mut self, high: bool) {
        Self::drive(&mut self.sck, high ^ self.inverted);
    }

    fn set_mosi(&mut self, high: bool) {
        Self::drive(&mut self.mosi, high ^ self.inverted);
    }

    fn reclaim(&mut self) {
        self.sck.set_mode(PinMode::Alternate);
        self.mosi.set_mode(PinMode::Alternate);
    }
}
