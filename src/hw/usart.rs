// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Debug console over USART.
//!
//! Used by the firmware to print a one-line summary of every full electrode scan. Implements
//! `core::fmt::Write`, so `write!`/`writeln!` work; include `\r` in the format string for correct
//! line endings on the terminal.
//!
//! To access the terminal on the host machine, connect to the debug USB port and use
//! ```
//! $ screen /dev/tty.usbmodem* <baud_rate>
//! ```

use core::fmt;
use nb::block;

use stm32f7xx_hal::{
    prelude::*,
    serial::{Instance, Pins, Serial, Tx},
};

use crate::config::N_PINS;

pub struct Usart<U: Instance> {
    tx: Tx<U>,
}

impl<U: Instance> Usart<U> {
    pub fn new<PINS: Pins<U>>(serial: Serial<U, PINS>) -> Self {
        let (tx, _rx) = serial.split();
        Self { tx }
    }

    #[inline]
    pub fn write_byte(&mut self, b: u8) {
        let _ = block!(self.tx.write(b));
    }

    pub fn write_str(&mut self, s: &str) {
        for &b in s.as_bytes() {
            self.write_byte(b);
        }
    }

    /// Write string and CRLF terminator.
    #[inline]
    pub fn println(&mut self, s: &str) {
        self.write_str(s);
        self.write_str("\r\n");
    }

    pub fn print_u32(&mut self, mut n: u32) {
        let mut buf = [0u8; 10];
        let mut i = buf.len();
        if n == 0 {
            self.write_byte(b'0');
            return;
        }
        while n > 0 {
            i -= 1;
            buf[i] = b'0' + (n % 10) as u8;
            n /= 10;
        }
        for &b in &buf[i..] {
            self.write_byte(b);
        }
    }

    /// Print `scan: <count of electrodes above threshold> max <pin>=<value>`.
    pub fn print_scan_summary(&mut self, measurements: &[u16; N_PINS], threshold: u16) {
        let covered = measurements.iter().filter(|&&m| m > threshold).count();
        let (max_pin, max) = measurements
            .iter()
            .enumerate()
            .max_by_key(|&(_, &m)| m)
            .map(|(i, &m)| (i, m))
            .unwrap_or((0, 0));

        self.write_str("scan: ");
        self.print_u32(covered as u32);
        self.write_str(" max ");
        self.print_u32(max_pin as u32);
        self.write_byte(b'=');
        self.print_u32(max as u32);
        self.write_str("\r\n");
    }
}

impl<U: Instance> fmt::Write for Usart<U> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        Usart::write_str(self, s);
        Ok(())
    }
}
