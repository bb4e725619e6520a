// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! One bit per electrode, in shift-register order.
//!
//! Pin `i` lives in byte `i / 8`, bit `i % 8`. Masks arriving from the host use the opposite bit
//! order within each byte, matching how the HV507 outputs are wired to the electrode connector;
//! [`PinMask::from_host`] converts them.

use crate::config::{N_BYTES, N_PINS};

/// Reverse the bit order of a byte (bit 0 <-> bit 7).
#[inline]
pub const fn bit_reverse(b: u8) -> u8 {
    b.reverse_bits()
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinMask([u8; N_BYTES]);

impl PinMask {
    pub const fn new() -> Self {
        Self([0; N_BYTES])
    }

    pub const fn from_bytes(bytes: [u8; N_BYTES]) -> Self {
        Self(bytes)
    }

    /// Convert a host-order mask, bit-reversing every byte.
    pub fn from_host(values: &[u8; N_BYTES]) -> Self {
        let mut m = Self::new();
        for (dst, &src) in m.0.iter_mut().zip(values.iter()) {
            *dst = bit_reverse(src);
        }
        m
    }

    #[inline]
    pub fn bytes(&self) -> &[u8; N_BYTES] {
        &self.0
    }

    #[inline]
    pub fn is_set(&self, pin: usize) -> bool {
        pin < N_PINS && self.0[pin / 8] & (1 << (pin % 8)) != 0
    }

    pub fn set(&mut self, pin: usize, on: bool) {
        if pin >= N_PINS {
            return;
        }
        if on {
            self.0[pin / 8] |= 1 << (pin % 8);
        } else {
            self.0[pin / 8] &= !(1 << (pin % 8));
        }
    }

    /// True if any pin is set.
    pub fn any(&self) -> bool {
        self.0.iter().any(|&b| b != 0)
    }

    /// Indices of all set pins, ascending.
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        (0..N_PINS).filter(move |&i| self.is_set(i))
    }

    pub fn inverted(&self) -> Self {
        let mut m = *self;
        m.0.iter_mut().for_each(|b| *b = !*b);
        m
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut m = *self;
        for (a, b) in m.0.iter_mut().zip(other.0.iter()) {
            *a |= *b;
        }
        m
    }

    /// Image latched into the shift register when driving `a` and `b` together. With inverting
    /// opto-isolators every bit arrives flipped, so the complement of the union is written.
    pub fn drive_image(a: &Self, b: &Self, inverted: bool) -> Self {
        let m = a.union(b);
        if inverted {
            m.inverted()
        } else {
            m
        }
    }
}
