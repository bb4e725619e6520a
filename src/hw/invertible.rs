// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Output pin with a run-time selectable active level.
//!
//! The HV507 control lines pass through opto-isolators. Some board variants use inverting parts,
//! so every line driven through an opto can be flipped at run time without reflashing.

use embedded_hal::digital::OutputPin;

/// Whether the line is driven active-high or active-low on the board wiring.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActiveLevel {
    High,
    Low,
}

/// Output that remembers its logical state and re-drives it when the active level changes.
pub struct InvertiblePin<PIN: OutputPin> {
    pin: PIN,
    active: ActiveLevel,
    is_set: bool,
}

impl<PIN: OutputPin> InvertiblePin<PIN> {
    /// Wrap a pin, initializing it to the logical low state.
    pub fn new(pin: PIN, active: ActiveLevel) -> Self {
        let mut p = Self {
            pin,
            active,
            is_set: false,
        };
        p.drive();
        p
    }

    pub fn active_high(pin: PIN) -> Self {
        Self::new(pin, ActiveLevel::High)
    }

    fn drive(&mut self) {
        match (self.active, self.is_set) {
            (ActiveLevel::High, true) | (ActiveLevel::Low, false) => self.pin.set_high().ok(),
            (ActiveLevel::High, false) | (ActiveLevel::Low, true) => self.pin.set_low().ok(),
        };
    }

    /// Drive the line logically high (true) or low (false).
    #[inline]
    pub fn set(&mut self, on: bool) {
        self.is_set = on;
        self.drive();
    }

    #[inline]
    pub fn set_high(&mut self) {
        self.set(true);
    }

    #[inline]
    pub fn set_low(&mut self) {
        self.set(false);
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.is_set
    }

    /// Select inverted wiring. The current logical state is re-applied if the level changed.
    pub fn set_inverted(&mut self, inverted: bool) {
        let active = if inverted {
            ActiveLevel::Low
        } else {
            ActiveLevel::High
        };
        if active != self.active {
            self.active = active;
            self.drive();
        }
    }

    #[inline]
    pub fn is_inverted(&self) -> bool {
        self.active == ActiveLevel::Low
    }

    pub fn free(self) -> PIN {
        self.pin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;

    struct Level(bool);

    impl ErrorType for Level {
        type Error = Infallible;
    }

    impl OutputPin for Level {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0 = false;
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0 = true;
            Ok(())
        }
    }

    #[test]
    fn inversion_redrives_current_state() {
        let mut p = InvertiblePin::active_high(Level(true));
        assert!(!p.pin.0);
        p.set_high();
        assert!(p.pin.0);
        p.set_inverted(true);
        assert!(p.is_set());
        assert!(!p.pin.0);
        p.set_low();
        assert!(p.pin.0);
        p.set_inverted(false);
        assert!(!p.free().0);
    }
}
