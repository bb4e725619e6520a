// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! HV507 high-voltage shift register pair with integrator front-end.
//!
//! This module provides the low-level electrode hardware operations: loading and latching the
//! shift register image, polarity and blanking control, gain selection and reading the integrator
//! output. The drive state machine in [`crate::electrodes`] only talks to hardware through
//! [`HvShim`], so it can run against a simulated board in tests.
//!
//! All operations are blocking and infallible. Faults on these lines are not detectable.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::config::{AppConfig, N_BYTES};
use crate::electrodes::PinMask;
use crate::hw::{AdcRead, InvertiblePin};

/// Delay around polarity changes, so the top plate augment FET never conducts together with the
/// HV507 polarity output.
const POLARITY_GUARD_NS: u32 = 50;
/// Minimum LE pulse width and SCK high time.
const PULSE_NS: u32 = 80;

/// Integrator sense resistor selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Gain {
    High,
    Low,
}

impl Gain {
    #[inline]
    pub fn from_low(low: bool) -> Self {
        if low {
            Gain::Low
        } else {
            Gain::High
        }
    }

    #[inline]
    pub fn is_low(self) -> bool {
        self == Gain::Low
    }
}

/// Hardware operations used by the electrode engine.
pub trait HvShim {
    /// Put every line in its idle state: integrator held in reset, outputs blanked.
    fn init(&mut self);
    fn set_polarity(&mut self, pol: bool);
    fn blank(&mut self);
    fn unblank(&mut self);
    fn enable_integrator(&mut self);
    fn reset_integrator(&mut self);
    fn set_gain(&mut self, gain: Gain);
    /// Shift a full mask into the chain. Outputs do not change until latched.
    fn load_shift_register(&mut self, mask: &PinMask);
    fn latch_shift_register(&mut self);
    fn set_scan_sync(&mut self);
    fn clear_scan_sync(&mut self);
    /// Route the integrator output to the ADC.
    fn setup_analog(&mut self);
    fn read_int_vout(&mut self) -> u16;

    /// Load a single set bit at the head of the chain and take manual control of the clock.
    fn begin_bit_walk(&mut self, inverted: bool);
    /// Advance the walking bit one position.
    fn clock_bit(&mut self);
    /// Return clock and data lines to the SPI peripheral.
    fn end_bit_walk(&mut self);

    /// Select inverted levels on every opto-isolated line, including the SPI clock polarity.
    fn apply_inversion(&mut self, inverted: bool);
    fn delay_ns(&mut self, ns: u32);
}

/// Byte-level access to the HV507 data chain, with a manual mode for bit walking.
///
/// Levels passed to `set_sck` and `set_mosi` are logical; the bus applies the inversion selected
/// with `set_inverted`.
pub trait ShiftBus {
    fn write(&mut self, bytes: &[u8]);
    /// Select CPOL = 1 and inverted GPIO levels.
    fn set_inverted(&mut self, inverted: bool);
    /// Hand SCK and MOSI to GPIO, both logically low.
    fn release(&mut self);
    fn set_sck(&mut self, high: bool);
    fn set_mosi(&mut self, high: bool);
    /// Give SCK and MOSI back to the SPI peripheral.
    fn reclaim(&mut self);
}

/// HV507 control lines and integrator front-end outputs.
pub struct Hv507Pins<P> {
    pub pol: P,
    pub bl: P,
    pub le: P,
    pub int_reset: P,
    pub gain_sel: P,
    pub scan_sync: P,
    pub augment: P,
}

/// Generic HV507 driver over `embedded-hal` pins and delay.
pub struct Hv507<'a, BUS, P, ADC, D>
where
    P: OutputPin,
{
    bus: BUS,
    // Opto-isolated lines
    pol: InvertiblePin<P>,
    bl: InvertiblePin<P>,
    le: InvertiblePin<P>,
    augment: InvertiblePin<P>,
    // Local lines
    int_reset: P,
    gain_sel: P,
    scan_sync: P,
    adc: ADC,
    int_vout_channel: u8,
    delay: D,
    config: &'a AppConfig,
}

impl<'a, BUS, P, ADC, D> Hv507<'a, BUS, P, ADC, D>
where
    BUS: ShiftBus,
    P: OutputPin,
    ADC: AdcRead,
    D: DelayNs,
{
    pub fn new(
        bus: BUS,
        pins: Hv507Pins<P>,
        adc: ADC,
        int_vout_channel: u8,
        delay: D,
        config: &'a AppConfig,
    ) -> Self {
        Self {
            bus,
            pol: InvertiblePin::active_high(pins.pol),
            bl: InvertiblePin::active_high(pins.bl),
            le: InvertiblePin::active_high(pins.le),
            augment: InvertiblePin::active_high(pins.augment),
            int_reset: pins.int_reset,
            gain_sel: pins.gain_sel,
            scan_sync: pins.scan_sync,
            adc,
            int_vout_channel,
            delay,
            config,
        }
    }

    #[inline]
    fn level(pin: &mut P, high: bool) {
        if high {
            pin.set_high().ok();
        } else {
            pin.set_low().ok();
        }
    }

    pub fn polarity(&self) -> bool {
        self.pol.is_set()
    }

    pub fn is_blanked(&self) -> bool {
        !self.bl.is_set()
    }
}

impl<'a, BUS, P, ADC, D> HvShim for Hv507<'a, BUS, P, ADC, D>
where
    BUS: ShiftBus,
    P: OutputPin,
    ADC: AdcRead,
    D: DelayNs,
{
    fn init(&mut self) {
        Self::level(&mut self.scan_sync, false);
        Self::level(&mut self.int_reset, true);
        Self::level(&mut self.gain_sel, false);
        self.augment.set_low();
        self.pol.set_low();
        self.bl.set_low();
        self.le.set_low();
    }

    fn set_polarity(&mut self, pol: bool) {
        if pol {
            self.pol.set_high();
            // Guard delay is unconditional so timing does not depend on the augment setting
            self.delay.delay_ns(POLARITY_GUARD_NS);
            if self.config.augment_top_plate_low_side() {
                self.augment.set_high();
            }
        } else {
            self.augment.set_low();
            self.delay.delay_ns(POLARITY_GUARD_NS);
            self.pol.set_low();
        }
    }

    #[inline]
    fn blank(&mut self) {
        self.bl.set_low();
    }

    #[inline]
    fn unblank(&mut self) {
        self.bl.set_high();
    }

    #[inline]
    fn enable_integrator(&mut self) {
        Self::level(&mut self.int_reset, false);
    }

    #[inline]
    fn reset_integrator(&mut self) {
        Self::level(&mut self.int_reset, true);
    }

    fn set_gain(&mut self, gain: Gain) {
        Self::level(&mut self.gain_sel, gain.is_low());
    }

    fn load_shift_register(&mut self, mask: &PinMask) {
        self.bus.write(mask.bytes());
    }

    fn latch_shift_register(&mut self) {
        self.le.set_high();
        self.delay.delay_ns(PULSE_NS);
        self.le.set_low();
    }

    #[inline]
    fn set_scan_sync(&mut self) {
        Self::level(&mut self.scan_sync, true);
    }

    #[inline]
    fn clear_scan_sync(&mut self) {
        Self::level(&mut self.scan_sync, false);
    }

    fn setup_analog(&mut self) {
        self.adc.select(self.int_vout_channel);
    }

    #[inline]
    fn read_int_vout(&mut self) -> u16 {
        self.adc.convert()
    }

    fn begin_bit_walk(&mut self, inverted: bool) {
        let (fill, head) = if inverted { (0xFF, 0xFE) } else { (0x00, 0x01) };
        for _ in 0..N_BYTES - 1 {
            self.bus.write(&[fill]);
        }
        self.bus.write(&[head]);

        self.bus.release();
        self.bus.set_mosi(false);
        self.bus.set_sck(false);
    }

    fn clock_bit(&mut self) {
        self.bus.set_sck(true);
        self.delay.delay_ns(PULSE_NS);
        self.bus.set_sck(false);
    }

    fn end_bit_walk(&mut self) {
        self.bus.reclaim();
    }

    fn apply_inversion(&mut self, inverted: bool) {
        self.bus.set_inverted(inverted);
        self.pol.set_inverted(inverted);
        self.bl.set_inverted(inverted);
        self.le.set_inverted(inverted);
        self.augment.set_inverted(inverted);
    }

    #[inline]
    fn delay_ns(&mut self, ns: u32) {
        self.delay.delay_ns(ns);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{id, OptionValue};
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::vec::Vec;

    #[derive(Clone, Debug, PartialEq)]
    enum Op {
        Pin(&'static str, bool),
        Delay(u32),
        Bytes(Vec<u8>),
        Inverted(bool),
        Release,
        Sck(bool),
        Mosi(bool),
        Reclaim,
        Select(u8),
    }

    type Log = Rc<RefCell<Vec<Op>>>;

    struct MockPin {
        name: &'static str,
        log: Log,
    }

    impl ErrorType for MockPin {
        type Error = Infallible;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.log.borrow_mut().push(Op::Pin(self.name, false));
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            self.log.borrow_mut().push(Op::Pin(self.name, true));
            Ok(())
        }
    }

    struct MockBus(Log);

    impl ShiftBus for MockBus {
        fn write(&mut self, bytes: &[u8]) {
            self.0.borrow_mut().push(Op::Bytes(bytes.to_vec()));
        }
        fn set_inverted(&mut self, inverted: bool) {
            self.0.borrow_mut().push(Op::Inverted(inverted));
        }
        fn release(&mut self) {
            self.0.borrow_mut().push(Op::Release);
        }
        fn set_sck(&mut self, high: bool) {
            self.0.borrow_mut().push(Op::Sck(high));
        }
        fn set_mosi(&mut self, high: bool) {
            self.0.borrow_mut().push(Op::Mosi(high));
        }
        fn reclaim(&mut self) {
            self.0.borrow_mut().push(Op::Reclaim);
        }
    }

    struct MockAdc(Log, u16);

    impl AdcRead for MockAdc {
        fn select(&mut self, ch: u8) {
            self.0.borrow_mut().push(Op::Select(ch));
        }
        fn convert(&mut self) -> u16 {
            self.1
        }
    }

    struct MockDelay(Log);

    impl DelayNs for MockDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.0.borrow_mut().push(Op::Delay(ns));
        }
    }

    fn driver(config: &AppConfig) -> (Hv507<'_, MockBus, MockPin, MockAdc, MockDelay>, Log) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let pin = |name| MockPin {
            name,
            log: log.clone(),
        };
        let pins = Hv507Pins {
            pol: pin("pol"),
            bl: pin("bl"),
            le: pin("le"),
            int_reset: pin("int_reset"),
            gain_sel: pin("gain_sel"),
            scan_sync: pin("scan_sync"),
            augment: pin("augment"),
        };
        let hv = Hv507::new(
            MockBus(log.clone()),
            pins,
            MockAdc(log.clone(), 1234),
            2,
            MockDelay(log.clone()),
            config,
        );
        log.borrow_mut().clear();
        (hv, log)
    }

    #[test]
    fn polarity_sequences_augment_fet() {
        let config = AppConfig::with_defaults();
        config.set_value(id::AUGMENT_TOP_PLATE_LOW_SIDE, OptionValue::Bool(true)).unwrap();
        let (mut hv, log) = driver(&config);

        hv.set_polarity(true);
        hv.set_polarity(false);
        assert_eq!(
            *log.borrow(),
            [
                Op::Pin("pol", true),
                Op::Delay(50),
                Op::Pin("augment", true),
                Op::Pin("augment", false),
                Op::Delay(50),
                Op::Pin("pol", false),
            ]
        );
    }

    #[test]
    fn polarity_without_augment_keeps_guard_delay() {
        let config = AppConfig::with_defaults();
        let (mut hv, log) = driver(&config);
        hv.set_polarity(true);
        assert_eq!(*log.borrow(), [Op::Pin("pol", true), Op::Delay(50)]);
        assert!(hv.polarity());
    }

    #[test]
    fn blank_is_active_low_and_follows_inversion() {
        let config = AppConfig::with_defaults();
        let (mut hv, log) = driver(&config);
        hv.blank();
        assert!(hv.is_blanked());
        hv.unblank();
        assert!(!hv.is_blanked());
        assert_eq!(*log.borrow(), [Op::Pin("bl", false), Op::Pin("bl", true)]);

        log.borrow_mut().clear();
        hv.apply_inversion(true);
        let ops = log.borrow().clone();
        assert_eq!(ops[0], Op::Inverted(true));
        // unblanked line is re-driven at the inverted level
        assert!(ops.contains(&Op::Pin("bl", false)));
        assert!(!hv.is_blanked());
    }

    #[test]
    fn latch_pulse_width() {
        let config = AppConfig::with_defaults();
        let (mut hv, log) = driver(&config);
        hv.latch_shift_register();
        assert_eq!(
            *log.borrow(),
            [Op::Pin("le", true), Op::Delay(80), Op::Pin("le", false)]
        );
    }

    #[test]
    fn bit_walk_loads_single_bit() {
        let config = AppConfig::with_defaults();
        let (mut hv, log) = driver(&config);
        hv.begin_bit_walk(false);
        {
            let ops = log.borrow();
            let bytes: Vec<u8> = ops
                .iter()
                .filter_map(|op| match op {
                    Op::Bytes(b) => Some(b[0]),
                    _ => None,
                })
                .collect();
            assert_eq!(bytes.len(), N_BYTES);
            assert!(bytes[..N_BYTES - 1].iter().all(|&b| b == 0x00));
            assert_eq!(bytes[N_BYTES - 1], 0x01);
            assert_eq!(ops[N_BYTES], Op::Release);
        }

        log.borrow_mut().clear();
        hv.clock_bit();
        hv.end_bit_walk();
        assert_eq!(
            *log.borrow(),
            [Op::Sck(true), Op::Delay(80), Op::Sck(false), Op::Reclaim]
        );

        log.borrow_mut().clear();
        hv.begin_bit_walk(true);
        let ops = log.borrow();
        assert_eq!(ops[0], Op::Bytes(vec![0xFF]));
        assert_eq!(ops[N_BYTES - 1], Op::Bytes(vec![0xFE]));
    }

    #[test]
    fn analog_reads_selected_channel() {
        let config = AppConfig::with_defaults();
        let (mut hv, log) = driver(&config);
        hv.setup_analog();
        assert_eq!(hv.read_int_vout(), 1234);
        hv.set_gain(Gain::Low);
        assert_eq!(
            *log.borrow(),
            [Op::Select(2), Op::Pin("gain_sel", true)]
        );
    }
}
