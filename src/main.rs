// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

#![no_main]
#![no_std]

use core::cell::RefCell;

use cortex_m_rt::entry;
use critical_section::Mutex;
#[cfg(not(feature = "defmt"))]
use panic_halt as _;
use static_cell::StaticCell;
#[cfg(feature = "defmt")]
use {defmt_rtt as _, panic_probe as _};

use hal::{
    gpio::{
        gpioc::{PC10, PC11, PC12},
        Alternate,
    },
    pac::{self, interrupt},
    prelude::*,
    serial::{Config, Serial},
    spi::{Mode, Phase, Polarity, Spi},
};
use stm32f7xx_hal as hal;

use purpledrop::{
    drivers::Hv507,
    electrodes::{self, ElectrodeDrive, Shared},
    events::Event,
    hw::{Adc, BoardPins, CycleDelay, HvShiftBus, RawPin, SpiBus, Tim2Timing, Tim5Scheduler, Usart},
    queue::ResultQueue,
    AppConfig,
};

/// ADC1 channel of the integrator output (PA2).
const INT_VOUT_CHANNEL: u8 = 2;
/// Scan counts above which an electrode is reported as covered.
const COVERED_THRESHOLD: u16 = 500;

type Spi3Pins = (PC10<Alternate<6>>, PC11<Alternate<6>>, PC12<Alternate<6>>);
type Hv = Hv507<'static, HvShiftBus<Spi3Pins>, RawPin, Adc<pac::ADC1>, CycleDelay>;
type Drive = ElectrodeDrive<'static, Hv, Tim5Scheduler, Tim2Timing>;

static CONFIG: AppConfig = AppConfig::new();
static SHARED: Shared = Shared::new();
static QUEUE: StaticCell<ResultQueue> = StaticCell::new();

/// Hands the drive to the TIM5 handler, which takes it on first entry.
static DRIVE: Mutex<RefCell<Option<Drive>>> = Mutex::new(RefCell::new(None));

#[entry]
fn main() -> ! {
    // Peripherals
    let dp = pac::Peripherals::take().unwrap();

    // Clocks
    let rcc = dp.RCC.constrain();
    let clocks = rcc.cfgr.sysclk(216.MHz()).freeze();
    let mut apb1 = rcc.apb1;

    CONFIG.load_defaults();

    let pins = BoardPins::new(dp.GPIOA, dp.GPIOB, dp.GPIOC);
    let _int_vout = pins.int_vout;

    // USART1 (DBG)
    let usart_cfg = Config {
        baud_rate: 115_200.bps(),
        ..Default::default()
    };
    let serial = Serial::new(dp.USART1, (pins.usart1.tx, pins.usart1.rx), &clocks, usart_cfg);
    let mut usart = Usart::new(serial);
    usart.println("purpledrop");

    // SPI3 -> HV507 data chain
    let spi_mode = Mode {
        polarity: Polarity::IdleLow,
        phase: Phase::CaptureOnFirstTransition,
    };
    let spi3 = Spi::new(dp.SPI3, (pins.spi3.sck, pins.spi3.miso, pins.spi3.mosi))
        .enable::<u8>(spi_mode, 6.MHz(), &clocks, &mut apb1);
    let bus = HvShiftBus::new(SpiBus::new(spi3));

    let hv = Hv507::new(
        bus,
        pins.hv507,
        Adc::adc1(dp.ADC1),
        INT_VOUT_CHANNEL,
        CycleDelay::new(clocks.sysclk().raw()),
        &CONFIG,
    );

    let timclk = clocks.timclk1().raw();
    let queue = QUEUE.init(ResultQueue::new());
    let (mut drive, mut control) = electrodes::engine(
        hv,
        Tim5Scheduler::new(dp.TIM5, timclk),
        Tim2Timing::new(dp.TIM2, timclk),
        &CONFIG,
        &SHARED,
        queue,
    );

    // Calibrates and arms TIM5; the handler cannot run before the hand-off
    critical_section::with(|cs| {
        drive.start();
        DRIVE.borrow_ref_mut(cs).replace(drive);
    });

    loop {
        control.poll(&mut |event: Event<'_>| {
            if let Event::CapScan(scan) = event {
                usart.print_scan_summary(scan.measurements, COVERED_THRESHOLD);
            }
        });

        cortex_m::asm::wfi();
    }
}

#[interrupt]
fn TIM5() {
    static mut DRIVE_LOCAL: Option<Drive> = None;

    if DRIVE_LOCAL.is_none() {
        *DRIVE_LOCAL = critical_section::with(|cs| DRIVE.borrow_ref_mut(cs).take());
    }
    if let Some(drive) = DRIVE_LOCAL {
        drive.on_timer();
    }
}
