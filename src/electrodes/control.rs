// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Main-loop half of the electrode engine.
//!
//! [`ElectrodeControl`] applies host commands to the shared state and turns result tags queued by
//! the drive interrupt into [`Event`]s. Nothing here runs a sampling window or touches the HV507;
//! new masks take effect at the next drive pulse.

use crate::config::{AppConfig, N_CAP_GROUPS, N_PINS};
use crate::electrodes::shared::{CalibrateStep, Shared};
use crate::electrodes::PinMask;
use crate::error::Error;
use crate::events::{
    CapActive, CapGroups, CapScan, Command, DutyCycleUpdated, Event, Publisher, SetDutyCycle,
    SetElectrodes, SetGain, UpdateElectrodeCalibration,
};
use crate::fmt::{debug, info, warning};
use crate::queue::{ResultConsumer, ResultTag};

/// Group ids at or above this select a scan group.
const SCAN_GROUP_BASE: u8 = 100;

pub struct ElectrodeControl<'a> {
    config: &'a AppConfig,
    shared: &'a Shared,
    results: ResultConsumer<'a>,

    // Published by reference, so kept alive here
    groups: CapGroups,
    scan: [u16; N_PINS],
}

impl<'a> ElectrodeControl<'a> {
    pub fn new(config: &'a AppConfig, shared: &'a Shared, results: ResultConsumer<'a>) -> Self {
        Self {
            config,
            shared,
            results,
            groups: CapGroups {
                measurements: [0; N_CAP_GROUPS],
                scan_groups: Default::default(),
            },
            scan: [0; N_PINS],
        }
    }

    /// Apply one inbound command.
    ///
    /// Feedback commands belong to the feedback controller and are accepted without effect here.
    /// A rejected command leaves the engine untouched.
    pub fn handle_command<P: Publisher>(
        &mut self,
        command: &Command<'_>,
        publisher: &mut P,
    ) -> Result<(), Error> {
        let result = match command {
            Command::SetElectrodes(msg) => self.set_electrodes(msg),
            Command::SetGain(msg) => {
                self.set_gain(msg);
                Ok(())
            }
            Command::SetDutyCycle(msg) => {
                self.set_duty_cycle(msg, publisher);
                Ok(())
            }
            Command::RequestOffsetCalibration => {
                self.request_offset_calibration();
                Ok(())
            }
            Command::UpdateElectrodeCalibration(msg) => self.update_electrode_calibration(msg),
            Command::Feedback(_) => Ok(()),
        };
        result.inspect_err(|e| warning!("command rejected: {}", e))
    }

    pub fn set_electrodes(&mut self, msg: &SetElectrodes) -> Result<(), Error> {
        let mask = PinMask::from_host(&msg.values);

        if msg.group_id >= SCAN_GROUP_BASE {
            let group = (msg.group_id - SCAN_GROUP_BASE) as usize;
            if group >= N_CAP_GROUPS {
                return Err(Error::InvalidScanGroup(group as u8));
            }
            let low_gain = msg.setting & 1 != 0;
            let calibration = self.shared.with(|d| d.calibration);
            let offset = mask.iter_set().fold(0u16, |acc, pin| {
                acc.saturating_add(calibration.electrode_offset(pin, low_gain, self.config))
            });
            self.shared.with(|d| {
                d.group_offsets[group] = offset;
                d.scan_groups.set(group, msg.setting, mask)
            })?;
            debug!("scan group {} set, offset {}", group, offset);
            return Ok(());
        }

        match msg.group_id {
            0 => {
                let low_gain = self.config.active_cap_low_gain();
                let calibration = self.shared.with(|d| d.calibration);
                let offset = mask.iter_set().fold(0u16, |acc, pin| {
                    acc.saturating_add(calibration.electrode_offset(pin, low_gain, self.config))
                });
                self.shared.with(|d| {
                    d.shift_reg_a = mask;
                    d.active_offset = offset;
                });
                self.shared.set_duty_a(msg.setting);
            }
            1 => {
                self.shared.with(|d| d.shift_reg_b = mask);
                self.shared.set_duty_b(msg.setting);
            }
            id => return Err(Error::InvalidGroupId(id)),
        }
        self.shared.mark_dirty();
        Ok(())
    }

    /// Select low gain for every channel whose gain code is 1 during a full scan.
    pub fn set_gain(&mut self, msg: &SetGain) {
        let mut flags = PinMask::new();
        for pin in 0..N_PINS {
            flags.set(pin, msg.channel(pin) == 1);
        }
        self.shared.with(|d| d.low_gain_flags = flags);
    }

    pub fn set_duty_cycle<P: Publisher>(&mut self, msg: &SetDutyCycle, publisher: &mut P) {
        if msg.update_a {
            self.shared.set_duty_a(msg.duty_cycle_a);
        }
        if msg.update_b {
            self.shared.set_duty_b(msg.duty_cycle_b);
        }
        let (duty_cycle_a, duty_cycle_b) = self.shared.duty_cycles();
        publisher.publish(Event::DutyCycleUpdated(DutyCycleUpdated {
            duty_cycle_a,
            duty_cycle_b,
        }));
    }

    /// Ask the drive interrupt to re-measure the no-load offsets.
    pub fn request_offset_calibration(&mut self) {
        info!("offset calibration requested");
        self.shared.set_calibrate_step(CalibrateStep::Requested);
    }

    pub fn update_electrode_calibration(
        &mut self,
        msg: &UpdateElectrodeCalibration<'_>,
    ) -> Result<(), Error> {
        self.shared.with(|d| d.calibration.write(msg.offset, msg.data))
    }

    /// Calibrated offset of one electrode, scaled to the present HV target.
    pub fn electrode_offset(&self, pin: usize, low_gain: bool) -> u16 {
        self.shared
            .with(|d| d.calibration)
            .electrode_offset(pin, low_gain, self.config)
    }

    #[inline]
    pub fn duty_cycles(&self) -> (u8, u8) {
        self.shared.duty_cycles()
    }

    /// Publish every queued result, oldest first.
    pub fn poll<P: Publisher>(&mut self, publisher: &mut P) {
        while let Some(tag) = self.results.pop() {
            match tag {
                ResultTag::ActiveCapReady => {
                    let low_gain = self.config.active_cap_low_gain();
                    let (sample, offsets, active_offset) =
                        self.shared.with(|d| (d.active_sample, d.offsets, d.active_offset));
                    let baseline = sample
                        .sample0
                        .wrapping_add(offsets.for_gain(low_gain))
                        .wrapping_add(active_offset);
                    publisher.publish(Event::CapActive(CapActive {
                        baseline,
                        measurement: sample.sample1,
                        settings: low_gain as u8,
                    }));
                }
                ResultTag::GroupCapReady => {
                    self.groups = self.shared.with(|d| CapGroups {
                        measurements: d.group_data,
                        scan_groups: d.scan_groups,
                    });
                    publisher.publish(Event::CapGroups(&self.groups));
                }
                ResultTag::ScanCapReady => {
                    self.scan = self.shared.with(|d| d.scan_data);
                    publisher.publish(Event::CapScan(CapScan {
                        measurements: &self.scan,
                    }));
                }
                ResultTag::ElectrodesAckReady => publisher.publish(Event::ElectrodesUpdated),
            }
        }
    }
}
