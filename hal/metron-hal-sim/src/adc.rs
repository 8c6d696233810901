//! Simulated ADC peripheral
//!
//! Models the `AdcPeripheral` contract with plain state: a conversion
//! queue stands in for the converter pipeline, a single latch plus flag
//! bits stand in for the result register, and counters record every
//! trigger so tests can assert how much hardware traffic a scan strategy
//! really produced.
//!
//! Pacing: a queued conversion only lands in the latch once the previous
//! result has been consumed (`SampleReady` cleared). That mirrors real
//! converters closely enough for the engine's scheduling, double-buffering
//! and abort logic to be exercised without a single register.

use heapless::{Deque, Vec};
use metron_hal::{
    AdcPeripheral, ChannelConfig, ChannelId, EventFlag, MAX_CHANNELS, MAX_INPUTS,
};

use crate::pattern::Pattern;

/// Conversions that can be queued behind the latch.
const PENDING_DEPTH: usize = 2 * MAX_CHANNELS;

/// How the simulated converter walks a scan set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanCapability {
    /// One conversion of the selected channel per sample trigger.
    SingleStep,
    /// One sample trigger converts the whole configured scan set, in
    /// configuration order.
    NativeScan,
}

/// In-memory ADC peripheral.
#[derive(Debug)]
pub struct SimAdc {
    capability: ScanCapability,
    configs: [Option<ChannelConfig>; MAX_INPUTS],
    patterns: [Pattern; MAX_INPUTS],
    scan_set: Vec<ChannelId, MAX_CHANNELS>,
    selected: Option<ChannelId>,
    running: bool,
    pending: Deque<ChannelId, PENDING_DEPTH>,
    latch: i16,
    // Flag bits
    ready: bool,
    stopped: bool,
    overflow: bool,
    calibration_done: bool,
    // Interrupt mask, indexed by flag
    irq: [bool; 4],
    // Trigger accounting
    start_count: u32,
    sample_count: u32,
    stop_count: u32,
    select_count: u32,
    calibrate_count: u32,
    // Fault injection
    hang_calibration: bool,
    ignore_stop: bool,
}

impl SimAdc {
    /// Create an idle simulated peripheral.
    pub fn new(capability: ScanCapability) -> Self {
        Self {
            capability,
            configs: [None; MAX_INPUTS],
            patterns: core::array::from_fn(|_| Pattern::default()),
            scan_set: Vec::new(),
            selected: None,
            running: false,
            pending: Deque::new(),
            latch: 0,
            ready: false,
            stopped: false,
            overflow: false,
            calibration_done: false,
            irq: [false; 4],
            start_count: 0,
            sample_count: 0,
            stop_count: 0,
            select_count: 0,
            calibrate_count: 0,
            hang_calibration: false,
            ignore_stop: false,
        }
    }

    /// Program the signal a channel produces.
    pub fn set_pattern(&mut self, id: ChannelId, pattern: Pattern) {
        self.patterns[id.index()] = pattern;
    }

    /// Raise the overflow flag, as if a conversion had completed while
    /// the latch was still occupied.
    pub fn inject_overflow(&mut self) {
        self.overflow = true;
    }

    /// When set, calibration never completes (exercises the init timeout).
    pub fn set_hang_calibration(&mut self, hang: bool) {
        self.hang_calibration = hang;
    }

    /// When set, stop triggers are never acknowledged (exercises the
    /// abort timeout).
    pub fn set_ignore_stop(&mut self, ignore: bool) {
        self.ignore_stop = ignore;
    }

    /// Whether the converter has been started and not stopped.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether a channel currently holds a configuration.
    pub fn is_configured(&self, id: ChannelId) -> bool {
        self.configs[id.index()].is_some()
    }

    /// Whether the interrupt for `flag` is unmasked.
    pub fn irq_enabled(&self, flag: EventFlag) -> bool {
        self.irq[Self::flag_index(flag)]
    }

    /// Start triggers issued so far.
    pub fn start_triggers(&self) -> u32 {
        self.start_count
    }

    /// Sample triggers issued so far.
    pub fn sample_triggers(&self) -> u32 {
        self.sample_count
    }

    /// Stop triggers issued so far.
    pub fn stop_triggers(&self) -> u32 {
        self.stop_count
    }

    /// Channel selections issued so far.
    pub fn selections(&self) -> u32 {
        self.select_count
    }

    /// Calibration runs requested so far.
    pub fn calibrations(&self) -> u32 {
        self.calibrate_count
    }

    const fn flag_index(flag: EventFlag) -> usize {
        match flag {
            EventFlag::SampleReady => 0,
            EventFlag::Stopped => 1,
            EventFlag::Overflow => 2,
            EventFlag::CalibrationDone => 3,
        }
    }

    /// Move the next queued conversion into the latch if it is free.
    fn pump(&mut self) {
        if self.ready {
            return;
        }
        if let Some(ch) = self.pending.pop_front() {
            self.latch = self.patterns[ch.index()].next_value();
            self.ready = true;
        }
    }
}

impl AdcPeripheral for SimAdc {
    fn configure_channel(&mut self, id: ChannelId, config: &ChannelConfig) {
        if self.configs[id.index()].is_none() {
            let _ = self.scan_set.push(id);
        }
        self.configs[id.index()] = Some(*config);
    }

    fn deconfigure_channel(&mut self, id: ChannelId) {
        self.configs[id.index()] = None;
        if let Some(pos) = self.scan_set.iter().position(|&c| c == id) {
            self.scan_set.remove(pos);
        }
    }

    fn select_channel(&mut self, id: ChannelId) {
        self.selected = Some(id);
        self.select_count += 1;
    }

    fn enable_interrupt(&mut self, flag: EventFlag) {
        self.irq[Self::flag_index(flag)] = true;
    }

    fn disable_interrupt(&mut self, flag: EventFlag) {
        self.irq[Self::flag_index(flag)] = false;
    }

    fn trigger_start(&mut self) {
        self.start_count += 1;
        self.running = true;
        self.stopped = false;
    }

    fn trigger_sample(&mut self) {
        self.sample_count += 1;
        if !self.running {
            return;
        }
        match self.capability {
            ScanCapability::SingleStep => {
                if let Some(sel) = self.selected {
                    let _ = self.pending.push_back(sel);
                }
            }
            ScanCapability::NativeScan => {
                // A trigger with the scan-start channel selected runs the
                // whole set; any other selection converts one-shot.
                let scan_start = self.scan_set.first().copied();
                if self.selected.is_some() && self.selected == scan_start {
                    for i in 0..self.scan_set.len() {
                        let _ = self.pending.push_back(self.scan_set[i]);
                    }
                } else if let Some(sel) = self.selected {
                    let _ = self.pending.push_back(sel);
                }
            }
        }
        self.pump();
    }

    fn trigger_stop(&mut self) {
        self.stop_count += 1;
        self.running = false;
        self.pending.clear();
        if !self.ignore_stop {
            self.stopped = true;
        }
    }

    fn read_latched_value(&self) -> i16 {
        self.latch
    }

    fn event_pending(&self, flag: EventFlag) -> bool {
        match flag {
            EventFlag::SampleReady => self.ready,
            EventFlag::Stopped => self.stopped,
            EventFlag::Overflow => self.overflow,
            EventFlag::CalibrationDone => self.calibration_done,
        }
    }

    fn clear_event(&mut self, flag: EventFlag) {
        match flag {
            EventFlag::SampleReady => {
                self.ready = false;
                // Consuming the latch lets the next conversion land.
                self.pump();
            }
            EventFlag::Stopped => self.stopped = false,
            EventFlag::Overflow => self.overflow = false,
            EventFlag::CalibrationDone => self.calibration_done = false,
        }
    }

    fn begin_calibration(&mut self) {
        self.calibrate_count += 1;
        if !self.hang_calibration {
            self.calibration_done = true;
        }
    }
}
