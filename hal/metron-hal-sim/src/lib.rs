//! Software-simulated ADC peripheral
//!
//! Implements the `metron-hal` capability traits entirely in memory so the
//! acquisition engine can be exercised on a host: programmable per-channel
//! signal patterns, a faithful conversion latch with ready/overflow flags,
//! trigger accounting for scheduler assertions, and fault-injection knobs
//! for the timeout paths.
//!
//! Not a model of any specific silicon - it implements exactly the
//! contract `metron_hal::AdcPeripheral` promises, which is the point:
//! engine behavior verified against the simulator holds for any compliant
//! peripheral.

#![no_std]
#![deny(unsafe_code)]

pub mod adc;
pub mod pattern;

pub use adc::{ScanCapability, SimAdc};
pub use pattern::Pattern;
