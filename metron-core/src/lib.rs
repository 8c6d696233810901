//! Board-agnostic buffered analog acquisition engine
//!
//! This crate contains the acquisition logic that does not depend on any
//! specific converter silicon:
//!
//! - Channel registry (enable-order scan set, per-channel configuration)
//! - Conversion scheduler (round-robin cursor + scan strategies)
//! - Buffer manager (primary/secondary double buffering, gapless handoff)
//! - Threshold comparator (edge-triggered limit events)
//! - Event queue (typed events drained by the foreground)
//! - Driver state machine tying it all together
//!
//! The engine drives any peripheral implementing
//! [`metron_hal::AdcPeripheral`]. Foreground calls and the interrupt
//! handler share one exclusive [`driver::Adc`] value; on targets where the
//! interrupt can preempt the foreground, wrap it in a critical-section
//! mutex. The hard invariant everything relies on is a single in-flight
//! acquisition session.

#![no_std]
#![deny(unsafe_code)]

// Unit tests build and run on the host, where the full standard library is
// available; link it in test configurations so `std`-qualified paths resolve.
#[cfg(test)]
extern crate std;

pub mod buffer;
pub mod channel;
pub mod driver;
pub mod error;
pub mod events;
pub mod limits;
pub mod scheduler;

// Re-export key types at crate root for convenience
pub use buffer::Completion;
pub use driver::{
    AbortPolicy, Adc, AdcConfig, CaptureMode, ChannelSelect, DriverState, Stats,
};
pub use error::Error;
pub use events::{Event, EVENT_QUEUE_DEPTH};
pub use limits::LimitBound;
pub use scheduler::{HardwareScan, ScanStrategy, SoftwareScan};

// The capability traits and configuration vocabulary live in metron-hal;
// re-exported so engine users need a single import.
pub use metron_hal::{
    AcquisitionTime, AdcPeripheral, ChannelConfig, ChannelId, EventFlag, Gain, Input, Reference,
    Resolution, MAX_CHANNELS, MAX_INPUTS,
};
