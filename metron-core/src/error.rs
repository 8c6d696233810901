//! Engine error type

/// Errors returned by the acquisition engine.
///
/// All of these are configuration or sequencing errors reported
/// synchronously to the caller. Conditions detected in interrupt context
/// (sample overflow) are never surfaced here; they ride on the next
/// [`Done`](crate::events::Event::Done) event and the engine statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Operation attempted from the wrong driver state
    InvalidState,
    /// A conversion is already in flight; retry later or abort first
    Busy,
    /// Malformed request (empty buffer, too-short buffer, bad limit window)
    InvalidParameter,
    /// `init` called on an engine that is already initialized
    AlreadyInitialized,
    /// Channel is already part of the scan set
    AlreadyEnabled,
    /// Channel is not enabled
    NotEnabled,
    /// The scan set is full
    NoCapacity,
    /// A secondary buffer is already queued
    AlreadyQueued,
    /// A bounded hardware wait expired (blocking read, calibration, or the
    /// stop acknowledgment during abort)
    Timeout,
}
