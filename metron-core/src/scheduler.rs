//! Conversion scheduling
//!
//! Decides which channel the converter samples next. The scan cursor
//! walks a snapshot of the enable-order scan set round-robin; the
//! [`ScanStrategy`] decides how many hardware triggers that walk costs.
//! Silicon that can only convert one channel per trigger gets the
//! software-emulated strategy; silicon that auto-advances through its scan
//! set gets the native one. Both produce the identical externally
//! observable sample order - the strategy only changes the trigger count.

use heapless::Vec;
use metron_hal::{AdcPeripheral, ChannelId, MAX_CHANNELS};

/// Round-robin position within one acquisition session.
///
/// Holds a snapshot of the scan order taken at session start; the live
/// registry cannot change mid-session, so the snapshot never goes stale.
#[derive(Debug)]
pub struct ScanCursor {
    order: Vec<ChannelId, MAX_CHANNELS>,
    pos: usize,
}

impl ScanCursor {
    /// Create a cursor over a non-empty scan order.
    pub fn new(order: Vec<ChannelId, MAX_CHANNELS>) -> Option<Self> {
        if order.is_empty() {
            return None;
        }
        Some(Self { order, pos: 0 })
    }

    /// The channel the next conversion result belongs to.
    pub fn current(&self) -> ChannelId {
        self.order[self.pos]
    }

    /// Number of channels in one pass.
    pub fn pass_len(&self) -> usize {
        self.order.len()
    }

    /// Step to the next channel.
    ///
    /// Returns the new current channel and whether the step wrapped back
    /// to the first channel, i.e. whether a pass just completed.
    pub fn advance(&mut self) -> (ChannelId, bool) {
        self.pos += 1;
        let wrapped = self.pos == self.order.len();
        if wrapped {
            self.pos = 0;
        }
        (self.order[self.pos], wrapped)
    }
}

/// How the scheduler's channel walk is driven into the hardware.
pub trait ScanStrategy {
    /// Program the first channel and fire the triggers that start the
    /// first conversion of a session.
    fn begin<P: AdcPeripheral>(&mut self, periph: &mut P, first: ChannelId);

    /// Prepare the conversion of `next` after a result was consumed.
    /// `pass_complete` is true when the cursor just wrapped.
    fn advance<P: AdcPeripheral>(&mut self, periph: &mut P, next: ChannelId, pass_complete: bool);
}

/// Software-emulated scanning for hardware that converts a single channel
/// per trigger: every conversion re-selects the active channel and costs
/// one sample trigger.
#[derive(Debug, Default)]
pub struct SoftwareScan;

impl ScanStrategy for SoftwareScan {
    fn begin<P: AdcPeripheral>(&mut self, periph: &mut P, first: ChannelId) {
        periph.select_channel(first);
        periph.trigger_start();
        periph.trigger_sample();
    }

    fn advance<P: AdcPeripheral>(&mut self, periph: &mut P, next: ChannelId, _pass_complete: bool) {
        periph.select_channel(next);
        periph.trigger_sample();
    }
}

/// Native scanning for hardware that walks its whole scan set on one
/// sample trigger: the trigger is issued once per pass and the hardware
/// advances the channel mux itself.
///
/// The hardware scan set is the full configured channel set, so this
/// strategy fits sessions over all enabled channels. A session restricted
/// to one channel of a larger set needs [`SoftwareScan`] - scan-set
/// silicon cannot skip channels without being reprogrammed.
#[derive(Debug, Default)]
pub struct HardwareScan;

impl ScanStrategy for HardwareScan {
    fn begin<P: AdcPeripheral>(&mut self, periph: &mut P, first: ChannelId) {
        periph.select_channel(first);
        periph.trigger_start();
        periph.trigger_sample();
    }

    fn advance<P: AdcPeripheral>(&mut self, periph: &mut P, _next: ChannelId, pass_complete: bool) {
        if pass_complete {
            periph.trigger_sample();
        }
    }
}
