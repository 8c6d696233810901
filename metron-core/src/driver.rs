//! Acquisition engine
//!
//! Ties the registry, scheduler, buffer manager, comparator, and event
//! queue together behind one explicit driver value. Every operation is
//! gated by the driver state machine; the single invariant everything
//! else leans on is that at most one acquisition session exists at a
//! time.
//!
//! The engine is an explicit context value, not a global: one peripheral
//! instance, one [`Adc`]. The foreground and the interrupt handler share
//! it exclusively - [`Adc::on_interrupt`] is a plain `&mut self` method
//! called from the IRQ handler. On targets where interrupts preempt the
//! foreground, wrap the engine in a critical-section mutex; the engine
//! itself takes no locks because the protocol already forbids concurrent
//! requests.

use heapless::{Deque, Vec};
use metron_hal::{AdcPeripheral, ChannelConfig, ChannelId, EventFlag, MAX_CHANNELS};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::buffer::{BufferManager, Completion};
use crate::channel::Registry;
use crate::error::Error;
use crate::events::{Event, EventQueue, EVENT_QUEUE_DEPTH};
use crate::scheduler::{ScanCursor, ScanStrategy, SoftwareScan};

/// Driver states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverState {
    /// Hardware not calibrated, interrupt not registered
    Uninitialized,
    /// Ready to accept a conversion request
    Idle,
    /// An acquisition session is in flight
    Busy,
}

/// What happens to a sample still latched in hardware when a session is
/// aborted mid-conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AbortPolicy {
    /// Drop the latched value
    Discard,
    /// Append the latched value to the partial buffer before handing it
    /// back
    DeliverPartial,
}

/// Whether a buffered request stops after one pass over the channel set
/// or keeps converting until its buffer chain runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CaptureMode {
    /// One pass over the channel set, then done
    SinglePass,
    /// Fill the buffer (and any queued successor) completely
    Continuous,
}

/// Which channels a buffered request samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelSelect {
    /// All enabled channels, in enable order
    All,
    /// One enabled channel, repeatedly
    One(ChannelId),
}

/// Engine-wide configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AdcConfig {
    /// Fate of a latched sample on abort
    pub abort_policy: AbortPolicy,
    /// Flag polls allowed before a blocking conversion times out
    pub sample_poll_budget: u32,
    /// Flag polls allowed for the stop acknowledgment during abort
    pub stop_poll_budget: u32,
    /// Flag polls allowed for offset calibration at init
    pub calibration_poll_budget: u32,
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            abort_policy: AbortPolicy::Discard,
            sample_poll_budget: 1_000_000,
            stop_poll_budget: 100_000,
            calibration_poll_budget: 1_000_000,
        }
    }
}

/// Counters for conditions that are recorded rather than returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Stats {
    /// Hardware latch overruns observed
    pub overflows: u32,
    /// Events lost to queue saturation
    pub dropped_events: u32,
}

/// The in-flight acquisition session. At most one exists, and only while
/// the driver is `Busy`.
enum Session<'buf> {
    Single {
        channel: ChannelId,
    },
    Buffered {
        cursor: ScanCursor,
        buffers: BufferManager<'buf>,
        single_pass: bool,
    },
}

/// Multi-channel buffered acquisition engine over an opaque peripheral.
///
/// `'buf` is the lifetime of the caller-supplied destination buffers; a
/// long-lived driver typically uses `'static` buffers. `S` selects the
/// scan strategy the conversion scheduler drives the hardware with.
pub struct Adc<'buf, P: AdcPeripheral, S: ScanStrategy = SoftwareScan> {
    periph: P,
    strategy: S,
    config: AdcConfig,
    state: DriverState,
    registry: Registry,
    session: Option<Session<'buf>>,
    events: EventQueue<'buf>,
    overflows: u32,
}

impl<'buf, P: AdcPeripheral, S: ScanStrategy> Adc<'buf, P, S> {
    /// Create an engine in the `Uninitialized` state.
    pub fn new(periph: P, strategy: S, config: AdcConfig) -> Self {
        Self {
            periph,
            strategy,
            config,
            state: DriverState::Uninitialized,
            registry: Registry::new(),
            session: None,
            events: EventQueue::new(),
            overflows: 0,
        }
    }

    /// Calibrate the converter and register for its interrupt.
    ///
    /// On calibration timeout the driver stays `Uninitialized`.
    pub fn init(&mut self) -> Result<(), Error> {
        if self.state != DriverState::Uninitialized {
            return Err(Error::AlreadyInitialized);
        }
        self.periph.begin_calibration();
        self.wait_flag(EventFlag::CalibrationDone, self.config.calibration_poll_budget)?;
        self.periph.clear_event(EventFlag::CalibrationDone);
        self.periph.enable_interrupt(EventFlag::SampleReady);
        self.state = DriverState::Idle;
        Ok(())
    }

    /// Tear the engine down from any state.
    ///
    /// Implicitly aborts an in-flight session, disables every channel,
    /// and releases the interrupt. Teardown always completes; the result
    /// reports whether the implicit abort got a clean hardware stop.
    pub fn deinit(&mut self) -> Result<(), Error> {
        if self.state == DriverState::Uninitialized {
            return Ok(());
        }
        let aborted = if self.state == DriverState::Busy {
            self.abort()
        } else {
            Ok(())
        };
        let ids: Vec<ChannelId, MAX_CHANNELS> = self.registry.scan_order().collect();
        for id in ids {
            self.periph.deconfigure_channel(id);
        }
        self.registry.clear();
        self.periph.disable_interrupt(EventFlag::SampleReady);
        self.state = DriverState::Uninitialized;
        aborted
    }

    /// Deinitialize and hand the peripheral back.
    pub fn release(mut self) -> P {
        let _ = self.deinit();
        let Self { periph, .. } = self;
        periph
    }

    /// Current driver state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Whether an acquisition session is in flight.
    pub fn is_busy(&self) -> bool {
        self.state == DriverState::Busy
    }

    /// Recorded-but-not-thrown condition counters.
    pub fn stats(&self) -> Stats {
        Stats {
            overflows: self.overflows,
            dropped_events: self.events.dropped(),
        }
    }

    /// Shared access to the underlying peripheral.
    pub fn peripheral(&self) -> &P {
        &self.periph
    }

    /// Mutable access to the underlying peripheral.
    pub fn peripheral_mut(&mut self) -> &mut P {
        &mut self.periph
    }

    /// Enable a channel and program its front-end configuration.
    pub fn enable_channel(&mut self, id: ChannelId, config: ChannelConfig) -> Result<(), Error> {
        if self.state != DriverState::Idle {
            return Err(Error::InvalidState);
        }
        self.registry.enable(id, config)?;
        self.periph.configure_channel(id, &config);
        Ok(())
    }

    /// Disable a channel, removing it from the scan order.
    ///
    /// Rejected while a session is in flight: the scan set must not
    /// change under a live session. Abort first.
    pub fn disable_channel(&mut self, id: ChannelId) -> Result<(), Error> {
        if self.state != DriverState::Idle {
            return Err(Error::InvalidState);
        }
        self.registry.disable(id)?;
        self.periph.deconfigure_channel(id);
        Ok(())
    }

    /// Install a limit window on an enabled channel.
    ///
    /// Thresholds are raw conversion values; `None` disables a bound.
    /// Allowed while `Busy` - the comparator is independent of the
    /// session lifecycle.
    pub fn set_limits(
        &mut self,
        id: ChannelId,
        low: Option<i16>,
        high: Option<i16>,
    ) -> Result<(), Error> {
        if self.state == DriverState::Uninitialized {
            return Err(Error::InvalidState);
        }
        let slot = self.registry.get_mut(id).ok_or(Error::NotEnabled)?;
        if let (Some(l), Some(h)) = (low, high) {
            if l > h {
                return Err(Error::InvalidParameter);
            }
        }
        let max = slot.config().resolution.max_raw() as i32;
        for bound in [low, high].into_iter().flatten() {
            if (bound as i32).abs() > max {
                return Err(Error::InvalidParameter);
            }
        }
        slot.limits_mut().set(low, high);
        Ok(())
    }

    /// Remove both limit bounds from an enabled channel.
    pub fn clear_limits(&mut self, id: ChannelId) -> Result<(), Error> {
        if self.state == DriverState::Uninitialized {
            return Err(Error::InvalidState);
        }
        let slot = self.registry.get_mut(id).ok_or(Error::NotEnabled)?;
        slot.limits_mut().clear();
        Ok(())
    }

    /// Blocking single conversion of one enabled channel.
    ///
    /// Runs entirely in the calling context; on targets with a live ADC
    /// interrupt, call it with the engine's critical section held so the
    /// handler cannot consume the completion flag first.
    pub fn sample_single(&mut self, id: ChannelId) -> Result<i16, Error> {
        match self.state {
            DriverState::Uninitialized => return Err(Error::InvalidState),
            DriverState::Busy => return Err(Error::Busy),
            DriverState::Idle => {}
        }
        if !self.registry.is_enabled(id) {
            return Err(Error::NotEnabled);
        }
        self.state = DriverState::Busy;
        self.clear_run_flags();
        self.periph.select_channel(id);
        self.periph.trigger_start();
        self.periph.trigger_sample();
        let waited = self.wait_flag(EventFlag::SampleReady, self.config.sample_poll_budget);
        let value = waited.map(|()| {
            let v = self.periph.read_latched_value();
            self.periph.clear_event(EventFlag::SampleReady);
            v
        });
        self.periph.trigger_stop();
        self.state = DriverState::Idle;
        let value = value?;
        self.observe_limits(id, value);
        Ok(value)
    }

    /// Blocking single conversion scaled to the full 16-bit range.
    pub fn read_normalized(&mut self, id: ChannelId) -> Result<u16, Error> {
        let resolution = self
            .registry
            .get(id)
            .ok_or(Error::NotEnabled)?
            .config()
            .resolution;
        let raw = self.sample_single(id)?;
        Ok(resolution.normalize(raw))
    }

    /// Event-driven single conversion: completion arrives as a
    /// [`Event::Sample`] on the queue.
    pub fn start_single(&mut self, id: ChannelId) -> Result<(), Error> {
        match self.state {
            DriverState::Uninitialized => return Err(Error::InvalidState),
            DriverState::Busy => return Err(Error::Busy),
            DriverState::Idle => {}
        }
        if !self.registry.is_enabled(id) {
            return Err(Error::NotEnabled);
        }
        self.clear_run_flags();
        self.session = Some(Session::Single { channel: id });
        self.state = DriverState::Busy;
        self.periph.select_channel(id);
        self.periph.trigger_start();
        self.periph.trigger_sample();
        Ok(())
    }

    /// Start an event-driven buffered capture into `buffer`.
    ///
    /// Samples land in scheduler visitation order. Completion arrives as
    /// [`Event::Done`]; in `Continuous` mode the session keeps running
    /// past a completed buffer if a secondary was queued in time.
    pub fn start_buffered(
        &mut self,
        buffer: &'buf mut [i16],
        select: ChannelSelect,
        mode: CaptureMode,
    ) -> Result<(), Error> {
        match self.state {
            DriverState::Uninitialized => return Err(Error::InvalidState),
            DriverState::Busy => return Err(Error::Busy),
            DriverState::Idle => {}
        }
        if buffer.is_empty() {
            return Err(Error::InvalidParameter);
        }
        let order: Vec<ChannelId, MAX_CHANNELS> = match select {
            ChannelSelect::All => self.registry.scan_order().collect(),
            ChannelSelect::One(id) => {
                if !self.registry.is_enabled(id) {
                    return Err(Error::NotEnabled);
                }
                let mut one = Vec::new();
                let _ = one.push(id);
                one
            }
        };
        let single_pass = mode == CaptureMode::SinglePass;
        if single_pass && buffer.len() < order.len() {
            return Err(Error::InvalidParameter);
        }
        let cursor = ScanCursor::new(order).ok_or(Error::InvalidParameter)?;
        let first = cursor.current();
        self.session = Some(Session::Buffered {
            cursor,
            buffers: BufferManager::new(buffer),
            single_pass,
        });
        self.state = DriverState::Busy;
        self.clear_run_flags();
        self.strategy.begin(&mut self.periph, first);
        Ok(())
    }

    /// Buffered capture that suspends the caller until completion.
    ///
    /// Drives the same session machinery as the event-driven path by
    /// polling the completion flag. On timeout the session is aborted and
    /// the partial buffer is retrievable via [`Adc::poll_event`].
    pub fn capture_blocking(
        &mut self,
        buffer: &'buf mut [i16],
        select: ChannelSelect,
        mode: CaptureMode,
    ) -> Result<Completion<'buf>, Error> {
        self.start_buffered(buffer, select, mode)?;
        let mut polls: u32 = 0;
        while self.is_busy() {
            if self.periph.event_pending(EventFlag::SampleReady) {
                self.on_interrupt();
                polls = 0;
            } else {
                polls += 1;
                if polls >= self.config.sample_poll_budget {
                    let _ = self.abort();
                    return Err(Error::Timeout);
                }
            }
        }
        self.take_done().ok_or(Error::InvalidState)
    }

    /// Queue the buffer that continues the running capture once the
    /// current one fills.
    pub fn queue_next_buffer(&mut self, buffer: &'buf mut [i16]) -> Result<(), Error> {
        if buffer.is_empty() {
            return Err(Error::InvalidParameter);
        }
        match self.session.as_mut() {
            Some(Session::Buffered {
                buffers,
                single_pass,
                ..
            }) => {
                if *single_pass {
                    // A single-pass session ends at the pass boundary; a
                    // successor could never start filling.
                    return Err(Error::InvalidState);
                }
                buffers.queue_secondary(buffer)
            }
            _ => Err(Error::InvalidState),
        }
    }

    /// Remove and return the oldest pending event.
    pub fn poll_event(&mut self) -> Option<Event<'buf>> {
        self.events.pop()
    }

    /// Stop the in-flight session and force the driver back to `Idle`.
    ///
    /// Synchronous: waits (bounded) for the hardware stop acknowledgment.
    /// The partially-filled primary always comes back as a final
    /// [`Event::Done`] with `count` = samples written; a queued secondary
    /// follows untouched with `count == 0`. The configured
    /// [`AbortPolicy`] decides whether a sample still latched in hardware
    /// is appended first or dropped.
    ///
    /// On a stop-acknowledgment timeout the driver is forced `Idle`
    /// anyway and `Timeout` is returned; hardware state should be
    /// considered degraded until re-initialization.
    pub fn abort(&mut self) -> Result<(), Error> {
        match self.state {
            DriverState::Uninitialized => return Err(Error::InvalidState),
            DriverState::Idle => return Ok(()),
            DriverState::Busy => {}
        }
        self.periph.trigger_stop();
        let stopped = self.wait_flag(EventFlag::Stopped, self.config.stop_poll_budget);
        if stopped.is_ok() {
            self.periph.clear_event(EventFlag::Stopped);
        }
        let latched = if self.periph.event_pending(EventFlag::SampleReady) {
            let v = self.periph.read_latched_value();
            self.periph.clear_event(EventFlag::SampleReady);
            Some(v)
        } else {
            None
        };
        if let Some(Session::Buffered { mut buffers, .. }) = self.session.take() {
            if let Some(value) = latched {
                if self.config.abort_policy == AbortPolicy::DeliverPartial && !buffers.is_full() {
                    buffers.push(value);
                }
            }
            let (done, leftover) = buffers.dissolve();
            self.events.push(Event::Done {
                buffer: done.buffer,
                count: done.count,
                overflowed: done.overflowed,
            });
            if let Some(secondary) = leftover {
                self.events.push(Event::Done {
                    buffer: secondary,
                    count: 0,
                    overflowed: false,
                });
            }
        }
        self.state = DriverState::Idle;
        stopped
    }

    /// Interrupt-side engine advancement. Call from the peripheral's IRQ
    /// handler (or poll it, in blocking paths).
    ///
    /// Reads the latched result, feeds the comparator and the session,
    /// and drives the scheduler to the next conversion. Spurious
    /// interrupts are ignored.
    pub fn on_interrupt(&mut self) {
        if !self.periph.event_pending(EventFlag::SampleReady) {
            return;
        }
        let value = self.periph.read_latched_value();
        self.periph.clear_event(EventFlag::SampleReady);
        if self.periph.event_pending(EventFlag::Overflow) {
            self.periph.clear_event(EventFlag::Overflow);
            self.overflows = self.overflows.saturating_add(1);
            if let Some(Session::Buffered { buffers, .. }) = self.session.as_mut() {
                buffers.note_overflow();
            }
        }
        let Some(session) = self.session.take() else {
            // Stray completion with no session (e.g. raced an abort):
            // the latch was flushed above, nothing else to do.
            return;
        };
        match session {
            Session::Single { channel } => {
                self.observe_limits(channel, value);
                self.events.push(Event::Sample { value });
                self.periph.trigger_stop();
                self.state = DriverState::Idle;
            }
            Session::Buffered {
                mut cursor,
                mut buffers,
                single_pass,
            } => {
                let channel = cursor.current();
                self.observe_limits(channel, value);
                let filled = buffers.push(value);
                let (next, pass_complete) = cursor.advance();
                if single_pass && pass_complete {
                    let (done, leftover) = buffers.dissolve();
                    self.events.push(Event::Done {
                        buffer: done.buffer,
                        count: done.count,
                        overflowed: done.overflowed,
                    });
                    if let Some(secondary) = leftover {
                        self.events.push(Event::Done {
                            buffer: secondary,
                            count: 0,
                            overflowed: false,
                        });
                    }
                    self.periph.trigger_stop();
                    self.state = DriverState::Idle;
                } else if filled {
                    let (done, promoted) = buffers.rotate();
                    self.events.push(Event::Done {
                        buffer: done.buffer,
                        count: done.count,
                        overflowed: done.overflowed,
                    });
                    match promoted {
                        Some(buffers) => {
                            // Gapless handoff: the next trigger fires
                            // before the completed buffer is even drained.
                            self.session = Some(Session::Buffered {
                                cursor,
                                buffers,
                                single_pass,
                            });
                            self.strategy.advance(&mut self.periph, next, pass_complete);
                        }
                        None => {
                            self.periph.trigger_stop();
                            self.state = DriverState::Idle;
                        }
                    }
                } else {
                    self.session = Some(Session::Buffered {
                        cursor,
                        buffers,
                        single_pass,
                    });
                    self.strategy.advance(&mut self.periph, next, pass_complete);
                }
            }
        }
    }

    fn observe_limits(&mut self, channel: ChannelId, value: i16) {
        if let Some(slot) = self.registry.get_mut(channel) {
            if let Some(bound) = slot.limits_mut().observe(value) {
                self.events.push(Event::Limit { channel, bound });
            }
        }
    }

    fn wait_flag(&mut self, flag: EventFlag, budget: u32) -> Result<(), Error> {
        let mut polls: u32 = 0;
        while !self.periph.event_pending(flag) {
            polls += 1;
            if polls >= budget {
                return Err(Error::Timeout);
            }
        }
        Ok(())
    }

    fn clear_run_flags(&mut self) {
        self.periph.clear_event(EventFlag::SampleReady);
        self.periph.clear_event(EventFlag::Stopped);
        self.periph.clear_event(EventFlag::Overflow);
    }

    fn take_done(&mut self) -> Option<Completion<'buf>> {
        let mut kept: Deque<Event<'buf>, EVENT_QUEUE_DEPTH> = Deque::new();
        let mut done = None;
        while let Some(event) = self.events.pop() {
            match event {
                Event::Done {
                    buffer,
                    count,
                    overflowed,
                } if done.is_none() => {
                    done = Some(Completion {
                        buffer,
                        count,
                        overflowed,
                    });
                }
                other => {
                    let _ = kept.push_back(other);
                }
            }
        }
        while let Some(event) = kept.pop_front() {
            self.events.push(event);
        }
        done
    }
}
