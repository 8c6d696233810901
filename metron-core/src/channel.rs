//! Channel registry
//!
//! Tracks which logical input channels are enabled and their per-channel
//! configuration. Enabled channels live in an arena of fixed-capacity
//! slots indexed by [`ChannelId`]; a separate list records enable order,
//! which is the one and only source of scan order.

use heapless::Vec;
use metron_hal::{ChannelConfig, ChannelId, MAX_CHANNELS, MAX_INPUTS};

use crate::error::Error;
use crate::limits::LimitWatcher;

/// State owned by one enabled channel.
#[derive(Debug, Clone, Copy)]
pub struct ChannelSlot {
    config: ChannelConfig,
    limits: LimitWatcher,
}

impl ChannelSlot {
    fn new(config: ChannelConfig) -> Self {
        Self {
            config,
            limits: LimitWatcher::disarmed(),
        }
    }

    /// The channel's analog front-end configuration.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// The channel's threshold watcher.
    pub fn limits(&self) -> &LimitWatcher {
        &self.limits
    }

    /// Mutable access to the channel's threshold watcher.
    pub fn limits_mut(&mut self) -> &mut LimitWatcher {
        &mut self.limits
    }
}

/// Registry of enabled channels.
///
/// Invariants: a channel appears at most once; the scan list preserves
/// enable order; a slot exists exactly while its channel is in the scan
/// list.
#[derive(Debug)]
pub struct Registry {
    slots: [Option<ChannelSlot>; MAX_INPUTS],
    scan: Vec<ChannelId, MAX_CHANNELS>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            slots: [None; MAX_INPUTS],
            scan: Vec::new(),
        }
    }

    /// Enable a channel, appending it to the scan order.
    ///
    /// Enabling an already-enabled channel is a caller error, not a no-op.
    pub fn enable(&mut self, id: ChannelId, config: ChannelConfig) -> Result<(), Error> {
        if self.slots[id.index()].is_some() {
            return Err(Error::AlreadyEnabled);
        }
        self.scan.push(id).map_err(|_| Error::NoCapacity)?;
        self.slots[id.index()] = Some(ChannelSlot::new(config));
        Ok(())
    }

    /// Disable a channel, preserving the relative order of the rest.
    ///
    /// Leaves the registry untouched on error.
    pub fn disable(&mut self, id: ChannelId) -> Result<(), Error> {
        if self.slots[id.index()].is_none() {
            return Err(Error::NotEnabled);
        }
        if let Some(pos) = self.scan.iter().position(|&c| c == id) {
            self.scan.remove(pos);
        }
        self.slots[id.index()] = None;
        Ok(())
    }

    /// Whether a channel is currently enabled.
    pub fn is_enabled(&self, id: ChannelId) -> bool {
        self.slots[id.index()].is_some()
    }

    /// Shared access to an enabled channel's slot.
    pub fn get(&self, id: ChannelId) -> Option<&ChannelSlot> {
        self.slots[id.index()].as_ref()
    }

    /// Mutable access to an enabled channel's slot.
    pub fn get_mut(&mut self, id: ChannelId) -> Option<&mut ChannelSlot> {
        self.slots[id.index()].as_mut()
    }

    /// Enabled channels in enable order. Restartable and finite.
    pub fn scan_order(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.scan.iter().copied()
    }

    /// Number of enabled channels.
    pub fn len(&self) -> usize {
        self.scan.len()
    }

    /// Whether no channel is enabled.
    pub fn is_empty(&self) -> bool {
        self.scan.is_empty()
    }

    /// Disable everything.
    pub fn clear(&mut self) {
        self.slots = [None; MAX_INPUTS];
        self.scan.clear();
    }
}
