//! Channel configuration types
//!
//! Per-channel analog front-end settings shared between the engine, the
//! registry, and peripheral implementations, plus the integer-only scaling
//! helpers built on top of them.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Input selection for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Input {
    /// Single-ended conversion of one analog pin, measured against ground.
    Single(u8),
    /// Differential conversion of a pin pair.
    Differential {
        /// Positive input pin
        positive: u8,
        /// Negative input pin
        negative: u8,
    },
}

/// Gain applied to the input before conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Gain {
    /// 1/6 input attenuation
    Div6,
    /// 1/5 input attenuation
    Div5,
    /// 1/4 input attenuation
    Div4,
    /// 1/3 input attenuation
    Div3,
    /// 1/2 input attenuation
    Div2,
    /// Unity gain
    Unity,
    /// 2x amplification
    Mul2,
    /// 4x amplification
    Mul4,
}

impl Gain {
    /// Gain as a (numerator, denominator) ratio.
    pub const fn ratio(self) -> (i32, i32) {
        match self {
            Gain::Div6 => (1, 6),
            Gain::Div5 => (1, 5),
            Gain::Div4 => (1, 4),
            Gain::Div3 => (1, 3),
            Gain::Div2 => (1, 2),
            Gain::Unity => (1, 1),
            Gain::Mul2 => (2, 1),
            Gain::Mul4 => (4, 1),
        }
    }
}

/// Conversion reference voltage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Reference {
    /// Internal 0.6 V reference
    Internal,
    /// Supply voltage divided by 4 (0.825 V at a 3.3 V supply)
    VddDiv4,
}

impl Reference {
    /// Reference voltage in volts, as a (numerator, denominator) ratio.
    pub const fn volts_ratio(self) -> (i32, i32) {
        match self {
            Reference::Internal => (3, 5),
            Reference::VddDiv4 => (33, 40),
        }
    }
}

/// Conversion resolution in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Resolution {
    Eight,
    Ten,
    Twelve,
    Fourteen,
}

impl Resolution {
    /// Number of result bits.
    pub const fn bits(self) -> u32 {
        match self {
            Resolution::Eight => 8,
            Resolution::Ten => 10,
            Resolution::Twelve => 12,
            Resolution::Fourteen => 14,
        }
    }

    /// Largest raw value a single-ended conversion can produce.
    pub const fn max_raw(self) -> i16 {
        ((1u32 << self.bits()) - 1) as i16
    }

    /// Scale a raw single-ended result to the full 16-bit range.
    ///
    /// Uses bit replication, so `normalize(0) == 0`,
    /// `normalize(max_raw) == 0xFFFF`, and the mapping is monotonic.
    /// Negative (differential) raw values clamp to 0.
    pub const fn normalize(self, raw: i16) -> u16 {
        let max = self.max_raw();
        let v = if raw < 0 {
            0u16
        } else if raw > max {
            max as u16
        } else {
            raw as u16
        };
        let shift = 16 - self.bits();
        (v << shift) | (v >> (self.bits() - shift))
    }
}

/// Sampling time allowed for the input to settle before conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AcquisitionTime {
    Us3,
    Us5,
    Us10,
    Us15,
    Us20,
    Us40,
}

/// Complete analog front-end configuration for one channel.
///
/// See the `Default` impl for values suitable for reading a 3.3 V rail
/// signal single-ended at 12-bit resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelConfig {
    /// Input pin selection
    pub input: Input,
    /// Pre-conversion gain
    pub gain: Gain,
    /// Reference voltage
    pub reference: Reference,
    /// Result resolution
    pub resolution: Resolution,
    /// Input settling time
    pub acquisition_time: AcquisitionTime,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            input: Input::Single(0),
            gain: Gain::Div4,
            reference: Reference::VddDiv4,
            resolution: Resolution::Twelve,
            acquisition_time: AcquisitionTime::Us10,
        }
    }
}

impl ChannelConfig {
    /// Convert a raw conversion result to millivolts at the input pin.
    ///
    /// Integer-only: undoes the gain and reference scaling without touching
    /// floating point. Differential conversions use a signed range, so one
    /// sign bit is given up.
    pub fn to_millivolts(&self, raw: i16) -> i32 {
        let (gain_num, gain_den) = self.gain.ratio();
        let (ref_num, ref_den) = self.reference.volts_ratio();

        let full_scale = (self.resolution.max_raw() as i64) + 1;
        let lsbs = match self.input {
            Input::Single(_) => full_scale,
            Input::Differential { .. } => full_scale / 2,
        };

        // 64-bit intermediate: 14-bit raw * gain * reference * 1000
        // overflows 32 bits in the worst case.
        let uv = raw as i64 * gain_den as i64 * ref_num as i64 * 1000;
        (uv / gain_num as i64 / ref_den as i64 / lsbs) as i32
    }
}
