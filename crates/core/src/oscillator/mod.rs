use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{trig::TrigTable, LaserError, Result};

/// Output rate of the projector in ticks per second.
pub const TICK_RATE_HZ: u32 = 40_000;

/// Largest coordinate either scanner axis accepts.
pub const MAX_COORDINATE: u16 = 4095;

/// Handle to a pool slot. The generation ties the handle to one specific
/// oscillator, so a handle to a retired oscillator never resolves to whatever
/// reuses its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotId {
    pub index: usize,
    pub generation: u64,
}

impl SlotId {
    pub fn new(index: usize, generation: u64) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Cosine,
}

impl Waveform {
    #[inline]
    pub fn evaluate(self, table: &TrigTable, theta: f32) -> f32 {
        match self {
            Waveform::Sine => table.sine(theta),
            Waveform::Cosine => table.cosine(theta),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorChannel {
    R,
    G,
    B,
}

/// Oscillator parameter that a modulator may overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Low,
    High,
    Phase,
}

/// Where an oscillator's sample goes each tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Target {
    /// Overwrites a parameter of another oscillator.
    Attribute { slot: SlotId, field: Field },
    /// Adds the rounded sample to a beam axis.
    PositionChannel { axis: Axis },
    /// Sets a colour byte to `round(low)`.
    ColorChannel { channel: ColorChannel },
    /// Rotates the tick's beam position about the centre by the sample angle.
    Rotation { center_x: f32, center_y: f32 },
}

impl Target {
    pub fn is_rotation(&self) -> bool {
        matches!(self, Target::Rotation { .. })
    }
}

/// One oscillator declaration as emitted by the instruction compiler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OscillatorDescriptor {
    pub start: u32,
    pub end: u32,
    pub low: f32,
    pub high: f32,
    pub phase: f32,
    pub frequency_hz: f32,
    pub target: Target,
    pub waveform: Waveform,
}

impl OscillatorDescriptor {
    /// A sine oscillator sweeping `[low, high]` on the given axis.
    pub fn position(axis: Axis, start: u32, end: u32, low: f32, high: f32, frequency_hz: f32) -> Self {
        Self {
            start,
            end,
            low,
            high,
            phase: 0.0,
            frequency_hz,
            target: Target::PositionChannel { axis },
            waveform: Waveform::Sine,
        }
    }

    /// A static colour level held for `[start, end)`.
    pub fn color(channel: ColorChannel, start: u32, end: u32, level: f32) -> Self {
        Self {
            start,
            end,
            low: level,
            high: level,
            phase: 0.0,
            frequency_hz: 0.0,
            target: Target::ColorChannel { channel },
            waveform: Waveform::Sine,
        }
    }

    pub fn with_phase(mut self, phase: f32) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_waveform(mut self, waveform: Waveform) -> Self {
        self.waveform = waveform;
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    /// True when the oscillator can never produce a sample.
    pub fn is_degenerate(&self) -> bool {
        self.end <= self.start
    }

    /// Structural checks the pool performs before accepting a descriptor.
    pub fn validate(&self, capacity: usize) -> Result<()> {
        let floats = [
            ("low", self.low),
            ("high", self.high),
            ("phase", self.phase),
            ("frequency_hz", self.frequency_hz),
        ];
        for (name, value) in floats {
            if !value.is_finite() {
                return Err(LaserError::malformed(format!("{name} must be finite, got {value}")));
            }
        }

        match self.target {
            Target::Attribute { slot, .. } if slot.index >= capacity => Err(LaserError::malformed(
                format!("attribute target slot {} is outside a pool of {capacity}", slot.index),
            )),
            Target::Rotation { center_x, center_y } if !(center_x.is_finite() && center_y.is_finite()) => {
                Err(LaserError::malformed("rotation centre must be finite"))
            }
            _ => Ok(()),
        }
    }
}

/// A live oscillator occupying a pool slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Oscillator {
    pub generation: u64,
    pub start: u32,
    pub end: u32,
    pub low: f32,
    pub high: f32,
    pub phase: f32,
    pub frequency_hz: f32,
    pub waveform: Waveform,
    pub target: Target,
}

impl Oscillator {
    pub(crate) fn from_descriptor(descriptor: &OscillatorDescriptor, generation: u64) -> Self {
        Self {
            generation,
            start: descriptor.start,
            end: descriptor.end,
            low: descriptor.low,
            high: descriptor.high,
            phase: descriptor.phase,
            frequency_hz: descriptor.frequency_hz,
            waveform: descriptor.waveform,
            target: descriptor.target,
        }
    }

    /// Angle at `tick`, measured from the oscillator's own start so phase is
    /// continuous no matter when it was scheduled. Reduced to `[0, 2π)`.
    #[inline]
    pub fn theta(&self, tick: u32) -> f32 {
        let elapsed = f64::from(tick.wrapping_sub(self.start));
        let turns = elapsed * f64::from(self.frequency_hz) / f64::from(TICK_RATE_HZ);
        let theta = turns * std::f64::consts::TAU + f64::from(self.phase);
        theta.rem_euclid(std::f64::consts::TAU) as f32
    }

    /// `waveform(θ) · (high - low) / 2 + (high + low) / 2`.
    #[inline]
    pub fn sample(&self, table: &TrigTable, tick: u32) -> f32 {
        let mid = (self.high + self.low) / 2.0;
        let amp = (self.high - self.low) / 2.0;
        self.waveform.evaluate(table, self.theta(tick)) * amp + mid
    }

    pub(crate) fn write_field(&mut self, field: Field, value: f32) {
        match field {
            Field::Low => self.low = value,
            Field::High => self.high = value,
            Field::Phase => self.phase = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_spans_low_to_high() {
        let table = TrigTable::shared();
        let osc = Oscillator::from_descriptor(
            &OscillatorDescriptor::position(Axis::X, 0, 40_000, 100.0, 300.0, 1.0),
            1,
        );
        assert!((osc.sample(&table, 0) - 200.0).abs() < 0.01);
        assert!((osc.sample(&table, 10_000) - 300.0).abs() < 0.01);
        assert!((osc.sample(&table, 30_000) - 100.0).abs() < 0.01);
    }

    #[test]
    fn phase_is_relative_to_start() {
        let table = TrigTable::shared();
        let early = Oscillator::from_descriptor(
            &OscillatorDescriptor::position(Axis::Y, 0, 100_000, 0.0, 10.0, 7.0),
            1,
        );
        let late = Oscillator::from_descriptor(
            &OscillatorDescriptor::position(Axis::Y, 12_345, 100_000, 0.0, 10.0, 7.0),
            2,
        );
        assert_eq!(early.sample(&table, 500), late.sample(&table, 12_845));
    }

    #[test]
    fn rejects_out_of_range_attribute_slot() {
        let descriptor = OscillatorDescriptor::position(Axis::X, 0, 10, 0.0, 1.0, 1.0).with_target(
            Target::Attribute {
                slot: SlotId::new(8, 0),
                field: Field::High,
            },
        );
        let err = descriptor.validate(8).unwrap_err();
        assert!(matches!(err, LaserError::MalformedDescriptor(_)));
        assert!(descriptor.validate(9).is_ok());
    }

    #[test]
    fn rejects_non_finite_parameters() {
        let descriptor = OscillatorDescriptor::position(Axis::X, 0, 10, f32::NAN, 1.0, 1.0);
        assert!(descriptor.validate(4).is_err());
    }

    #[test]
    fn degenerate_when_end_not_after_start() {
        assert!(OscillatorDescriptor::color(ColorChannel::R, 5, 5, 10.0).is_degenerate());
        assert!(!OscillatorDescriptor::color(ColorChannel::R, 5, 6, 10.0).is_degenerate());
    }
}
