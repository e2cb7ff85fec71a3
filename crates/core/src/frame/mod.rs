use serde::{Deserialize, Serialize};

use crate::oscillator::{Axis, ColorChannel};

/// Beam state for a single tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSample {
    pub x: u16,
    pub y: u16,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl FrameSample {
    pub fn axis(&self, axis: Axis) -> u16 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }

    pub fn channel(&self, channel: ColorChannel) -> u8 {
        match channel {
            ColorChannel::R => self.r,
            ColorChannel::G => self.g,
            ColorChannel::B => self.b,
        }
    }

    pub(crate) fn set_channel(&mut self, channel: ColorChannel, value: u8) {
        match channel {
            ColorChannel::R => self.r = value,
            ColorChannel::G => self.g = value,
            ColorChannel::B => self.b = value,
        }
    }

    /// True when any colour channel is on.
    pub fn is_lit(&self) -> bool {
        self.r > 0 || self.g > 0 || self.b > 0
    }
}

/// Samples for one contiguous window of ticks, starting at `start_tick`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputFrame {
    start_tick: u32,
    samples: Vec<FrameSample>,
}

impl OutputFrame {
    pub fn new(start_tick: u32, len: usize) -> Self {
        Self {
            start_tick,
            samples: vec![FrameSample::default(); len],
        }
    }

    /// Re-targets the buffer to a new window, keeping its allocation.
    pub(crate) fn reset(&mut self, start_tick: u32, len: usize) {
        self.start_tick = start_tick;
        self.samples.clear();
        self.samples.resize(len, FrameSample::default());
    }

    pub fn start_tick(&self) -> u32 {
        self.start_tick
    }

    /// One past the last tick covered by the frame.
    pub fn end_tick(&self) -> u32 {
        self.start_tick.wrapping_add(self.samples.len() as u32)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[FrameSample] {
        &self.samples
    }

    /// Sample at an absolute tick, if the frame covers it.
    pub fn at_tick(&self, tick: u32) -> Option<&FrameSample> {
        let offset = tick.checked_sub(self.start_tick)?;
        self.samples.get(offset as usize)
    }

    pub(crate) fn sample_mut(&mut self, offset: usize) -> &mut FrameSample {
        &mut self.samples[offset]
    }

    pub fn axis_values(&self, axis: Axis) -> impl Iterator<Item = u16> + '_ {
        self.samples.iter().map(move |sample| sample.axis(axis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_reuses_buffer_and_clears() {
        let mut frame = OutputFrame::new(0, 4);
        frame.sample_mut(2).x = 17;
        frame.reset(100, 3);
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.start_tick(), 100);
        assert_eq!(frame.end_tick(), 103);
        assert!(frame.samples().iter().all(|s| *s == FrameSample::default()));
    }

    #[test]
    fn addresses_by_absolute_tick() {
        let mut frame = OutputFrame::new(50, 10);
        frame.sample_mut(3).set_channel(ColorChannel::B, 12);
        assert_eq!(frame.at_tick(53).unwrap().b, 12);
        assert!(frame.at_tick(49).is_none());
        assert!(frame.at_tick(60).is_none());
        assert!(frame.at_tick(53).unwrap().is_lit());
    }
}
