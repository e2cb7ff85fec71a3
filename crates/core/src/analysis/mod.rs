use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::{
    frame::OutputFrame,
    oscillator::{Axis, TICK_RATE_HZ},
    Result,
};

/// Magnitudes below this are treated as silence when picking a peak.
const PEAK_FLOOR: f32 = 1e-3;

/// Coarse description of a synthesised frame, for checking a program without
/// hardware attached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameSummary {
    pub start_tick: u32,
    pub ticks: usize,
    pub x_range: Option<(u16, u16)>,
    pub y_range: Option<(u16, u16)>,
    /// Strongest non-DC frequency on the x axis, in Hz.
    pub dominant_x_hz: Option<f32>,
    pub dominant_y_hz: Option<f32>,
    /// Ticks where at least one colour channel is on.
    pub lit_ticks: usize,
}

impl FrameSummary {
    /// One-off summary; use a [`FrameAnalyzer`] to reuse the FFT plan.
    pub fn from_frame(frame: &OutputFrame) -> Result<Self> {
        FrameAnalyzer::new().summarize(frame)
    }
}

/// Spectrum analyser that keeps its FFT plan between frames of equal length.
pub struct FrameAnalyzer {
    planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
}

impl FrameAnalyzer {
    pub fn new() -> Self {
        Self {
            planner: RealFftPlanner::new(),
            fft: None,
        }
    }

    pub fn summarize(&mut self, frame: &OutputFrame) -> Result<FrameSummary> {
        Ok(FrameSummary {
            start_tick: frame.start_tick(),
            ticks: frame.len(),
            x_range: axis_range(frame, Axis::X),
            y_range: axis_range(frame, Axis::Y),
            dominant_x_hz: self.dominant_frequency(frame, Axis::X)?,
            dominant_y_hz: self.dominant_frequency(frame, Axis::Y)?,
            lit_ticks: frame.samples().iter().filter(|s| s.is_lit()).count(),
        })
    }

    fn dominant_frequency(&mut self, frame: &OutputFrame, axis: Axis) -> Result<Option<f32>> {
        let len = frame.len();
        if len < 2 {
            return Ok(None);
        }

        let mean = frame.axis_values(axis).map(f32::from).sum::<f32>() / len as f32;
        let fft = self.prepare(len);
        for (index, (slot, value)) in fft.input.iter_mut().zip(frame.axis_values(axis)).enumerate() {
            *slot = (f32::from(value) - mean) * hann_value(index, len);
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        let peak = fft
            .spectrum
            .iter()
            .enumerate()
            .skip(1)
            .map(|(bin, value)| (bin, value.norm()))
            .max_by(|a, b| a.1.total_cmp(&b.1));

        Ok(match peak {
            Some((bin, magnitude)) if magnitude > PEAK_FLOOR => {
                Some(bin as f32 * TICK_RATE_HZ as f32 / len as f32)
            }
            _ => None,
        })
    }

    fn prepare(&mut self, size: usize) -> &mut FftResources {
        if self.fft.as_ref().map_or(false, |fft| fft.size != size) {
            self.fft = None;
        }

        let planner = &mut self.planner;
        self.fft.get_or_insert_with(|| {
            let plan = planner.plan_fft_forward(size);
            FftResources {
                size,
                scratch: plan.make_scratch_vec(),
                spectrum: plan.make_output_vec(),
                input: plan.make_input_vec(),
                plan,
            }
        })
    }
}

impl Default for FrameAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FrameAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameAnalyzer")
            .field("fft_size", &self.fft.as_ref().map(|fft| fft.size))
            .finish()
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

fn axis_range(frame: &OutputFrame, axis: Axis) -> Option<(u16, u16)> {
    frame.axis_values(axis).fold(None, |range, value| match range {
        None => Some((value, value)),
        Some((lo, hi)) => Some((lo.min(value), hi.max(value))),
    })
}

fn hann_value(index: usize, len: usize) -> f32 {
    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        oscillator::{ColorChannel, OscillatorDescriptor},
        Scheduler,
    };

    #[test]
    fn finds_dominant_axis_frequency() {
        let mut scheduler = Scheduler::new(4);
        scheduler
            .schedule(&OscillatorDescriptor::position(Axis::X, 0, 4_000, 1000.0, 3000.0, 100.0))
            .unwrap();
        scheduler
            .schedule(&OscillatorDescriptor::position(Axis::Y, 0, 4_000, 1500.0, 1500.0, 0.0))
            .unwrap();
        scheduler
            .schedule(&OscillatorDescriptor::color(ColorChannel::R, 0, 1_000, 20.0))
            .unwrap();

        let frame = scheduler.evaluate_window(0, 4_000);
        let summary = FrameAnalyzer::new().summarize(frame).unwrap();

        assert_eq!(summary.ticks, 4_000);
        assert_eq!(summary.dominant_x_hz, Some(100.0));
        assert_eq!(summary.dominant_y_hz, None);
        assert_eq!(summary.y_range, Some((1500, 1500)));
        let (lo, hi) = summary.x_range.unwrap();
        assert!(lo <= 1001 && hi >= 2999);
        assert_eq!(summary.lit_ticks, 1_000);
    }

    #[test]
    fn short_frames_have_no_spectrum() {
        let frame = OutputFrame::new(0, 1);
        let summary = FrameSummary::from_frame(&frame).unwrap();
        assert_eq!(summary.dominant_x_hz, None);
        assert_eq!(summary.x_range, Some((0, 0)));
    }
}
