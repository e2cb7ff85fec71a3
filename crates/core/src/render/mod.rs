use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::{frame::OutputFrame, Result};

/// Consumer of finished frames: a debug dump, the wire packer, a test probe.
pub trait FrameSink {
    fn consume(&mut self, frame: &OutputFrame) -> Result<()>;

    /// Flushes anything buffered. Called once after the last frame.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Per-tick value the debug sink prints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugField {
    #[default]
    X,
    Y,
    R,
    G,
    B,
}

/// Writes one value per line for the selected field.
#[derive(Debug)]
pub struct DebugSink<W: Write> {
    out: W,
    field: DebugField,
    lines: u64,
}

impl<W: Write> DebugSink<W> {
    pub fn new(out: W, field: DebugField) -> Self {
        Self {
            out,
            field,
            lines: 0,
        }
    }

    pub fn lines_written(&self) -> u64 {
        self.lines
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> FrameSink for DebugSink<W> {
    fn consume(&mut self, frame: &OutputFrame) -> Result<()> {
        for sample in frame.samples() {
            let value = match self.field {
                DebugField::X => sample.x,
                DebugField::Y => sample.y,
                DebugField::R => u16::from(sample.r),
                DebugField::G => u16::from(sample.g),
                DebugField::B => u16::from(sample.b),
            };
            writeln!(self.out, "{value}")?;
        }
        self.lines += frame.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        oscillator::{Axis, ColorChannel, OscillatorDescriptor},
        Scheduler,
    };

    #[test]
    fn prints_one_value_per_line() {
        let mut scheduler = Scheduler::new(4);
        scheduler
            .schedule(&OscillatorDescriptor::position(Axis::Y, 1, 3, 42.0, 42.0, 0.0))
            .unwrap();
        scheduler
            .schedule(&OscillatorDescriptor::color(ColorChannel::G, 0, 2, 9.0))
            .unwrap();

        let mut ys = DebugSink::new(Vec::new(), DebugField::Y);
        let mut gs = DebugSink::new(Vec::new(), DebugField::G);
        let frame = scheduler.evaluate_window(0, 4);
        ys.consume(frame).unwrap();
        gs.consume(frame).unwrap();
        ys.finish().unwrap();

        assert_eq!(ys.lines_written(), 4);
        assert_eq!(String::from_utf8(ys.into_inner()).unwrap(), "0\n42\n42\n0\n");
        assert_eq!(String::from_utf8(gs.into_inner()).unwrap(), "9\n9\n0\n0\n");
    }
}
