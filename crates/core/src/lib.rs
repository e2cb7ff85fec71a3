//! Core library for the laser show engine.
//!
//! The [`Scheduler`] owns a fixed-capacity [`OscillatorPool`] and, for every
//! tick of the 40 kHz output stream, evaluates the live oscillators into an
//! [`OutputFrame`] of beam positions and colours. Oscillators write into the
//! frame or modulate each other's parameters; a quarter-wave [`TrigTable`]
//! keeps the per-tick cost to a table lookup. Finished frames go to a
//! [`FrameSink`], either the line-oriented debug dump or the serial
//! [`WireSink`].

pub mod analysis;
pub mod config;
pub mod error;
pub mod frame;
pub mod oscillator;
pub mod pool;
pub mod program;
pub mod render;
pub mod timeline;
pub mod trig;
pub mod wire;

pub use analysis::{FrameAnalyzer, FrameSummary};
pub use config::{AppConfig, DebugConfig, EngineConfig, TransportConfig};
pub use error::{LaserError, Result};
pub use frame::{FrameSample, OutputFrame};
pub use oscillator::{
    Axis, ColorChannel, Field, Oscillator, OscillatorDescriptor, SlotId, Target, Waveform,
    MAX_COORDINATE, TICK_RATE_HZ,
};
pub use pool::OscillatorPool;
pub use program::{Declaration, LoadReport, Program, TargetRef};
pub use render::{DebugField, DebugSink, FrameSink};
pub use timeline::{Scheduler, TickClock};
pub use trig::TrigTable;
pub use wire::{pack_sample, WireSample, WireSink};
