use std::sync::Arc;

use tracing::warn;

use crate::{
    config::EngineConfig,
    frame::OutputFrame,
    oscillator::{Axis, OscillatorDescriptor, SlotId, Target, MAX_COORDINATE, TICK_RATE_HZ},
    pool::{OscillatorPool, DEFAULT_CAPACITY},
    trig::TrigTable,
    LaserError, Result,
};

/// Monotonic tick counter used to stitch consecutive windows together.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickClock {
    tick: u32,
}

impl TickClock {
    pub fn starting_at(tick: u32) -> Self {
        Self { tick }
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn seconds(&self) -> f64 {
        f64::from(self.tick) / f64::from(TICK_RATE_HZ)
    }

    pub fn reset(&mut self) {
        self.tick = 0;
    }

    pub fn advance(&mut self, ticks: u32) {
        self.tick = self.tick.wrapping_add(ticks);
    }
}

/// Owns the oscillator pool and the frame buffer and synthesises one window
/// of ticks per call.
#[derive(Debug, Clone)]
pub struct Scheduler {
    table: Arc<TrigTable>,
    pool: OscillatorPool,
    frame: OutputFrame,
}

impl Scheduler {
    pub fn new(capacity: usize) -> Self {
        Self::with_table(TrigTable::shared(), capacity)
    }

    pub fn with_table(table: Arc<TrigTable>, capacity: usize) -> Self {
        Self {
            table,
            pool: OscillatorPool::new(capacity),
            frame: OutputFrame::default(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.capacity)
    }

    pub fn pool(&self) -> &OscillatorPool {
        &self.pool
    }

    /// Direct pool access for callers that manage slots themselves. Must not
    /// be used while a window is being evaluated, which the borrow rules
    /// already guarantee.
    pub fn pool_mut(&mut self) -> &mut OscillatorPool {
        &mut self.pool
    }

    /// The most recently evaluated frame.
    pub fn frame(&self) -> &OutputFrame {
        &self.frame
    }

    /// Allocates a descriptor between windows. Capacity failures are logged
    /// and returned so the caller can drop the descriptor and continue.
    pub fn schedule(&mut self, descriptor: &OscillatorDescriptor) -> Result<SlotId> {
        match self.pool.allocate(descriptor) {
            Err(err @ LaserError::CapacityExceeded { .. }) => {
                warn!(
                    start = descriptor.start,
                    end = descriptor.end,
                    "dropping oscillator: {err}"
                );
                Err(err)
            }
            other => other,
        }
    }

    pub fn retire(&mut self, slot: SlotId) -> bool {
        self.pool.retire(slot)
    }

    /// Evaluates `[clock.tick(), clock.tick() + window_len)` and advances the
    /// clock past it.
    pub fn next_window(&mut self, clock: &mut TickClock, window_len: u32) -> &OutputFrame {
        let start = clock.tick();
        clock.advance(window_len);
        self.evaluate_window(start, window_len)
    }

    /// Synthesises `window_len` ticks starting at `start_tick`.
    ///
    /// Each tick runs in two phases. Attribute, position and colour targets are
    /// applied first, scanning slots from the highest active index down so a
    /// modulator always runs before the oscillator it modulates. Rotations are
    /// applied afterwards so they see every position write for the tick.
    pub fn evaluate_window(&mut self, start_tick: u32, window_len: u32) -> &OutputFrame {
        self.frame.reset(start_tick, window_len as usize);

        for offset in 0..window_len {
            let tick = start_tick.wrapping_add(offset);
            self.evaluate_tick(tick, offset as usize);
        }

        &self.frame
    }

    fn evaluate_tick(&mut self, tick: u32, offset: usize) {
        let Some(bound) = self.pool.highest_active_index() else {
            return;
        };

        let mut x = 0_i32;
        let mut y = 0_i32;
        let mut has_rotation = false;

        for index in (0..=bound).rev() {
            let is_rotation = match self.pool.slot(index) {
                Some(osc) => osc.target.is_rotation(),
                None => continue,
            };
            if is_rotation {
                has_rotation = true;
                continue;
            }
            let Some((sample, target, low)) = self.sample_slot(index, tick) else {
                continue;
            };

            match target {
                Target::Attribute { slot, field } => self.pool.write_attribute(slot, field, sample),
                Target::PositionChannel { axis: Axis::X } => x = x.saturating_add(sample.round() as i32),
                Target::PositionChannel { axis: Axis::Y } => y = y.saturating_add(sample.round() as i32),
                Target::ColorChannel { channel } => {
                    let level = low.round().clamp(0.0, f32::from(u8::MAX)) as u8;
                    self.frame.sample_mut(offset).set_channel(channel, level);
                }
                // filtered out above; applied in the second phase
                Target::Rotation { .. } => {}
            }
        }

        let beam = self.frame.sample_mut(offset);
        beam.x = x.clamp(0, i32::from(MAX_COORDINATE)) as u16;
        beam.y = y.clamp(0, i32::from(MAX_COORDINATE)) as u16;

        if !has_rotation {
            return;
        }

        for index in (0..=bound).rev() {
            if !self.pool.slot(index).is_some_and(|osc| osc.target.is_rotation()) {
                continue;
            }
            if let Some((angle, Target::Rotation { center_x, center_y }, _)) = self.sample_slot(index, tick) {
                self.rotate(offset, angle, center_x, center_y);
            }
        }
    }

    /// Returns `(sample, target, low)` for an oscillator that is live at
    /// `tick`, retiring it once `tick` reaches its end.
    #[inline]
    fn sample_slot(&mut self, index: usize, tick: u32) -> Option<(f32, Target, f32)> {
        let osc = *self.pool.slot(index)?;
        if tick < osc.start {
            return None;
        }
        if tick >= osc.end {
            self.pool.retire_index(index);
            return None;
        }
        Some((osc.sample(&self.table, tick), osc.target, osc.low))
    }

    fn rotate(&mut self, offset: usize, angle: f32, center_x: f32, center_y: f32) {
        let (sin, cos) = self.table.sine_cosine(angle);
        let beam = self.frame.sample_mut(offset);
        let dx = f32::from(beam.x) - center_x;
        let dy = f32::from(beam.y) - center_y;
        beam.x = clamp_coordinate(center_x + dx * cos - dy * sin);
        beam.y = clamp_coordinate(center_y + dx * sin + dy * cos);
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn clamp_coordinate(value: f32) -> u16 {
    value.round().clamp(0.0, f32::from(MAX_COORDINATE)) as u16
}
