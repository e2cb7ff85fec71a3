//! Quarter-wave sine table.
//!
//! One quadrant of a sinusoid is sampled once and the remaining three
//! quadrants are reconstructed by symmetry, giving O(1) sine and cosine with an
//! absolute error well under `1e-4`. The table is immutable after
//! construction and can be shared freely between threads.

use std::{
    f64::consts::{FRAC_PI_2, PI},
    fmt,
    sync::{Arc, OnceLock},
};

/// Number of table entries covering one quadrant (`0..π/2`).
pub const QUARTER_STEPS: usize = 1 << 16;

const FULL_CIRCLE_MASK: i64 = 4 * QUARTER_STEPS as i64 - 1;

static SHARED: OnceLock<Arc<TrigTable>> = OnceLock::new();

pub struct TrigTable {
    quarter: Box<[f32]>,
}

impl TrigTable {
    /// Builds a fresh table. Prefer [`TrigTable::shared`] unless an isolated
    /// instance is needed.
    pub fn new() -> Self {
        let steps = QUARTER_STEPS as f64;
        let quarter = (0..QUARTER_STEPS)
            .map(|i| (i as f64 / steps * FRAC_PI_2).sin() as f32)
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { quarter }
    }

    /// Returns the process-wide table, building it on first use.
    pub fn shared() -> Arc<TrigTable> {
        SHARED.get_or_init(|| Arc::new(TrigTable::new())).clone()
    }

    /// Table sine of `theta` radians. Negative angles are folded onto
    /// `-theta + π`, which lands on the same point of the circle.
    #[inline]
    pub fn sine(&self, theta: f32) -> f32 {
        let folded = if theta >= 0.0 {
            f64::from(theta)
        } else {
            PI - f64::from(theta)
        };
        self.sine_at(quantize(folded))
    }

    /// Table cosine of `theta` radians. Only the sign of the input is folded
    /// since cosine is even.
    #[inline]
    pub fn cosine(&self, theta: f32) -> f32 {
        self.cosine_at(quantize(f64::from(theta).abs()))
    }

    #[inline]
    pub fn sine_cosine(&self, theta: f32) -> (f32, f32) {
        (self.sine(theta), self.cosine(theta))
    }
}

impl TrigTable {
    /// Sine at step `q` of a full turn, `q < 4 * QUARTER_STEPS`.
    #[inline]
    pub(crate) fn sine_at(&self, q: usize) -> f32 {
        let t = QUARTER_STEPS;
        if q < t {
            self.quarter[q]
        } else if q < 2 * t {
            self.quarter[2 * t - 1 - q]
        } else if q < 3 * t {
            -self.quarter[q - 2 * t]
        } else {
            -self.quarter[4 * t - 1 - q]
        }
    }

    /// Cosine at step `q` of a full turn, `q < 4 * QUARTER_STEPS`.
    #[inline]
    pub(crate) fn cosine_at(&self, q: usize) -> f32 {
        let t = QUARTER_STEPS;
        if q < t {
            self.quarter[t - 1 - q]
        } else if q < 2 * t {
            -self.quarter[q - t]
        } else if q < 3 * t {
            -self.quarter[3 * t - 1 - q]
        } else {
            self.quarter[q - 3 * t]
        }
    }
}

impl Default for TrigTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TrigTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrigTable")
            .field("quarter_steps", &self.quarter.len())
            .finish()
    }
}

/// Maps a non-negative angle onto an index over `4 * QUARTER_STEPS` steps of a
/// full turn. Non-finite input saturates instead of panicking.
#[inline]
fn quantize(folded: f64) -> usize {
    let steps = (folded / FRAC_PI_2 * QUARTER_STEPS as f64) as i64;
    (steps & FULL_CIRCLE_MASK) as usize
}
