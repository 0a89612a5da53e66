//! Wheel-delta accumulation

use crate::sink::{InputSink, ScrollDirection, SinkError};

/// Raw jog units per emitted scroll step, hand-tuned to the wheel's
/// resolution.
pub const WHEEL_STEP: i32 = 30000;

/// Integrates raw jog deltas into discrete scroll steps.
///
/// The sink expects one synthetic pulse per step, so threshold crossings
/// are walked one at a time instead of dividing the counter out.
#[derive(Debug, Default)]
pub struct WheelAccumulator {
    accumulator: i32,
}

impl WheelAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulation not yet emitted as a step; always within
    /// `(-WHEEL_STEP, WHEEL_STEP)` after `accumulate` returns.
    pub fn residual(&self) -> i32 {
        self.accumulator
    }

    /// Add a raw delta and emit one scroll step per threshold crossing.
    pub fn accumulate(
        &mut self,
        delta: i32,
        sink: &mut dyn InputSink,
    ) -> Result<(), SinkError> {
        self.accumulator = self.accumulator.saturating_add(delta);
        while self.accumulator >= WHEEL_STEP || self.accumulator <= -WHEEL_STEP {
            if self.accumulator > 0 {
                sink.scroll(ScrollDirection::Up)?;
                self.accumulator -= WHEEL_STEP;
            } else {
                sink.scroll(ScrollDirection::Down)?;
                self.accumulator += WHEEL_STEP;
            }
        }
        Ok(())
    }
}
