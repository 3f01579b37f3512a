// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::TICK_INTERVAL;
use std::time::Duration;

/// Exponentially-weighted moving average of an event rate
///
/// Rates are events per second, sampled once per [`TICK_INTERVAL`].
#[derive(Clone, Debug)]
pub struct Ewma {
    alpha: f64,
    rate: f64,
    initialized: bool,
}

impl Ewma {
    pub fn new(window: Duration) -> Self {
        let alpha = 1.0 - (-TICK_INTERVAL.as_secs_f64() / window.as_secs_f64()).exp();

        Self {
            alpha,
            rate: 0.0,
            initialized: false,
        }
    }

    pub fn restored(window: Duration, rate: f64) -> Self {
        let mut ewma = Self::new(window);
        ewma.set(rate);
        ewma
    }

    /// Folds the events counted during the last tick interval into the average.
    #[expect(clippy::cast_precision_loss, reason = "rates are estimates")]
    pub fn tick(&mut self, count: u64) {
        let instant_rate = count as f64 / TICK_INTERVAL.as_secs_f64();

        if self.initialized {
            self.rate += self.alpha * (instant_rate - self.rate);
        } else {
            self.rate = instant_rate;
            self.initialized = true;
        }
    }

    /// Applies `ticks` idle intervals at once.
    pub fn decay(&mut self, ticks: u64) {
        if ticks == 0 {
            return;
        }

        if !self.initialized {
            self.tick(0);
            self.decay(ticks - 1);
            return;
        }

        let exp = i32::try_from(ticks).unwrap_or(i32::MAX);
        self.rate *= (1.0 - self.alpha).powi(exp);
    }

    /// Overwrites the rate.
    pub fn set(&mut self, rate: f64) {
        self.rate = if rate.is_finite() { rate.max(0.0) } else { 0.0 };
        self.initialized = true;
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn ewma_first_tick_is_instant_rate() {
        let mut ewma = Ewma::new(Duration::from_secs(900));
        ewma.tick(50);
        assert!((ewma.rate() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ewma_decay_matches_idle_ticks() {
        let mut a = Ewma::restored(Duration::from_secs(900), 8.0);
        let mut b = a.clone();

        for _ in 0..17 {
            a.tick(0);
        }
        b.decay(17);

        assert!((a.rate() - b.rate()).abs() < 1e-9);
    }

    #[test]
    fn ewma_set_clamps() {
        let mut ewma = Ewma::new(Duration::from_secs(900));
        ewma.set(-3.0);
        assert!(ewma.rate().abs() < f64::EPSILON);

        ewma.set(f64::NAN);
        assert!(ewma.rate().abs() < f64::EPSILON);
    }
}
