// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Decaying read-rate meter

mod ewma;

use ewma::Ewma;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering::Relaxed},
        Mutex,
    },
    time::{Duration, Instant},
};

/// How often the moving averages are sampled
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Averaging window of a [`ReadMeter`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Window {
    /// 15 minutes
    Short,

    /// 2 hours
    Long,
}

impl Window {
    /// Length of the window
    #[must_use]
    pub const fn duration(self) -> Duration {
        match self {
            Self::Short => Duration::from_secs(15 * 60),
            Self::Long => Duration::from_secs(2 * 60 * 60),
        }
    }
}

struct MeterState {
    short: Ewma,
    long: Ewma,
    uncounted: u64,
    last_tick: Instant,
}

impl MeterState {
    fn tick_if_necessary(&mut self, now: Instant) {
        let age = now.saturating_duration_since(self.last_tick);

        if age < TICK_INTERVAL {
            return;
        }

        let tick_nanos = TICK_INTERVAL.as_nanos();
        let ticks = age.as_nanos() / tick_nanos;

        #[expect(clippy::cast_possible_truncation, reason = "remainder is below one tick")]
        let remainder = Duration::from_nanos((age.as_nanos() % tick_nanos) as u64);
        self.last_tick = now.checked_sub(remainder).unwrap_or(now);

        let count = std::mem::take(&mut self.uncounted);
        self.short.tick(count);
        self.long.tick(count);

        let idle = u64::try_from(ticks - 1).unwrap_or(u64::MAX);
        self.short.decay(idle);
        self.long.decay(idle);
    }
}

/// Tracks how often a table is read
///
/// Keeps two exponentially-decaying averages of the read rate, one over a
/// short (15 minute) and one over a long (2 hour) window.
///
/// The rates can be restored from a checkpoint using [`ReadMeter::restore`],
/// which overwrites them. Restoring is safe while other threads read the rates.
pub struct ReadMeter {
    state: Mutex<MeterState>,
    count: AtomicU64,
}

impl Default for ReadMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReadMeter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ReadMeter(short={:.3}/s, long={:.3}/s)",
            self.rate(Window::Short),
            self.rate(Window::Long),
        )
    }
}

impl ReadMeter {
    /// Creates a meter with no recorded reads.
    #[must_use]
    pub fn new() -> Self {
        Self::new_at(Instant::now())
    }

    #[doc(hidden)]
    #[must_use]
    pub fn new_at(now: Instant) -> Self {
        Self {
            state: Mutex::new(MeterState {
                short: Ewma::new(Window::Short.duration()),
                long: Ewma::new(Window::Long.duration()),
                uncounted: 0,
                last_tick: now,
            }),
            count: AtomicU64::default(),
        }
    }

    /// Creates a meter from checkpointed rates (events per second).
    #[must_use]
    pub fn restored(short_rate: f64, long_rate: f64) -> Self {
        let meter = Self::new();
        meter.restore(short_rate, long_rate);
        meter
    }

    /// Records a single read.
    pub fn mark(&self) {
        self.mark_n(1);
    }

    /// Records `n` reads.
    pub fn mark_n(&self, n: u64) {
        self.mark_n_at(n, Instant::now());
    }

    #[doc(hidden)]
    pub fn mark_n_at(&self, n: u64, now: Instant) {
        let mut state = self.state.lock().expect("lock is poisoned");
        state.tick_if_necessary(now);
        state.uncounted = state.uncounted.saturating_add(n);
        drop(state);

        self.count.fetch_add(n, Relaxed);
    }

    /// Decayed read rate in reads per second, never negative.
    #[must_use]
    pub fn rate(&self, window: Window) -> f64 {
        self.rate_at(window, Instant::now())
    }

    #[doc(hidden)]
    #[must_use]
    pub fn rate_at(&self, window: Window, now: Instant) -> f64 {
        let mut state = self.state.lock().expect("lock is poisoned");
        state.tick_if_necessary(now);

        match window {
            Window::Short => state.short.rate(),
            Window::Long => state.long.rate(),
        }
    }

    /// Overwrites both rates, e.g. when restoring from a checkpoint.
    ///
    /// Reads recorded since the last tick are discarded.
    /// Negative or non-finite rates are stored as 0.
    pub fn restore(&self, short_rate: f64, long_rate: f64) {
        self.restore_at(short_rate, long_rate, Instant::now());
    }

    #[doc(hidden)]
    pub fn restore_at(&self, short_rate: f64, long_rate: f64, now: Instant) {
        let mut state = self.state.lock().expect("lock is poisoned");
        state.short.set(short_rate);
        state.long.set(long_rate);
        state.uncounted = 0;

        // Restored rates are current as of now, idle time before does not decay them
        state.last_tick = now;
    }

    /// Total number of reads recorded through [`ReadMeter::mark`].
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Relaxed)
    }
}
