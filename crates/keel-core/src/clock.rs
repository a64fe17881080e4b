use std::time::{Duration, Instant};

/// Pause-aware monotonic clock that drives the frame loop.
///
/// All bookkeeping happens in [`Duration`] (integer nanoseconds); values are
/// converted to `f64` seconds only when read, so long sessions do not
/// accumulate floating-point drift.
///
/// Every operation has an `*_at` variant that takes the current instant
/// explicitly. The plain variants call it with [`Instant::now`].
///
/// ```text
///            |<-- paused_total -->|
/// ---*-------*--------------------*-----------*---> time
///   base   paused_at          unpause       current
/// ```
#[derive(Debug, Clone)]
pub struct Clock {
    base: Instant,
    paused_at: Instant,
    prev_tick: Instant,
    current: Instant,
    paused_total: Duration,
    delta: Duration,
    paused: bool,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    /// Create a running clock whose zero point is now.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Create a running clock whose zero point is `now`.
    pub fn starting_at(now: Instant) -> Self {
        Self {
            base: now,
            paused_at: now,
            prev_tick: now,
            current: now,
            paused_total: Duration::ZERO,
            delta: Duration::ZERO,
            paused: false,
        }
    }

    /// Zero all timers and start counting.
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    /// [`start`](Self::start) with an explicit instant.
    pub fn start_at(&mut self, now: Instant) {
        *self = Self::starting_at(now);
    }

    /// Stop counting elapsed time. No-op when already paused.
    pub fn pause(&mut self) {
        self.pause_at(Instant::now());
    }

    /// [`pause`](Self::pause) with an explicit instant.
    pub fn pause_at(&mut self, now: Instant) {
        if self.paused {
            return;
        }
        self.paused_at = now;
        self.paused = true;
    }

    /// Resume counting, excluding the paused interval. No-op when running.
    pub fn unpause(&mut self) {
        self.unpause_at(Instant::now());
    }

    /// [`unpause`](Self::unpause) with an explicit instant.
    pub fn unpause_at(&mut self, now: Instant) {
        if !self.paused {
            return;
        }
        self.current = now;
        self.paused_total += now.saturating_duration_since(self.paused_at);
        // The next delta must not include the paused interval.
        self.prev_tick = now;
        self.paused = false;
    }

    /// Advance one step and record the delta since the previous tick.
    ///
    /// While paused this does nothing: the delta keeps its last value.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// [`tick`](Self::tick) with an explicit instant.
    pub fn tick_at(&mut self, now: Instant) {
        if self.paused {
            return;
        }
        self.current = now;
        self.delta = now.saturating_duration_since(self.prev_tick);
        self.prev_tick = now;
    }

    /// Seconds since [`start`](Self::start), excluding paused intervals.
    pub fn elapsed(&mut self) -> f64 {
        self.elapsed_at(Instant::now())
    }

    /// [`elapsed`](Self::elapsed) measured at `now`.
    pub fn elapsed_at(&mut self, now: Instant) -> f64 {
        self.elapsed_duration_at(now).as_secs_f64()
    }

    /// Elapsed running time as a [`Duration`].
    ///
    /// While paused the result is frozen at the instant the pause began.
    /// Otherwise `now` is cached as the current instant.
    pub fn elapsed_duration_at(&mut self, now: Instant) -> Duration {
        if self.paused {
            return self
                .paused_at
                .saturating_duration_since(self.base)
                .saturating_sub(self.paused_total);
        }
        self.current = now;
        self.current
            .saturating_duration_since(self.base)
            .saturating_sub(self.paused_total)
    }

    /// Seconds between the two most recent running ticks.
    pub fn last_delta(&self) -> f64 {
        self.delta.as_secs_f64()
    }

    /// [`last_delta`](Self::last_delta) as a [`Duration`].
    pub fn last_delta_duration(&self) -> Duration {
        self.delta
    }

    /// Total time spent paused since the last start.
    pub fn paused_total(&self) -> Duration {
        self.paused_total
    }

    /// Whether the clock is paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn new_clock_has_zero_elapsed_and_delta() {
        let t0 = Instant::now();
        let mut clock = Clock::starting_at(t0);
        assert_eq!(clock.elapsed_duration_at(t0), Duration::ZERO);
        assert_eq!(clock.last_delta(), 0.0);
        assert!(!clock.is_paused());
    }

    #[test]
    fn tick_records_delta_between_ticks() {
        let t0 = Instant::now();
        let mut clock = Clock::starting_at(t0);
        clock.tick_at(t0 + ms(16));
        assert_eq!(clock.last_delta_duration(), ms(16));
        clock.tick_at(t0 + ms(40));
        assert_eq!(clock.last_delta_duration(), ms(24));
        assert!((clock.last_delta() - 0.024).abs() < 1e-12);
    }

    #[test]
    fn elapsed_excludes_paused_interval() {
        let t0 = Instant::now();
        let mut clock = Clock::starting_at(t0);
        clock.pause_at(t0 + ms(100));
        clock.unpause_at(t0 + ms(600));
        assert_eq!(clock.elapsed_duration_at(t0 + ms(700)), ms(200));
        assert_eq!(clock.paused_total(), ms(500));
    }

    #[test]
    fn elapsed_frozen_while_paused() {
        let t0 = Instant::now();
        let mut clock = Clock::starting_at(t0);
        clock.pause_at(t0 + ms(100));
        assert_eq!(clock.elapsed_duration_at(t0 + ms(150)), ms(100));
        assert_eq!(clock.elapsed_duration_at(t0 + ms(900)), ms(100));
    }

    #[test]
    fn elapsed_unchanged_across_a_pause() {
        let t0 = Instant::now();
        let mut clock = Clock::starting_at(t0);
        clock.pause_at(t0 + ms(300));
        clock.unpause_at(t0 + ms(800));
        // Second pause: frozen value must account for the first one.
        clock.pause_at(t0 + ms(1000));
        assert_eq!(clock.elapsed_duration_at(t0 + ms(5000)), ms(500));
        clock.unpause_at(t0 + ms(6000));
        assert_eq!(clock.elapsed_duration_at(t0 + ms(6000)), ms(500));
    }

    #[test]
    fn elapsed_is_non_decreasing_over_pause_sequences() {
        let t0 = Instant::now();
        let mut clock = Clock::starting_at(t0);
        let mut last = Duration::ZERO;
        for step in 1..=40u64 {
            let now = t0 + ms(step * 25);
            match step % 4 {
                0 => clock.pause_at(now),
                1 => clock.unpause_at(now),
                2 => clock.pause_at(now),
                _ => clock.tick_at(now),
            }
            let elapsed = clock.elapsed_duration_at(now);
            assert!(elapsed >= last, "step {step}: {elapsed:?} < {last:?}");
            last = elapsed;
        }
    }

    #[test]
    fn tick_while_paused_keeps_previous_delta() {
        let t0 = Instant::now();
        let mut clock = Clock::starting_at(t0);
        clock.tick_at(t0 + ms(10));
        clock.pause_at(t0 + ms(12));
        clock.tick_at(t0 + ms(500));
        assert_eq!(clock.last_delta_duration(), ms(10));
    }

    #[test]
    fn delta_after_unpause_skips_paused_interval() {
        let t0 = Instant::now();
        let mut clock = Clock::starting_at(t0);
        clock.tick_at(t0 + ms(10));
        clock.pause_at(t0 + ms(20));
        clock.unpause_at(t0 + ms(1020));
        clock.tick_at(t0 + ms(1030));
        assert_eq!(clock.last_delta_duration(), ms(10));
    }

    #[test]
    fn pause_and_unpause_are_idempotent() {
        let t0 = Instant::now();
        let mut clock = Clock::starting_at(t0);
        clock.pause_at(t0 + ms(100));
        clock.pause_at(t0 + ms(200));
        clock.unpause_at(t0 + ms(300));
        clock.unpause_at(t0 + ms(400));
        assert_eq!(clock.paused_total(), ms(200));
        assert_eq!(clock.elapsed_duration_at(t0 + ms(400)), ms(200));
    }

    #[test]
    fn start_resets_everything() {
        let t0 = Instant::now();
        let mut clock = Clock::starting_at(t0);
        clock.tick_at(t0 + ms(50));
        clock.pause_at(t0 + ms(60));
        clock.start_at(t0 + ms(1000));
        assert!(!clock.is_paused());
        assert_eq!(clock.paused_total(), Duration::ZERO);
        assert_eq!(clock.last_delta_duration(), Duration::ZERO);
        assert_eq!(clock.elapsed_duration_at(t0 + ms(1250)), ms(250));
    }
}
