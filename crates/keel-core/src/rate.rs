use std::collections::VecDeque;

/// Measures engine ticks per second over a sliding window.
///
/// Timestamps are engine time in seconds (pause-aware), not wall-clock
/// instants, so a paused engine does not drag the rate down. Call
/// [`record`](TickRate::record) once per running tick and
/// [`per_second`](TickRate::per_second) to read the rate.
#[derive(Debug, Clone)]
pub struct TickRate {
    stamps: VecDeque<f64>,
    window: f64,
}

impl Default for TickRate {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl TickRate {
    /// Create a meter over a window of `window` seconds.
    pub fn new(window: f64) -> Self {
        Self {
            stamps: VecDeque::new(),
            window: window.max(f64::EPSILON),
        }
    }

    /// Record a tick at engine time `now` and forget ticks older than the
    /// window.
    pub fn record(&mut self, now: f64) {
        // Time went backwards: the engine clock was restarted.
        if self.stamps.back().is_some_and(|&last| now < last) {
            self.stamps.clear();
        }
        self.stamps.push_back(now);
        let cutoff = now - self.window;
        while self.stamps.front().is_some_and(|&t| t < cutoff) {
            self.stamps.pop_front();
        }
    }

    /// Ticks per second over the window. `0.0` until two ticks are recorded.
    pub fn per_second(&self) -> f64 {
        if self.stamps.len() < 2 {
            return 0.0;
        }
        self.stamps.len() as f64 / self.window
    }

    /// Forget every recorded tick.
    pub fn reset(&mut self) {
        self.stamps.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_meter_reads_zero() {
        assert_eq!(TickRate::default().per_second(), 0.0);
    }

    #[test]
    fn single_tick_reads_zero() {
        let mut rate = TickRate::default();
        rate.record(0.5);
        assert_eq!(rate.per_second(), 0.0);
    }

    #[test]
    fn steady_ticks_give_expected_rate() {
        let mut rate = TickRate::new(1.0);
        for i in 0..30 {
            rate.record(i as f64 * 0.1);
        }
        let tps = rate.per_second();
        assert!(tps > 9.0 && tps < 12.0, "tps was {tps}");
    }

    #[test]
    fn old_ticks_pruned() {
        let mut rate = TickRate::new(1.0);
        for i in 0..5 {
            rate.record(i as f64 * 0.2);
        }
        for i in 0..3 {
            rate.record(1.0 + i as f64 * 0.3);
        }
        assert!(rate.stamps.len() <= 5, "stamps: {}", rate.stamps.len());
    }

    #[test]
    fn restart_clears_history() {
        let mut rate = TickRate::new(1.0);
        rate.record(10.0);
        rate.record(10.1);
        rate.record(0.0);
        assert_eq!(rate.stamps.len(), 1);
        assert_eq!(rate.per_second(), 0.0);
    }
}
