//! Tick timing diagnostics
//!
//! Keeps the last N tick durations and reports average and max. Purely
//! informational; nothing in the simulation reacts to these numbers.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::game::constants::tick::PERFORMANCE_WINDOW;

/// Summary of the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickTiming {
    pub average: Duration,
    pub max: Duration,
    pub samples: usize,
}

/// Rolling window of tick durations
#[derive(Debug)]
pub struct PerformanceMonitor {
    tick_durations: VecDeque<Duration>,
    max_samples: usize,
    /// Tick period the loop is aiming for
    budget: Duration,
    tick_start: Option<Instant>,
}

impl PerformanceMonitor {
    pub fn new(budget: Duration) -> Self {
        Self::with_window(budget, PERFORMANCE_WINDOW)
    }

    pub fn with_window(budget: Duration, max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            tick_durations: VecDeque::with_capacity(max_samples),
            max_samples,
            budget,
            tick_start: None,
        }
    }

    /// Start timing a tick
    pub fn tick_start(&mut self) {
        self.tick_start = Some(Instant::now());
    }

    /// End timing a tick and record the duration
    pub fn tick_end(&mut self) -> Option<Duration> {
        let duration = self.tick_start.take()?.elapsed();
        self.record_tick(duration);
        Some(duration)
    }

    /// Record a tick duration
    pub fn record_tick(&mut self, duration: Duration) {
        self.tick_durations.push_back(duration);
        while self.tick_durations.len() > self.max_samples {
            self.tick_durations.pop_front();
        }
        if duration > self.budget {
            tracing::warn!(
                "Slow tick: {:.2}ms (budget {:.2}ms)",
                duration.as_secs_f64() * 1000.0,
                self.budget.as_secs_f64() * 1000.0
            );
        }
    }

    /// Get average tick duration
    pub fn average_tick_duration(&self) -> Duration {
        if self.tick_durations.is_empty() {
            return Duration::ZERO;
        }
        let sum: Duration = self.tick_durations.iter().sum();
        sum / self.tick_durations.len() as u32
    }

    /// Most recent recorded tick
    pub fn last_tick(&self) -> Option<Duration> {
        self.tick_durations.back().copied()
    }

    pub fn max_tick_duration(&self) -> Duration {
        self.tick_durations.iter().copied().max().unwrap_or(Duration::ZERO)
    }

    pub fn timing(&self) -> TickTiming {
        TickTiming {
            average: self.average_tick_duration(),
            max: self.max_tick_duration(),
            samples: self.tick_durations.len(),
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_performance_monitor_new() {
        let monitor = PerformanceMonitor::new(ms(100));
        assert_eq!(monitor.timing(), TickTiming::default());
        assert_eq!(monitor.budget(), ms(100));
    }

    #[test]
    fn test_average_and_max() {
        let mut monitor = PerformanceMonitor::new(ms(100));
        for n in [2, 4, 6, 8] {
            monitor.record_tick(ms(n));
        }
        let timing = monitor.timing();
        assert_eq!(timing.average, ms(5));
        assert_eq!(timing.max, ms(8));
        assert_eq!(timing.samples, 4);
    }

    #[test]
    fn test_window_drops_old_samples() {
        let mut monitor = PerformanceMonitor::with_window(ms(100), 50);
        monitor.record_tick(ms(90));
        for _ in 0..50 {
            monitor.record_tick(ms(1));
        }
        let timing = monitor.timing();
        assert_eq!(timing.samples, 50);
        assert_eq!(timing.max, ms(1));
    }

    #[test]
    fn test_tick_timing() {
        let mut monitor = PerformanceMonitor::new(ms(100));
        assert!(monitor.tick_end().is_none());

        monitor.tick_start();
        std::thread::sleep(ms(2));
        let elapsed = monitor.tick_end().unwrap();
        assert!(elapsed >= ms(2));
        assert_eq!(monitor.timing().samples, 1);
    }
}
