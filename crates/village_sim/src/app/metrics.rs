use std::time::{Duration, Instant};

use crate::time::SimTime;
use crate::Simulation;

/// Loop health over the last interval.
///
/// `sim_rate` is simulated seconds per wall second; it drops below 1 when
/// frames stall and the tick budget drops backlog. The shares are fractions
/// of ticks that ended with an action running or the agent walking.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub tps: f32,
    pub frame_time_ms: f32,
    pub sim_rate: f32,
    pub busy_share: f32,
    pub moving_share: f32,
}

/// What one tick did, read back from the simulation right after it ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct TickSample {
    pub(crate) sim_advanced: Duration,
    pub(crate) busy: bool,
    pub(crate) moving: bool,
}

impl TickSample {
    pub(crate) fn observe(sim: &Simulation, before: SimTime) -> Self {
        Self {
            sim_advanced: sim.now().saturating_since(before),
            busy: sim.busy_with().is_some(),
            moving: sim.state().agent.is_moving(),
        }
    }
}

#[derive(Debug, Default)]
struct Window {
    frames: u32,
    frame_time: Duration,
    ticks: u32,
    busy_ticks: u32,
    moving_ticks: u32,
    sim_advanced: Duration,
}

impl Window {
    fn share(&self, count: u32) -> f32 {
        if self.ticks == 0 {
            0.0
        } else {
            count as f32 / self.ticks as f32
        }
    }
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval: Duration,
    interval_start: Instant,
    window: Window,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            interval_start: now,
            window: Window::default(),
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration) {
        self.window.frames = self.window.frames.saturating_add(1);
        self.window.frame_time = self.window.frame_time.saturating_add(frame_dt);
    }

    pub(crate) fn record_tick(&mut self, sample: TickSample) {
        let window = &mut self.window;
        window.ticks = window.ticks.saturating_add(1);
        window.busy_ticks = window.busy_ticks.saturating_add(u32::from(sample.busy));
        window.moving_ticks = window.moving_ticks.saturating_add(u32::from(sample.moving));
        window.sim_advanced = window.sim_advanced.saturating_add(sample.sim_advanced);
    }

    /// Closes the window once `interval` has passed and starts a new one.
    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }
        let window = std::mem::take(&mut self.window);
        self.interval_start = now;

        let wall_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = match window.frames {
            0 => 0.0,
            frames => window.frame_time.as_secs_f32() * 1000.0 / frames as f32,
        };
        Some(LoopMetricsSnapshot {
            fps: window.frames as f32 / wall_seconds,
            tps: window.ticks as f32 / wall_seconds,
            frame_time_ms,
            sim_rate: window.sim_advanced.as_secs_f32() / wall_seconds,
            busy_share: window.share(window.busy_ticks),
            moving_share: window.share(window.moving_ticks),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ms: u64, busy: bool, moving: bool) -> TickSample {
        TickSample {
            sim_advanced: Duration::from_millis(ms),
            busy,
            moving,
        }
    }

    #[test]
    fn snapshot_reports_rates_and_shares() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1), base);

        accumulator.record_frame(Duration::from_millis(16));
        accumulator.record_frame(Duration::from_millis(16));
        accumulator.record_tick(sample(250, true, false));
        accumulator.record_tick(sample(250, true, false));
        accumulator.record_tick(sample(250, false, true));
        accumulator.record_tick(sample(250, false, false));

        let snapshot = accumulator
            .maybe_snapshot(base + Duration::from_secs(1))
            .expect("snapshot should be emitted");

        assert!((snapshot.fps - 2.0).abs() < 0.05);
        assert!((snapshot.tps - 4.0).abs() < 0.05);
        assert!((snapshot.frame_time_ms - 16.0).abs() < 0.001);
        assert!((snapshot.sim_rate - 1.0).abs() < 0.01);
        assert!((snapshot.busy_share - 0.5).abs() < 1e-6);
        assert!((snapshot.moving_share - 0.25).abs() < 1e-6);
    }

    #[test]
    fn snapshot_not_emitted_before_interval() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1), base);
        accumulator.record_frame(Duration::from_millis(16));

        assert!(accumulator
            .maybe_snapshot(base + Duration::from_millis(500))
            .is_none());
    }

    #[test]
    fn a_new_window_starts_after_each_snapshot() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1), base);
        accumulator.record_tick(sample(16, true, true));
        accumulator
            .maybe_snapshot(base + Duration::from_secs(1))
            .expect("first");
        let second = accumulator
            .maybe_snapshot(base + Duration::from_secs(2))
            .expect("second");
        assert_eq!(second, LoopMetricsSnapshot::default());
    }

    #[test]
    fn observe_reads_clock_and_motion_from_the_simulation() {
        let mut sim = Simulation::new(
            crate::world::build_village().expect("village"),
            crate::content::ContentDatabase::builtin(),
        );
        sim.apply(crate::intent::Intent::MoveTo(crate::world::TileCoord::new(5, 5)))
            .expect("move");
        let before = sim.now();
        sim.tick(Duration::from_millis(20));

        let observed = TickSample::observe(&sim, before);
        assert_eq!(observed.sim_advanced, Duration::from_millis(20));
        assert!(observed.moving);
        assert!(!observed.busy);
    }
}
