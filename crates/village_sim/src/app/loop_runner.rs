use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::Simulation;

use super::metrics::{LoopMetricsSnapshot, MetricsAccumulator, TickSample};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(33),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
        }
    }
}

/// Turns wall-clock frames into fixed simulation ticks.
#[derive(Debug)]
pub struct FixedStepLoop {
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    accumulator: Duration,
    last_frame_instant: Instant,
    metrics: MetricsAccumulator,
    last_metrics: LoopMetricsSnapshot,
}

impl FixedStepLoop {
    pub fn new(config: &LoopConfig, now: Instant) -> Self {
        let target_tps = config.target_tps.max(1);
        let max_frame_delta =
            normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(33));
        let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
        let metrics_log_interval =
            normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
        let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);

        info!(
            target_tps,
            max_frame_delta_ms = max_frame_delta.as_millis() as u64,
            max_ticks_per_frame,
            metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
            "loop_config"
        );

        Self {
            fixed_dt,
            max_frame_delta,
            max_ticks_per_frame,
            accumulator: Duration::ZERO,
            last_frame_instant: now,
            metrics: MetricsAccumulator::new(metrics_log_interval, now),
            last_metrics: LoopMetricsSnapshot::default(),
        }
    }

    pub fn fixed_dt(&self) -> Duration {
        self.fixed_dt
    }

    pub fn last_metrics(&self) -> LoopMetricsSnapshot {
        self.last_metrics
    }

    /// Runs the ticks paid for by the wall time since the previous frame.
    pub fn run_frame(&mut self, sim: &mut Simulation, now: Instant) -> u32 {
        let raw_frame_dt = now.saturating_duration_since(self.last_frame_instant);
        self.last_frame_instant = now;
        let ticks = self.step(sim, raw_frame_dt);

        self.metrics.record_frame(raw_frame_dt);
        if let Some(snapshot) = self.metrics.maybe_snapshot(now) {
            self.last_metrics = snapshot;
            info!(
                fps = snapshot.fps,
                tps = snapshot.tps,
                frame_time_ms = snapshot.frame_time_ms,
                sim_rate = snapshot.sim_rate,
                busy_share = snapshot.busy_share,
                moving_share = snapshot.moving_share,
                sim_time_ms = sim.now().as_millis(),
                "sim_metrics"
            );
        }
        ticks
    }

    /// Feeds one frame of `frame_dt` through the accumulator.
    pub fn step(&mut self, sim: &mut Simulation, frame_dt: Duration) -> u32 {
        let clamped_frame_dt = clamp_frame_delta(frame_dt, self.max_frame_delta);
        self.accumulator = self.accumulator.saturating_add(clamped_frame_dt);

        let step_plan = plan_sim_steps(self.accumulator, self.fixed_dt, self.max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            let before = sim.now();
            sim.tick(self.fixed_dt);
            self.metrics.record_tick(TickSample::observe(sim, before));
        }
        self.accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame = self.max_ticks_per_frame,
                "sim_clamp_triggered"
            );
        }
        step_plan.ticks_to_run
    }
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
