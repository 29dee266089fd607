//! # RUBBLE Demolition Loop
//!
//! ```text
//! Frame N:
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. DAMAGE                                                           │
//! │    └─ Apply up to `max_impacts_per_frame` queued impacts            │
//! │                                                                     │
//! │ 2. DEBRIS                                                           │
//! │    └─ Age debris proxies, recycle the settled ones                  │
//! │                                                                     │
//! │ 3. EVENTS                                                           │
//! │    └─ Drain the destruction bus for render / audio consumers        │
//! │                                                                     │
//! │ 4. END FRAME                                                        │
//! │    └─ Record timing                                                 │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use rubble_core::Vec3;
use rubble_destruction::{
    DamageOutcome, DestructibleId, DestructibleWorld, DestructionError, DestructionEvent,
    EventReceiver, Viewer,
};
use tracing::{debug, info, warn};

/// Target frame time for 60 FPS.
pub const TARGET_FRAME_TIME: Duration = Duration::from_micros(16_666);

/// Maximum allowed frame time before warning.
pub const MAX_FRAME_TIME: Duration = Duration::from_millis(33);

/// Configuration for the demolition loop.
#[derive(Clone, Debug)]
pub struct LoopConfig {
    /// Impacts applied per frame; the rest wait for later frames.
    pub max_impacts_per_frame: usize,
    /// Upper bound on the delta time handed to debris.
    pub max_delta_time: f32,
    /// Enable frame timing logs.
    pub enable_timing_logs: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_impacts_per_frame: 8,
            max_delta_time: 0.1,
            enable_timing_logs: false,
        }
    }
}

/// An impact waiting for the next frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueuedImpact {
    /// Destructible to damage.
    pub target: DestructibleId,
    /// Raw impact point.
    pub point: Vec3,
    /// Capsule radius.
    pub radius: f32,
    /// Where the shot came from.
    pub viewer: Viewer,
}

/// Frame statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameStats {
    /// Frame number.
    pub frame: u64,
    /// Total frame time in microseconds.
    pub total_us: u64,
    /// Damage step time in microseconds.
    pub damage_us: u64,
    /// Debris step time in microseconds.
    pub debris_us: u64,
    /// Impacts that resolved a contact.
    pub impacts_applied: u32,
    /// Impacts that found nothing to hit.
    pub impacts_missed: u32,
    /// Impacts aimed at a destructible that no longer exists.
    pub impacts_rejected: u32,
    /// Voxels separated by direct hits.
    pub voxels_hit: u32,
    /// Debris proxies launched.
    pub debris_launched: u32,
    /// Debris proxies recycled.
    pub debris_settled: u32,
    /// Events drained from the bus.
    pub events_processed: u32,
}

/// The main demolition orchestrator.
///
/// Owns the destructible world and a receiver on its event bus.
pub struct DemolitionLoop {
    world: DestructibleWorld,
    events: EventReceiver,
    pending: VecDeque<QueuedImpact>,
    last_events: Vec<DestructionEvent>,
    config: LoopConfig,
    frame_count: u64,
    stats_accumulator: FrameStatsAccumulator,
}

impl DemolitionLoop {
    /// Wraps `world` in a loop.
    #[must_use]
    pub fn new(mut world: DestructibleWorld, config: LoopConfig) -> Self {
        let events = world.events();
        Self {
            world,
            events,
            pending: VecDeque::new(),
            last_events: Vec::new(),
            config,
            frame_count: 0,
            stats_accumulator: FrameStatsAccumulator::new(),
        }
    }

    /// Queues an impact for the next frame.
    pub fn queue_impact(&mut self, impact: QueuedImpact) {
        self.pending.push_back(impact);
    }

    /// Impacts not yet applied.
    #[inline]
    #[must_use]
    pub fn pending_impacts(&self) -> usize {
        self.pending.len()
    }

    /// Runs one frame.
    pub fn step(&mut self, delta_time: f32) -> FrameStats {
        let frame_start = Instant::now();
        let mut stats = FrameStats {
            frame: self.frame_count,
            ..FrameStats::default()
        };

        // =====================================================================
        // 1. DAMAGE
        // =====================================================================
        let damage_start = Instant::now();
        for _ in 0..self.config.max_impacts_per_frame {
            let Some(impact) = self.pending.pop_front() else {
                break;
            };
            self.apply(impact, &mut stats);
        }
        stats.damage_us = damage_start.elapsed().as_micros() as u64;

        // =====================================================================
        // 2. DEBRIS
        // =====================================================================
        let debris_start = Instant::now();
        let dt = delta_time.clamp(0.0, self.config.max_delta_time);
        stats.debris_settled = self.world.tick(dt) as u32;
        stats.debris_us = debris_start.elapsed().as_micros() as u64;

        // =====================================================================
        // 3. EVENTS
        // =====================================================================
        self.last_events = self.events.drain();
        stats.events_processed = self.last_events.len() as u32;
        for event in &self.last_events {
            match event {
                DestructionEvent::Collapsed {
                    destructible,
                    voxels_launched,
                } => info!("{:?} collapsed, {} voxels launched", destructible, voxels_launched),
                DestructionEvent::Destroyed { destructible } => {
                    info!("{:?} destroyed", destructible);
                }
                _ => {}
            }
        }

        stats.total_us = frame_start.elapsed().as_micros() as u64;
        self.end_frame(stats);
        stats
    }

    /// Steps until no impacts are queued and no debris is in flight, or
    /// `max_frames` have run. Returns the number of frames stepped.
    pub fn run_until_settled(&mut self, delta_time: f32, max_frames: u64) -> u64 {
        let mut frames = 0;
        while frames < max_frames && !self.is_settled() {
            self.step(delta_time);
            frames += 1;
        }
        frames
    }

    /// Whether nothing is queued and no debris is alive.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.pending.is_empty() && self.world.pools().debris().active_count() == 0
    }

    fn apply(&mut self, impact: QueuedImpact, stats: &mut FrameStats) {
        let result = self.world.take_damage_probed(
            impact.target,
            impact.point,
            impact.radius,
            impact.viewer,
        );

        match result {
            Ok(DamageOutcome::Applied(report)) => {
                stats.impacts_applied += 1;
                stats.voxels_hit += report.voxels_hit as u32;
                stats.debris_launched += report.debris_launched as u32;
                debug!(
                    "Frame {}: {:?} hit {} voxels, {} floating",
                    self.frame_count, impact.target, report.voxels_hit, report.floating_separated
                );
            }
            Ok(DamageOutcome::NoContact) => stats.impacts_missed += 1,
            Err(DestructionError::UnknownDestructible(id)) => {
                stats.impacts_rejected += 1;
                debug!("Frame {}: impact on missing destructible {}", self.frame_count, id);
            }
            Err(err) => {
                stats.impacts_rejected += 1;
                warn!("Frame {}: impact failed: {}", self.frame_count, err);
            }
        }
    }

    fn end_frame(&mut self, stats: FrameStats) {
        self.frame_count += 1;
        self.stats_accumulator.record(stats);

        if self.config.enable_timing_logs && stats.total_us > MAX_FRAME_TIME.as_micros() as u64 {
            warn!(
                "Frame {} exceeded budget: {:.2}ms (target: {:.2}ms)",
                stats.frame,
                stats.total_us as f64 / 1000.0,
                TARGET_FRAME_TIME.as_micros() as f64 / 1000.0
            );
        }
    }

    /// Events drained during the last frame.
    #[must_use]
    pub fn last_events(&self) -> &[DestructionEvent] {
        &self.last_events
    }

    /// Returns the current frame count.
    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Returns the accumulated statistics.
    #[must_use]
    pub fn stats(&self) -> &FrameStatsAccumulator {
        &self.stats_accumulator
    }

    /// The driven world.
    #[must_use]
    pub fn world(&self) -> &DestructibleWorld {
        &self.world
    }

    /// Mutable access for spawning and removing destructibles.
    pub fn world_mut(&mut self) -> &mut DestructibleWorld {
        &mut self.world
    }
}

/// Accumulator for frame statistics.
#[derive(Clone, Debug)]
pub struct FrameStatsAccumulator {
    /// Total frames recorded.
    pub frames_recorded: u64,
    /// Sum of total frame times.
    pub total_us_sum: u64,
    /// Sum of damage step times.
    pub damage_us_sum: u64,
    /// Min frame time.
    pub min_frame_us: u64,
    /// Max frame time.
    pub max_frame_us: u64,
    /// Frames that exceeded budget.
    pub frames_over_budget: u64,
    /// Impacts that resolved a contact.
    pub impacts_applied: u64,
    /// Impacts that missed or were rejected.
    pub impacts_wasted: u64,
    /// Debris proxies launched.
    pub debris_launched: u64,
    /// Debris proxies recycled.
    pub debris_settled: u64,
}

impl FrameStatsAccumulator {
    /// Creates a new accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames_recorded: 0,
            total_us_sum: 0,
            damage_us_sum: 0,
            min_frame_us: u64::MAX,
            max_frame_us: 0,
            frames_over_budget: 0,
            impacts_applied: 0,
            impacts_wasted: 0,
            debris_launched: 0,
            debris_settled: 0,
        }
    }

    /// Records a frame's statistics.
    pub fn record(&mut self, stats: FrameStats) {
        self.frames_recorded += 1;
        self.total_us_sum += stats.total_us;
        self.damage_us_sum += stats.damage_us;
        self.min_frame_us = self.min_frame_us.min(stats.total_us);
        self.max_frame_us = self.max_frame_us.max(stats.total_us);
        self.impacts_applied += u64::from(stats.impacts_applied);
        self.impacts_wasted += u64::from(stats.impacts_missed + stats.impacts_rejected);
        self.debris_launched += u64::from(stats.debris_launched);
        self.debris_settled += u64::from(stats.debris_settled);

        if stats.total_us > TARGET_FRAME_TIME.as_micros() as u64 {
            self.frames_over_budget += 1;
        }
    }

    /// Returns average frame time in milliseconds.
    #[must_use]
    pub fn avg_frame_ms(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        (self.total_us_sum as f64 / self.frames_recorded as f64) / 1000.0
    }

    /// Returns average damage step time in milliseconds.
    #[must_use]
    pub fn avg_damage_ms(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        (self.damage_us_sum as f64 / self.frames_recorded as f64) / 1000.0
    }

    /// Returns the percentage of frames over budget.
    #[must_use]
    pub fn over_budget_ratio(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        self.frames_over_budget as f64 / self.frames_recorded as f64
    }

    /// Logs a summary of the statistics.
    pub fn log_summary(&self) {
        info!("=== FRAME STATISTICS ===");
        info!("Frames recorded:  {}", self.frames_recorded);
        info!("Average frame:    {:.3} ms", self.avg_frame_ms());
        info!("Average damage:   {:.3} ms", self.avg_damage_ms());
        if self.frames_recorded > 0 {
            info!("Min frame:        {:.3} ms", self.min_frame_us as f64 / 1000.0);
            info!("Max frame:        {:.3} ms", self.max_frame_us as f64 / 1000.0);
        }
        info!(
            "Over budget:      {} frames ({:.1}%)",
            self.frames_over_budget,
            self.over_budget_ratio() * 100.0
        );
        info!(
            "Impacts:          {} applied, {} wasted",
            self.impacts_applied, self.impacts_wasted
        );
        info!(
            "Debris:           {} launched, {} settled",
            self.debris_launched, self.debris_settled
        );
    }
}

impl Default for FrameStatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rubble_destruction::{DestructionConfig, LatticeBaker};

    fn world_with_slab() -> (DestructibleWorld, DestructibleId) {
        let mut world = DestructibleWorld::new(DestructionConfig::default()).unwrap();
        let id = world
            .spawn(LatticeBaker::new([3, 1, 3]).bake_box(|[_, _, z]| z == 0))
            .unwrap();
        (world, id)
    }

    fn top_hit(target: DestructibleId) -> QueuedImpact {
        let point = Vec3::new(1.5, 1.0, 1.5);
        QueuedImpact {
            target,
            point,
            radius: 0.1,
            viewer: Viewer::looking_at(point + Vec3::Y * 4.0, point),
        }
    }

    #[test]
    fn test_loop_creation() {
        let (world, _) = world_with_slab();
        let demolition = DemolitionLoop::new(world, LoopConfig::default());
        assert_eq!(demolition.frame_count(), 0);
        assert!(demolition.is_settled());
    }

    #[test]
    fn test_step_applies_queued_impact() {
        let (world, id) = world_with_slab();
        let mut demolition = DemolitionLoop::new(world, LoopConfig::default());
        demolition.queue_impact(top_hit(id));

        let stats = demolition.step(1.0 / 60.0);
        assert_eq!(stats.frame, 0);
        assert_eq!(stats.impacts_applied, 1);
        assert_eq!(stats.voxels_hit, 1);
        assert_eq!(stats.debris_launched, 1);
        assert_eq!(demolition.pending_impacts(), 0);
        assert_eq!(demolition.world().get(id).unwrap().remaining(), 8);
        assert!(demolition
            .last_events()
            .iter()
            .any(|e| matches!(e, DestructionEvent::DebrisLaunched { .. })));
    }

    #[test]
    fn test_impacts_beyond_budget_wait() {
        let (world, id) = world_with_slab();
        let config = LoopConfig {
            max_impacts_per_frame: 1,
            ..LoopConfig::default()
        };
        let mut demolition = DemolitionLoop::new(world, config);
        demolition.queue_impact(top_hit(id));
        demolition.queue_impact(top_hit(id));

        let first = demolition.step(0.0);
        assert_eq!(first.impacts_applied, 1);
        assert_eq!(demolition.pending_impacts(), 1);

        // Same spot again: the voxel is gone, the floor of the hole is empty
        let second = demolition.step(0.0);
        assert_eq!(second.impacts_applied + second.impacts_missed, 1);
        assert_eq!(demolition.pending_impacts(), 0);
    }

    #[test]
    fn test_unknown_target_is_rejected() {
        let (world, _) = world_with_slab();
        let mut demolition = DemolitionLoop::new(world, LoopConfig::default());
        demolition.queue_impact(top_hit(DestructibleId::new(99)));

        let stats = demolition.step(0.0);
        assert_eq!(stats.impacts_rejected, 1);
        assert_eq!(demolition.stats().impacts_wasted, 1);
    }

    #[test]
    fn test_debris_settles_over_frames() {
        let (world, id) = world_with_slab();
        let lifetime = world.config().debris_lifetime_secs;
        let mut demolition = DemolitionLoop::new(world, LoopConfig::default());
        demolition.queue_impact(top_hit(id));

        let frames = demolition.run_until_settled(0.1, 1_000);
        assert!(demolition.is_settled());
        assert!(frames as f32 >= lifetime / 0.1);
        assert_eq!(demolition.stats().debris_launched, 1);
        assert_eq!(demolition.stats().debris_settled, 1);
        assert_eq!(demolition.frame_count(), frames);
    }

    #[test]
    fn test_delta_time_is_clamped() {
        let (world, id) = world_with_slab();
        let mut demolition = DemolitionLoop::new(world, LoopConfig::default());
        demolition.queue_impact(top_hit(id));

        // A 10 s hitch ages debris by at most `max_delta_time`
        let stats = demolition.step(10.0);
        assert_eq!(stats.debris_settled, 0);
        assert_eq!(demolition.world().pools().debris().active_count(), 1);
    }
}
