//! # Damage Processing
//!
//! Turns an impact into separated voxels.
//!
//! 1. Resolve the contact with a short probe along the viewer's forward.
//! 2. Collect exposed voxels inside the capsule from the eye to the contact.
//! 3. For each hit: expose its attached neighbors, separate it, launch it.
//!
//! Exposure runs before separation because it walks the hit voxel's
//! neighbor links.
//!
//! Launch magnitudes come from a seeded `ChaCha8Rng`, so the same seed and
//! the same impacts give the same debris.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rubble_core::Vec3;
use tracing::trace;

use crate::config::{DestructionConfig, ImpulseRange};
use crate::destructible::DestructibleId;
use crate::events::{DestructionEvent, EventSender};
use crate::face::Face;
use crate::grid::{ProxyLink, VoxelGrid, VoxelId};
use crate::physics::{LayerMask, SpatialQuery, Viewer};
use crate::pool::{ProxyOwner, ProxyPools};
use crate::separation::separate;

/// One player impact.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Impact {
    /// Raw world-space impact point.
    pub point: Vec3,
    /// Damage capsule radius.
    pub radius: f32,
    /// Where the impact came from.
    pub viewer: Viewer,
}

/// What a damage pass did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DamageReport {
    /// Resolved contact point.
    pub contact: Vec3,
    /// Voxels separated directly by the capsule.
    pub voxels_hit: usize,
    /// Neighbors exposed by those separations.
    pub voxels_exposed: usize,
    /// Voxels separated because they lost their anchors.
    pub floating_separated: usize,
    /// Connected clusters among the floating voxels.
    pub floating_islands: usize,
    /// Debris proxies checked out.
    pub debris_launched: usize,
    /// Checkouts skipped because a pool was exhausted.
    pub pool_misses: usize,
    /// Visible proxies bound at the end of the pass to exposed voxels that
    /// had none.
    pub proxies_rebound: usize,
    /// Too little structure remained and every voxel was launched.
    pub collapsed: bool,
    /// No voxels remain.
    pub destroyed: bool,
    /// Faces in the rebuilt mesh.
    pub faces_drawn: usize,
}

/// Result of [`crate::destructible::Destructible::take_damage`].
#[derive(Clone, Debug, PartialEq)]
pub enum DamageOutcome {
    /// The impact resolved to no contact. Nothing changed.
    NoContact,
    /// The pass ran.
    Applied(DamageReport),
}

impl DamageOutcome {
    /// Report of an applied pass.
    #[must_use]
    pub fn report(&self) -> Option<&DamageReport> {
        match self {
            Self::NoContact => None,
            Self::Applied(report) => Some(report),
        }
    }

    /// Whether the impact missed.
    #[must_use]
    pub fn is_no_contact(&self) -> bool {
        matches!(self, Self::NoContact)
    }
}

/// Where a pass sends proxies, events and counts.
pub(crate) struct PassSink<'a> {
    pub destructible: DestructibleId,
    pub pools: &'a mut ProxyPools,
    pub events: Option<&'a EventSender>,
    pub report: DamageReport,
}

impl PassSink<'_> {
    pub fn emit(&self, event: DestructionEvent) {
        if let Some(events) = self.events {
            events.send(event);
        }
    }

    fn owner(&self, voxel: VoxelId) -> ProxyOwner {
        ProxyOwner {
            destructible: self.destructible,
            voxel,
        }
    }
}

/// Contact resolution and per-voxel damage. Shared by every destructible in
/// a world so one seed drives all launches.
#[derive(Debug)]
pub struct DamageProcessor {
    rng: ChaCha8Rng,
    probe_distance: f32,
    forward_impulse: ImpulseRange,
    lateral_impulse: ImpulseRange,
    vertical_impulse: ImpulseRange,
}

impl DamageProcessor {
    /// Processor seeded from settings.
    #[must_use]
    pub fn new(config: &DestructionConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            probe_distance: config.probe_distance,
            forward_impulse: config.forward_impulse,
            lateral_impulse: config.lateral_impulse,
            vertical_impulse: config.vertical_impulse,
        }
    }

    /// Finds the surface point an impact lands on.
    ///
    /// Probes `probe_distance` along the viewer's forward, centered on the
    /// raw point. On a miss the raw point is used only if it lies within one
    /// voxel of the grid's bounds.
    pub fn resolve_contact(
        &self,
        grid: &VoxelGrid,
        impact: &Impact,
        spatial: &dyn SpatialQuery,
    ) -> Option<Vec3> {
        let forward = impact.viewer.forward;
        let origin = impact.point - forward * (self.probe_distance * 0.5);
        if let Some(contact) = spatial.raycast_first(
            origin,
            forward,
            self.probe_distance,
            LayerMask::DESTRUCTIBLE_SURFACE,
        ) {
            return Some(contact.point);
        }

        let reach = grid.voxel_size() * grid.transform().scale;
        grid.bounds()
            .expanded(reach)
            .contains(impact.point)
            .then_some(impact.point)
    }

    /// Exposes, separates and launches every capsule hit that belongs to
    /// this grid and is still attached.
    pub(crate) fn apply_hits(
        &mut self,
        grid: &mut VoxelGrid,
        impact: &Impact,
        contact: Vec3,
        spatial: &dyn SpatialQuery,
        sink: &mut PassSink<'_>,
    ) {
        let hits = spatial.overlap_capsule(
            impact.viewer.eye,
            contact,
            impact.radius,
            LayerMask::EXPOSED_VOXEL,
        );

        for hit in hits {
            if hit.destructible != sink.destructible || !grid.is_attached(hit.voxel) {
                continue;
            }
            Self::expose_neighbors(grid, hit.voxel, sink);
            separate(grid, hit.voxel, sink.pools);
            let direction = grid[hit.voxel].launch_direction;
            self.launch(grid, hit.voxel, direction, &impact.viewer, sink);
            sink.report.voxels_hit += 1;
        }
    }

    /// Reveals the faces of `id`'s attached neighbors that were covered by
    /// `id`, exposing neighbors that were hidden.
    pub(crate) fn expose_neighbors(grid: &mut VoxelGrid, id: VoxelId, sink: &mut PassSink<'_>) {
        for face in Face::ALL {
            let Some(n) = grid[id].neighbor(face) else {
                continue;
            };
            if grid[n].is_separated {
                continue;
            }

            grid[n].draw_faces.set(face.opposite(), true);
            if grid[n].is_exposed {
                continue;
            }
            grid[n].is_exposed = true;
            sink.report.voxels_exposed += 1;
            trace!("Voxel {:?} exposed", n);

            let Some(transform) = grid.world_transform(n) else {
                continue;
            };
            let owner = sink.owner(n);
            match sink.pools.checkout_visible(owner, transform, grid[n].color) {
                Some(handle) => grid[n].proxy = Some(ProxyLink::Visible(handle)),
                None => sink.report.pool_misses += 1,
            }
            sink.emit(DestructionEvent::VoxelExposed {
                destructible: sink.destructible,
                voxel: n,
            });
        }
    }

    /// Checks out a debris proxy for a separated voxel and pushes it along
    /// `direction` blended with the viewer's forward.
    pub(crate) fn launch(
        &mut self,
        grid: &mut VoxelGrid,
        id: VoxelId,
        direction: Vec3,
        viewer: &Viewer,
        sink: &mut PassSink<'_>,
    ) {
        let impulse = self.impulse(direction, viewer);
        let Some(transform) = grid.world_transform(id) else {
            return;
        };
        let owner = sink.owner(id);

        match sink.pools.checkout_debris(owner, transform, grid[id].color, impulse) {
            Some(handle) => {
                grid[id].proxy = Some(ProxyLink::Debris(handle));
                sink.report.debris_launched += 1;
                trace!("Voxel {:?} launched with {:?}", id, impulse);
                sink.emit(DestructionEvent::DebrisLaunched {
                    destructible: sink.destructible,
                    voxel: id,
                    position: transform.position,
                    impulse,
                });
            }
            None => sink.report.pool_misses += 1,
        }
    }

    /// Launch impulse: a forward push along `direction + viewer.forward`,
    /// a lateral push of random sign and a vertical push of random sign.
    pub fn impulse(&mut self, direction: Vec3, viewer: &Viewer) -> Vec3 {
        let mut forward = (direction + viewer.forward).normalize_or_zero();
        if forward == Vec3::ZERO {
            forward = viewer.forward;
        }
        let lateral = forward.cross(viewer.up).normalize_or_zero();

        let forward_push = self.sample(self.forward_impulse);
        let lateral_push = self.sample(self.lateral_impulse) * self.sign();
        let vertical_push = self.sample(self.vertical_impulse) * self.sign();

        forward * forward_push + lateral * lateral_push + viewer.up * vertical_push
    }

    fn sample(&mut self, range: ImpulseRange) -> f32 {
        self.rng.gen_range(range.min..=range.max)
    }

    fn sign(&mut self) -> f32 {
        if self.rng.gen::<bool>() {
            1.0
        } else {
            -1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bake::LatticeBaker;
    use crate::physics::VoxelProbe;

    fn viewer() -> Viewer {
        Viewer::new(Vec3::new(0.5, 0.5, -5.0), Vec3::Z)
    }

    #[test]
    fn test_impulse_magnitudes_within_ranges() {
        let mut processor = DamageProcessor::new(&DestructionConfig::default());
        let viewer = viewer();

        for _ in 0..64 {
            let impulse = processor.impulse(Vec3::X, &viewer);
            let forward = (Vec3::X + Vec3::Z).normalize_or_zero();
            let lateral = forward.cross(Vec3::Y).normalize_or_zero();

            let f = impulse.dot(forward);
            let l = impulse.dot(lateral).abs();
            let v = impulse.y.abs();
            assert!((199.9..=250.1).contains(&f), "forward {f}");
            assert!((149.9..=200.1).contains(&l), "lateral {l}");
            assert!((99.9..=150.1).contains(&v), "vertical {v}");
        }
    }

    #[test]
    fn test_same_seed_same_impulses() {
        let config = DestructionConfig::default();
        let mut a = DamageProcessor::new(&config);
        let mut b = DamageProcessor::new(&config);
        for _ in 0..8 {
            assert_eq!(a.impulse(Vec3::X, &viewer()), b.impulse(Vec3::X, &viewer()));
        }
    }

    #[test]
    fn test_opposed_direction_falls_back_to_viewer_forward() {
        let config = DestructionConfig {
            lateral_impulse: ImpulseRange::new(0.0, 0.0),
            vertical_impulse: ImpulseRange::new(0.0, 0.0),
            ..DestructionConfig::default()
        };
        let mut processor = DamageProcessor::new(&config);
        let impulse = processor.impulse(-Vec3::Z, &viewer());
        assert!(impulse.z >= 200.0);
        assert!(impulse.x.abs() < 1e-3);
    }

    #[test]
    fn test_contact_falls_back_near_bounds_only() {
        let grid =
            VoxelGrid::from_bake(&LatticeBaker::new([1, 1, 1]).bake_box(|_| true)).unwrap();
        let processor = DamageProcessor::new(&DestructionConfig::default());
        let empty = VoxelProbe::new();

        let near = Impact {
            point: Vec3::new(0.5, 0.5, -0.9),
            radius: 0.1,
            viewer: viewer(),
        };
        assert_eq!(processor.resolve_contact(&grid, &near, &empty), Some(near.point));

        let far = Impact {
            point: Vec3::new(0.5, 0.5, -3.0),
            ..near
        };
        assert_eq!(processor.resolve_contact(&grid, &far, &empty), None);
    }
}
