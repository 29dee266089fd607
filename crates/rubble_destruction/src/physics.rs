//! # Spatial Queries
//!
//! The engine does not own a physics world. Contact resolution and the
//! damage capsule go through [`SpatialQuery`], which the host implements on
//! top of its collision engine.
//!
//! [`VoxelProbe`] is a brute-force implementation over axis-aligned boxes of
//! the active visible proxies. It backs the tests, benches and the headless
//! driver.

use rubble_core::{closest_point_on_segment, Aabb, ProxyPool, Vec3};

use crate::destructible::DestructibleId;
use crate::grid::VoxelId;
use crate::pool::VisibleVoxelProxy;

/// Collision layer filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayerMask(u32);

impl LayerMask {
    /// Matches nothing.
    pub const NONE: Self = Self(0);

    /// Surfaces of destructible objects, used to resolve the contact point.
    pub const DESTRUCTIBLE_SURFACE: Self = Self(1 << 0);

    /// Exposed voxel proxies, used by the damage capsule.
    pub const EXPOSED_VOXEL: Self = Self(1 << 1);

    /// Matches every layer.
    pub const ALL: Self = Self(u32::MAX);

    /// Raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether any layer is shared.
    #[inline]
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl std::ops::BitOr for LayerMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// The voxel a proxy collider belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProxyHit {
    /// Owning destructible.
    pub destructible: DestructibleId,
    /// Voxel within it.
    pub voxel: VoxelId,
}

/// First surface a ray hit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    /// World-space hit point.
    pub point: Vec3,
    /// Distance from the ray origin.
    pub distance: f32,
    /// Proxy that was hit, if the collider belongs to one.
    pub hit: Option<ProxyHit>,
}

/// Where the player is looking from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewer {
    /// Eye position.
    pub eye: Vec3,
    /// Unit look direction.
    pub forward: Vec3,
    /// Unit up direction.
    pub up: Vec3,
}

impl Viewer {
    /// Viewer at `eye` looking along `forward`, with world up.
    #[must_use]
    pub fn new(eye: Vec3, forward: Vec3) -> Self {
        Self {
            eye,
            forward: forward.normalize_or_zero(),
            up: Vec3::Y,
        }
    }

    /// Viewer at `eye` looking at `target`.
    #[must_use]
    pub fn looking_at(eye: Vec3, target: Vec3) -> Self {
        Self::new(eye, target - eye)
    }
}

/// Collision queries the damage pass needs from the host.
pub trait SpatialQuery {
    /// First collider on `layers` hit by the ray within `max_distance`.
    /// `direction` is unit length.
    fn raycast_first(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        layers: LayerMask,
    ) -> Option<Contact>;

    /// Every proxy on `layers` within `radius` of the segment `a..b`,
    /// nearest to `a` first.
    fn overlap_capsule(&self, a: Vec3, b: Vec3, radius: f32, layers: LayerMask) -> Vec<ProxyHit>;
}

// =============================================================================
// VOXEL PROBE
// =============================================================================

/// One box in a [`VoxelProbe`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProbeCollider {
    /// World-space box.
    pub aabb: Aabb,
    /// Layers the box is on.
    pub layers: LayerMask,
    /// Proxy the box stands for.
    pub hit: ProxyHit,
}

/// Brute-force [`SpatialQuery`] over a snapshot of boxes.
#[derive(Clone, Debug, Default)]
pub struct VoxelProbe {
    colliders: Vec<ProbeCollider>,
}

/// Rounds of alternating projection used to find the segment-box distance.
const CAPSULE_REFINE_STEPS: usize = 4;

impl VoxelProbe {
    /// Empty probe.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every collider, keeping the allocation.
    pub fn clear(&mut self) {
        self.colliders.clear();
    }

    /// Adds one box.
    pub fn insert(&mut self, collider: ProbeCollider) {
        self.colliders.push(collider);
    }

    /// Number of boxes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    /// Whether the probe has no boxes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    /// Replaces the snapshot with one box per active visible proxy, on both
    /// the surface and exposed-voxel layers.
    pub fn snapshot(&mut self, visible: &ProxyPool<VisibleVoxelProxy>) {
        self.clear();
        for (_, proxy) in visible.iter_active() {
            let Some(owner) = proxy.owner else {
                continue;
            };
            let half = Vec3::splat(proxy.transform.scale * 0.5);
            self.insert(ProbeCollider {
                aabb: Aabb::from_center(proxy.transform.position, half),
                layers: LayerMask::DESTRUCTIBLE_SURFACE | LayerMask::EXPOSED_VOXEL,
                hit: ProxyHit {
                    destructible: owner.destructible,
                    voxel: owner.voxel,
                },
            });
        }
    }
}

impl SpatialQuery for VoxelProbe {
    fn raycast_first(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        layers: LayerMask,
    ) -> Option<Contact> {
        self.colliders
            .iter()
            .filter(|c| c.layers.intersects(layers))
            .filter_map(|c| {
                let t = c.aabb.ray_hit(origin, direction, max_distance)?;
                Some(Contact {
                    point: origin + direction * t,
                    distance: t,
                    hit: Some(c.hit),
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    fn overlap_capsule(&self, a: Vec3, b: Vec3, radius: f32, layers: LayerMask) -> Vec<ProxyHit> {
        let mut hits: Vec<(f32, ProxyHit)> = self
            .colliders
            .iter()
            .filter(|c| c.layers.intersects(layers))
            .filter(|c| segment_box_distance(a, b, &c.aabb) <= radius)
            .map(|c| (c.aabb.center().distance_squared(a), c.hit))
            .collect();
        hits.sort_by(|x, y| x.0.total_cmp(&y.0));
        hits.into_iter().map(|(_, hit)| hit).collect()
    }
}

/// Distance between the segment `a..b` and a box. Zero if they intersect.
fn segment_box_distance(a: Vec3, b: Vec3, aabb: &Aabb) -> f32 {
    let ab = b - a;
    let length = ab.length();
    if length > 0.0 && aabb.ray_hit(a, ab / length, length).is_some() {
        return 0.0;
    }
    if aabb.contains(a) {
        return 0.0;
    }

    let mut on_segment = closest_point_on_segment(a, b, aabb.center());
    for _ in 0..CAPSULE_REFINE_STEPS {
        on_segment = closest_point_on_segment(a, b, aabb.closest_point(on_segment));
    }
    on_segment.distance(aabb.closest_point(on_segment))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(at: Vec3, voxel: u32) -> ProbeCollider {
        ProbeCollider {
            aabb: Aabb::new(at, at + Vec3::ONE),
            layers: LayerMask::DESTRUCTIBLE_SURFACE | LayerMask::EXPOSED_VOXEL,
            hit: ProxyHit {
                destructible: DestructibleId::new(0),
                voxel: VoxelId::new(voxel),
            },
        }
    }

    #[test]
    fn test_layer_mask() {
        let both = LayerMask::DESTRUCTIBLE_SURFACE | LayerMask::EXPOSED_VOXEL;
        assert!(both.intersects(LayerMask::EXPOSED_VOXEL));
        assert!(!LayerMask::DESTRUCTIBLE_SURFACE.intersects(LayerMask::EXPOSED_VOXEL));
        assert!(!LayerMask::NONE.intersects(LayerMask::ALL));
        assert_eq!(both.bits(), 0b11);
    }

    #[test]
    fn test_raycast_returns_nearest() {
        let mut probe = VoxelProbe::new();
        probe.insert(unit_box(Vec3::new(0.0, 0.0, 5.0), 1));
        probe.insert(unit_box(Vec3::new(0.0, 0.0, 2.0), 2));

        let contact = probe
            .raycast_first(Vec3::new(0.5, 0.5, 0.0), Vec3::Z, 10.0, LayerMask::ALL)
            .unwrap();
        assert_eq!(contact.hit.unwrap().voxel, VoxelId::new(2));
        assert!((contact.distance - 2.0).abs() < 1e-5);
        assert!((contact.point.z - 2.0).abs() < 1e-5);

        assert!(probe
            .raycast_first(Vec3::new(0.5, 0.5, 0.0), Vec3::Z, 1.0, LayerMask::ALL)
            .is_none());
        assert!(probe
            .raycast_first(Vec3::new(0.5, 0.5, 0.0), Vec3::Z, 10.0, LayerMask::NONE)
            .is_none());
    }

    #[test]
    fn test_capsule_overlap_respects_radius() {
        let mut probe = VoxelProbe::new();
        probe.insert(unit_box(Vec3::new(0.0, 0.0, 0.0), 0));
        probe.insert(unit_box(Vec3::new(3.0, 0.0, 0.0), 1));
        probe.insert(unit_box(Vec3::new(1.5, 3.0, 0.0), 2));

        // Segment along y = 0.5 just outside the first box, in front of both
        let a = Vec3::new(-1.0, 0.5, -0.5);
        let b = Vec3::new(5.0, 0.5, -0.5);
        let hits = probe.overlap_capsule(a, b, 0.6, LayerMask::EXPOSED_VOXEL);
        assert_eq!(
            hits.iter().map(|h| h.voxel).collect::<Vec<_>>(),
            vec![VoxelId::new(0), VoxelId::new(1)]
        );

        assert!(probe.overlap_capsule(a, b, 0.4, LayerMask::EXPOSED_VOXEL).is_empty());
    }

    #[test]
    fn test_segment_through_box_is_zero_distance() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let d = segment_box_distance(Vec3::new(-1.0, 0.5, 0.5), Vec3::new(2.0, 0.5, 0.5), &aabb);
        assert_eq!(d, 0.0);
        let d = segment_box_distance(Vec3::new(-1.0, 2.0, 0.5), Vec3::new(2.0, 2.0, 0.5), &aabb);
        assert!((d - 1.0).abs() < 1e-5);
    }
}
