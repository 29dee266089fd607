//! # Voxel Proxy Pools
//!
//! The two pools every destructible in a world draws from: render proxies
//! for exposed voxels and physics proxies for separated debris.
//!
//! Exhaustion is not an error. The caller gets `None`, skips the visual or
//! physical effect, and the grid state stays correct.

use rubble_core::{PoolHandle, Poolable, ProxyPool, Transform, Vec3};
use tracing::{debug, trace};

use crate::config::DestructionConfig;
use crate::destructible::DestructibleId;
use crate::grid::VoxelId;

/// Which voxel a proxy is standing in for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProxyOwner {
    /// Owning destructible.
    pub destructible: DestructibleId,
    /// Voxel within it.
    pub voxel: VoxelId,
}

/// Render proxy for an exposed, attached voxel.
#[derive(Clone, Debug, Default)]
pub struct VisibleVoxelProxy {
    /// Bound voxel, `None` while pooled.
    pub owner: Option<ProxyOwner>,
    /// World transform.
    pub transform: Transform,
    /// RGBA albedo.
    pub color: [u8; 4],
}

impl Poolable for VisibleVoxelProxy {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Physics proxy for a separated voxel.
#[derive(Clone, Debug, Default)]
pub struct DebrisVoxelProxy {
    /// Voxel this debris came from, `None` while pooled.
    pub owner: Option<ProxyOwner>,
    /// World transform at launch.
    pub transform: Transform,
    /// RGBA albedo.
    pub color: [u8; 4],
    /// Impulse to hand to the rigid body.
    pub impulse: Vec3,
    /// Seconds until the debris settles and returns to the pool.
    pub lifetime_remaining: f32,
}

impl Poolable for DebrisVoxelProxy {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Debris proxy returned to the pool by [`ProxyPools::tick`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SettledDebris {
    /// Handle that was released.
    pub handle: PoolHandle,
    /// Voxel the debris came from.
    pub owner: ProxyOwner,
}

/// Visible and debris pools shared by a world.
#[derive(Debug)]
pub struct ProxyPools {
    visible: ProxyPool<VisibleVoxelProxy>,
    debris: ProxyPool<DebrisVoxelProxy>,
    debris_lifetime: f32,
    expired: Vec<PoolHandle>,
}

impl ProxyPools {
    /// Pools with fixed capacities. Debris lives `debris_lifetime` seconds.
    #[must_use]
    pub fn new(visible_capacity: usize, debris_capacity: usize, debris_lifetime: f32) -> Self {
        Self {
            visible: ProxyPool::new(visible_capacity),
            debris: ProxyPool::new(debris_capacity),
            debris_lifetime,
            expired: Vec::new(),
        }
    }

    /// Pools sized from settings.
    #[must_use]
    pub fn from_config(config: &DestructionConfig) -> Self {
        Self::new(
            config.visible_pool_capacity,
            config.debris_pool_capacity,
            config.debris_lifetime_secs,
        )
    }

    /// Visible proxy pool.
    #[inline]
    #[must_use]
    pub const fn visible(&self) -> &ProxyPool<VisibleVoxelProxy> {
        &self.visible
    }

    /// Debris proxy pool.
    #[inline]
    #[must_use]
    pub const fn debris(&self) -> &ProxyPool<DebrisVoxelProxy> {
        &self.debris
    }

    /// Binds a visible proxy to `owner`. `None` when the pool is exhausted.
    pub fn checkout_visible(
        &mut self,
        owner: ProxyOwner,
        transform: Transform,
        color: [u8; 4],
    ) -> Option<PoolHandle> {
        let Some((handle, proxy)) = self.visible.checkout() else {
            debug!("Visible proxy pool exhausted; skipping {:?}", owner);
            return None;
        };
        proxy.owner = Some(owner);
        proxy.transform = transform;
        proxy.color = color;
        trace!("Visible proxy {} -> {:?}", handle.index(), owner);
        Some(handle)
    }

    /// Binds a debris proxy to `owner` with a launch impulse. `None` when
    /// the pool is exhausted.
    pub fn checkout_debris(
        &mut self,
        owner: ProxyOwner,
        transform: Transform,
        color: [u8; 4],
        impulse: Vec3,
    ) -> Option<PoolHandle> {
        let Some((handle, proxy)) = self.debris.checkout() else {
            debug!("Debris proxy pool exhausted; skipping {:?}", owner);
            return None;
        };
        proxy.owner = Some(owner);
        proxy.transform = transform;
        proxy.color = color;
        proxy.impulse = impulse;
        proxy.lifetime_remaining = self.debris_lifetime;
        trace!("Debris proxy {} -> {:?}", handle.index(), owner);
        Some(handle)
    }

    /// Returns a visible proxy. `false` for stale handles.
    pub fn release_visible(&mut self, handle: PoolHandle) -> bool {
        self.visible.release(handle)
    }

    /// Returns a debris proxy. `false` for stale handles.
    pub fn release_debris(&mut self, handle: PoolHandle) -> bool {
        self.debris.release(handle)
    }

    /// Ages every active debris proxy by `dt` seconds and releases the ones
    /// whose lifetime ran out.
    pub fn tick(&mut self, dt: f32) -> Vec<SettledDebris> {
        for (handle, proxy) in self.debris.iter_active_mut() {
            proxy.lifetime_remaining -= dt;
            if proxy.lifetime_remaining <= 0.0 {
                self.expired.push(handle);
            }
        }

        let mut settled = Vec::with_capacity(self.expired.len());
        for handle in self.expired.drain(..) {
            let owner = self.debris.get(handle).and_then(|proxy| proxy.owner);
            if self.debris.release(handle) {
                if let Some(owner) = owner {
                    settled.push(SettledDebris { handle, owner });
                }
            }
        }
        settled
    }

    /// Returns every proxy to its pool.
    pub fn clear(&mut self) {
        self.visible.clear();
        self.debris.clear();
    }
}
