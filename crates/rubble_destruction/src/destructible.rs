//! # Destructible
//!
//! One voxelized object. Owns its grid, render mesh and flood-fill scratch;
//! borrows pools, the spatial query and the damage processor per pass.
//!
//! A pass runs damage, then the connectivity policy, then the mesh rebuild:
//!
//! - If fewer than `min_voxel_count` voxels would stay connected, every
//!   remaining voxel is launched along the viewer's forward and the object
//!   is destroyed.
//! - Otherwise each floating voxel is launched along its own direction and
//!   the bounds are refit.

use rubble_core::PoolHandle;
use tracing::{debug, info};

use crate::bake::BakeData;
use crate::config::DestructionConfig;
use crate::connectivity::ConnectivityAnalyzer;
use crate::damage::{DamageOutcome, DamageProcessor, Impact, PassSink};
use crate::error::ConfigurationError;
use crate::events::{DestructionEvent, EventSender};
use crate::grid::{ProxyLink, VoxelGrid, VoxelId};
use crate::mesh::{MeshRebuilder, RenderMesh};
use crate::physics::SpatialQuery;
use crate::pool::{ProxyOwner, ProxyPools};
use crate::separation::separate;

/// Identifier of a destructible within a world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DestructibleId(u32);

impl DestructibleId {
    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Lifecycle of a destructible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DestructibleState {
    /// No voxel separated yet.
    Intact,
    /// At least one voxel separated.
    Damaged,
    /// Nothing left. Terminal.
    Destroyed,
}

/// A voxelized object that can be damaged.
#[derive(Debug)]
pub struct Destructible {
    id: DestructibleId,
    grid: VoxelGrid,
    mesh: RenderMesh,
    analyzer: ConnectivityAnalyzer,
    rebuilder: MeshRebuilder,
    floating: Vec<VoxelId>,
    min_voxel_count: usize,
    state: DestructibleState,
    unbound: bool,
}

impl Destructible {
    /// Builds the grid from bake data and draws the initial mesh.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigurationError`] from grid construction.
    pub fn new(
        id: DestructibleId,
        bake: BakeData,
        config: &DestructionConfig,
    ) -> Result<Self, ConfigurationError> {
        let grid = VoxelGrid::from_bake(&bake)?;
        let min_voxel_count = config.min_voxel_count(grid.anchors().len());

        let mut destructible = Self {
            id,
            analyzer: ConnectivityAnalyzer::new(grid.len()),
            mesh: RenderMesh::new(bake.mesh),
            rebuilder: MeshRebuilder::new(),
            floating: Vec::new(),
            min_voxel_count,
            state: DestructibleState::Intact,
            unbound: false,
            grid,
        };
        destructible.rebuilder.rebuild(&destructible.grid, &mut destructible.mesh);

        debug!(
            "Destructible {:?}: {} voxels, min_voxel_count {}",
            id,
            destructible.grid.len(),
            min_voxel_count
        );
        Ok(destructible)
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// World id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> DestructibleId {
        self.id
    }

    /// Voxel grid.
    #[inline]
    #[must_use]
    pub const fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    /// Render mesh.
    #[inline]
    #[must_use]
    pub const fn mesh(&self) -> &RenderMesh {
        &self.mesh
    }

    /// Lifecycle state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> DestructibleState {
        self.state
    }

    /// Whether nothing is left.
    #[inline]
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.state == DestructibleState::Destroyed
    }

    /// Non-separated voxels.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.grid.remaining()
    }

    /// Connected voxels below which the object collapses.
    #[inline]
    #[must_use]
    pub const fn min_voxel_count(&self) -> usize {
        self.min_voxel_count
    }

    /// Whether some exposed voxel is still waiting for a visible proxy.
    #[inline]
    #[must_use]
    pub const fn has_unbound_voxels(&self) -> bool {
        self.unbound
    }

    // =========================================================================
    // PROXIES
    // =========================================================================

    /// Checks out a visible proxy for every exposed voxel that lacks one.
    /// Returns how many were bound.
    ///
    /// Voxels left over when the pool runs dry are retried on the next call.
    pub fn attach_visible_proxies(&mut self, pools: &mut ProxyPools) -> usize {
        let mut bound = 0;
        self.unbound = false;
        for index in 0..self.grid.len() {
            let id = VoxelId::new(index as u32);
            let voxel = &self.grid[id];
            if !voxel.is_rendered() || voxel.proxy.is_some() {
                continue;
            }
            let Some(transform) = self.grid.world_transform(id) else {
                continue;
            };
            let owner = ProxyOwner {
                destructible: self.id,
                voxel: id,
            };
            let Some(handle) = pools.checkout_visible(owner, transform, voxel.color) else {
                self.unbound = true;
                break;
            };
            self.grid[id].proxy = Some(ProxyLink::Visible(handle));
            bound += 1;
        }
        bound
    }

    /// Returns every visible proxy still held by an attached voxel.
    pub fn release_visible_proxies(&mut self, pools: &mut ProxyPools) {
        for index in 0..self.grid.len() {
            let voxel = &mut self.grid[VoxelId::new(index as u32)];
            if let Some(ProxyLink::Visible(handle)) = voxel.proxy {
                pools.release_visible(handle);
                voxel.proxy = None;
            }
        }
    }

    /// Forgets a debris proxy that settled back into its pool.
    pub fn clear_debris_link(&mut self, voxel: VoxelId, handle: PoolHandle) {
        if let Some(v) = self.grid.get_mut(voxel) {
            if v.proxy == Some(ProxyLink::Debris(handle)) {
                v.proxy = None;
            }
        }
    }

    // =========================================================================
    // DAMAGE
    // =========================================================================

    /// Runs one damage pass.
    ///
    /// Returns [`DamageOutcome::NoContact`] without touching any state if
    /// the impact resolves to no contact or the object is already destroyed.
    pub fn take_damage(
        &mut self,
        impact: &Impact,
        spatial: &dyn SpatialQuery,
        processor: &mut DamageProcessor,
        pools: &mut ProxyPools,
        events: Option<&EventSender>,
    ) -> DamageOutcome {
        if self.is_destroyed() {
            return DamageOutcome::NoContact;
        }
        let Some(contact) = processor.resolve_contact(&self.grid, impact, spatial) else {
            debug!("Destructible {:?}: no contact at {:?}", self.id, impact.point);
            return DamageOutcome::NoContact;
        };

        let mut sink = PassSink {
            destructible: self.id,
            pools,
            events,
            report: Default::default(),
        };
        sink.report.contact = contact;

        processor.apply_hits(&mut self.grid, impact, contact, spatial, &mut sink);
        self.settle_structure(impact, processor, &mut sink);

        sink.report.faces_drawn = self.rebuilder.rebuild(&self.grid, &mut self.mesh);
        // Separations above may have freed slots for voxels that missed one
        if sink.report.pool_misses > 0 || self.unbound {
            sink.report.proxies_rebound = self.attach_visible_proxies(sink.pools);
        }
        sink.emit(DestructionEvent::MeshRebuilt {
            destructible: self.id,
            revision: self.mesh.revision(),
            index_count: self.mesh.triangles().len(),
        });

        if self.grid.remaining() == 0 {
            self.state = DestructibleState::Destroyed;
            sink.report.destroyed = true;
            info!("Destructible {:?} destroyed", self.id);
            sink.emit(DestructionEvent::Destroyed {
                destructible: self.id,
            });
        } else if self.grid.remaining() < self.grid.len() {
            self.state = DestructibleState::Damaged;
        }

        let report = sink.report;
        debug!(
            "Destructible {:?}: hit {}, exposed {}, floating {}, remaining {}, faces {}",
            self.id,
            report.voxels_hit,
            report.voxels_exposed,
            report.floating_separated,
            self.grid.remaining(),
            report.faces_drawn
        );
        DamageOutcome::Applied(report)
    }

    /// Connectivity policy: collapse, or drop the floating voxels.
    fn settle_structure(
        &mut self,
        impact: &Impact,
        processor: &mut DamageProcessor,
        sink: &mut PassSink<'_>,
    ) {
        self.floating.clear();
        self.analyzer.find_floating_into(&self.grid, &mut self.floating);

        let remaining = self.grid.remaining();
        let connected = remaining - self.floating.len();

        if connected < self.min_voxel_count {
            info!(
                "Destructible {:?} collapsed: {} connected < {}",
                self.id, connected, self.min_voxel_count
            );
            let viewer = impact.viewer;
            for index in 0..self.grid.len() {
                let id = VoxelId::new(index as u32);
                if separate(&mut self.grid, id, sink.pools) {
                    processor.launch(&mut self.grid, id, viewer.forward, &viewer, sink);
                }
            }
            sink.report.collapsed = true;
            sink.emit(DestructionEvent::Collapsed {
                destructible: self.id,
                voxels_launched: remaining,
            });
        } else if !self.floating.is_empty() {
            sink.report.floating_islands =
                ConnectivityAnalyzer::islands(&self.grid, &self.floating).len();
            for &id in &self.floating {
                if separate(&mut self.grid, id, sink.pools) {
                    let direction = self.grid[id].launch_direction;
                    processor.launch(&mut self.grid, id, direction, &impact.viewer, sink);
                    sink.report.floating_separated += 1;
                }
            }
        }

        self.grid.recompute_bounds();
    }
}
