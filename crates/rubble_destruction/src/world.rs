//! # Destructible World
//!
//! Registry of every destructible in a scene. The world owns the proxy pools,
//! the damage processor and the event bus, and lends them to one
//! destructible per damage pass.
//!
//! Events are only sent once someone subscribes through
//! [`DestructibleWorld::events`], so a host that never drains the bus does
//! not fill it.

use std::collections::BTreeMap;

use rubble_core::Vec3;
use tracing::{debug, info};

use crate::bake::BakeData;
use crate::config::DestructionConfig;
use crate::damage::{DamageOutcome, DamageProcessor, Impact};
use crate::destructible::{Destructible, DestructibleId};
use crate::error::{DestructionError, DestructionResult};
use crate::events::{DestructionEvent, EventBus, EventReceiver, EventSender};
use crate::physics::{SpatialQuery, Viewer, VoxelProbe};
use crate::pool::ProxyPools;

/// Every destructible in a scene plus the resources they share.
#[derive(Debug)]
pub struct DestructibleWorld {
    config: DestructionConfig,
    destructibles: BTreeMap<DestructibleId, Destructible>,
    pools: ProxyPools,
    processor: DamageProcessor,
    bus: EventBus,
    sender: Option<EventSender>,
    probe: VoxelProbe,
    next_id: u32,
}

impl DestructibleWorld {
    /// Creates an empty world.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSettings` if `config` does not validate.
    pub fn new(config: DestructionConfig) -> DestructionResult<Self> {
        config.validate()?;
        let bus = EventBus::new(config.event_capacity);

        info!(
            "Destructible world: {} visible / {} debris proxies",
            config.visible_pool_capacity, config.debris_pool_capacity
        );
        Ok(Self {
            pools: ProxyPools::from_config(&config),
            processor: DamageProcessor::new(&config),
            destructibles: BTreeMap::new(),
            probe: VoxelProbe::new(),
            next_id: 0,
            bus,
            sender: None,
            config,
        })
    }

    /// Settings the world was built with.
    #[must_use]
    pub const fn config(&self) -> &DestructionConfig {
        &self.config
    }

    /// Shared proxy pools.
    #[must_use]
    pub const fn pools(&self) -> &ProxyPools {
        &self.pools
    }

    /// A receiver for destruction events. The world starts sending on the
    /// first call.
    #[must_use]
    pub fn events(&mut self) -> EventReceiver {
        if self.sender.is_none() {
            self.sender = Some(self.bus.sender());
        }
        self.bus.receiver()
    }

    /// Events dropped because the bus was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.bus.dropped_count()
    }

    /// Live destructible by id.
    #[must_use]
    pub fn get(&self, id: DestructibleId) -> Option<&Destructible> {
        self.destructibles.get(&id)
    }

    /// Live destructibles in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Destructible> {
        self.destructibles.values()
    }

    /// Number of live destructibles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.destructibles.len()
    }

    /// Whether no destructible is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.destructibles.is_empty()
    }

    /// Builds a destructible from bake data and binds visible proxies to its
    /// exposed voxels.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the bake data is malformed.
    pub fn spawn(&mut self, bake: BakeData) -> DestructionResult<DestructibleId> {
        let id = DestructibleId::new(self.next_id);
        let mut destructible = Destructible::new(id, bake, &self.config)?;
        self.next_id += 1;

        let bound = destructible.attach_visible_proxies(&mut self.pools);
        debug!(
            "Spawned {:?}: {} voxels, {} visible proxies",
            id,
            destructible.grid().len(),
            bound
        );
        self.destructibles.insert(id, destructible);
        Ok(id)
    }

    /// Removes a destructible, returning its visible proxies to the pool.
    pub fn remove(&mut self, id: DestructibleId) -> Option<Destructible> {
        let mut destructible = self.destructibles.remove(&id)?;
        destructible.release_visible_proxies(&mut self.pools);
        self.rebind_stranded();
        Some(destructible)
    }

    /// Offers freed visible slots to destructibles whose exposed voxels ran
    /// out of proxies earlier.
    fn rebind_stranded(&mut self) {
        for destructible in self.destructibles.values_mut() {
            if destructible.has_unbound_voxels() {
                let bound = destructible.attach_visible_proxies(&mut self.pools);
                if bound > 0 {
                    debug!("Rebound {} visible proxies to {:?}", bound, destructible.id());
                }
            }
        }
    }

    /// Applies an impact to one destructible. A destroyed destructible is
    /// removed once its pass completes.
    ///
    /// # Errors
    ///
    /// Returns `UnknownDestructible` if `id` is not live.
    pub fn take_damage(
        &mut self,
        id: DestructibleId,
        point: Vec3,
        radius: f32,
        viewer: Viewer,
        spatial: &dyn SpatialQuery,
    ) -> DestructionResult<DamageOutcome> {
        let destructible = self
            .destructibles
            .get_mut(&id)
            .ok_or(DestructionError::UnknownDestructible(id.raw()))?;

        let impact = Impact {
            point,
            radius,
            viewer,
        };
        let outcome = destructible.take_damage(
            &impact,
            spatial,
            &mut self.processor,
            &mut self.pools,
            self.sender.as_ref(),
        );

        if destructible.is_destroyed() {
            self.remove(id);
        } else if outcome.report().is_some_and(|r| r.voxels_hit + r.floating_separated > 0) {
            self.rebind_stranded();
        }
        Ok(outcome)
    }

    /// As [`DestructibleWorld::take_damage`], resolving queries against a
    /// fresh [`VoxelProbe`] snapshot of the visible proxies.
    ///
    /// # Errors
    ///
    /// Returns `UnknownDestructible` if `id` is not live.
    pub fn take_damage_probed(
        &mut self,
        id: DestructibleId,
        point: Vec3,
        radius: f32,
        viewer: Viewer,
    ) -> DestructionResult<DamageOutcome> {
        let mut probe = std::mem::take(&mut self.probe);
        self.snapshot_colliders(&mut probe);
        let outcome = self.take_damage(id, point, radius, viewer, &probe);
        self.probe = probe;
        outcome
    }

    /// Fills `probe` with one box per active visible proxy.
    pub fn snapshot_colliders(&self, probe: &mut VoxelProbe) {
        probe.snapshot(self.pools.visible());
    }

    /// Ages debris by `dt` seconds. Returns how many proxies settled.
    pub fn tick(&mut self, dt: f32) -> usize {
        let settled = self.pools.tick(dt);
        for debris in &settled {
            let owner = debris.owner;
            if let Some(destructible) = self.destructibles.get_mut(&owner.destructible) {
                destructible.clear_debris_link(owner.voxel, debris.handle);
            }
            if let Some(sender) = &self.sender {
                sender.send(DestructionEvent::DebrisSettled {
                    destructible: owner.destructible,
                    voxel: owner.voxel,
                });
            }
        }
        settled.len()
    }
}
