//! # RUBBLE Destruction
//!
//! Voxel destruction engine. Static meshes are baked into grids of small
//! cubes; impacts remove surface voxels, reveal the faces behind them, detect
//! voxels that lost their connection to the ground and launch them as debris.
//!
//! ## Pipeline
//!
//! ```text
//! impact ─> DamageProcessor ─> ConnectivityAnalyzer ─> MeshRebuilder
//!               │                      │                     │
//!               └──── ProxyPools <─────┘          RenderMesh + events
//! ```
//!
//! ## Architecture Rules
//!
//! 1. **Single-threaded, frame-stepped** - a damage pass runs to completion
//! 2. **Arena + indices** - voxels reference neighbors by `VoxelId`
//! 3. **Injected collaborators** - pools, viewer and spatial queries are
//!    passed per call
//! 4. **Runtime conditions are not errors** - a missed impact or an empty pool
//!    never aborts a pass
//!
//! ## Example
//!
//! ```rust,ignore
//! use rubble_destruction::{DestructibleWorld, DestructionConfig, LatticeBaker, Viewer};
//!
//! let mut world = DestructibleWorld::new(DestructionConfig::default())?;
//! let wall = world.spawn(LatticeBaker::new([8, 4, 1]).bake_box(|[_, y, _]| y == 0))?;
//! let viewer = Viewer::looking_at(eye, target);
//! world.take_damage_probed(wall, target, 0.4, viewer)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod bake;
pub mod config;
pub mod connectivity;
pub mod damage;
pub mod destructible;
pub mod error;
pub mod events;
pub mod face;
pub mod grid;
pub mod mesh;
pub mod physics;
pub mod pool;
pub mod separation;
pub mod world;

pub use bake::{BakeData, BakeRecord, LatticeBaker, MeshBuffers};
pub use config::{DestructionConfig, ImpulseRange};
pub use connectivity::ConnectivityAnalyzer;
pub use damage::{DamageOutcome, DamageProcessor, DamageReport, Impact};
pub use destructible::{Destructible, DestructibleId, DestructibleState};
pub use error::{ConfigurationError, DestructionError, DestructionResult};
pub use events::{DestructionEvent, EventBus, EventReceiver, EventSender};
pub use face::{Face, FaceMask};
pub use grid::{ProxyLink, Voxel, VoxelGrid, VoxelId};
pub use mesh::{MeshRebuilder, RenderMesh};
pub use physics::{Contact, LayerMask, ProbeCollider, ProxyHit, SpatialQuery, Viewer, VoxelProbe};
pub use pool::{DebrisVoxelProxy, ProxyOwner, ProxyPools, SettledDebris, VisibleVoxelProxy};
pub use separation::separate;
pub use world::DestructibleWorld;
