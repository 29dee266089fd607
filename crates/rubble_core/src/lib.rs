//! # RUBBLE Core
//!
//! Shared building blocks for the destruction engine:
//! - Math types (`Vec3`, `Quaternion`, `Transform`, `Aabb`) used by bake data,
//!   proxies and spatial queries
//! - Fixed-capacity proxy pools recycled for the lifetime of the process
//!
//! ## Architecture Rules
//!
//! 1. **No heap allocations in hot path** - pools are allocated up front
//! 2. **Data-oriented design** - plain `Pod` structs, no hidden ownership
//!
//! ## Example
//!
//! ```rust,ignore
//! use rubble_core::{ProxyPool, Vec3};
//!
//! let mut pool: ProxyPool<MyProxy> = ProxyPool::new(1024);
//! let (handle, proxy) = pool.checkout().expect("pool has room");
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod math;
pub mod memory;

pub use math::{closest_point_on_segment, Aabb, Quaternion, Transform, Vec2, Vec3};
pub use memory::{Poolable, PoolHandle, ProxyPool};
