//! # Memory Management
//!
//! Pre-allocated pools for proxy objects.
//!
//! ## Design Philosophy
//!
//! All proxies are allocated once at startup. During gameplay:
//! - No heap allocations on checkout or release
//! - Exhaustion is reported, never fatal
//! - Predictable, flat latency

mod pool;

pub use pool::{Poolable, PoolHandle, ProxyPool};
