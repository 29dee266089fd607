//! # Separation
//!
//! The one transition that takes a voxel out of the grid. After it a voxel
//! takes no part in connectivity or meshing.

use tracing::trace;

use crate::grid::{ProxyLink, VoxelGrid, VoxelId};
use crate::pool::ProxyPools;

/// Separates `id`: releases its visible proxy, marks it separated and
/// decrements the remaining count.
///
/// Returns `false` without changing anything if the voxel is unknown or
/// already separated.
pub fn separate(grid: &mut VoxelGrid, id: VoxelId, pools: &mut ProxyPools) -> bool {
    let Some(voxel) = grid.get_mut(id) else {
        return false;
    };
    if voxel.is_separated {
        trace!("Voxel {:?} already separated", id);
        return false;
    }

    if let Some(ProxyLink::Visible(handle)) = voxel.proxy {
        pools.release_visible(handle);
        voxel.proxy = None;
    }
    voxel.is_separated = true;
    grid.note_separated();
    true
}
