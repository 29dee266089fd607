//! # Connectivity Analysis
//!
//! Finds voxels that no longer have a path of attached neighbors to any
//! anchor.
//!
//! The traversal uses an explicit stack and a visited bitset sized to the
//! grid. Only the bits set during a pass are cleared afterwards, so a pass
//! costs what it touches, not the grid size. Lattices are cyclic; the
//! visited bit is set before a voxel is pushed, so every voxel is pushed at
//! most once.
//!
//! The scratch state makes a pass non-reentrant, which `&mut self` enforces.

use bitvec::vec::BitVec;

use crate::face::Face;
use crate::grid::{VoxelGrid, VoxelId};

/// Reusable flood-fill scratch for one grid.
#[derive(Debug, Default)]
pub struct ConnectivityAnalyzer {
    /// Marked during the current pass.
    visited: BitVec,
    /// Ids marked during the current pass, for the touched-only reset.
    touched: Vec<VoxelId>,
    /// Traversal stack.
    stack: Vec<VoxelId>,
}

impl ConnectivityAnalyzer {
    /// Analyzer sized for a grid of `len` voxels.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            visited: BitVec::repeat(false, len),
            touched: Vec::with_capacity(len),
            stack: Vec::new(),
        }
    }

    /// Non-separated voxels unreachable from every non-separated anchor,
    /// in id order.
    pub fn find_floating(&mut self, grid: &VoxelGrid) -> Vec<VoxelId> {
        let mut floating = Vec::new();
        self.find_floating_into(grid, &mut floating);
        floating
    }

    /// As [`ConnectivityAnalyzer::find_floating`], appending to `out`.
    pub fn find_floating_into(&mut self, grid: &VoxelGrid, out: &mut Vec<VoxelId>) {
        if self.visited.len() != grid.len() {
            self.visited.resize(grid.len(), false);
        }

        for &anchor in grid.anchors() {
            if grid.is_attached(anchor) && !self.visited[anchor.index()] {
                self.mark(anchor);
                self.flood(grid);
            }
        }

        out.extend(
            grid.iter()
                .filter(|(id, voxel)| !voxel.is_separated && !self.visited[id.index()])
                .map(|(id, _)| id),
        );

        for id in self.touched.drain(..) {
            self.visited.set(id.index(), false);
        }
        debug_assert!(self.visited.not_any());
    }

    /// Groups `floating` into clusters connected through attached neighbors.
    ///
    /// Clusters come out in order of their lowest id; ids within a cluster
    /// are in discovery order.
    #[must_use]
    pub fn islands(grid: &VoxelGrid, floating: &[VoxelId]) -> Vec<Vec<VoxelId>> {
        let mut member: BitVec = BitVec::repeat(false, grid.len());
        for id in floating {
            member.set(id.index(), true);
        }

        let mut islands = Vec::new();
        let mut stack = Vec::new();
        for &start in floating {
            if !member[start.index()] {
                continue;
            }
            member.set(start.index(), false);
            stack.push(start);

            let mut island = Vec::new();
            while let Some(id) = stack.pop() {
                island.push(id);
                for face in Face::ALL {
                    if let Some(n) = grid[id].neighbor(face) {
                        if member[n.index()] {
                            member.set(n.index(), false);
                            stack.push(n);
                        }
                    }
                }
            }
            islands.push(island);
        }
        islands
    }

    fn mark(&mut self, id: VoxelId) {
        self.visited.set(id.index(), true);
        self.touched.push(id);
        self.stack.push(id);
    }

    fn flood(&mut self, grid: &VoxelGrid) {
        while let Some(id) = self.stack.pop() {
            for face in Face::ALL {
                let Some(n) = grid[id].neighbor(face) else {
                    continue;
                };
                if grid[n].is_separated || self.visited[n.index()] {
                    continue;
                }
                self.mark(n);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bake::LatticeBaker;

    fn separate_raw(grid: &mut VoxelGrid, id: u32) {
        grid[VoxelId::new(id)].is_separated = true;
        grid.note_separated();
    }

    #[test]
    fn test_intact_grid_has_no_floating() {
        let grid =
            VoxelGrid::from_bake(&LatticeBaker::new([4, 4, 4]).bake_box(|[_, y, _]| y == 0))
                .unwrap();
        let mut analyzer = ConnectivityAnalyzer::new(grid.len());
        assert!(analyzer.find_floating(&grid).is_empty());
        // Scratch is clean for the next pass
        assert!(analyzer.find_floating(&grid).is_empty());
    }

    #[test]
    fn test_cut_column_floats() {
        // 1x4x1 column anchored at the bottom
        let mut grid =
            VoxelGrid::from_bake(&LatticeBaker::new([1, 4, 1]).bake_box(|[_, y, _]| y == 0))
                .unwrap();
        let mut analyzer = ConnectivityAnalyzer::new(grid.len());

        separate_raw(&mut grid, 1);
        let floating = analyzer.find_floating(&grid);
        assert_eq!(floating, vec![VoxelId::new(2), VoxelId::new(3)]);
    }

    #[test]
    fn test_no_anchor_means_everything_floats() {
        let grid =
            VoxelGrid::from_bake(&LatticeBaker::new([2, 2, 2]).bake_box(|_| false)).unwrap();
        let mut analyzer = ConnectivityAnalyzer::new(0);
        assert_eq!(analyzer.find_floating(&grid).len(), 8);
    }

    #[test]
    fn test_separated_anchor_is_not_a_root() {
        let mut grid =
            VoxelGrid::from_bake(&LatticeBaker::new([2, 1, 1]).bake_box(|[x, _, _]| x == 0))
                .unwrap();
        separate_raw(&mut grid, 0);
        let mut analyzer = ConnectivityAnalyzer::new(grid.len());
        assert_eq!(analyzer.find_floating(&grid), vec![VoxelId::new(1)]);
    }

    #[test]
    fn test_islands_split_disconnected_clusters() {
        // Row of 5, anchor at x=2: removing the anchor leaves {0,1} and {3,4}
        let mut grid =
            VoxelGrid::from_bake(&LatticeBaker::new([5, 1, 1]).bake_box(|[x, _, _]| x == 2))
                .unwrap();
        separate_raw(&mut grid, 2);

        let mut analyzer = ConnectivityAnalyzer::new(grid.len());
        let floating = analyzer.find_floating(&grid);
        assert_eq!(floating.len(), 4);

        let mut islands = ConnectivityAnalyzer::islands(&grid, &floating);
        for island in &mut islands {
            island.sort();
        }
        assert_eq!(
            islands,
            vec![
                vec![VoxelId::new(0), VoxelId::new(1)],
                vec![VoxelId::new(3), VoxelId::new(4)],
            ]
        );
    }
}
