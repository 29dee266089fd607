//! # Mesh Rebuilder
//!
//! Vertex, normal and UV buffers are fixed at bake time. A damage pass only
//! regenerates the index buffer, so a rebuild costs the number of drawn
//! faces, not the number of voxels.

use rubble_core::{Vec2, Vec3};

use crate::bake::MeshBuffers;
use crate::face::{INDICES_PER_FACE, QUAD_OFFSETS};
use crate::grid::VoxelGrid;

/// Combined render mesh of one destructible.
#[derive(Clone, Debug)]
pub struct RenderMesh {
    buffers: MeshBuffers,
    triangles: Vec<u32>,
    revision: u64,
}

impl RenderMesh {
    /// Mesh over static buffers with no triangles yet.
    #[must_use]
    pub fn new(buffers: MeshBuffers) -> Self {
        Self {
            buffers,
            triangles: Vec::new(),
            revision: 0,
        }
    }

    /// Vertex positions.
    #[inline]
    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        &self.buffers.positions
    }

    /// Vertex normals.
    #[inline]
    #[must_use]
    pub fn normals(&self) -> &[Vec3] {
        &self.buffers.normals
    }

    /// Vertex UVs.
    #[inline]
    #[must_use]
    pub fn uvs(&self) -> &[Vec2] {
        &self.buffers.uvs
    }

    /// Current index buffer, three indices per triangle.
    #[inline]
    #[must_use]
    pub fn triangles(&self) -> &[u32] {
        &self.triangles
    }

    /// Bumped every time the index buffer is replaced.
    #[inline]
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Index buffer as raw bytes for upload.
    #[must_use]
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.triangles)
    }

    /// Position buffer as raw bytes for upload.
    #[must_use]
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.buffers.positions)
    }
}

/// Regenerates index buffers, reusing one scratch allocation.
#[derive(Debug, Default)]
pub struct MeshRebuilder {
    scratch: Vec<u32>,
}

impl MeshRebuilder {
    /// Creates a rebuilder with an empty scratch buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces `mesh`'s triangles with the drawn faces of every attached,
    /// exposed voxel in `grid`. Returns the number of faces emitted.
    pub fn rebuild(&mut self, grid: &VoxelGrid, mesh: &mut RenderMesh) -> usize {
        self.scratch.clear();

        let mut faces = 0;
        for (_, voxel) in grid.iter() {
            if !voxel.is_rendered() {
                continue;
            }
            for face in voxel.draw_faces.iter() {
                let start = voxel.face_triangle_start[face.index()];
                self.scratch
                    .extend(QUAD_OFFSETS.iter().map(|offset| start + offset));
                faces += 1;
            }
        }
        debug_assert_eq!(self.scratch.len(), faces * INDICES_PER_FACE);

        std::mem::swap(&mut self.scratch, &mut mesh.triangles);
        mesh.revision += 1;
        faces
    }
}
