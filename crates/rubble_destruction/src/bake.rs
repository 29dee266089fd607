//! # Bake Input
//!
//! The per-voxel records an offline baking step produces, plus the static
//! vertex buffers they index into.
//!
//! Records reference each other by index (`-1` = no neighbor) and reference
//! the shared vertex buffer by the first vertex of each face quad. Nothing
//! here is validated; [`crate::grid::VoxelGrid::from_bake`] does that.
//!
//! [`LatticeBaker`] produces the same format for box lattices, for tests,
//! benches and the demo driver.

use std::path::Path;

use ndshape::{RuntimeShape, Shape};
use rubble_core::{Transform, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, DestructionResult};
use crate::face::{Face, VERTICES_PER_FACE};

/// One baked voxel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BakeRecord {
    /// Grid-local min corner.
    pub position: Vec3,
    /// RGBA albedo.
    pub color: [u8; 4],
    /// Initial face visibility in bake order.
    pub draw_faces: [bool; 6],
    /// Neighbor record index per face, `-1` for none.
    pub adjacent_indexes: [i32; 6],
    /// Touching the non-destructible world at bake time.
    pub is_anchor: bool,
    /// Any face visible at bake time.
    pub is_exposed: bool,
    /// Atlas coordinate.
    pub mesh_uv: Vec2,
    /// First vertex of each face quad in the shared buffers.
    pub face_triangle_start_indexes: [u32; 6],
}

/// Static vertex attributes shared by every face quad of one destructible.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshBuffers {
    /// Grid-local vertex positions.
    pub positions: Vec<Vec3>,
    /// Vertex normals.
    pub normals: Vec<Vec3>,
    /// Vertex UVs.
    pub uvs: Vec<Vec2>,
}

impl MeshBuffers {
    /// Number of vertices, taken from the position buffer.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// Everything needed to instantiate one destructible.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BakeData {
    /// Edge length of one voxel.
    pub voxel_size: f32,
    /// Object transform at spawn.
    pub transform: Transform,
    /// Static vertex buffers.
    pub mesh: MeshBuffers,
    /// Voxel records in id order.
    pub records: Vec<BakeRecord>,
}

impl BakeData {
    /// Decodes bake data from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Malformed`] for invalid JSON or
    /// per-face arrays of the wrong length.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(text).map_err(|e| ConfigurationError::Malformed(e.to_string()))
    }

    /// Reads and decodes a JSON bake file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, `Configuration` if it does
    /// not decode.
    pub fn load_json(path: impl AsRef<Path>) -> DestructionResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_json_str(&text)?)
    }

    /// Encodes bake data as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Malformed`] if a float is not finite.
    pub fn to_json_string(&self) -> Result<String, ConfigurationError> {
        serde_json::to_string(self).map_err(|e| ConfigurationError::Malformed(e.to_string()))
    }
}

// =============================================================================
// LATTICE BAKER
// =============================================================================

/// Unit-cube corners of each face quad, counter-clockwise seen from outside.
const FACE_CORNERS: [[[f32; 3]; 4]; 6] = [
    // FRONT (-Z)
    [[1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]],
    // RIGHT (+X)
    [[1.0, 0.0, 1.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 1.0]],
    // TOP (+Y)
    [[0.0, 1.0, 0.0], [0.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, 0.0]],
    // LEFT (-X)
    [[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 1.0, 0.0]],
    // BOTTOM (-Y)
    [[0.0, 0.0, 1.0], [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0]],
    // BACK (+Z)
    [[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0]],
];

/// Builds [`BakeData`] for a box lattice of cells.
///
/// Every solid cell gets one record and 24 vertices (4 per face), so face
/// `f` of record `r` starts at vertex `24 * r + 4 * f`.
///
/// ```rust,ignore
/// // 3x3x1 slab anchored along its bottom row
/// let bake = LatticeBaker::new([3, 3, 1]).bake(|_| true, |[_, y, _]| y == 0);
/// ```
#[derive(Clone, Debug)]
pub struct LatticeBaker {
    dims: [u32; 3],
    voxel_size: f32,
    transform: Transform,
    color: [u8; 4],
    mesh_uv: Vec2,
}

impl LatticeBaker {
    /// Lattice of `dims` cells with unit voxels at the origin.
    #[must_use]
    pub fn new(dims: [u32; 3]) -> Self {
        Self {
            dims,
            voxel_size: 1.0,
            transform: Transform::IDENTITY,
            color: [200, 200, 200, 255],
            mesh_uv: Vec2::ZERO,
        }
    }

    /// Sets the voxel edge length.
    #[must_use]
    pub fn voxel_size(mut self, voxel_size: f32) -> Self {
        self.voxel_size = voxel_size;
        self
    }

    /// Sets the object transform.
    #[must_use]
    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Sets the color of every voxel.
    #[must_use]
    pub fn color(mut self, color: [u8; 4]) -> Self {
        self.color = color;
        self
    }

    /// Sets the atlas coordinate of every voxel.
    #[must_use]
    pub fn mesh_uv(mut self, mesh_uv: Vec2) -> Self {
        self.mesh_uv = mesh_uv;
        self
    }

    /// Bakes every cell.
    #[must_use]
    pub fn bake_box(&self, anchor: impl Fn([u32; 3]) -> bool) -> BakeData {
        self.bake(|_| true, anchor)
    }

    /// Bakes the cells for which `solid` holds, marking those for which
    /// `anchor` also holds as anchors.
    #[must_use]
    pub fn bake(
        &self,
        solid: impl Fn([u32; 3]) -> bool,
        anchor: impl Fn([u32; 3]) -> bool,
    ) -> BakeData {
        let shape = RuntimeShape::<u32, 3>::new(self.dims);
        let cells = shape.size() as usize;

        // Cell -> record index, -1 for empty cells
        let mut record_of = vec![-1i32; cells];
        let mut solid_cells = Vec::new();
        for cell in 0..shape.size() {
            let p = shape.delinearize(cell);
            if solid(p) {
                record_of[cell as usize] = solid_cells.len() as i32;
                solid_cells.push(p);
            }
        }

        let vertex_count = solid_cells.len() * 6 * VERTICES_PER_FACE as usize;
        let mut mesh = MeshBuffers {
            positions: Vec::with_capacity(vertex_count),
            normals: Vec::with_capacity(vertex_count),
            uvs: Vec::with_capacity(vertex_count),
        };
        let mut records = Vec::with_capacity(solid_cells.len());

        for (index, &p) in solid_cells.iter().enumerate() {
            let origin = Vec3::new(p[0] as f32, p[1] as f32, p[2] as f32) * self.voxel_size;
            let base = (index * 6) as u32 * VERTICES_PER_FACE;

            let mut adjacent_indexes = [-1i32; 6];
            let mut face_triangle_start_indexes = [0u32; 6];
            for face in Face::ALL {
                if let Some(neighbor) = self.neighbor_cell(p, face) {
                    adjacent_indexes[face.index()] = record_of[shape.linearize(neighbor) as usize];
                }

                face_triangle_start_indexes[face.index()] =
                    base + face.index() as u32 * VERTICES_PER_FACE;
                for corner in FACE_CORNERS[face.index()] {
                    mesh.positions.push(origin + Vec3::from_array(corner) * self.voxel_size);
                    mesh.normals.push(face.normal());
                    mesh.uvs.push(self.mesh_uv);
                }
            }

            let draw_faces = adjacent_indexes.map(|i| i < 0);
            records.push(BakeRecord {
                position: origin,
                color: self.color,
                draw_faces,
                adjacent_indexes,
                is_anchor: anchor(p),
                is_exposed: draw_faces.contains(&true),
                mesh_uv: self.mesh_uv,
                face_triangle_start_indexes,
            });
        }

        BakeData {
            voxel_size: self.voxel_size,
            transform: self.transform,
            mesh,
            records,
        }
    }

    /// Lattice cell across `face`, if inside the box.
    fn neighbor_cell(&self, p: [u32; 3], face: Face) -> Option<[u32; 3]> {
        let step = face.step();
        let mut out = [0u32; 3];
        for axis in 0..3 {
            let moved = i64::from(p[axis]) + i64::from(step[axis]);
            if moved < 0 || moved >= i64::from(self.dims[axis]) {
                return None;
            }
            out[axis] = moved as u32;
        }
        Some(out)
    }
}
