//! # Voxel Grid
//!
//! Arena of voxels for one destructible. Neighbors are stored as indices into
//! the arena, so the grid owns every voxel and adjacency carries no ownership.
//!
//! ## Invariants
//!
//! - `draw_faces[f]` is set iff the neighbor across `f` is absent or separated.
//! - `is_exposed` never goes back to `false` while a voxel is attached.
//! - The remaining (non-separated) count only decreases.

use rubble_core::{Aabb, PoolHandle, Transform, Vec2, Vec3};
use tracing::{debug, warn};

use crate::bake::BakeData;
use crate::error::ConfigurationError;
use crate::face::{Face, FaceMask};

/// Index of a voxel inside its grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoxelId(u32);

impl VoxelId {
    /// Wraps a raw arena index.
    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Arena index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Pooled proxy currently standing in for a voxel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProxyLink {
    /// Render proxy for an exposed, attached voxel.
    Visible(PoolHandle),
    /// Physics proxy for a separated voxel.
    Debris(PoolHandle),
}

/// One cell of a destructible.
#[derive(Clone, Debug)]
pub struct Voxel {
    /// Grid-local min corner.
    pub local_position: Vec3,
    /// RGBA albedo.
    pub color: [u8; 4],
    /// Atlas coordinate.
    pub mesh_uv: Vec2,
    /// Faces currently rendered.
    pub draw_faces: FaceMask,
    /// Neighbor per face.
    pub adjacent: [Option<VoxelId>; 6],
    /// First vertex of each face quad in the shared buffers.
    pub face_triangle_start: [u32; 6],
    /// Root of connectivity analysis.
    pub is_anchor: bool,
    /// At least one face has been visible.
    pub is_exposed: bool,
    /// Left the grid. Terminal.
    pub is_separated: bool,
    /// Flattened unit direction away from the object's center.
    pub launch_direction: Vec3,
    /// World-space center at spawn.
    pub world_center: Vec3,
    /// Proxy currently bound to this voxel.
    pub proxy: Option<ProxyLink>,
}

impl Voxel {
    /// Neighbor across `face`.
    #[inline]
    #[must_use]
    pub fn neighbor(&self, face: Face) -> Option<VoxelId> {
        self.adjacent[face.index()]
    }

    /// Attached and exposed: contributes faces to the render mesh.
    #[inline]
    #[must_use]
    pub fn is_rendered(&self) -> bool {
        self.is_exposed && !self.is_separated
    }
}

/// All voxels of one destructible.
#[derive(Clone, Debug)]
pub struct VoxelGrid {
    voxels: Vec<Voxel>,
    anchors: Vec<VoxelId>,
    voxel_size: f32,
    transform: Transform,
    flattened_center: Vec3,
    remaining: usize,
    bounds: Aabb,
}

impl VoxelGrid {
    /// Validates bake data and builds the grid.
    ///
    /// Face bits are normalized to the visibility invariant; records that
    /// disagree are counted and logged, not rejected.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] for empty input, mismatched vertex
    /// buffers, out-of-range, self-referencing or one-way adjacency, and face
    /// quads that start outside the vertex buffer.
    pub fn from_bake(bake: &BakeData) -> Result<Self, ConfigurationError> {
        validate(bake)?;

        let records = &bake.records;
        let transform = bake.transform;
        let half = Vec3::splat(bake.voxel_size * 0.5);

        let mut disagreements = 0usize;
        let mut voxels = Vec::with_capacity(records.len());
        let mut anchors = Vec::new();

        for (index, record) in records.iter().enumerate() {
            let adjacent = record
                .adjacent_indexes
                .map(|i| u32::try_from(i).ok().map(VoxelId::new));

            let draw_faces = FaceMask::from_array(adjacent.map(|n| n.is_none()));
            disagreements += Face::ALL
                .iter()
                .filter(|f| draw_faces.contains(**f) != record.draw_faces[f.index()])
                .count();

            if record.is_anchor {
                anchors.push(VoxelId::new(index as u32));
            }

            voxels.push(Voxel {
                local_position: record.position,
                color: record.color,
                mesh_uv: record.mesh_uv,
                draw_faces,
                adjacent,
                face_triangle_start: record.face_triangle_start_indexes,
                is_anchor: record.is_anchor,
                is_exposed: record.is_exposed || draw_faces.any(),
                is_separated: false,
                launch_direction: Vec3::ZERO,
                world_center: transform.transform_point(record.position + half),
                proxy: None,
            });
        }

        if disagreements > 0 {
            warn!(
                "Bake face bits disagreed with adjacency on {} faces; normalized",
                disagreements
            );
        }

        let sum = voxels
            .iter()
            .fold(Vec3::ZERO, |acc, v| acc + v.world_center);
        let flattened_center = (sum / voxels.len() as f32).flattened();

        let fallback = {
            let forward = transform.forward().flattened().normalize_or_zero();
            if forward == Vec3::ZERO { Vec3::Z } else { forward }
        };
        for voxel in &mut voxels {
            let outward = (voxel.world_center.flattened() - flattened_center).normalize_or_zero();
            voxel.launch_direction = if outward == Vec3::ZERO { fallback } else { outward };
        }

        let mut grid = Self {
            remaining: voxels.len(),
            voxels,
            anchors,
            voxel_size: bake.voxel_size,
            transform,
            flattened_center,
            bounds: Aabb::EMPTY,
        };
        grid.recompute_bounds();

        debug!(
            "Built voxel grid: {} voxels, {} anchors",
            grid.voxels.len(),
            grid.anchors.len()
        );
        Ok(grid)
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Number of voxels, separated included.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    /// Always `false` for a grid built from valid bake data.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    /// Voxel by id.
    #[inline]
    #[must_use]
    pub fn get(&self, id: VoxelId) -> Option<&Voxel> {
        self.voxels.get(id.index())
    }

    /// Mutable voxel by id.
    #[inline]
    pub fn get_mut(&mut self, id: VoxelId) -> Option<&mut Voxel> {
        self.voxels.get_mut(id.index())
    }

    /// Every id in arena order.
    pub fn ids(&self) -> impl Iterator<Item = VoxelId> {
        (0..self.voxels.len() as u32).map(VoxelId::new)
    }

    /// Every voxel with its id.
    pub fn iter(&self) -> impl Iterator<Item = (VoxelId, &Voxel)> {
        self.voxels
            .iter()
            .enumerate()
            .map(|(i, v)| (VoxelId::new(i as u32), v))
    }

    /// Anchors fixed at bake time.
    #[inline]
    #[must_use]
    pub fn anchors(&self) -> &[VoxelId] {
        &self.anchors
    }

    /// Non-separated voxels.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.remaining
    }

    /// Edge length of one voxel.
    #[inline]
    #[must_use]
    pub const fn voxel_size(&self) -> f32 {
        self.voxel_size
    }

    /// Object transform.
    #[inline]
    #[must_use]
    pub const fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Mean voxel center with Y zeroed.
    #[inline]
    #[must_use]
    pub const fn flattened_center(&self) -> Vec3 {
        self.flattened_center
    }

    /// World bounds of the remaining exposed voxels, as of the last
    /// [`VoxelGrid::recompute_bounds`].
    #[inline]
    #[must_use]
    pub const fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Whether `id` names a voxel that has not been separated.
    #[inline]
    #[must_use]
    pub fn is_attached(&self, id: VoxelId) -> bool {
        self.get(id).is_some_and(|v| !v.is_separated)
    }

    /// World transform of a voxel's proxy: its center, the object's rotation,
    /// scaled to one voxel.
    #[must_use]
    pub fn world_transform(&self, id: VoxelId) -> Option<Transform> {
        let voxel = self.get(id)?;
        Some(Transform::new(
            voxel.world_center,
            self.transform.rotation,
            self.voxel_size * self.transform.scale,
        ))
    }

    /// World-space box around one voxel, rotation included.
    #[must_use]
    pub fn voxel_aabb(&self, id: VoxelId) -> Option<Aabb> {
        let voxel = self.get(id)?;
        let mut aabb = Aabb::EMPTY;
        for corner in 0..8u8 {
            let offset = Vec3::new(
                f32::from(corner & 1),
                f32::from((corner >> 1) & 1),
                f32::from((corner >> 2) & 1),
            ) * self.voxel_size;
            aabb.include_point(self.transform.transform_point(voxel.local_position + offset));
        }
        Some(aabb)
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Records one separation. Only called by [`crate::separation::separate`].
    pub(crate) fn note_separated(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }

    /// Refits the object bounds to the remaining exposed voxels.
    pub fn recompute_bounds(&mut self) {
        let mut bounds = Aabb::EMPTY;
        for (id, voxel) in self.iter() {
            if voxel.is_rendered() {
                if let Some(aabb) = self.voxel_aabb(id) {
                    bounds.include(&aabb);
                }
            }
        }
        self.bounds = bounds;
    }

    /// Whether every face bit matches its neighbor's state.
    #[must_use]
    pub fn face_visibility_holds(&self) -> bool {
        self.voxels.iter().filter(|v| !v.is_separated).all(|voxel| {
            Face::ALL.iter().all(|&face| {
                let open = voxel
                    .neighbor(face)
                    .map_or(true, |n| self.voxels[n.index()].is_separated);
                voxel.draw_faces.contains(face) == open
            })
        })
    }
}

impl std::ops::Index<VoxelId> for VoxelGrid {
    type Output = Voxel;

    fn index(&self, id: VoxelId) -> &Voxel {
        &self.voxels[id.index()]
    }
}

impl std::ops::IndexMut<VoxelId> for VoxelGrid {
    fn index_mut(&mut self, id: VoxelId) -> &mut Voxel {
        &mut self.voxels[id.index()]
    }
}

/// Structural checks on raw bake data.
fn validate(bake: &BakeData) -> Result<(), ConfigurationError> {
    let records = &bake.records;
    if records.is_empty() {
        return Err(ConfigurationError::EmptyGrid);
    }

    let mesh = &bake.mesh;
    if mesh.normals.len() != mesh.positions.len() || mesh.uvs.len() != mesh.positions.len() {
        return Err(ConfigurationError::MismatchedBuffers {
            positions: mesh.positions.len(),
            normals: mesh.normals.len(),
            uvs: mesh.uvs.len(),
        });
    }

    let len = records.len();
    let vertex_count = mesh.vertex_count();
    for (voxel, record) in records.iter().enumerate() {
        for face in Face::ALL {
            let index = record.adjacent_indexes[face.index()];
            let in_range = index == -1 || usize::try_from(index).is_ok_and(|i| i < len);
            if !in_range {
                return Err(ConfigurationError::AdjacencyOutOfRange { voxel, face, index, len });
            }
            if usize::try_from(index).ok() == Some(voxel) {
                return Err(ConfigurationError::SelfAdjacency { voxel, face });
            }

            let start = record.face_triangle_start_indexes[face.index()];
            if start as usize + 3 >= vertex_count {
                return Err(ConfigurationError::FaceStartOutOfRange {
                    voxel,
                    face,
                    start,
                    vertex_count,
                });
            }
        }
    }

    for (voxel, record) in records.iter().enumerate() {
        for face in Face::ALL {
            let Ok(neighbor) = usize::try_from(record.adjacent_indexes[face.index()]) else {
                continue;
            };
            let back = records[neighbor].adjacent_indexes[face.opposite().index()];
            if usize::try_from(back).ok() != Some(voxel) {
                return Err(ConfigurationError::AsymmetricAdjacency { voxel, neighbor, face });
            }
        }
    }

    Ok(())
}
