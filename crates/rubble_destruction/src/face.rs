//! # Cube Faces
//!
//! The six faces of a voxel, in the order used by bake data:
//! FRONT, RIGHT, TOP, LEFT, BOTTOM, BACK.

use rubble_core::Vec3;
use serde::{Deserialize, Serialize};

/// One face of a voxel cube.
///
/// The discriminant is the index into every per-face array
/// (`draw_faces`, `adjacent`, `face_triangle_start`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Face {
    /// Facing negative Z
    Front = 0,
    /// Facing positive X
    Right = 1,
    /// Facing positive Y
    Top = 2,
    /// Facing negative X
    Left = 3,
    /// Facing negative Y
    Bottom = 4,
    /// Facing positive Z
    Back = 5,
}

/// Vertex offsets of the two triangles of a face quad, relative to the
/// face's first vertex. Quads are wound counter-clockwise seen from outside.
pub const QUAD_OFFSETS: [u32; 6] = [0, 1, 2, 0, 2, 3];

/// Vertices per face quad.
pub const VERTICES_PER_FACE: u32 = 4;

/// Indices emitted per drawn face.
pub const INDICES_PER_FACE: usize = 6;

impl Face {
    /// All faces in bake order.
    pub const ALL: [Face; 6] = [
        Face::Front,
        Face::Right,
        Face::Top,
        Face::Left,
        Face::Bottom,
        Face::Back,
    ];

    /// Index into per-face arrays.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Face for an array index, if in range.
    #[inline]
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Front),
            1 => Some(Self::Right),
            2 => Some(Self::Top),
            3 => Some(Self::Left),
            4 => Some(Self::Bottom),
            5 => Some(Self::Back),
            _ => None,
        }
    }

    /// The face pointing the other way.
    #[inline]
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Front => Self::Back,
            Self::Right => Self::Left,
            Self::Top => Self::Bottom,
            Self::Left => Self::Right,
            Self::Bottom => Self::Top,
            Self::Back => Self::Front,
        }
    }

    /// Outward unit normal in grid-local space.
    #[must_use]
    pub const fn normal(self) -> Vec3 {
        match self {
            Self::Front => Vec3::new(0.0, 0.0, -1.0),
            Self::Right => Vec3::new(1.0, 0.0, 0.0),
            Self::Top => Vec3::new(0.0, 1.0, 0.0),
            Self::Left => Vec3::new(-1.0, 0.0, 0.0),
            Self::Bottom => Vec3::new(0.0, -1.0, 0.0),
            Self::Back => Vec3::new(0.0, 0.0, 1.0),
        }
    }

    /// Integer lattice step toward the neighbor on this face.
    #[must_use]
    pub const fn step(self) -> [i32; 3] {
        match self {
            Self::Front => [0, 0, -1],
            Self::Right => [1, 0, 0],
            Self::Top => [0, 1, 0],
            Self::Left => [-1, 0, 0],
            Self::Bottom => [0, -1, 0],
            Self::Back => [0, 0, 1],
        }
    }
}

/// Bitset of drawn faces, bit `i` = `Face::ALL[i]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FaceMask(u8);

impl FaceMask {
    /// No face drawn.
    pub const NONE: Self = Self(0);

    /// Every face drawn.
    pub const ALL: Self = Self(0b11_1111);

    /// Builds a mask from the bake's per-face booleans.
    #[must_use]
    pub fn from_array(flags: [bool; 6]) -> Self {
        let mut mask = Self::NONE;
        for face in Face::ALL {
            mask.set(face, flags[face.index()]);
        }
        mask
    }

    /// Per-face booleans in bake order.
    #[must_use]
    pub fn to_array(self) -> [bool; 6] {
        Face::ALL.map(|face| self.contains(face))
    }

    /// Whether `face` is drawn.
    #[inline]
    #[must_use]
    pub const fn contains(self, face: Face) -> bool {
        self.0 & (1 << face as u8) != 0
    }

    /// Sets or clears `face`.
    #[inline]
    pub fn set(&mut self, face: Face, drawn: bool) {
        if drawn {
            self.0 |= 1 << face as u8;
        } else {
            self.0 &= !(1 << face as u8);
        }
    }

    /// Whether any face is drawn.
    #[inline]
    #[must_use]
    pub const fn any(self) -> bool {
        self.0 != 0
    }

    /// Number of drawn faces.
    #[inline]
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Drawn faces in bake order.
    pub fn iter(self) -> impl Iterator<Item = Face> {
        Face::ALL.into_iter().filter(move |&face| self.contains(face))
    }
}
