//! Cube layout - voxel addressing and the division of a cube into Z-slice tiles

use crate::error::{Result, VolumeError};
use crate::types::Axis;
use crate::utils::tile_path;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Extent of a voxel cube along each axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CubeSize {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl CubeSize {
    /// Edge length of the cubes served by the tile layout
    pub const DEFAULT_EDGE: usize = 256;

    /// Create a new cube size.
    ///
    /// Every extent must be positive, and a buffer of the widest voxel type
    /// covering the whole cube must be addressable.
    pub fn new(x: usize, y: usize, z: usize) -> Result<Self> {
        if x == 0 || y == 0 || z == 0 {
            return Err(VolumeError::Configuration(format!(
                "Cube extents must be positive, got {} x {} x {}",
                x, y, z
            )));
        }

        let bytes = x
            .checked_mul(y)
            .and_then(|plane| plane.checked_mul(z))
            .and_then(|count| count.checked_mul(std::mem::size_of::<u32>()));
        match bytes {
            Some(bytes) if bytes <= isize::MAX as usize => Ok(Self { x, y, z }),
            _ => Err(VolumeError::Configuration(format!(
                "Cube of {} x {} x {} voxels is too large to address",
                x, y, z
            ))),
        }
    }

    /// A cube with the same extent on every axis
    pub fn cube(edge: usize) -> Result<Self> {
        Self::new(edge, edge, edge)
    }

    /// Extent along one axis
    pub fn get(&self, axis: Axis) -> usize {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Total number of voxels
    pub fn voxel_count(&self) -> usize {
        self.x * self.y * self.z
    }

    /// Number of voxels in one XY plane
    pub fn plane_len(&self) -> usize {
        self.x * self.y
    }

    /// Linear buffer index of a voxel: x varies fastest, then y, then z.
    ///
    /// No bounds checking happens here; out-of-range coordinates produce an
    /// index that either aliases another voxel or lies past the buffer end.
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + self.x * y + self.x * self.y * z
    }

    /// Check if coordinates are within bounds
    pub fn contains(&self, x: usize, y: usize, z: usize) -> bool {
        x < self.x && y < self.y && z < self.z
    }

    /// Width and height of the face perpendicular to `axis`
    pub fn face_size(&self, axis: Axis) -> (usize, usize) {
        let [u, v] = axis.face();
        (self.get(u), self.get(v))
    }

    /// Validate a slice index along `axis`
    pub fn check_slice(&self, axis: Axis, index: usize) -> Result<()> {
        let len = self.get(axis);
        if index >= len {
            return Err(VolumeError::OutOfRange { axis, index, len });
        }
        Ok(())
    }
}

impl Default for CubeSize {
    fn default() -> Self {
        Self {
            x: Self::DEFAULT_EDGE,
            y: Self::DEFAULT_EDGE,
            z: Self::DEFAULT_EDGE,
        }
    }
}

impl fmt::Display for CubeSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {} x {}", self.x, self.y, self.z)
    }
}

/// One tile to download: a single XY plane placed at a Z offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileSpec {
    /// Path relative to the tile source root, e.g. `images/channel/07.png`
    pub path: String,
    pub x: usize,
    pub y: usize,
    pub z: usize,
    pub width: usize,
    pub height: usize,
    /// Number of Z planes carried by the tile
    pub depth: usize,
}

impl TileSpec {
    /// Absolute URL path as served over HTTP
    pub fn url(&self) -> String {
        format!("/{}", self.path)
    }
}

/// Tiles covering a whole cube, one per Z slice, in ascending Z order
pub fn tile_specs(directory: &str, size: CubeSize) -> Vec<TileSpec> {
    (0..size.z)
        .map(|z| TileSpec {
            path: tile_path(directory, z),
            x: 0,
            y: 0,
            z,
            width: size.x,
            height: size.y,
            depth: 1,
        })
        .collect()
}
