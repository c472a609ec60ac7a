//! Core data types for voxel cubes

use crate::error::{Result, VolumeError};
use num_traits::{PrimInt, Unsigned};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three cube axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Convert to usize index (x = 0, y = 1, z = 2)
    pub fn to_index(&self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// The two in-plane axes of the face perpendicular to this axis.
    ///
    /// The first one varies fastest in a slice and becomes the image width.
    pub fn face(&self) -> [Axis; 2] {
        match self {
            Axis::X => [Axis::Y, Axis::Z],
            Axis::Y => [Axis::X, Axis::Z],
            Axis::Z => [Axis::X, Axis::Y],
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        f.write_str(name)
    }
}

impl FromStr for Axis {
    type Err = VolumeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "x" | "X" => Ok(Axis::X),
            "y" | "Y" => Ok(Axis::Y),
            "z" | "Z" => Ok(Axis::Z),
            other => Err(VolumeError::InvalidAxis(other.to_string())),
        }
    }
}

/// Number of bytes used to store one voxel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum VoxelWidth {
    /// Unsigned 8-bit integer
    U8 = 1,
    /// Unsigned 16-bit integer
    U16 = 2,
    /// Unsigned 32-bit integer
    U32 = 4,
}

impl VoxelWidth {
    /// Parse a byte count, failing for anything but 1, 2 or 4
    pub fn from_bytes(bytes: u8) -> Result<Self> {
        match bytes {
            1 => Ok(VoxelWidth::U8),
            2 => Ok(VoxelWidth::U16),
            4 => Ok(VoxelWidth::U32),
            other => Err(VolumeError::InvalidVoxelWidth(other)),
        }
    }

    /// Size in bytes of one voxel
    pub fn size_in_bytes(&self) -> usize {
        *self as usize
    }
}

impl TryFrom<u8> for VoxelWidth {
    type Error = VolumeError;

    fn try_from(value: u8) -> Result<Self> {
        Self::from_bytes(value)
    }
}

impl From<VoxelWidth> for u8 {
    fn from(width: VoxelWidth) -> Self {
        width as u8
    }
}

impl fmt::Display for VoxelWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-byte", self.size_in_bytes())
    }
}

/// Unsigned integer type that can be stored in a voxel cube
pub trait Voxel: PrimInt + Unsigned + Default + fmt::Debug + Send + Sync + 'static {
    /// Width of the integer
    const WIDTH: VoxelWidth;

    /// Truncate a 32-bit word to this width
    fn from_word(word: u32) -> Self;

    /// Widen to a 32-bit word
    fn to_word(self) -> u32;
}

macro_rules! impl_voxel {
    ($ty:ty, $width:expr) => {
        impl Voxel for $ty {
            const WIDTH: VoxelWidth = $width;

            #[inline]
            fn from_word(word: u32) -> Self {
                word as $ty
            }

            #[inline]
            fn to_word(self) -> u32 {
                self as u32
            }
        }
    };
}

impl_voxel!(u8, VoxelWidth::U8);
impl_voxel!(u16, VoxelWidth::U16);
impl_voxel!(u32, VoxelWidth::U32);
