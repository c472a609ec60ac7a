//! Pixel codec - packs voxel integers into RGBA quads and back
//!
//! Tiles arrive as RGBA8 rasters where a voxel value is spread over the
//! leading bytes of each pixel: a 1-byte channel voxel lives in red, a 2-byte
//! label in red + green (least significant first), a 4-byte voxel in all four
//! bytes. The codec reads each quad as one native 32-bit word and masks it,
//! so the masks depend on host byte order.

use crate::types::{Voxel, VoxelWidth};
use std::sync::OnceLock;

/// Byte order of 32-bit words in memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    /// Byte order of the running process, probed once and cached
    pub fn host() -> Self {
        static HOST: OnceLock<Endianness> = OnceLock::new();

        *HOST.get_or_init(|| {
            let probe: u32 = 255;
            if probe.to_ne_bytes()[0] == 255 {
                Endianness::Little
            } else {
                Endianness::Big
            }
        })
    }

    /// Read a pixel quad as a 32-bit word the way a host of this byte order would
    #[inline]
    fn read_word(&self, quad: [u8; 4]) -> u32 {
        match self {
            Endianness::Little => u32::from_le_bytes(quad),
            Endianness::Big => u32::from_be_bytes(quad),
        }
    }
}

/// Whether the process runs on a little-endian host
pub fn is_little_endian() -> bool {
    Endianness::host() == Endianness::Little
}

/// Mask selecting the voxel bits of a pixel word
pub fn decode_mask(endianness: Endianness, width: VoxelWidth) -> u32 {
    match (endianness, width) {
        (Endianness::Little, VoxelWidth::U8) => 0x0000_00ff,
        (Endianness::Little, VoxelWidth::U16) => 0x0000_ffff,
        (Endianness::Big, VoxelWidth::U8) => 0xff00_0000,
        (Endianness::Big, VoxelWidth::U16) => 0xffff_0000,
        (_, VoxelWidth::U32) => 0xffff_ffff,
    }
}

/// Per-channel byte masks of a pixel word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderMaskSet {
    pub r: u32,
    pub g: u32,
    pub b: u32,
    pub a: u32,
}

impl RenderMaskSet {
    pub const LITTLE_ENDIAN: Self = Self {
        r: 0x0000_00ff,
        g: 0x0000_ff00,
        b: 0x00ff_0000,
        a: 0xff00_0000,
    };

    pub const BIG_ENDIAN: Self = Self {
        r: 0xff00_0000,
        g: 0x00ff_0000,
        b: 0x0000_ff00,
        a: 0x0000_00ff,
    };

    /// Render masks matching `endianness`
    pub fn for_endianness(endianness: Endianness) -> Self {
        match endianness {
            Endianness::Little => Self::LITTLE_ENDIAN,
            Endianness::Big => Self::BIG_ENDIAN,
        }
    }
}

#[inline]
fn extract(word: u32, mask: u32) -> u8 {
    ((word & mask) >> mask.trailing_zeros()) as u8
}

/// Converts between voxel integers and RGBA pixel quads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelCodec {
    endianness: Endianness,
    masks: RenderMaskSet,
}

impl PixelCodec {
    /// Codec for an explicit byte order
    pub fn new(endianness: Endianness) -> Self {
        Self {
            endianness,
            masks: RenderMaskSet::for_endianness(endianness),
        }
    }

    /// Codec for the running host
    pub fn host() -> Self {
        Self::new(Endianness::host())
    }

    /// Byte order this codec works in
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Channel masks used when encoding
    pub fn masks(&self) -> RenderMaskSet {
        self.masks
    }

    /// Voxel in the order its bytes take inside a pixel word
    #[inline]
    fn pixel_word<T: Voxel>(&self, value: T) -> u32 {
        match self.endianness {
            Endianness::Little => value.to_word(),
            Endianness::Big => value.to_word().swap_bytes(),
        }
    }

    /// Extract the voxel stored in an RGBA quad
    #[inline]
    pub fn decode<T: Voxel>(&self, quad: [u8; 4]) -> T {
        let masked = self.endianness.read_word(quad) & decode_mask(self.endianness, T::WIDTH);
        let value = match self.endianness {
            Endianness::Little => masked,
            Endianness::Big => masked.swap_bytes(),
        };
        T::from_word(value)
    }

    /// Pack a voxel into an RGBA quad.
    ///
    /// Voxels narrower than 4 bytes have no alpha bits and come out opaque.
    #[inline]
    pub fn encode<T: Voxel>(&self, value: T) -> [u8; 4] {
        let word = self.pixel_word(value);
        let alpha = if T::WIDTH == VoxelWidth::U32 {
            extract(word, self.masks.a)
        } else {
            0xff
        };
        [
            extract(word, self.masks.r),
            extract(word, self.masks.g),
            extract(word, self.masks.b),
            alpha,
        ]
    }

    /// Pack the low byte of a voxel as an opaque gray pixel
    #[inline]
    pub fn encode_gray<T: Voxel>(&self, value: T) -> [u8; 4] {
        let r = extract(self.pixel_word(value), self.masks.r);
        [r, r, r, 0xff]
    }
}

impl Default for PixelCodec {
    fn default() -> Self {
        Self::host()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CODECS: [PixelCodec; 2] = [
        PixelCodec {
            endianness: Endianness::Little,
            masks: RenderMaskSet::LITTLE_ENDIAN,
        },
        PixelCodec {
            endianness: Endianness::Big,
            masks: RenderMaskSet::BIG_ENDIAN,
        },
    ];

    #[test]
    fn test_host_probe_is_stable() {
        let first = Endianness::host();
        assert_eq!(Endianness::host(), first);
        assert_eq!(is_little_endian(), cfg!(target_endian = "little"));
    }

    #[test]
    fn test_decode_mask_table() {
        assert_eq!(decode_mask(Endianness::Little, VoxelWidth::U8), 0x0000_00ff);
        assert_eq!(decode_mask(Endianness::Little, VoxelWidth::U16), 0x0000_ffff);
        assert_eq!(decode_mask(Endianness::Little, VoxelWidth::U32), 0xffff_ffff);
        assert_eq!(decode_mask(Endianness::Big, VoxelWidth::U8), 0xff00_0000);
        assert_eq!(decode_mask(Endianness::Big, VoxelWidth::U16), 0xffff_0000);
        assert_eq!(decode_mask(Endianness::Big, VoxelWidth::U32), 0xffff_ffff);
    }

    #[test]
    fn test_decode_reads_leading_bytes() {
        for codec in CODECS {
            assert_eq!(codec.decode::<u8>([0x12, 0x34, 0x56, 0x78]), 0x12);
            assert_eq!(codec.decode::<u16>([0x12, 0x34, 0x56, 0x78]), 0x3412);
            assert_eq!(codec.decode::<u32>([0x12, 0x34, 0x56, 0x78]), 0x7856_3412);
        }
    }

    #[test]
    fn test_encode_alpha() {
        let codec = PixelCodec::new(Endianness::Little);
        assert_eq!(codec.encode(0x1234u16), [0x34, 0x12, 0x00, 0xff]);
        assert_eq!(codec.encode(0x07u8), [0x07, 0x00, 0x00, 0xff]);
        assert_eq!(codec.encode(0x8040_2010u32), [0x10, 0x20, 0x40, 0x80]);
        assert_eq!(codec.encode(0x0000_0001u32), [0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_encode_gray() {
        for codec in CODECS {
            assert_eq!(codec.encode_gray(200u8), [200, 200, 200, 255]);
            assert_eq!(codec.encode_gray(0x1234u16), [0x34, 0x34, 0x34, 255]);
        }
    }

    #[test]
    fn test_round_trip_u8_and_u16() {
        for codec in CODECS {
            for v in 0..=u8::MAX {
                assert_eq!(codec.decode::<u8>(codec.encode(v)), v);
            }
            for v in 0..=u16::MAX {
                assert_eq!(codec.decode::<u16>(codec.encode(v)), v);
            }
        }
    }

    #[test]
    fn test_round_trip_u32() {
        let samples = [0u32, 1, 0xff, 0x100, 0xffff, 0x1_0000, 0x00ab_cdef, 0x8000_0000, u32::MAX];
        for codec in CODECS {
            for v in samples {
                assert_eq!(codec.decode::<u32>(codec.encode(v)), v);
            }
        }
    }
}
