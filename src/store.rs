//! Dense voxel store with axis-aligned slicing
//!
//! A [`VoxelStore`] keeps a whole cube in one buffer with x varying fastest,
//! then y, then z. Z slices are therefore contiguous and can be handed out
//! without copying; X and Y slices are gathered voxel by voxel.

use crate::codec::PixelCodec;
use crate::error::Result;
use crate::layout::CubeSize;
use crate::render::RenderSink;
use crate::types::{Axis, Voxel, VoxelWidth};
use crate::utils::voxels_as_bytes;
use image::{Rgba, RgbaImage};
use std::borrow::Cow;

/// A cube of fixed-width unsigned integers
#[derive(Debug, Clone)]
pub struct VoxelStore<T: Voxel> {
    size: CubeSize,
    buffer: Vec<T>,
    codec: PixelCodec,
    clean: bool,
    loaded: bool,
}

impl<T: Voxel> VoxelStore<T> {
    /// Create a zeroed store using the host pixel codec
    pub fn new(size: CubeSize) -> Self {
        Self::with_codec(size, PixelCodec::host())
    }

    /// Create a zeroed store that packs and unpacks pixels with `codec`
    pub fn with_codec(size: CubeSize, codec: PixelCodec) -> Self {
        Self {
            size,
            buffer: vec![T::zero(); size.voxel_count()],
            codec,
            clean: true,
            loaded: false,
        }
    }

    /// Extent of the cube
    pub fn size(&self) -> CubeSize {
        self.size
    }

    /// Voxel width
    pub fn width(&self) -> VoxelWidth {
        T::WIDTH
    }

    /// Bytes per voxel (1, 2 or 4)
    pub fn bytes_per_voxel(&self) -> usize {
        T::WIDTH.size_in_bytes()
    }

    /// Codec used for raster input and output
    pub fn codec(&self) -> PixelCodec {
        self.codec
    }

    /// True while nothing has been written since creation or the last clear
    pub fn is_clean(&self) -> bool {
        self.clean
    }

    /// True once every tile of the store has been applied
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Mark whether every tile of the store has been applied
    pub(crate) fn set_loaded(&mut self, loaded: bool) {
        self.loaded = loaded;
    }

    /// Zero the buffer and reset the clean and loaded flags
    pub fn clear(&mut self) -> &mut Self {
        self.buffer.fill(T::zero());
        self.clean = true;
        self.loaded = false;
        self
    }

    /// Copy a row-major block of `width`-wide rows into Z slice `offset_z`.
    ///
    /// Element `i` of `values` lands at
    /// `(offset_x + i % width, offset_y + i / width, offset_z)`.
    ///
    /// # Caller obligation
    ///
    /// The block must fit inside the cube. Nothing is clamped: a block that
    /// overhangs the X edge spills into the next row, and one that runs past
    /// the end of the buffer panics. Debug builds assert the bounds.
    pub fn insert_region(
        &mut self,
        values: &[T],
        width: usize,
        offset_x: usize,
        offset_y: usize,
        offset_z: usize,
    ) -> &mut Self {
        if width == 0 || values.is_empty() {
            return self;
        }
        let rows = values.len().div_ceil(width);
        debug_assert!(
            offset_x + width <= self.size.x && offset_y + rows <= self.size.y && offset_z < self.size.z,
            "region {}x{} at ({}, {}, {}) does not fit a {} cube",
            width,
            rows,
            offset_x,
            offset_y,
            offset_z,
            self.size
        );

        for (row, chunk) in values.chunks(width).enumerate() {
            let start = self.size.index(offset_x, offset_y + row, offset_z);
            self.buffer[start..start + chunk.len()].copy_from_slice(chunk);
        }

        self.clean = false;
        self
    }

    /// Decode an RGBA raster through the pixel codec and place it like
    /// [`insert_region`](Self::insert_region), under the same caller obligation.
    pub fn insert_pixels(
        &mut self,
        image: &RgbaImage,
        offset_x: usize,
        offset_y: usize,
        offset_z: usize,
    ) -> &mut Self {
        debug_assert!(
            offset_x + image.width() as usize <= self.size.x
                && offset_y + image.height() as usize <= self.size.y
                && offset_z < self.size.z,
            "{}x{} raster at ({}, {}, {}) does not fit a {} cube",
            image.width(),
            image.height(),
            offset_x,
            offset_y,
            offset_z,
            self.size
        );

        let codec = self.codec;
        for (x, y, pixel) in image.enumerate_pixels() {
            let index = self.size.index(offset_x + x as usize, offset_y + y as usize, offset_z);
            self.buffer[index] = codec.decode(pixel.0);
        }

        self.clean = false;
        self
    }

    /// Voxel at (`x`, `y`, `z`).
    ///
    /// # Caller obligation
    ///
    /// Coordinates are not validated. Out-of-range values read a different
    /// voxel or panic past the end of the buffer; debug builds assert them.
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> T {
        debug_assert!(self.size.contains(x, y, z), "({}, {}, {}) outside {}", x, y, z, self.size);
        self.buffer[self.size.index(x, y, z)]
    }

    /// The whole buffer in addressing order
    pub fn as_slice(&self) -> &[T] {
        &self.buffer
    }

    /// The whole buffer as raw bytes in host byte order
    pub fn as_bytes(&self) -> &[u8] {
        voxels_as_bytes(&self.buffer)
    }

    /// Size of the buffer in bytes
    pub fn memory_bytes(&self) -> usize {
        self.buffer.len() * self.bytes_per_voxel()
    }

    /// The face perpendicular to `axis` at `index`, flattened.
    ///
    /// The element at `a + size[face0] * b` is the voxel whose first in-plane
    /// coordinate is `a` and second is `b` (faces: x → y,z; y → x,z; z → x,y).
    /// Z faces are contiguous and are borrowed unless `copy` is set; X and Y
    /// faces are always freshly allocated.
    pub fn slice(&self, axis: Axis, index: usize, copy: bool) -> Result<Cow<'_, [T]>> {
        self.size.check_slice(axis, index)?;

        let CubeSize {
            x: xsize,
            y: ysize,
            z: zsize,
        } = self.size;
        let xysize = self.size.plane_len();

        match axis {
            Axis::Z => {
                let start = index * xysize;
                let face = &self.buffer[start..start + xysize];
                if copy {
                    Ok(Cow::Owned(face.to_vec()))
                } else {
                    Ok(Cow::Borrowed(face))
                }
            }
            Axis::Y => {
                // every z row at fixed y is a contiguous run of x
                let mut square = Vec::with_capacity(xsize * zsize);
                for z in 0..zsize {
                    let start = self.size.index(0, index, z);
                    square.extend_from_slice(&self.buffer[start..start + xsize]);
                }
                Ok(Cow::Owned(square))
            }
            Axis::X => {
                let mut square = vec![T::zero(); ysize * zsize];
                let mut i = square.len();
                for z in (0..zsize).rev() {
                    for y in (0..ysize).rev() {
                        i -= 1;
                        square[i] = self.buffer[index + xsize * y + xysize * z];
                    }
                }
                Ok(Cow::Owned(square))
            }
        }
    }

    fn encode_slice(&self, axis: Axis, index: usize, encode: impl Fn(T) -> [u8; 4]) -> Result<RgbaImage> {
        let square = self.slice(axis, index, false)?;
        let (width, height) = self.size.face_size(axis);

        let mut image = RgbaImage::new(width as u32, height as u32);
        for (pixel, &value) in image.pixels_mut().zip(square.iter()) {
            *pixel = Rgba(encode(value));
        }
        Ok(image)
    }

    /// Color encoding of a slice, one voxel per pixel
    pub fn image_slice(&self, axis: Axis, index: usize) -> Result<RgbaImage> {
        let codec = self.codec;
        self.encode_slice(axis, index, |v| codec.encode(v))
    }

    /// Grayscale encoding of a slice from each voxel's low byte
    pub fn gray_image_slice(&self, axis: Axis, index: usize) -> Result<RgbaImage> {
        let codec = self.codec;
        self.encode_slice(axis, index, |v| codec.encode_gray(v))
    }

    /// Draw the color encoding of a slice at the sink origin
    pub fn render_image_slice(&self, sink: &mut dyn RenderSink, axis: Axis, index: usize) -> Result<()> {
        let image = self.image_slice(axis, index)?;
        sink.put_image(&image, 0, 0);
        Ok(())
    }

    /// Draw the grayscale encoding of a slice at the sink origin
    pub fn render_gray_image_slice(
        &self,
        sink: &mut dyn RenderSink,
        axis: Axis,
        index: usize,
    ) -> Result<()> {
        let image = self.gray_image_slice(axis, index)?;
        sink.put_image(&image, 0, 0);
        Ok(())
    }
}

/// A voxel store whose width is chosen at runtime
#[derive(Debug, Clone)]
pub enum AnyVoxelStore {
    U8(VoxelStore<u8>),
    U16(VoxelStore<u16>),
    U32(VoxelStore<u32>),
}

macro_rules! dispatch {
    ($store:expr, $inner:ident => $body:expr) => {
        match $store {
            AnyVoxelStore::U8($inner) => $body,
            AnyVoxelStore::U16($inner) => $body,
            AnyVoxelStore::U32($inner) => $body,
        }
    };
}

impl AnyVoxelStore {
    /// Create a zeroed store of `bytes_per_voxel` bytes per voxel
    pub fn new(size: CubeSize, bytes_per_voxel: u8) -> Result<Self> {
        Ok(match VoxelWidth::from_bytes(bytes_per_voxel)? {
            VoxelWidth::U8 => AnyVoxelStore::U8(VoxelStore::new(size)),
            VoxelWidth::U16 => AnyVoxelStore::U16(VoxelStore::new(size)),
            VoxelWidth::U32 => AnyVoxelStore::U32(VoxelStore::new(size)),
        })
    }

    /// Voxel width chosen at construction
    pub fn width(&self) -> VoxelWidth {
        dispatch!(self, s => s.width())
    }

    /// Extent of the cube
    pub fn size(&self) -> CubeSize {
        dispatch!(self, s => s.size())
    }

    /// Whether nothing was written since creation or the last clear
    pub fn is_clean(&self) -> bool {
        dispatch!(self, s => s.is_clean())
    }

    /// Whether every tile has been applied
    pub fn is_loaded(&self) -> bool {
        dispatch!(self, s => s.is_loaded())
    }

    /// Zero the buffer and reset the flags
    pub fn clear(&mut self) {
        dispatch!(self, s => {
            s.clear();
        })
    }

    /// Voxel widened to 32 bits, same caller obligation as [`VoxelStore::get`]
    pub fn get(&self, x: usize, y: usize, z: usize) -> u32 {
        dispatch!(self, s => s.get(x, y, z).to_word())
    }

    /// Decode an RGBA raster into the store, see [`VoxelStore::insert_pixels`]
    pub fn insert_pixels(&mut self, image: &RgbaImage, offset_x: usize, offset_y: usize, offset_z: usize) {
        dispatch!(self, s => {
            s.insert_pixels(image, offset_x, offset_y, offset_z);
        })
    }

    /// A face widened to 32-bit words, ordered like [`VoxelStore::slice`]
    pub fn slice_words(&self, axis: Axis, index: usize) -> Result<Vec<u32>> {
        dispatch!(self, s => Ok(s.slice(axis, index, false)?.iter().map(|v| v.to_word()).collect()))
    }

    /// Raw buffer bytes in host order
    pub fn as_bytes(&self) -> &[u8] {
        dispatch!(self, s => s.as_bytes())
    }

    /// Color encoded slice
    pub fn image_slice(&self, axis: Axis, index: usize) -> Result<RgbaImage> {
        dispatch!(self, s => s.image_slice(axis, index))
    }

    /// Grayscale encoded slice
    pub fn gray_image_slice(&self, axis: Axis, index: usize) -> Result<RgbaImage> {
        dispatch!(self, s => s.gray_image_slice(axis, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Endianness;
    use crate::error::VolumeError;

    /// 4 x 3 x 2 store where every voxel holds its own linear index
    fn indexed_store() -> VoxelStore<u16> {
        let size = CubeSize::new(4, 3, 2).unwrap();
        let mut store = VoxelStore::new(size);
        for z in 0..2 {
            let plane: Vec<u16> = (0..12).map(|i| (i + 12 * z) as u16).collect();
            store.insert_region(&plane, 4, 0, 0, z);
        }
        store
    }

    #[test]
    fn test_new_store_is_clean() {
        let store: VoxelStore<u8> = VoxelStore::new(CubeSize::new(4, 3, 2).unwrap());
        assert!(store.is_clean());
        assert!(!store.is_loaded());
        assert_eq!(store.bytes_per_voxel(), 1);
        assert_eq!(store.as_slice().len(), 24);
        assert!(store.as_slice().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_insert_region_and_get() {
        let mut store: VoxelStore<u16> = VoxelStore::new(CubeSize::new(4, 4, 3).unwrap());
        store.insert_region(&[1, 2, 3, 4, 5, 6], 3, 1, 2, 1);

        assert!(!store.is_clean());
        assert_eq!(store.get(1, 2, 1), 1);
        assert_eq!(store.get(3, 2, 1), 3);
        assert_eq!(store.get(1, 3, 1), 4);
        assert_eq!(store.get(3, 3, 1), 6);

        let written: u32 = store.as_slice().iter().map(|&v| u32::from(v)).sum();
        assert_eq!(written, 21);
        assert_eq!(store.get(0, 2, 1), 0);
        assert_eq!(store.get(1, 2, 0), 0);
        assert_eq!(store.get(1, 2, 2), 0);
    }

    #[test]
    fn test_insert_region_partial_last_row() {
        let mut store: VoxelStore<u8> = VoxelStore::new(CubeSize::new(3, 3, 1).unwrap());
        store.insert_region(&[7, 8, 9, 10], 3, 0, 0, 0);
        assert_eq!(store.get(0, 1, 0), 10);
        assert_eq!(store.get(1, 1, 0), 0);
    }

    #[test]
    fn test_clear() {
        let mut store = indexed_store();
        store.set_loaded(true);
        store.clear();
        assert!(store.is_clean());
        assert!(!store.is_loaded());
        assert!(store.as_slice().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_z_slice_is_borrowed_unless_copied() {
        let store = indexed_store();
        let view = store.slice(Axis::Z, 1, false).unwrap();
        assert!(matches!(view, Cow::Borrowed(_)));
        let copy = store.slice(Axis::Z, 1, true).unwrap();
        assert!(matches!(copy, Cow::Owned(_)));

        let expected: Vec<u16> = (12..24).collect();
        assert_eq!(&*view, expected.as_slice());
        assert_eq!(&*copy, expected.as_slice());
    }

    #[test]
    fn test_x_slice_orientation() {
        let store = indexed_store();
        // element a + 3 * b is voxel (1, a, b)
        let face = store.slice(Axis::X, 1, false).unwrap();
        assert_eq!(&*face, &[1, 5, 9, 13, 17, 21]);
    }

    #[test]
    fn test_y_slice_orientation() {
        let store = indexed_store();
        // element a + 4 * b is voxel (a, 2, b)
        let face = store.slice(Axis::Y, 2, true).unwrap();
        assert_eq!(&*face, &[8, 9, 10, 11, 20, 21, 22, 23]);
    }

    #[test]
    fn test_copy_modes_agree_on_every_axis() {
        let store = indexed_store();
        for axis in Axis::ALL {
            for index in 0..store.size().get(axis) {
                let view = store.slice(axis, index, false).unwrap();
                let copy = store.slice(axis, index, true).unwrap();
                let (w, h) = store.size().face_size(axis);
                assert_eq!(view.len(), w * h);
                assert_eq!(view, copy);
            }
        }
    }

    #[test]
    fn test_slice_out_of_range() {
        let store = indexed_store();
        assert!(matches!(
            store.slice(Axis::Z, 2, false),
            Err(VolumeError::OutOfRange { axis: Axis::Z, index: 2, len: 2 })
        ));
        assert!(store.slice(Axis::X, 4, true).is_err());
        assert!(store.image_slice(Axis::Y, 3).is_err());
    }

    #[test]
    fn test_gray_image_slice() {
        let mut store: VoxelStore<u8> = VoxelStore::new(CubeSize::new(4, 3, 2).unwrap());
        store.insert_region(&[77; 12], 4, 0, 0, 0);
        store.insert_region(&[77; 12], 4, 0, 0, 1);

        for axis in Axis::ALL {
            let image = store.gray_image_slice(axis, 0).unwrap();
            let (w, h) = store.size().face_size(axis);
            assert_eq!(image.dimensions(), (w as u32, h as u32));
            assert!(image.pixels().all(|p| p.0 == [77, 77, 77, 255]));
        }
    }

    #[test]
    fn test_image_slice_places_pixels() {
        let store = indexed_store();
        let image = store.image_slice(Axis::X, 2).unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        // voxel (2, y=1, z=1) = 2 + 4 + 12
        let expected = store.codec().encode(18u16);
        assert_eq!(image.get_pixel(1, 1).0, expected);
    }

    #[test]
    fn test_insert_pixels_decodes_labels() {
        let codec = PixelCodec::new(Endianness::Little);
        let mut store: VoxelStore<u16> = VoxelStore::with_codec(CubeSize::new(2, 2, 2).unwrap(), codec);
        let raster = RgbaImage::from_fn(2, 2, |x, y| Rgba([0x34, (x + 2 * y) as u8, 0xee, 0xff]));
        store.insert_pixels(&raster, 0, 0, 1);

        assert_eq!(store.get(0, 0, 1), 0x0034);
        assert_eq!(store.get(1, 1, 1), 0x0334);
        assert_eq!(store.get(1, 1, 0), 0);
        assert!(!store.is_clean());
    }

    #[test]
    fn test_render_gray_image_slice() {
        let store = indexed_store();
        let mut canvas = RgbaImage::new(4, 3);
        store.render_gray_image_slice(&mut canvas, Axis::Z, 0).unwrap();
        assert_eq!(canvas.get_pixel(3, 2).0, [11, 11, 11, 255]);
    }

    #[test]
    fn test_any_store_widths() {
        let size = CubeSize::new(2, 2, 2).unwrap();
        assert!(matches!(
            AnyVoxelStore::new(size, 3),
            Err(VolumeError::InvalidVoxelWidth(3))
        ));

        let mut store = AnyVoxelStore::new(size, 4).unwrap();
        assert_eq!(store.width(), VoxelWidth::U32);
        assert_eq!(store.as_bytes().len(), 32);

        let raster = RgbaImage::from_pixel(2, 2, Rgba(PixelCodec::host().encode(0x0102_0304u32)));
        store.insert_pixels(&raster, 0, 0, 0);
        assert_eq!(store.get(1, 0, 0), 0x0102_0304);
        assert_eq!(store.slice_words(Axis::Z, 0).unwrap(), vec![0x0102_0304; 4]);

        store.clear();
        assert!(store.is_clean());
    }
}
