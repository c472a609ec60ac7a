//! Utility functions

use crate::types::Voxel;

/// View a voxel buffer as its raw in-memory bytes (host byte order)
pub fn voxels_as_bytes<T: Voxel>(data: &[T]) -> &[u8] {
    let byte_len = std::mem::size_of_val(data);

    // Plain unsigned integers have no padding and any alignment works for u8.
    unsafe { std::slice::from_raw_parts(data.as_ptr() as *const u8, byte_len) }
}

/// Format byte size in human-readable form
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Path of the tile holding Z slice `z`, zero-padded to two digits
pub fn tile_path(directory: &str, z: usize) -> String {
    format!("{}/{:02}.png", directory.trim_end_matches('/'), z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voxels_as_bytes() {
        let data: Vec<u16> = vec![0x0102, 0x0304];
        let bytes = voxels_as_bytes(&data);
        assert_eq!(bytes.len(), 4);
        assert_eq!(bytes, [0x0102u16.to_ne_bytes(), 0x0304u16.to_ne_bytes()].concat());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(16 * 1024 * 1024), "16.00 MB");
        assert_eq!(format_bytes(32 * 1024 * 1024), "32.00 MB");
    }

    #[test]
    fn test_tile_path() {
        assert_eq!(tile_path("images/channel", 0), "images/channel/00.png");
        assert_eq!(tile_path("images/channel", 7), "images/channel/07.png");
        assert_eq!(tile_path("images/segmentation/", 99), "images/segmentation/99.png");
        assert_eq!(tile_path("images/segmentation", 128), "images/segmentation/128.png");
    }
}
