//! Segment selection and channel compositing on full-size volumes

use image::{Rgba, RgbaImage};
use std::sync::Arc;
use voxcube::{Axis, FileSystemFetcher, Overlay, Placeholder, Volume, VolumeConfig};

fn empty_volume() -> Volume {
    let fetcher = Arc::new(FileSystemFetcher::new("/nonexistent"));
    Volume::new(VolumeConfig::default(), fetcher).unwrap()
}

fn blended(mut pixel: Rgba<u8>) -> Rgba<u8> {
    Overlay::HIGHLIGHT.blend(&mut pixel);
    pixel
}

#[test]
fn test_highlighted_segment_tints_placeholder() {
    let mut volume = empty_volume();
    volume
        .segmentation_mut()
        .insert_region(&vec![1u16; 256 * 256], 256, 0, 0, 5);

    assert_eq!(volume.toggle_segment(Axis::Z, 5, 0.5, 0.5).unwrap(), 1);
    assert!(volume.is_highlighted(1));

    let mut canvas = RgbaImage::new(256, 256);
    volume.render_channel_slice(&mut canvas, Axis::Z, 5).unwrap();

    let placeholder = Placeholder::global();
    for (x, y, pixel) in canvas.enumerate_pixels() {
        assert_eq!(*pixel, blended(placeholder.pixel(x, y)), "pixel ({}, {})", x, y);
    }

    // a neighbouring slice has no labels and shows the bare placeholder
    volume.render_channel_slice(&mut canvas, Axis::Z, 6).unwrap();
    assert_eq!(*canvas.get_pixel(10, 10), placeholder.pixel(10, 10));
}

#[test]
fn test_toggle_twice_restores_plain_render() {
    let mut volume = empty_volume();
    volume
        .segmentation_mut()
        .insert_region(&vec![42u16; 256 * 256], 256, 0, 0, 100);
    volume.channel_mut().insert_region(&vec![200u8; 256 * 256], 256, 0, 0, 100);

    assert_eq!(volume.toggle_segment(Axis::Z, 100, 0.2, 0.9).unwrap(), 42);
    let mut canvas = RgbaImage::new(256, 256);
    volume.render_channel_slice(&mut canvas, Axis::Z, 100).unwrap();
    // 200 * 0.75 = 150, 200 * 0.75 + 255 * 0.25 = 213.75
    assert_eq!(canvas.get_pixel(0, 0), &Rgba([150, 150, 213, 255]));

    assert_eq!(volume.toggle_segment(Axis::Z, 100, 0.2, 0.9).unwrap(), 42);
    assert!(volume.highlighted_segments().is_empty());
    volume.render_channel_slice(&mut canvas, Axis::Z, 100).unwrap();
    assert_eq!(canvas.get_pixel(0, 0), &Rgba([200, 200, 200, 255]));
}

#[test]
fn test_background_click_is_noop() {
    let mut volume = empty_volume();
    assert_eq!(volume.toggle_segment(Axis::Y, 17, 0.4, 0.4).unwrap(), 0);
    assert!(volume.highlighted_segments().is_empty());
}

#[test]
fn test_side_views_only_tint_the_segment() {
    let mut volume = empty_volume();
    // one labelled row at y = 3, z = 9
    volume.segmentation_mut().insert_region(&[7u16; 256], 256, 0, 3, 9);
    volume.channel_mut().insert_region(&vec![60u8; 256 * 256], 256, 0, 0, 9);

    // x slice: in-plane axes are (y, z)
    let y = 3.0 / 256.0;
    let z = 9.0 / 256.0;
    assert_eq!(volume.toggle_segment(Axis::X, 128, y, z).unwrap(), 7);

    let mut canvas = RgbaImage::new(256, 256);
    volume.render_channel_slice(&mut canvas, Axis::X, 128).unwrap();
    assert_eq!(*canvas.get_pixel(3, 9), blended(Rgba([60, 60, 60, 255])));
    assert_eq!(*canvas.get_pixel(4, 9), Rgba([60, 60, 60, 255]));
    assert_eq!(*canvas.get_pixel(3, 10), Placeholder::global().pixel(3, 10));

    // y slice through the labelled row: in-plane axes are (x, z)
    volume.render_channel_slice(&mut canvas, Axis::Y, 3).unwrap();
    for x in 0..256 {
        assert_eq!(*canvas.get_pixel(x, 9), blended(Rgba([60, 60, 60, 255])));
    }
}

#[test]
fn test_out_of_range_slice() {
    let mut volume = empty_volume();
    let mut canvas = RgbaImage::new(256, 256);
    assert!(volume.render_channel_slice(&mut canvas, Axis::Z, 256).is_err());
    assert!(volume.toggle_segment(Axis::X, 300, 0.5, 0.5).is_err());
}
