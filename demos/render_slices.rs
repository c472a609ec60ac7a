//! Example: load a tiled volume and write highlighted slices as PNG files
//!
//! Run with: cargo run --example render_slices -- [SOURCE] [OUT_DIR]
//!
//! SOURCE is a directory or URL holding `images/channel/NN.png` and
//! `images/segmentation/NN.png`. Without it a small synthetic volume is
//! generated in a temporary directory.

use anyhow::Context;
use image::{ImageFormat, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use voxcube::{create_fetcher, Axis, PixelCodec, Volume, VolumeConfig};

const SYNTHETIC_EDGE: usize = 64;

/// Write a cube with a gradient channel and two spherical segments
fn write_synthetic_tiles(root: &Path) -> anyhow::Result<()> {
    let codec = PixelCodec::host();
    let edge = SYNTHETIC_EDGE as i64;
    let centers = [(20i64, 24i64, 32i64, 1u16), (44, 40, 30, 2)];

    for dir in ["images/channel", "images/segmentation"] {
        std::fs::create_dir_all(root.join(dir))?;
    }

    for z in 0..edge {
        let channel = RgbaImage::from_fn(edge as u32, edge as u32, |x, y| {
            Rgba(codec.encode((40 + x + y + z as u32) as u8))
        });
        let segmentation = RgbaImage::from_fn(edge as u32, edge as u32, |x, y| {
            let label = centers
                .iter()
                .find(|(cx, cy, cz, _)| {
                    let (dx, dy, dz) = (x as i64 - cx, y as i64 - cy, z - cz);
                    dx * dx + dy * dy + dz * dz < 12 * 12
                })
                .map_or(0, |c| c.3);
            Rgba(codec.encode(label))
        });

        channel.save_with_format(root.join(format!("images/channel/{:02}.png", z)), ImageFormat::Png)?;
        segmentation.save_with_format(
            root.join(format!("images/segmentation/{:02}.png", z)),
            ImageFormat::Png,
        )?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let source = args.next();
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| "slices".to_string()));

    let synthetic = tempfile::TempDir::new()?;
    let (url, config) = match source {
        Some(url) => (url, VolumeConfig::default()),
        None => {
            println!("No source given, generating a {0}x{0}x{0} volume", SYNTHETIC_EDGE);
            write_synthetic_tiles(synthetic.path())?;
            (
                synthetic.path().display().to_string(),
                VolumeConfig::new().with_edge(SYNTHETIC_EDGE),
            )
        }
    };

    let fetcher = create_fetcher(&url)?;
    let mut volume: Volume = Volume::new(config, fetcher)?;
    volume.load().await.with_context(|| format!("loading volume from {}", url))?;
    println!("{}", volume.stats().summary());

    let middle = volume.size().z / 2;
    for (nx, ny) in [(0.3, 0.35), (0.7, 0.65)] {
        let label = volume.toggle_segment(Axis::Z, middle, nx, ny)?;
        println!("Clicked ({:.2}, {:.2}) on z={}: segment {}", nx, ny, middle, label);
    }

    std::fs::create_dir_all(&out_dir)?;
    for axis in Axis::ALL {
        let (width, height) = volume.size().face_size(axis);
        let mut canvas = RgbaImage::new(width as u32, height as u32);

        volume.render_channel_slice(&mut canvas, axis, middle)?;
        let path = out_dir.join(format!("channel_{}.png", axis));
        canvas.save_with_format(&path, ImageFormat::Png)?;

        volume.render_segmentation_slice(&mut canvas, axis, middle)?;
        canvas.save_with_format(out_dir.join(format!("segmentation_{}.png", axis)), ImageFormat::Png)?;

        println!("Wrote {} slice {} to {}", axis, middle, path.display());
    }

    Ok(())
}
