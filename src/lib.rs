//! voxcube - tiled voxel cubes for slice viewers
//!
//! Two cubes of the same size back a viewer: a grayscale *channel* cube and
//! a *segmentation* cube of integer labels. Both arrive as stacks of PNG
//! tiles, one per Z slice, with voxel values packed into the pixel bytes.
//!
//! # Features
//!
//! - Flat voxel stores of 1, 2 or 4 bytes per voxel
//! - Zero-copy Z slices, gathered X and Y slices
//! - Host-endianness aware pixel codec
//! - Concurrent tile downloads with retry, progress and abort
//! - Segment highlighting composited over the channel slices
//!
//! # Tile sources
//!
//! Tiles are read from the local file system out of the box. Enable the
//! `http-client` feature for HTTP(S) sources, or implement [`TileFetcher`]
//! for anything else.
//!
//! # Example
//!
//! ```rust,ignore
//! use voxcube::{create_fetcher, Axis, Volume, VolumeConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = create_fetcher("file:///data/cube")?;
//! let mut volume: Volume = Volume::new(VolumeConfig::default(), fetcher)?;
//! volume.load().await?;
//!
//! volume.toggle_segment(Axis::Z, 100, 0.5, 0.5)?;
//! let mut canvas = image::RgbaImage::new(256, 256);
//! volume.render_channel_slice(&mut canvas, Axis::Z, 100)?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod fetch;
pub mod layout;
pub mod placeholder;
pub mod render;
pub mod store;
pub mod types;
pub mod utils;
pub mod volume;

// Re-exports
pub use codec::{Endianness, PixelCodec, RenderMaskSet};
pub use config::{RetryPolicy, VolumeConfig};
pub use error::{Result, VolumeError};
pub use fetch::{create_fetcher, FileSystemFetcher, TileFetcher, TileSource};
pub use layout::{CubeSize, TileSpec};
pub use placeholder::Placeholder;
pub use render::{Overlay, PngDecoder, RasterDecoder, RenderSink};
pub use store::{AnyVoxelStore, VoxelStore};
pub use types::{Axis, Voxel, VoxelWidth};
pub use volume::{LoadHandle, LoadState, RequestState, StoreKind, Volume, VolumeStats};

#[cfg(feature = "http-client")]
pub use fetch::HttpFetcher;

/// Version of the voxcube crate
pub const VOXCUBE_VERSION: &str = env!("CARGO_PKG_VERSION");
