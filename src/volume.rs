//! Volume - a channel cube and a segmentation cube assembled from tiles
//!
//! [`Volume::load`] downloads one tile per Z slice for each of the two stores,
//! decodes the tiles and writes them into the stores as they arrive. Progress
//! can be watched and the download cancelled through a [`LoadHandle`] while
//! the load future holds the volume.

use crate::config::{RetryPolicy, VolumeConfig};
use crate::error::{Result, VolumeError};
use crate::fetch::TileFetcher;
use crate::layout::{tile_specs, CubeSize, TileSpec};
use crate::placeholder::Placeholder;
use crate::render::{composite_channel, Overlay, PngDecoder, RasterDecoder, RenderSink};
use crate::store::VoxelStore;
use crate::types::{Axis, Voxel, VoxelWidth};
use crate::utils::format_bytes;
use futures::future::{AbortHandle, Abortable};
use futures::stream::{FuturesUnordered, StreamExt};
use image::RgbaImage;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which of the two stores a tile belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    Channel,
    Segmentation,
}

impl StoreKind {
    pub const ALL: [StoreKind; 2] = [StoreKind::Channel, StoreKind::Segmentation];
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Channel => f.write_str("channel"),
            StoreKind::Segmentation => f.write_str("segmentation"),
        }
    }
}

/// State of one tile request in the current load cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    Resolved,
    Failed,
    Cancelled,
}

impl RequestState {
    /// Whether the request has reached a terminal state
    pub fn is_settled(&self) -> bool {
        !matches!(self, RequestState::Pending)
    }
}

/// Phase of the most recent load cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Complete,
    Failed,
}

#[derive(Debug)]
struct RequestTracker {
    state: LoadState,
    requests: Vec<RequestState>,
    abort: Option<AbortHandle>,
}

impl RequestTracker {
    fn new() -> Self {
        Self {
            state: LoadState::Idle,
            requests: Vec::new(),
            abort: None,
        }
    }

    fn begin(&mut self, count: usize, abort: AbortHandle) {
        self.state = LoadState::Loading;
        self.requests = vec![RequestState::Pending; count];
        self.abort = Some(abort);
    }

    /// Settle a pending request, false if it was cancelled meanwhile
    fn settle(&mut self, index: usize, state: RequestState) -> bool {
        match self.requests.get_mut(index) {
            Some(request) if *request == RequestState::Pending => {
                *request = state;
                true
            }
            _ => false,
        }
    }

    fn finish(&mut self, state: LoadState) {
        self.state = state;
        self.requests.clear();
        self.abort = None;
    }

    /// Cancel the cycle while requests are still pending.
    ///
    /// Once every request has settled the outcome is decided and the call
    /// returns false.
    fn abort(&mut self) -> bool {
        if self.state != LoadState::Loading || self.count(RequestState::Pending) == 0 {
            return false;
        }
        let Some(handle) = self.abort.take() else {
            return false;
        };
        handle.abort();
        for request in self.requests.iter_mut().filter(|r| !r.is_settled()) {
            *request = RequestState::Cancelled;
        }
        true
    }

    fn progress(&self) -> f64 {
        if self.requests.is_empty() {
            return 0.0;
        }
        let settled = self.requests.iter().filter(|r| r.is_settled()).count();
        settled as f64 / self.requests.len() as f64
    }

    fn count(&self, state: RequestState) -> usize {
        self.requests.iter().filter(|&&r| r == state).count()
    }
}

/// Finishes the load cycle even when the load future is dropped midway
struct CycleGuard {
    requests: Arc<Mutex<RequestTracker>>,
    outcome: LoadState,
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.requests.lock().finish(self.outcome);
    }
}

/// Observes and cancels the load cycles of one volume
#[derive(Debug, Clone)]
pub struct LoadHandle {
    requests: Arc<Mutex<RequestTracker>>,
}

impl LoadHandle {
    /// Phase of the current or last load cycle
    pub fn state(&self) -> LoadState {
        self.requests.lock().state
    }

    /// Whether a load cycle is running
    pub fn is_loading(&self) -> bool {
        self.state() == LoadState::Loading
    }

    /// Share of tile requests that have settled, 1.0 after a complete load
    pub fn progress(&self) -> f64 {
        let requests = self.requests.lock();
        match requests.state {
            LoadState::Complete => 1.0,
            _ => requests.progress(),
        }
    }

    /// Number of requests of the running cycle in `state`
    pub fn count(&self, state: RequestState) -> usize {
        self.requests.lock().count(state)
    }

    /// Cancel the running load, returns false when nothing was loading
    pub fn abort(&self) -> bool {
        let aborted = self.requests.lock().abort();
        if aborted {
            info!("aborting volume load");
        }
        aborted
    }
}

/// Summary of a volume
#[derive(Debug, Clone)]
pub struct VolumeStats {
    pub size: CubeSize,
    pub total_voxels: usize,
    pub channel_width: VoxelWidth,
    pub segmentation_width: VoxelWidth,
    pub channel_bytes: usize,
    pub segmentation_bytes: usize,
    pub channel_loaded: bool,
    pub segmentation_loaded: bool,
    pub highlighted: usize,
    pub progress: f64,
}

impl VolumeStats {
    /// One-line human readable summary
    pub fn summary(&self) -> String {
        let status = |loaded: bool| if loaded { "loaded" } else { "not loaded" };
        format!(
            "{} volume: {} voxels, channel {} ({}, {}), segmentation {} ({}, {}), {} highlighted, {:.0}% loaded",
            self.size,
            self.total_voxels,
            format_bytes(self.channel_bytes),
            self.channel_width,
            status(self.channel_loaded),
            format_bytes(self.segmentation_bytes),
            self.segmentation_width,
            status(self.segmentation_loaded),
            self.highlighted,
            self.progress * 100.0,
        )
    }
}

/// Map a normalized coordinate onto an axis of `len` voxels
fn scale(norm: f64, len: usize) -> f64 {
    (norm * len as f64).round()
}

fn to_coord(value: f64, len: usize) -> Option<usize> {
    if value >= 0.0 && value < len as f64 {
        Some(value as usize)
    } else {
        None
    }
}

fn check_tile_fits(image: &RgbaImage, spec: &TileSpec, size: CubeSize) -> Result<()> {
    let (width, height) = (image.width() as usize, image.height() as usize);
    if spec.x + width > size.x || spec.y + height > size.y {
        return Err(VolumeError::Decode(format!(
            "{}x{} tile {} does not fit the {} cube",
            width, height, spec.path, size
        )));
    }
    Ok(())
}

/// Fetch and decode one tile, retrying transient failures
async fn fetch_tile(
    index: usize,
    spec: TileSpec,
    size: CubeSize,
    fetcher: Arc<dyn TileFetcher>,
    decoder: Arc<dyn RasterDecoder>,
    retry: RetryPolicy,
) -> (usize, Result<RgbaImage>) {
    let mut attempt = 1;
    loop {
        let outcome = match fetcher.fetch(&spec.path).await {
            Ok(bytes) => decoder
                .decode(&bytes)
                .and_then(|image| check_tile_fits(&image, &spec, size).map(|_| image)),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(image) => return (index, Ok(image)),
            Err(e) if !e.is_transient() => return (index, Err(e)),
            Err(e) if attempt < retry.max_attempts => {
                warn!(path = %spec.path, attempt, "tile failed, retrying: {}", e);
                tokio::time::sleep(retry.delay()).await;
                attempt += 1;
            }
            Err(e) => {
                return (
                    index,
                    Err(VolumeError::RetryBudgetExceeded {
                        path: spec.path,
                        attempts: attempt,
                        last: Box::new(e),
                    }),
                )
            }
        }
    }
}

/// A grayscale channel cube and a label cube of the same size
pub struct Volume<C: Voxel = u8, S: Voxel = u16> {
    config: VolumeConfig,
    channel: VoxelStore<C>,
    segmentation: VoxelStore<S>,
    highlighted: HashSet<u32>,
    fetcher: Arc<dyn TileFetcher>,
    decoder: Arc<dyn RasterDecoder>,
    requests: Arc<Mutex<RequestTracker>>,
}

impl<C: Voxel, S: Voxel> Volume<C, S> {
    /// Create a volume with empty stores sized by `config`
    pub fn new(config: VolumeConfig, fetcher: Arc<dyn TileFetcher>) -> Result<Self> {
        config.validate()?;
        let size = config.cube_size()?;
        Self::from_stores(config, VoxelStore::new(size), VoxelStore::new(size), fetcher)
    }

    /// Create a volume around existing stores, which must have the configured size
    pub fn from_stores(
        config: VolumeConfig,
        channel: VoxelStore<C>,
        segmentation: VoxelStore<S>,
        fetcher: Arc<dyn TileFetcher>,
    ) -> Result<Self> {
        config.validate()?;
        let size = config.cube_size()?;
        if channel.size() != size || segmentation.size() != size {
            return Err(VolumeError::Configuration(format!(
                "Store sizes {} and {} do not match the configured {}",
                channel.size(),
                segmentation.size(),
                size
            )));
        }

        Ok(Self {
            config,
            channel,
            segmentation,
            highlighted: HashSet::new(),
            fetcher,
            decoder: Arc::new(PngDecoder),
            requests: Arc::new(Mutex::new(RequestTracker::new())),
        })
    }

    /// Replace the raster decoder used for tiles
    pub fn with_decoder(mut self, decoder: Arc<dyn RasterDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Get the volume configuration
    pub fn config(&self) -> &VolumeConfig {
        &self.config
    }

    /// Get the cube size shared by both stores
    pub fn size(&self) -> CubeSize {
        self.channel.size()
    }

    /// Get the channel store
    pub fn channel(&self) -> &VoxelStore<C> {
        &self.channel
    }

    /// Get the channel store for direct writes
    pub fn channel_mut(&mut self) -> &mut VoxelStore<C> {
        &mut self.channel
    }

    /// Get the segmentation store
    pub fn segmentation(&self) -> &VoxelStore<S> {
        &self.segmentation
    }

    /// Get the segmentation store for direct writes
    pub fn segmentation_mut(&mut self) -> &mut VoxelStore<S> {
        &mut self.segmentation
    }

    /// Handle for watching or cancelling loads from elsewhere
    pub fn handle(&self) -> LoadHandle {
        LoadHandle {
            requests: Arc::clone(&self.requests),
        }
    }

    fn directory(&self, store: StoreKind) -> &str {
        match store {
            StoreKind::Channel => &self.config.channel_dir,
            StoreKind::Segmentation => &self.config.segmentation_dir,
        }
    }

    /// The tiles that make up one store, in ascending Z order
    pub fn tile_specs(&self, store: StoreKind) -> Vec<TileSpec> {
        tile_specs(self.directory(store), self.size())
    }

    /// Download both stores.
    ///
    /// Resolves once every tile of both stores has been applied. Fails with
    /// [`VolumeError::RetryBudgetExceeded`] as soon as one tile runs out of
    /// attempts and with [`VolumeError::Aborted`] when the load is cancelled;
    /// tiles applied before that stay in place.
    pub async fn load(&mut self) -> Result<()> {
        if !self.channel.is_clean() {
            self.channel.clear();
        }
        if !self.segmentation.is_clean() {
            self.segmentation.clear();
        }

        let jobs: Vec<(StoreKind, TileSpec)> = StoreKind::ALL
            .iter()
            .flat_map(|&store| self.tile_specs(store).into_iter().map(move |spec| (store, spec)))
            .collect();

        let (abort_handle, registration) = AbortHandle::new_pair();
        self.requests.lock().begin(jobs.len(), abort_handle);
        let mut guard = CycleGuard {
            requests: Arc::clone(&self.requests),
            outcome: LoadState::Failed,
        };

        info!(tiles = jobs.len(), size = %self.size(), "loading volume");

        let result = match Abortable::new(self.apply_tiles(&jobs), registration).await {
            Ok(result) => result,
            Err(_) => Err(VolumeError::Aborted),
        };

        match &result {
            Ok(()) => {
                info!("volume loaded");
                guard.outcome = LoadState::Complete;
            }
            Err(e) => warn!("volume load failed: {}", e),
        }

        result
    }

    /// Drive all tile fetches and write each tile into its store as it lands
    async fn apply_tiles(&mut self, jobs: &[(StoreKind, TileSpec)]) -> Result<()> {
        let size = self.size();
        let mut pending: FuturesUnordered<_> = jobs
            .iter()
            .enumerate()
            .map(|(index, (_, spec))| {
                fetch_tile(
                    index,
                    spec.clone(),
                    size,
                    Arc::clone(&self.fetcher),
                    Arc::clone(&self.decoder),
                    self.config.retry,
                )
            })
            .collect();

        let mut remaining_channel = jobs.iter().filter(|(s, _)| *s == StoreKind::Channel).count();
        let mut remaining_segmentation = jobs.len() - remaining_channel;

        while let Some((index, outcome)) = pending.next().await {
            let (store, spec) = &jobs[index];
            let state = match outcome {
                Ok(_) => RequestState::Resolved,
                Err(_) => RequestState::Failed,
            };
            if !self.requests.lock().settle(index, state) {
                return Err(VolumeError::Aborted);
            }

            match outcome {
                Ok(image) => {
                    match store {
                        StoreKind::Channel => {
                            self.channel.insert_pixels(&image, spec.x, spec.y, spec.z);
                            remaining_channel -= 1;
                            if remaining_channel == 0 {
                                self.channel.set_loaded(true);
                                debug!("channel store loaded");
                            }
                        }
                        StoreKind::Segmentation => {
                            self.segmentation.insert_pixels(&image, spec.x, spec.y, spec.z);
                            remaining_segmentation -= 1;
                            if remaining_segmentation == 0 {
                                self.segmentation.set_loaded(true);
                                debug!("segmentation store loaded");
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(store = %store, path = %spec.path, "tile failed permanently");
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// Download progress in [0, 1]
    pub fn loading_progress(&self) -> f64 {
        if self.channel.is_loaded() && self.segmentation.is_loaded() {
            1.0
        } else if self.channel.is_clean() && self.segmentation.is_clean() {
            0.0
        } else {
            self.requests.lock().progress()
        }
    }

    /// Cancel the running load, returns false when nothing was loading
    pub fn abort(&self) -> bool {
        self.handle().abort()
    }

    /// Flip the highlight of the segment under a normalized point of a slice.
    ///
    /// `norm_x` and `norm_y` run from 0 to 1 across the two in-plane axes of
    /// the slice. Returns the label found there; background (0) is never
    /// highlighted, and points that map outside the cube read as background.
    pub fn toggle_segment(&mut self, axis: Axis, slice: usize, norm_x: f64, norm_y: f64) -> Result<u32> {
        let size = self.segmentation.size();
        size.check_slice(axis, slice)?;

        let slice = slice as f64;
        let (x, y, z) = match axis {
            Axis::X => (slice, scale(norm_x, size.y), scale(norm_y, size.z)),
            Axis::Y => (scale(norm_x, size.x), slice, scale(norm_y, size.z)),
            Axis::Z => (scale(norm_x, size.x), scale(norm_y, size.y), slice),
        };

        let (Some(x), Some(y), Some(z)) = (to_coord(x, size.x), to_coord(y, size.y), to_coord(z, size.z)) else {
            return Ok(0);
        };

        let label = self.segmentation.get(x, y, z).to_word();
        if label > 0 && !self.highlighted.remove(&label) {
            self.highlighted.insert(label);
        }
        Ok(label)
    }

    /// Labels currently highlighted
    pub fn highlighted_segments(&self) -> &HashSet<u32> {
        &self.highlighted
    }

    /// Whether `label` is highlighted
    pub fn is_highlighted(&self, label: u32) -> bool {
        self.highlighted.contains(&label)
    }

    /// Remove every highlight
    pub fn clear_highlights(&mut self) {
        self.highlighted.clear();
    }

    /// Draw a channel slice with highlighted segments tinted.
    ///
    /// Pixels without channel data show the loading placeholder.
    pub fn render_channel_slice(&self, sink: &mut dyn RenderSink, axis: Axis, slice: usize) -> Result<()> {
        let mut pixels = self.channel.gray_image_slice(axis, slice)?;
        let loading = Placeholder::global().tiled(pixels.width(), pixels.height());
        let labels = self.segmentation.slice(axis, slice, false)?;

        composite_channel(&mut pixels, &loading, &labels, &self.highlighted, &Overlay::HIGHLIGHT);

        sink.put_image(&pixels, 0, 0);
        Ok(())
    }

    /// Draw the raw segmentation slice, mostly for debugging
    pub fn render_segmentation_slice(&self, sink: &mut dyn RenderSink, axis: Axis, slice: usize) -> Result<()> {
        self.segmentation.render_image_slice(sink, axis, slice)
    }

    /// Get volume statistics
    pub fn stats(&self) -> VolumeStats {
        VolumeStats {
            size: self.size(),
            total_voxels: self.size().voxel_count(),
            channel_width: self.channel.width(),
            segmentation_width: self.segmentation.width(),
            channel_bytes: self.channel.memory_bytes(),
            segmentation_bytes: self.segmentation.memory_bytes(),
            channel_loaded: self.channel.is_loaded(),
            segmentation_loaded: self.segmentation.is_loaded(),
            highlighted: self.highlighted.len(),
            progress: self.loading_progress(),
        }
    }
}
