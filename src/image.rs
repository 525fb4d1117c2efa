//! In-memory pixel cache the transcoding engines read and write.
//!
//! Pixels are stored row-major, channel-interleaved, in the slot order of
//! the image's [`PixelChannelMap`].

use alloc::vec;
use alloc::vec::Vec;

use crate::channel::{ChannelLayout, ChannelMask, PixelChannel, PixelChannelMap, PixelTrait};
use crate::error::QuantumError;
use crate::interpolate::{PixelInterpolateMethod, ResizeFilter};
use crate::pixel::{PixelInfo, PixelIntensityMethod};
use crate::quantum::{OPAQUE_ALPHA, Quantum};

// ---------------------------------------------------------------------------
// Image properties
// ---------------------------------------------------------------------------

/// Color model of the stored samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Colorspace {
    /// Gamma-encoded sRGB.
    #[default]
    Srgb,
    /// Linear-light RGB.
    LinearRgb,
    /// Gamma-encoded gray, stored in the red slot.
    Gray,
    /// Linear-light gray.
    LinearGray,
    /// Cyan, magenta, yellow in the red, green, blue slots plus black.
    Cmyk,
    /// Luma and chroma in the red, green, blue slots.
    YCbCr,
}

impl Colorspace {
    /// Gray or linear gray.
    #[inline]
    pub const fn is_gray(self) -> bool {
        matches!(self, Self::Gray | Self::LinearGray)
    }

    /// Whether samples are linear light.
    #[inline]
    pub const fn is_linear(self) -> bool {
        matches!(self, Self::LinearRgb | Self::LinearGray)
    }
}

/// Whether pixels carry their own color or index a colormap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StorageClass {
    #[default]
    Direct,
    /// Palette-indexed; the index slot selects a colormap entry.
    Pseudo,
}

/// A rectangular window of the image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Region {
    /// Window of `width` x `height` pixels at (`x`, `y`).
    #[inline]
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// One row of `width` pixels starting at (`x`, `y`).
    #[inline]
    pub const fn row(x: usize, y: usize, width: usize) -> Self {
        Self::new(x, y, width, 1)
    }

    /// Number of pixels covered.
    #[inline]
    pub const fn pixel_count(&self) -> usize {
        self.width.saturating_mul(self.height)
    }
}

// ---------------------------------------------------------------------------
// Slot offsets
// ---------------------------------------------------------------------------

/// Slot positions of the well-known channels, copied out of the channel map
/// so pixels can be accessed while the cache is mutably borrowed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelOffsets {
    /// Slots per pixel.
    pub channels: usize,
    pub red: usize,
    pub green: usize,
    pub blue: usize,
    pub black: Option<usize>,
    pub alpha: Option<usize>,
    pub index: Option<usize>,
}

impl PixelOffsets {
    #[inline]
    pub fn red(&self, p: &[Quantum]) -> Quantum {
        p[self.red]
    }

    #[inline]
    pub fn green(&self, p: &[Quantum]) -> Quantum {
        p[self.green]
    }

    #[inline]
    pub fn blue(&self, p: &[Quantum]) -> Quantum {
        p[self.blue]
    }

    /// Black, or 0 without a black slot.
    #[inline]
    pub fn black(&self, p: &[Quantum]) -> Quantum {
        self.black.map_or(0, |i| p[i])
    }

    /// Alpha, or opaque without an alpha slot.
    #[inline]
    pub fn alpha(&self, p: &[Quantum]) -> Quantum {
        self.alpha.map_or(OPAQUE_ALPHA, |i| p[i])
    }

    /// Colormap index, or 0 without an index slot.
    #[inline]
    pub fn index(&self, p: &[Quantum]) -> Quantum {
        self.index.map_or(0, |i| p[i])
    }

    #[inline]
    pub fn set_red(&self, p: &mut [Quantum], v: Quantum) {
        p[self.red] = v;
    }

    #[inline]
    pub fn set_green(&self, p: &mut [Quantum], v: Quantum) {
        p[self.green] = v;
    }

    #[inline]
    pub fn set_blue(&self, p: &mut [Quantum], v: Quantum) {
        p[self.blue] = v;
    }

    /// Gray is written to all three color slots.
    #[inline]
    pub fn set_gray(&self, p: &mut [Quantum], v: Quantum) {
        p[self.red] = v;
        p[self.green] = v;
        p[self.blue] = v;
    }

    /// Ignored without a black slot.
    #[inline]
    pub fn set_black(&self, p: &mut [Quantum], v: Quantum) {
        if let Some(i) = self.black {
            p[i] = v;
        }
    }

    /// Ignored without an alpha slot.
    #[inline]
    pub fn set_alpha(&self, p: &mut [Quantum], v: Quantum) {
        if let Some(i) = self.alpha {
            p[i] = v;
        }
    }

    /// Ignored without an index slot.
    #[inline]
    pub fn set_index(&self, p: &mut [Quantum], v: Quantum) {
        if let Some(i) = self.index {
            p[i] = v;
        }
    }
}

// ---------------------------------------------------------------------------
// ImageBuilder
// ---------------------------------------------------------------------------

/// Structural image properties; [`build`](Self::build) allocates the cache.
#[derive(Clone, Debug)]
pub struct ImageBuilder {
    columns: usize,
    rows: usize,
    colorspace: Colorspace,
    alpha: bool,
    meta: usize,
    colormap: Option<Vec<PixelInfo>>,
}

impl ImageBuilder {
    pub fn with_colorspace(mut self, colorspace: Colorspace) -> Self {
        self.colorspace = colorspace;
        self
    }

    pub fn with_alpha(mut self, alpha: bool) -> Self {
        self.alpha = alpha;
        self
    }

    /// Number of extra channels after the standard ones.
    pub fn with_meta_channels(mut self, count: usize) -> Self {
        self.meta = count;
        self
    }

    /// Make the image palette-indexed over `colormap`.
    pub fn with_colormap(mut self, colormap: Vec<PixelInfo>) -> Self {
        self.colormap = Some(colormap);
        self
    }

    /// Allocate a black (and opaque) pixel cache.
    ///
    /// # Errors
    ///
    /// [`QuantumError::TooManyChannels`] for an oversized channel layout,
    /// [`QuantumError::ResourceLimit`] when the cache size overflows.
    pub fn build(self) -> Result<Image, QuantumError> {
        let storage_class = if self.colormap.is_some() {
            StorageClass::Pseudo
        } else {
            StorageClass::Direct
        };
        let layout = ChannelLayout {
            cmyk: self.colorspace == Colorspace::Cmyk,
            alpha: self.alpha,
            palette: storage_class == StorageClass::Pseudo,
            meta: self.meta,
        };
        let mut channel_map = PixelChannelMap::initialize(&layout)?;
        channel_map.set_mask(&layout, ChannelMask::ALL);
        let len = self
            .columns
            .checked_mul(self.rows)
            .and_then(|n| n.checked_mul(channel_map.len()))
            .ok_or(QuantumError::ResourceLimit("pixel cache size"))?;
        let mut pixels = vec![0 as Quantum; len];
        if let Some(alpha) = channel_map.offset(PixelChannel::Alpha) {
            for p in pixels.chunks_exact_mut(channel_map.len()) {
                p[alpha] = OPAQUE_ALPHA;
            }
        }
        log::debug!(
            "image {}x{} {:?} {:?}: {} channels",
            self.columns,
            self.rows,
            self.colorspace,
            storage_class,
            channel_map.len()
        );
        Ok(Image {
            columns: self.columns,
            rows: self.rows,
            colorspace: self.colorspace,
            storage_class,
            alpha: self.alpha,
            meta: self.meta,
            colormap: self.colormap.unwrap_or_default(),
            mask: ChannelMask::ALL,
            channel_map,
            interpolate: PixelInterpolateMethod::default(),
            filter: ResizeFilter::default(),
            intensity: PixelIntensityMethod::default(),
            fuzz: 0.0,
            pixels,
        })
    }
}

// ---------------------------------------------------------------------------
// Image
// ---------------------------------------------------------------------------

/// A pixel cache plus the properties that govern its layout.
#[derive(Clone, Debug)]
pub struct Image {
    columns: usize,
    rows: usize,
    colorspace: Colorspace,
    storage_class: StorageClass,
    alpha: bool,
    meta: usize,
    colormap: Vec<PixelInfo>,
    mask: ChannelMask,
    channel_map: PixelChannelMap,
    interpolate: PixelInterpolateMethod,
    filter: ResizeFilter,
    intensity: PixelIntensityMethod,
    fuzz: f64,
    pixels: Vec<Quantum>,
}

impl Image {
    /// Start describing a `columns` x `rows` image (sRGB, no alpha, direct).
    pub fn builder(columns: usize, rows: usize) -> ImageBuilder {
        ImageBuilder {
            columns,
            rows,
            colorspace: Colorspace::Srgb,
            alpha: false,
            meta: 0,
            colormap: None,
        }
    }

    /// Default interpolation method used when a call passes `Undefined`.
    pub fn with_interpolate(mut self, method: PixelInterpolateMethod) -> Self {
        self.interpolate = method;
        self
    }

    /// Filter used by [`PixelInterpolateMethod::Filter`].
    pub fn with_filter(mut self, filter: ResizeFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Method used to reduce a pixel to one intensity.
    pub fn with_intensity(mut self, method: PixelIntensityMethod) -> Self {
        self.intensity = method;
        self
    }

    /// Color distance tolerance for fuzzy comparisons.
    pub fn with_fuzz(mut self, fuzz: f64) -> Self {
        self.fuzz = fuzz;
        self
    }

    /// Select which channels pixel operations update.
    pub fn set_channel_mask(&mut self, mask: ChannelMask) {
        self.mask = mask;
        let layout = self.layout();
        self.channel_map.set_mask(&layout, mask);
    }

    // --- properties ---

    #[inline]
    pub fn columns(&self) -> usize {
        self.columns
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn colorspace(&self) -> Colorspace {
        self.colorspace
    }

    #[inline]
    pub fn storage_class(&self) -> StorageClass {
        self.storage_class
    }

    #[inline]
    pub fn has_alpha(&self) -> bool {
        self.alpha
    }

    #[inline]
    pub fn is_cmyk(&self) -> bool {
        self.colorspace == Colorspace::Cmyk
    }

    #[inline]
    pub fn is_palette(&self) -> bool {
        self.storage_class == StorageClass::Pseudo
    }

    #[inline]
    pub fn meta_channels(&self) -> usize {
        self.meta
    }

    #[inline]
    pub fn colormap(&self) -> &[PixelInfo] {
        &self.colormap
    }

    #[inline]
    pub fn channel_map(&self) -> &PixelChannelMap {
        &self.channel_map
    }

    #[inline]
    pub fn channel_mask(&self) -> ChannelMask {
        self.mask
    }

    /// Slots per pixel.
    #[inline]
    pub fn number_channels(&self) -> usize {
        self.channel_map.len()
    }

    #[inline]
    pub fn interpolate(&self) -> PixelInterpolateMethod {
        self.interpolate
    }

    #[inline]
    pub fn filter(&self) -> ResizeFilter {
        self.filter
    }

    #[inline]
    pub fn intensity(&self) -> PixelIntensityMethod {
        self.intensity
    }

    #[inline]
    pub fn fuzz(&self) -> f64 {
        self.fuzz
    }

    /// Traits of `channel` in this image's map.
    #[inline]
    pub fn traits(&self, channel: PixelChannel) -> PixelTrait {
        self.channel_map.traits(channel)
    }

    /// The properties the channel map was built from.
    pub fn layout(&self) -> ChannelLayout {
        ChannelLayout {
            cmyk: self.is_cmyk(),
            alpha: self.alpha,
            palette: self.is_palette(),
            meta: self.meta,
        }
    }

    /// Slot positions of the well-known channels.
    pub fn offsets(&self) -> PixelOffsets {
        let map = &self.channel_map;
        PixelOffsets {
            channels: map.len(),
            red: map.offset(PixelChannel::Red).unwrap_or(0),
            green: map.offset(PixelChannel::Green).unwrap_or(0),
            blue: map.offset(PixelChannel::Blue).unwrap_or(0),
            black: map.offset(PixelChannel::Black),
            alpha: map.offset(PixelChannel::Alpha),
            index: map.offset(PixelChannel::Index),
        }
    }

    // --- pixel access ---

    /// The whole cache.
    #[inline]
    pub fn pixels(&self) -> &[Quantum] {
        &self.pixels
    }

    /// The whole cache, mutably.
    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [Quantum] {
        &mut self.pixels
    }

    fn pixel_start(&self, x: usize, y: usize) -> Option<usize> {
        if x >= self.columns || y >= self.rows {
            return None;
        }
        Some((y * self.columns + x) * self.number_channels())
    }

    /// Slots of the pixel at (`x`, `y`).
    pub fn pixel(&self, x: usize, y: usize) -> Option<&[Quantum]> {
        let start = self.pixel_start(x, y)?;
        self.pixels.get(start..start + self.number_channels())
    }

    /// Slots of the pixel at (`x`, `y`), mutably.
    pub fn pixel_mut(&mut self, x: usize, y: usize) -> Option<&mut [Quantum]> {
        let start = self.pixel_start(x, y)?;
        let n = self.number_channels();
        self.pixels.get_mut(start..start + n)
    }

    /// Value of `channel` at (`x`, `y`).
    pub fn channel(&self, x: usize, y: usize, channel: PixelChannel) -> Option<Quantum> {
        let offset = self.channel_map.offset(channel)?;
        self.pixel(x, y).map(|p| p[offset])
    }

    /// Set `channel` at (`x`, `y`); returns whether the slot exists.
    pub fn set_channel(&mut self, x: usize, y: usize, channel: PixelChannel, v: Quantum) -> bool {
        let Some(offset) = self.channel_map.offset(channel) else {
            return false;
        };
        match self.pixel_mut(x, y) {
            Some(p) => {
                p[offset] = v;
                true
            }
            None => false,
        }
    }

    /// Check that a region's columns lie inside the image.
    ///
    /// Rows are not checked here: a row past the bottom edge is a cache miss
    /// reported by [`row`](Self::row), which ends a transfer early.
    ///
    /// # Errors
    ///
    /// [`QuantumError::InvalidRegion`] when `x + width` leaves the image.
    pub fn check_region(&self, region: &Region) -> Result<(), QuantumError> {
        match region.x.checked_add(region.width) {
            Some(end) if end <= self.columns => Ok(()),
            _ => Err(QuantumError::InvalidRegion {
                x: region.x,
                y: region.y,
                width: region.width,
                height: region.height,
                columns: self.columns,
                rows: self.rows,
            }),
        }
    }

    fn row_range(&self, region: &Region, y: usize) -> Option<core::ops::Range<usize>> {
        let row = region.y.checked_add(y)?;
        if y >= region.height || row >= self.rows {
            return None;
        }
        let end = region.x.checked_add(region.width)?;
        if end > self.columns {
            return None;
        }
        let n = self.number_channels();
        let base = row * self.columns;
        Some((base + region.x) * n..(base + end) * n)
    }

    /// Row `y` of `region` (relative to the region's top), or `None` when the
    /// row is not inside the image.
    pub fn row(&self, region: &Region, y: usize) -> Option<&[Quantum]> {
        let range = self.row_range(region, y)?;
        self.pixels.get(range)
    }

    /// Row `y` of `region`, mutably.
    pub fn row_mut(&mut self, region: &Region, y: usize) -> Option<&mut [Quantum]> {
        let range = self.row_range(region, y)?;
        self.pixels.get_mut(range)
    }

    /// Pixel at (`x`, `y`) with coordinates clamped to the nearest edge.
    ///
    /// `None` only for an empty image.
    pub fn virtual_pixel(&self, x: i64, y: i64) -> Option<&[Quantum]> {
        if self.columns == 0 || self.rows == 0 {
            return None;
        }
        let x = x.clamp(0, self.columns as i64 - 1) as usize;
        let y = y.clamp(0, self.rows as i64 - 1) as usize;
        self.pixel(x, y)
    }
}
