//! Wire-format configuration for one transfer and the channel-order
//! variants a scanline can carry.

use crate::channel::PixelChannel;
use crate::error::QuantumError;
use crate::image::Image;
use crate::quantum::{MAGICK_EPSILON, QUANTUM_RANGE};
use crate::sample::{SampleFormat, row_bytes};

// ---------------------------------------------------------------------------
// Format enums
// ---------------------------------------------------------------------------

/// Integer or IEEE floating point samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum QuantumFormat {
    #[default]
    Integer,
    /// 16-bit half, 24-bit, 32-bit single or 64-bit double floats.
    FloatingPoint,
}

/// Byte order of multi-byte samples and packing words.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Endian {
    /// Least significant byte first.
    Lsb,
    /// Most significant byte first (network order).
    #[default]
    Msb,
}

/// How alpha relates to the color samples on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AlphaType {
    /// No alpha post-processing.
    #[default]
    Undefined,
    /// Wire colors are independent of alpha, same as the cache.
    Associated,
    /// Wire colors are premultiplied: import divides by alpha, export
    /// multiplies.
    Disassociated,
}

// ---------------------------------------------------------------------------
// QuantumType
// ---------------------------------------------------------------------------

/// Channel order of one pixel on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum QuantumType {
    Alpha,
    Black,
    Blue,
    Bgr,
    Bgra,
    /// Alias of [`Bgra`](Self::Bgra).
    Bgro,
    /// Cb, Y, Cr; stored in the cache as Y, Cb, Cr.
    CbYCr,
    CbYCrA,
    /// 4:2:2 pairs: Cb, Y0, Cr, Y1 for every two pixels.
    CbYCrY,
    Cmyk,
    Cmyka,
    /// Alias of [`Cmyka`](Self::Cmyka).
    Cmyko,
    Cyan,
    Gray,
    GrayAlpha,
    Green,
    Index,
    IndexAlpha,
    Magenta,
    /// Every slot of the pixel, in storage order.
    Multispectral,
    /// Alias of [`Alpha`](Self::Alpha).
    Opacity,
    Red,
    Rgb,
    Rgba,
    /// Alias of [`Rgba`](Self::Rgba).
    Rgbo,
    Yellow,
}

/// One sample position of a wire pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleRole {
    /// A channel slot.
    Channel(PixelChannel),
    /// Luma on export, all three color slots on import.
    Gray,
    /// Colormap index.
    Index,
}

const GRAY: &[SampleRole] = &[SampleRole::Gray];
const GRAY_ALPHA: &[SampleRole] = &[SampleRole::Gray, SampleRole::Channel(PixelChannel::Alpha)];
const INDEX: &[SampleRole] = &[SampleRole::Index];
const INDEX_ALPHA: &[SampleRole] = &[SampleRole::Index, SampleRole::Channel(PixelChannel::Alpha)];
const RED: &[SampleRole] = &[SampleRole::Channel(PixelChannel::Red)];
const GREEN: &[SampleRole] = &[SampleRole::Channel(PixelChannel::Green)];
const BLUE: &[SampleRole] = &[SampleRole::Channel(PixelChannel::Blue)];
const BLACK: &[SampleRole] = &[SampleRole::Channel(PixelChannel::Black)];
const ALPHA: &[SampleRole] = &[SampleRole::Channel(PixelChannel::Alpha)];
const RGB: &[SampleRole] = &[
    SampleRole::Channel(PixelChannel::Red),
    SampleRole::Channel(PixelChannel::Green),
    SampleRole::Channel(PixelChannel::Blue),
];
const RGBA: &[SampleRole] = &[
    SampleRole::Channel(PixelChannel::Red),
    SampleRole::Channel(PixelChannel::Green),
    SampleRole::Channel(PixelChannel::Blue),
    SampleRole::Channel(PixelChannel::Alpha),
];
const BGR: &[SampleRole] = &[
    SampleRole::Channel(PixelChannel::Blue),
    SampleRole::Channel(PixelChannel::Green),
    SampleRole::Channel(PixelChannel::Red),
];
const BGRA: &[SampleRole] = &[
    SampleRole::Channel(PixelChannel::Blue),
    SampleRole::Channel(PixelChannel::Green),
    SampleRole::Channel(PixelChannel::Red),
    SampleRole::Channel(PixelChannel::Alpha),
];
const CMYK: &[SampleRole] = &[
    SampleRole::Channel(PixelChannel::Red),
    SampleRole::Channel(PixelChannel::Green),
    SampleRole::Channel(PixelChannel::Blue),
    SampleRole::Channel(PixelChannel::Black),
];
const CMYKA: &[SampleRole] = &[
    SampleRole::Channel(PixelChannel::Red),
    SampleRole::Channel(PixelChannel::Green),
    SampleRole::Channel(PixelChannel::Blue),
    SampleRole::Channel(PixelChannel::Black),
    SampleRole::Channel(PixelChannel::Alpha),
];

impl QuantumType {
    /// Natural wire type for `image`: indexed, CMYK, gray, multispectral or
    /// RGB, with alpha when the image has it.
    pub fn for_image(image: &Image) -> Self {
        let alpha = image.has_alpha();
        if image.is_palette() {
            return if alpha { Self::IndexAlpha } else { Self::Index };
        }
        if image.is_cmyk() {
            return if alpha { Self::Cmyka } else { Self::Cmyk };
        }
        if image.colorspace().is_gray() {
            return if alpha { Self::GrayAlpha } else { Self::Gray };
        }
        if image.meta_channels() > 0 {
            return Self::Multispectral;
        }
        if alpha { Self::Rgba } else { Self::Rgb }
    }

    /// Sample roles of one wire pixel, for every type except
    /// [`Multispectral`](Self::Multispectral) (built from the image) and
    /// [`CbYCrY`](Self::CbYCrY) (two pixels per group).
    pub const fn roles(self) -> &'static [SampleRole] {
        match self {
            Self::Alpha | Self::Opacity => ALPHA,
            Self::Black => BLACK,
            Self::Blue | Self::Yellow => BLUE,
            Self::Green | Self::Magenta => GREEN,
            Self::Red | Self::Cyan => RED,
            Self::Bgr => BGR,
            Self::Bgra | Self::Bgro => BGRA,
            Self::Rgb | Self::CbYCr => RGB,
            Self::Rgba | Self::Rgbo | Self::CbYCrA => RGBA,
            Self::Cmyk => CMYK,
            Self::Cmyka | Self::Cmyko => CMYKA,
            Self::Gray => GRAY,
            Self::GrayAlpha => GRAY_ALPHA,
            Self::Index => INDEX,
            Self::IndexAlpha => INDEX_ALPHA,
            Self::CbYCrY => RGB,
            Self::Multispectral => &[],
        }
    }

    /// Wire samples per group and image pixels per group. Every type
    /// groups a single pixel except 4:2:2 pairs.
    pub fn group(self, image: &Image) -> (usize, usize) {
        match self {
            Self::Multispectral => (image.number_channels(), 1),
            Self::CbYCrY => (4, 2),
            _ => (self.roles().len(), 1),
        }
    }

    /// Whether the type addresses CMYK channels.
    pub const fn needs_cmyk(self) -> bool {
        matches!(
            self,
            Self::Black
                | Self::Cmyk
                | Self::Cmyka
                | Self::Cmyko
                | Self::Cyan
                | Self::Magenta
                | Self::Yellow
        )
    }

    /// Whether the type carries colormap indices.
    pub const fn needs_colormap(self) -> bool {
        matches!(self, Self::Index | Self::IndexAlpha)
    }

    /// Whether wire order is Cb, Y, Cr and needs the red/green swap.
    pub const fn is_cbycr(self) -> bool {
        matches!(self, Self::CbYCr | Self::CbYCrA)
    }

    /// Check that `image` can take part in a transfer of this type.
    ///
    /// # Errors
    ///
    /// [`QuantumError::ColormappedImageRequired`] for index types on direct
    /// images, [`QuantumError::ColorSeparatedImageRequired`] for CMYK types on
    /// non-CMYK images.
    pub fn validate(self, image: &Image) -> Result<(), QuantumError> {
        if self.needs_colormap() && !image.is_palette() {
            return Err(QuantumError::ColormappedImageRequired);
        }
        if self.needs_cmyk() && !image.is_cmyk() {
            return Err(QuantumError::ColorSeparatedImageRequired(alloc::format!(
                "{self:?}"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// QuantumInfo
// ---------------------------------------------------------------------------

/// Wire format of a transfer: depth, number format, byte order, padding
/// and packing.
///
/// Built once by the caller and borrowed read-only by each import or
/// export call.
#[derive(Clone, Debug, PartialEq)]
pub struct QuantumInfo {
    depth: u32,
    format: QuantumFormat,
    endian: Endian,
    minimum: f64,
    scale: f64,
    pad: usize,
    pack: bool,
    min_is_white: bool,
    quantum: u32,
    alpha_type: AlphaType,
}

impl Default for QuantumInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl QuantumInfo {
    /// 8-bit integer, big-endian, packed, no padding.
    pub const fn new() -> Self {
        Self {
            depth: 8,
            format: QuantumFormat::Integer,
            endian: Endian::Msb,
            minimum: 0.0,
            scale: QUANTUM_RANGE,
            pad: 0,
            pack: true,
            min_is_white: false,
            quantum: 8,
            alpha_type: AlphaType::Undefined,
        }
    }

    /// Bits per sample, clamped to `1..=64`.
    ///
    /// Floating point formats round up to 16, 24, 32 or 64.
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = normalize_depth(self.format, depth);
        self
    }

    /// Sample number format; re-applies the depth rule.
    pub fn with_format(mut self, format: QuantumFormat) -> Self {
        self.format = format;
        self.depth = normalize_depth(format, self.depth);
        self
    }

    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    /// Offset subtracted from float samples on import, added on export.
    pub fn with_minimum(mut self, minimum: f64) -> Self {
        self.minimum = minimum;
        self
    }

    /// Multiplier from float samples to quantum units (default
    /// `QUANTUM_RANGE`, so 1.0 is full scale).
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Unused bytes after each pixel.
    pub fn with_pad(mut self, pad: usize) -> Self {
        self.pad = pad;
        self
    }

    /// `false` selects the word-aligned 10- and 12-bit layouts.
    pub fn with_pack(mut self, pack: bool) -> Self {
        self.pack = pack;
        self
    }

    /// Invert gray polarity (0 is white).
    pub fn with_min_is_white(mut self, min_is_white: bool) -> Self {
        self.min_is_white = min_is_white;
        self
    }

    /// Storage word for bit-packed depths: 32 packs into endian-ordered
    /// 32-bit words, anything else into bytes.
    pub fn with_quantum(mut self, bits: u32) -> Self {
        self.quantum = bits;
        self
    }

    pub fn with_alpha_type(mut self, alpha_type: AlphaType) -> Self {
        self.alpha_type = alpha_type;
        self
    }

    // --- accessors ---

    #[inline]
    pub const fn depth(&self) -> u32 {
        self.depth
    }

    #[inline]
    pub const fn format(&self) -> QuantumFormat {
        self.format
    }

    #[inline]
    pub const fn endian(&self) -> Endian {
        self.endian
    }

    #[inline]
    pub const fn minimum(&self) -> f64 {
        self.minimum
    }

    #[inline]
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// `1 / scale`, or 1 when the scale is too small to invert.
    #[inline]
    pub fn inverse_scale(&self) -> f64 {
        if self.scale.abs() >= MAGICK_EPSILON {
            1.0 / self.scale
        } else {
            1.0
        }
    }

    #[inline]
    pub const fn pad(&self) -> usize {
        self.pad
    }

    #[inline]
    pub const fn pack(&self) -> bool {
        self.pack
    }

    #[inline]
    pub const fn min_is_white(&self) -> bool {
        self.min_is_white
    }

    #[inline]
    pub const fn quantum(&self) -> u32 {
        self.quantum
    }

    #[inline]
    pub const fn alpha_type(&self) -> AlphaType {
        self.alpha_type
    }

    /// How individual samples are laid out for this configuration.
    pub fn sample_format(&self) -> SampleFormat {
        SampleFormat::select(self)
    }

    /// Bytes one row of `columns` pixels of `quantum_type` occupies.
    ///
    /// # Errors
    ///
    /// [`QuantumError::ResourceLimit`] when the size overflows `usize`.
    pub fn extent(
        &self,
        image: &Image,
        quantum_type: QuantumType,
        columns: usize,
    ) -> Result<usize, QuantumError> {
        let (samples, pixels) = quantum_type.group(image);
        row_bytes(self, samples, columns.div_ceil(pixels))
            .ok_or(QuantumError::ResourceLimit("quantum extent"))
    }
}

fn normalize_depth(format: QuantumFormat, depth: u32) -> u32 {
    let depth = depth.clamp(1, 64);
    if format != QuantumFormat::FloatingPoint {
        return depth;
    }
    match depth {
        33.. => 64,
        25..=32 => 32,
        17..=24 => 24,
        _ => 16,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Colorspace;
    use rstest::rstest;

    fn rgb_image() -> Image {
        Image::builder(4, 1).build().unwrap()
    }

    // --- depth ---

    #[rstest]
    #[case(QuantumFormat::Integer, 0, 1)]
    #[case(QuantumFormat::Integer, 12, 12)]
    #[case(QuantumFormat::Integer, 99, 64)]
    #[case(QuantumFormat::FloatingPoint, 8, 16)]
    #[case(QuantumFormat::FloatingPoint, 20, 24)]
    #[case(QuantumFormat::FloatingPoint, 32, 32)]
    #[case(QuantumFormat::FloatingPoint, 40, 64)]
    fn depth_rules(#[case] format: QuantumFormat, #[case] depth: u32, #[case] expected: u32) {
        let info = QuantumInfo::new().with_format(format).with_depth(depth);
        assert_eq!(info.depth(), expected);
    }

    #[test]
    fn format_change_reapplies_depth() {
        let info = QuantumInfo::new()
            .with_depth(8)
            .with_format(QuantumFormat::FloatingPoint);
        assert_eq!(info.depth(), 16);
    }

    #[test]
    fn inverse_scale_guards_zero() {
        assert_eq!(QuantumInfo::new().with_scale(0.0).inverse_scale(), 1.0);
        assert_eq!(QuantumInfo::new().with_scale(4.0).inverse_scale(), 0.25);
    }

    // --- extent ---

    #[rstest]
    #[case(1, true, 0, QuantumType::Gray, 10, 2)]
    #[case(8, true, 0, QuantumType::Rgb, 4, 12)]
    #[case(8, true, 1, QuantumType::Rgb, 4, 16)]
    #[case(16, true, 0, QuantumType::Rgba, 3, 24)]
    #[case(10, false, 0, QuantumType::Rgb, 4, 16)]
    #[case(10, false, 0, QuantumType::Gray, 4, 8)]
    #[case(12, false, 0, QuantumType::Gray, 3, 6)]
    #[case(12, true, 0, QuantumType::Gray, 3, 5)]
    #[case(4, true, 0, QuantumType::GrayAlpha, 3, 3)]
    #[case(8, true, 0, QuantumType::CbYCrY, 3, 8)]
    fn extent_matches_layout(
        #[case] depth: u32,
        #[case] pack: bool,
        #[case] pad: usize,
        #[case] quantum_type: QuantumType,
        #[case] columns: usize,
        #[case] expected: usize,
    ) {
        let info = QuantumInfo::new()
            .with_depth(depth)
            .with_pack(pack)
            .with_pad(pad);
        assert_eq!(info.extent(&rgb_image(), quantum_type, columns).unwrap(), expected);
    }

    #[test]
    fn extent_overflow_is_resource_error() {
        let info = QuantumInfo::new().with_depth(64);
        let err = info
            .extent(&rgb_image(), QuantumType::Rgba, usize::MAX / 2)
            .unwrap_err();
        assert!(matches!(err, QuantumError::ResourceLimit(_)));
    }

    // --- types ---

    #[test]
    fn natural_type_for_image() {
        let image = Image::builder(1, 1)
            .with_colorspace(Colorspace::Cmyk)
            .with_alpha(true)
            .build()
            .unwrap();
        assert_eq!(QuantumType::for_image(&image), QuantumType::Cmyka);
        let gray = Image::builder(1, 1)
            .with_colorspace(Colorspace::Gray)
            .build()
            .unwrap();
        assert_eq!(QuantumType::for_image(&gray), QuantumType::Gray);
        assert_eq!(QuantumType::for_image(&rgb_image()), QuantumType::Rgb);
    }

    #[test]
    fn opacity_types_alias_alpha_types() {
        assert_eq!(QuantumType::Rgbo.roles(), QuantumType::Rgba.roles());
        assert_eq!(QuantumType::Bgro.roles(), QuantumType::Bgra.roles());
        assert_eq!(QuantumType::Cmyko.roles(), QuantumType::Cmyka.roles());
        assert_eq!(QuantumType::Opacity.roles(), QuantumType::Alpha.roles());
    }

    #[test]
    fn validation_gates() {
        let image = rgb_image();
        assert_eq!(
            QuantumType::Index.validate(&image),
            Err(QuantumError::ColormappedImageRequired)
        );
        assert!(matches!(
            QuantumType::Cmyk.validate(&image),
            Err(QuantumError::ColorSeparatedImageRequired(_))
        ));
        assert!(QuantumType::Rgb.validate(&image).is_ok());
    }
}
