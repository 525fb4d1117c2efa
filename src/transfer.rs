//! Map-string driven transfers between an image region and a buffer of
//! native-endian typed samples.
//!
//! ```
//! use zenquantum::{Image, Region, StorageType, export_image_pixels};
//!
//! let image = Image::builder(2, 1).build()?;
//! let mut rgb = [0u8; 6];
//! let rows = export_image_pixels(&image, &Region::row(0, 0, 2), "RGB", StorageType::Char, &mut rgb)?;
//! assert_eq!(rows, 1);
//! # Ok::<(), zenquantum::QuantumError>(())
//! ```

use crate::error::{QuantumError, QuantumResult};
use crate::image::{Image, PixelOffsets, Region};
use crate::map::{Direction, FastPath, MapTag, PixelMap, StorageType};
use crate::pixel::pixel_intensity;
use crate::quantum::{
    QUANTUM_RANGE, QUANTUM_SCALE, Quantum, clamp_to_quantum, scale_char_to_quantum,
    scale_long_long_to_quantum, scale_long_to_quantum, scale_quantum_to_char,
    scale_quantum_to_long, scale_quantum_to_long_long, scale_quantum_to_short,
    scale_short_to_quantum,
};

// ---------------------------------------------------------------------------
// Typed samples
// ---------------------------------------------------------------------------

/// One buffer element type.
trait Sample: Copy {
    const SIZE: usize;
    const ZERO: Self;

    fn from_quantum(q: Quantum) -> Self;
    /// From a real value in quantum units.
    fn from_real(v: f64) -> Self;
    fn to_quantum(self) -> Quantum;
    fn store(self, out: &mut [u8]);
    fn load(bytes: &[u8]) -> Self;
}

macro_rules! integer_sample {
    ($t:ty, $from:ident, $to:ident) => {
        impl Sample for $t {
            const SIZE: usize = core::mem::size_of::<$t>();
            const ZERO: Self = 0;

            #[inline]
            fn from_quantum(q: Quantum) -> Self {
                $from(q)
            }

            #[inline]
            fn from_real(v: f64) -> Self {
                $from(clamp_to_quantum(v))
            }

            #[inline]
            fn to_quantum(self) -> Quantum {
                $to(self)
            }

            #[inline]
            fn store(self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_ne_bytes());
            }

            #[inline]
            fn load(bytes: &[u8]) -> Self {
                let mut raw = [0u8; core::mem::size_of::<$t>()];
                raw.copy_from_slice(bytes);
                <$t>::from_ne_bytes(raw)
            }
        }
    };
}

integer_sample!(u8, scale_quantum_to_char, scale_char_to_quantum);
integer_sample!(u16, scale_quantum_to_short, scale_short_to_quantum);
integer_sample!(u32, scale_quantum_to_long, scale_long_to_quantum);
integer_sample!(u64, scale_quantum_to_long_long, scale_long_long_to_quantum);

macro_rules! float_sample {
    ($t:ty) => {
        impl Sample for $t {
            const SIZE: usize = core::mem::size_of::<$t>();
            const ZERO: Self = 0.0;

            #[inline]
            fn from_quantum(q: Quantum) -> Self {
                Self::from_real(q as f64)
            }

            #[inline]
            fn from_real(v: f64) -> Self {
                (QUANTUM_SCALE * v) as $t
            }

            #[inline]
            fn to_quantum(self) -> Quantum {
                clamp_to_quantum(QUANTUM_RANGE * self as f64)
            }

            #[inline]
            fn store(self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_ne_bytes());
            }

            #[inline]
            fn load(bytes: &[u8]) -> Self {
                let mut raw = [0u8; core::mem::size_of::<$t>()];
                raw.copy_from_slice(bytes);
                <$t>::from_ne_bytes(raw)
            }
        }
    };
}

float_sample!(f32);
float_sample!(f64);

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Copy `region` of `image` into `pixels` in the channel order of `map`
/// (letters `RGBAOCMYKIP`, case-insensitive).
///
/// Returns the number of complete rows written. Rows below the image end
/// the transfer early with a warning, so a count short of
/// `region.height` is a failure for the caller.
///
/// # Errors
///
/// Raised before `pixels` is touched:
///
/// - [`QuantumError::UnrecognizedPixelMap`] for unknown letters,
/// - [`QuantumError::ColorSeparatedImageRequired`] for `C`, `M` or `Y` on a
///   non-CMYK image (`K` exports zeros instead),
/// - [`QuantumError::InvalidRegion`] and [`QuantumError::BufferTooSmall`].
pub fn export_image_pixels(
    image: &Image,
    region: &Region,
    map: &str,
    storage: StorageType,
    pixels: &mut [u8],
) -> QuantumResult<usize> {
    let map = PixelMap::parse(map, image, Direction::Export)?;
    export_pixel_map(image, region, &map, storage, pixels)
}

/// [`export_image_pixels`] with a pre-parsed map.
///
/// # Errors
///
/// As for [`export_image_pixels`], minus map parsing.
pub fn export_pixel_map(
    image: &Image,
    region: &Region,
    map: &PixelMap,
    storage: StorageType,
    pixels: &mut [u8],
) -> QuantumResult<usize> {
    let row_len = checked_row_len(image, region, map, storage, pixels.len())?;
    log::trace!(
        "export {:?} as {storage} from {}x{}+{}+{}",
        map.tags(),
        region.width,
        region.height,
        region.x,
        region.y
    );
    Ok(match storage.resolve() {
        StorageType::Char => export_rows::<u8>(image, region, map, pixels, row_len),
        StorageType::Short => export_rows::<u16>(image, region, map, pixels, row_len),
        StorageType::Long => export_rows::<u32>(image, region, map, pixels, row_len),
        StorageType::Float => export_rows::<f32>(image, region, map, pixels, row_len),
        StorageType::Double => export_rows::<f64>(image, region, map, pixels, row_len),
        _ => export_rows::<u64>(image, region, map, pixels, row_len),
    })
}

/// Copy samples laid out in the channel order of `map` from `pixels` into
/// `region` of `image`.
///
/// `I` sets gray (all three color channels), `P` is skipped, and alpha is
/// dropped when the image has no alpha channel. Returns the number of
/// complete rows read.
///
/// # Errors
///
/// Raised before the image is touched:
///
/// - [`QuantumError::UnrecognizedPixelMap`] for unknown letters,
/// - [`QuantumError::ColorSeparatedImageRequired`] for any of `CMYK` on a
///   non-CMYK image,
/// - [`QuantumError::InvalidRegion`] and [`QuantumError::BufferTooSmall`].
pub fn import_image_pixels(
    image: &mut Image,
    region: &Region,
    map: &str,
    storage: StorageType,
    pixels: &[u8],
) -> QuantumResult<usize> {
    let map = PixelMap::parse(map, image, Direction::Import)?;
    let row_len = checked_row_len(image, region, &map, storage, pixels.len())?;
    log::trace!(
        "import {:?} as {storage} into {}x{}+{}+{}",
        map.tags(),
        region.width,
        region.height,
        region.x,
        region.y
    );
    Ok(match storage.resolve() {
        StorageType::Char => import_rows::<u8>(image, region, &map, pixels, row_len),
        StorageType::Short => import_rows::<u16>(image, region, &map, pixels, row_len),
        StorageType::Long => import_rows::<u32>(image, region, &map, pixels, row_len),
        StorageType::Float => import_rows::<f32>(image, region, &map, pixels, row_len),
        StorageType::Double => import_rows::<f64>(image, region, &map, pixels, row_len),
        _ => import_rows::<u64>(image, region, &map, pixels, row_len),
    })
}

fn checked_row_len(
    image: &Image,
    region: &Region,
    map: &PixelMap,
    storage: StorageType,
    actual: usize,
) -> QuantumResult<usize> {
    image.check_region(region)?;
    let row_len = region
        .width
        .checked_mul(map.len())
        .and_then(|n| n.checked_mul(storage.size()))
        .ok_or(QuantumError::ResourceLimit("pixel map extent"))?;
    let required = row_len
        .checked_mul(region.height)
        .ok_or(QuantumError::ResourceLimit("pixel map extent"))?;
    if actual < required {
        return Err(QuantumError::BufferTooSmall { required, actual });
    }
    Ok(row_len)
}

// ---------------------------------------------------------------------------
// Export loops
// ---------------------------------------------------------------------------

fn export_rows<S: Sample>(
    image: &Image,
    region: &Region,
    map: &PixelMap,
    pixels: &mut [u8],
    row_len: usize,
) -> usize {
    let o = image.offsets();
    for y in 0..region.height {
        let Some(row) = image.row(region, y) else {
            log::warn!("export stopped at row {} of {}", y, region.height);
            return y;
        };
        let out = &mut pixels[y * row_len..(y + 1) * row_len];
        match map.fast_path() {
            Some(path) => export_fast::<S>(image, &o, path, row, out),
            None => export_generic::<S>(image, &o, map.tags(), row, out),
        }
    }
    region.height
}

fn export_generic<S: Sample>(
    image: &Image,
    o: &PixelOffsets,
    tags: &[MapTag],
    row: &[Quantum],
    out: &mut [u8],
) {
    let mut samples = out.chunks_exact_mut(S::SIZE);
    for p in row.chunks_exact(o.channels) {
        for (tag, slot) in tags.iter().zip(&mut samples) {
            let value = match tag {
                MapTag::Red | MapTag::Cyan => S::from_quantum(o.red(p)),
                MapTag::Green | MapTag::Magenta => S::from_quantum(o.green(p)),
                MapTag::Blue | MapTag::Yellow => S::from_quantum(o.blue(p)),
                MapTag::Alpha => S::from_quantum(o.alpha(p)),
                MapTag::Black => S::from_quantum(o.black(p)),
                MapTag::Intensity => S::from_real(pixel_intensity(image, p)),
                MapTag::Pad => S::ZERO,
            };
            value.store(slot);
        }
    }
}

fn export_fast<S: Sample>(
    image: &Image,
    o: &PixelOffsets,
    path: FastPath,
    row: &[Quantum],
    out: &mut [u8],
) {
    let q = S::from_quantum;
    match path {
        FastPath::Rgb => store_pixels(o, row, out, |p| [q(o.red(p)), q(o.green(p)), q(o.blue(p))]),
        FastPath::Bgr => store_pixels(o, row, out, |p| [q(o.blue(p)), q(o.green(p)), q(o.red(p))]),
        FastPath::Rgba => store_pixels(o, row, out, |p| {
            [q(o.red(p)), q(o.green(p)), q(o.blue(p)), q(o.alpha(p))]
        }),
        FastPath::Bgra => store_pixels(o, row, out, |p| {
            [q(o.blue(p)), q(o.green(p)), q(o.red(p)), q(o.alpha(p))]
        }),
        FastPath::Rgbp => store_pixels(o, row, out, |p| {
            [q(o.red(p)), q(o.green(p)), q(o.blue(p)), S::ZERO]
        }),
        FastPath::Bgrp => store_pixels(o, row, out, |p| {
            [q(o.blue(p)), q(o.green(p)), q(o.red(p)), S::ZERO]
        }),
        FastPath::Intensity => {
            store_pixels(o, row, out, |p| [S::from_real(pixel_intensity(image, p))])
        }
    }
}

#[inline]
fn store_pixels<S: Sample, const N: usize>(
    o: &PixelOffsets,
    row: &[Quantum],
    out: &mut [u8],
    pixel: impl Fn(&[Quantum]) -> [S; N],
) {
    for (p, dst) in row
        .chunks_exact(o.channels)
        .zip(out.chunks_exact_mut(N * S::SIZE))
    {
        for (value, slot) in pixel(p).into_iter().zip(dst.chunks_exact_mut(S::SIZE)) {
            value.store(slot);
        }
    }
}

// ---------------------------------------------------------------------------
// Import loop
// ---------------------------------------------------------------------------

fn import_rows<S: Sample>(
    image: &mut Image,
    region: &Region,
    map: &PixelMap,
    pixels: &[u8],
    row_len: usize,
) -> usize {
    let o = image.offsets();
    let pixel_len = map.len() * S::SIZE;
    for y in 0..region.height {
        let Some(row) = image.row_mut(region, y) else {
            log::warn!("import stopped at row {} of {}", y, region.height);
            return y;
        };
        let src = &pixels[y * row_len..(y + 1) * row_len];
        for (p, bytes) in row.chunks_exact_mut(o.channels).zip(src.chunks_exact(pixel_len)) {
            for (tag, raw) in map.tags().iter().zip(bytes.chunks_exact(S::SIZE)) {
                let v = S::load(raw).to_quantum();
                match tag {
                    MapTag::Red | MapTag::Cyan => o.set_red(p, v),
                    MapTag::Green | MapTag::Magenta => o.set_green(p, v),
                    MapTag::Blue | MapTag::Yellow => o.set_blue(p, v),
                    MapTag::Alpha => o.set_alpha(p, v),
                    MapTag::Black => o.set_black(p, v),
                    MapTag::Intensity => o.set_gray(p, v),
                    MapTag::Pad => {}
                }
            }
        }
    }
    region.height
}
