//! Wire scanlines into the pixel cache.

use alloc::format;
use alloc::vec::Vec;

use crate::error::{DiagnosticKind, Diagnostics, QuantumError, QuantumResult};
use crate::image::{Image, PixelOffsets, Region};
use crate::quantum::{MAGICK_EPSILON, QUANTUM_SCALE, Quantum, clamp_to_quantum};
use crate::quantum_info::{AlphaType, QuantumFormat, QuantumInfo, QuantumType};
use crate::sample::{SampleReader, SampleTarget, associated_slots, resolve_targets};

/// Unpack `pixels`, laid out as rows of `quantum_type` samples in the wire
/// format of `info`, into `region` of `image`.
///
/// Returns the bytes consumed: one [`QuantumInfo::extent`] per completed
/// row. A row that falls outside the image stops the transfer early with a
/// [`DiagnosticKind::PixelCacheUnavailable`] diagnostic, so a short count
/// means the caller should not continue.
///
/// Out-of-range colormap indices are replaced by 0 and reported once as
/// [`DiagnosticKind::InvalidColormapIndex`].
///
/// # Errors
///
/// Nothing is written when any of these fail:
///
/// - [`QuantumError::ColormappedImageRequired`] for index types on a direct
///   image,
/// - [`QuantumError::ColorSeparatedImageRequired`] for CMYK types on a
///   non-CMYK image,
/// - [`QuantumError::InvalidRegion`] when the region's columns leave the image,
/// - [`QuantumError::BufferTooSmall`] when `pixels` is shorter than the
///   region's extent,
/// - [`QuantumError::ResourceLimit`] when the extent overflows.
pub fn import_quantum_pixels(
    image: &mut Image,
    region: &Region,
    info: &QuantumInfo,
    quantum_type: QuantumType,
    pixels: &[u8],
    diagnostics: &mut Diagnostics,
) -> QuantumResult<usize> {
    quantum_type.validate(image)?;
    image.check_region(region)?;
    let row_bytes = info.extent(image, quantum_type, region.width)?;
    let required = row_bytes
        .checked_mul(region.height)
        .ok_or(QuantumError::ResourceLimit("import extent"))?;
    if pixels.len() < required {
        return Err(QuantumError::BufferTooSmall {
            required,
            actual: pixels.len(),
        });
    }
    log::trace!(
        "import {quantum_type:?} depth {} ({:?}) into {}x{}+{}+{}",
        info.depth(),
        info.sample_format(),
        region.width,
        region.height,
        region.x,
        region.y
    );

    let offsets = image.offsets();
    let targets = resolve_targets(image, quantum_type);
    let colormap: Vec<[Quantum; 4]> = image
        .colormap()
        .iter()
        .map(|c| {
            [
                clamp_to_quantum(c.red),
                clamp_to_quantum(c.green),
                clamp_to_quantum(c.blue),
                clamp_to_quantum(c.alpha),
            ]
        })
        .collect();
    let unpack = Unpack {
        offsets,
        colormap: &colormap,
        colormap_alpha: quantum_type == QuantumType::Index,
        invert_gray: invert_gray(info, quantum_type),
        invert_index: info.min_is_white() && info.depth() == 1 && quantum_type.needs_colormap(),
    };

    let mut range_exception = false;
    let mut rows = 0;
    for y in 0..region.height {
        let Some(row) = image.row_mut(region, y) else {
            diagnostics.push(
                DiagnosticKind::PixelCacheUnavailable,
                format!("import row {}", region.y + y),
            );
            break;
        };
        let start = y * row_bytes;
        let mut reader = SampleReader::new(info, &pixels[start..start + row_bytes]);
        if quantum_type == QuantumType::CbYCrY {
            unpack.cbycry_row(&mut reader, row)?;
        } else {
            for p in row.chunks_exact_mut(offsets.channels) {
                for &target in &targets {
                    range_exception |= unpack.sample(&mut reader, target, p)?;
                }
                reader.end_pixel()?;
            }
        }
        rows += 1;
    }

    if range_exception {
        diagnostics.push(
            DiagnosticKind::InvalidColormapIndex,
            format!("import {quantum_type:?}"),
        );
    }
    if quantum_type.is_cbycr() {
        swap_luma_chroma(image, region, rows);
    }
    if info.alpha_type() == AlphaType::Disassociated && offsets.alpha.is_some() {
        disassociate_alpha(image, region, rows);
    }
    Ok(rows * row_bytes)
}

/// Per-call constants of the main import loop.
struct Unpack<'a> {
    offsets: PixelOffsets,
    colormap: &'a [[Quantum; 4]],
    colormap_alpha: bool,
    invert_gray: bool,
    /// 1-bit indices read with 0 as the set bit.
    invert_index: bool,
}

/// `min_is_white` flips plain gray at the integer depths 1, 8 and 16 only.
fn invert_gray(info: &QuantumInfo, quantum_type: QuantumType) -> bool {
    info.min_is_white()
        && info.format() == QuantumFormat::Integer
        && quantum_type == QuantumType::Gray
        && matches!(info.depth(), 1 | 8 | 16)
}

impl Unpack<'_> {
    /// Read one sample into `p`; returns whether it was a bad index.
    fn sample(
        &self,
        reader: &mut SampleReader<'_>,
        target: SampleTarget,
        p: &mut [Quantum],
    ) -> QuantumResult<bool> {
        match target {
            SampleTarget::Slot(i) => p[i] = reader.read_quantum()?,
            SampleTarget::Missing(_) => {
                reader.read_raw()?;
            }
            SampleTarget::Gray => {
                let q = reader.read_quantum()?;
                let q = if self.invert_gray { Quantum::MAX - q } else { q };
                self.offsets.set_gray(p, q);
            }
            SampleTarget::Index => {
                let mut raw = reader.read_index()?;
                if self.invert_index {
                    raw ^= 1;
                }
                let entry = usize::try_from(raw)
                    .ok()
                    .filter(|&i| i < self.colormap.len())
                    .and_then(|i| Quantum::try_from(i).ok().map(|q| (i, q)));
                let (index, value, bad) = match entry {
                    Some((i, q)) => (i, q, false),
                    None => (0, 0, true),
                };
                self.offsets.set_index(p, value);
                if let Some(&[red, green, blue, alpha]) = self.colormap.get(index) {
                    self.offsets.set_red(p, red);
                    self.offsets.set_green(p, green);
                    self.offsets.set_blue(p, blue);
                    if self.colormap_alpha {
                        self.offsets.set_alpha(p, alpha);
                    }
                }
                return Ok(bad);
            }
        }
        Ok(false)
    }

    /// Cb, Y0, Cr, Y1 per pixel pair; an odd trailing pixel takes Y0.
    fn cbycry_row(&self, reader: &mut SampleReader<'_>, row: &mut [Quantum]) -> QuantumResult<()> {
        let o = &self.offsets;
        for pair in row.chunks_mut(2 * o.channels) {
            let cb = reader.read_quantum()?;
            let y0 = reader.read_quantum()?;
            let cr = reader.read_quantum()?;
            let y1 = reader.read_quantum()?;
            let (first, second) = pair.split_at_mut(o.channels);
            o.set_red(first, y0);
            o.set_green(first, cb);
            o.set_blue(first, cr);
            if !second.is_empty() {
                o.set_red(second, y1);
                o.set_green(second, cb);
                o.set_blue(second, cr);
            }
            reader.end_pixel()?;
        }
        Ok(())
    }
}

/// Wire order Cb, Y, Cr lands in red, green, blue; the cache keeps Y, Cb, Cr.
fn swap_luma_chroma(image: &mut Image, region: &Region, rows: usize) {
    let o = image.offsets();
    for y in 0..rows {
        let Some(row) = image.row_mut(region, y) else {
            break;
        };
        for p in row.chunks_exact_mut(o.channels) {
            p.swap(o.red, o.green);
        }
    }
}

/// Divide every updatable color slot by its pixel's alpha.
///
/// Fully transparent pixels get zero color.
fn disassociate_alpha(image: &mut Image, region: &Region, rows: usize) {
    let o = image.offsets();
    let Some(alpha) = o.alpha else {
        return;
    };
    let associated = associated_slots(image);
    for y in 0..rows {
        let Some(row) = image.row_mut(region, y) else {
            break;
        };
        for p in row.chunks_exact_mut(o.channels) {
            let sa = QUANTUM_SCALE * p[alpha] as f64;
            let gamma = if sa < MAGICK_EPSILON { 0.0 } else { 1.0 / sa };
            for (v, &update) in p.iter_mut().zip(&associated) {
                if update {
                    *v = clamp_to_quantum(gamma * *v as f64);
                }
            }
        }
    }
}
