//! Pixel cache regions out to wire scanlines.

use alloc::format;
use alloc::vec::Vec;

use crate::channel::PixelChannel;
use crate::error::{DiagnosticKind, Diagnostics, QuantumError, QuantumResult};
use crate::image::{Image, PixelOffsets, Region};
use crate::pixel::pixel_luma;
use crate::quantum::{OPAQUE_ALPHA, QUANTUM_RANGE, QUANTUM_SCALE, Quantum, clamp_to_quantum};
use crate::quantum_info::{AlphaType, QuantumInfo, QuantumType};
use crate::sample::{SampleTarget, SampleWriter, associated_slots, resolve_targets};

/// Pack `region` of `image` into `pixels` as rows of `quantum_type` samples
/// in the wire format of `info`.
///
/// The exact mirror of [`import_quantum_pixels`](crate::import_quantum_pixels):
/// returns the bytes produced, one [`QuantumInfo::extent`] per completed row,
/// and stops early with a diagnostic when a row is outside the image. Pad
/// bytes are stepped over and keep their previous contents.
///
/// With [`AlphaType::Disassociated`] the color samples are multiplied by
/// alpha on the way out; the cache itself is not modified.
///
/// # Errors
///
/// As for import: [`QuantumError::ColormappedImageRequired`],
/// [`QuantumError::ColorSeparatedImageRequired`],
/// [`QuantumError::InvalidRegion`], [`QuantumError::BufferTooSmall`] and
/// [`QuantumError::ResourceLimit`], all raised before `pixels` is touched.
pub fn export_quantum_pixels(
    image: &Image,
    region: &Region,
    info: &QuantumInfo,
    quantum_type: QuantumType,
    pixels: &mut [u8],
    diagnostics: &mut Diagnostics,
) -> QuantumResult<usize> {
    quantum_type.validate(image)?;
    image.check_region(region)?;
    let row_bytes = info.extent(image, quantum_type, region.width)?;
    let required = row_bytes
        .checked_mul(region.height)
        .ok_or(QuantumError::ResourceLimit("export extent"))?;
    if pixels.len() < required {
        return Err(QuantumError::BufferTooSmall {
            required,
            actual: pixels.len(),
        });
    }
    log::trace!(
        "export {quantum_type:?} depth {} ({:?}) from {}x{}+{}+{}",
        info.depth(),
        info.sample_format(),
        region.width,
        region.height,
        region.x,
        region.y
    );

    let offsets = image.offsets();
    let mut targets = resolve_targets(image, quantum_type);
    if quantum_type.is_cbycr() {
        for target in &mut targets {
            *target = match *target {
                SampleTarget::Slot(i) if i == offsets.red => SampleTarget::Slot(offsets.green),
                SampleTarget::Slot(i) if i == offsets.green => SampleTarget::Slot(offsets.red),
                other => other,
            };
        }
    }
    let associate = info.alpha_type() == AlphaType::Disassociated && offsets.alpha.is_some();
    let pack = Pack {
        image,
        offsets,
        associated: if associate {
            associated_slots(image)
        } else {
            Vec::new()
        },
        min_is_white: info.min_is_white() && info.depth() == 1,
    };

    let mut rows = 0;
    for y in 0..region.height {
        let Some(row) = image.row(region, y) else {
            diagnostics.push(
                DiagnosticKind::PixelCacheUnavailable,
                format!("export row {}", region.y + y),
            );
            break;
        };
        let start = y * row_bytes;
        let mut writer = SampleWriter::new(info, &mut pixels[start..start + row_bytes]);
        if quantum_type == QuantumType::CbYCrY {
            pack.cbycry_row(&mut writer, row)?;
        } else {
            for p in row.chunks_exact(offsets.channels) {
                for &target in &targets {
                    pack.sample(&mut writer, target, p)?;
                }
                writer.end_pixel()?;
            }
        }
        writer.finish()?;
        rows += 1;
    }
    Ok(rows * row_bytes)
}

/// Per-call constants of the main export loop.
struct Pack<'a> {
    image: &'a Image,
    offsets: PixelOffsets,
    /// Slots multiplied by alpha; empty when no association applies.
    associated: Vec<bool>,
    /// 1-bit gray writes dark pixels as set bits.
    min_is_white: bool,
}

impl Pack<'_> {
    #[inline]
    fn alpha_scale(&self, p: &[Quantum]) -> f64 {
        QUANTUM_SCALE * self.offsets.alpha(p) as f64
    }

    fn sample(
        &self,
        writer: &mut SampleWriter<'_>,
        target: SampleTarget,
        p: &[Quantum],
    ) -> QuantumResult<()> {
        match target {
            SampleTarget::Slot(i) => {
                let q = if self.associated.get(i).copied().unwrap_or(false) {
                    clamp_to_quantum(self.alpha_scale(p) * p[i] as f64)
                } else {
                    p[i]
                };
                writer.write_quantum(q)
            }
            SampleTarget::Missing(channel) => writer.write_quantum(if channel == PixelChannel::Alpha {
                OPAQUE_ALPHA
            } else {
                0
            }),
            SampleTarget::Gray => {
                let mut luma = pixel_luma(self.image, p);
                if !self.associated.is_empty() {
                    luma *= self.alpha_scale(p);
                }
                if self.min_is_white {
                    return writer.write_index(u64::from(luma < QUANTUM_RANGE / 2.0));
                }
                writer.write_quantum(clamp_to_quantum(luma))
            }
            SampleTarget::Index => writer.write_index(u64::from(self.offsets.index(p))),
        }
    }

    /// Cb, Y0, Cr, Y1 per pixel pair; chroma comes from the first pixel and
    /// an odd trailing pixel repeats its luma.
    fn cbycry_row(&self, writer: &mut SampleWriter<'_>, row: &[Quantum]) -> QuantumResult<()> {
        let o = &self.offsets;
        for pair in row.chunks(2 * o.channels) {
            let (first, second) = pair.split_at(o.channels);
            let second = if second.is_empty() { first } else { second };
            writer.write_quantum(o.green(first))?;
            writer.write_quantum(o.red(first))?;
            writer.write_quantum(o.blue(first))?;
            writer.write_quantum(o.red(second))?;
            writer.end_pixel()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Colorspace;
    use crate::import::import_quantum_pixels;
    use crate::pixel::PixelInfo;
    use crate::quantum::{QUANTUM_RANGE, scale_char_to_quantum};
    use crate::quantum_info::{Endian, QuantumFormat};
    use rstest::rstest;

    fn export(image: &Image, info: &QuantumInfo, quantum_type: QuantumType) -> Vec<u8> {
        let region = Region::new(0, 0, image.columns(), image.rows());
        let len = info.extent(image, quantum_type, image.columns()).unwrap() * image.rows();
        let mut out = vec![0u8; len];
        let used = export_quantum_pixels(
            image,
            &region,
            info,
            quantum_type,
            &mut out,
            &mut Diagnostics::new(),
        )
        .unwrap();
        assert_eq!(used, len);
        out
    }

    /// Deterministic pixels covering the full quantum range.
    fn gradient(columns: usize, rows: usize, alpha: bool) -> Image {
        let mut image = Image::builder(columns, rows).with_alpha(alpha).build().unwrap();
        let n = image.pixels().len();
        for (i, q) in image.pixels_mut().iter_mut().enumerate() {
            *q = clamp_to_quantum(QUANTUM_RANGE * ((i * 37) % n) as f64 / (n - 1) as f64);
        }
        image
    }

    // --- bit-exact layouts ---

    #[test]
    fn ten_bit_rgb_word() {
        let mut image = Image::builder(4, 1).build().unwrap();
        image.set_channel(0, 0, PixelChannel::Red, Quantum::MAX);
        let info = QuantumInfo::new()
            .with_depth(10)
            .with_pack(false)
            .with_endian(Endian::Msb);
        let out = export(&image, &info, QuantumType::Rgb);
        assert_eq!(out.len(), 16);
        assert_eq!(u32::from_be_bytes([out[0], out[1], out[2], out[3]]), 0xffc0_0000);
        assert!(out[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn one_bit_gray_thresholds() {
        let mut image = Image::builder(8, 1)
            .with_colorspace(Colorspace::Gray)
            .build()
            .unwrap();
        let w = Quantum::MAX;
        for (x, v) in [w, 0, w, w, 0, 0, 0, 0].into_iter().enumerate() {
            image.pixel_mut(x, 0).unwrap().fill(v);
        }
        let info = QuantumInfo::new().with_depth(1);
        assert_eq!(export(&image, &info, QuantumType::Gray), [0b1011_0000]);
        let info = info.with_min_is_white(true);
        assert_eq!(export(&image, &info, QuantumType::Gray), [0b0100_1111]);
    }

    #[rstest]
    #[case(QuantumInfo::new(), vec![0x20, 0xe0])]
    #[case(QuantumInfo::new().with_depth(16), vec![0x20, 0x20, 0xe0, 0xe0])]
    #[case(QuantumInfo::new().with_depth(4), vec![0x2e])]
    fn min_is_white_leaves_multibit_gray_alone(#[case] info: QuantumInfo, #[case] expected: Vec<u8>) {
        let mut image = Image::builder(2, 1)
            .with_colorspace(Colorspace::Gray)
            .build()
            .unwrap();
        image.pixel_mut(0, 0).unwrap().fill(scale_char_to_quantum(0x20));
        image.pixel_mut(1, 0).unwrap().fill(scale_char_to_quantum(0xe0));
        let info = info.with_min_is_white(true);
        assert_eq!(export(&image, &info, QuantumType::Gray), expected);
    }

    #[test]
    fn one_bit_gray_alpha_polarity() {
        let mut image = Image::builder(2, 1)
            .with_colorspace(Colorspace::Gray)
            .with_alpha(true)
            .build()
            .unwrap();
        image.pixel_mut(0, 0).unwrap().fill(Quantum::MAX);
        image.pixel_mut(1, 0).unwrap().fill(0);
        image.set_channel(1, 0, PixelChannel::Alpha, Quantum::MAX);
        let info = QuantumInfo::new().with_depth(1);
        assert_eq!(export(&image, &info, QuantumType::GrayAlpha), [0b1101_0000]);
        let info = info.with_min_is_white(true);
        assert_eq!(export(&image, &info, QuantumType::GrayAlpha), [0b0111_0000]);
    }

    #[test]
    fn missing_alpha_exports_opaque() {
        let image = Image::builder(1, 1).build().unwrap();
        assert_eq!(export(&image, &QuantumInfo::new(), QuantumType::Rgba), [0, 0, 0, 0xff]);
    }

    #[test]
    fn cbycr_swaps_on_the_way_out() {
        let mut image = Image::builder(1, 1)
            .with_colorspace(Colorspace::YCbCr)
            .build()
            .unwrap();
        let c = scale_char_to_quantum;
        image.pixel_mut(0, 0).unwrap().copy_from_slice(&[c(2), c(1), c(3)]);
        assert_eq!(export(&image, &QuantumInfo::new(), QuantumType::CbYCr), [1, 2, 3]);
    }

    #[test]
    fn cbycry_odd_width_repeats_luma() {
        let mut image = Image::builder(3, 1)
            .with_colorspace(Colorspace::YCbCr)
            .build()
            .unwrap();
        let c = scale_char_to_quantum;
        image.pixel_mut(0, 0).unwrap().copy_from_slice(&[c(2), c(1), c(3)]);
        image.pixel_mut(1, 0).unwrap().copy_from_slice(&[c(4), c(1), c(3)]);
        image.pixel_mut(2, 0).unwrap().copy_from_slice(&[c(6), c(5), c(7)]);
        assert_eq!(
            export(&image, &QuantumInfo::new(), QuantumType::CbYCrY),
            [1, 2, 3, 4, 5, 6, 7, 6]
        );
    }

    #[test]
    fn index_exports_raw_index() {
        let colormap = vec![PixelInfo::rgb(0, 0, 0); 4];
        let mut image = Image::builder(2, 1).with_colormap(colormap).build().unwrap();
        image.set_channel(1, 0, PixelChannel::Index, 3);
        let info = QuantumInfo::new().with_depth(16);
        assert_eq!(export(&image, &info, QuantumType::Index), [0, 0, 0, 3]);
    }

    #[test]
    fn short_row_reports_cache_miss() {
        let image = Image::builder(2, 1).build().unwrap();
        let mut out = [0u8; 12];
        let mut sink = Diagnostics::new();
        let used = export_quantum_pixels(
            &image,
            &Region::new(0, 0, 2, 2),
            &QuantumInfo::new(),
            QuantumType::Rgb,
            &mut out,
            &mut sink,
        )
        .unwrap();
        assert_eq!(used, 6);
        assert_eq!(sink.count(DiagnosticKind::PixelCacheUnavailable), 1);
    }

    #[test]
    fn invalid_region_is_rejected() {
        let image = Image::builder(2, 1).build().unwrap();
        let err = export_quantum_pixels(
            &image,
            &Region::row(1, 0, 2),
            &QuantumInfo::new(),
            QuantumType::Rgb,
            &mut [0u8; 6],
            &mut Diagnostics::new(),
        )
        .unwrap_err();
        assert!(matches!(err, QuantumError::InvalidRegion { .. }));
    }

    // --- round trips ---

    /// `bits` is the precision the wire keeps: the integer depth, or the
    /// significand width of a float format.
    #[rstest]
    #[case(QuantumInfo::new(), QuantumType::Rgb, 8)]
    #[case(QuantumInfo::new(), QuantumType::Bgra, 8)]
    #[case(QuantumInfo::new().with_depth(16).with_endian(Endian::Lsb), QuantumType::Rgba, 16)]
    #[case(QuantumInfo::new().with_depth(32), QuantumType::Bgr, 32)]
    #[case(QuantumInfo::new().with_depth(64), QuantumType::Rgb, 64)]
    #[case(QuantumInfo::new().with_depth(10).with_pack(false), QuantumType::Rgba, 10)]
    #[case(QuantumInfo::new().with_depth(12).with_pack(false), QuantumType::Rgb, 12)]
    #[case(QuantumInfo::new().with_depth(12), QuantumType::Rgba, 12)]
    #[case(QuantumInfo::new().with_depth(5).with_quantum(32).with_pad(2), QuantumType::Rgb, 5)]
    #[case(QuantumInfo::new().with_depth(3).with_pad(1), QuantumType::Rgba, 3)]
    #[case(QuantumInfo::new().with_format(QuantumFormat::FloatingPoint).with_depth(32), QuantumType::Rgba, 24)]
    #[case(QuantumInfo::new().with_format(QuantumFormat::FloatingPoint).with_depth(64), QuantumType::Bgra, 53)]
    #[case(QuantumInfo::new().with_format(QuantumFormat::FloatingPoint).with_depth(24), QuantumType::Rgb, 17)]
    #[case(QuantumInfo::new().with_format(QuantumFormat::FloatingPoint), QuantumType::Rgb, 11)]
    fn round_trip_within_depth(
        #[case] info: QuantumInfo,
        #[case] quantum_type: QuantumType,
        #[case] bits: u32,
    ) {
        let alpha = quantum_type.roles().len() == 4;
        let source = gradient(5, 3, alpha);
        let wire = export(&source, &info, quantum_type);
        let mut target = Image::builder(5, 3).with_alpha(alpha).build().unwrap();
        let region = Region::new(0, 0, 5, 3);
        let used = import_quantum_pixels(
            &mut target,
            &region,
            &info,
            quantum_type,
            &wire,
            &mut Diagnostics::new(),
        )
        .unwrap();
        assert_eq!(used, wire.len());
        // One wire step, or rounding only when the wire is at least as
        // precise as the cache.
        let tolerance = if bits >= Quantum::BITS {
            1.0
        } else {
            QUANTUM_RANGE / ((1u64 << bits) - 1) as f64
        };
        for (a, b) in source.pixels().iter().zip(target.pixels()) {
            assert!(
                (*a as f64 - *b as f64).abs() <= tolerance,
                "{a} vs {b} at depth {}",
                info.depth()
            );
        }
    }

    #[test]
    fn one_bit_round_trip_collapses_to_two_levels() {
        let source = gradient(9, 2, false);
        let info = QuantumInfo::new().with_depth(1);
        let wire = export(&source, &info, QuantumType::Rgb);
        let mut target = Image::builder(9, 2).build().unwrap();
        import_quantum_pixels(
            &mut target,
            &Region::new(0, 0, 9, 2),
            &info,
            QuantumType::Rgb,
            &wire,
            &mut Diagnostics::new(),
        )
        .unwrap();
        for (a, b) in source.pixels().iter().zip(target.pixels()) {
            let expected = if *a as f64 >= QUANTUM_RANGE / 2.0 { Quantum::MAX } else { 0 };
            assert_eq!(*b, expected);
        }
    }

    // --- alpha association ---

    #[test]
    fn disassociated_round_trip_restores_premultiplied() {
        let info = QuantumInfo::new()
            .with_depth(16)
            .with_alpha_type(AlphaType::Disassociated);
        let wire: Vec<u8> = [0x3000u16, 0x2000, 0x1000, 0x8000, 0x0400, 0x0200, 0x0100, 0x0800]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .collect();
        let mut image = Image::builder(2, 1).with_alpha(true).build().unwrap();
        let region = Region::row(0, 0, 2);
        import_quantum_pixels(
            &mut image,
            &region,
            &info,
            QuantumType::Rgba,
            &wire,
            &mut Diagnostics::new(),
        )
        .unwrap();
        let again = export(&image, &info, QuantumType::Rgba);
        for (a, b) in wire.chunks(2).zip(again.chunks(2)) {
            let a = u16::from_be_bytes([a[0], a[1]]) as f64;
            let b = u16::from_be_bytes([b[0], b[1]]) as f64;
            // One 8-bit step covers q8 builds; Q16 and Q32 land within 2.
            assert!((a - b).abs() <= 257.0 * 2.0, "{a} vs {b}");
        }
        let original = image.pixels().to_vec();
        export(&image, &info, QuantumType::Rgba);
        assert_eq!(image.pixels(), original.as_slice());
    }

    #[test]
    fn transparent_disassociation_forces_zero() {
        let info = QuantumInfo::new().with_alpha_type(AlphaType::Disassociated);
        let mut image = Image::builder(1, 1).with_alpha(true).build().unwrap();
        import_quantum_pixels(
            &mut image,
            &Region::row(0, 0, 1),
            &info,
            QuantumType::Rgba,
            &[200, 100, 50, 0],
            &mut Diagnostics::new(),
        )
        .unwrap();
        assert_eq!(image.pixel(0, 0).unwrap(), &[0, 0, 0, 0]);
    }

    // --- concurrency ---

    #[test]
    fn disjoint_rows_export_in_parallel() {
        use rayon::prelude::*;

        let image = gradient(7, 16, true);
        let info = QuantumInfo::new().with_depth(12);
        let serial = export(&image, &info, QuantumType::Rgba);
        let row_bytes = info.extent(&image, QuantumType::Rgba, 7).unwrap();
        let mut parallel = vec![0u8; serial.len()];
        parallel
            .par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(y, out)| {
                let mut diagnostics = Diagnostics::new();
                let used = export_quantum_pixels(
                    &image,
                    &Region::row(0, y, 7),
                    &info,
                    QuantumType::Rgba,
                    out,
                    &mut diagnostics,
                )
                .unwrap();
                assert_eq!(used, row_bytes);
                assert!(diagnostics.is_empty());
            });
        assert_eq!(parallel, serial);
    }
}
