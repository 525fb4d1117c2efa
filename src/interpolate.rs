//! Resampling the pixel cache at fractional coordinates.
//!
//! Neighbors outside the image are read through
//! [`Image::virtual_pixel`](crate::Image::virtual_pixel), which clamps to
//! the nearest edge. Channels carrying the `BLEND` trait are weighted by
//! their pixel's alpha and renormalized by the accumulated weight.

use alloc::vec::Vec;
use core::f64::consts::PI;

use crate::channel::{PixelChannel, PixelTrait};
use crate::error::{QuantumError, QuantumResult};
use crate::image::{Image, PixelOffsets};
use crate::pixel::{PixelInfo, pixel_luma};
use crate::quantum::{QUANTUM_SCALE, Quantum, clamp_to_quantum, perceptible_reciprocal};

// ---------------------------------------------------------------------------
// Methods
// ---------------------------------------------------------------------------

/// How a value between pixel centers is reconstructed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelInterpolateMethod {
    /// Use the image's own method.
    Undefined,
    /// Mean of the 2x2 neighborhood.
    Average,
    /// Mean of the 3x3 neighborhood around the nearest pixel.
    Average9,
    /// Mean of the 4x4 neighborhood.
    Average16,
    /// Same as [`Bilinear`](Self::Bilinear).
    Background,
    #[default]
    Bilinear,
    /// Quarter-pixel snapping between the 2x2 neighbors.
    Blend,
    /// Catmull-Rom cubic over 4x4.
    Catrom,
    /// Same as [`Catrom`](Self::Catrom).
    Bicubic,
    /// Top-left neighbor (floor of both coordinates).
    Integer,
    /// Triangle interpolation split along the flatter luma diagonal.
    Mesh,
    /// Nearest pixel center.
    Nearest,
    /// Cubic B-spline over 4x4 (smoothing, not interpolating).
    Spline,
    /// The 4x4 excerpt at the floor of the coordinates, resized to one
    /// pixel with the image's [`ResizeFilter`].
    Filter,
}

/// Kernel used by [`PixelInterpolateMethod::Filter`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ResizeFilter {
    Box,
    Triangle,
    Catrom,
    /// Mitchell-Netravali, B = C = 1/3.
    #[default]
    Mitchell,
    /// Two-lobe Lanczos, so the support fits the 4x4 window.
    Lanczos,
}

impl ResizeFilter {
    /// Kernel weight at distance `x` from a pixel center.
    pub fn weight(self, x: f64) -> f64 {
        let x = x.abs();
        match self {
            Self::Box => {
                if x <= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Triangle => (1.0 - x).max(0.0),
            Self::Catrom => {
                if x >= 2.0 {
                    0.0
                } else if x >= 1.0 {
                    -0.5 * x * x * x + 2.5 * x * x - 4.0 * x + 2.0
                } else {
                    1.5 * x * x * x - 2.5 * x * x + 1.0
                }
            }
            Self::Mitchell => {
                if x >= 2.0 {
                    0.0
                } else if x >= 1.0 {
                    (-7.0 / 18.0) * x * x * x + 2.0 * x * x - (10.0 / 3.0) * x + 16.0 / 9.0
                } else {
                    (7.0 / 6.0) * x * x * x - 2.0 * x * x + 8.0 / 9.0
                }
            }
            Self::Lanczos => {
                if x < 1e-8 {
                    1.0
                } else if x >= 2.0 {
                    0.0
                } else {
                    let pi_x = PI * x;
                    let pi_x_2 = pi_x / 2.0;
                    (pi_x.sin() / pi_x) * (pi_x_2.sin() / pi_x_2)
                }
            }
        }
    }
}

/// 1D Catmull-Rom weights for a sample `x` past the second of four taps.
fn catrom_weights(x: f64) -> [f64; 4] {
    let alpha = 1.0 - x;
    let beta = -0.5 * x * alpha;
    let w0 = alpha * beta;
    let w3 = x * beta;
    let gamma = w3 - w0;
    [w0, alpha - w0 + gamma, x - w3 - gamma, w3]
}

/// 1D cubic B-spline weights, laid out like [`catrom_weights`].
fn spline_weights(x: f64) -> [f64; 4] {
    let alpha = 1.0 - x;
    let w3 = x * x * x / 6.0;
    let w0 = alpha * alpha * alpha / 6.0;
    let beta = w3 - w0;
    [w0, alpha - w0 + beta, x - w3 - beta, w3]
}

#[inline]
fn mesh(dx: f64, dy: f64, p: f64, x: f64, y: f64) -> f64 {
    dx * x + dy * y + (1.0 - dx - dy) * p
}

// ---------------------------------------------------------------------------
// Neighborhoods
// ---------------------------------------------------------------------------

/// Up to 4x4 edge-clamped neighbors, row-major.
struct Window<'a> {
    pixels: [&'a [Quantum]; 16],
    len: usize,
}

impl<'a> Window<'a> {
    fn gather(image: &'a Image, x0: i64, y0: i64, size: usize) -> QuantumResult<Self> {
        let empty = || QuantumError::InvalidRegion {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
            columns: image.columns(),
            rows: image.rows(),
        };
        let first = image.virtual_pixel(x0, y0).ok_or_else(empty)?;
        let mut pixels = [first; 16];
        for j in 0..size {
            for i in 0..size {
                pixels[j * size + i] = image
                    .virtual_pixel(x0 + i as i64, y0 + j as i64)
                    .ok_or_else(empty)?;
            }
        }
        Ok(Self {
            pixels,
            len: size * size,
        })
    }

    /// Alpha weights and (alpha-weighted when `blend`) values of one slot.
    fn samples(&self, o: &PixelOffsets, slot: usize, blend: bool) -> ([f64; 16], [f64; 16]) {
        let mut alpha = [1.0; 16];
        let mut values = [0.0; 16];
        for (i, p) in self.pixels[..self.len].iter().enumerate() {
            values[i] = p[slot] as f64;
            if blend {
                alpha[i] = QUANTUM_SCALE * o.alpha(p) as f64;
                values[i] *= alpha[i];
            }
        }
        (alpha, values)
    }
}

/// One slot to resample.
#[derive(Clone, Copy)]
struct Target {
    slot: usize,
    blend: bool,
    is_alpha: bool,
}

impl Target {
    fn of(image: &Image, channel: PixelChannel) -> QuantumResult<Self> {
        let slot = image
            .channel_map()
            .offset(channel)
            .ok_or(QuantumError::NoSuchImageChannel(channel))?;
        Ok(Self {
            slot,
            blend: image.traits(channel).contains(PixelTrait::BLEND),
            is_alpha: channel == PixelChannel::Alpha,
        })
    }
}

fn resolve(image: &Image, method: PixelInterpolateMethod) -> PixelInterpolateMethod {
    match method {
        PixelInterpolateMethod::Undefined => image.interpolate(),
        other => other,
    }
}

/// Sum of `w[j][i] * v[j * 4 + i]` for separable 4x4 weights.
fn weighted_4x4(cx: &[f64; 4], cy: &[f64; 4], v: &[f64; 16]) -> f64 {
    cy.iter()
        .enumerate()
        .map(|(j, wy)| wy * cx.iter().zip(&v[j * 4..j * 4 + 4]).map(|(wx, p)| wx * p).sum::<f64>())
        .sum()
}

/// Pull `v` within a few pixels of `[0, extent]`; every window past the edge
/// reads the same clamped pixels, so the result is unchanged. NaN maps to 0.
fn clamp_coordinate(v: f64, extent: usize) -> f64 {
    let limit = extent as f64 + 4.0;
    if v.is_nan() {
        0.0
    } else {
        v.clamp(-limit, limit)
    }
}

fn interpolate_target(
    image: &Image,
    target: Target,
    method: PixelInterpolateMethod,
    x: f64,
    y: f64,
) -> QuantumResult<f64> {
    use PixelInterpolateMethod as M;

    let o = image.offsets();
    let x = clamp_coordinate(x, image.columns());
    let y = clamp_coordinate(y, image.rows());
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let dx = x - x0 as f64;
    let dy = y - y0 as f64;
    let method = resolve(image, method);
    Ok(match method {
        M::Average | M::Average9 | M::Average16 => {
            let (size, x0, y0) = match method {
                M::Average9 => (3, (x + 0.5).floor() as i64 - 1, (y + 0.5).floor() as i64 - 1),
                M::Average16 => (4, x0 - 1, y0 - 1),
                _ => (2, x0, y0),
            };
            let window = Window::gather(image, x0, y0, size)?;
            let (alpha, values) = window.samples(&o, target.slot, target.blend);
            let count = window.len as f64;
            (0..window.len)
                .map(|i| perceptible_reciprocal(alpha[i]) / count * values[i])
                .sum()
        }
        M::Blend => {
            let window = Window::gather(image, x0, y0, 2)?;
            let (mut alpha, mut values) = window.samples(&o, target.slot, target.blend);
            let mut count = 1.0;
            for i in 0..2 {
                if dy >= 0.75 {
                    alpha[i] = alpha[i + 2];
                    values[i] = values[i + 2];
                } else if dy > 0.25 {
                    count = 2.0;
                    alpha[i] += alpha[i + 2];
                    values[i] += values[i + 2];
                }
            }
            if dx >= 0.75 {
                alpha[0] = alpha[1];
                values[0] = values[1];
            } else if dx > 0.25 {
                count *= 2.0;
                alpha[0] += alpha[1];
                values[0] += values[1];
            }
            let gamma = if target.is_alpha {
                perceptible_reciprocal(count)
            } else {
                perceptible_reciprocal(alpha[0])
            };
            gamma * values[0]
        }
        M::Catrom | M::Bicubic | M::Spline => {
            let window = Window::gather(image, x0 - 1, y0 - 1, 4)?;
            let (alpha, values) = window.samples(&o, target.slot, target.blend);
            let (cx, cy) = if method == M::Spline {
                (spline_weights(dx), spline_weights(dy))
            } else {
                (catrom_weights(dx), catrom_weights(dy))
            };
            let gamma = if target.is_alpha {
                1.0
            } else {
                perceptible_reciprocal(weighted_4x4(&cx, &cy, &alpha))
            };
            gamma * weighted_4x4(&cx, &cy, &values)
        }
        M::Filter => {
            let window = Window::gather(image, x0 - 1, y0 - 1, 4)?;
            let (alpha, values) = window.samples(&o, target.slot, target.blend);
            // The excerpt resized to a single pixel: taps a quarter pixel
            // apart around its center, whatever the fractional offset.
            let filter = image.filter();
            let taps: [f64; 4] = core::array::from_fn(|i| filter.weight((i as f64 - 1.5) / 4.0));
            perceptible_reciprocal(weighted_4x4(&taps, &taps, &alpha))
                * weighted_4x4(&taps, &taps, &values)
        }
        M::Integer => {
            let window = Window::gather(image, x0, y0, 1)?;
            window.pixels[0][target.slot] as f64
        }
        M::Nearest => {
            let nx = (x + 0.5).floor() as i64;
            let ny = (y + 0.5).floor() as i64;
            let window = Window::gather(image, nx, ny, 1)?;
            window.pixels[0][target.slot] as f64
        }
        M::Mesh => {
            let window = Window::gather(image, x0, y0, 2)?;
            let (alpha, values) = window.samples(&o, target.slot, target.blend);
            let luma = |i: usize| pixel_luma(image, window.pixels[i]);
            let diagonal_03 = (luma(0) - luma(3)).abs() < (luma(1) - luma(2)).abs();
            // (corner, along x, along y, dx, dy) of the triangle holding the point
            let (p, a, b, tx, ty) = if diagonal_03 {
                if dx <= dy {
                    (2, 3, 0, dx, 1.0 - dy)
                } else {
                    (1, 0, 3, 1.0 - dx, dy)
                }
            } else if dx <= 1.0 - dy {
                (0, 1, 2, dx, dy)
            } else {
                (3, 2, 1, 1.0 - dx, 1.0 - dy)
            };
            let gamma = perceptible_reciprocal(mesh(tx, ty, alpha[p], alpha[a], alpha[b]));
            gamma * mesh(tx, ty, values[p], values[a], values[b])
        }
        _ => {
            let window = Window::gather(image, x0, y0, 2)?;
            let (alpha, values) = window.samples(&o, target.slot, target.blend);
            let (ex, ey) = (1.0 - dx, 1.0 - dy);
            let bilinear = |v: &[f64; 16]| ey * (ex * v[0] + dx * v[1]) + dy * (ex * v[2] + dx * v[3]);
            perceptible_reciprocal(bilinear(&alpha)) * bilinear(&values)
        }
    })
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Resample one channel at (`x`, `y`), in quantum units.
///
/// The result is not clamped; cubic methods may overshoot.
///
/// # Errors
///
/// [`QuantumError::NoSuchImageChannel`] when the image has no slot for
/// `channel`; [`QuantumError::InvalidRegion`] for an empty image.
pub fn interpolate_pixel_channel(
    image: &Image,
    channel: PixelChannel,
    method: PixelInterpolateMethod,
    x: f64,
    y: f64,
) -> QuantumResult<f64> {
    interpolate_target(image, Target::of(image, channel)?, method, x, y)
}

/// Resample every slot at (`x`, `y`) into a pixel laid out like the image's
/// own.
///
/// # Errors
///
/// [`QuantumError::InvalidRegion`] for an empty image.
pub fn interpolate_pixel_channels(
    image: &Image,
    method: PixelInterpolateMethod,
    x: f64,
    y: f64,
) -> QuantumResult<Vec<Quantum>> {
    image
        .channel_map()
        .slots()
        .iter()
        .map(|slot| {
            let target = Target::of(image, slot.channel)?;
            Ok(clamp_to_quantum(interpolate_target(image, target, method, x, y)?))
        })
        .collect()
}

/// Resample at (`x`, `y`) into an unclamped [`PixelInfo`].
///
/// Color channels are alpha-weighted whenever the image has alpha, whatever
/// the channel mask says.
///
/// # Errors
///
/// [`QuantumError::InvalidRegion`] for an empty image.
pub fn interpolate_pixel_info(
    image: &Image,
    method: PixelInterpolateMethod,
    x: f64,
    y: f64,
) -> QuantumResult<PixelInfo> {
    let o = image.offsets();
    let blend = image.has_alpha();
    let mut info = PixelInfo {
        colorspace: image.colorspace(),
        alpha_trait: blend,
        fuzz: image.fuzz(),
        ..PixelInfo::default()
    };
    let sample = |slot: usize, blend: bool, is_alpha: bool| {
        let target = Target {
            slot,
            blend,
            is_alpha,
        };
        interpolate_target(image, target, method, x, y)
    };
    info.red = sample(o.red, blend, false)?;
    info.green = sample(o.green, blend, false)?;
    info.blue = sample(o.blue, blend, false)?;
    if let Some(slot) = o.black {
        info.black = sample(slot, blend, false)?;
    }
    if let Some(slot) = o.alpha {
        info.alpha = sample(slot, false, true)?;
    }
    if let Some(slot) = o.index {
        info.index = sample(slot, false, false)?;
    }
    Ok(info)
}
