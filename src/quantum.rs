//! Build-time quantum type and the scaling laws between wire sample widths
//! and the internal quantum.
//!
//! The internal depth is fixed per build: 16 bits by default, 8 bits with
//! the `q8` feature, 32 bits with `q32`. Every scale function here is
//! bit-exact for the selected depth; codecs rely on `char -> quantum ->
//! char` being the identity.

#[cfg(all(feature = "q8", feature = "q32"))]
compile_error!("features `q8` and `q32` select different quantum depths; enable at most one");

/// A single channel sample in the pixel cache.
#[cfg(feature = "q8")]
pub type Quantum = u8;
/// A single channel sample in the pixel cache.
#[cfg(all(feature = "q32", not(feature = "q8")))]
pub type Quantum = u32;
/// A single channel sample in the pixel cache.
#[cfg(not(any(feature = "q8", feature = "q32")))]
pub type Quantum = u16;

/// Bits per internal quantum.
pub const QUANTUM_DEPTH: u32 = Quantum::BITS;

/// Largest quantum value, as a float.
pub const QUANTUM_RANGE: f64 = Quantum::MAX as f64;

/// `1 / QUANTUM_RANGE`; maps a quantum onto `[0, 1]`.
pub const QUANTUM_SCALE: f64 = 1.0 / QUANTUM_RANGE;

/// Denominators smaller than this are treated as zero.
pub const MAGICK_EPSILON: f64 = 1.0e-12;

/// Alpha of a fully opaque pixel.
pub const OPAQUE_ALPHA: Quantum = Quantum::MAX;

/// Alpha of a fully transparent pixel.
pub const TRANSPARENT_ALPHA: Quantum = 0;

/// Upper bound on storage slots per pixel.
pub const MAX_PIXEL_CHANNELS: usize = 64;

// ---------------------------------------------------------------------------
// Rounding and reciprocals
// ---------------------------------------------------------------------------

/// Round a real value to the nearest quantum, saturating at both ends.
///
/// NaN maps to 0.
#[inline]
pub fn clamp_to_quantum(value: f64) -> Quantum {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    if value >= QUANTUM_RANGE {
        return Quantum::MAX;
    }
    (value + 0.5) as Quantum
}

/// `1 / x`, or `sign(x) / MAGICK_EPSILON` when `|x|` is too small to divide by.
#[inline]
pub fn perceptible_reciprocal(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    if sign * x >= MAGICK_EPSILON {
        return 1.0 / x;
    }
    sign / MAGICK_EPSILON
}

// ---------------------------------------------------------------------------
// Arbitrary depths
// ---------------------------------------------------------------------------

/// Largest value representable in `depth` bits (all ones), capped at 64 bits.
///
/// Depth 0 has range 0.
#[inline]
pub const fn quantum_range(depth: u32) -> u64 {
    if depth == 0 {
        return 0;
    }
    let depth = if depth > 64 { 64 } else { depth };
    let half = 1u64 << (depth - 1);
    half + (half - 1)
}

/// Scale a `range`-bounded wire value up to a quantum, rounding half up.
///
/// Values above `range` saturate at `QUANTUM_RANGE`.
#[inline]
pub fn scale_any_to_quantum(value: u64, range: u64) -> Quantum {
    if value > range {
        return Quantum::MAX;
    }
    (QUANTUM_RANGE * (value as f64 * perceptible_reciprocal(range as f64)) + 0.5) as Quantum
}

/// Scale a quantum down to a `range`-bounded wire value, truncating.
#[inline]
pub fn scale_quantum_to_any(quantum: Quantum, range: u64) -> u64 {
    (range as f64 * quantum as f64 / QUANTUM_RANGE) as u64
}

// ---------------------------------------------------------------------------
// Power-of-two widths
// ---------------------------------------------------------------------------

#[cfg(not(any(feature = "q8", feature = "q32")))]
mod widths {
    use super::Quantum;

    #[inline]
    pub const fn char_to_quantum(value: u8) -> Quantum {
        257 * value as Quantum
    }

    #[inline]
    pub const fn short_to_quantum(value: u16) -> Quantum {
        value
    }

    #[inline]
    pub const fn long_to_quantum(value: u32) -> Quantum {
        (value / 65537) as Quantum
    }

    #[inline]
    pub const fn long_long_to_quantum(value: u64) -> Quantum {
        (value / 281_479_271_743_489) as Quantum
    }

    #[inline]
    pub const fn quantum_to_char(quantum: Quantum) -> u8 {
        let q = quantum as u32 + 128;
        ((q - (q >> 8)) >> 8) as u8
    }

    #[inline]
    pub const fn quantum_to_short(quantum: Quantum) -> u16 {
        quantum
    }

    #[inline]
    pub const fn quantum_to_long(quantum: Quantum) -> u32 {
        65537 * quantum as u32
    }

    #[inline]
    pub const fn quantum_to_long_long(quantum: Quantum) -> u64 {
        281_479_271_743_489 * quantum as u64
    }
}

#[cfg(feature = "q8")]
mod widths {
    use super::Quantum;

    #[inline]
    pub const fn char_to_quantum(value: u8) -> Quantum {
        value
    }

    #[inline]
    pub const fn short_to_quantum(value: u16) -> Quantum {
        ((value as u32 + 128) / 257) as Quantum
    }

    #[inline]
    pub const fn long_to_quantum(value: u32) -> Quantum {
        (value / 16_843_009) as Quantum
    }

    #[inline]
    pub const fn long_long_to_quantum(value: u64) -> Quantum {
        (value / 72_340_172_838_076_673) as Quantum
    }

    #[inline]
    pub const fn quantum_to_char(quantum: Quantum) -> u8 {
        quantum
    }

    #[inline]
    pub const fn quantum_to_short(quantum: Quantum) -> u16 {
        257 * quantum as u16
    }

    #[inline]
    pub const fn quantum_to_long(quantum: Quantum) -> u32 {
        16_843_009 * quantum as u32
    }

    #[inline]
    pub const fn quantum_to_long_long(quantum: Quantum) -> u64 {
        72_340_172_838_076_673 * quantum as u64
    }
}

#[cfg(all(feature = "q32", not(feature = "q8")))]
mod widths {
    use super::Quantum;

    #[inline]
    pub const fn char_to_quantum(value: u8) -> Quantum {
        16_843_009 * value as Quantum
    }

    #[inline]
    pub const fn short_to_quantum(value: u16) -> Quantum {
        65537 * value as Quantum
    }

    #[inline]
    pub const fn long_to_quantum(value: u32) -> Quantum {
        value
    }

    #[inline]
    pub const fn long_long_to_quantum(value: u64) -> Quantum {
        (value / 4_294_967_297) as Quantum
    }

    #[inline]
    pub const fn quantum_to_char(quantum: Quantum) -> u8 {
        ((quantum as u64 + 8_421_504) / 16_843_009) as u8
    }

    #[inline]
    pub const fn quantum_to_short(quantum: Quantum) -> u16 {
        ((quantum as u64 + 32768) / 65537) as u16
    }

    #[inline]
    pub const fn quantum_to_long(quantum: Quantum) -> u32 {
        quantum
    }

    #[inline]
    pub const fn quantum_to_long_long(quantum: Quantum) -> u64 {
        4_294_967_297 * quantum as u64
    }
}

pub use widths::{
    char_to_quantum as scale_char_to_quantum, long_long_to_quantum as scale_long_long_to_quantum,
    long_to_quantum as scale_long_to_quantum, quantum_to_char as scale_quantum_to_char,
    quantum_to_long as scale_quantum_to_long,
    quantum_to_long_long as scale_quantum_to_long_long,
    quantum_to_short as scale_quantum_to_short, short_to_quantum as scale_short_to_quantum,
};

// ---------------------------------------------------------------------------
// Floating point wire formats
// ---------------------------------------------------------------------------

/// Expand an IEEE 754 binary16 bit pattern to `f32`.
#[inline]
pub fn half_to_single(bits: u16) -> f32 {
    half::f16::from_bits(bits).to_f32()
}

/// Round an `f32` to the nearest IEEE 754 binary16 bit pattern.
#[inline]
pub fn single_to_half(value: f32) -> u16 {
    half::f16::from_f32(value).to_bits()
}

/// Expand a 24-bit float (1 sign bit, 7 exponent bits biased by 63,
/// 16 mantissa bits) held in the low 24 bits of `raw`.
pub fn float24_to_single(raw: u32) -> f32 {
    let raw = raw & 0x00ff_ffff;
    if raw == 0 {
        return 0.0;
    }
    let sign = (raw >> 23) & 0x1;
    let exponent = (raw >> 16) & 0x7f;
    let exponent = if exponent != 0 { exponent + 127 - 63 } else { 0 };
    let mantissa = raw & 0xffff;
    f32::from_bits((sign << 31) | (exponent << 23) | (mantissa << 7))
}

/// Narrow an `f32` to the 24-bit float layout read by [`float24_to_single`].
///
/// Magnitudes too small for the 7-bit exponent flush to signed zero; too
/// large saturate at the largest finite value.
pub fn single_to_float24(value: f32) -> u32 {
    let bits = value.to_bits();
    let sign = (bits >> 31) & 0x1;
    let exponent = ((bits >> 23) & 0xff) as i32;
    if exponent == 0 {
        return sign << 23;
    }
    let mut exponent = exponent - 127 + 63;
    let mut mantissa = ((bits & 0x007f_ffff) + 0x40) >> 7;
    if mantissa > 0xffff {
        mantissa = 0;
        exponent += 1;
    }
    if exponent <= 0 {
        return sign << 23;
    }
    if exponent > 0x7f || value.is_nan() {
        return (sign << 23) | (0x7f << 16) | 0xffff;
    }
    (sign << 23) | ((exponent as u32) << 16) | mantissa
}

/// Narrow a real to `f32`, saturating at the finite `f32` range.
#[inline]
pub fn clamp_float_pixel(value: f64) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(f32::MIN as f64, f32::MAX as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- rounding ---

    #[test]
    fn clamp_rounds_half_up_and_saturates() {
        assert_eq!(clamp_to_quantum(-3.0), 0);
        assert_eq!(clamp_to_quantum(f64::NAN), 0);
        assert_eq!(clamp_to_quantum(0.49), 0);
        assert_eq!(clamp_to_quantum(0.5), 1);
        assert_eq!(clamp_to_quantum(QUANTUM_RANGE * 2.0), Quantum::MAX);
    }

    #[test]
    fn reciprocal_guards_tiny_denominators() {
        assert_eq!(perceptible_reciprocal(2.0), 0.5);
        assert_eq!(perceptible_reciprocal(0.0), 1.0 / MAGICK_EPSILON);
        assert_eq!(perceptible_reciprocal(-1.0e-20), -1.0 / MAGICK_EPSILON);
        assert!(perceptible_reciprocal(0.0).is_finite());
    }

    // --- arbitrary depths ---

    #[test]
    fn quantum_range_is_all_ones() {
        assert_eq!(quantum_range(0), 0);
        assert_eq!(quantum_range(1), 1);
        assert_eq!(quantum_range(10), 1023);
        assert_eq!(quantum_range(12), 4095);
        assert_eq!(quantum_range(32), u32::MAX as u64);
        assert_eq!(quantum_range(64), u64::MAX);
        assert_eq!(quantum_range(80), u64::MAX);
    }

    #[test]
    fn scale_any_saturates_above_range() {
        assert_eq!(scale_any_to_quantum(2000, 1023), Quantum::MAX);
        assert_eq!(scale_any_to_quantum(1023, 1023), Quantum::MAX);
        assert_eq!(scale_any_to_quantum(0, 1023), 0);
        assert_eq!(scale_any_to_quantum(1, 1), Quantum::MAX);
    }

    #[test]
    fn ten_bit_round_trip_loses_at_most_one_step() {
        // Export truncates, so the trip back may land one step low.
        let range = quantum_range(10);
        for v in 0..=range {
            let q = scale_any_to_quantum(v, range);
            assert!(scale_quantum_to_any(q, range).abs_diff(v) <= 1, "value {v}");
        }
        assert_eq!(scale_quantum_to_any(Quantum::MAX, range), range);
    }

    // --- power-of-two widths ---

    #[test]
    fn char_round_trip_is_identity() {
        for v in 0..=255u8 {
            assert_eq!(scale_quantum_to_char(scale_char_to_quantum(v)), v);
        }
        assert_eq!(scale_char_to_quantum(255), Quantum::MAX);
    }

    #[test]
    fn long_round_trip_of_extremes() {
        assert_eq!(scale_long_to_quantum(u32::MAX), Quantum::MAX);
        assert_eq!(scale_quantum_to_long(Quantum::MAX), u32::MAX);
        assert_eq!(scale_long_long_to_quantum(u64::MAX), Quantum::MAX);
        assert_eq!(scale_quantum_to_long_long(Quantum::MAX), u64::MAX);
        assert_eq!(scale_quantum_to_short(Quantum::MAX), u16::MAX);
        assert_eq!(scale_short_to_quantum(u16::MAX), Quantum::MAX);
    }

    #[cfg(not(any(feature = "q8", feature = "q32")))]
    #[test]
    fn q16_widths_match_reference_formulas() {
        assert_eq!(scale_char_to_quantum(0x80), 0x8080);
        assert_eq!(scale_quantum_to_char(0x80ff), 0x80);
        assert_eq!(scale_quantum_to_char(0x8101), 0x81);
        assert_eq!(scale_long_to_quantum(65537 * 1234), 1234);
        assert_eq!(scale_quantum_to_long(1), 65537);
    }

    // --- floating point ---

    #[test]
    fn half_conversions() {
        assert_eq!(half_to_single(0x3c00), 1.0);
        assert_eq!(single_to_half(0.5), 0x3800);
        assert_eq!(half_to_single(single_to_half(0.25)), 0.25);
    }

    #[test]
    fn float24_layout() {
        assert_eq!(float24_to_single(0), 0.0);
        assert_eq!(float24_to_single(0x3f_0000), 1.0);
        assert_eq!(single_to_float24(1.0), 0x3f_0000);
        assert_eq!(float24_to_single(single_to_float24(-0.75)), -0.75);
        assert_eq!(float24_to_single(single_to_float24(1.0e-30)), 0.0);
    }

    #[test]
    fn float_pixel_saturates() {
        assert_eq!(clamp_float_pixel(1.0e300), f32::MAX);
        assert_eq!(clamp_float_pixel(-1.0e300), f32::MIN);
        assert_eq!(clamp_float_pixel(0.25), 0.25);
    }
}
