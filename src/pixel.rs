//! Materialized floating-point pixels, luma, intensity and fuzzy comparison.

use crate::image::{Colorspace, Image};
use crate::quantum::{MAGICK_EPSILON, OPAQUE_ALPHA, QUANTUM_RANGE, QUANTUM_SCALE, Quantum};

/// A pixel expanded to `f64` channels in quantum units.
///
/// Used for colormap entries, interpolation results and color comparison.
/// Never stored in the cache.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelInfo {
    pub colorspace: Colorspace,
    /// Whether `alpha` is meaningful.
    pub alpha_trait: bool,
    /// Comparison tolerance, in quantum units.
    pub fuzz: f64,
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub black: f64,
    pub alpha: f64,
    pub index: f64,
}

impl Default for PixelInfo {
    fn default() -> Self {
        Self {
            colorspace: Colorspace::Srgb,
            alpha_trait: false,
            fuzz: 0.0,
            red: 0.0,
            green: 0.0,
            blue: 0.0,
            black: 0.0,
            alpha: QUANTUM_RANGE,
            index: 0.0,
        }
    }
}

impl PixelInfo {
    /// Opaque sRGB color.
    pub fn rgb(red: Quantum, green: Quantum, blue: Quantum) -> Self {
        Self {
            red: red as f64,
            green: green as f64,
            blue: blue as f64,
            ..Self::default()
        }
    }

    /// Same color with an explicit alpha.
    pub fn with_alpha(mut self, alpha: Quantum) -> Self {
        self.alpha = alpha as f64;
        self.alpha_trait = true;
        self
    }

    /// Expand the cache pixel `p` of `image`.
    pub fn from_pixel(image: &Image, p: &[Quantum]) -> Self {
        let o = image.offsets();
        Self {
            colorspace: image.colorspace(),
            alpha_trait: image.has_alpha(),
            fuzz: image.fuzz(),
            red: o.red(p) as f64,
            green: o.green(p) as f64,
            blue: o.blue(p) as f64,
            black: o.black(p) as f64,
            alpha: o.alpha(p) as f64,
            index: o.index(p) as f64,
        }
    }

    /// Rec. 709 luma of the color channels (red for gray colorspaces).
    pub fn luma(&self) -> f64 {
        luma_of(self.colorspace, self.red, self.green, self.blue)
    }

    /// Whether `self` and `other` are within their combined fuzz.
    ///
    /// Alpha is compared first; translucent colors shrink the color
    /// distance proportionally, and a fully transparent pair is always
    /// equivalent. CMYK compares black before the color cube.
    pub fn is_fuzzy_equivalent(&self, other: &PixelInfo) -> bool {
        let fuzz = self.fuzz * self.fuzz + other.fuzz * other.fuzz;
        let mut scale = 1.0;
        let mut distance = 0.0;
        if self.alpha_trait || other.alpha_trait {
            let a = if self.alpha_trait {
                self.alpha
            } else {
                OPAQUE_ALPHA as f64
            };
            let b = if other.alpha_trait {
                other.alpha
            } else {
                OPAQUE_ALPHA as f64
            };
            let pixel = a - b;
            distance = pixel * pixel;
            if significant(distance * distance, fuzz) {
                return false;
            }
            if self.alpha_trait {
                scale = QUANTUM_SCALE * self.alpha;
            }
            if other.alpha_trait {
                scale *= QUANTUM_SCALE * other.alpha;
            }
            if scale <= MAGICK_EPSILON {
                return true;
            }
        }
        if self.colorspace == Colorspace::Cmyk {
            let pixel = self.black - other.black;
            distance += pixel * pixel * scale;
            if significant(distance * distance, fuzz) {
                return false;
            }
            scale *= QUANTUM_SCALE * (QUANTUM_RANGE - self.black);
            scale *= QUANTUM_SCALE * (QUANTUM_RANGE - other.black);
        }
        distance *= 3.0;
        let fuzz = fuzz * 3.0;
        for pixel in [
            self.red - other.red,
            self.green - other.green,
            self.blue - other.blue,
        ] {
            distance += pixel * pixel * scale;
            if significant(distance, fuzz) {
                return false;
            }
        }
        true
    }
}

#[inline]
fn significant(error: f64, fuzz: f64) -> bool {
    error - fuzz > MAGICK_EPSILON
}

// ---------------------------------------------------------------------------
// Gamma
// ---------------------------------------------------------------------------

/// sRGB transfer function, linear quantum to encoded quantum.
pub fn encode_pixel_gamma(pixel: f64) -> f64 {
    if pixel <= 0.003_130_668_442_500_588_3 * QUANTUM_RANGE {
        return 12.92 * pixel;
    }
    QUANTUM_RANGE * (1.055 * (QUANTUM_SCALE * pixel).powf(1.0 / 2.4) - 0.055)
}

/// Inverse sRGB transfer function, encoded quantum to linear quantum.
pub fn decode_pixel_gamma(pixel: f64) -> f64 {
    if pixel <= 0.040_448_236_277_107_6 * QUANTUM_RANGE {
        return pixel / 12.92;
    }
    QUANTUM_RANGE * ((QUANTUM_SCALE * pixel + 0.055) / 1.055).powf(2.4)
}

// ---------------------------------------------------------------------------
// Luma and intensity
// ---------------------------------------------------------------------------

fn luma_of(colorspace: Colorspace, red: f64, green: f64, blue: f64) -> f64 {
    if colorspace.is_gray() {
        return red;
    }
    0.212_656 * red + 0.715_158 * green + 0.072_186 * blue
}

/// Luma of cache pixel `p` of `image`.
pub fn pixel_luma(image: &Image, p: &[Quantum]) -> f64 {
    let o = image.offsets();
    luma_of(
        image.colorspace(),
        o.red(p) as f64,
        o.green(p) as f64,
        o.blue(p) as f64,
    )
}

/// How a color pixel is reduced to one gray value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelIntensityMethod {
    /// Mean of red, green and blue.
    Average,
    /// Largest of red, green and blue.
    Brightness,
    /// Midpoint of the smallest and largest channel.
    Lightness,
    /// Mean square, normalized to the quantum range.
    Ms,
    /// Rec. 601 weights on gamma-encoded values.
    Rec601Luma,
    /// Rec. 601 weights on linear values.
    Rec601Luminance,
    /// Rec. 709 weights on gamma-encoded values.
    #[default]
    Rec709Luma,
    /// Rec. 709 weights on linear values.
    Rec709Luminance,
    /// Root mean square.
    Rms,
}

/// Intensity of cache pixel `p` using the image's intensity method.
///
/// Single-channel pixels return their only sample.
pub fn pixel_intensity(image: &Image, p: &[Quantum]) -> f64 {
    let o = image.offsets();
    let red = o.red(p) as f64;
    if image.number_channels() == 1 {
        return red;
    }
    intensity_of(
        image.intensity(),
        image.colorspace(),
        red,
        o.green(p) as f64,
        o.blue(p) as f64,
    )
}

fn intensity_of(
    method: PixelIntensityMethod,
    colorspace: Colorspace,
    red: f64,
    green: f64,
    blue: f64,
) -> f64 {
    let encoded = colorspace.is_linear();
    let decoded = matches!(colorspace, Colorspace::Srgb | Colorspace::Gray);
    let encode = |r: f64, g: f64, b: f64| {
        if encoded {
            (
                encode_pixel_gamma(r),
                encode_pixel_gamma(g),
                encode_pixel_gamma(b),
            )
        } else {
            (r, g, b)
        }
    };
    let decode = |r: f64, g: f64, b: f64| {
        if decoded {
            (
                decode_pixel_gamma(r),
                decode_pixel_gamma(g),
                decode_pixel_gamma(b),
            )
        } else {
            (r, g, b)
        }
    };
    match method {
        PixelIntensityMethod::Average => (red + green + blue) / 3.0,
        PixelIntensityMethod::Brightness => red.max(green).max(blue),
        PixelIntensityMethod::Lightness => {
            (red.min(green).min(blue) + red.max(green).max(blue)) / 2.0
        }
        PixelIntensityMethod::Ms => {
            (red * red + green * green + blue * blue) / (3.0 * QUANTUM_RANGE)
        }
        PixelIntensityMethod::Rms => {
            (red * red + green * green + blue * blue).sqrt() / 3.0_f64.sqrt()
        }
        PixelIntensityMethod::Rec601Luma => {
            let (r, g, b) = encode(red, green, blue);
            0.298_839 * r + 0.586_811 * g + 0.114_350 * b
        }
        PixelIntensityMethod::Rec601Luminance => {
            let (r, g, b) = decode(red, green, blue);
            0.298_839 * r + 0.586_811 * g + 0.114_350 * b
        }
        PixelIntensityMethod::Rec709Luma => {
            let (r, g, b) = encode(red, green, blue);
            0.212_656 * r + 0.715_158 * g + 0.072_186 * b
        }
        PixelIntensityMethod::Rec709Luminance => {
            let (r, g, b) = decode(red, green, blue);
            0.212_656 * r + 0.715_158 * g + 0.072_186 * b
        }
    }
}
