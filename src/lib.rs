//! Quantum pixel transcoding between an in-memory pixel cache and raw
//! scanline buffers.
//!
//! Codecs hand this crate the bytes of one or more scanlines together with
//! a [`QuantumInfo`] describing the wire layout (bit depth, integer or
//! float samples, endianness, padding) and a [`QuantumType`] naming the
//! channels on the wire. The engines unpack those bytes into an [`Image`]
//! or pack the image back out:
//!
//! - [`import_quantum_pixels`] / [`export_quantum_pixels`]: codec wire
//!   formats at 1 to 64 bits per sample, including the 10-bit and 12-bit
//!   unpacked layouts, 16/24/32/64-bit floats, palette indices and
//!   chroma-subsampled CbYCrY
//! - [`export_image_pixels`] / [`import_image_pixels`]: native typed
//!   buffers in a caller-chosen channel order such as `"BGRA"` or `"I"`
//! - [`interpolate_pixel_channel`] and friends: resampling the cache at
//!   fractional coordinates
//! - [`QuantumState`]: the bit cursor under the engines, usable on its own
//!
//! The internal sample type [`Quantum`] is chosen at build time: `u16` by
//! default, `u8` with the `q8` feature, `u32` with `q32`.
//!
//! ```
//! use zenquantum::{Diagnostics, Image, QuantumInfo, QuantumType, Region};
//! use zenquantum::{export_quantum_pixels, import_quantum_pixels};
//!
//! let mut image = Image::builder(8, 1).build()?;
//! let info = QuantumInfo::new().with_depth(1);
//! let mut diagnostics = Diagnostics::new();
//! let region = Region::row(0, 0, 8);
//!
//! import_quantum_pixels(&mut image, &region, &info, QuantumType::Gray, &[0b1010_0000], &mut diagnostics)?;
//! let mut wire = [0u8; 1];
//! export_quantum_pixels(&image, &region, &info, QuantumType::Gray, &mut wire, &mut diagnostics)?;
//! assert_eq!(wire, [0b1010_0000]);
//! # Ok::<(), zenquantum::QuantumError>(())
//! ```

#![forbid(unsafe_code)]

extern crate alloc;

mod channel;
mod error;
mod export;
mod image;
mod import;
mod interop;
mod interpolate;
mod map;
mod pixel;
mod quantum;
mod quantum_info;
mod sample;
mod state;
mod transfer;

pub use channel::{ChannelLayout, ChannelMask, ChannelSlot, PixelChannel, PixelChannelMap, PixelTrait};
pub use error::{Diagnostic, DiagnosticKind, Diagnostics, ErrorClass, QuantumError, QuantumResult};
pub use export::export_quantum_pixels;
pub use image::{Colorspace, Image, ImageBuilder, PixelOffsets, Region, StorageClass};
pub use import::import_quantum_pixels;
pub use interpolate::{
    PixelInterpolateMethod, ResizeFilter, interpolate_pixel_channel, interpolate_pixel_channels,
    interpolate_pixel_info,
};
pub use map::{Direction, FastPath, MapTag, PixelMap, StorageType};
pub use pixel::{
    PixelInfo, PixelIntensityMethod, decode_pixel_gamma, encode_pixel_gamma, pixel_intensity,
    pixel_luma,
};
pub use quantum::{
    MAGICK_EPSILON, MAX_PIXEL_CHANNELS, OPAQUE_ALPHA, QUANTUM_DEPTH, QUANTUM_RANGE, QUANTUM_SCALE,
    Quantum, TRANSPARENT_ALPHA, clamp_to_quantum, perceptible_reciprocal, quantum_range,
    scale_any_to_quantum, scale_char_to_quantum, scale_long_long_to_quantum,
    scale_long_to_quantum, scale_quantum_to_any, scale_quantum_to_char,
    scale_quantum_to_long, scale_quantum_to_long_long, scale_quantum_to_short,
    scale_short_to_quantum,
};
pub use quantum_info::{AlphaType, Endian, QuantumFormat, QuantumInfo, QuantumType, SampleRole};
pub use sample::{SampleFormat, row_bytes};
pub use state::{ByteReader, ByteWriter, QuantumState};
pub use transfer::{export_image_pixels, export_pixel_map, import_image_pixels};

// Re-exports for callers building images from typed buffers.
pub use imgref::{Img, ImgRef, ImgRefMut, ImgVec};
pub use rgb;
pub use rgb::{Gray, Rgb, Rgba};
