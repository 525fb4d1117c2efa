//! Sample-level wire codec shared by the import and export engines.
//!
//! A [`SampleFormat`] is picked once per transfer from the [`QuantumInfo`];
//! [`SampleReader`] and [`SampleWriter`] then move one sample at a time
//! between a row slice and quantum values, handling packing words, pixel
//! padding and float normalization.

use alloc::vec::Vec;

use crate::channel::{PixelChannel, PixelTrait};
use crate::error::QuantumError;
use crate::image::Image;
use crate::quantum::{
    QUANTUM_RANGE, QUANTUM_SCALE, Quantum, clamp_float_pixel, clamp_to_quantum, float24_to_single,
    half_to_single, quantum_range, scale_any_to_quantum, scale_char_to_quantum,
    scale_long_long_to_quantum, scale_long_to_quantum, scale_quantum_to_any,
    scale_quantum_to_char, scale_quantum_to_long, scale_quantum_to_long_long,
    scale_quantum_to_short, scale_short_to_quantum, single_to_float24, single_to_half,
};
use crate::quantum_info::{QuantumFormat, QuantumInfo, QuantumType, SampleRole};
use crate::state::{ByteReader, ByteWriter, QuantumState};

/// Bit offsets of the three samples in a 10-bit word, first sample highest.
const TEN_BIT_SHIFTS: [u32; 3] = [22, 12, 2];

// ---------------------------------------------------------------------------
// SampleFormat
// ---------------------------------------------------------------------------

/// Physical layout of one sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// Unsigned 8-bit.
    Char,
    /// Unsigned 16-bit, endian ordered.
    Short,
    /// Unsigned 32-bit, endian ordered.
    Long,
    /// Unsigned 64-bit, endian ordered.
    LongLong,
    /// IEEE binary16.
    Half,
    /// 24-bit float, endian ordered.
    Float24,
    /// IEEE binary32.
    Float,
    /// IEEE binary64.
    Double,
    /// Three 10-bit samples per 32-bit word at bits 22, 12 and 2.
    TenBitWords,
    /// One 12-bit sample in the high bits of a 16-bit short.
    TwelveBitShorts,
    /// Arbitrary depth packed low-bits-first into 32-bit words.
    Words,
    /// Arbitrary depth packed most-significant-bit first into bytes.
    Bits,
}

impl SampleFormat {
    pub fn select(info: &QuantumInfo) -> Self {
        let depth = info.depth();
        if info.format() == QuantumFormat::FloatingPoint {
            return match depth {
                ..=16 => Self::Half,
                17..=24 => Self::Float24,
                25..=32 => Self::Float,
                _ => Self::Double,
            };
        }
        match (depth, info.pack()) {
            (8, _) => Self::Char,
            (16, _) => Self::Short,
            (32, _) => Self::Long,
            (64, _) => Self::LongLong,
            (10, false) => Self::TenBitWords,
            (12, false) => Self::TwelveBitShorts,
            _ if info.quantum() == 32 => Self::Words,
            _ => Self::Bits,
        }
    }

    /// Bytes per sample for byte-aligned layouts.
    pub const fn byte_width(self) -> Option<usize> {
        match self {
            Self::Char => Some(1),
            Self::Short | Self::Half | Self::TwelveBitShorts => Some(2),
            Self::Float24 => Some(3),
            Self::Long | Self::Float => Some(4),
            Self::LongLong | Self::Double => Some(8),
            Self::TenBitWords | Self::Words | Self::Bits => None,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Self::Half | Self::Float24 | Self::Float | Self::Double)
    }
}

/// Exact bytes of a row of `pixels` wire pixels holding `samples_per_pixel`
/// samples each. `None` on overflow.
///
/// With padding, bit-packed layouts realign to a byte (or word) before the
/// pad of every pixel. The 10-bit word layout pads after each full word.
pub fn row_bytes(
    info: &QuantumInfo,
    samples_per_pixel: usize,
    pixels: usize,
) -> Option<usize> {
    let pad = info.pad();
    let samples = samples_per_pixel.checked_mul(pixels)?;
    let depth = info.depth() as usize;
    match SampleFormat::select(info) {
        SampleFormat::TenBitWords => samples
            .div_ceil(3)
            .checked_mul(4)?
            .checked_add(pad.checked_mul(samples / 3)?),
        SampleFormat::Bits if pad == 0 => samples.checked_mul(depth).map(|b| b.div_ceil(8)),
        SampleFormat::Bits => samples_per_pixel
            .checked_mul(depth)?
            .div_ceil(8)
            .checked_add(pad)?
            .checked_mul(pixels),
        SampleFormat::Words if pad == 0 => samples
            .checked_mul(depth)?
            .div_ceil(32)
            .checked_mul(4),
        SampleFormat::Words => samples_per_pixel
            .checked_mul(depth)?
            .div_ceil(32)
            .checked_mul(4)?
            .checked_add(pad)?
            .checked_mul(pixels),
        fixed => {
            let width = fixed.byte_width()?;
            samples_per_pixel
                .checked_mul(width)?
                .checked_add(pad)?
                .checked_mul(pixels)
        }
    }
}

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

/// Where one wire sample lands in (or comes from) a cache pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleTarget {
    Slot(usize),
    Gray,
    Index,
    /// The image has no slot for this channel.
    Missing(PixelChannel),
}

/// Resolve the wire layout of `quantum_type` against the slots of `image`.
///
/// 4:2:2 pairs are resolved by the engines themselves.
pub fn resolve_targets(image: &Image, quantum_type: QuantumType) -> Vec<SampleTarget> {
    let map = image.channel_map();
    if quantum_type == QuantumType::Multispectral {
        return (0..map.len()).map(SampleTarget::Slot).collect();
    }
    quantum_type
        .roles()
        .iter()
        .map(|role| match *role {
            SampleRole::Channel(channel) => map
                .offset(channel)
                .map_or(SampleTarget::Missing(channel), SampleTarget::Slot),
            SampleRole::Gray => SampleTarget::Gray,
            SampleRole::Index => SampleTarget::Index,
        })
        .collect()
}

/// Per slot: whether alpha association applies (updatable, not alpha).
pub fn associated_slots(image: &Image) -> Vec<bool> {
    image
        .channel_map()
        .slots()
        .iter()
        .map(|slot| slot.traits.contains(PixelTrait::UPDATE) && slot.channel != PixelChannel::Alpha)
        .collect()
}

// ---------------------------------------------------------------------------
// RawSample
// ---------------------------------------------------------------------------

/// One sample as stored on the wire, before scaling.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RawSample {
    Int(u64),
    Real(f64),
}

// ---------------------------------------------------------------------------
// SampleReader
// ---------------------------------------------------------------------------

/// Sample cursor over one wire row.
#[derive(Debug)]
pub struct SampleReader<'a> {
    bytes: ByteReader<'a>,
    state: QuantumState,
    format: SampleFormat,
    depth: u32,
    range: u64,
    pad: usize,
    word: u32,
    slot: usize,
}

impl<'a> SampleReader<'a> {
    pub fn new(info: &QuantumInfo, row: &'a [u8]) -> Self {
        Self {
            bytes: ByteReader::new(row),
            state: QuantumState::new(info),
            format: SampleFormat::select(info),
            depth: info.depth(),
            range: quantum_range(info.depth()),
            pad: info.pad(),
            word: 0,
            slot: 0,
        }
    }

    /// Next sample as it appears on the wire.
    pub fn read_raw(&mut self) -> Result<RawSample, QuantumError> {
        let endian = self.state.endian();
        let raw = match self.format {
            SampleFormat::Char => RawSample::Int(u64::from(self.bytes.read_char()?)),
            SampleFormat::Short => RawSample::Int(u64::from(self.bytes.read_short(endian)?)),
            SampleFormat::Long => RawSample::Int(u64::from(self.bytes.read_long(endian)?)),
            SampleFormat::LongLong => RawSample::Int(self.bytes.read_long_long(endian)?),
            SampleFormat::Half => {
                RawSample::Real(f64::from(half_to_single(self.bytes.read_short(endian)?)))
            }
            SampleFormat::Float24 => {
                RawSample::Real(f64::from(float24_to_single(self.bytes.read_triple(endian)?)))
            }
            SampleFormat::Float => RawSample::Real(f64::from(self.bytes.read_float(endian)?)),
            SampleFormat::Double => RawSample::Real(self.bytes.read_double(endian)?),
            SampleFormat::TwelveBitShorts => {
                RawSample::Int(u64::from(self.bytes.read_short(endian)? >> 4))
            }
            SampleFormat::TenBitWords => {
                if self.slot == 0 {
                    self.word = self.bytes.read_long(endian)?;
                }
                let value = (self.word >> TEN_BIT_SHIFTS[self.slot]) & 0x3ff;
                self.slot += 1;
                if self.slot == TEN_BIT_SHIFTS.len() {
                    self.slot = 0;
                    self.bytes.skip(self.pad)?;
                }
                RawSample::Int(u64::from(value))
            }
            SampleFormat::Words => {
                RawSample::Int(self.state.push_quantum_long_pixel(&mut self.bytes, self.depth)?)
            }
            SampleFormat::Bits => {
                RawSample::Int(self.state.push_quantum_pixel(&mut self.bytes, self.depth)?)
            }
        };
        Ok(raw)
    }

    /// Next sample scaled to a quantum.
    pub fn read_quantum(&mut self) -> Result<Quantum, QuantumError> {
        let raw = self.read_raw()?;
        Ok(self.to_quantum(raw))
    }

    /// Next sample as a colormap index: the raw integer, or the nearest
    /// integer of a float sample.
    pub fn read_index(&mut self) -> Result<u64, QuantumError> {
        Ok(match self.read_raw()? {
            RawSample::Int(v) => v,
            RawSample::Real(v) if v.is_nan() || v <= 0.0 => 0,
            RawSample::Real(v) => v.round() as u64,
        })
    }

    fn to_quantum(&self, raw: RawSample) -> Quantum {
        match (self.format, raw) {
            (SampleFormat::Char, RawSample::Int(v)) => scale_char_to_quantum(v as u8),
            (SampleFormat::Short, RawSample::Int(v)) => scale_short_to_quantum(v as u16),
            (SampleFormat::Long, RawSample::Int(v)) => scale_long_to_quantum(v as u32),
            (SampleFormat::LongLong, RawSample::Int(v)) => scale_long_long_to_quantum(v),
            (SampleFormat::TwelveBitShorts, RawSample::Int(v)) => scale_any_to_quantum(v, 4095),
            (_, RawSample::Int(v)) => scale_any_to_quantum(v, self.range),
            (SampleFormat::Half, RawSample::Real(v)) => clamp_to_quantum(QUANTUM_RANGE * v),
            (_, RawSample::Real(v)) => {
                clamp_to_quantum((v - self.state.minimum()) * self.state.scale())
            }
        }
    }

    /// Close a wire pixel: realign bit-packed layouts and skip its padding.
    pub fn end_pixel(&mut self) -> Result<(), QuantumError> {
        if self.pad == 0 {
            return Ok(());
        }
        match self.format {
            SampleFormat::TenBitWords => Ok(()),
            SampleFormat::Bits | SampleFormat::Words => {
                self.state.align_reader();
                self.bytes.skip(self.pad)
            }
            _ => self.bytes.skip(self.pad),
        }
    }
}

// ---------------------------------------------------------------------------
// SampleWriter
// ---------------------------------------------------------------------------

/// Sample cursor writing one wire row.
#[derive(Debug)]
pub struct SampleWriter<'a> {
    bytes: ByteWriter<'a>,
    state: QuantumState,
    format: SampleFormat,
    depth: u32,
    range: u64,
    pad: usize,
    word: u32,
    slot: usize,
}

impl<'a> SampleWriter<'a> {
    pub fn new(info: &QuantumInfo, row: &'a mut [u8]) -> Self {
        Self {
            bytes: ByteWriter::new(row),
            state: QuantumState::new(info),
            format: SampleFormat::select(info),
            depth: info.depth(),
            range: quantum_range(info.depth()),
            pad: info.pad(),
            word: 0,
            slot: 0,
        }
    }

    fn write_integer(&mut self, value: u64) -> Result<(), QuantumError> {
        let endian = self.state.endian();
        match self.format {
            SampleFormat::Char => self.bytes.write_char(value as u8),
            SampleFormat::Short => self.bytes.write_short(value as u16, endian),
            SampleFormat::Long => self.bytes.write_long(value as u32, endian),
            SampleFormat::LongLong => self.bytes.write_long_long(value, endian),
            SampleFormat::TwelveBitShorts => {
                self.bytes.write_short(((value & 0xfff) as u16) << 4, endian)
            }
            SampleFormat::TenBitWords => {
                self.word |= ((value & 0x3ff) as u32) << TEN_BIT_SHIFTS[self.slot];
                self.slot += 1;
                if self.slot == TEN_BIT_SHIFTS.len() {
                    self.bytes.write_long(self.word, endian)?;
                    self.word = 0;
                    self.slot = 0;
                    self.bytes.skip(self.pad)?;
                }
                Ok(())
            }
            SampleFormat::Words => {
                self.state
                    .pop_quantum_long_pixel(&mut self.bytes, self.depth, value)
            }
            SampleFormat::Bits => self.state.pop_quantum_pixel(&mut self.bytes, self.depth, value),
            SampleFormat::Half
            | SampleFormat::Float24
            | SampleFormat::Float
            | SampleFormat::Double => self.write_real(value as f64),
        }
    }

    fn write_real(&mut self, value: f64) -> Result<(), QuantumError> {
        let endian = self.state.endian();
        match self.format {
            SampleFormat::Half => self
                .bytes
                .write_short(single_to_half(clamp_float_pixel(value)), endian),
            SampleFormat::Float24 => self
                .bytes
                .write_triple(single_to_float24(clamp_float_pixel(value)), endian),
            SampleFormat::Float => self.bytes.write_float(clamp_float_pixel(value), endian),
            _ => self.bytes.write_double(value, endian),
        }
    }

    /// Write a quantum scaled to the wire depth.
    pub fn write_quantum(&mut self, quantum: Quantum) -> Result<(), QuantumError> {
        match self.format {
            SampleFormat::Char => self.write_integer(u64::from(scale_quantum_to_char(quantum))),
            SampleFormat::Short => self.write_integer(u64::from(scale_quantum_to_short(quantum))),
            SampleFormat::Long => self.write_integer(u64::from(scale_quantum_to_long(quantum))),
            SampleFormat::LongLong => self.write_integer(scale_quantum_to_long_long(quantum)),
            SampleFormat::Half => self.write_real(QUANTUM_SCALE * quantum as f64),
            SampleFormat::Float24 | SampleFormat::Float | SampleFormat::Double => self.write_real(
                quantum as f64 * self.state.inverse_scale() + self.state.minimum(),
            ),
            SampleFormat::TwelveBitShorts => self.write_integer(scale_quantum_to_any(quantum, 4095)),
            _ => {
                let value = match self.depth {
                    1 => u64::from(quantum as f64 >= QUANTUM_RANGE / 2.0),
                    4 => u64::from(scale_quantum_to_char(quantum) >> 4),
                    _ => scale_quantum_to_any(quantum, self.range),
                };
                self.write_integer(value)
            }
        }
    }

    /// Write a colormap index unscaled.
    pub fn write_index(&mut self, index: u64) -> Result<(), QuantumError> {
        if self.format.is_float() {
            return self.write_real(index as f64);
        }
        self.write_integer(index & quantum_range(self.depth))
    }

    /// Close a wire pixel: realign bit-packed layouts and step over its
    /// padding.
    pub fn end_pixel(&mut self) -> Result<(), QuantumError> {
        if self.pad == 0 {
            return Ok(());
        }
        match self.format {
            SampleFormat::TenBitWords => Ok(()),
            SampleFormat::Bits => {
                self.state.align_bytes(&mut self.bytes)?;
                self.bytes.skip(self.pad)
            }
            SampleFormat::Words => {
                self.state.flush_long(&mut self.bytes)?;
                self.bytes.skip(self.pad)
            }
            _ => self.bytes.skip(self.pad),
        }
    }

    /// Flush a trailing partial byte or word; returns bytes produced.
    pub fn finish(mut self) -> Result<usize, QuantumError> {
        match self.format {
            SampleFormat::TenBitWords if self.slot != 0 => {
                let endian = self.state.endian();
                self.bytes.write_long(self.word, endian)?;
            }
            SampleFormat::Words => self.state.flush_long(&mut self.bytes)?,
            SampleFormat::Bits => self.state.align_bytes(&mut self.bytes)?,
            _ => {}
        }
        Ok(self.bytes.position())
    }
}
