//! Bounds-checked byte cursors and the bit cursor that packs samples of
//! arbitrary depth into them.

use crate::error::QuantumError;
use crate::quantum_info::{Endian, QuantumInfo};

// ---------------------------------------------------------------------------
// Byte cursors
// ---------------------------------------------------------------------------

/// Forward-only reader over a wire buffer.
#[derive(Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    #[inline]
    pub const fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Consume `n` bytes.
    ///
    /// # Errors
    ///
    /// [`QuantumError::BufferTooSmall`] when fewer than `n` bytes remain.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], QuantumError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or(QuantumError::BufferTooSmall {
                required: self.pos.saturating_add(n),
                actual: self.data.len(),
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], QuantumError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Skip `n` bytes of padding.
    #[inline]
    pub fn skip(&mut self, n: usize) -> Result<(), QuantumError> {
        self.take(n).map(|_| ())
    }

    #[inline]
    pub fn read_char(&mut self) -> Result<u8, QuantumError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn read_short(&mut self, endian: Endian) -> Result<u16, QuantumError> {
        let b = self.array()?;
        Ok(match endian {
            Endian::Lsb => u16::from_le_bytes(b),
            Endian::Msb => u16::from_be_bytes(b),
        })
    }

    /// Three bytes, right-aligned in a `u32`.
    pub fn read_triple(&mut self, endian: Endian) -> Result<u32, QuantumError> {
        let [a, b, c] = self.array()?;
        Ok(match endian {
            Endian::Lsb => u32::from_le_bytes([a, b, c, 0]),
            Endian::Msb => u32::from_be_bytes([0, a, b, c]),
        })
    }

    pub fn read_long(&mut self, endian: Endian) -> Result<u32, QuantumError> {
        let b = self.array()?;
        Ok(match endian {
            Endian::Lsb => u32::from_le_bytes(b),
            Endian::Msb => u32::from_be_bytes(b),
        })
    }

    pub fn read_long_long(&mut self, endian: Endian) -> Result<u64, QuantumError> {
        let b = self.array()?;
        Ok(match endian {
            Endian::Lsb => u64::from_le_bytes(b),
            Endian::Msb => u64::from_be_bytes(b),
        })
    }

    #[inline]
    pub fn read_float(&mut self, endian: Endian) -> Result<f32, QuantumError> {
        self.read_long(endian).map(f32::from_bits)
    }

    #[inline]
    pub fn read_double(&mut self, endian: Endian) -> Result<f64, QuantumError> {
        self.read_long_long(endian).map(f64::from_bits)
    }
}

/// Forward-only writer over a wire buffer.
///
/// Skipped bytes keep whatever the caller put there.
#[derive(Debug)]
pub struct ByteWriter<'a> {
    data: &'a mut [u8],
    pos: usize,
}

impl<'a> ByteWriter<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes produced so far.
    #[inline]
    pub const fn position(&self) -> usize {
        self.pos
    }

    fn slot(&mut self, n: usize) -> Result<&mut [u8], QuantumError> {
        let len = self.data.len();
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= len)
            .ok_or(QuantumError::BufferTooSmall {
                required: self.pos.saturating_add(n),
                actual: len,
            })?;
        let start = self.pos;
        self.pos = end;
        Ok(&mut self.data[start..end])
    }

    /// Append raw bytes.
    ///
    /// # Errors
    ///
    /// [`QuantumError::BufferTooSmall`] when the buffer cannot take them.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), QuantumError> {
        self.slot(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Step over `n` bytes of padding.
    #[inline]
    pub fn skip(&mut self, n: usize) -> Result<(), QuantumError> {
        self.slot(n).map(|_| ())
    }

    /// Byte under the cursor, without advancing.
    fn current(&mut self) -> Result<&mut u8, QuantumError> {
        let actual = self.data.len();
        self.data
            .get_mut(self.pos)
            .ok_or(QuantumError::BufferTooSmall {
                required: self.pos.saturating_add(1),
                actual,
            })
    }

    #[inline]
    pub fn write_char(&mut self, value: u8) -> Result<(), QuantumError> {
        self.write_bytes(&[value])
    }

    pub fn write_short(&mut self, value: u16, endian: Endian) -> Result<(), QuantumError> {
        self.write_bytes(&match endian {
            Endian::Lsb => value.to_le_bytes(),
            Endian::Msb => value.to_be_bytes(),
        })
    }

    /// Low three bytes of `value`.
    pub fn write_triple(&mut self, value: u32, endian: Endian) -> Result<(), QuantumError> {
        match endian {
            Endian::Lsb => {
                let [a, b, c, _] = value.to_le_bytes();
                self.write_bytes(&[a, b, c])
            }
            Endian::Msb => {
                let [_, a, b, c] = value.to_be_bytes();
                self.write_bytes(&[a, b, c])
            }
        }
    }

    pub fn write_long(&mut self, value: u32, endian: Endian) -> Result<(), QuantumError> {
        self.write_bytes(&match endian {
            Endian::Lsb => value.to_le_bytes(),
            Endian::Msb => value.to_be_bytes(),
        })
    }

    pub fn write_long_long(&mut self, value: u64, endian: Endian) -> Result<(), QuantumError> {
        self.write_bytes(&match endian {
            Endian::Lsb => value.to_le_bytes(),
            Endian::Msb => value.to_be_bytes(),
        })
    }

    #[inline]
    pub fn write_float(&mut self, value: f32, endian: Endian) -> Result<(), QuantumError> {
        self.write_long(value.to_bits(), endian)
    }

    #[inline]
    pub fn write_double(&mut self, value: f64, endian: Endian) -> Result<(), QuantumError> {
        self.write_long_long(value.to_bits(), endian)
    }
}

// ---------------------------------------------------------------------------
// QuantumState
// ---------------------------------------------------------------------------

#[inline]
const fn low_mask(bits: u32) -> u64 {
    if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 }
}

/// Per-row cursor state: the partially consumed byte or word plus the
/// float normalization of the transfer.
///
/// Created fresh for every row, so rows always start byte-aligned.
#[derive(Clone, Debug)]
pub struct QuantumState {
    pixel: u64,
    bits: u32,
    endian: Endian,
    minimum: f64,
    scale: f64,
    inverse_scale: f64,
}

impl QuantumState {
    pub fn new(info: &QuantumInfo) -> Self {
        Self {
            pixel: 0,
            bits: 0,
            endian: info.endian(),
            minimum: info.minimum(),
            scale: info.scale(),
            inverse_scale: info.inverse_scale(),
        }
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

    #[inline]
    pub const fn inverse_scale(&self) -> f64 {
        self.inverse_scale
    }

    // --- import ---

    /// Read a `depth`-bit value from a most-significant-bit-first stream.
    ///
    /// Values may straddle byte boundaries.
    pub fn push_quantum_pixel(
        &mut self,
        reader: &mut ByteReader<'_>,
        depth: u32,
    ) -> Result<u64, QuantumError> {
        let mut quantum = 0u64;
        let mut i = depth;
        while i > 0 {
            if self.bits == 0 {
                self.pixel = u64::from(reader.read_char()?);
                self.bits = 8;
            }
            let quantum_bits = i.min(self.bits);
            i -= quantum_bits;
            self.bits -= quantum_bits;
            quantum = (quantum << quantum_bits) | ((self.pixel >> self.bits) & low_mask(quantum_bits));
        }
        Ok(quantum)
    }

    /// Read a `depth`-bit value from a stream of 32-bit words, filling from
    /// the low bits of each word.
    pub fn push_quantum_long_pixel(
        &mut self,
        reader: &mut ByteReader<'_>,
        depth: u32,
    ) -> Result<u64, QuantumError> {
        let mut quantum = 0u64;
        let mut i = depth;
        while i > 0 {
            if self.bits == 0 {
                self.pixel = u64::from(reader.read_long(self.endian)?);
                self.bits = 32;
            }
            let quantum_bits = i.min(self.bits);
            let chunk = (self.pixel >> (32 - self.bits)) & low_mask(quantum_bits);
            quantum |= chunk << (depth - i);
            i -= quantum_bits;
            self.bits -= quantum_bits;
        }
        Ok(quantum)
    }

    /// Drop the rest of a partially consumed byte or word.
    #[inline]
    pub fn align_reader(&mut self) {
        self.bits = 0;
        self.pixel = 0;
    }

    // --- export ---

    /// Append the low `depth` bits of `quantum` to a
    /// most-significant-bit-first stream.
    ///
    /// A partially filled byte is already in the buffer; unused low bits are
    /// zero.
    pub fn pop_quantum_pixel(
        &mut self,
        writer: &mut ByteWriter<'_>,
        depth: u32,
        quantum: u64,
    ) -> Result<(), QuantumError> {
        if self.bits == 0 {
            self.bits = 8;
        }
        let mut i = depth;
        while i > 0 {
            let quantum_bits = i.min(self.bits);
            i -= quantum_bits;
            let chunk = ((quantum >> i) & low_mask(quantum_bits)) as u8;
            let byte = writer.current()?;
            let shifted = chunk << (self.bits - quantum_bits);
            if self.bits == 8 {
                *byte = shifted;
            } else {
                *byte |= shifted;
            }
            self.bits -= quantum_bits;
            if self.bits == 0 {
                writer.skip(1)?;
                self.bits = 8;
            }
        }
        Ok(())
    }

    /// Append the low `depth` bits of `quantum` to a stream of 32-bit words,
    /// filling from the low bits of each word.
    pub fn pop_quantum_long_pixel(
        &mut self,
        writer: &mut ByteWriter<'_>,
        depth: u32,
        quantum: u64,
    ) -> Result<(), QuantumError> {
        if self.bits == 0 {
            self.bits = 32;
            self.pixel = 0;
        }
        let mut i = depth;
        while i > 0 {
            let quantum_bits = i.min(self.bits);
            let chunk = (quantum >> (depth - i)) & low_mask(quantum_bits);
            self.pixel |= chunk << (32 - self.bits);
            i -= quantum_bits;
            self.bits -= quantum_bits;
            if self.bits == 0 {
                writer.write_long(self.pixel as u32, self.endian)?;
                self.pixel = 0;
                self.bits = 32;
            }
        }
        Ok(())
    }

    /// Close a partially filled byte so the next value starts on a fresh one.
    pub fn align_bytes(&mut self, writer: &mut ByteWriter<'_>) -> Result<(), QuantumError> {
        if self.bits != 0 && self.bits != 8 {
            writer.skip(1)?;
        }
        self.bits = 0;
        Ok(())
    }

    /// Write out a partially filled word, zero-filled.
    pub fn flush_long(&mut self, writer: &mut ByteWriter<'_>) -> Result<(), QuantumError> {
        if self.bits != 0 && self.bits != 32 {
            writer.write_long(self.pixel as u32, self.endian)?;
        }
        self.pixel = 0;
        self.bits = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(endian: Endian) -> QuantumState {
        QuantumState::new(&QuantumInfo::new().with_endian(endian))
    }

    // --- byte cursors ---

    #[test]
    fn reader_reports_short_buffer() {
        let data = [1u8, 2, 3];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_short(Endian::Msb).unwrap(), 0x0102);
        assert_eq!(
            reader.read_short(Endian::Msb),
            Err(QuantumError::BufferTooSmall {
                required: 4,
                actual: 3
            })
        );
        assert_eq!(reader.remaining(), 1);
    }

    #[test]
    fn endian_helpers_agree() {
        let mut buf = [0u8; 15];
        let mut writer = ByteWriter::new(&mut buf);
        writer.write_long(0x0102_0304, Endian::Lsb).unwrap();
        writer.write_triple(0x00a0_b0c0, Endian::Msb).unwrap();
        writer.write_double(0.5, Endian::Msb).unwrap();
        assert_eq!(writer.position(), 15);
        assert_eq!(&buf[..7], &[4, 3, 2, 1, 0xa0, 0xb0, 0xc0]);

        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_long(Endian::Lsb).unwrap(), 0x0102_0304);
        assert_eq!(reader.read_triple(Endian::Msb).unwrap(), 0x00a0_b0c0);
        assert_eq!(reader.read_double(Endian::Msb).unwrap(), 0.5);
    }

    // --- bit stream ---

    #[test]
    fn twelve_bit_values_span_bytes() {
        let data = [0xab, 0xcd, 0xef];
        let mut reader = ByteReader::new(&data);
        let mut st = state(Endian::Msb);
        assert_eq!(st.push_quantum_pixel(&mut reader, 12).unwrap(), 0xabc);
        assert_eq!(st.push_quantum_pixel(&mut reader, 12).unwrap(), 0xdef);
        assert_eq!(reader.position(), 3);

        let mut out = [0u8; 3];
        let mut writer = ByteWriter::new(&mut out);
        let mut st = state(Endian::Msb);
        st.pop_quantum_pixel(&mut writer, 12, 0xabc).unwrap();
        st.pop_quantum_pixel(&mut writer, 12, 0xdef).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn single_bits_fill_msb_first() {
        let mut out = [0xffu8; 1];
        let mut writer = ByteWriter::new(&mut out);
        let mut st = state(Endian::Msb);
        for bit in [1, 0, 1, 1] {
            st.pop_quantum_pixel(&mut writer, 1, bit).unwrap();
        }
        st.align_bytes(&mut writer).unwrap();
        assert_eq!(writer.position(), 1);
        assert_eq!(out, [0b1011_0000]);
    }

    #[test]
    fn sixty_four_bit_values() {
        let data = 0x0123_4567_89ab_cdefu64.to_be_bytes();
        let mut reader = ByteReader::new(&data);
        let mut st = state(Endian::Msb);
        assert_eq!(
            st.push_quantum_pixel(&mut reader, 64).unwrap(),
            0x0123_4567_89ab_cdef
        );
    }

    // --- word stream ---

    #[test]
    fn long_pixels_follow_word_endian() {
        let data = [0x34, 0x12, 0x78, 0x56];
        let mut reader = ByteReader::new(&data);
        let mut st = state(Endian::Lsb);
        assert_eq!(st.push_quantum_long_pixel(&mut reader, 16).unwrap(), 0x1234);
        assert_eq!(st.push_quantum_long_pixel(&mut reader, 16).unwrap(), 0x5678);

        let mut out = [0u8; 4];
        let mut writer = ByteWriter::new(&mut out);
        let mut st = state(Endian::Lsb);
        st.pop_quantum_long_pixel(&mut writer, 16, 0x1234).unwrap();
        st.pop_quantum_long_pixel(&mut writer, 16, 0x5678).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn partial_word_flushes_zero_filled() {
        let mut out = [0xeeu8; 4];
        let mut writer = ByteWriter::new(&mut out);
        let mut st = state(Endian::Msb);
        st.pop_quantum_long_pixel(&mut writer, 12, 0xfff).unwrap();
        st.flush_long(&mut writer).unwrap();
        assert_eq!(out, [0x00, 0x00, 0x0f, 0xff]);
    }
}
