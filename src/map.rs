//! Channel-order strings (`"RGBA"`, `"BGRP"`, `"I"`, …) and storage types
//! for the map-driven transfer API.

use alloc::string::ToString;
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use crate::error::QuantumError;
use crate::image::Image;

// ---------------------------------------------------------------------------
// StorageType
// ---------------------------------------------------------------------------

/// Element type of a map-driven buffer. Samples are native-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum StorageType {
    /// `u8`
    Char,
    /// `u16`
    Short,
    /// `u32`
    Long,
    /// `u64`
    LongLong,
    /// The build's [`Quantum`](crate::Quantum), unscaled.
    Quantum,
    /// `f32`, 0.0 to 1.0.
    Float,
    /// `f64`, 0.0 to 1.0.
    Double,
}

#[cfg(feature = "q8")]
const NATIVE_STORAGE: StorageType = StorageType::Char;
#[cfg(all(feature = "q32", not(feature = "q8")))]
const NATIVE_STORAGE: StorageType = StorageType::Long;
#[cfg(not(any(feature = "q8", feature = "q32")))]
const NATIVE_STORAGE: StorageType = StorageType::Short;

impl StorageType {
    /// Bytes per sample.
    pub const fn size(self) -> usize {
        match self.resolve() {
            Self::Char => 1,
            Self::Short => 2,
            Self::Long | Self::Float => 4,
            _ => 8,
        }
    }

    /// [`Quantum`](Self::Quantum) as the integer type of the same width,
    /// whose scaling is the identity.
    pub const fn resolve(self) -> Self {
        match self {
            Self::Quantum => NATIVE_STORAGE,
            other => other,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Char => "Char",
            Self::Short => "Short",
            Self::Long => "Long",
            Self::LongLong => "LongLong",
            Self::Quantum => "Quantum",
            Self::Float => "Float",
            Self::Double => "Double",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StorageType {
    type Err = QuantumError;

    /// Case-insensitive; `Integer` is accepted for `Long`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const NAMES: [(&str, StorageType); 8] = [
            ("char", StorageType::Char),
            ("short", StorageType::Short),
            ("integer", StorageType::Long),
            ("long", StorageType::Long),
            ("longlong", StorageType::LongLong),
            ("quantum", StorageType::Quantum),
            ("float", StorageType::Float),
            ("double", StorageType::Double),
        ];
        NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|&(_, storage)| storage)
            .ok_or_else(|| QuantumError::UnrecognizedStorageType(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Map letters
// ---------------------------------------------------------------------------

/// What one letter of a channel-order string transfers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MapTag {
    Red,
    Green,
    Blue,
    /// `A`, and `O` as its alias.
    Alpha,
    Black,
    Cyan,
    Magenta,
    Yellow,
    /// `I`: intensity on export, gray on import.
    Intensity,
    /// `P`: zero on export, skipped on import.
    Pad,
}

impl MapTag {
    pub fn from_letter(letter: char) -> Option<Self> {
        Some(match letter.to_ascii_uppercase() {
            'R' => Self::Red,
            'G' => Self::Green,
            'B' => Self::Blue,
            'A' | 'O' => Self::Alpha,
            'K' => Self::Black,
            'C' => Self::Cyan,
            'M' => Self::Magenta,
            'Y' => Self::Yellow,
            'I' => Self::Intensity,
            'P' => Self::Pad,
            _ => return None,
        })
    }
}

/// Which side of the transfer a map is parsed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Export,
    Import,
}

/// Literal orders with a specialized export loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FastPath {
    Rgb,
    Rgba,
    Rgbp,
    Bgr,
    Bgra,
    Bgrp,
    Intensity,
}

impl FastPath {
    fn detect(map: &str) -> Option<Self> {
        const LITERALS: [(&str, FastPath); 7] = [
            ("RGB", FastPath::Rgb),
            ("RGBA", FastPath::Rgba),
            ("RGBP", FastPath::Rgbp),
            ("BGR", FastPath::Bgr),
            ("BGRA", FastPath::Bgra),
            ("BGRP", FastPath::Bgrp),
            ("I", FastPath::Intensity),
        ];
        LITERALS
            .iter()
            .find(|(literal, _)| literal.eq_ignore_ascii_case(map))
            .map(|&(_, path)| path)
    }
}

// ---------------------------------------------------------------------------
// PixelMap
// ---------------------------------------------------------------------------

/// A validated channel-order string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelMap {
    tags: Vec<MapTag>,
    fast_path: Option<FastPath>,
}

impl PixelMap {
    /// Translate `map` letter by letter and check each letter against
    /// `image`.
    ///
    /// # Errors
    ///
    /// - [`QuantumError::UnrecognizedPixelMap`] for an empty map or a letter
    ///   outside `ABCGIKMOPRY`.
    /// - [`QuantumError::ColorSeparatedImageRequired`] for `C`, `M` or `Y` on
    ///   a non-CMYK image, and for `K` when importing. Exporting `K` from a
    ///   non-CMYK image yields zeros.
    pub fn parse(map: &str, image: &Image, direction: Direction) -> Result<Self, QuantumError> {
        if map.is_empty() {
            return Err(QuantumError::UnrecognizedPixelMap(map.to_string()));
        }
        let mut tags = Vec::with_capacity(map.len());
        for letter in map.chars() {
            let tag = MapTag::from_letter(letter)
                .ok_or_else(|| QuantumError::UnrecognizedPixelMap(map.to_string()))?;
            let separated = match tag {
                MapTag::Cyan | MapTag::Magenta | MapTag::Yellow => true,
                MapTag::Black => direction == Direction::Import,
                _ => false,
            };
            if separated && !image.is_cmyk() {
                return Err(QuantumError::ColorSeparatedImageRequired(map.to_string()));
            }
            tags.push(tag);
        }
        let fast_path = FastPath::detect(map);
        log::debug!("pixel map {map:?}: {tags:?} (fast path {fast_path:?})");
        Ok(Self { tags, fast_path })
    }

    #[inline]
    pub fn tags(&self) -> &[MapTag] {
        &self.tags
    }

    /// Samples per pixel.
    #[inline]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    #[inline]
    pub fn fast_path(&self) -> Option<FastPath> {
        self.fast_path
    }

    /// Same tags with the fast path disabled.
    pub fn generic(mut self) -> Self {
        self.fast_path = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Colorspace;
    use rstest::rstest;

    fn rgb() -> Image {
        Image::builder(1, 1).build().unwrap()
    }

    #[rstest]
    #[case("char", StorageType::Char)]
    #[case("Short", StorageType::Short)]
    #[case("INTEGER", StorageType::Long)]
    #[case("LongLong", StorageType::LongLong)]
    #[case("quantum", StorageType::Quantum)]
    #[case("double", StorageType::Double)]
    fn storage_names(#[case] name: &str, #[case] expected: StorageType) {
        assert_eq!(name.parse::<StorageType>().unwrap(), expected);
    }

    #[test]
    fn unknown_storage_names_the_token() {
        assert_eq!(
            "nibble".parse::<StorageType>(),
            Err(QuantumError::UnrecognizedStorageType("nibble".into()))
        );
    }

    #[test]
    fn quantum_storage_matches_build_width() {
        assert_eq!(StorageType::Quantum.size(), core::mem::size_of::<crate::Quantum>());
    }

    #[test]
    fn letters_are_case_insensitive() {
        let map = PixelMap::parse("bgrO", &rgb(), Direction::Export).unwrap();
        assert_eq!(
            map.tags(),
            &[MapTag::Blue, MapTag::Green, MapTag::Red, MapTag::Alpha]
        );
        assert_eq!(map.fast_path(), None);
        let map = PixelMap::parse("rgbp", &rgb(), Direction::Export).unwrap();
        assert_eq!(map.fast_path(), Some(FastPath::Rgbp));
    }

    #[test]
    fn unknown_letter_fails() {
        assert_eq!(
            PixelMap::parse("RGBX", &rgb(), Direction::Export),
            Err(QuantumError::UnrecognizedPixelMap("RGBX".into()))
        );
        assert!(PixelMap::parse("", &rgb(), Direction::Export).is_err());
    }

    #[test]
    fn cmyk_gating_is_asymmetric() {
        let image = rgb();
        assert!(matches!(
            PixelMap::parse("C", &image, Direction::Export),
            Err(QuantumError::ColorSeparatedImageRequired(_))
        ));
        assert!(PixelMap::parse("K", &image, Direction::Export).is_ok());
        assert!(matches!(
            PixelMap::parse("K", &image, Direction::Import),
            Err(QuantumError::ColorSeparatedImageRequired(_))
        ));
        let cmyk = Image::builder(1, 1)
            .with_colorspace(Colorspace::Cmyk)
            .build()
            .unwrap();
        assert!(PixelMap::parse("CMYK", &cmyk, Direction::Import).is_ok());
    }
}
