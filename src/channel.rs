//! Per-image channel map: which semantic channel lives in which storage slot,
//! and how each slot is treated by pixel operations.

use core::fmt;
use core::ops::{BitOr, BitOrAssign};

use crate::error::QuantumError;
use crate::quantum::MAX_PIXEL_CHANNELS;

/// First channel number used by meta (extra) channels.
const META_BASE: u8 = 10;

// ---------------------------------------------------------------------------
// PixelChannel
// ---------------------------------------------------------------------------

/// Semantic channel of a storage slot.
///
/// Cyan, magenta and yellow share the red, green and blue numbers; gray
/// shares red.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PixelChannel {
    Red,
    Green,
    Blue,
    Black,
    Alpha,
    Index,
    /// Extra channel `n`, numbered from 0.
    Meta(u8),
}

impl PixelChannel {
    /// Alias of [`Red`](Self::Red) for CMYK images.
    pub const CYAN: Self = Self::Red;
    /// Alias of [`Green`](Self::Green) for CMYK images.
    pub const MAGENTA: Self = Self::Green;
    /// Alias of [`Blue`](Self::Blue) for CMYK images.
    pub const YELLOW: Self = Self::Blue;
    /// Alias of [`Red`](Self::Red) for gray images.
    pub const GRAY: Self = Self::Red;

    /// Stable channel number, also the channel's bit in a [`ChannelMask`].
    #[inline]
    pub const fn number(self) -> u8 {
        match self {
            Self::Red => 0,
            Self::Green => 1,
            Self::Blue => 2,
            Self::Black => 3,
            Self::Alpha => 4,
            Self::Index => 5,
            Self::Meta(n) => META_BASE.saturating_add(n),
        }
    }

    /// Channel for a channel number, if the number is in range.
    pub const fn from_number(number: u8) -> Option<Self> {
        match number {
            0 => Some(Self::Red),
            1 => Some(Self::Green),
            2 => Some(Self::Blue),
            3 => Some(Self::Black),
            4 => Some(Self::Alpha),
            5 => Some(Self::Index),
            n if n >= META_BASE && (n as usize) < MAX_PIXEL_CHANNELS => {
                Some(Self::Meta(n - META_BASE))
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// PixelTrait
// ---------------------------------------------------------------------------

/// How pixel operations treat a slot.
///
/// An empty set means the slot is undefined.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PixelTrait(u8);

impl PixelTrait {
    pub const UNDEFINED: Self = Self(0);
    /// Carried through unchanged.
    pub const COPY: Self = Self(0x1);
    /// Recomputed by pixel operations.
    pub const UPDATE: Self = Self(0x2);
    /// Weighted by alpha when blended.
    pub const BLEND: Self = Self(0x4);

    /// Whether every bit of `other` is set.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no bit is set.
    #[inline]
    pub const fn is_undefined(self) -> bool {
        self.0 == 0
    }

    /// Raw bits.
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for PixelTrait {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PixelTrait {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for PixelTrait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_undefined() {
            return f.write_str("undefined");
        }
        let mut sep = "";
        for (flag, name) in [
            (Self::COPY, "copy"),
            (Self::UPDATE, "update"),
            (Self::BLEND, "blend"),
        ] {
            if self.contains(flag) {
                write!(f, "{sep}{name}")?;
                sep = "|";
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ChannelMask
// ---------------------------------------------------------------------------

/// Set of channels selected for processing, one bit per channel number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelMask(u64);

impl ChannelMask {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(u64::MAX);

    /// Mask with exactly the given channels.
    pub fn from_channels(channels: &[PixelChannel]) -> Self {
        channels
            .iter()
            .fold(Self::NONE, |mask, &c| mask.with(c))
    }

    /// This mask plus `channel`.
    #[inline]
    pub const fn with(self, channel: PixelChannel) -> Self {
        Self(self.0 | bit(channel))
    }

    /// Whether `channel` is selected.
    #[inline]
    pub const fn contains(self, channel: PixelChannel) -> bool {
        self.0 & bit(channel) != 0
    }

    /// Raw bits.
    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }
}

#[inline]
const fn bit(channel: PixelChannel) -> u64 {
    match 1u64.checked_shl(channel.number() as u32) {
        Some(b) => b,
        None => 0,
    }
}

impl Default for ChannelMask {
    fn default() -> Self {
        Self::ALL
    }
}

// ---------------------------------------------------------------------------
// Channel layout and map
// ---------------------------------------------------------------------------

/// The image properties the channel map is derived from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelLayout {
    /// Black slot present.
    pub cmyk: bool,
    /// Alpha slot present.
    pub alpha: bool,
    /// Index slot present.
    pub palette: bool,
    /// Number of meta channels.
    pub meta: usize,
}

/// One storage slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelSlot {
    pub channel: PixelChannel,
    pub traits: PixelTrait,
}

/// Ordered slots of one pixel plus a reverse lookup from channel to slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelChannelMap {
    slots: alloc::vec::Vec<ChannelSlot>,
    offsets: [Option<u8>; MAX_PIXEL_CHANNELS],
}

impl PixelChannelMap {
    /// Assign slots in fixed order: red, green, blue, then black for CMYK,
    /// alpha, index for palette images, then meta channels.
    ///
    /// Color channels get `UPDATE` (plus `BLEND` when alpha is present);
    /// alpha, index and meta get `COPY`.
    ///
    /// # Errors
    ///
    /// [`QuantumError::TooManyChannels`] when the slots would not fit
    /// [`MAX_PIXEL_CHANNELS`].
    pub fn initialize(layout: &ChannelLayout) -> Result<Self, QuantumError> {
        let fixed = 3 + usize::from(layout.cmyk) + usize::from(layout.alpha)
            + usize::from(layout.palette);
        let total = fixed + layout.meta;
        if total > MAX_PIXEL_CHANNELS || META_BASE as usize + layout.meta > MAX_PIXEL_CHANNELS {
            return Err(QuantumError::TooManyChannels(total));
        }
        let color = if layout.alpha {
            PixelTrait::UPDATE | PixelTrait::BLEND
        } else {
            PixelTrait::UPDATE
        };
        let mut map = Self {
            slots: alloc::vec::Vec::with_capacity(total),
            offsets: [None; MAX_PIXEL_CHANNELS],
        };
        map.push(PixelChannel::Red, color);
        map.push(PixelChannel::Green, color);
        map.push(PixelChannel::Blue, color);
        if layout.cmyk {
            map.push(PixelChannel::Black, color);
        }
        if layout.alpha {
            map.push(PixelChannel::Alpha, PixelTrait::COPY);
        }
        if layout.palette {
            map.push(PixelChannel::Index, PixelTrait::COPY);
        }
        for n in 0..layout.meta {
            // bounded by the META_BASE check above
            map.push(PixelChannel::Meta(n as u8), PixelTrait::COPY);
        }
        Ok(map)
    }

    fn push(&mut self, channel: PixelChannel, traits: PixelTrait) {
        self.offsets[channel.number() as usize] = Some(self.slots.len() as u8);
        self.slots.push(ChannelSlot { channel, traits });
    }

    /// Recompute every slot's traits from `mask`.
    ///
    /// Unselected slots become `COPY`. Selected slots become `UPDATE`, plus
    /// `BLEND` when the image has alpha and the slot is not alpha itself.
    /// Index slots of palette images always stay `COPY`.
    pub fn set_mask(&mut self, layout: &ChannelLayout, mask: ChannelMask) {
        for slot in &mut self.slots {
            slot.traits = if !mask.contains(slot.channel) {
                PixelTrait::COPY
            } else if slot.channel == PixelChannel::Alpha || !layout.alpha {
                PixelTrait::UPDATE
            } else {
                PixelTrait::UPDATE | PixelTrait::BLEND
            };
            if layout.palette && slot.channel == PixelChannel::Index {
                slot.traits = PixelTrait::COPY;
            }
        }
        if log::log_enabled!(log::Level::Debug) {
            for (i, slot) in self.slots.iter().enumerate() {
                log::debug!("  {i}: {:?} ({:?})", slot.channel, slot.traits);
            }
        }
    }

    /// Number of slots per pixel.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the map has no slots.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot index of `channel`.
    #[inline]
    pub fn offset(&self, channel: PixelChannel) -> Option<usize> {
        self.offsets
            .get(channel.number() as usize)
            .copied()
            .flatten()
            .map(usize::from)
    }

    /// Traits of `channel`, undefined when the channel has no slot.
    pub fn traits(&self, channel: PixelChannel) -> PixelTrait {
        self.offset(channel)
            .map_or(PixelTrait::UNDEFINED, |i| self.slots[i].traits)
    }

    /// Slots in storage order.
    #[inline]
    pub fn slots(&self) -> &[ChannelSlot] {
        &self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(cmyk: bool, alpha: bool, palette: bool, meta: usize) -> ChannelLayout {
        ChannelLayout {
            cmyk,
            alpha,
            palette,
            meta,
        }
    }

    fn channels(map: &PixelChannelMap) -> alloc::vec::Vec<PixelChannel> {
        map.slots().iter().map(|s| s.channel).collect()
    }

    // --- initialize ---

    #[test]
    fn rgb_has_three_update_slots() {
        let map = PixelChannelMap::initialize(&layout(false, false, false, 0)).unwrap();
        assert_eq!(map.len(), 3);
        for slot in map.slots() {
            assert_eq!(slot.traits, PixelTrait::UPDATE);
        }
        assert_eq!(map.offset(PixelChannel::Alpha), None);
    }

    #[test]
    fn slot_order_is_fixed() {
        let map = PixelChannelMap::initialize(&layout(true, true, true, 2)).unwrap();
        assert_eq!(
            channels(&map),
            [
                PixelChannel::Red,
                PixelChannel::Green,
                PixelChannel::Blue,
                PixelChannel::Black,
                PixelChannel::Alpha,
                PixelChannel::Index,
                PixelChannel::Meta(0),
                PixelChannel::Meta(1),
            ]
        );
        assert_eq!(map.offset(PixelChannel::Index), Some(5));
        assert_eq!(map.offset(PixelChannel::Meta(1)), Some(7));
    }

    #[test]
    fn alpha_makes_color_blend() {
        let map = PixelChannelMap::initialize(&layout(false, true, false, 0)).unwrap();
        assert!(map.traits(PixelChannel::Red).contains(PixelTrait::BLEND));
        assert_eq!(map.traits(PixelChannel::Alpha), PixelTrait::COPY);
    }

    #[test]
    fn too_many_meta_channels() {
        let err = PixelChannelMap::initialize(&layout(false, false, false, 60)).unwrap_err();
        assert!(matches!(err, QuantumError::TooManyChannels(63)));
    }

    // --- set_mask ---

    #[test]
    fn mask_unset_channels_become_copy() {
        let l = layout(false, true, false, 0);
        let mut map = PixelChannelMap::initialize(&l).unwrap();
        map.set_mask(
            &l,
            ChannelMask::from_channels(&[PixelChannel::Red, PixelChannel::Alpha]),
        );
        assert_eq!(
            map.traits(PixelChannel::Red),
            PixelTrait::UPDATE | PixelTrait::BLEND
        );
        assert_eq!(map.traits(PixelChannel::Green), PixelTrait::COPY);
        assert_eq!(map.traits(PixelChannel::Alpha), PixelTrait::UPDATE);
    }

    #[test]
    fn palette_index_stays_copy() {
        let l = layout(false, false, true, 0);
        let mut map = PixelChannelMap::initialize(&l).unwrap();
        map.set_mask(&l, ChannelMask::ALL);
        assert_eq!(map.traits(PixelChannel::Index), PixelTrait::COPY);
        assert_eq!(map.traits(PixelChannel::Blue), PixelTrait::UPDATE);
    }

    // --- numbering ---

    #[test]
    fn channel_numbers_round_trip() {
        for n in 0..MAX_PIXEL_CHANNELS as u8 {
            if let Some(c) = PixelChannel::from_number(n) {
                assert_eq!(c.number(), n);
            }
        }
        assert_eq!(PixelChannel::from_number(7), None);
        assert_eq!(PixelChannel::CYAN, PixelChannel::Red);
    }

    #[test]
    fn trait_debug_lists_flags() {
        let t = PixelTrait::UPDATE | PixelTrait::BLEND;
        assert_eq!(alloc::format!("{t:?}"), "update|blend");
        assert_eq!(alloc::format!("{:?}", PixelTrait::UNDEFINED), "undefined");
    }
}
