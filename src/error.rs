//! Error taxonomy and the non-fatal diagnostic sink.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use thiserror::Error;

use crate::channel::PixelChannel;

/// Broad class of a failure, mirroring how codecs report them upstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorClass {
    /// Bad caller-supplied option (map letter, storage type, channel).
    Option,
    /// The image cannot take part in the requested transfer.
    Image,
    /// A size computation or allocation exceeded what can be represented.
    ResourceLimit,
    /// The wire data is damaged; processing continued with safe values.
    CorruptImage,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Option => "OptionError",
            Self::Image => "ImageError",
            Self::ResourceLimit => "ResourceLimitError",
            Self::CorruptImage => "CorruptImageError",
        })
    }
}

/// Result type for transcoding operations.
pub type QuantumResult<T> = Result<T, QuantumError>;

/// A transfer failed before or while touching pixel data.
///
/// Configuration errors are raised before any buffer or cache mutation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum QuantumError {
    /// A map string contains a letter outside `ABCGIKMOPRY`.
    #[error("unrecognized pixel map `{0}`")]
    UnrecognizedPixelMap(String),

    /// A storage type name is not one of the known sample types.
    #[error("unrecognized storage type `{0}`")]
    UnrecognizedStorageType(String),

    /// A CMYK channel was requested from an image that is not CMYK.
    #[error("color separated image required: `{0}`")]
    ColorSeparatedImageRequired(String),

    /// An index quantum type was used with a direct-class image.
    #[error("colormapped image required")]
    ColormappedImageRequired,

    /// The image has no slot for the requested channel.
    #[error("no such image channel: {0:?}")]
    NoSuchImageChannel(PixelChannel),

    /// The caller's buffer cannot hold the region at the configured depth.
    #[error("pixel buffer too small: required {required} bytes, got {actual} bytes")]
    BufferTooSmall {
        /// Bytes the transfer needs.
        required: usize,
        /// Bytes supplied.
        actual: usize,
    },

    /// A size computation overflowed.
    #[error("resource limit exceeded: {0}")]
    ResourceLimit(&'static str),

    /// The region is empty or does not fit the image.
    #[error("invalid region {width}x{height}+{x}+{y} for {columns}x{rows} image")]
    InvalidRegion {
        /// Region origin column.
        x: usize,
        /// Region origin row.
        y: usize,
        /// Region width.
        width: usize,
        /// Region height.
        height: usize,
        /// Image width.
        columns: usize,
        /// Image height.
        rows: usize,
    },

    /// Image construction asked for more slots than a pixel can hold.
    #[error("too many pixel channels: {0}")]
    TooManyChannels(usize),
}

impl QuantumError {
    /// Reporting class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::UnrecognizedPixelMap(_)
            | Self::UnrecognizedStorageType(_)
            | Self::NoSuchImageChannel(_)
            | Self::InvalidRegion { .. } => ErrorClass::Option,
            Self::ColorSeparatedImageRequired(_) | Self::ColormappedImageRequired => {
                ErrorClass::Image
            }
            Self::BufferTooSmall { .. } | Self::ResourceLimit(_) | Self::TooManyChannels(_) => {
                ErrorClass::ResourceLimit
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// A non-fatal condition raised during a transfer that still completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DiagnosticKind {
    /// At least one colormap index was out of range and was replaced by 0.
    InvalidColormapIndex,
    /// The cache refused a row; the transfer stopped early.
    PixelCacheUnavailable,
}

impl DiagnosticKind {
    /// Class the condition is reported under.
    pub const fn class(self) -> ErrorClass {
        match self {
            Self::InvalidColormapIndex => ErrorClass::CorruptImage,
            Self::PixelCacheUnavailable => ErrorClass::ResourceLimit,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InvalidColormapIndex => "InvalidColormapIndex",
            Self::PixelCacheUnavailable => "PixelCacheUnavailable",
        })
    }
}

/// One recorded diagnostic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// What happened.
    pub kind: DiagnosticKind,
    /// Free-form context (operation name, row).
    pub detail: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} `{}`", self.kind.class(), self.kind, self.detail)
    }
}

/// Caller-owned sink for warnings that do not abort a transfer.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and log it.
    pub fn push(&mut self, kind: DiagnosticKind, detail: impl Into<String>) {
        let diagnostic = Diagnostic {
            kind,
            detail: detail.into(),
        };
        log::warn!("{diagnostic}");
        self.entries.push(diagnostic);
    }

    /// Recorded diagnostics, oldest first.
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Number of recorded diagnostics of `kind`.
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all recorded diagnostics.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
