//! Conversions between [`Image`] and `imgref` buffers of `rgb` pixels.
//!
//! Both directions go through the map-driven transfer, so the usual
//! scaling laws apply: `u8` round-trips exactly at every quantum depth,
//! `u16` does from 16 bits up.

use alloc::vec;

use imgref::{ImgRef, ImgVec};
use rgb::{ComponentBytes, Gray, Rgb, Rgba};

use crate::error::{QuantumError, QuantumResult};
use crate::image::{Colorspace, Image, Region};
use crate::map::StorageType;
use crate::transfer::{export_image_pixels, import_image_pixels};

/// Gray images keep their samples in the red slot; anything else is reduced
/// to its intensity.
fn gray_map(image: &Image) -> &'static str {
    if image.colorspace().is_gray() {
        "R"
    } else {
        "I"
    }
}

macro_rules! impl_imgref_interop {
    (
        $pixel:ty, $zero:expr, $storage:expr,
        import $import_map:literal, export $export_map:expr,
        $colorspace:expr, alpha $alpha:literal,
        $(#[$doc:meta])* fn $to:ident
    ) => {
        impl TryFrom<ImgRef<'_, $pixel>> for Image {
            type Error = QuantumError;

            fn try_from(img: ImgRef<'_, $pixel>) -> QuantumResult<Self> {
                let mut image = Image::builder(img.width(), img.height())
                    .with_colorspace($colorspace)
                    .with_alpha($alpha)
                    .build()?;
                for (y, row) in img.rows().enumerate() {
                    let region = Region::row(0, y, img.width());
                    import_image_pixels(&mut image, &region, $import_map, $storage, row.as_bytes())?;
                }
                Ok(image)
            }
        }

        impl Image {
            $(#[$doc])*
            ///
            /// # Errors
            ///
            /// [`QuantumError::ResourceLimit`] when the buffer size overflows.
            pub fn $to(&self) -> QuantumResult<ImgVec<$pixel>> {
                let (width, height) = (self.columns(), self.rows());
                let mut pixels = vec![$zero; width * height];
                let region = Region::new(0, 0, width, height);
                let map: &str = ($export_map)(self);
                export_image_pixels(self, &region, map, $storage, pixels.as_bytes_mut())?;
                Ok(ImgVec::new(pixels, width, height))
            }
        }
    };
}

impl_imgref_interop!(
    Rgb<u8>, Rgb::new(0u8, 0, 0), StorageType::Char,
    import "RGB", export |_| "RGB", Colorspace::Srgb, alpha false,
    /// Red, green and blue as 8-bit samples; alpha is dropped.
    fn to_rgb8
);
impl_imgref_interop!(
    Rgba<u8>, Rgba::new(0u8, 0, 0, 0), StorageType::Char,
    import "RGBA", export |_| "RGBA", Colorspace::Srgb, alpha true,
    /// Red, green, blue and alpha as 8-bit samples; alpha is opaque when the
    /// image has none.
    fn to_rgba8
);
impl_imgref_interop!(
    Gray<u8>, Gray::new(0u8), StorageType::Char,
    import "I", export gray_map, Colorspace::Gray, alpha false,
    /// 8-bit gray: the red slot of gray images, pixel intensity otherwise.
    fn to_gray8
);
impl_imgref_interop!(
    Rgb<u16>, Rgb::new(0u16, 0, 0), StorageType::Short,
    import "RGB", export |_| "RGB", Colorspace::Srgb, alpha false,
    /// Red, green and blue as 16-bit samples.
    fn to_rgb16
);
impl_imgref_interop!(
    Rgba<u16>, Rgba::new(0u16, 0, 0, 0), StorageType::Short,
    import "RGBA", export |_| "RGBA", Colorspace::Srgb, alpha true,
    /// Red, green, blue and alpha as 16-bit samples.
    fn to_rgba16
);
impl_imgref_interop!(
    Gray<u16>, Gray::new(0u16), StorageType::Short,
    import "I", export gray_map, Colorspace::Gray, alpha false,
    /// 16-bit gray: the red slot of gray images, pixel intensity otherwise.
    fn to_gray16
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantum::scale_char_to_quantum;
    use alloc::vec::Vec;
    use imgref::Img;

    #[test]
    fn rgba8_round_trips() {
        let pixels: Vec<Rgba<u8>> = (0..6u8)
            .map(|i| Rgba::new(i * 40, 255 - i * 40, i, 128))
            .collect();
        let src = Img::new(pixels.as_slice(), 3, 2);
        let image = Image::try_from(src).unwrap();
        assert!(image.has_alpha());
        assert_eq!(image.to_rgba8().unwrap().buf(), &pixels);
    }

    #[test]
    fn strided_rows_skip_padding() {
        let pixels = [
            Rgb::new(1u8, 2, 3),
            Rgb::new(4, 5, 6),
            Rgb::new(99, 99, 99),
            Rgb::new(7, 8, 9),
            Rgb::new(10, 11, 12),
            Rgb::new(99, 99, 99),
        ];
        let src = Img::new_stride(&pixels[..], 2, 2, 3);
        let image = Image::try_from(src).unwrap();
        let out = image.to_rgb8().unwrap();
        assert_eq!(out.width(), 2);
        assert_eq!(out.buf()[3], Rgb::new(10, 11, 12));
    }

    #[test]
    fn gray_import_fills_every_color_slot() {
        let pixels = [Gray::new(0x40u8), Gray::new(0xc0)];
        let image = Image::try_from(Img::new(&pixels[..], 2, 1)).unwrap();
        assert_eq!(image.colorspace(), Colorspace::Gray);
        let q = scale_char_to_quantum(0xc0);
        assert_eq!(image.pixel(1, 0).unwrap(), &[q, q, q]);
        assert_eq!(image.to_gray8().unwrap().buf()[..], pixels[..]);
    }

    #[test]
    fn rgb_export_reports_opaque_alpha() {
        let image = Image::builder(1, 1).build().unwrap();
        assert_eq!(image.to_rgba8().unwrap().buf()[0], Rgba::new(0, 0, 0, 255));
    }

    #[test]
    fn color_image_exports_gray_as_intensity() {
        let pixels = [Rgb::new(255u8, 0, 0), Rgb::new(0, 0, 255), Rgb::new(90, 90, 90)];
        let image = Image::try_from(Img::new(&pixels[..], 3, 1)).unwrap();
        let mut expected = [0u8; 3];
        export_image_pixels(&image, &Region::row(0, 0, 3), "I", StorageType::Char, &mut expected)
            .unwrap();
        let gray = image.to_gray8().unwrap();
        let gray: Vec<u8> = gray.buf().iter().map(|g| g.value()).collect();
        assert_eq!(gray, expected);
        assert_ne!(gray[0], 255);
        assert_ne!(gray[0], gray[1]);
    }

    #[cfg(not(feature = "q8"))]
    #[test]
    fn rgb16_round_trips() {
        let pixels = [Rgb::new(0u16, 0x1234, 0xffff), Rgb::new(1, 2, 3)];
        let image = Image::try_from(Img::new(&pixels[..], 1, 2)).unwrap();
        assert_eq!(image.to_rgb16().unwrap().buf()[..], pixels[..]);
    }
}
