use std::convert::TryFrom;
use std::path::Path;

use image::{imageops::FilterType, ImageFormat, RgbImage};
use thiserror::Error;

use crate::models::Color;

/// Linear reduction factor applied by [RawImage::downscale]
pub const DOWNSCALE_FACTOR: u32 = 10;

#[derive(Debug, Clone, Error)]
pub enum RawImageError {
    #[error("invalid data ({data} bytes) for the given dimensions ({width} x {height} x {channels} = {expected})")]
    InvalidData {
        data: usize,
        width: usize,
        height: usize,
        channels: usize,
        expected: usize,
    },
    #[error("empty image ({width} x {height})")]
    Empty { width: u32, height: u32 },
}

/// 8-bit RGB frame, at least one pixel wide and high
#[derive(Clone)]
pub struct RawImage {
    inner: RgbImage,
}

impl RawImage {
    pub const CHANNELS: usize = 3;

    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    pub fn color_at(&self, x: u32, y: u32) -> Option<Color> {
        self.inner
            .get_pixel_checked(x, y)
            .map(|pixel| Color::new(pixel[0], pixel[1], pixel[2]))
    }

    /// Iterate over the image pixels in row-major order
    pub fn colors(&self) -> impl Iterator<Item = Color> + '_ {
        self.inner
            .as_raw()
            .chunks_exact(Self::CHANNELS)
            .map(|pixel| Color::new(pixel[0], pixel[1], pixel[2]))
    }

    /// Bilinear reduction of the image to a tenth of its size in each dimension
    pub fn downscale(&self) -> Self {
        let (width, height) = downscaled_dimensions(self.width(), self.height());

        Self {
            inner: image::imageops::resize(&self.inner, width, height, FilterType::Triangle),
        }
    }

    pub fn save_png(&self, path: &Path) -> Result<(), image::ImageError> {
        self.inner.save_with_format(path, ImageFormat::Png)
    }
}

/// Size of a downscaled `width` x `height` image, never less than 1 x 1
pub fn downscaled_dimensions(width: u32, height: u32) -> (u32, u32) {
    (
        (width / DOWNSCALE_FACTOR).max(1),
        (height / DOWNSCALE_FACTOR).max(1),
    )
}

impl std::fmt::Debug for RawImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.inner.as_raw();

        let mut f = f.debug_struct("RawImage");
        f.field("width", &self.width());
        f.field("height", &self.height());

        if data.len() > 32 {
            f.field("data", &format!("[{} bytes]", data.len()));
        } else {
            f.field("data", data);
        }

        f.finish()
    }
}

impl TryFrom<(Vec<u8>, u32, u32)> for RawImage {
    type Error = RawImageError;

    fn try_from((data, width, height): (Vec<u8>, u32, u32)) -> Result<Self, Self::Error> {
        let channels = Self::CHANNELS;
        let expected = width as usize * height as usize * channels;

        if data.len() != expected {
            return Err(RawImageError::InvalidData {
                data: data.len(),
                width: width as usize,
                height: height as usize,
                channels,
                expected,
            });
        }

        let inner = RgbImage::from_raw(width, height, data).ok_or(RawImageError::InvalidData {
            data: 0,
            width: width as usize,
            height: height as usize,
            channels,
            expected,
        })?;

        Self::try_from(inner)
    }
}

impl TryFrom<RgbImage> for RawImage {
    type Error = RawImageError;

    fn try_from(inner: RgbImage) -> Result<Self, Self::Error> {
        if inner.width() == 0 || inner.height() == 0 {
            return Err(RawImageError::Empty {
                width: inner.width(),
                height: inner.height(),
            });
        }

        Ok(Self { inner })
    }
}

impl From<RawImage> for RgbImage {
    fn from(image: RawImage) -> Self {
        image.inner
    }
}

#[cfg(test)]
impl RawImage {
    pub(crate) fn solid(width: u32, height: u32, color: Color) -> Self {
        Self {
            inner: RgbImage::from_pixel(
                width,
                height,
                image::Rgb([color.red, color.green, color.blue]),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_invalid_data() {
        assert!(matches!(
            RawImage::try_from((vec![0u8; 10], 2, 2)),
            Err(RawImageError::InvalidData { expected: 12, .. })
        ));
        assert!(matches!(
            RawImage::try_from((vec![], 0, 4)),
            Err(RawImageError::Empty { .. })
        ));
    }

    #[test]
    fn pixels_in_row_major_order() {
        let image = RawImage::try_from((vec![1, 2, 3, 4, 5, 6], 2, 1)).unwrap();

        assert_eq!(
            image.colors().collect::<Vec<_>>(),
            vec![Color::new(1, 2, 3), Color::new(4, 5, 6)]
        );
        assert_eq!(image.color_at(1, 0), Some(Color::new(4, 5, 6)));
        assert_eq!(image.color_at(2, 0), None);
    }

    #[test]
    fn downscale_dimensions() {
        let black = Color::new(0, 0, 0);

        let image = RawImage::solid(100, 100, black).downscale();
        assert_eq!((image.width(), image.height()), (10, 10));

        let image = RawImage::solid(5, 5, black).downscale();
        assert_eq!((image.width(), image.height()), (1, 1));

        let image = RawImage::solid(1920, 1080, black).downscale();
        assert_eq!((image.width(), image.height()), (192, 108));

        assert_eq!(downscaled_dimensions(1, 19), (1, 1));
        assert_eq!(downscaled_dimensions(29, 9), (2, 1));
    }

    #[test]
    fn downscale_keeps_uniform_color() {
        let color = Color::new(64, 128, 192);
        let image = RawImage::solid(40, 20, color).downscale();

        assert!(image.colors().all(|c| c == color));
    }

    #[test]
    fn save_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let color = Color::new(10, 20, 30);

        RawImage::solid(3, 2, color).save_png(&path).unwrap();

        let loaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(loaded.dimensions(), (3, 2));
        assert_eq!(loaded.get_pixel(2, 1), &image::Rgb([10, 20, 30]));
    }
}
