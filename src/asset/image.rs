use std::path::Path;

use crate::asset::AssetError;
use crate::io;

/// Decoded texture pixels, always expanded to tightly packed RGBA8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureImage {
    /// Loads an uncompressed bitmap. The alpha channel is forced opaque because
    /// the source is treated as RGB.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        log::info!("Loading texture: {:?}", path);

        let bytes = io::load_binary(path)?;
        let img = ::image::load_from_memory_with_format(&bytes, ::image::ImageFormat::Bmp)
            .map_err(|source| AssetError::Image {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self::from_rgb8(&img.to_rgb8()))
    }

    pub fn from_rgb8(rgb: &::image::RgbImage) -> Self {
        let (width, height) = rgb.dimensions();
        let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
        for pixel in rgb.pixels() {
            rgba.extend_from_slice(&[pixel[0], pixel[1], pixel[2], 255]);
        }
        Self {
            width,
            height,
            rgba,
        }
    }

    /// A 1x1 opaque white image.
    pub fn white() -> Self {
        Self {
            width: 1,
            height: 1,
            rgba: vec![255; 4],
        }
    }
}
