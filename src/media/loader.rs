//! Marker image loading from disk

use std::path::Path;

use image::GrayImage;

use crate::platform::{MarkerImageLoader, PlatformError};

/// Decodes marker images with the `image` crate
///
/// Markers are reduced to 8-bit luminance, which is all feature detection
/// needs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageFileLoader;

impl MarkerImageLoader for ImageFileLoader {
    fn decode(&self, path: &Path) -> Result<GrayImage, PlatformError> {
        let image = image::open(path).map_err(|e| PlatformError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let gray = image.to_luma8();
        if gray.width() == 0 || gray.height() == 0 {
            return Err(PlatformError::Decode {
                path: path.to_path_buf(),
                reason: "image has no pixels".to_string(),
            });
        }
        Ok(gray)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_png() {
        let path = std::env::temp_dir().join(format!("marker-{}.png", uuid::Uuid::new_v4()));
        image::RgbImage::from_pixel(8, 4, image::Rgb([200, 10, 10]))
            .save(&path)
            .unwrap();

        let gray = ImageFileLoader.decode(&path).unwrap();
        assert_eq!(gray.dimensions(), (8, 4));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let result = ImageFileLoader.decode(Path::new("/definitely/not/here.png"));
        assert!(matches!(result, Err(PlatformError::Decode { .. })));
    }
}
