//! Decoded image handle.

use std::sync::Arc;

use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;

use crate::Result;

/// A decoded image, cheap to clone.
///
/// This is what a successful resolution produces and what the in-memory
/// tier of [`ByteCache`](crate::cache::ByteCache) stores.
#[derive(Clone)]
pub struct Resource {
    image: Arc<DynamicImage>,
}

impl Resource {
    /// Decode an encoded image payload (PNG, JPEG, GIF, WebP).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(Self::from_image(image::load_from_memory(bytes)?))
    }

    /// Wrap an already decoded image.
    pub fn from_image(image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    /// The decoded image.
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Bytes per pixel row of the decoded buffer.
    pub fn bytes_per_row(&self) -> u64 {
        u64::from(self.image.width()) * u64::from(self.image.color().bytes_per_pixel())
    }

    /// Decoded pixel footprint (`height * bytes_per_row`), used for memory
    /// tier accounting. Independent of the encoded file size.
    pub fn memory_cost(&self) -> u64 {
        u64::from(self.image.height()) * self.bytes_per_row()
    }

    /// Encode as JPEG at the given quality (1-100). Alpha is dropped.
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
        DynamicImage::ImageRgb8(self.image.to_rgb8()).write_with_encoder(encoder)?;
        Ok(buf)
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
            || (self.image.color() == other.image.color()
                && self.width() == other.width()
                && self.height() == other.height()
                && self.image.as_bytes() == other.image.as_bytes())
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("color", &self.image.color())
            .finish()
    }
}
