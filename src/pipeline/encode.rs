//! Image encoding: `DynamicImage` → base64 PNG ready for a provider API.
//!
//! PNG over JPEG because it is lossless — compression artefacts on rendered
//! text measurably degrade what a vision model can read, and page images
//! compress well anyway.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use tracing::debug;

/// A page image encoded for transport to a provider.
#[derive(Debug, Clone)]
pub struct EncodedPage {
    pub base64: String,
    pub mime_type: &'static str,
}

impl EncodedPage {
    /// Render as a `data:` URI (OpenAI's image_url format).
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }
}

/// Encode a rasterised page as base64 PNG.
pub fn encode_page(img: &DynamicImage) -> Result<EncodedPage, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("encoded page image → {} bytes base64", b64.len());

    Ok(EncodedPage {
        base64: b64,
        mime_type: "image/png",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let page = encode_page(&img).expect("encode should succeed");
        assert_eq!(page.mime_type, "image/png");
        assert!(!page.base64.is_empty());
        let decoded = STANDARD.decode(&page.base64).expect("valid base64");
        assert_eq!(&decoded[1..4], b"PNG");
    }

    #[test]
    fn data_uri_has_mime_prefix() {
        let page = EncodedPage {
            base64: "Zm9v".into(),
            mime_type: "image/png",
        };
        assert_eq!(page.data_uri(), "data:image/png;base64,Zm9v");
    }
}
