// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pixel codec — decode encoded content into an RGBA buffer and back.
//
// Decoding and encoding are the only suspension points of a conversion. The
// default codec runs the `image` crate on tokio's blocking pool so that a
// caller converting many assets concurrently keeps its reactor responsive.

use std::future::Future;
use std::io::Cursor;

use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::DataFormat;
use image::{DynamicImage, ImageFormat, RgbaImage};
use tracing::{debug, instrument};

use crate::content::EncodedContent;

/// Decoded RGBA pixels. Owned by exactly one operation at a time and dropped
/// once re-encoded.
pub type PixelBuffer = RgbaImage;

/// Substrate that turns encoded content into pixels and pixels into encoded
/// content.
pub trait PixelCodec: Send + Sync {
    /// Decode a raster payload.
    fn decode(&self, content: &EncodedContent) -> impl Future<Output = Result<PixelBuffer>> + Send;

    /// Encode pixels into `format`, returned as a data-URL payload.
    fn encode(
        &self,
        pixels: &PixelBuffer,
        format: DataFormat,
    ) -> impl Future<Output = Result<EncodedContent>> + Send;
}

/// `image`-crate codec running on the blocking thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec;

impl ImageCodec {
    pub fn new() -> Self {
        Self
    }
}

impl PixelCodec for ImageCodec {
    #[instrument(skip_all, fields(format = %content.format()))]
    async fn decode(&self, content: &EncodedContent) -> Result<PixelBuffer> {
        let format = content.format();
        if format.is_vector() {
            return Err(BildwerkError::Decode(
                "vector content has no raster pixels".into(),
            ));
        }
        let bytes = content.bytes()?;

        let pixels = tokio::task::spawn_blocking(move || decode_rgba(&bytes, format))
            .await
            .map_err(|err| BildwerkError::Decode(format!("decoder task failed: {err}")))??;
        debug!(
            width = pixels.width(),
            height = pixels.height(),
            "Image decoded"
        );
        Ok(pixels)
    }

    #[instrument(
        skip_all,
        fields(width = pixels.width(), height = pixels.height(), format = %format)
    )]
    async fn encode(&self, pixels: &PixelBuffer, format: DataFormat) -> Result<EncodedContent> {
        let target = raster_format(format)?;
        let pixels = pixels.clone();

        let bytes = tokio::task::spawn_blocking(move || encode_to_format(pixels, target))
            .await
            .map_err(|err| BildwerkError::Encode(format!("encoder task failed: {err}")))??;
        debug!(len = bytes.len(), "Image encoded");
        Ok(EncodedContent::data_url_from_bytes(format, &bytes))
    }
}

/// Map a raster data format onto the `image` crate's format.
fn raster_format(format: DataFormat) -> Result<ImageFormat> {
    match format {
        DataFormat::Png => Ok(ImageFormat::Png),
        DataFormat::Jpg => Ok(ImageFormat::Jpeg),
        DataFormat::Gif => Ok(ImageFormat::Gif),
        DataFormat::Bmp => Ok(ImageFormat::Bmp),
        DataFormat::Svg => Err(BildwerkError::UnsupportedFormat(
            "svg is not a raster encoding".into(),
        )),
    }
}

/// Decode bytes, trusting the declared format first and falling back to
/// content sniffing (archives are known to carry mislabelled entries).
fn decode_rgba(bytes: &[u8], declared: DataFormat) -> Result<PixelBuffer> {
    let declared = raster_format(declared)?;
    let image = image::load_from_memory_with_format(bytes, declared)
        .or_else(|_| image::load_from_memory(bytes))
        .map_err(|err| BildwerkError::Decode(format!("failed to decode image: {err}")))?;
    Ok(image.to_rgba8())
}

/// Encode pixels into the given format, returning the raw bytes.
fn encode_to_format(pixels: PixelBuffer, format: ImageFormat) -> Result<Vec<u8>> {
    // JPEG has no alpha channel.
    let image = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(pixels).to_rgb8()),
        _ => DynamicImage::ImageRgba8(pixels),
    };
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), format)
        .map_err(|err| BildwerkError::Encode(err.to_string()))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sample() -> PixelBuffer {
        RgbaImage::from_fn(3, 2, |x, y| Rgba([x as u8 * 80, y as u8 * 120, 7, 200]))
    }

    #[tokio::test]
    async fn png_round_trip_is_lossless() {
        let codec = ImageCodec::new();
        let encoded = codec.encode(&sample(), DataFormat::Png).await.unwrap();

        assert_eq!(encoded.format(), DataFormat::Png);
        assert!(encoded.is_data_url());
        assert!(encoded.to_data_url().starts_with("data:image/png;base64,"));

        let decoded = codec.decode(&encoded).await.unwrap();
        assert_eq!(decoded, sample());
    }

    #[tokio::test]
    async fn mislabelled_entry_is_sniffed() {
        let codec = ImageCodec::new();
        let png = codec.encode(&sample(), DataFormat::Png).await.unwrap();
        let mislabelled = EncodedContent::from_bytes(DataFormat::Jpg, &png.bytes().unwrap());

        let decoded = codec.decode(&mislabelled).await.unwrap();
        assert_eq!(decoded.dimensions(), (3, 2));
    }

    #[tokio::test]
    async fn garbage_fails_with_decode_error() {
        let codec = ImageCodec::new();
        let garbage = EncodedContent::from_bytes(DataFormat::Png, b"not an image");
        assert!(matches!(
            codec.decode(&garbage).await,
            Err(BildwerkError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn vector_content_is_not_decodable() {
        let codec = ImageCodec::new();
        let svg = EncodedContent::from_bytes(DataFormat::Svg, b"<svg/>");
        assert!(matches!(codec.decode(&svg).await, Err(BildwerkError::Decode(_))));
        assert!(matches!(
            codec.encode(&sample(), DataFormat::Svg).await,
            Err(BildwerkError::UnsupportedFormat(_))
        ));
    }
}
