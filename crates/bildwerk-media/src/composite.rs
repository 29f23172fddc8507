// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Layer compositor — flatten a text overlay onto its base bitmap.
//
// Version-2 projects store the text of a bitmap costume as a separate layer.
// The target engine only knows single-layer costumes, so both layers are
// merged with a plain alpha-over at the origin.

use bildwerk_core::error::Result;
use bildwerk_core::types::DataFormat;
use image::Rgba;
use tracing::{debug, info, instrument};

use crate::codec::{PixelBuffer, PixelCodec};
use crate::content::EncodedContent;

/// Composite `overlay` over `base` and encode the result as `output`.
///
/// Neither input is modified. The result has the base layer's dimensions;
/// overlay pixels beyond the base bounds are clipped.
#[instrument(skip_all, fields(base = %base.format(), overlay = %overlay.format()))]
pub async fn composite<C: PixelCodec>(
    codec: &C,
    base: &EncodedContent,
    overlay: &EncodedContent,
    output: DataFormat,
) -> Result<EncodedContent> {
    let mut canvas = codec.decode(base).await?;
    let layer = codec.decode(overlay).await?;
    info!(
        base_w = canvas.width(),
        base_h = canvas.height(),
        overlay_w = layer.width(),
        overlay_h = layer.height(),
        "Compositing layers"
    );

    draw_over(&mut canvas, &layer);
    drop(layer);
    codec.encode(&canvas, output).await
}

/// Blend `layer` onto `canvas` in place, anchored at the top-left corner.
pub fn draw_over(canvas: &mut PixelBuffer, layer: &PixelBuffer) {
    let width = canvas.width().min(layer.width());
    let height = canvas.height().min(layer.height());
    debug!(width, height, "Blending overlap region");

    for y in 0..height {
        for x in 0..width {
            let src = layer.get_pixel(x, y);
            let dst = canvas.get_pixel_mut(x, y);
            *dst = alpha_over(*src, *dst);
        }
    }
}

/// Standard non-premultiplied "source over destination".
pub fn alpha_over(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    match src[3] {
        0 => return dst,
        255 => return src,
        _ => {}
    }

    let src_a = f32::from(src[3]) / 255.0;
    let dst_a = f32::from(dst[3]) / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);

    let blend = |s: u8, d: u8| -> u8 {
        let s = f32::from(s) / 255.0;
        let d = f32::from(d) / 255.0;
        let out = (s * src_a + d * dst_a * (1.0 - src_a)) / out_a;
        (out * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend(src[0], dst[0]),
        blend(src[1], dst[1]),
        blend(src[2], dst[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ImageCodec;
    use bildwerk_core::error::BildwerkError;
    use image::RgbaImage;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8 * 20, y as u8 * 20, 90, 255]))
    }

    async fn encoded(pixels: &RgbaImage) -> EncodedContent {
        ImageCodec::new()
            .encode(pixels, DataFormat::Png)
            .await
            .unwrap()
    }

    #[test]
    fn alpha_over_extremes() {
        let base = Rgba([10, 20, 30, 255]);
        assert_eq!(alpha_over(Rgba([200, 100, 50, 0]), base), base);
        assert_eq!(alpha_over(WHITE, base), WHITE);
    }

    #[test]
    fn alpha_over_half_white_on_black_is_mid_grey() {
        let out = alpha_over(Rgba([255, 255, 255, 128]), BLACK);
        assert_eq!(out[3], 255);
        for channel in 0..3 {
            assert_eq!(out[channel], 128);
        }
    }

    #[test]
    fn alpha_over_onto_transparent_keeps_source_colour() {
        let out = alpha_over(Rgba([40, 80, 120, 100]), CLEAR);
        assert_eq!(out, Rgba([40, 80, 120, 100]));
    }

    #[test]
    fn larger_overlay_is_clipped() {
        let mut canvas = RgbaImage::from_pixel(2, 2, BLACK);
        let layer = RgbaImage::from_pixel(5, 5, WHITE);
        draw_over(&mut canvas, &layer);
        assert_eq!(canvas.dimensions(), (2, 2));
        assert!(canvas.pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn smaller_overlay_lets_base_show_through() {
        let mut canvas = RgbaImage::from_pixel(4, 4, BLACK);
        let layer = RgbaImage::from_pixel(2, 2, WHITE);
        draw_over(&mut canvas, &layer);
        for (x, y, pixel) in canvas.enumerate_pixels() {
            let expected = if x < 2 && y < 2 { WHITE } else { BLACK };
            assert_eq!(*pixel, expected, "pixel ({x}, {y})");
        }
    }

    #[tokio::test]
    async fn transparent_overlay_leaves_base_pixels() {
        let codec = ImageCodec::new();
        let base = encoded(&gradient(6, 4)).await;
        let overlay = encoded(&RgbaImage::from_pixel(6, 4, Rgba([255, 0, 255, 0]))).await;

        let result = composite(&codec, &base, &overlay, DataFormat::Png).await.unwrap();
        assert_eq!(result.format(), DataFormat::Png);
        assert!(result.is_data_url());
        assert_eq!(codec.decode(&result).await.unwrap(), gradient(6, 4));
    }

    #[tokio::test]
    async fn inputs_are_not_mutated() {
        let codec = ImageCodec::new();
        let base = encoded(&gradient(3, 3)).await;
        let overlay = encoded(&RgbaImage::from_pixel(3, 3, Rgba([0, 255, 0, 200]))).await;
        let (base_before, overlay_before) = (base.clone(), overlay.clone());

        let result = composite(&codec, &base, &overlay, DataFormat::Png).await.unwrap();
        assert_eq!(base, base_before);
        assert_eq!(overlay, overlay_before);
        assert_ne!(result, base);
    }

    #[tokio::test]
    async fn result_takes_base_dimensions() {
        let codec = ImageCodec::new();
        let base = encoded(&gradient(4, 3)).await;
        let overlay = encoded(&RgbaImage::from_pixel(9, 1, WHITE)).await;

        let result = composite(&codec, &base, &overlay, DataFormat::Png).await.unwrap();
        let pixels = codec.decode(&result).await.unwrap();
        assert_eq!(pixels.dimensions(), (4, 3));
        assert_eq!(*pixels.get_pixel(3, 0), WHITE);
        assert_eq!(*pixels.get_pixel(3, 1), *gradient(4, 3).get_pixel(3, 1));
    }

    #[tokio::test]
    async fn undecodable_layer_fails() {
        let codec = ImageCodec::new();
        let base = encoded(&gradient(2, 2)).await;
        let broken = EncodedContent::from_bytes(DataFormat::Png, b"nope");

        for (b, o) in [(&base, &broken), (&broken, &base)] {
            let err = composite(&codec, b, o, DataFormat::Png).await.unwrap_err();
            assert!(matches!(err, BildwerkError::Decode(_)));
        }
    }
}
