// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster rescaler — shrink a bitmap by a resolution divisor with
// nearest-neighbor sampling.
//
// Costumes drawn at double resolution are pixel art more often than not, so
// no smoothing filter is ever applied: every output pixel is a copy of one
// source pixel.

use bildwerk_core::error::Result;
use bildwerk_core::types::{DataFormat, ResolutionDivisor};
use image::ImageBuffer;
use tracing::{debug, info, instrument};

use crate::codec::{PixelBuffer, PixelCodec};
use crate::content::EncodedContent;

/// Rescale `content` by `divisor` and re-encode it as `output`.
///
/// A divisor of 1 returns the input untouched without decoding it.
#[instrument(skip(codec, content), fields(format = %content.format()))]
pub async fn rescale<C: PixelCodec>(
    codec: &C,
    content: &EncodedContent,
    divisor: ResolutionDivisor,
    output: DataFormat,
) -> Result<EncodedContent> {
    if divisor.is_identity() {
        return Ok(content.clone());
    }

    let source = codec.decode(content).await?;
    let scaled = scale_nearest(&source, divisor)?;
    info!(
        from_w = source.width(),
        from_h = source.height(),
        width = scaled.width(),
        height = scaled.height(),
        "Image rescaled"
    );

    drop(source);
    codec.encode(&scaled, output).await
}

/// Resample `source` by `divisor` using nearest-neighbor interpolation.
///
/// The output is `floor(w / d) x floor(h / d)`. Destination pixel `(x, y)`
/// copies the source pixel under its centre mapped back through the divisor,
/// `floor((x + 0.5) * d)`, clamped to the last column (and likewise for
/// rows). When a side is not a multiple of `d` the trailing partial cell is
/// cut off.
pub fn scale_nearest(source: &PixelBuffer, divisor: ResolutionDivisor) -> Result<PixelBuffer> {
    let (src_w, src_h) = source.dimensions();
    if divisor.is_identity() {
        return Ok(source.clone());
    }
    let (width, height) = divisor.target_dimensions(src_w, src_h)?;

    let d = divisor.get();
    let columns: Vec<u32> = (0..width).map(|x| nearest_index(x, d, src_w)).collect();
    let rows: Vec<u32> = (0..height).map(|y| nearest_index(y, d, src_h)).collect();
    debug!(width, height, "Sampling grid built");

    Ok(ImageBuffer::from_fn(width, height, |x, y| {
        *source.get_pixel(columns[x as usize], rows[y as usize])
    }))
}

fn nearest_index(dst: u32, divisor: f64, src_len: u32) -> u32 {
    let index = ((f64::from(dst) + 0.5) * divisor).floor() as u32;
    index.min(src_len.saturating_sub(1))
}
