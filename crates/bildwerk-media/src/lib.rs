// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// bildwerk-media — Image asset conversion for the Bildwerk converter.
//
// Loads costume and backdrop images out of a project archive, normalizes
// vector markup across editor generations, rescales rasters with
// nearest-neighbor sampling, and flattens text overlays onto their base
// bitmap.

pub mod asset;
pub mod codec;
pub mod composite;
pub mod content;
pub mod provider;
pub mod rescale;
pub mod vector;

// Re-export the primary structs so callers can use `bildwerk_media::ImageConverter` etc.
pub use asset::{ImageAsset, ImageConverter, RasterImage, VectorImage};
pub use codec::{ImageCodec, PixelBuffer, PixelCodec};
pub use content::{EncodedContent, Payload};
pub use provider::{ContentProvider, Entry, MemoryProvider, ZipProvider};
pub use vector::{UsvgDocument, UsvgOracle, VectorNormalizer, VectorOracle};
