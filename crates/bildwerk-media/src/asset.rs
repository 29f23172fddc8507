// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image assets and the converter that produces them.
//
// An asset is either vector or raster; each kind carries only what it needs.
// Every transform returns a new asset, so a handle a caller already holds
// stays valid after the call.

use bildwerk_core::config::ConversionConfig;
use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::{DataFormat, Dialect, ResolutionDivisor, entry_name};
use tracing::{debug, info, instrument};

use crate::codec::{ImageCodec, PixelCodec};
use crate::composite::composite;
use crate::content::EncodedContent;
use crate::provider::ContentProvider;
use crate::rescale::rescale;
use crate::vector::{UsvgOracle, VectorNormalizer, VectorOracle};

/// Normalized vector markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorImage {
    content: EncodedContent,
    dialect: Dialect,
}

impl VectorImage {
    pub fn content(&self) -> &EncodedContent {
        &self.content
    }

    /// Dialect the markup was normalized from.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The normalized markup as text.
    pub fn markup(&self) -> Result<String> {
        String::from_utf8(self.content.bytes()?)
            .map_err(|err| BildwerkError::MalformedVector(err.to_string()))
    }
}

/// Raster payload in any supported bitmap format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    content: EncodedContent,
}

impl RasterImage {
    pub fn content(&self) -> &EncodedContent {
        &self.content
    }
}

/// One converted costume or backdrop image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageAsset {
    Vector(VectorImage),
    Raster(RasterImage),
}

impl ImageAsset {
    pub fn format(&self) -> DataFormat {
        self.content().format()
    }

    pub fn content(&self) -> &EncodedContent {
        match self {
            Self::Vector(vector) => &vector.content,
            Self::Raster(raster) => &raster.content,
        }
    }

    pub fn is_data_url(&self) -> bool {
        self.content().is_data_url()
    }

    pub fn to_data_url(&self) -> String {
        self.content().to_data_url()
    }

    /// Consume the asset and return its encoded content.
    pub fn into_content(self) -> EncodedContent {
        match self {
            Self::Vector(vector) => vector.content,
            Self::Raster(raster) => raster.content,
        }
    }
}

/// Converts image assets out of a project archive.
///
/// Holds the injected pixel codec and vector oracle; it keeps no state
/// between calls, so one converter can serve any number of concurrent
/// conversions.
#[derive(Debug, Clone)]
pub struct ImageConverter<C = ImageCodec, O = UsvgOracle> {
    codec: C,
    normalizer: VectorNormalizer<O>,
    raster_output: DataFormat,
}

impl ImageConverter {
    /// Converter with the default codec and usvg oracle.
    pub fn new() -> Self {
        Self::from_parts(ImageCodec::new(), UsvgOracle::default())
    }

    /// Default codec and oracle, configured from `config`.
    pub fn with_config(config: &ConversionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            codec: ImageCodec::new(),
            normalizer: VectorNormalizer::new(UsvgOracle::new(config.vector_dpi)),
            raster_output: config.raster_output,
        })
    }
}

impl Default for ImageConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: PixelCodec, O: VectorOracle> ImageConverter<C, O> {
    pub fn from_parts(codec: C, oracle: O) -> Self {
        Self {
            codec,
            normalizer: VectorNormalizer::new(oracle),
            raster_output: DataFormat::Png,
        }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn normalizer(&self) -> &VectorNormalizer<O> {
        &self.normalizer
    }

    /// Format rescaled and composited rasters are encoded to.
    pub fn raster_output(&self) -> DataFormat {
        self.raster_output
    }

    /// Load `<identifier>.<format>` from `provider` and convert it.
    ///
    /// Vector entries are normalized for the dialect of `authoring_version`
    /// and keep their format. Raster entries are loaded as-is and, unless
    /// `divisor` is 1, rescaled to the lossless output format.
    #[instrument(skip(self, provider))]
    pub async fn load(
        &self,
        provider: &dyn ContentProvider,
        identifier: &str,
        format: DataFormat,
        authoring_version: u32,
        divisor: ResolutionDivisor,
    ) -> Result<ImageAsset> {
        let asset = if format.is_vector() {
            let dialect = Dialect::from_authoring_version(authoring_version);
            let name = entry_name(identifier, format);
            let markup = provider.require(&name)?.into_text()?;
            let normalized = self.normalizer.normalize(&markup, dialect)?;
            ImageAsset::Vector(VectorImage {
                content: EncodedContent::from_bytes(format, normalized.as_bytes()),
                dialect,
            })
        } else {
            let loaded = RasterImage {
                content: EncodedContent::load_generic(provider, identifier, format)?,
            };
            if divisor.is_identity() {
                ImageAsset::Raster(loaded)
            } else {
                self.rescale(&ImageAsset::Raster(loaded), divisor).await?
            }
        };

        info!(format = %asset.format(), data_url = asset.is_data_url(), "Asset converted");
        Ok(asset)
    }

    /// Shrink a raster asset by `divisor`, returning a new asset in the
    /// output format. A divisor of 1 returns an identical copy.
    #[instrument(skip(self, asset), fields(format = %asset.format()))]
    pub async fn rescale(
        &self,
        asset: &ImageAsset,
        divisor: ResolutionDivisor,
    ) -> Result<ImageAsset> {
        match asset {
            ImageAsset::Raster(raster) => {
                let content =
                    rescale(&self.codec, &raster.content, divisor, self.raster_output).await?;
                Ok(ImageAsset::Raster(RasterImage { content }))
            }
            ImageAsset::Vector(_) => Err(BildwerkError::UnsupportedFormat(
                "vector assets are resolution independent and cannot be rescaled".into(),
            )),
        }
    }

    /// Flatten `text_layer` onto `base`, returning a new single-layer asset.
    /// Both inputs are left untouched.
    #[instrument(skip_all)]
    pub async fn add_text_layer(
        &self,
        base: &ImageAsset,
        text_layer: &ImageAsset,
    ) -> Result<ImageAsset> {
        let (ImageAsset::Raster(base), ImageAsset::Raster(text_layer)) = (base, text_layer) else {
            return Err(BildwerkError::Decode(
                "only raster layers can be composited".into(),
            ));
        };
        let content = composite(
            &self.codec,
            &base.content,
            &text_layer.content,
            self.raster_output,
        )
        .await?;
        debug!(len = content.base64().len(), "Layers flattened");
        Ok(ImageAsset::Raster(RasterImage { content }))
    }
}
