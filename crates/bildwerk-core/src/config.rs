// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Conversion configuration.

use serde::{Deserialize, Serialize};

use crate::error::{BildwerkError, Result};
use crate::types::DataFormat;

/// Settings shared by every conversion a converter performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// DPI the vector oracle uses when resolving absolute units.
    pub vector_dpi: f32,
    /// Format rescaled and composited rasters are re-encoded to.
    pub raster_output: DataFormat,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            vector_dpi: 96.0,
            raster_output: DataFormat::Png,
        }
    }
}

impl ConversionConfig {
    /// Parse and validate a JSON configuration document. Missing fields take
    /// their default values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.raster_output.is_lossless_raster() {
            return Err(BildwerkError::UnsupportedFormat(format!(
                "{} is not a lossless raster output format",
                self.raster_output
            )));
        }
        if !self.vector_dpi.is_finite() || self.vector_dpi <= 0.0 {
            return Err(BildwerkError::InvalidScale(format!(
                "vector DPI must be positive, got {}",
                self.vector_dpi
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ConversionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.raster_output, DataFormat::Png);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = ConversionConfig::from_json(r#"{ "vector_dpi": 72.0 }"#).unwrap();
        assert_eq!(config.vector_dpi, 72.0);
        assert_eq!(config.raster_output, DataFormat::Png);
    }

    #[test]
    fn lossy_output_format_rejected() {
        let err = ConversionConfig::from_json(r#"{ "raster_output": "jpg" }"#).unwrap_err();
        assert!(matches!(err, BildwerkError::UnsupportedFormat(_)));
    }

    #[test]
    fn malformed_json_is_serialization_error() {
        let err = ConversionConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, BildwerkError::Serialization(_)));
    }
}
