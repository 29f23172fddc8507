// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Bildwerk asset converter.

use serde::{Deserialize, Serialize};

use crate::error::{BildwerkError, Result};

/// Data formats an image asset can be stored in inside a project archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// Vector markup (needs dialect normalization).
    Svg,
    Png,
    Jpg,
    Gif,
    Bmp,
}

impl DataFormat {
    /// Lowercase tag used in archive entry names (`<asset-id>.<tag>`).
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
        }
    }

    /// MIME type string used in data URLs.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Svg => "image/svg+xml",
            Self::Png => "image/png",
            Self::Jpg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
        }
    }

    /// Infer the data format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "svg" => Some(Self::Svg),
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpg),
            "gif" => Some(Self::Gif),
            "bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    /// Infer the data format from a MIME type (the head of a data URL).
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.to_ascii_lowercase().as_str() {
            "image/svg+xml" => Some(Self::Svg),
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpg),
            "image/gif" => Some(Self::Gif),
            "image/bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Self::Svg)
    }

    /// Whether re-encoding to this format preserves every pixel exactly.
    pub fn is_lossless_raster(&self) -> bool {
        matches!(self, Self::Png | Self::Bmp)
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for DataFormat {
    type Err = BildwerkError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s).ok_or_else(|| BildwerkError::UnsupportedFormat(s.to_string()))
    }
}

/// Vector markup dialect, selected by the authoring-tool version that
/// produced the asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Markup written by the version-2 editor (Flash era).
    Legacy,
    /// Markup written by every later editor.
    #[default]
    Current,
}

impl Dialect {
    /// Authoring-tool version whose markup needs the legacy fixups.
    pub const LEGACY_VERSION: u32 = 2;

    pub fn from_authoring_version(version: u32) -> Self {
        if version == Self::LEGACY_VERSION {
            Self::Legacy
        } else {
            Self::Current
        }
    }
}

/// Factor by which raster pixel dimensions are reduced.
///
/// Always positive and finite. A divisor of exactly 1 is the identity.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ResolutionDivisor(f64);

impl ResolutionDivisor {
    pub const IDENTITY: Self = Self(1.0);

    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() || value <= 0.0 {
            return Err(BildwerkError::InvalidScale(format!(
                "resolution divisor must be a positive number, got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> f64 {
        self.0
    }

    pub fn is_identity(&self) -> bool {
        self.0 == 1.0
    }

    /// Largest pixel count a rescale may produce (a 16384 x 16384 canvas).
    pub const MAX_TARGET_PIXELS: u64 = 1 << 28;

    /// Target dimensions `floor(width / d) x floor(height / d)`.
    ///
    /// Fails rather than producing a degenerate buffer when either side
    /// resolves to zero, or an unallocatable one when the result exceeds
    /// [`Self::MAX_TARGET_PIXELS`].
    pub fn target_dimensions(&self, width: u32, height: u32) -> Result<(u32, u32)> {
        let target_w = (f64::from(width) / self.0).floor();
        let target_h = (f64::from(height) / self.0).floor();
        if target_w < 1.0 || target_h < 1.0 {
            return Err(BildwerkError::InvalidScale(format!(
                "{width}x{height} divided by {} yields {target_w}x{target_h}",
                self.0
            )));
        }
        if target_w * target_h > Self::MAX_TARGET_PIXELS as f64 {
            return Err(BildwerkError::InvalidScale(format!(
                "{width}x{height} divided by {} yields {target_w}x{target_h}, \
                 more than {} pixels",
                self.0,
                Self::MAX_TARGET_PIXELS
            )));
        }
        // Both sides are at most MAX_TARGET_PIXELS here, well inside u32.
        Ok((target_w as u32, target_h as u32))
    }
}

impl Default for ResolutionDivisor {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl TryFrom<f64> for ResolutionDivisor {
    type Error = BildwerkError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ResolutionDivisor> for f64 {
    fn from(divisor: ResolutionDivisor) -> Self {
        divisor.0
    }
}

impl std::fmt::Display for ResolutionDivisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Archive entry name for an asset: `<identifier>.<format>`.
pub fn entry_name(identifier: &str, format: DataFormat) -> String {
    format!("{identifier}.{}", format.extension())
}
