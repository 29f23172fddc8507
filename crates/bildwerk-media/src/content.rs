// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Encoded content — a payload together with the data format it declares.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::{DataFormat, entry_name};
use tracing::{debug, instrument};

use crate::provider::ContentProvider;

/// Representation the payload is currently held in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Plain base64 of the raw bytes.
    Base64(String),
    /// Complete `data:<mime>;base64,<payload>` URL.
    DataUrl(String),
}

/// A byte payload plus its declared format.
///
/// Fields are private: the format tag and the payload are only ever replaced
/// together, through one of the constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedContent {
    format: DataFormat,
    payload: Payload,
}

impl EncodedContent {
    /// Wrap raw bytes as a plain base64 payload.
    pub fn from_bytes(format: DataFormat, bytes: &[u8]) -> Self {
        Self {
            format,
            payload: Payload::Base64(STANDARD.encode(bytes)),
        }
    }

    /// Wrap raw bytes as a data-URL payload.
    pub fn data_url_from_bytes(format: DataFormat, bytes: &[u8]) -> Self {
        let url = format!("data:{};base64,{}", format.mime_type(), STANDARD.encode(bytes));
        Self {
            format,
            payload: Payload::DataUrl(url),
        }
    }

    /// Adopt an existing `data:<mime>;base64,...` URL. The format is taken
    /// from the MIME type.
    pub fn from_data_url(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let (head, _) = url
            .split_once(',')
            .ok_or_else(|| BildwerkError::Decode("data URL has no payload".into()))?;
        let mime = head
            .strip_prefix("data:")
            .and_then(|rest| rest.strip_suffix(";base64"))
            .ok_or_else(|| {
                BildwerkError::Decode(format!("not a base64 data URL: {head}"))
            })?;
        let format = DataFormat::from_mime_type(mime)
            .ok_or_else(|| BildwerkError::UnsupportedFormat(mime.to_string()))?;
        Ok(Self {
            format,
            payload: Payload::DataUrl(url),
        })
    }

    /// Generic byte load: fetch `<identifier>.<format>` from the provider and
    /// hold it as plain base64 under the declared format.
    #[instrument(skip(provider))]
    pub fn load_generic(
        provider: &dyn ContentProvider,
        identifier: &str,
        format: DataFormat,
    ) -> Result<Self> {
        let name = entry_name(identifier, format);
        let bytes = provider.require(&name)?.into_bytes();
        debug!(entry = %name, len = bytes.len(), "Entry loaded");
        Ok(Self::from_bytes(format, &bytes))
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn is_data_url(&self) -> bool {
        matches!(self.payload, Payload::DataUrl(_))
    }

    /// The base64 portion of the payload, whichever representation is held.
    pub fn base64(&self) -> &str {
        match &self.payload {
            Payload::Base64(data) => data,
            Payload::DataUrl(url) => url.split_once(',').map_or("", |(_, data)| data),
        }
    }

    /// Canonical data-URL view combining the format and the base64 payload.
    pub fn to_data_url(&self) -> String {
        match &self.payload {
            Payload::DataUrl(url) => url.clone(),
            Payload::Base64(data) => format!("data:{};base64,{}", self.format.mime_type(), data),
        }
    }

    /// Raw-bytes view.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.base64())
            .map_err(|err| BildwerkError::Decode(format!("corrupt base64 payload: {err}")))
    }
}
