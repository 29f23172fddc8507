// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content providers — named-entry lookup inside a project archive.
//
// The converter never touches the file system itself. It asks a provider for
// `<asset-id>.<format>` and receives either text or raw bytes, depending on
// how the provider stores its entries.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;

use bildwerk_core::error::{BildwerkError, Result};
use tracing::{debug, instrument};
use zip::ZipArchive;
use zip::result::ZipError;

/// Upper bound on the buffer reserved up front for a zip entry.
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

/// Content of one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// The provider already decoded the entry as text.
    Text(String),
    /// Raw entry bytes.
    Bytes(Vec<u8>),
}

impl Entry {
    /// Text view of the entry. Byte entries must be valid UTF-8.
    pub fn into_text(self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Bytes(bytes) => String::from_utf8(bytes).map_err(|err| {
                BildwerkError::MalformedVector(format!("entry is not valid UTF-8: {err}"))
            }),
        }
    }

    /// Byte view of the entry. Text entries are returned as their UTF-8 bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(text) => text.into_bytes(),
            Self::Bytes(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Bytes(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Source of named entries, typically an opened project archive.
pub trait ContentProvider: Send + Sync {
    /// Look up an entry by its full name. Returns `Ok(None)` when the entry
    /// does not exist.
    fn entry(&self, name: &str) -> Result<Option<Entry>>;

    /// Look up an entry that must exist.
    fn require(&self, name: &str) -> Result<Entry> {
        self.entry(name)?
            .ok_or_else(|| BildwerkError::AssetNotFound(name.to_string()))
    }
}

/// Entries held in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    entries: HashMap<String, Entry>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: Entry) -> &mut Self {
        self.entries.insert(name.into(), entry);
        self
    }

    pub fn insert_text(&mut self, name: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.insert(name, Entry::Text(text.into()))
    }

    pub fn insert_bytes(
        &mut self,
        name: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> &mut Self {
        self.insert(name, Entry::Bytes(bytes.into()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ContentProvider for MemoryProvider {
    fn entry(&self, name: &str) -> Result<Option<Entry>> {
        Ok(self.entries.get(name).cloned())
    }
}

/// Provider over a zipped project archive held in memory.
///
/// Lookups clone the archive handle, which only bumps reference counts, so a
/// single provider can serve concurrent conversions.
#[derive(Debug, Clone)]
pub struct ZipProvider {
    archive: ZipArchive<Cursor<Arc<[u8]>>>,
}

impl ZipProvider {
    /// Read the central directory of an in-memory archive.
    #[instrument(skip(data))]
    pub fn from_bytes(data: impl Into<Arc<[u8]>>) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(data.into()))
            .map_err(|err| BildwerkError::Archive(err.to_string()))?;
        debug!(entries = archive.len(), "Project archive opened");
        Ok(Self { archive })
    }

    /// Load a project archive from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(data)
    }

    /// Number of entries in the archive.
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }
}

impl ContentProvider for ZipProvider {
    fn entry(&self, name: &str) -> Result<Option<Entry>> {
        let mut archive = self.archive.clone();
        let mut file = match archive.by_name(name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(err) => return Err(BildwerkError::Archive(format!("{name}: {err}"))),
        };
        // The declared size comes from the archive header and is untrusted.
        let capacity = file.size().min(MAX_PREALLOC) as usize;
        let mut data = Vec::with_capacity(capacity);
        file.read_to_end(&mut data)?;
        Ok(Some(Entry::Bytes(data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn text_and_bytes_views_agree() {
        let text = Entry::Text("<svg/>".into());
        let bytes = Entry::Bytes(b"<svg/>".to_vec());
        assert_eq!(text.clone().into_bytes(), bytes.clone().into_bytes());
        assert_eq!(text.into_text().unwrap(), bytes.into_text().unwrap());
    }

    #[test]
    fn invalid_utf8_is_malformed_vector() {
        let err = Entry::Bytes(vec![0xff, 0xfe, 0x00]).into_text().unwrap_err();
        assert!(matches!(err, BildwerkError::MalformedVector(_)));
    }

    #[test]
    fn memory_provider_lookup() {
        let mut provider = MemoryProvider::new();
        provider
            .insert_text("logo.svg", "<svg/>")
            .insert_bytes("sprite.png", vec![1, 2, 3]);

        assert_eq!(provider.len(), 2);
        assert_eq!(
            provider.entry("sprite.png").unwrap(),
            Some(Entry::Bytes(vec![1, 2, 3]))
        );
        assert_eq!(provider.entry("missing.svg").unwrap(), None);
    }

    #[test]
    fn require_reports_missing_entry_name() {
        let provider = MemoryProvider::new();
        match provider.require("missing.svg") {
            Err(BildwerkError::AssetNotFound(name)) => assert_eq!(name, "missing.svg"),
            other => panic!("expected AssetNotFound, got {other:?}"),
        }
    }

    #[test]
    fn zip_provider_reads_entries_as_bytes() {
        let data = build_zip(&[
            ("logo.svg", b"<svg/>".as_slice()),
            ("a1.png", [9u8, 8, 7].as_slice()),
        ]);
        let provider = ZipProvider::from_bytes(data).unwrap();

        assert_eq!(provider.len(), 2);
        assert_eq!(
            provider.entry("logo.svg").unwrap(),
            Some(Entry::Bytes(b"<svg/>".to_vec()))
        );
        assert_eq!(provider.entry("a1.png").unwrap(), Some(Entry::Bytes(vec![9, 8, 7])));
        assert_eq!(provider.entry("nope.png").unwrap(), None);
    }

    #[test]
    fn zip_provider_ignores_inflated_size_header() {
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("a1.png", options).unwrap();
        writer.write_all(&[1, 2, 3]).unwrap();
        let mut data = writer.finish().unwrap().into_inner();

        // Claim a ~4 GiB uncompressed size in the central directory record.
        let central = data
            .windows(4)
            .position(|window| window == [0x50, 0x4b, 0x01, 0x02])
            .unwrap();
        data[central + 24..central + 28].copy_from_slice(&0xffff_fff0u32.to_le_bytes());

        let provider = ZipProvider::from_bytes(data).unwrap();
        match provider.entry("a1.png") {
            Ok(Some(entry)) => assert_eq!(entry, Entry::Bytes(vec![1, 2, 3])),
            Ok(None) => panic!("entry vanished"),
            Err(err) => assert!(matches!(err, BildwerkError::Archive(_) | BildwerkError::Io(_))),
        }
    }

    #[test]
    fn zip_provider_rejects_garbage() {
        let err = ZipProvider::from_bytes(b"definitely not a zip".to_vec()).unwrap_err();
        assert!(matches!(err, BildwerkError::Archive(_)));
    }
}
