use crate::error::{AtlasError, Result};
use crate::model::{Anchor, Bin, ImageRecord, Point, Rect, Size};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Per-tile placement data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TileEntry {
    /// Top-left of the tile within the atlas image.
    pub tex_pos: Point,
    /// Source size before trimming.
    pub src_size: Size,
    pub anchor: Anchor,
    /// Trim rect within the source.
    pub rect: Rect,
    /// Present (and true) only when the tile is stored rotated 90° clockwise.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub rotated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AtlasInfo {
    /// Atlas image file this document describes.
    pub image: String,
    pub size: Size,
}

/// One bin's metadata document: `{ tiles: { file: TileEntry }, metadata }`.
///
/// Tiles are keyed by stage-relative file path in sorted order, so both
/// encodings are byte-stable for identical input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AtlasMetadata {
    pub tiles: BTreeMap<String, TileEntry>,
    pub metadata: AtlasInfo,
}

/// Sidecar encodings, selected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataFormat {
    /// `.json`: compact JSON.
    Json,
    /// `.cb` / `.cbor`: CBOR.
    Cbor,
}

impl MetadataFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(Self::Json),
            "cb" | "cbor" => Ok(Self::Cbor),
            _ => Err(AtlasError::UnsupportedMetadataFormat(path.display().to_string())),
        }
    }
}

/// Build the metadata document for `bin`.
pub fn bin_metadata(bin: &Bin, records: &[ImageRecord]) -> AtlasMetadata {
    let mut tiles = BTreeMap::new();
    for p in &bin.placements {
        let Some(rec) = records.get(p.record) else {
            continue;
        };
        tiles.insert(
            p.source.clone(),
            TileEntry {
                tex_pos: Point { x: p.x, y: p.y },
                src_size: rec.src_size,
                anchor: rec.anchor,
                rect: rec.rect,
                rotated: p.rotated,
            },
        );
    }
    AtlasMetadata {
        tiles,
        metadata: AtlasInfo {
            image: bin.image.clone(),
            size: Size::new(bin.width, bin.height),
        },
    }
}

impl AtlasMetadata {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| AtlasError::Encode(e.to_string()))
    }

    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| AtlasError::Decode(e.to_string()))
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| AtlasError::Encode(e.to_string()))?;
        Ok(buf)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| AtlasError::Decode(e.to_string()))
    }

    pub fn encode(&self, format: MetadataFormat) -> Result<Vec<u8>> {
        match format {
            MetadataFormat::Json => self.to_json().map(String::into_bytes),
            MetadataFormat::Cbor => self.to_cbor(),
        }
    }

    pub fn decode(bytes: &[u8], format: MetadataFormat) -> Result<Self> {
        match format {
            MetadataFormat::Json => {
                let s = std::str::from_utf8(bytes).map_err(|e| AtlasError::Decode(e.to_string()))?;
                Self::from_json(s)
            }
            MetadataFormat::Cbor => Self::from_cbor(bytes),
        }
    }

    /// Encode according to `path`'s extension and write it.
    pub fn write(&self, path: &Path) -> Result<()> {
        let bytes = self.encode(MetadataFormat::from_path(path)?)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let format = MetadataFormat::from_path(path)?;
        Self::decode(&fs::read(path)?, format)
    }
}
