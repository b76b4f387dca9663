//! Atlas assembly engine: turns directories of sprites into packed atlas
//! images plus per-tile metadata.
//!
//! - Loading: glob expansion, optional alpha trim, SHA-256 content dedup
//! - Packing: any [`BinPacker`]; a multi-bin MaxRects packer is built in
//! - Compositing: rotation-aware blit, 1px edge bleed, optional debug outlines
//! - Metadata: one document per bin, compact JSON or CBOR by file extension
//!
//! Quick example:
//! ```ignore
//! use sprite_atlas_core::{BuildOptions, RunConfig, RunPaths, run};
//! # fn main() -> anyhow::Result<()> {
//! let path = std::path::Path::new("assets/atlas.json");
//! let cfg = RunConfig::from_json(&std::fs::read_to_string(path)?)?;
//! let paths = RunPaths::for_config_file(path, &cfg);
//! let out = run(&cfg, &paths, &BuildOptions::default())?;
//! println!("{}", out.stats().summary());
//! # Ok(()) }
//! ```

pub mod anchors;
pub mod compositing;
pub mod config;
pub mod error;
pub mod export;
pub mod loader;
pub mod model;
pub mod packer;
pub mod pipeline;
pub mod trim;

pub use config::*;
pub use error::*;
pub use export::*;
pub use model::*;
pub use packer::*;
pub use pipeline::*;

/// Convenience prelude for common types and functions.
/// Importing `sprite_atlas_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::config::{AnchorSpec, DirOptions, DirSpec, MaxRectsHeuristic, RunConfig};
    pub use crate::export::{AtlasMetadata, MetadataFormat, TileEntry};
    pub use crate::loader::{ImageSet, LoadJob};
    pub use crate::model::{Anchor, AtlasStats, Bin, ImageRecord, Placement, Rect, Size};
    pub use crate::packer::{BinPacker, PackItem, PackOptions, PackedBin, PackedRect};
    pub use crate::{AtlasOutput, BuildOptions, RunPaths, build_atlas, run};
}
