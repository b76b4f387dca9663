use image::RgbaImage;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;

/// Axis-aligned rectangle (pixels). `x,y` is top-left; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    /// Exclusive right edge (`x + w`).
    pub fn right(&self) -> u32 {
        self.x + self.w
    }
    /// Exclusive bottom edge (`y + h`).
    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }
    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }
    /// Returns true if `r` lies fully inside `self`.
    pub fn contains(&self, r: &Rect) -> bool {
        r.x >= self.x && r.y >= self.y && r.right() <= self.right() && r.bottom() <= self.bottom()
    }
    pub fn intersects(&self, r: &Rect) -> bool {
        !(self.x >= r.right() || r.x >= self.right() || self.y >= r.bottom() || r.y >= self.bottom())
    }
}

/// Width/height pair, serialized as `{w, h}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }
}

/// Integer position within a bin, serialized as `{x, y}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

/// Per-sprite reference point carried through to metadata.
///
/// Deserializes from either `{ "x": .., "y": .. }` or `[x, y]`; always
/// serializes as the object form.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Default)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
}

impl Anchor {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl<'de> Deserialize<'de> for Anchor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Object { x: f64, y: f64 },
            Pair([f64; 2]),
        }
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Object { x, y } => Anchor { x, y },
            Repr::Pair([x, y]) => Anchor { x, y },
        })
    }
}

/// SHA-256 over a trimmed sprite's dimensions and RGBA bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash(pub [u8; 32]);

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({self})")
    }
}

/// One loaded sprite.
///
/// Duplicates share `pixels` (same `Arc`) and `rect` with the first record
/// seen for their content hash; `file`, `anchor` and the placement fields are
/// always their own.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    /// Stage-relative path, `/`-separated. Used as the tile key.
    pub file: String,
    /// Trimmed RGBA8 pixels (`rect.w x rect.h`).
    pub pixels: Arc<RgbaImage>,
    /// Pre-trim dimensions.
    pub src_size: Size,
    /// Trim rectangle within the source.
    pub rect: Rect,
    pub hash: ContentHash,
    pub trimmed: bool,
    pub anchor: Anchor,
    pub bin: Option<usize>,
    pub tex_pos: Option<Point>,
    pub rotated: bool,
}

impl ImageRecord {
    /// Clone this record's payload under a different file identity.
    ///
    /// Pixels, geometry and hash carry over; anchor and placement reset.
    pub fn with_identity(&self, file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            pixels: Arc::clone(&self.pixels),
            src_size: self.src_size,
            rect: self.rect,
            hash: self.hash,
            trimmed: self.trimmed,
            anchor: Anchor::default(),
            bin: None,
            tex_pos: None,
            rotated: false,
        }
    }

    /// Size the sprite occupies in the atlas once placed.
    pub fn placed_size(&self) -> (u32, u32) {
        if self.rotated {
            (self.rect.h, self.rect.w)
        } else {
            (self.rect.w, self.rect.h)
        }
    }
}

/// A sprite placed within a bin. `width`/`height` are post-rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Index into the loaded record list.
    pub record: usize,
    pub source: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub rotated: bool,
}

impl Placement {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// One output surface.
#[derive(Debug, Clone)]
pub struct Bin {
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub placements: Vec<Placement>,
    /// Output image reference written into this bin's metadata.
    pub image: String,
}

/// Statistics about atlas packing efficiency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AtlasStats {
    pub num_bins: usize,
    /// Sprites placed across all bins (duplicates included).
    pub num_sprites: usize,
    /// Sprites whose content matched an earlier sprite.
    pub num_duplicates: usize,
    /// Sum of bin width * height.
    pub total_bin_area: u64,
    /// Sum of placement width * height.
    pub used_area: u64,
    /// used_area / total_bin_area (0.0 to 1.0).
    pub occupancy: f64,
    pub num_rotated: usize,
    pub num_trimmed: usize,
}

impl AtlasStats {
    pub fn collect(bins: &[Bin], records: &[ImageRecord], num_duplicates: usize) -> Self {
        let mut num_sprites = 0;
        let mut total_bin_area = 0u64;
        let mut used_area = 0u64;
        let mut num_rotated = 0;
        let mut num_trimmed = 0;

        for bin in bins {
            total_bin_area += bin.width as u64 * bin.height as u64;
            for p in &bin.placements {
                num_sprites += 1;
                used_area += p.rect().area();
                if p.rotated {
                    num_rotated += 1;
                }
                if records.get(p.record).is_some_and(|r| r.trimmed) {
                    num_trimmed += 1;
                }
            }
        }

        let occupancy = if total_bin_area > 0 {
            used_area as f64 / total_bin_area as f64
        } else {
            0.0
        };

        Self {
            num_bins: bins.len(),
            num_sprites,
            num_duplicates,
            total_bin_area,
            used_area,
            occupancy,
            num_rotated,
            num_trimmed,
        }
    }

    /// Returns a human-readable summary of the statistics.
    pub fn summary(&self) -> String {
        format!(
            "Bins: {}, Sprites: {}, Duplicates: {}, Occupancy: {:.2}%, Total Area: {} px², Used Area: {} px², Rotated: {}, Trimmed: {}",
            self.num_bins,
            self.num_sprites,
            self.num_duplicates,
            self.occupancy * 100.0,
            self.total_bin_area,
            self.used_area,
            self.num_rotated,
            self.num_trimmed,
        )
    }

    /// Returns wasted space in pixels.
    pub fn wasted_area(&self) -> u64 {
        self.total_bin_area.saturating_sub(self.used_area)
    }
}
