use crate::error::{AtlasError, Result};
use crate::loader::ImageSet;
use crate::model::{Bin, Placement, Point};
use tracing::{debug, instrument};

pub mod maxrects;

/// An item handed to a [`BinPacker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackItem {
    pub id: usize,
    pub width: u32,
    pub height: u32,
}

/// Where a packer put an item. Size is implied by the item and `rotated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedRect {
    pub id: usize,
    pub x: u32,
    pub y: u32,
    pub rotated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedBin {
    pub width: u32,
    pub height: u32,
    pub rects: Vec<PackedRect>,
}

/// Packer options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackOptions {
    /// Shrink each bin to the bounding box of its content.
    pub smart: bool,
    /// Round bin dimensions up to powers of two.
    pub power_of_two: bool,
    /// Force bins to be square (max(width, height)).
    pub square: bool,
    pub allow_rotation: bool,
    /// Pixels kept free around each bin's edge.
    pub border: u32,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            smart: true,
            power_of_two: false,
            square: false,
            allow_rotation: true,
            border: 0,
        }
    }
}

/// A rectangle packer producing one or more bins.
///
/// Implementations must not overlap items, must keep `padding` pixels
/// between neighbours, and must keep every item inside its bin. Output must
/// be deterministic for identical input, since atlas reproducibility rests
/// on it.
pub trait BinPacker {
    fn pack(
        &self,
        items: &[PackItem],
        max_width: u32,
        max_height: u32,
        padding: u32,
        options: &PackOptions,
    ) -> Result<Vec<PackedBin>>;
}

#[instrument(skip_all, fields(records = set.len()))]
/// Packs every record in `set` and writes placements back onto the records.
///
/// Each packer id is the record's index. Returned bins carry an empty
/// `image` reference; the caller names the output files.
pub fn pack_records(
    set: &mut ImageSet,
    packer: &dyn BinPacker,
    max_width: u32,
    max_height: u32,
    padding: u32,
    options: &PackOptions,
) -> Result<Vec<Bin>> {
    if set.is_empty() {
        return Err(AtlasError::Empty);
    }

    let usable_w = max_width.saturating_sub(options.border.saturating_mul(2));
    let usable_h = max_height.saturating_sub(options.border.saturating_mul(2));
    let items: Vec<PackItem> = set
        .records()
        .iter()
        .enumerate()
        .map(|(id, r)| PackItem {
            id,
            width: r.rect.w,
            height: r.rect.h,
        })
        .collect();
    for (item, rec) in items.iter().zip(set.records()) {
        let fits = (item.width <= usable_w && item.height <= usable_h)
            || (options.allow_rotation && item.height <= usable_w && item.width <= usable_h);
        if !fits {
            return Err(AtlasError::SpriteTooLarge {
                key: rec.file.clone(),
                width: item.width,
                height: item.height,
                max_width,
                max_height,
            });
        }
    }

    let packed = packer.pack(&items, max_width, max_height, padding, options)?;

    let records = set.records_mut();
    let mut bins = Vec::with_capacity(packed.len());
    for (index, pb) in packed.into_iter().enumerate() {
        let mut placements = Vec::with_capacity(pb.rects.len());
        for pr in pb.rects {
            let rec = records
                .get_mut(pr.id)
                .ok_or(AtlasError::UnknownPlacement { id: pr.id })?;
            if rec.bin.is_some() {
                return Err(AtlasError::DuplicatePlacement {
                    key: rec.file.clone(),
                });
            }
            rec.rotated = pr.rotated;
            let (width, height) = rec.placed_size();
            if pr.x.saturating_add(width) > pb.width || pr.y.saturating_add(height) > pb.height {
                return Err(AtlasError::PlacementOutOfBounds {
                    key: rec.file.clone(),
                    x: pr.x,
                    y: pr.y,
                    width,
                    height,
                    bin_width: pb.width,
                    bin_height: pb.height,
                });
            }
            rec.bin = Some(index);
            rec.tex_pos = Some(Point { x: pr.x, y: pr.y });
            debug!(file = %rec.file, bin = index, x = pr.x, y = pr.y, rot = pr.rotated, "placed");
            placements.push(Placement {
                record: pr.id,
                source: rec.file.clone(),
                x: pr.x,
                y: pr.y,
                width,
                height,
                rotated: pr.rotated,
            });
        }
        bins.push(Bin {
            index,
            width: pb.width,
            height: pb.height,
            placements,
            image: String::new(),
        });
    }

    if let Some(rec) = records.iter().find(|r| r.bin.is_none()) {
        return Err(AtlasError::UnplacedSprite {
            key: rec.file.clone(),
        });
    }
    Ok(bins)
}
