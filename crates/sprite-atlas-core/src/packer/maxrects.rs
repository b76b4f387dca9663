use super::{BinPacker, PackItem, PackOptions, PackedBin, PackedRect};
use crate::config::MaxRectsHeuristic;
use crate::error::{AtlasError, Result};
use crate::model::Rect;
use tracing::debug;

/// A single MaxRects bin: a free list of maximal empty rectangles.
///
/// Each insert reserves `w + padding` by `h + padding`. The free area is
/// `max + padding` wide so that the padding of the last column or row can
/// hang past the bin edge.
pub struct MaxRectsBin {
    area: Rect,
    free: Vec<Rect>,
    used: Vec<Rect>,
    padding: u32,
    allow_rotation: bool,
    heuristic: MaxRectsHeuristic,
    content_right: u32,
    content_bottom: u32,
}

impl MaxRectsBin {
    pub fn new(
        max_width: u32,
        max_height: u32,
        padding: u32,
        options: &PackOptions,
        heuristic: MaxRectsHeuristic,
    ) -> Self {
        let border = options.border;
        let w = max_width.saturating_add(padding).saturating_sub(border.saturating_mul(2));
        let h = max_height.saturating_add(padding).saturating_sub(border.saturating_mul(2));
        let area = Rect::new(border, border, w, h);
        Self {
            area,
            free: vec![area],
            used: Vec::new(),
            padding,
            allow_rotation: options.allow_rotation,
            heuristic,
            content_right: 0,
            content_bottom: 0,
        }
    }

    /// Places a `w x h` item, returning its content rect (post-rotation
    /// size) and whether it was rotated.
    pub fn insert(&mut self, w: u32, h: u32) -> Option<(Rect, bool)> {
        let (slot, rotated) =
            self.find_position(w.saturating_add(self.padding), h.saturating_add(self.padding))?;
        self.place_rect(&slot);
        let (cw, ch) = if rotated { (h, w) } else { (w, h) };
        let content = Rect::new(slot.x, slot.y, cw, ch);
        self.content_right = self.content_right.max(content.right());
        self.content_bottom = self.content_bottom.max(content.bottom());
        Some((content, rotated))
    }

    /// Exclusive right/bottom extent of everything placed so far.
    pub fn content_extent(&self) -> (u32, u32) {
        (self.content_right, self.content_bottom)
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    pub fn free_list_len(&self) -> usize {
        self.free.len()
    }

    fn place_rect(&mut self, node: &Rect) {
        let mut next: Vec<Rect> = Vec::with_capacity(self.free.len() + 4);
        for fr in &self.free {
            if !fr.intersects(node) {
                next.push(*fr);
                continue;
            }
            // left / right slabs span the free rect's full height
            if node.x > fr.x {
                next.push(Rect::new(fr.x, fr.y, node.x - fr.x, fr.h));
            }
            if node.right() < fr.right() {
                next.push(Rect::new(node.right(), fr.y, fr.right() - node.right(), fr.h));
            }
            // top / bottom slabs span its full width
            if node.y > fr.y {
                next.push(Rect::new(fr.x, fr.y, fr.w, node.y - fr.y));
            }
            if node.bottom() < fr.bottom() {
                next.push(Rect::new(fr.x, node.bottom(), fr.w, fr.bottom() - node.bottom()));
            }
        }
        self.free = next;
        self.prune_free_list();
        self.used.push(*node);
    }

    /// Drops free rects contained in another free rect.
    fn prune_free_list(&mut self) {
        let mut i = 0;
        while i < self.free.len() {
            let a = self.free[i];
            let mut remove_i = false;
            let mut j = i + 1;
            while j < self.free.len() {
                let b = self.free[j];
                if b.contains(&a) {
                    remove_i = true;
                    break;
                }
                if a.contains(&b) {
                    self.free.remove(j);
                    continue;
                }
                j += 1;
            }
            if remove_i {
                self.free.remove(i);
            } else {
                i += 1;
            }
        }
    }

    fn score(&self, fr: &Rect, w: u32, h: u32) -> (i64, i64) {
        let leftover_h = fr.w as i64 - w as i64;
        let leftover_v = fr.h as i64 - h as i64;
        let short_fit = leftover_h.abs().min(leftover_v.abs());
        let long_fit = leftover_h.abs().max(leftover_v.abs());
        let area_fit = i64::try_from(fr.area() - w as u64 * h as u64).unwrap_or(i64::MAX);
        match self.heuristic {
            MaxRectsHeuristic::BestAreaFit => (area_fit, short_fit),
            MaxRectsHeuristic::BestShortSideFit => (short_fit, long_fit),
            MaxRectsHeuristic::BestLongSideFit => (long_fit, short_fit),
            MaxRectsHeuristic::BottomLeft => (fr.y as i64 + h as i64, fr.x as i64),
            MaxRectsHeuristic::ContactPoint => {
                // larger contact is better; negate for minimization
                let contact = self.contact_point_score(&Rect::new(fr.x, fr.y, w, h));
                (-i64::try_from(contact).unwrap_or(i64::MAX), area_fit)
            }
        }
    }

    fn find_position(&self, w: u32, h: u32) -> Option<(Rect, bool)> {
        // (score1, score2, y, x) compared lexicographically
        let mut best: Option<((i64, i64, u32, u32), Rect, bool)> = None;
        let mut consider = |key: (i64, i64, u32, u32), rect: Rect, rotated: bool| {
            if best.as_ref().is_none_or(|(k, _, _)| key < *k) {
                best = Some((key, rect, rotated));
            }
        };

        for fr in &self.free {
            if fr.w >= w && fr.h >= h {
                if fr.w == w && fr.h == h {
                    return Some((Rect::new(fr.x, fr.y, w, h), false));
                }
                let (s1, s2) = self.score(fr, w, h);
                consider((s1, s2, fr.y, fr.x), Rect::new(fr.x, fr.y, w, h), false);
            }
            if self.allow_rotation && w != h && fr.w >= h && fr.h >= w {
                if fr.w == h && fr.h == w {
                    return Some((Rect::new(fr.x, fr.y, h, w), true));
                }
                let (s1, s2) = self.score(fr, h, w);
                consider((s1, s2, fr.y, fr.x), Rect::new(fr.x, fr.y, h, w), true);
            }
        }
        best.map(|(_, rect, rotated)| (rect, rotated))
    }

    fn contact_point_score(&self, node: &Rect) -> u64 {
        let mut score = 0u64;
        if node.x == self.area.x || node.right() == self.area.right() {
            score += node.h as u64;
        }
        if node.y == self.area.y || node.bottom() == self.area.bottom() {
            score += node.w as u64;
        }
        for u in &self.used {
            if node.x == u.right() || u.x == node.right() {
                score += overlap_1d(node.y, node.bottom(), u.y, u.bottom()) as u64;
            }
            if node.y == u.bottom() || u.y == node.bottom() {
                score += overlap_1d(node.x, node.right(), u.x, u.right()) as u64;
            }
        }
        score
    }
}

fn overlap_1d(a1: u32, a2: u32, b1: u32, b2: u32) -> u32 {
    a2.min(b2).saturating_sub(a1.max(b1))
}

fn next_pow2(v: u32) -> u32 {
    v.max(1).checked_next_power_of_two().unwrap_or(u32::MAX)
}

/// Multi-bin MaxRects packer.
///
/// Items are sorted by longest side (descending, ties by id) and poured
/// into bins; whatever does not fit opens the next bin.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxRectsPacker {
    pub heuristic: MaxRectsHeuristic,
}

impl MaxRectsPacker {
    pub fn new(heuristic: MaxRectsHeuristic) -> Self {
        Self { heuristic }
    }

    fn bin_size(bin: &MaxRectsBin, max_width: u32, max_height: u32, options: &PackOptions) -> (u32, u32) {
        let (mut w, mut h) = if options.smart {
            let (right, bottom) = bin.content_extent();
            (right.saturating_add(options.border), bottom.saturating_add(options.border))
        } else {
            (max_width, max_height)
        };
        if options.power_of_two {
            w = next_pow2(w);
            h = next_pow2(h);
        }
        if options.square {
            let m = w.max(h);
            w = m;
            h = m;
        }
        (w, h)
    }
}

impl BinPacker for MaxRectsPacker {
    fn pack(
        &self,
        items: &[PackItem],
        max_width: u32,
        max_height: u32,
        padding: u32,
        options: &PackOptions,
    ) -> Result<Vec<PackedBin>> {
        if max_width == 0 || max_height == 0 {
            return Err(AtlasError::InvalidDimensions {
                width: max_width,
                height: max_height,
            });
        }

        let mut remaining: Vec<PackItem> = items.to_vec();
        remaining.sort_by(|a, b| {
            b.width
                .max(b.height)
                .cmp(&a.width.max(a.height))
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut bins = Vec::new();
        while !remaining.is_empty() {
            let mut bin = MaxRectsBin::new(max_width, max_height, padding, options, self.heuristic);
            let mut rects = Vec::new();
            remaining.retain(|item| match bin.insert(item.width, item.height) {
                Some((content, rotated)) => {
                    rects.push(PackedRect {
                        id: item.id,
                        x: content.x,
                        y: content.y,
                        rotated,
                    });
                    false
                }
                None => true,
            });

            if bin.is_empty() {
                let item = remaining[0];
                return Err(AtlasError::SpriteTooLarge {
                    key: format!("item {}", item.id),
                    width: item.width,
                    height: item.height,
                    max_width,
                    max_height,
                });
            }

            let (width, height) = Self::bin_size(&bin, max_width, max_height, options);
            debug!(bin = bins.len(), width, height, items = rects.len(), free = bin.free_list_len(), "bin packed");
            bins.push(PackedBin {
                width,
                height,
                rects,
            });
        }
        Ok(bins)
    }
}
