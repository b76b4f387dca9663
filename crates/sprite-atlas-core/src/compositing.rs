use crate::model::{Bin, ImageRecord, Rect};
use image::{RgbaImage, imageops};
use tracing::{instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Colour of the debug placement outlines (opaque red).
pub const OUTLINE_COLOR: [u8; 4] = [0xFF, 0x00, 0x00, 0xFF];
/// Width of the debug placement outlines in pixels.
pub const OUTLINE_WIDTH: u32 = 2;

#[inline]
fn px_index(x: u32, y: u32, stride_px: u32) -> usize {
    (y as usize * stride_px as usize + x as usize) * 4
}

/// Copy `src` (row-major RGBA8, `dst.w` pixels per row) into `canvas` at `dst`.
///
/// Source pixels past the end of `src` are skipped, as are destination
/// pixels outside the canvas. Never panics on a short buffer.
pub fn blit(canvas: &mut RgbaImage, src: &[u8], dst: &Rect) {
    let (cw, ch) = canvas.dimensions();
    let buf: &mut [u8] = canvas;
    for y in 0..dst.h {
        for x in 0..dst.w {
            let si = px_index(x, y, dst.w);
            if si + 4 > src.len() {
                continue;
            }
            let (tx, ty) = (dst.x + x, dst.y + y);
            if tx >= cw || ty >= ch {
                continue;
            }
            let di = px_index(tx, ty, cw);
            buf[di..di + 4].copy_from_slice(&src[si..si + 4]);
        }
    }
}

/// Canvas view with signed coordinates so edges at 0 can be addressed as -1.
struct Surface<'a> {
    buf: &'a mut [u8],
    w: i64,
    h: i64,
}

impl Surface<'_> {
    fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && x < self.w && y >= 0 && y < self.h
    }

    fn index(&self, x: i64, y: i64) -> usize {
        ((y * self.w + x) * 4) as usize
    }

    /// Copies one pixel; a no-op if either end is off the surface.
    fn copy_px(&mut self, to: (i64, i64), from: (i64, i64)) {
        if !self.in_bounds(to.0, to.1) || !self.in_bounds(from.0, from.1) {
            return;
        }
        let (ti, fi) = (self.index(to.0, to.1), self.index(from.0, from.1));
        self.buf.copy_within(fi..fi + 4, ti);
    }

    fn set_px(&mut self, at: (i64, i64), color: [u8; 4]) {
        if self.in_bounds(at.0, at.1) {
            let i = self.index(at.0, at.1);
            self.buf[i..i + 4].copy_from_slice(&color);
        }
    }
}

fn surface(canvas: &mut RgbaImage) -> Surface<'_> {
    let (w, h) = canvas.dimensions();
    Surface {
        buf: canvas,
        w: w as i64,
        h: h as i64,
    }
}

/// Extend the edge pixels of `rect` one pixel outward.
///
/// Corners go to their diagonal neighbours, then every edge pixel to its
/// exterior neighbour. Anything falling outside the canvas is skipped.
pub fn bleed(canvas: &mut RgbaImage, rect: &Rect) {
    if rect.w == 0 || rect.h == 0 {
        return;
    }
    let mut s = surface(canvas);
    let (x0, y0) = (rect.x as i64, rect.y as i64);
    let (x1, y1) = (x0 + rect.w as i64 - 1, y0 + rect.h as i64 - 1);

    s.copy_px((x0 - 1, y0 - 1), (x0, y0));
    s.copy_px((x1 + 1, y1 + 1), (x1, y1));
    s.copy_px((x1 + 1, y0 - 1), (x1, y0));
    s.copy_px((x0 - 1, y1 + 1), (x0, y1));

    for x in x0..=x1 {
        s.copy_px((x, y0 - 1), (x, y0));
        s.copy_px((x, y1 + 1), (x, y1));
    }
    for y in y0..=y1 {
        s.copy_px((x0 - 1, y), (x0, y));
        s.copy_px((x1 + 1, y), (x1, y));
    }
}

/// Draw a `width`-pixel outline just inside `rect`.
pub fn outline(canvas: &mut RgbaImage, rect: &Rect, color: [u8; 4], width: u32) {
    let mut s = surface(canvas);
    let (x0, y0) = (rect.x as i64, rect.y as i64);
    let (x1, y1) = (x0 + rect.w as i64, y0 + rect.h as i64);
    let t = width as i64;
    for y in y0..y1 {
        for x in x0..x1 {
            let edge = x < x0 + t || x >= x1 - t || y < y0 + t || y >= y1 - t;
            if edge {
                s.set_px((x, y), color);
            }
        }
    }
}

#[instrument(skip_all, fields(bin = bin.index, placements = bin.placements.len()))]
/// Composite one bin: blit every placement, then bleed every placement.
///
/// Rotated placements are re-encoded (90° clockwise) up front; blitting
/// only starts once all of them are ready. With `debug` set, placement
/// outlines are drawn last.
pub fn render_bin(bin: &Bin, records: &[ImageRecord], debug: bool) -> RgbaImage {
    let rotate = |p: &crate::model::Placement| -> Option<RgbaImage> {
        if !p.rotated {
            return None;
        }
        records.get(p.record).map(|r| imageops::rotate90(&*r.pixels))
    };
    #[cfg(feature = "parallel")]
    let rotated: Vec<Option<RgbaImage>> = bin.placements.par_iter().map(rotate).collect();
    #[cfg(not(feature = "parallel"))]
    let rotated: Vec<Option<RgbaImage>> = bin.placements.iter().map(rotate).collect();

    let mut canvas = RgbaImage::new(bin.width, bin.height);
    for (p, rot) in bin.placements.iter().zip(&rotated) {
        let Some(rec) = records.get(p.record) else {
            warn!(source = %p.source, record = p.record, "placement without record");
            continue;
        };
        let src: &[u8] = match rot {
            Some(img) => img.as_raw(),
            None => rec.pixels.as_raw(),
        };
        blit(&mut canvas, src, &p.rect());
    }

    for p in &bin.placements {
        bleed(&mut canvas, &p.rect());
    }

    if debug {
        for p in &bin.placements {
            outline(&mut canvas, &p.rect(), OUTLINE_COLOR, OUTLINE_WIDTH);
        }
    }
    canvas
}
