use crate::model::{Rect, Size};
use image::{RgbaImage, imageops};

/// Pixels and geometry of a sprite after the optional trim step.
#[derive(Debug, Clone)]
pub struct Trimmed {
    /// `rect.w x rect.h` RGBA8 pixels.
    pub pixels: RgbaImage,
    /// Region of the source the pixels came from.
    pub rect: Rect,
    /// Source dimensions before trimming.
    pub src_size: Size,
    /// True if `rect` is smaller than the source.
    pub trimmed: bool,
}

fn row_blank(raw: &[u8], width: u32, y: u32) -> bool {
    let stride = width as usize * 4;
    let start = y as usize * stride;
    raw[start..start + stride].chunks_exact(4).all(|px| px[3] == 0)
}

fn col_blank(raw: &[u8], width: u32, height: u32, x: u32) -> bool {
    (0..height).all(|y| raw[(y as usize * width as usize + x as usize) * 4 + 3] == 0)
}

/// Minimal bounding box of pixels with non-zero alpha.
///
/// Rows are scanned top-down then bottom-up to the top bound; columns are
/// scanned left-right then right-left over the full image height. A fully
/// transparent image yields a 1x1 rect at the origin.
pub fn trim_bounds(rgba: &RgbaImage) -> Rect {
    let (w, h) = rgba.dimensions();
    let raw = rgba.as_raw();

    let mut top = 0;
    while top < h && row_blank(raw, w, top) {
        top += 1;
    }
    let mut height = 0;
    if top < h {
        let mut bottom = h - 1;
        while bottom > top && row_blank(raw, w, bottom) {
            bottom -= 1;
        }
        height = bottom - top + 1;
    }

    let mut left = 0;
    while left < w && col_blank(raw, w, h, left) {
        left += 1;
    }
    let mut width = 0;
    if left < w {
        let mut right = w - 1;
        while right > left && col_blank(raw, w, h, right) {
            right -= 1;
        }
        width = right - left + 1;
    }

    // completely blank: reserve 1x1
    if width == 0 {
        left = 0;
        width = 1;
    }
    if height == 0 {
        top = 0;
        height = 1;
    }
    Rect::new(left, top, width, height)
}

/// Trim transparent borders off `rgba`.
pub fn trim_alpha(rgba: &RgbaImage) -> Trimmed {
    let (w, h) = rgba.dimensions();
    let rect = trim_bounds(rgba);
    let pixels = if w == 0 || h == 0 {
        RgbaImage::new(1, 1)
    } else {
        imageops::crop_imm(rgba, rect.x, rect.y, rect.w, rect.h).to_image()
    };
    Trimmed {
        pixels,
        rect,
        src_size: Size::new(w, h),
        trimmed: rect != Rect::new(0, 0, w, h),
    }
}

/// Wrap `rgba` unchanged: the rect covers the whole source.
pub fn untrimmed(rgba: RgbaImage) -> Trimmed {
    let (w, h) = rgba.dimensions();
    Trimmed {
        pixels: rgba,
        rect: Rect::new(0, 0, w, h),
        src_size: Size::new(w, h),
        trimmed: false,
    }
}
