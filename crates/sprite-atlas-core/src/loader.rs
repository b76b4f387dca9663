use crate::error::Result;
use crate::model::{Anchor, ContentHash, ImageRecord};
use crate::trim::{Trimmed, trim_alpha, untrimmed};
use image::{ImageReader, RgbaImage};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// One file to decode, with everything needed to turn it into a record.
#[derive(Debug, Clone)]
pub struct LoadJob {
    /// Stage-relative key, `/`-separated.
    pub key: String,
    pub path: PathBuf,
    pub trim: bool,
    pub anchor: Anchor,
}

/// Output of a single load task, not yet merged into an [`ImageSet`].
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub key: String,
    pub anchor: Anchor,
    pub image: Trimmed,
    pub hash: ContentHash,
}

/// SHA-256 over the sprite's dimensions followed by its raw RGBA bytes.
pub fn content_hash(pixels: &RgbaImage) -> ContentHash {
    let (w, h) = pixels.dimensions();
    let mut hasher = Sha256::new();
    hasher.update(w.to_le_bytes());
    hasher.update(h.to_le_bytes());
    hasher.update(pixels.as_raw());
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    ContentHash(digest)
}

/// Prepare an already-decoded image: optional trim, then hash.
pub fn prepare(key: String, anchor: Anchor, rgba: RgbaImage, trim: bool) -> LoadedImage {
    let (w, h) = rgba.dimensions();
    let image = if trim || w == 0 || h == 0 {
        trim_alpha(&rgba)
    } else {
        untrimmed(rgba)
    };
    let hash = content_hash(&image.pixels);
    LoadedImage {
        key,
        anchor,
        image,
        hash,
    }
}

/// Decode, trim and hash one file.
pub fn load_one(job: &LoadJob) -> Result<LoadedImage> {
    let rgba = ImageReader::open(&job.path)?
        .with_guessed_format()?
        .decode()?
        .to_rgba8();
    debug!(key = %job.key, w = rgba.width(), h = rgba.height(), trim = job.trim, "decoded");
    Ok(prepare(job.key.clone(), job.anchor, rgba, job.trim))
}

/// Loaded sprites, addressable by position, file key and content hash.
#[derive(Debug, Default)]
pub struct ImageSet {
    records: Vec<ImageRecord>,
    by_hash: HashMap<ContentHash, usize>,
    by_file: HashMap<String, usize>,
    duplicates: usize,
}

impl ImageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a loaded image, returning its record index.
    ///
    /// If an earlier record has the same content hash, the new record reuses
    /// that record's pixels and geometry under its own key and anchor, and
    /// the duplicate counter is bumped.
    pub fn insert(&mut self, loaded: LoadedImage) -> usize {
        let idx = self.records.len();
        let mut rec = match self.by_hash.get(&loaded.hash) {
            Some(&first) => {
                self.duplicates += 1;
                debug!(key = %loaded.key, first = %self.records[first].file, "duplicate content");
                self.records[first].with_identity(loaded.key)
            }
            None => {
                self.by_hash.insert(loaded.hash, idx);
                ImageRecord {
                    file: loaded.key,
                    pixels: Arc::new(loaded.image.pixels),
                    src_size: loaded.image.src_size,
                    rect: loaded.image.rect,
                    hash: loaded.hash,
                    trimmed: loaded.image.trimmed,
                    anchor: Default::default(),
                    bin: None,
                    tex_pos: None,
                    rotated: false,
                }
            }
        };
        rec.anchor = loaded.anchor;
        self.by_file.insert(rec.file.clone(), idx);
        self.records.push(rec);
        idx
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [ImageRecord] {
        &mut self.records
    }

    pub fn get(&self, idx: usize) -> Option<&ImageRecord> {
        self.records.get(idx)
    }

    pub fn by_file(&self, file: &str) -> Option<&ImageRecord> {
        self.by_file.get(file).map(|&i| &self.records[i])
    }

    /// First record seen with this content.
    pub fn by_hash(&self, hash: &ContentHash) -> Option<&ImageRecord> {
        self.by_hash.get(hash).map(|&i| &self.records[i])
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[instrument(skip_all, fields(files = jobs.len()))]
/// Runs every load job, then merges the results in job order.
///
/// A file that fails to decode is logged and left out; the rest of the run
/// continues. Merging only starts once every job has finished, so dedup
/// always sees the same first record regardless of task scheduling.
pub fn load_images(jobs: &[LoadJob]) -> ImageSet {
    #[cfg(feature = "parallel")]
    let results: Vec<Result<LoadedImage>> = jobs.par_iter().map(load_one).collect();
    #[cfg(not(feature = "parallel"))]
    let results: Vec<Result<LoadedImage>> = jobs.iter().map(load_one).collect();

    let mut set = ImageSet::new();
    for (job, res) in jobs.iter().zip(results) {
        match res {
            Ok(loaded) => {
                set.insert(loaded);
            }
            Err(e) => {
                error!(file = %job.key, path = ?job.path, error = %e, "skip image");
            }
        }
    }
    set
}
