use crate::anchors::{AnchorMap, list_files, match_glob};
use crate::compositing::render_bin;
use crate::config::RunConfig;
use crate::error::Result;
use crate::export::{AtlasMetadata, MetadataFormat, bin_metadata};
use crate::loader::{ImageSet, LoadJob, load_images};
use crate::model::{AtlasStats, Bin, ImageRecord};
use crate::packer::{BinPacker, PackOptions, maxrects::MaxRectsPacker, pack_records};
use image::RgbaImage;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Where a run reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    /// Directory holding the config file; outputs resolve against it.
    pub data_dir: PathBuf,
    /// `data_dir/stage`; sprite directories resolve against it.
    pub stage_dir: PathBuf,
}

impl RunPaths {
    pub fn from_data_dir(data_dir: impl Into<PathBuf>, cfg: &RunConfig) -> Self {
        let data_dir = data_dir.into();
        let stage_dir = data_dir.join(&cfg.stage);
        Self {
            data_dir,
            stage_dir,
        }
    }

    /// Paths for a config file at `config_path`.
    pub fn for_config_file(config_path: &Path, cfg: &RunConfig) -> Self {
        let data_dir = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::from_data_dir(data_dir, cfg)
    }
}

/// Run switches that are not part of the config document.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Outline every placement in the atlas image.
    pub debug: bool,
}

/// A rendered bin and where it goes.
pub struct OutputBin {
    pub bin: Bin,
    pub rgba: RgbaImage,
    pub metadata: AtlasMetadata,
    pub image_path: PathBuf,
    pub data_path: PathBuf,
}

/// Result of a run.
pub struct AtlasOutput {
    pub images: ImageSet,
    pub bins: Vec<OutputBin>,
    /// Files matched by the directory globs, including ones that failed to load.
    pub sprite_count: usize,
}

impl AtlasOutput {
    pub fn stats(&self) -> AtlasStats {
        let bins: Vec<Bin> = self.bins.iter().map(|b| b.bin.clone()).collect();
        AtlasStats::collect(&bins, self.images.records(), self.images.duplicates())
    }
}

/// Logs elapsed time per stage.
struct StageTimer {
    start: Instant,
    last: Instant,
}

impl StageTimer {
    fn start() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
        }
    }

    fn report(&mut self, stage: &str) {
        let now = Instant::now();
        info!(
            stage,
            elapsed_ms = now.duration_since(self.start).as_millis() as u64,
            step_ms = now.duration_since(self.last).as_millis() as u64,
            "stage done"
        );
        self.last = now;
    }
}

/// Output file name for bin `index`: the configured name for bin 0,
/// `<stem>_<index>.<ext>` after that.
pub fn output_name(base: &str, index: usize) -> String {
    if index == 0 {
        return base.to_string();
    }
    let name_start = base.rfind('/').map_or(0, |i| i + 1);
    match base[name_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let dot = name_start + dot;
            format!("{}_{}{}", &base[..dot], index, &base[dot..])
        }
        _ => format!("{base}_{index}"),
    }
}

/// Stage-relative key for a file inside directory `dir`.
fn tile_key(dir: &str, rel: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() || dir == "." {
        rel.to_string()
    } else {
        format!("{dir}/{rel}")
    }
}

/// Expand every directory's glob and resolve each file's anchor.
///
/// Jobs come out in config order, files sorted within each directory. A
/// file matched twice keeps its first job.
pub fn load_jobs(cfg: &RunConfig, paths: &RunPaths) -> Result<Vec<LoadJob>> {
    let mut jobs = Vec::new();
    let mut seen = HashSet::new();
    for dir in cfg.resolved_dirs() {
        let dir_path = paths.stage_dir.join(&dir.name);
        let files = list_files(&dir_path);
        let anchors = AnchorMap::from_files(dir.anchors.clone(), dir.default_anchor, &files)?;
        for rel in match_glob(&dir.glob, &files)? {
            let key = tile_key(&dir.name, &rel);
            if !seen.insert(key.clone()) {
                warn!(file = %key, "matched by more than one directory, keeping the first");
                continue;
            }
            jobs.push(LoadJob {
                anchor: anchors.resolve(&rel),
                path: dir_path.join(&rel),
                trim: dir.trim,
                key,
            });
        }
    }
    Ok(jobs)
}

fn pack_options(cfg: &RunConfig) -> PackOptions {
    PackOptions {
        allow_rotation: cfg.allow_rotation,
        ..PackOptions::default()
    }
}

/// Render one bin and, if `write` is set, write its image then its metadata.
fn process_bin(
    mut bin: Bin,
    records: &[ImageRecord],
    cfg: &RunConfig,
    paths: &RunPaths,
    opts: &BuildOptions,
    write: bool,
) -> Result<OutputBin> {
    let image_name = output_name(&cfg.write_image, bin.index);
    let data_path = paths.data_dir.join(output_name(&cfg.write_data, bin.index));
    let image_path = paths.data_dir.join(&image_name);
    bin.image = image_name;

    let rgba = render_bin(&bin, records, opts.debug);
    let metadata = bin_metadata(&bin, records);

    if write {
        // check the sidecar format before spending time on the image
        MetadataFormat::from_path(&data_path)?;
        for p in [&image_path, &data_path] {
            if let Some(parent) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
        }
        rgba.save(&image_path)?;
        info!(path = ?image_path, bin = bin.index, width = bin.width, height = bin.height, "wrote atlas image");
        metadata.write(&data_path)?;
        info!(path = ?data_path, bin = bin.index, tiles = metadata.tiles.len(), "wrote atlas data");
    }

    Ok(OutputBin {
        bin,
        rgba,
        metadata,
        image_path,
        data_path,
    })
}

fn execute(
    cfg: &RunConfig,
    paths: &RunPaths,
    opts: &BuildOptions,
    packer: &dyn BinPacker,
    write: bool,
) -> Result<AtlasOutput> {
    cfg.validate()?;
    let mut timer = StageTimer::start();
    info!(data = ?paths.data_dir, stage = ?paths.stage_dir, "start");

    let jobs = load_jobs(cfg, paths)?;
    let sprite_count = jobs.len();
    let mut images = load_images(&jobs);
    timer.report("load");
    info!(files = sprite_count, images = images.len(), duplicates = images.duplicates(), "loaded");

    let bins = pack_records(
        &mut images,
        packer,
        cfg.max_width,
        cfg.max_height,
        cfg.padding,
        &pack_options(cfg),
    )?;
    timer.report("pack");

    let records = images.records();
    #[cfg(feature = "parallel")]
    let results: Vec<Result<OutputBin>> = bins
        .into_par_iter()
        .map(|bin| process_bin(bin, records, cfg, paths, opts, write))
        .collect();
    #[cfg(not(feature = "parallel"))]
    let results: Vec<Result<OutputBin>> = bins
        .into_iter()
        .map(|bin| process_bin(bin, records, cfg, paths, opts, write))
        .collect();
    let bins = results.into_iter().collect::<Result<Vec<_>>>()?;
    timer.report(if write { "composite+write" } else { "composite" });

    info!(sprites = sprite_count, duplicates = images.duplicates(), bins = bins.len(), "done");
    Ok(AtlasOutput {
        images,
        bins,
        sprite_count,
    })
}

#[instrument(skip_all)]
/// Loads, packs and composites a run in memory without writing anything.
pub fn build_atlas(cfg: &RunConfig, paths: &RunPaths, opts: &BuildOptions) -> Result<AtlasOutput> {
    execute(cfg, paths, opts, &MaxRectsPacker::new(cfg.heuristic), false)
}

#[instrument(skip_all)]
/// Like [`build_atlas`], with a caller-supplied packer.
pub fn build_atlas_with(
    cfg: &RunConfig,
    paths: &RunPaths,
    opts: &BuildOptions,
    packer: &dyn BinPacker,
) -> Result<AtlasOutput> {
    execute(cfg, paths, opts, packer, false)
}

#[instrument(skip_all)]
/// Full run: load, pack, then per bin composite, bleed, write image and write metadata.
///
/// Returns once every bin's files are written; the first failing bin's
/// error is returned.
pub fn run(cfg: &RunConfig, paths: &RunPaths, opts: &BuildOptions) -> Result<AtlasOutput> {
    execute(cfg, paths, opts, &MaxRectsPacker::new(cfg.heuristic), true)
}
