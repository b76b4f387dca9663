use image::{Rgba, RgbaImage};
use sprite_atlas_core::config::{AnchorSpec, DirOptions, DirSpec, RunConfig};
use sprite_atlas_core::model::{Anchor, Rect, Size};
use sprite_atlas_core::{AtlasError, AtlasMetadata, BuildOptions, RunPaths, build_atlas, output_name, run};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn scratch() -> TempDir {
    TempDir::new().expect("scratch dir")
}

fn save(dir: &Path, rel: &str, img: &RgbaImage) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("fixture dir");
    }
    img.save(&path).expect("save fixture");
}

fn solid(w: u32, h: u32, shade: u8) -> RgbaImage {
    RgbaImage::from_pixel(w, h, Rgba([shade, 255 - shade, shade / 2, 255]))
}

fn sprites_config() -> sprite_atlas_core::RunConfigBuilder {
    RunConfig::builder().stage("stage").dir(DirSpec::Name("sprites".into()))
}

#[test]
fn two_distinct_sprites_share_one_bin() {
    let tmp = scratch();
    let root = tmp.path();
    let sprites = root.join("stage/sprites");
    save(&sprites, "a.png", &solid(64, 64, 10));
    save(&sprites, "b.png", &solid(64, 64, 200));

    let cfg = sprites_config().build();
    let paths = RunPaths::from_data_dir(root, &cfg);
    let out = run(&cfg, &paths, &BuildOptions::default()).expect("run");

    assert_eq!(out.bins.len(), 1);
    assert_eq!(out.images.duplicates(), 0);
    let meta = &out.bins[0].metadata;
    assert_eq!(meta.tiles.len(), 2);
    for key in ["sprites/a.png", "sprites/b.png"] {
        let t = &meta.tiles[key];
        assert_eq!(t.src_size, Size::new(64, 64));
        assert_eq!(t.rect, Rect::new(0, 0, 64, 64));
    }
    let p = &out.bins[0].bin.placements;
    assert!(!p[0].rect().intersects(&p[1].rect()));

    assert!(root.join("atlas.png").is_file());
    let on_disk = AtlasMetadata::read(&root.join("atlas.json")).expect("read back");
    assert_eq!(&on_disk, meta);
    assert_eq!(on_disk.metadata.image, "atlas.png");
    let img = image::open(root.join("atlas.png")).expect("atlas image").to_rgba8();
    assert_eq!(img.dimensions(), (meta.metadata.size.w, meta.metadata.size.h));

    let stats = out.stats();
    assert_eq!(stats.used_area, 2 * 64 * 64);
    assert_eq!(stats.wasted_area(), stats.total_bin_area - stats.used_area);
}

#[test]
fn copied_file_is_deduplicated_but_placed_twice() {
    let tmp = scratch();
    let root = tmp.path();
    let sprites = root.join("stage/sprites");
    let img = solid(64, 64, 90);
    save(&sprites, "orig.png", &img);
    save(&sprites, "copy.png", &img);

    let cfg = sprites_config().build();
    let out = build_atlas(&cfg, &RunPaths::from_data_dir(root, &cfg), &BuildOptions::default())
        .expect("build");

    assert_eq!(out.images.duplicates(), 1);
    let meta = &out.bins[0].metadata;
    let a = &meta.tiles["sprites/copy.png"];
    let b = &meta.tiles["sprites/orig.png"];
    assert_eq!(a.src_size, b.src_size);
    assert_eq!(a.rect, b.rect);
    assert_ne!(a.tex_pos, b.tex_pos);
    // nothing written by an in-memory build
    assert!(!root.join("atlas.png").exists());
}

#[test]
fn identical_inputs_give_identical_outputs() {
    let tmp = scratch();
    let root = tmp.path();
    let sprites = root.join("stage/sprites");
    for i in 0..12u32 {
        save(&sprites, &format!("s{i:02}.png"), &solid(8 + i * 3, 40 - i * 2, i as u8 * 20));
    }
    let cfg = sprites_config().write_data("atlas.cb").build();
    let paths = RunPaths::from_data_dir(root, &cfg);

    run(&cfg, &paths, &BuildOptions::default()).expect("first run");
    let image_1 = fs::read(root.join("atlas.png")).expect("image");
    let data_1 = fs::read(root.join("atlas.cb")).expect("data");
    run(&cfg, &paths, &BuildOptions::default()).expect("second run");
    assert_eq!(fs::read(root.join("atlas.png")).expect("image"), image_1);
    assert_eq!(fs::read(root.join("atlas.cb")).expect("data"), data_1);
}

#[test]
fn undecodable_file_is_skipped() {
    let tmp = scratch();
    let root = tmp.path();
    let sprites = root.join("stage/sprites");
    save(&sprites, "good.png", &solid(16, 16, 1));
    fs::write(sprites.join("broken.png"), b"definitely not a png").expect("write");

    let cfg = sprites_config().build();
    let out = build_atlas(&cfg, &RunPaths::from_data_dir(root, &cfg), &BuildOptions::default())
        .expect("build");
    assert_eq!(out.sprite_count, 2);
    assert_eq!(out.images.len(), 1);
    let meta = &out.bins[0].metadata;
    assert!(meta.tiles.contains_key("sprites/good.png"));
    assert!(!meta.tiles.contains_key("sprites/broken.png"));
}

#[test]
fn anchors_resolve_per_directory() {
    let tmp = scratch();
    let root = tmp.path();
    save(&root.join("stage/units"), "boss_orc.png", &solid(8, 8, 1));
    save(&root.join("stage/units"), "boss_elf.png", &solid(8, 8, 2));
    save(&root.join("stage/units"), "peon.png", &solid(8, 8, 3));
    save(&root.join("stage/props"), "crate.png", &solid(8, 8, 4));

    let cfg = RunConfig::builder()
        .stage("stage")
        .default_anchor(Anchor::new(0.5, 0.5))
        .dir(DirSpec::Detailed(DirOptions {
            name: "units".into(),
            glob: None,
            trim: None,
            anchors: vec![
                AnchorSpec {
                    glob: "boss_orc.png".into(),
                    anchor: Some(Anchor::new(12.0, 30.0)),
                    abs: true,
                },
                AnchorSpec {
                    glob: "boss_*.png".into(),
                    anchor: Some(Anchor::new(0.5, 0.95)),
                    abs: false,
                },
            ],
            default_anchor: Some(Anchor::new(0.5, 1.0)),
        }))
        .dir(DirSpec::Name("props".into()))
        .build();
    let out = build_atlas(&cfg, &RunPaths::from_data_dir(root, &cfg), &BuildOptions::default())
        .expect("build");
    let tiles = &out.bins[0].metadata.tiles;
    assert_eq!(tiles["units/boss_orc.png"].anchor, Anchor::new(12.0, 30.0));
    assert_eq!(tiles["units/boss_elf.png"].anchor, Anchor::new(0.5, 0.95));
    assert_eq!(tiles["units/peon.png"].anchor, Anchor::new(0.5, 1.0));
    assert_eq!(tiles["props/crate.png"].anchor, Anchor::new(0.5, 0.5));
}

#[test]
fn overflow_writes_numbered_bins_with_own_tiles() {
    let tmp = scratch();
    let root = tmp.path();
    let sprites = root.join("stage/sprites");
    for i in 0..5u8 {
        save(&sprites, &format!("big{i}.png"), &solid(40, 40, i * 30));
    }
    let cfg = sprites_config()
        .with_max_dimensions(64, 64)
        .write_image("out/atlas.png")
        .write_data("out/atlas.cb")
        .build();
    let out = run(&cfg, &RunPaths::from_data_dir(root, &cfg), &BuildOptions::default())
        .expect("run");

    assert_eq!(out.bins.len(), 5);
    let mut seen = Vec::new();
    for (i, b) in out.bins.iter().enumerate() {
        let image = output_name("out/atlas.png", i);
        let data = output_name("out/atlas.cb", i);
        assert!(root.join(&image).is_file(), "{image}");
        let meta = AtlasMetadata::read(&root.join(&data)).expect("decode bin metadata");
        assert_eq!(meta.metadata.image, image);
        assert_eq!(meta.tiles.len(), 1);
        assert_eq!(&meta, &b.metadata);
        seen.extend(meta.tiles.keys().cloned());
    }
    seen.sort();
    assert_eq!(seen.len(), 5);
    assert!(root.join("out/atlas_4.cb").is_file());
    assert_eq!(out.stats().num_bins, 5);
}

#[test]
fn trimmed_sprite_records_source_geometry() {
    let tmp = scratch();
    let root = tmp.path();
    let mut img = RgbaImage::new(32, 32);
    for y in 10..20 {
        for x in 4..12 {
            img.put_pixel(x, y, Rgba([50, 60, 70, 255]));
        }
    }
    save(&root.join("stage/fx"), "puff.png", &img);

    let cfg = RunConfig::builder()
        .stage("stage")
        .trim_default(true)
        .dir(DirSpec::Name("fx".into()))
        .build();
    let out = build_atlas(&cfg, &RunPaths::from_data_dir(root, &cfg), &BuildOptions::default())
        .expect("build");
    let t = &out.bins[0].metadata.tiles["fx/puff.png"];
    assert_eq!(t.src_size, Size::new(32, 32));
    assert_eq!(t.rect, Rect::new(4, 10, 8, 10));
    assert_eq!(out.stats().num_trimmed, 1);
}

#[test]
fn sprite_too_large_aborts_with_its_key() {
    let tmp = scratch();
    let root = tmp.path();
    save(&root.join("stage/sprites"), "banner.png", &solid(80, 80, 5));
    let cfg = sprites_config().with_max_dimensions(64, 64).build();
    let err = build_atlas(&cfg, &RunPaths::from_data_dir(root, &cfg), &BuildOptions::default())
        .err()
        .expect("should fail");
    match err {
        AtlasError::SpriteTooLarge { key, .. } => assert_eq!(key, "sprites/banner.png"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_directory_means_nothing_to_pack() {
    let tmp = scratch();
    let root = tmp.path();
    let cfg = sprites_config().build();
    let err = build_atlas(&cfg, &RunPaths::from_data_dir(root, &cfg), &BuildOptions::default())
        .err()
        .expect("should fail");
    assert!(matches!(err, AtlasError::Empty));
}

#[test]
fn unsupported_data_extension_writes_nothing() {
    let tmp = scratch();
    let root = tmp.path();
    save(&root.join("stage/sprites"), "a.png", &solid(4, 4, 1));
    let cfg = sprites_config().write_data("atlas.xml").build();
    let err = run(&cfg, &RunPaths::from_data_dir(root, &cfg), &BuildOptions::default())
        .err()
        .expect("should fail");
    assert!(matches!(err, AtlasError::UnsupportedMetadataFormat(_)));
    assert!(!root.join("atlas.png").exists());
}

#[test]
fn unbounded_bin_size_is_accepted() {
    let tmp = scratch();
    let root = tmp.path();
    save(&root.join("stage/sprites"), "a.png", &solid(12, 5, 1));
    save(&root.join("stage/sprites"), "b.png", &solid(6, 9, 2));
    let cfg = RunConfig::from_json(
        r#"{ "stage": "stage", "dirs": ["sprites"], "maxWidth": 4294967295, "maxHeight": 4294967295,
             "writeImage": "atlas.png", "writeData": "atlas.json" }"#,
    )
    .expect("parse");
    let out = build_atlas(&cfg, &RunPaths::from_data_dir(root, &cfg), &BuildOptions::default())
        .expect("build");
    assert_eq!(out.bins.len(), 1);
    assert_eq!(out.bins[0].metadata.tiles.len(), 2);
    assert!(out.bins[0].bin.width < 64 && out.bins[0].bin.height < 64);
}

#[test]
fn bin_file_names() {
    assert_eq!(output_name("atlas.png", 0), "atlas.png");
    assert_eq!(output_name("atlas.png", 1), "atlas_1.png");
    assert_eq!(output_name("out/ui.sheet.cb", 3), "out/ui.sheet_3.cb");
    assert_eq!(output_name("v1.0/atlas", 2), "v1.0/atlas_2");
    assert_eq!(output_name(".hidden", 1), ".hidden_1");
}
