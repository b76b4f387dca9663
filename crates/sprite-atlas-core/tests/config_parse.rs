use sprite_atlas_core::AtlasError;
use sprite_atlas_core::anchors::{AnchorMap, match_glob};
use sprite_atlas_core::config::{AnchorSpec, DirSpec, MaxRectsHeuristic, RunConfig};
use sprite_atlas_core::model::Anchor;

#[test]
fn minimal_config_gets_defaults() {
    let cfg = RunConfig::from_json(
        r#"{ "dirs": ["ui"], "writeImage": "out/ui.png", "writeData": "out/ui.json" }"#,
    )
    .expect("parse");
    cfg.validate().expect("valid");

    assert_eq!(cfg.stage, ".");
    assert_eq!(cfg.default_glob, "*.png");
    assert_eq!((cfg.max_width, cfg.max_height), (2048, 2048));
    assert_eq!(cfg.padding, 2);
    assert!(cfg.allow_rotation);
    assert!(!cfg.trim_default);
    assert_eq!(cfg.heuristic, MaxRectsHeuristic::BestAreaFit);

    let dirs = cfg.resolved_dirs();
    assert_eq!(dirs.len(), 1);
    assert_eq!(dirs[0].name, "ui");
    assert_eq!(dirs[0].glob, "*.png");
    assert_eq!(dirs[0].default_anchor, Anchor::default());
}

#[test]
fn detailed_dirs_override_run_defaults() {
    let cfg = RunConfig::from_json(
        r#"{
            "stage": "stage",
            "defaultGlob": "*.png",
            "defaultAnchor": [0.5, 0.5],
            "trimDefault": true,
            "dirs": [
                "plain",
                {
                    "name": "units",
                    "glob": "**/*.png",
                    "trim": false,
                    "defaultAnchor": { "x": 0.5, "y": 1.0 },
                    "anchors": [
                        { "glob": "boss_*.png", "anchor": [0.5, 0.9] },
                        { "glob": "flag.png", "anchor": { "x": 3, "y": 40 }, "abs": true }
                    ]
                }
            ],
            "writeImage": "atlas.png",
            "writeData": "atlas.cb",
            "padding": 0,
            "allowRotation": false,
            "heuristic": "bottomleft"
        }"#,
    )
    .expect("parse");
    cfg.validate().expect("valid");

    let dirs = cfg.resolved_dirs();
    assert_eq!(dirs[0].name, "plain");
    assert!(dirs[0].trim);
    assert_eq!(dirs[0].default_anchor, Anchor::new(0.5, 0.5));

    assert_eq!(dirs[1].glob, "**/*.png");
    assert!(!dirs[1].trim);
    assert_eq!(dirs[1].default_anchor, Anchor::new(0.5, 1.0));
    assert_eq!(dirs[1].anchors.len(), 2);
    assert_eq!(dirs[1].anchors[0].anchor, Some(Anchor::new(0.5, 0.9)));
    assert!(dirs[1].anchors[1].abs);
    assert_eq!(dirs[1].anchors[1].anchor, Some(Anchor::new(3.0, 40.0)));

    assert_eq!(cfg.padding, 0);
    assert!(!cfg.allow_rotation);
    assert_eq!(cfg.heuristic, MaxRectsHeuristic::BottomLeft);
}

#[test]
fn missing_or_empty_dirs_abort() {
    for text in [
        r#"{ "writeImage": "a.png", "writeData": "a.json" }"#,
        r#"{ "dirs": [], "writeImage": "a.png", "writeData": "a.json" }"#,
    ] {
        let cfg = RunConfig::from_json(text).expect("parse");
        assert!(matches!(cfg.validate(), Err(AtlasError::NoDirectories)));
    }
}

#[test]
fn absolute_anchor_needs_a_point() {
    let cfg = RunConfig::from_json(
        r#"{ "dirs": [{ "name": "d", "anchors": [{ "glob": "*.png", "abs": true }] }],
             "writeImage": "a.png", "writeData": "a.json" }"#,
    )
    .expect("parse");
    assert!(matches!(cfg.validate(), Err(AtlasError::InvalidConfig(_))));
}

#[test]
fn zero_bin_size_is_invalid() {
    let cfg = RunConfig::builder()
        .dir(DirSpec::Name("d".into()))
        .with_max_dimensions(0, 512)
        .build();
    assert!(matches!(cfg.validate(), Err(AtlasError::InvalidDimensions { width: 0, height: 512 })));
}

#[test]
fn malformed_json_is_invalid_config() {
    assert!(matches!(RunConfig::from_json("{ dirs: "), Err(AtlasError::InvalidConfig(_))));
    // writeImage is required
    assert!(matches!(
        RunConfig::from_json(r#"{ "dirs": ["a"], "writeData": "a.json" }"#),
        Err(AtlasError::InvalidConfig(_))
    ));
}

#[test]
fn heuristic_short_names() {
    assert_eq!("bssf".parse::<MaxRectsHeuristic>(), Ok(MaxRectsHeuristic::BestShortSideFit));
    assert_eq!("CP".parse::<MaxRectsHeuristic>(), Ok(MaxRectsHeuristic::ContactPoint));
    assert!("nope".parse::<MaxRectsHeuristic>().is_err());
}

fn files(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn glob_star_stays_in_one_directory() {
    let list = files(&["a.png", "b.jpg", "sub/c.png", "sub/deep/d.png"]);
    assert_eq!(match_glob("*.png", &list).expect("glob"), vec!["a.png"]);
    assert_eq!(
        match_glob("**/*.png", &list).expect("glob"),
        vec!["a.png", "sub/c.png", "sub/deep/d.png"]
    );
    assert!(matches!(match_glob("[", &list), Err(AtlasError::Glob(_))));
}

#[test]
fn first_anchor_spec_wins() {
    let list = files(&["hero_idle.png", "hero_run.png", "tree.png"]);
    let specs = vec![
        AnchorSpec {
            glob: "hero_run.png".into(),
            anchor: Some(Anchor::new(0.1, 0.1)),
            abs: false,
        },
        AnchorSpec {
            glob: "hero_*.png".into(),
            anchor: Some(Anchor::new(0.5, 1.0)),
            abs: false,
        },
        AnchorSpec {
            glob: "*.png".into(),
            anchor: None,
            abs: false,
        },
    ];
    let default = Anchor::new(0.25, 0.75);
    let map = AnchorMap::from_files(specs, default, &list).expect("map");

    assert_eq!(map.resolve("hero_run.png"), Anchor::new(0.1, 0.1));
    assert_eq!(map.resolve("hero_idle.png"), Anchor::new(0.5, 1.0));
    // claimed by a spec without a point
    assert_eq!(map.resolve("tree.png"), default);
    assert_eq!(map.spec_for("tree.png").map(|s| s.glob.as_str()), Some("*.png"));
    // never listed
    assert_eq!(map.resolve("missing.png"), default);
    assert!(map.spec_for("missing.png").is_none());
}

#[test]
fn hidden_files_need_an_explicit_dot() {
    let list = files(&["a.png", ".draft.png", ".cache/b.png", "sub/.c.png", "sub/d.png"]);
    assert_eq!(match_glob("*.png", &list).expect("glob"), vec!["a.png"]);
    assert_eq!(match_glob("**/*.png", &list).expect("glob"), vec!["a.png", "sub/d.png"]);
    assert_eq!(match_glob(".*.png", &list).expect("glob"), vec![".draft.png"]);
    assert_eq!(match_glob(".cache/*.png", &list).expect("glob"), vec![".cache/b.png"]);
}

#[cfg(unix)]
#[test]
fn unreadable_subdirectory_does_not_hide_the_rest() {
    use std::os::unix::fs::PermissionsExt;
    use sprite_atlas_core::anchors::list_files;

    let tmp = tempfile::TempDir::new().expect("tmp");
    let root = tmp.path();
    std::fs::write(root.join("a.png"), b"x").expect("write");
    std::fs::create_dir(root.join("locked")).expect("mkdir");
    std::fs::write(root.join("locked/b.png"), b"x").expect("write");
    std::fs::create_dir(root.join("open")).expect("mkdir");
    std::fs::write(root.join("open/c.png"), b"x").expect("write");
    std::fs::set_permissions(root.join("locked"), std::fs::Permissions::from_mode(0o000)).expect("chmod");

    let listed = list_files(root);
    // privileged users can still read the locked directory
    let readable = std::fs::read_dir(root.join("locked")).is_ok();
    std::fs::set_permissions(root.join("locked"), std::fs::Permissions::from_mode(0o755)).expect("chmod");

    assert!(listed.contains(&"a.png".to_string()));
    assert!(listed.contains(&"open/c.png".to_string()));
    assert_eq!(listed.contains(&"locked/b.png".to_string()), readable);
}
