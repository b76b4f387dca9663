use crate::error::{AtlasError, Result};
use crate::model::Anchor;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Run configuration document.
///
/// Key notes:
///   - `stage` is resolved against the directory holding the config file; `dirs` resolve under it
///   - `write_image` / `write_data` are resolved against the config file's directory
///   - `dirs` is required; an absent or empty list aborts the run before any work starts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    #[serde(default = "default_stage")]
    pub stage: String,
    #[serde(default)]
    pub dirs: Option<Vec<DirSpec>>,
    #[serde(default = "default_glob")]
    pub default_glob: String,
    #[serde(default)]
    pub default_anchor: Option<Anchor>,
    #[serde(default)]
    pub trim_default: bool,
    pub write_image: String,
    pub write_data: String,

    /// Maximum bin width in pixels.
    #[serde(default = "default_max_dim")]
    pub max_width: u32,
    /// Maximum bin height in pixels.
    #[serde(default = "default_max_dim")]
    pub max_height: u32,
    /// Pixels between neighbouring sprites.
    #[serde(default = "default_padding")]
    pub padding: u32,
    /// Allow 90° rotations where the packer finds them beneficial.
    #[serde(default = "default_true")]
    pub allow_rotation: bool,
    #[serde(default)]
    pub heuristic: MaxRectsHeuristic,
}

/// A directory to load sprites from: either a bare name or a detailed spec.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DirSpec {
    Name(String),
    Detailed(DirOptions),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DirOptions {
    pub name: String,
    /// Overrides the run's `defaultGlob` for this directory.
    #[serde(default)]
    pub glob: Option<String>,
    /// Overrides the run's `trimDefault` for this directory.
    #[serde(default)]
    pub trim: Option<bool>,
    #[serde(default)]
    pub anchors: Vec<AnchorSpec>,
    /// Overrides the run's `defaultAnchor` for this directory.
    #[serde(default)]
    pub default_anchor: Option<Anchor>,
}

/// Binds files matching `glob` (relative to the directory) to an anchor point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnchorSpec {
    pub glob: String,
    #[serde(default)]
    pub anchor: Option<Anchor>,
    /// Use `anchor` verbatim as an absolute point.
    #[serde(default)]
    pub abs: bool,
}

/// A `DirSpec` with every run-level default filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDir {
    pub name: String,
    pub glob: String,
    pub trim: bool,
    pub anchors: Vec<AnchorSpec>,
    pub default_anchor: Anchor,
}

impl DirSpec {
    pub fn name(&self) -> &str {
        match self {
            DirSpec::Name(n) => n,
            DirSpec::Detailed(d) => &d.name,
        }
    }

    pub fn resolve(&self, run: &RunConfig) -> ResolvedDir {
        let run_anchor = run.default_anchor.unwrap_or_default();
        match self {
            DirSpec::Name(name) => ResolvedDir {
                name: name.clone(),
                glob: run.default_glob.clone(),
                trim: run.trim_default,
                anchors: Vec::new(),
                default_anchor: run_anchor,
            },
            DirSpec::Detailed(d) => ResolvedDir {
                name: d.name.clone(),
                glob: d.glob.clone().unwrap_or_else(|| run.default_glob.clone()),
                trim: d.trim.unwrap_or(run.trim_default),
                anchors: d.anchors.clone(),
                default_anchor: d.default_anchor.unwrap_or(run_anchor),
            },
        }
    }
}

/// MaxRects placement heuristics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MaxRectsHeuristic {
    #[default]
    BestAreaFit,
    BestShortSideFit,
    BestLongSideFit,
    BottomLeft,
    ContactPoint,
}

impl FromStr for MaxRectsHeuristic {
    type Err = ();
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "baf" | "bestareafit" => Ok(Self::BestAreaFit),
            "bssf" | "bestshortsidefit" => Ok(Self::BestShortSideFit),
            "blsf" | "bestlongsidefit" => Ok(Self::BestLongSideFit),
            "bl" | "bottomleft" => Ok(Self::BottomLeft),
            "cp" | "contactpoint" => Ok(Self::ContactPoint),
            _ => Err(()),
        }
    }
}

impl RunConfig {
    /// Parse a JSON run configuration.
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| AtlasError::InvalidConfig(e.to_string()))
    }

    /// Validates the configuration.
    ///
    /// Returns an error if:
    /// - `dirs` is absent or empty
    /// - bin dimensions are zero
    /// - an `abs` anchor spec carries no anchor point
    pub fn validate(&self) -> Result<()> {
        let dirs = match &self.dirs {
            Some(d) if !d.is_empty() => d,
            _ => return Err(AtlasError::NoDirectories),
        };

        if self.max_width == 0 || self.max_height == 0 {
            return Err(AtlasError::InvalidDimensions {
                width: self.max_width,
                height: self.max_height,
            });
        }

        for dir in dirs {
            if dir.name().is_empty() {
                return Err(AtlasError::InvalidConfig("directory with empty name".into()));
            }
            if let DirSpec::Detailed(d) = dir {
                if let Some(spec) = d.anchors.iter().find(|a| a.abs && a.anchor.is_none()) {
                    return Err(AtlasError::InvalidConfig(format!(
                        "absolute anchor for `{}` in `{}` has no anchor point",
                        spec.glob, d.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Directories with run-level defaults applied, in declaration order.
    pub fn resolved_dirs(&self) -> Vec<ResolvedDir> {
        self.dirs
            .iter()
            .flatten()
            .map(|d| d.resolve(self))
            .collect()
    }

    /// Create a fluent builder for `RunConfig`.
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::new()
    }
}

fn default_stage() -> String {
    ".".into()
}
fn default_glob() -> String {
    "*.png".into()
}
fn default_max_dim() -> u32 {
    2048
}
fn default_padding() -> u32 {
    2
}
fn default_true() -> bool {
    true
}

/// Builder for `RunConfig`, mostly for programmatic runs and tests.
#[derive(Debug, Clone)]
pub struct RunConfigBuilder {
    cfg: RunConfig,
}

impl Default for RunConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RunConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: RunConfig {
                stage: default_stage(),
                dirs: None,
                default_glob: default_glob(),
                default_anchor: None,
                trim_default: false,
                write_image: "atlas.png".into(),
                write_data: "atlas.json".into(),
                max_width: default_max_dim(),
                max_height: default_max_dim(),
                padding: default_padding(),
                allow_rotation: true,
                heuristic: MaxRectsHeuristic::default(),
            },
        }
    }
    pub fn stage(mut self, v: impl Into<String>) -> Self {
        self.cfg.stage = v.into();
        self
    }
    pub fn dir(mut self, v: DirSpec) -> Self {
        self.cfg.dirs.get_or_insert_with(Vec::new).push(v);
        self
    }
    pub fn default_glob(mut self, v: impl Into<String>) -> Self {
        self.cfg.default_glob = v.into();
        self
    }
    pub fn default_anchor(mut self, v: Anchor) -> Self {
        self.cfg.default_anchor = Some(v);
        self
    }
    pub fn trim_default(mut self, v: bool) -> Self {
        self.cfg.trim_default = v;
        self
    }
    pub fn write_image(mut self, v: impl Into<String>) -> Self {
        self.cfg.write_image = v.into();
        self
    }
    pub fn write_data(mut self, v: impl Into<String>) -> Self {
        self.cfg.write_data = v.into();
        self
    }
    pub fn with_max_dimensions(mut self, w: u32, h: u32) -> Self {
        self.cfg.max_width = w;
        self.cfg.max_height = h;
        self
    }
    pub fn padding(mut self, v: u32) -> Self {
        self.cfg.padding = v;
        self
    }
    pub fn allow_rotation(mut self, v: bool) -> Self {
        self.cfg.allow_rotation = v;
        self
    }
    pub fn heuristic(mut self, v: MaxRectsHeuristic) -> Self {
        self.cfg.heuristic = v;
        self
    }
    pub fn build(self) -> RunConfig {
        self.cfg
    }
}
