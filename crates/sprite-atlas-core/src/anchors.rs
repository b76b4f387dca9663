//! Glob expansion and per-directory anchor resolution.

use crate::config::AnchorSpec;
use crate::error::Result;
use crate::model::Anchor;
use globset::{GlobBuilder, GlobMatcher};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Lists every file under `dir`, as `/`-separated paths relative to `dir`, sorted.
pub fn list_files(dir: &Path) -> Vec<String> {
    if !dir.is_dir() {
        warn!(?dir, "directory not found, nothing to load");
        return Vec::new();
    }
    let mut files: Vec<String> = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| match e {
            Ok(e) => Some(e),
            Err(err) => {
                warn!(?dir, path = ?err.path(), error = %err, "skip unreadable entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(dir)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();
    files
}

/// `*` and `?` never cross a `/`, so `*.png` only matches the top level.
fn matcher(pattern: &str) -> Result<GlobMatcher> {
    Ok(GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()?
        .compile_matcher())
}

fn has_hidden_segment(path: &str) -> bool {
    path.split('/').any(|seg| seg.starts_with('.'))
}

/// Filters `files` down to those matching `pattern`, preserving order.
///
/// Files with a dot-prefixed path segment are only matched when the pattern
/// itself has a segment starting with `.`, so `*.png` skips `.draft.png`
/// and `**/*.png` skips anything under `.cache/`.
pub fn match_glob(pattern: &str, files: &[String]) -> Result<Vec<String>> {
    let m = matcher(pattern)?;
    let dot_ok = has_hidden_segment(pattern);
    Ok(files
        .iter()
        .filter(|f| (dot_ok || !has_hidden_segment(f)) && m.is_match(f.as_str()))
        .cloned()
        .collect())
}

/// File → anchor binding for one directory.
///
/// Specs are applied in declaration order and the first spec to claim a
/// file keeps it.
#[derive(Debug, Clone)]
pub struct AnchorMap {
    specs: Vec<AnchorSpec>,
    bindings: HashMap<String, usize>,
    default: Anchor,
}

impl AnchorMap {
    /// Builds the map against an explicit list of directory-relative files.
    pub fn from_files(specs: Vec<AnchorSpec>, default: Anchor, files: &[String]) -> Result<Self> {
        let mut bindings = HashMap::new();
        for (idx, spec) in specs.iter().enumerate() {
            for file in match_glob(&spec.glob, files)? {
                bindings.entry(file).or_insert(idx);
            }
        }
        debug!(specs = specs.len(), bound = bindings.len(), "anchor map built");
        Ok(Self {
            specs,
            bindings,
            default,
        })
    }

    pub fn spec_for(&self, file: &str) -> Option<&AnchorSpec> {
        self.bindings.get(file).map(|&i| &self.specs[i])
    }

    /// Final anchor for a directory-relative file.
    ///
    /// An absolute spec always carries its point (checked by
    /// `RunConfig::validate`); a relative spec without one falls back to the
    /// directory default, as does an unclaimed file.
    pub fn resolve(&self, file: &str) -> Anchor {
        self.spec_for(file)
            .and_then(|spec| spec.anchor)
            .unwrap_or(self.default)
    }
}
