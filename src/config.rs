//! Project layout and the optional `project.yaml` configuration.
//!
//! A project root looks like:
//!
//! ```text
//! <root>/
//!   project.yaml                    optional, see ProjectConfig
//!   images/                         reviewed images (flat, no subdirectories)
//!   labels/<name>.txt               normalized-line annotations
//!   labels/<name>.yaml              descriptive annotations
//!   predictions/<name>.txt          detector output for flagged images
//!   predictions/classes.txt         detector class names, one per line
//!   potential_false_negatives.yaml  mining metadata
//!   audit.json                      audit log
//! ```
//!
//! `<name>` is the image file name without its extension.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ReviewError;
use crate::fsutil::{rel_string, write_atomic};
use crate::ir::io_descriptive::DESCRIPTIVE_EXTENSION;
use crate::ir::io_lines::LINES_EXTENSION;
use crate::ir::{LabelVocabulary, UnknownLabelPolicy};

pub const CONFIG_FILE: &str = "project.yaml";
pub const IMAGES_DIR: &str = "images";
pub const LABELS_DIR: &str = "labels";
pub const PREDICTIONS_DIR: &str = "predictions";
pub const CLASSES_FILE: &str = "classes.txt";
pub const METADATA_FILE: &str = "potential_false_negatives.yaml";
pub const AUDIT_FILE: &str = "audit.json";

/// Where every project file lives, relative to one root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join(IMAGES_DIR)
    }

    pub fn labels_dir(&self) -> PathBuf {
        self.root.join(LABELS_DIR)
    }

    pub fn predictions_dir(&self) -> PathBuf {
        self.root.join(PREDICTIONS_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    pub fn audit_path(&self) -> PathBuf {
        self.root.join(AUDIT_FILE)
    }

    pub fn classes_path(&self) -> PathBuf {
        self.predictions_dir().join(CLASSES_FILE)
    }

    /// `labels/<name>.txt` for an image.
    pub fn lines_path(&self, image: &str) -> Result<PathBuf, ReviewError> {
        Ok(self
            .labels_dir()
            .join(format!("{}.{LINES_EXTENSION}", image_stem(image)?)))
    }

    /// `labels/<name>.yaml` for an image.
    pub fn descriptive_path(&self, image: &str) -> Result<PathBuf, ReviewError> {
        Ok(self
            .labels_dir()
            .join(format!("{}.{DESCRIPTIVE_EXTENSION}", image_stem(image)?)))
    }

    /// `predictions/<name>.txt` for an image.
    pub fn prediction_path(&self, image: &str) -> Result<PathBuf, ReviewError> {
        Ok(self
            .predictions_dir()
            .join(format!("{}.{LINES_EXTENSION}", image_stem(image)?)))
    }

    /// Fails with `ProjectStructure` unless `images/` is a readable directory.
    pub fn require_images_dir(&self) -> Result<PathBuf, ReviewError> {
        let dir = self.images_dir();
        match fs::read_dir(&dir) {
            Ok(_) => Ok(dir),
            Err(err) => Err(ReviewError::ProjectStructure {
                path: dir,
                message: format!("images directory is not readable: {err}"),
            }),
        }
    }

    /// Resolves a user-supplied image path to `(absolute path, path relative to root)`.
    ///
    /// Accepts paths relative to the root (`images/a.jpg`), relative to the
    /// images directory (`a.jpg`), or absolute paths inside the root. The
    /// image must sit directly in `images/`, since its annotation files are
    /// keyed by file stem alone.
    pub fn resolve_image(&self, image: &Path) -> Result<(PathBuf, String), ReviewError> {
        let candidates = if image.is_absolute() {
            vec![image.to_path_buf()]
        } else {
            vec![self.root.join(image), self.images_dir().join(image)]
        };

        let images_dir = self.images_dir();
        let mut misplaced = None;
        for candidate in candidates {
            if !candidate.is_file() {
                continue;
            }
            if candidate.parent() == Some(images_dir.as_path()) {
                let rel = rel_string(&self.root, &candidate);
                return Ok((candidate, rel));
            }
            misplaced.get_or_insert(candidate);
        }

        if let Some(path) = misplaced {
            return Err(ReviewError::ProjectStructure {
                path,
                message: format!(
                    "images must sit directly in {}; per-image files are keyed by file stem",
                    images_dir.display()
                ),
            });
        }
        Err(ReviewError::ProjectStructure {
            path: image.to_path_buf(),
            message: format!("image not found under {}", self.root.display()),
        })
    }
}

/// The persisted-file key of an image: its file name without extension.
pub fn image_stem(image: &str) -> Result<String, ReviewError> {
    Path::new(image)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ReviewError::InvalidArgument {
            message: format!("image path '{image}' has no file name"),
        })
}

/// Settings read from `project.yaml`. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Label vocabulary, in class-index order.
    pub labels: Option<Vec<String>>,
    /// Mining flag threshold. Has no built-in default.
    pub confidence_threshold: Option<f64>,
    /// Minimum confidence for a detection to be returned at all.
    pub candidate_cutoff: Option<f64>,
    pub unknown_label_policy: UnknownLabelPolicy,
}

impl ProjectConfig {
    /// Loads `project.yaml` from the layout root; a missing file yields defaults.
    pub fn load(layout: &ProjectLayout) -> Result<Self, ReviewError> {
        let path = layout.config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path).map_err(ReviewError::Io)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self =
            serde_yaml::from_str(&content).map_err(|source| ReviewError::ConfigParse {
                path: path.clone(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Atomically writes `project.yaml`.
    pub fn write(&self, layout: &ProjectLayout) -> Result<(), ReviewError> {
        let path = layout.config_path();
        let yaml = serde_yaml::to_string(self).map_err(|source| ReviewError::ConfigWrite {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, yaml.as_bytes())?;
        info!(path = %path.display(), "updated project config");
        Ok(())
    }

    /// The configured vocabulary, or the default labels.
    pub fn vocabulary(&self) -> LabelVocabulary {
        match &self.labels {
            Some(labels) => LabelVocabulary::new(labels.iter().map(String::as_str)),
            None => LabelVocabulary::default(),
        }
    }

    fn validate(&self) -> Result<(), ReviewError> {
        if let Some(labels) = &self.labels {
            if LabelVocabulary::new(labels.iter().map(String::as_str)).is_empty() {
                return Err(ReviewError::InvalidConfig {
                    message: "labels must contain at least one non-blank name".to_string(),
                });
            }
        }
        check_unit("confidence_threshold", self.confidence_threshold)?;
        check_unit("candidate_cutoff", self.candidate_cutoff)?;
        Ok(())
    }
}

/// Fails with `InvalidConfig` unless `value` is absent or in `[0, 1]`.
pub fn check_unit(name: &str, value: Option<f64>) -> Result<(), ReviewError> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(ReviewError::InvalidConfig {
            message: format!("{name} must be within [0, 1], got {v}"),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_keyed_by_image_stem() {
        let layout = ProjectLayout::new("/proj");
        assert_eq!(
            layout.lines_path("images/frame_01.jpg").unwrap(),
            PathBuf::from("/proj/labels/frame_01.txt")
        );
        assert_eq!(
            layout.descriptive_path("images/frame_01.jpg").unwrap(),
            PathBuf::from("/proj/labels/frame_01.yaml")
        );
        assert_eq!(
            layout.prediction_path("images/frame_01.jpg").unwrap(),
            PathBuf::from("/proj/predictions/frame_01.txt")
        );
        assert_eq!(
            layout.classes_path(),
            PathBuf::from("/proj/predictions/classes.txt")
        );
    }

    #[test]
    fn image_stem_rejects_empty_names() {
        assert!(image_stem("").is_err());
        assert_eq!(image_stem("a.b.png").unwrap(), "a.b");
    }

    #[test]
    fn resolve_image_accepts_root_and_images_relative_paths() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let layout = ProjectLayout::new(temp.path());
        fs::create_dir_all(layout.images_dir()).unwrap();
        fs::write(layout.images_dir().join("a.jpg"), b"x").unwrap();

        let (_, rel) = layout.resolve_image(Path::new("a.jpg")).expect("by name");
        assert_eq!(rel, "images/a.jpg");
        let (_, rel) = layout
            .resolve_image(Path::new("images/a.jpg"))
            .expect("by relative path");
        assert_eq!(rel, "images/a.jpg");

        let err = layout.resolve_image(Path::new("missing.jpg")).unwrap_err();
        assert!(matches!(err, ReviewError::ProjectStructure { .. }));
    }

    #[test]
    fn resolve_image_rejects_nested_images() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let layout = ProjectLayout::new(temp.path());
        fs::create_dir_all(layout.images_dir().join("x")).unwrap();
        fs::write(layout.images_dir().join("x/a.jpg"), b"x").unwrap();
        fs::write(temp.path().join("loose.jpg"), b"x").unwrap();

        for image in ["x/a.jpg", "images/x/a.jpg", "loose.jpg"] {
            let err = layout.resolve_image(Path::new(image)).unwrap_err();
            assert!(
                matches!(err, ReviewError::ProjectStructure { .. }),
                "{image} should be rejected"
            );
        }
    }

    #[test]
    fn require_images_dir_reports_missing_directory() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let layout = ProjectLayout::new(temp.path());
        let err = layout.require_images_dir().unwrap_err();
        assert!(matches!(err, ReviewError::ProjectStructure { .. }));
    }

    #[test]
    fn missing_config_yields_defaults() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let config = ProjectConfig::load(&ProjectLayout::new(temp.path())).expect("load");
        assert_eq!(config, ProjectConfig::default());
        assert_eq!(config.vocabulary().labels(), ["Animal", "Human", "Vehicle"]);
        assert_eq!(config.confidence_threshold, None);
    }

    #[test]
    fn config_file_overrides_defaults() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let layout = ProjectLayout::new(temp.path());
        fs::write(
            layout.config_path(),
            "labels: [Person, Vehicle]\nconfidence_threshold: 0.5\nunknown_label_policy: register\n",
        )
        .unwrap();

        let config = ProjectConfig::load(&layout).expect("load");
        assert_eq!(config.vocabulary().labels(), ["Person", "Vehicle"]);
        assert_eq!(config.confidence_threshold, Some(0.5));
        assert_eq!(config.candidate_cutoff, None);
        assert_eq!(config.unknown_label_policy, UnknownLabelPolicy::Register);
    }

    #[test]
    fn write_then_load_roundtrips() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let layout = ProjectLayout::new(temp.path());
        let config = ProjectConfig {
            labels: Some(vec!["Person".into(), "car".into()]),
            confidence_threshold: Some(0.4),
            ..Default::default()
        };

        config.write(&layout).expect("write");
        assert_eq!(ProjectConfig::load(&layout).expect("load"), config);
    }

    #[test]
    fn config_rejects_out_of_range_threshold_and_unknown_keys() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let layout = ProjectLayout::new(temp.path());

        fs::write(layout.config_path(), "confidence_threshold: 1.5\n").unwrap();
        assert!(matches!(
            ProjectConfig::load(&layout),
            Err(ReviewError::InvalidConfig { .. })
        ));

        fs::write(layout.config_path(), "threshold: 0.5\n").unwrap();
        assert!(matches!(
            ProjectConfig::load(&layout),
            Err(ReviewError::ConfigParse { .. })
        ));
    }
}
