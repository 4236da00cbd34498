//! Correspondence and label store, plus the on-disk benchmark layout.
//!
//! A scene lives under `<root>/<family folder>/` as
//! - `<scene>_pts.txt`: whitespace-separated `x1 y1 x2 y2` rows, followed by
//!   a `0`/`1` reference label on homography and fundamental matrix scenes;
//! - `<scene>A.png` / `<scene>B.png` (`1`/`2` for essential matrix scenes),
//!   with `.jpg` as the fallback extension;
//! - `<scene>1.K` / `<scene>2.K`: row-major 3x3 intrinsics, essential matrix
//!   scenes only.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::RgbImage;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DataMatrix, CORRESPONDENCE_COLS};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("{path}: no correspondences")]
    Empty { path: PathBuf },

    #[error("failed to load image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("unknown dataset '{0}'")]
    UnknownDataset(String),
}

/// Per-correspondence inlier flags, parallel to a correspondence matrix.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Labeling(Vec<bool>);

impl Labeling {
    pub fn new(labels: Vec<bool>) -> Self {
        Self(labels)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn inlier_count(&self) -> usize {
        self.0.iter().filter(|&&inlier| inlier).count()
    }

    pub fn inlier_indices(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(i, &inlier)| inlier.then_some(i))
            .collect()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }
}

impl From<Vec<bool>> for Labeling {
    fn from(labels: Vec<bool>) -> Self {
        Self(labels)
    }
}

/// Correspondences with the human-provided reference labeling.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedCorrespondences {
    pub points: DataMatrix,
    pub labels: Labeling,
}

fn read_to_string(path: &Path) -> Result<String, DatasetError> {
    std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_numbers(text: &str, path: &Path) -> Result<Vec<f64>, DatasetError> {
    text.split_whitespace()
        .enumerate()
        .map(|(i, token)| {
            token.parse::<f64>().map_err(|_| DatasetError::Parse {
                path: path.to_path_buf(),
                message: format!("value #{} ('{token}') is not a number", i + 1),
            })
        })
        .collect()
}

/// Split a flat number stream into rows of `columns` values.
fn parse_rows(text: &str, columns: usize, path: &Path) -> Result<DataMatrix, DatasetError> {
    let values = parse_numbers(text, path)?;
    if values.is_empty() {
        return Err(DatasetError::Empty {
            path: path.to_path_buf(),
        });
    }
    if values.len() % columns != 0 {
        return Err(DatasetError::Parse {
            path: path.to_path_buf(),
            message: format!(
                "{} values do not form rows of {columns} columns",
                values.len()
            ),
        });
    }
    Ok(DataMatrix::from_row_slice(
        values.len() / columns,
        columns,
        &values,
    ))
}

/// Parse `x1 y1 x2 y2 label` rows; labels must be exactly 0 or 1.
pub fn parse_annotated_points(
    text: &str,
    path: &Path,
) -> Result<AnnotatedCorrespondences, DatasetError> {
    let rows = parse_rows(text, CORRESPONDENCE_COLS + 1, path)?;
    let mut labels = Vec::with_capacity(rows.nrows());
    for (row, label) in rows.column(CORRESPONDENCE_COLS).iter().enumerate() {
        match *label {
            l if l == 0.0 => labels.push(false),
            l if l == 1.0 => labels.push(true),
            other => {
                return Err(DatasetError::Parse {
                    path: path.to_path_buf(),
                    message: format!("row {} has label {other}, expected 0 or 1", row + 1),
                })
            }
        }
    }
    Ok(AnnotatedCorrespondences {
        points: rows.columns(0, CORRESPONDENCE_COLS).into_owned(),
        labels: Labeling::new(labels),
    })
}

pub fn read_annotated_points(path: &Path) -> Result<AnnotatedCorrespondences, DatasetError> {
    parse_annotated_points(&read_to_string(path)?, path)
}

/// Parse unlabeled `x1 y1 x2 y2` rows.
pub fn parse_points(text: &str, path: &Path) -> Result<DataMatrix, DatasetError> {
    parse_rows(text, CORRESPONDENCE_COLS, path)
}

pub fn read_points(path: &Path) -> Result<DataMatrix, DatasetError> {
    parse_points(&read_to_string(path)?, path)
}

/// Parse a 3x3 matrix given as nine row-major numbers.
pub fn parse_intrinsics(text: &str, path: &Path) -> Result<Matrix3<f64>, DatasetError> {
    let values = parse_numbers(text, path)?;
    if values.len() != 9 {
        return Err(DatasetError::Parse {
            path: path.to_path_buf(),
            message: format!("expected 9 intrinsics values, found {}", values.len()),
        });
    }
    Ok(Matrix3::from_row_slice(&values))
}

pub fn read_intrinsics(path: &Path) -> Result<Matrix3<f64>, DatasetError> {
    parse_intrinsics(&read_to_string(path)?, path)
}

/// Geometric model family of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneKind {
    Homography,
    FundamentalMatrix,
    EssentialMatrix,
}

impl SceneKind {
    pub fn name(&self) -> &'static str {
        match self {
            SceneKind::Homography => "Homography",
            SceneKind::FundamentalMatrix => "Fundamental matrix",
            SceneKind::EssentialMatrix => "Essential matrix",
        }
    }

    /// Folder below the data root holding this family's scenes.
    pub fn folder(&self) -> &'static str {
        match self {
            SceneKind::Homography => "homography",
            SceneKind::FundamentalMatrix => "fundamental_matrix",
            SceneKind::EssentialMatrix => "essential_matrix",
        }
    }

    fn image_suffixes(&self) -> (&'static str, &'static str) {
        match self {
            SceneKind::EssentialMatrix => ("1", "2"),
            _ => ("A", "B"),
        }
    }

    /// Whether the scene needs intrinsics to normalize its correspondences.
    pub fn is_calibrated(&self) -> bool {
        matches!(self, SceneKind::EssentialMatrix)
    }
}

impl fmt::Display for SceneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Built-in benchmark datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dataset {
    ExtremeView,
    Homogr,
    Kusvod2,
    AdelaideRmf,
    MultiH,
    Strecha,
}

impl Dataset {
    /// Every dataset, in benchmark run order.
    pub const ALL: [Dataset; 6] = [
        Dataset::ExtremeView,
        Dataset::Homogr,
        Dataset::Kusvod2,
        Dataset::AdelaideRmf,
        Dataset::MultiH,
        Dataset::Strecha,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Dataset::ExtremeView => "extremeview",
            Dataset::Homogr => "homogr",
            Dataset::Kusvod2 => "kusvod2",
            Dataset::AdelaideRmf => "adelaidermf",
            Dataset::MultiH => "multih",
            Dataset::Strecha => "strecha",
        }
    }

    pub fn kind(&self) -> SceneKind {
        match self {
            Dataset::ExtremeView | Dataset::Homogr => SceneKind::Homography,
            Dataset::Kusvod2 | Dataset::AdelaideRmf | Dataset::MultiH => {
                SceneKind::FundamentalMatrix
            }
            Dataset::Strecha => SceneKind::EssentialMatrix,
        }
    }

    /// Scene names, relative to the family folder.
    pub fn scenes(&self) -> &'static [&'static str] {
        match self {
            Dataset::ExtremeView => &[
                "extremeview/adam",
                "extremeview/cafe",
                "extremeview/cat",
                "extremeview/dum",
                "extremeview/face",
                "extremeview/fox",
                "extremeview/girl",
                "extremeview/graf",
                "extremeview/grand",
                "extremeview/index",
                "extremeview/mag",
                "extremeview/pkk",
                "extremeview/shop",
                "extremeview/there",
                "extremeview/vin",
            ],
            Dataset::Homogr => &[
                "LePoint1",
                "LePoint2",
                "LePoint3",
                "graf",
                "ExtremeZoom",
                "city",
                "CapitalRegion",
                "BruggeTower",
                "BruggeSquare",
                "BostonLib",
                "boat",
                "adam",
                "WhiteBoard",
                "Eiffel",
                "Brussels",
                "Boston",
            ],
            Dataset::Kusvod2 => &[
                "corr", "booksh", "box", "castle", "graff", "head", "kampa", "leafs", "plant",
                "rotunda", "shout", "valbonne", "wall", "wash", "zoom", "Kyoto",
            ],
            Dataset::AdelaideRmf => &[
                "barrsmith",
                "bonhall",
                "bonython",
                "elderhalla",
                "elderhallb",
                "hartley",
                "johnssonb",
                "ladysymon",
                "library",
                "napiera",
                "napierb",
                "nese",
                "oldclassicswing",
                "physics",
                "sene",
                "unihouse",
                "unionhouse",
            ],
            Dataset::MultiH => &["boxesandbooks", "glasscaseb", "stairs"],
            Dataset::Strecha => &["fountain"],
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dataset {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Dataset::ALL
            .into_iter()
            .find(|d| d.name() == lowered)
            .ok_or_else(|| DatasetError::UnknownDataset(s.to_string()))
    }
}

/// File locations of one scene.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenePaths {
    pub scene: String,
    pub kind: SceneKind,
    pub points: PathBuf,
    source_image_stem: PathBuf,
    destination_image_stem: PathBuf,
    pub source_intrinsics: PathBuf,
    pub destination_intrinsics: PathBuf,
}

/// Image extensions tried in order.
pub const IMAGE_EXTENSIONS: [&str; 2] = ["png", "jpg"];

impl ScenePaths {
    pub fn new(data_root: &Path, kind: SceneKind, scene: &str) -> Self {
        let folder = data_root.join(kind.folder());
        let at = |suffix: &str| folder.join(format!("{scene}{suffix}"));
        let (a, b) = kind.image_suffixes();
        Self {
            scene: scene.to_string(),
            kind,
            points: at("_pts.txt"),
            source_image_stem: at(a),
            destination_image_stem: at(b),
            source_intrinsics: at("1.K"),
            destination_intrinsics: at("2.K"),
        }
    }

    /// Candidate paths of the source and destination images for `extension`.
    pub fn image_paths(&self, extension: &str) -> (PathBuf, PathBuf) {
        let with = |stem: &Path| {
            let mut path = stem.as_os_str().to_owned();
            path.push(".");
            path.push(extension);
            PathBuf::from(path)
        };
        (
            with(&self.source_image_stem),
            with(&self.destination_image_stem),
        )
    }
}

/// Source and destination images of a scene.
pub struct ImagePair {
    pub source: RgbImage,
    pub destination: RgbImage,
}

/// Load both images, trying each of [`IMAGE_EXTENSIONS`] in turn.
pub fn load_image_pair(paths: &ScenePaths) -> Result<ImagePair, DatasetError> {
    let mut last_error = None;
    for extension in IMAGE_EXTENSIONS {
        let (source_path, destination_path) = paths.image_paths(extension);
        let loaded = image::open(&source_path)
            .map_err(|source| DatasetError::Image {
                path: source_path,
                source,
            })
            .and_then(|source| {
                image::open(&destination_path)
                    .map(|destination| (source, destination))
                    .map_err(|source| DatasetError::Image {
                        path: destination_path,
                        source,
                    })
            });
        match loaded {
            Ok((source, destination)) => {
                return Ok(ImagePair {
                    source: source.to_rgb8(),
                    destination: destination.to_rgb8(),
                })
            }
            Err(err) => last_error = Some(err),
        }
    }
    Err(last_error.unwrap_or_else(|| DatasetError::Parse {
        path: paths.points.clone(),
        message: "no image extension to try".to_string(),
    }))
}
