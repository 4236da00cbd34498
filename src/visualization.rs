//! Rendering of labeled matches for visual inspection.
//!
//! Nothing here feeds back into the evaluation: the harness logs rendering
//! failures and moves on.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use log::info;
use thiserror::Error;

use crate::dataset::ImagePair;
use crate::types::DataMatrix;

#[derive(Debug, Error)]
pub enum VisualizationError {
    #[error("{labels} labels for {points} correspondences")]
    LengthMismatch { labels: usize, points: usize },

    #[error("failed to create {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// One labeled correspondence overlay.
pub struct MatchDrawing<'a> {
    pub scene: &'a str,
    pub method: &'a str,
    pub images: &'a ImagePair,
    /// Pixel coordinates `x1 y1 x2 y2`, one row per correspondence.
    pub points: &'a DataMatrix,
    pub labels: &'a [bool],
}

pub trait MatchRenderer {
    fn render(&mut self, drawing: &MatchDrawing<'_>) -> Result<(), VisualizationError>;
}

const PALETTE: [[u8; 3]; 6] = [
    [230, 25, 75],
    [60, 180, 75],
    [255, 225, 25],
    [0, 130, 200],
    [245, 130, 48],
    [145, 30, 180],
];

const ENDPOINT_RADIUS: i32 = 4;

/// Writes `<output_dir>/<scene>_<method>.png` with both images side by side
/// and every inlier match drawn across them.
pub struct MatchImageWriter {
    output_dir: PathBuf,
}

impl MatchImageWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn output_path(&self, scene: &str, method: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.png", file_slug(scene), file_slug(method)))
    }
}

/// Lowercase, `+` spelled out as `p`, anything else non-alphanumeric as `_`.
fn file_slug(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '+' => 'p',
            c if c.is_ascii_alphanumeric() => c.to_ascii_lowercase(),
            _ => '_',
        })
        .collect()
}

/// Side-by-side canvas with the inlier matches drawn on it.
pub fn compose_matches(drawing: &MatchDrawing<'_>) -> Result<RgbImage, VisualizationError> {
    let points = drawing.points;
    if drawing.labels.len() != points.nrows() {
        return Err(VisualizationError::LengthMismatch {
            labels: drawing.labels.len(),
            points: points.nrows(),
        });
    }

    let source = &drawing.images.source;
    let destination = &drawing.images.destination;
    let offset = source.width() as f32;
    let mut canvas = RgbImage::new(
        source.width() + destination.width(),
        source.height().max(destination.height()),
    );
    imageops::replace(&mut canvas, source, 0, 0);
    imageops::replace(&mut canvas, destination, i64::from(source.width()), 0);

    let inliers = drawing
        .labels
        .iter()
        .enumerate()
        .filter_map(|(row, &inlier)| inlier.then_some(row));
    for (n, row) in inliers.enumerate() {
        let color = Rgb(PALETTE[n % PALETTE.len()]);
        let start = (points[(row, 0)] as f32, points[(row, 1)] as f32);
        let end = (points[(row, 2)] as f32 + offset, points[(row, 3)] as f32);
        draw_line_segment_mut(&mut canvas, start, end, color);
        for (x, y) in [start, end] {
            draw_hollow_circle_mut(
                &mut canvas,
                (x.round() as i32, y.round() as i32),
                ENDPOINT_RADIUS,
                color,
            );
        }
    }
    Ok(canvas)
}

impl MatchRenderer for MatchImageWriter {
    fn render(&mut self, drawing: &MatchDrawing<'_>) -> Result<(), VisualizationError> {
        let canvas = compose_matches(drawing)?;
        let path = self.output_path(drawing.scene, drawing.method);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| VisualizationError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        canvas
            .save(&path)
            .map_err(|source| VisualizationError::Encode {
                path: path.clone(),
                source,
            })?;
        info!("Matches written to {}", path.display());
        Ok(())
    }
}

/// Block until the user presses Enter.
pub fn wait_for_acknowledgement() -> io::Result<()> {
    let mut stdout = io::stdout();
    writeln!(stdout, "Press a button to continue.")?;
    stdout.flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> ImagePair {
        ImagePair {
            source: RgbImage::from_pixel(20, 10, Rgb([10, 10, 10])),
            destination: RgbImage::from_pixel(30, 16, Rgb([200, 200, 200])),
        }
    }

    #[test]
    fn canvas_holds_both_images() {
        let images = pair();
        let points = DataMatrix::from_row_slice(1, 4, &[5.0, 5.0, 5.0, 5.0]);
        let canvas = compose_matches(&MatchDrawing {
            scene: "s",
            method: "m",
            images: &images,
            points: &points,
            labels: &[false],
        })
        .unwrap();
        assert_eq!(canvas.dimensions(), (50, 16));
        assert_eq!(canvas.get_pixel(2, 2), &Rgb([10, 10, 10]));
        assert_eq!(canvas.get_pixel(45, 14), &Rgb([200, 200, 200]));
        // Below the shorter source image stays black.
        assert_eq!(canvas.get_pixel(2, 14), &Rgb([0, 0, 0]));
    }

    #[test]
    fn only_inliers_are_drawn() {
        let images = pair();
        let points = DataMatrix::from_row_slice(2, 4, &[2.0, 2.0, 2.0, 2.0, 2.0, 8.0, 2.0, 8.0]);
        let canvas = compose_matches(&MatchDrawing {
            scene: "s",
            method: "m",
            images: &images,
            points: &points,
            labels: &[true, false],
        })
        .unwrap();
        assert_eq!(canvas.get_pixel(10, 2), &Rgb(PALETTE[0]));
        assert_eq!(canvas.get_pixel(10, 8), &Rgb([10, 10, 10]));
    }

    #[test]
    fn mismatched_labels_are_rejected() {
        let images = pair();
        let points = DataMatrix::zeros(3, 4);
        let result = compose_matches(&MatchDrawing {
            scene: "s",
            method: "m",
            images: &images,
            points: &points,
            labels: &[true],
        });
        assert!(matches!(
            result,
            Err(VisualizationError::LengthMismatch { labels: 1, points: 3 })
        ));
    }

    #[test]
    fn writer_saves_one_png_per_scene_and_method() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = MatchImageWriter::new(dir.path().join("out"));
        let images = pair();
        let points = DataMatrix::from_row_slice(1, 4, &[1.0, 1.0, 3.0, 3.0]);
        writer
            .render(&MatchDrawing {
                scene: "extremeview/adam",
                method: "MAGSAC++",
                images: &images,
                points: &points,
                labels: &[true],
            })
            .unwrap();

        let path = writer.output_path("extremeview/adam", "MAGSAC++");
        assert!(path.ends_with("extremeview_adam_magsacpp.png"));
        assert_eq!(image::open(&path).unwrap().width(), 50);
    }
}
