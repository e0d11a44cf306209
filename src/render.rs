// src/render.rs

//! Output collaborators: a PNG scatter plot of a Point snapshot and a JSON
//! dump of the raw Points.
//!
//! Both read a snapshot taken from a `PointSink`; neither touches the engine.

use crate::engine::accumulator::Point;
use anyhow::{Context, Result};
use image::{Pixel, Rgba, RgbaImage};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

pub const DEFAULT_WIDTH: u32 = 500;
pub const DEFAULT_HEIGHT: u32 = 500;
pub const DEFAULT_RADIUS_PX: f64 = 240.0;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const INK: Rgba<u8> = Rgba([255, 0, 0, 200]);

/// Plots lane Points as single pixels.
///
/// The cloud is centred on its mean and scaled so the farthest finite Point
/// lands `radius_px` from the canvas centre. The imaginary axis points up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointRenderer {
    width: u32,
    height: u32,
    radius_px: f64,
}

impl Default for PointRenderer {
    fn default() -> Self {
        PointRenderer::new(DEFAULT_WIDTH, DEFAULT_HEIGHT, DEFAULT_RADIUS_PX)
    }
}

impl PointRenderer {
    pub fn new(width: u32, height: u32, radius_px: f64) -> Self {
        PointRenderer {
            width,
            height,
            radius_px,
        }
    }

    /// Canvas coordinates for every finite Point, in lane order.
    pub fn project(&self, points: &[Point]) -> Vec<(f64, f64)> {
        let finite: Vec<Point> = points.iter().copied().filter(|p| p.is_finite()).collect();
        let skipped = points.len() - finite.len();
        if skipped > 0 {
            warn!("PointRenderer: skipping {} non-finite points", skipped);
        }
        if finite.is_empty() {
            return Vec::new();
        }

        let mean = finite.iter().sum::<Point>() / finite.len() as f64;
        let max_modulus = finite
            .iter()
            .map(|p| (p - mean).norm())
            .fold(0.0, f64::max);
        let scale = if max_modulus > 0.0 {
            self.radius_px / max_modulus
        } else {
            1.0
        };
        let cx = f64::from(self.width) / 2.0;
        let cy = f64::from(self.height) / 2.0;

        finite
            .iter()
            .map(|p| {
                let d = (p - mean) * scale;
                (cx + d.re, cy - d.im)
            })
            .collect()
    }

    pub fn render(&self, points: &[Point]) -> RgbaImage {
        let mut image = RgbaImage::from_pixel(self.width, self.height, BACKGROUND);
        let mut ink = BACKGROUND;
        ink.blend(&INK);

        for (x, y) in self.project(points) {
            let (px, py) = (x.round(), y.round());
            if px < 0.0 || py < 0.0 {
                continue;
            }
            let (px, py) = (px as u32, py as u32);
            if px < self.width && py < self.height {
                image.put_pixel(px, py, ink);
            }
        }
        image
    }

    pub fn save(&self, points: &[Point], path: &Path) -> Result<()> {
        self.render(points)
            .save(path)
            .with_context(|| format!("Failed to write image to {}", path.display()))?;
        info!("Saved {} points to {}", points.len(), path.display());
        Ok(())
    }
}

/// On-disk form of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointDump {
    pub parallelism: u32,
    pub iterations: u64,
    /// Lane-ordered `[re, im]` pairs.
    pub points: Vec<Point>,
}

impl PointDump {
    pub fn write(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create dump file {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)
            .with_context(|| format!("Failed to serialize points to {}", path.display()))?;
        writer
            .flush()
            .with_context(|| format!("Failed to flush dump file {}", path.display()))?;
        info!("Dumped {} points to {}", self.points.len(), path.display());
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open dump file {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse dump file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn it_should_centre_and_scale_projected_points() {
        let renderer = PointRenderer::new(100, 100, 40.0);
        let points = [Point::new(1.0, 1.0), Point::new(3.0, 1.0)];
        let projected = renderer.project(&points);
        assert_eq!(projected, vec![(10.0, 50.0), (90.0, 50.0)]);
    }

    #[test_log::test]
    fn it_should_put_the_imaginary_axis_upwards() {
        let renderer = PointRenderer::new(100, 100, 40.0);
        let projected = renderer.project(&[Point::new(0.0, -1.0), Point::new(0.0, 1.0)]);
        assert_eq!(projected, vec![(50.0, 90.0), (50.0, 10.0)]);
    }

    #[test_log::test]
    fn it_should_place_coincident_points_at_the_centre() {
        let renderer = PointRenderer::new(10, 20, 4.0);
        let projected = renderer.project(&[Point::new(1.0, 0.0); 4]);
        assert!(projected.iter().all(|&p| p == (5.0, 10.0)));
    }

    #[test_log::test]
    fn it_should_skip_non_finite_points() {
        let renderer = PointRenderer::default();
        let points = [Point::new(f64::NAN, 0.0), Point::new(2.0, 0.0)];
        assert_eq!(renderer.project(&points).len(), 1);
        assert!(renderer.project(&[Point::new(f64::INFINITY, 0.0)]).is_empty());
    }

    #[test_log::test]
    fn it_should_draw_blended_ink_on_a_white_canvas() {
        let renderer = PointRenderer::new(20, 20, 8.0);
        let image = renderer.render(&[Point::new(-1.0, 0.0), Point::new(1.0, 0.0)]);
        assert_eq!(image.dimensions(), (20, 20));
        assert_eq!(*image.get_pixel(0, 0), BACKGROUND);

        let left = *image.get_pixel(2, 10);
        let right = *image.get_pixel(18, 10);
        assert_eq!(left, right);
        assert_eq!(left[0], 255);
        assert!(left[1] < 255 && left[2] < 255);
    }

    #[test_log::test]
    fn it_should_write_a_dump_that_reads_back() -> Result<()> {
        let path = std::env::temp_dir().join(format!("subserial-dump-{}.json", std::process::id()));
        let dump = PointDump {
            parallelism: 1,
            iterations: 3,
            points: vec![Point::new(1.0, 0.0), Point::new(7.0, -0.5)],
        };
        dump.write(&path)?;

        let text = std::fs::read_to_string(&path)?;
        assert!(text.contains("\"points\":[[1.0,0.0],[7.0,-0.5]]"));
        assert_eq!(PointDump::read(&path)?, dump);

        std::fs::remove_file(&path)?;
        Ok(())
    }

    #[cfg(target_os = "linux")]
    #[test_log::test]
    fn it_should_report_a_dump_that_cannot_be_flushed() {
        let dump = PointDump {
            parallelism: 1,
            iterations: 0,
            points: vec![Point::new(1.0, 0.0); 2],
        };
        // Small enough to sit in the write buffer until the flush.
        let err = dump.write(Path::new("/dev/full")).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to flush dump file"));
    }
}
