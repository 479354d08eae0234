//! Bounding boxes produced by judges.

use serde::{Deserialize, Serialize};

/// A point in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartesianCoordinate2D {
    pub x: f64,
    pub y: f64,
}

impl CartesianCoordinate2D {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A labeled, scored detection box.
///
/// Built from detector corners; the center is always the midpoint of the
/// corners and the min corner never exceeds the max corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    box_coordinates_min: CartesianCoordinate2D,
    box_coordinates_max: CartesianCoordinate2D,
    box_coordinates_center: CartesianCoordinate2D,
    label: String,
    score: f64,
}

impl BoundingBox {
    /// Build a box from two corners. Corners are reordered per axis if needed.
    #[must_use]
    pub fn from_corners(
        xmin: f64,
        ymin: f64,
        xmax: f64,
        ymax: f64,
        label: impl Into<String>,
        score: f64,
    ) -> Self {
        let (xmin, xmax) = if xmin <= xmax { (xmin, xmax) } else { (xmax, xmin) };
        let (ymin, ymax) = if ymin <= ymax { (ymin, ymax) } else { (ymax, ymin) };

        Self {
            box_coordinates_min: CartesianCoordinate2D::new(xmin, ymin),
            box_coordinates_max: CartesianCoordinate2D::new(xmax, ymax),
            box_coordinates_center: CartesianCoordinate2D::new(
                (xmin + xmax) / 2.0,
                (ymin + ymax) / 2.0,
            ),
            label: label.into(),
            score,
        }
    }

    #[must_use]
    pub fn min(&self) -> CartesianCoordinate2D {
        self.box_coordinates_min
    }

    #[must_use]
    pub fn max(&self) -> CartesianCoordinate2D {
        self.box_coordinates_max
    }

    #[must_use]
    pub fn center(&self) -> CartesianCoordinate2D {
        self.box_coordinates_center
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn score(&self) -> f64 {
        self.score
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.box_coordinates_max.x - self.box_coordinates_min.x
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.box_coordinates_max.y - self.box_coordinates_min.y
    }
}
