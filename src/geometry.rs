//! Geometry primitives for word highlighting. Bounding boxes are authored
//! against a fixed reference page size and mapped into whatever size the page
//! image is currently rendered at.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Nominal page dimensions the bundled highlight geometry is authored against.
pub const REFERENCE_PAGE_SIZE: PageSize = PageSize {
    width: 612.0,
    height: 774.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub(crate) fn is_positive(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle described by its top-left and bottom-right corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub top_left: Point,
    pub bottom_right: Point,
}

impl BoundingBox {
    pub fn new(top_left: Point, bottom_right: Point) -> Self {
        Self {
            top_left,
            bottom_right,
        }
    }

    pub fn from_corners(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self::new(Point::new(x0, y0), Point::new(x1, y1))
    }

    pub fn width(&self) -> f32 {
        self.bottom_right.x - self.top_left.x
    }

    pub fn height(&self) -> f32 {
        self.bottom_right.y - self.top_left.y
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::from_corners(
            self.top_left.x.min(other.top_left.x),
            self.top_left.y.min(other.top_left.y),
            self.bottom_right.x.max(other.bottom_right.x),
            self.bottom_right.y.max(other.bottom_right.y),
        )
    }

    /// Grow the box outward by `margin` on every side.
    pub fn expand(&self, margin: f32) -> BoundingBox {
        BoundingBox::from_corners(
            self.top_left.x - margin,
            self.top_left.y - margin,
            self.bottom_right.x + margin,
            self.bottom_right.y + margin,
        )
    }

    pub fn translate(&self, dx: f32, dy: f32) -> BoundingBox {
        BoundingBox::from_corners(
            self.top_left.x + dx,
            self.top_left.y + dy,
            self.bottom_right.x + dx,
            self.bottom_right.y + dy,
        )
    }
}

/// Maps coordinates from reference page space into rendered image space.
///
/// The horizontal and vertical factors are independent; a scaler stays valid
/// until the rendered size changes (rotation, window resize), at which point a
/// new one must be constructed.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateScaler {
    scale_x: f32,
    scale_y: f32,
}

impl CoordinateScaler {
    pub fn new(reference: PageSize, rendered: PageSize) -> Result<Self> {
        if !reference.is_positive() {
            bail!(
                "Reference page size must have positive finite dimensions, got {}x{}",
                reference.width,
                reference.height
            );
        }
        if !rendered.width.is_finite() || !rendered.height.is_finite() {
            bail!(
                "Rendered size must be finite, got {}x{}",
                rendered.width,
                rendered.height
            );
        }
        Ok(Self {
            scale_x: rendered.width / reference.width,
            scale_y: rendered.height / reference.height,
        })
    }

    pub fn scale_x(&self) -> f32 {
        self.scale_x
    }

    pub fn scale_y(&self) -> f32 {
        self.scale_y
    }

    pub fn scale_point(&self, point: Point) -> Point {
        Point::new(point.x * self.scale_x, point.y * self.scale_y)
    }

    pub fn scale_box(&self, bbox: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.scale_point(bbox.top_left),
            self.scale_point(bbox.bottom_right),
        )
    }
}

/// Express a box as percentages of the given page size.
///
/// Together with [`percentages_to_box`] this forms a resolution-independent
/// representation: convert once against the reference size, then materialize
/// at any target size.
pub fn box_to_percentages(bbox: &BoundingBox, reference: PageSize) -> Result<BoundingBox> {
    if !reference.is_positive() {
        bail!(
            "Cannot express box as percentages of a {}x{} page",
            reference.width,
            reference.height
        );
    }
    Ok(BoundingBox::from_corners(
        bbox.top_left.x / reference.width * 100.0,
        bbox.top_left.y / reference.height * 100.0,
        bbox.bottom_right.x / reference.width * 100.0,
        bbox.bottom_right.y / reference.height * 100.0,
    ))
}

/// Materialize a percentage box at an absolute target size.
pub fn percentages_to_box(percentages: &BoundingBox, target: PageSize) -> BoundingBox {
    BoundingBox::from_corners(
        percentages.top_left.x / 100.0 * target.width,
        percentages.top_left.y / 100.0 * target.height,
        percentages.bottom_right.x / 100.0 * target.width,
        percentages.bottom_right.y / 100.0 * target.height,
    )
}
