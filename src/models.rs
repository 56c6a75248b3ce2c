use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

/// Sub-pixel image coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn offset_by(&self, from: &Point, to: &Point) -> Point {
        Point::new(self.x + (to.x - from.x), self.y + (to.y - from.y))
    }
}

/// Four corners of a detected marker, in the detector's local order:
/// top-left, top-right, bottom-right, bottom-left of the marker itself.
pub type Quad = [Point; 4];

/// A fiducial marker reported by the external detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: u32,
    pub corners: Quad,
}

impl Marker {
    pub fn new(id: u32, corners: Quad) -> Self {
        Self { id, corners }
    }

    /// Mean of the four corners
    pub fn centroid(&self) -> Point {
        let (sx, sy) = self
            .corners
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point::new(sx / 4.0, sy / 4.0)
    }
}

/// The sheet's true corners in the photograph
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DocumentCorners {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl DocumentCorners {
    /// Corners in clockwise order starting at the top-left
    pub fn as_array(&self) -> [Point; 4] {
        [self.top_left, self.top_right, self.bottom_right, self.bottom_left]
    }
}

/// Axis-aligned box in rectified image space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }

    /// Ordering key used wherever boxes must be sorted deterministically
    pub(crate) fn reading_key(&self) -> (u32, u32, u32, u32) {
        (self.y, self.x, self.width, self.height)
    }
}

/// Boxes sharing an approximate y-coordinate, left to right
pub type Row = Vec<BoundingBox>;

/// Side length of the canonical cell handed to the classifier
pub const CANONICAL_SIZE: u32 = 28;

/// Fixed-size, stroke-normalized digit image (bright ink on black)
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalCell {
    image: GrayImage,
}

impl CanonicalCell {
    /// The all-zero cell used when a crop holds no foreground
    pub fn blank() -> Self {
        Self {
            image: GrayImage::from_pixel(CANONICAL_SIZE, CANONICAL_SIZE, Luma([0u8])),
        }
    }

    pub(crate) fn from_image(image: GrayImage) -> Self {
        debug_assert_eq!(image.dimensions(), (CANONICAL_SIZE, CANONICAL_SIZE));
        Self { image }
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn into_image(self) -> GrayImage {
        self.image
    }

    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn is_blank(&self) -> bool {
        self.image.as_raw().iter().all(|&p| p == 0)
    }
}
