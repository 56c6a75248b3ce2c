use anyhow::Context;
use image::{GrayImage, Luma};
use std::cmp::Ordering;
use std::path::Path;

use crate::config::CornerStrategy;
use crate::error::{Result, SegmentError, SegmentErrorKind};
use crate::models::{DocumentCorners, Marker, Point};

/// Source of fiducial marker detections.
///
/// Detection itself lives outside this crate; implementations wrap whatever
/// detector the host process uses.
pub trait MarkerDetector: Send + Sync {
    fn detect(&self, image: &GrayImage) -> anyhow::Result<Vec<Marker>>;
}

/// Replays detections that were produced ahead of time and stored as JSON:
/// `[{"id": 1, "corners": [{"x": .., "y": ..}, ...]}, ...]`
#[derive(Debug, Clone, Default)]
pub struct MarkerFile {
    markers: Vec<Marker>,
}

impl MarkerFile {
    pub fn new(markers: Vec<Marker>) -> Self {
        Self { markers }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read marker file {}", path.display()))?;
        let markers: Vec<Marker> = serde_json::from_str(&text)
            .with_context(|| format!("Invalid marker file {}", path.display()))?;
        Ok(Self { markers })
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }
}

impl MarkerDetector for MarkerFile {
    fn detect(&self, _image: &GrayImage) -> anyhow::Result<Vec<Marker>> {
        Ok(self.markers.clone())
    }
}

/// Force dark pixels to pure black so shadows around the printed markers
/// don't break their borders.
pub fn prepare_for_detection(gray: &GrayImage, floor: Option<u8>) -> GrayImage {
    match floor {
        Some(floor) => imageproc::map::map_colors(gray, |Luma([v])| {
            if v <= floor { Luma([0u8]) } else { Luma([v]) }
        }),
        None => gray.clone(),
    }
}

/// Resolve the sheet corners from detected markers
pub fn resolve_corners(markers: &[Marker], strategy: CornerStrategy) -> Result<DocumentCorners> {
    let corners = match strategy {
        CornerStrategy::Generic4 => generic_corners(markers),
        CornerStrategy::FixedId3 => fixed_id_corners(markers),
    };
    corners.map_err(|e| e.with_markers(markers.len()))
}

const GENERIC_REQUIRED: usize = 4;
const ANCHOR_IDS: [u32; 3] = [1, 2, 3];

fn by_position(a: &(Point, &Marker), b: &(Point, &Marker)) -> Ordering {
    a.0.y
        .total_cmp(&b.0.y)
        .then(a.0.x.total_cmp(&b.0.x))
        .then(a.1.id.cmp(&b.1.id))
}

fn by_column(a: &(Point, &Marker), b: &(Point, &Marker)) -> Ordering {
    a.0.x.total_cmp(&b.0.x).then(a.1.id.cmp(&b.1.id))
}

/// Each corner is read from a specific corner of a specific marker rather
/// than from marker centers: the printed markers sit inside the sheet
/// corners at a fixed offset.
fn generic_corners(markers: &[Marker]) -> Result<DocumentCorners> {
    if markers.len() < GENERIC_REQUIRED {
        return Err(SegmentErrorKind::InsufficientMarkers {
            required: GENERIC_REQUIRED,
            found: markers.len(),
        }
        .into());
    }

    let mut placed: Vec<(Point, &Marker)> = markers.iter().map(|m| (m.centroid(), m)).collect();
    placed.sort_by(by_position);

    let mut top = [placed[0], placed[1]];
    let mut bottom = [placed[placed.len() - 2], placed[placed.len() - 1]];
    top.sort_by(by_column);
    bottom.sort_by(by_column);

    Ok(DocumentCorners {
        top_left: top[0].1.corners[0],
        top_right: top[1].1.corners[1],
        bottom_right: bottom[1].1.corners[2],
        bottom_left: bottom[0].1.corners[3],
    })
}

/// Bottom-right is completed as the fourth vertex of a parallelogram, which
/// ignores perspective foreshortening along the sheet's height.
fn fixed_id_corners(markers: &[Marker]) -> Result<DocumentCorners> {
    if markers.len() < ANCHOR_IDS.len() {
        return Err(SegmentErrorKind::InsufficientMarkers {
            required: ANCHOR_IDS.len(),
            found: markers.len(),
        }
        .into());
    }

    let anchor = |id: u32| -> Result<&Marker> {
        markers
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| SegmentError::new(SegmentErrorKind::MissingAnchor { id }))
    };
    let top_left = anchor(ANCHOR_IDS[0])?.corners[0];
    let top_right = anchor(ANCHOR_IDS[1])?.corners[1];
    let bottom_left = anchor(ANCHOR_IDS[2])?.corners[3];

    Ok(DocumentCorners {
        top_left,
        top_right,
        bottom_right: bottom_left.offset_by(&top_left, &top_right),
        bottom_left,
    })
}
