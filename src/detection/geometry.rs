//! Plane homography from four correspondences and perspective rectification.

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

use crate::error::{Result, SegmentError};
use crate::models::{DocumentCorners, Point};

const EPS: f64 = 1e-12;
/// Relative area below which three corners count as collinear
const COLLINEAR_TOLERANCE: f64 = 1e-9;

/// Projective transform between two planes, normalized so that h33 = 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    /// Exact solve of the homography mapping `src[i]` onto `dst[i]`.
    pub fn from_correspondences(src: &[Point; 4], dst: &[Point; 4]) -> Result<Self> {
        ensure_not_collinear(src, "source")?;
        ensure_not_collinear(dst, "target")?;

        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
            let r = 2 * i;
            // u = (h11 x + h12 y + h13) / (h31 x + h32 y + 1)
            a[(r, 0)] = s.x;
            a[(r, 1)] = s.y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -d.x * s.x;
            a[(r, 7)] = -d.x * s.y;
            b[r] = d.x;
            // v = (h21 x + h22 y + h23) / (h31 x + h32 y + 1)
            a[(r + 1, 3)] = s.x;
            a[(r + 1, 4)] = s.y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -d.y * s.x;
            a[(r + 1, 7)] = -d.y * s.y;
            b[r + 1] = d.y;
        }

        let h = a
            .lu()
            .solve(&b)
            .ok_or_else(|| SegmentError::degenerate("correspondence system is singular"))?;
        let matrix = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);

        let det = matrix.determinant();
        if !det.is_finite() || det.abs() < EPS || matrix.iter().any(|v| !v.is_finite()) {
            return Err(SegmentError::degenerate("homography is not invertible"));
        }
        Ok(Self { matrix })
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Map a point through the transform; `None` for points on the line at
    /// infinity.
    pub fn project(&self, p: Point) -> Option<Point> {
        let v = self.matrix * Vector3::new(p.x, p.y, 1.0);
        if !v[2].is_finite() || v[2].abs() < EPS {
            return None;
        }
        Some(Point::new(v[0] / v[2], v[1] / v[2]))
    }

    pub fn inverse(&self) -> Option<Homography> {
        let inv = self.matrix.try_inverse()?;
        let scale = inv[(2, 2)];
        let matrix = if scale.abs() < EPS { inv } else { inv / scale };
        Some(Self { matrix })
    }

    fn to_projection(self) -> Option<Projection> {
        let m = &self.matrix;
        let mut row_major = [0f32; 9];
        for r in 0..3 {
            for c in 0..3 {
                row_major[r * 3 + c] = m[(r, c)] as f32;
            }
        }
        Projection::from_matrix(row_major)
    }
}

fn ensure_not_collinear(points: &[Point; 4], which: &str) -> Result<()> {
    let span = points
        .iter()
        .flat_map(|a| points.iter().map(move |b| a.distance(b)))
        .fold(0.0_f64, f64::max);
    if span < EPS {
        return Err(SegmentError::degenerate(format!("{which} corners coincide")));
    }

    let triples = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
    for (i, j, k) in triples {
        let (a, b, c) = (points[i], points[j], points[k]);
        let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
        if cross.abs() <= COLLINEAR_TOLERANCE * span * span {
            return Err(SegmentError::degenerate(format!(
                "{which} corners {i}, {j} and {k} are collinear"
            )));
        }
    }
    Ok(())
}

/// Output size of the rectified sheet: the longer of each pair of opposite
/// edges, floored to whole pixels.
pub fn rectified_size(corners: &DocumentCorners) -> Result<(u32, u32)> {
    let width = corners
        .bottom_right
        .distance(&corners.bottom_left)
        .max(corners.top_right.distance(&corners.top_left))
        .floor();
    let height = corners
        .top_right
        .distance(&corners.bottom_right)
        .max(corners.top_left.distance(&corners.bottom_left))
        .floor();

    if !width.is_finite() || !height.is_finite() || width < 1.0 || height < 1.0 {
        return Err(SegmentError::degenerate(format!(
            "rectified size {width}x{height} is empty"
        )));
    }
    // A one pixel side collapses the target rectangle onto a line.
    if width < 2.0 || height < 2.0 {
        return Err(SegmentError::degenerate(format!(
            "rectified size {width}x{height} is too small"
        )));
    }
    Ok((width as u32, height as u32))
}

/// Canonical rectangle the corners are mapped onto
pub fn target_corners(width: u32, height: u32) -> [Point; 4] {
    let (w, h) = ((width - 1) as f64, (height - 1) as f64);
    [
        Point::new(0.0, 0.0),
        Point::new(w, 0.0),
        Point::new(w, h),
        Point::new(0.0, h),
    ]
}

/// Result of rectifying a photographed sheet
#[derive(Debug, Clone)]
pub struct Rectified {
    pub image: RgbImage,
    pub homography: Homography,
}

/// Warp the region bounded by `corners` into a top-down view.
///
/// Every output pixel is sampled from the source through the inverse
/// transform with bicubic interpolation; samples falling outside the source
/// are white, like blank paper.
pub fn rectify(image: &RgbImage, corners: &DocumentCorners) -> Result<Rectified> {
    let (width, height) = rectified_size(corners)?;
    let homography =
        Homography::from_correspondences(&corners.as_array(), &target_corners(width, height))?;
    let projection = homography
        .to_projection()
        .ok_or_else(|| SegmentError::degenerate("homography is not invertible"))?;

    let mut out = RgbImage::new(width, height);
    warp_into(
        image,
        &projection,
        Interpolation::Bicubic,
        Rgb([255u8, 255, 255]),
        &mut out,
    );

    Ok(Rectified {
        image: out,
        homography,
    })
}
