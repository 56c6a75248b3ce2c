//! Integration tests for the homography solve and perspective rectification.

mod common;

use common::*;
use sheetids::detection::geometry::{Homography, rectified_size, rectify, target_corners};

fn skewed_corners() -> DocumentCorners {
    DocumentCorners {
        top_left: Point::new(35.0, 42.0),
        top_right: Point::new(612.0, 18.0),
        bottom_right: Point::new(655.0, 870.0),
        bottom_left: Point::new(12.0, 901.0),
    }
}

fn assert_close(a: Point, b: Point, tolerance: f64) {
    assert!(
        a.distance(&b) <= tolerance,
        "{:?} and {:?} differ by more than {}",
        a,
        b,
        tolerance
    );
}

#[test]
fn test_homography_maps_corners_onto_target() -> anyhow::Result<()> {
    let corners = skewed_corners();
    let target = target_corners(600, 850);
    let h = Homography::from_correspondences(&corners.as_array(), &target)?;

    for (src, dst) in corners.as_array().iter().zip(target.iter()) {
        let projected = h.project(*src).expect("corner projects to a finite point");
        assert_close(projected, *dst, 1e-6);
    }
    assert!((h.matrix()[(2, 2)] - 1.0).abs() < 1e-12);
    Ok(())
}

#[test]
fn test_inverse_round_trips_interior_points() -> anyhow::Result<()> {
    let corners = skewed_corners();
    let h = Homography::from_correspondences(&corners.as_array(), &target_corners(600, 850))?;
    let inv = h.inverse().expect("homography is invertible");

    for &(x, y) in &[(100.0, 100.0), (320.5, 411.25), (590.0, 840.0), (15.0, 700.0)] {
        let p = Point::new(x, y);
        let there = h.project(p).expect("finite");
        let back = inv.project(there).expect("finite");
        assert_close(back, p, 1e-3);
    }
    Ok(())
}

#[test]
fn test_inverse_maps_target_back_onto_corners() -> anyhow::Result<()> {
    let corners = skewed_corners();
    let target = target_corners(600, 850);
    let inv = Homography::from_correspondences(&corners.as_array(), &target)?
        .inverse()
        .expect("homography is invertible");

    for (dst, src) in target.iter().zip(corners.as_array().iter()) {
        assert_close(inv.project(*dst).expect("finite"), *src, 1e-3);
    }
    Ok(())
}

#[test]
fn test_collinear_corners_are_degenerate() {
    let corners = [
        Point::new(0.0, 0.0),
        Point::new(100.0, 0.0),
        Point::new(200.0, 0.0),
        Point::new(0.0, 100.0),
    ];
    let err = Homography::from_correspondences(&corners, &target_corners(100, 100)).unwrap_err();
    assert!(matches!(err.kind, SegmentErrorKind::DegenerateGeometry { .. }));
}

#[test]
fn test_coincident_corners_are_degenerate() {
    let corners = DocumentCorners {
        top_left: Point::new(50.0, 50.0),
        top_right: Point::new(50.0, 50.0),
        bottom_right: Point::new(50.0, 50.0),
        bottom_left: Point::new(50.0, 50.0),
    };
    let image = image::RgbImage::new(100, 100);
    let err = rectify(&image, &corners).unwrap_err();
    assert!(matches!(err.kind, SegmentErrorKind::DegenerateGeometry { .. }));
}

#[test]
fn test_rectified_size_takes_longer_edges_floored() -> anyhow::Result<()> {
    let corners = DocumentCorners {
        top_left: Point::new(0.0, 0.0),
        top_right: Point::new(300.7, 0.0),
        bottom_right: Point::new(290.0, 400.0),
        bottom_left: Point::new(10.0, 410.9),
    };
    let (w, h) = rectified_size(&corners)?;

    // Top edge 300.7 beats bottom edge 280.2
    assert_eq!(w, 300);
    // Left edge ~411.02 beats right edge ~400.13
    assert_eq!(h, 411);
    Ok(())
}

#[test]
fn test_rectified_size_rejects_slivers() {
    let corners = DocumentCorners {
        top_left: Point::new(0.0, 0.0),
        top_right: Point::new(200.0, 0.0),
        bottom_right: Point::new(200.0, 1.5),
        bottom_left: Point::new(0.0, 1.5),
    };
    let err = rectified_size(&corners).unwrap_err();
    assert!(matches!(err.kind, SegmentErrorKind::DegenerateGeometry { .. }));
}

#[test]
fn test_rectify_of_flat_sheet_keeps_content_in_place() -> anyhow::Result<()> {
    let sheet = render_sheet(false);
    let corners = DocumentCorners {
        top_left: Point::new(0.0, 0.0),
        top_right: Point::new((PAGE_WIDTH - 1) as f64, 0.0),
        bottom_right: Point::new((PAGE_WIDTH - 1) as f64, (PAGE_HEIGHT - 1) as f64),
        bottom_left: Point::new(0.0, (PAGE_HEIGHT - 1) as f64),
    };
    let rectified = rectify(&sheet, &corners)?;

    assert_eq!(rectified.image.dimensions(), (PAGE_WIDTH - 1, PAGE_HEIGHT - 1));
    // Middle of the top ruling stays dark, middle of a cell stays light
    let line = rectified.image.get_pixel(250, GRID_Y + 1);
    assert!(line.0[0] < 64, "ruling lost: {:?}", line);
    let paper = rectified.image.get_pixel(60, GRID_Y + ROW_HEIGHT + 20);
    assert!(paper.0[0] > 192, "cell darkened: {:?}", paper);
    Ok(())
}
