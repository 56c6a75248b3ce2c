//! Integration tests for resolving document corners from marker detections.

mod common;

use common::*;
use image::{GrayImage, Luma};
use sheetids::detection::markers::{prepare_for_detection, resolve_corners};

/// A perspective-skewed sheet: markers at uneven positions
fn skewed_markers() -> Vec<Marker> {
    vec![
        Marker::new(7, quad(40.0, 30.0, 20.0)),
        Marker::new(3, quad(610.0, 55.0, 22.0)),
        Marker::new(9, quad(650.0, 880.0, 25.0)),
        Marker::new(5, quad(20.0, 900.0, 24.0)),
    ]
}

fn permutations(items: &[Marker]) -> Vec<Vec<Marker>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut out = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let head = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, head.clone());
            out.push(tail);
        }
    }
    out
}

#[test]
fn test_generic_corners_use_outer_marker_corners() -> anyhow::Result<()> {
    let corners = resolve_corners(&skewed_markers(), CornerStrategy::Generic4)?;

    assert_eq!(corners.top_left, Point::new(40.0, 30.0));
    assert_eq!(corners.top_right, Point::new(632.0, 55.0));
    assert_eq!(corners.bottom_right, Point::new(675.0, 905.0));
    assert_eq!(corners.bottom_left, Point::new(20.0, 924.0));
    Ok(())
}

#[test]
fn test_generic_corners_ignore_detection_order() -> anyhow::Result<()> {
    let markers = skewed_markers();
    let expected = resolve_corners(&markers, CornerStrategy::Generic4)?;

    let orders = permutations(&markers);
    assert_eq!(orders.len(), 24);
    for order in orders {
        let corners = resolve_corners(&order, CornerStrategy::Generic4)?;
        assert_eq!(corners, expected, "order {:?}", order.iter().map(|m| m.id).collect::<Vec<_>>());
    }
    Ok(())
}

#[test]
fn test_generic_corners_need_four_markers() {
    let markers = skewed_markers()[..3].to_vec();
    let err = resolve_corners(&markers, CornerStrategy::Generic4).unwrap_err();

    assert!(matches!(
        err.kind,
        SegmentErrorKind::InsufficientMarkers {
            required: 4,
            found: 3
        }
    ));
    assert_eq!(err.marker_count(), Some(3));
}

#[test]
fn test_generic_corners_with_extra_marker_use_outermost_rows() -> anyhow::Result<()> {
    let mut markers = skewed_markers();
    // A stray detection in the middle of the sheet
    markers.push(Marker::new(11, quad(300.0, 400.0, 20.0)));

    let corners = resolve_corners(&markers, CornerStrategy::Generic4)?;
    assert_eq!(corners.top_left, Point::new(40.0, 30.0));
    assert_eq!(corners.top_right, Point::new(632.0, 55.0));
    assert_eq!(corners.bottom_right, Point::new(675.0, 905.0));
    assert_eq!(corners.bottom_left, Point::new(20.0, 924.0));
    Ok(())
}

#[test]
fn test_fixed_id_completes_parallelogram() -> anyhow::Result<()> {
    let markers = vec![
        Marker::new(3, quad(12.0, 800.0, 20.0)),
        Marker::new(1, quad(10.0, 10.0, 20.0)),
        Marker::new(2, quad(580.0, 20.0, 20.0)),
    ];
    let corners = resolve_corners(&markers, CornerStrategy::FixedId3)?;

    assert_eq!(corners.top_left, Point::new(10.0, 10.0));
    assert_eq!(corners.top_right, Point::new(600.0, 20.0));
    assert_eq!(corners.bottom_left, Point::new(12.0, 820.0));
    // bottom_left + (top_right - top_left)
    assert_eq!(corners.bottom_right, Point::new(602.0, 830.0));
    Ok(())
}

#[test]
fn test_fixed_id_reports_missing_anchor() {
    let markers = vec![
        Marker::new(1, quad(10.0, 10.0, 20.0)),
        Marker::new(3, quad(12.0, 800.0, 20.0)),
        Marker::new(8, quad(580.0, 20.0, 20.0)),
    ];
    let err = resolve_corners(&markers, CornerStrategy::FixedId3).unwrap_err();

    assert!(matches!(err.kind, SegmentErrorKind::MissingAnchor { id: 2 }));
    assert_eq!(err.marker_count(), Some(3));
}

#[test]
fn test_marker_floor_blackens_shadows() {
    let gray = GrayImage::from_fn(4, 1, |x, _| Luma([[40u8, 100, 101, 230][x as usize]]));

    let floored = prepare_for_detection(&gray, Some(100));
    assert_eq!(floored.as_raw(), &vec![0, 0, 101, 230]);

    let untouched = prepare_for_detection(&gray, None);
    assert_eq!(untouched, gray);
}

#[test]
fn test_marker_file_round_trips_detections() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("sheet.markers.json");
    std::fs::write(&path, serde_json::to_string(&corner_markers())?)?;

    let file = MarkerFile::load(&path)?;
    assert_eq!(file.markers(), corner_markers().as_slice());
    Ok(())
}
