use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use imageproc::rect::Rect;
use sheetids::{CanonicalCell, DigitClassifier, Marker, MarkerDetector, Point};
use std::io::Cursor;

pub const PAGE_WIDTH: u32 = 500;
pub const PAGE_HEIGHT: u32 = 1000;
pub const MARKER_SIZE: u32 = 12;

pub const GRID_X: u32 = 14;
pub const GRID_Y: u32 = 14;
pub const LINE: u32 = 3;
pub const ROW_HEIGHT: u32 = 40;
pub const NAME_WIDTH: u32 = 120;
pub const NUMBER_WIDTH: u32 = 40;
pub const ID_WIDTH: u32 = 40;
pub const ID_COLUMNS: u32 = 8;
pub const BODY_ROWS: u32 = 23;

const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Left edge of every vertical ruling, left to right
pub fn column_lines() -> Vec<u32> {
    let mut xs = vec![GRID_X, GRID_X + NAME_WIDTH, GRID_X + NAME_WIDTH + NUMBER_WIDTH];
    let id_start = GRID_X + NAME_WIDTH + NUMBER_WIDTH;
    xs.extend((1..=ID_COLUMNS).map(|k| id_start + k * ID_WIDTH));
    xs
}

pub fn grid_right() -> u32 {
    column_lines().last().copied().unwrap() + LINE
}

pub fn grid_bottom() -> u32 {
    GRID_Y + (BODY_ROWS + 1) * ROW_HEIGHT + LINE
}

/// An attendance sheet seen straight on: a header row with a merged id
/// header, then 23 rows of name, number and eight single-digit id cells.
/// Small black squares mark the four page corners.
pub fn render_sheet(with_digits: bool) -> RgbImage {
    let mut img = RgbImage::from_pixel(PAGE_WIDTH, PAGE_HEIGHT, WHITE);
    draw_corner_markers(&mut img);

    let right = grid_right();
    let bottom = grid_bottom();
    for r in 0..=BODY_ROWS + 1 {
        let y = GRID_Y + r * ROW_HEIGHT;
        fill(&mut img, GRID_X, y, right - GRID_X, LINE);
    }
    let lines = column_lines();
    for (i, &x) in lines.iter().enumerate() {
        // Id separators stop at the merged header cell
        let inner_id_line = i > 2 && i < lines.len() - 1;
        let top = if inner_id_line { GRID_Y + ROW_HEIGHT } else { GRID_Y };
        fill(&mut img, x, top, LINE, bottom - top);
    }

    if with_digits {
        let id_start = lines[2];
        for r in 1..=BODY_ROWS {
            let cell_y = GRID_Y + r * ROW_HEIGHT;
            for c in 0..ID_COLUMNS {
                let cell_x = id_start + c * ID_WIDTH;
                draw_zero(&mut img, cell_x + LINE + 11, cell_y + LINE + 8);
            }
        }
    }
    img
}

/// Blank page with only the corner markers
pub fn render_blank_page() -> RgbImage {
    let mut img = RgbImage::from_pixel(PAGE_WIDTH, PAGE_HEIGHT, WHITE);
    draw_corner_markers(&mut img);
    img
}

fn draw_corner_markers(img: &mut RgbImage) {
    for m in corner_markers() {
        let c = m.corners[0];
        fill(img, c.x as u32, c.y as u32, MARKER_SIZE, MARKER_SIZE);
    }
}

/// A hollow 14x20 stroke box, roughly a handwritten zero
fn draw_zero(img: &mut RgbImage, x: u32, y: u32) {
    fill(img, x, y, 14, 3);
    fill(img, x, y + 17, 14, 3);
    fill(img, x, y, 3, 20);
    fill(img, x + 11, y, 3, 20);
}

pub fn fill(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32) {
    draw_filled_rect_mut(img, Rect::at(x as i32, y as i32).of_size(w, h), BLACK);
}

pub fn quad(x: f64, y: f64, size: f64) -> [Point; 4] {
    [
        Point::new(x, y),
        Point::new(x + size, y),
        Point::new(x + size, y + size),
        Point::new(x, y + size),
    ]
}

/// Markers flush with the page corners, ids 1..=4 clockwise from top-left.
/// Their outer corners are exactly the page corners.
pub fn corner_markers() -> Vec<Marker> {
    let s = (MARKER_SIZE - 1) as f64;
    let right = (PAGE_WIDTH - 1) as f64 - s;
    let bottom = (PAGE_HEIGHT - 1) as f64 - s;
    vec![
        Marker::new(1, quad(0.0, 0.0, s)),
        Marker::new(2, quad(right, 0.0, s)),
        Marker::new(4, quad(right, bottom, s)),
        Marker::new(3, quad(0.0, bottom, s)),
    ]
}

pub const PHOTO_WIDTH: u32 = 620;
pub const PHOTO_HEIGHT: u32 = 1100;

/// Where the page corners land in the photo, clockwise from top-left
pub type PhotoCorners = [(f32, f32); 4];

/// Slight rotation with a little keystone
pub const TILTED: PhotoCorners = [
    (60.0, 40.0),
    (555.0, 70.0),
    (540.0, 1060.0),
    (40.0, 1030.0),
];
/// Camera held well below the sheet: the top edge is much shorter
pub const KEYSTONED: PhotoCorners = [
    (100.0, 60.0),
    (500.0, 60.0),
    (590.0, 1060.0),
    (10.0, 1060.0),
];

/// Photograph `sheet` at an angle. The corner markers are carried through the
/// same projection, so they describe the photo the way a detector would.
pub fn photograph(sheet: &RgbImage, corners: PhotoCorners) -> (RgbImage, Vec<Marker>) {
    let (w, h) = ((PAGE_WIDTH - 1) as f32, (PAGE_HEIGHT - 1) as f32);
    let page = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
    let projection = Projection::from_control_points(page, corners)
        .expect("Photo corners must be in general position");

    let mut photo = RgbImage::from_pixel(PHOTO_WIDTH, PHOTO_HEIGHT, WHITE);
    warp_into(sheet, &projection, Interpolation::Bilinear, WHITE, &mut photo);

    let markers = corner_markers()
        .into_iter()
        .map(|m| {
            let corners = m.corners.map(|p| {
                let (x, y) = projection * (p.x as f32, p.y as f32);
                Point::new(x as f64, y as f64)
            });
            Marker::new(m.id, corners)
        })
        .collect();
    (photo, markers)
}

pub fn png_bytes(img: &RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img.clone())
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("Failed to encode test image");
    buf
}

/// Classifier that answers the same digit for every cell
pub struct ConstantClassifier(pub u8);

impl DigitClassifier for ConstantClassifier {
    fn classify(&self, cells: &[CanonicalCell]) -> anyhow::Result<Vec<u8>> {
        Ok(vec![self.0; cells.len()])
    }
}

/// Detector that always fails
pub struct BrokenDetector;

impl MarkerDetector for BrokenDetector {
    fn detect(&self, _image: &image::GrayImage) -> anyhow::Result<Vec<Marker>> {
        anyhow::bail!("camera feed unavailable")
    }
}
