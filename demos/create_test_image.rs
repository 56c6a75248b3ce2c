use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use sheetids::{Marker, Point};

const WIDTH: u32 = 500;
const HEIGHT: u32 = 1000;
const MARKER: u32 = 12;

fn main() -> anyhow::Result<()> {
    let black = Rgb([0u8, 0, 0]);
    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([255, 255, 255]));

    // 24 rows: header, then name | number | 8 id digits
    let columns: Vec<u32> = [14, 134, 174]
        .into_iter()
        .chain((1..=8).map(|k| 174 + k * 40))
        .collect();
    let right = columns[columns.len() - 1] + 3;
    let bottom = 14 + 24 * 40 + 3;
    for r in 0..=24 {
        let rect = Rect::at(14, (14 + r * 40) as i32).of_size(right - 14, 3);
        draw_filled_rect_mut(&mut img, rect, black);
    }
    for (i, &x) in columns.iter().enumerate() {
        // The id header is one merged cell
        let top = if i > 2 && i < columns.len() - 1 { 54 } else { 14 };
        let rect = Rect::at(x as i32, top).of_size(3, bottom - top as u32);
        draw_filled_rect_mut(&mut img, rect, black);
    }

    let s = (MARKER - 1) as f64;
    let (r, b) = ((WIDTH - MARKER) as f64, (HEIGHT - MARKER) as f64);
    let markers = vec![
        square(1, 0.0, 0.0, s),
        square(2, r, 0.0, s),
        square(4, r, b, s),
        square(3, 0.0, b, s),
    ];
    for m in &markers {
        let c = m.corners[0];
        draw_filled_rect_mut(
            &mut img,
            Rect::at(c.x as i32, c.y as i32).of_size(MARKER, MARKER),
            black,
        );
    }

    img.save("test_sheet.png")?;
    std::fs::write("test_sheet.markers.json", serde_json::to_string_pretty(&markers)?)?;
    println!("Created test_sheet.png ({}x{}) and test_sheet.markers.json", WIDTH, HEIGHT);
    Ok(())
}

fn square(id: u32, x: f64, y: f64, s: f64) -> Marker {
    Marker::new(
        id,
        [
            Point::new(x, y),
            Point::new(x + s, y),
            Point::new(x + s, y + s),
            Point::new(x, y + s),
        ],
    )
}
