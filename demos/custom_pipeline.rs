use image::ImageReader;
use sheetids::{BinarizePolicy, CornerStrategy, MarkerFile, Pipeline, SegmentConfig};
use std::env;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <image_path> <markers.json>", args[0]);
        std::process::exit(1);
    }

    let img = ImageReader::open(&args[1])?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?;
    let detector = MarkerFile::load(&args[2])?;
    println!(
        "Loaded image: {}x{}, {} markers",
        img.width(),
        img.height(),
        detector.markers().len()
    );

    // Example 1: Default settings
    println!("\n=== Default Segmentation ===");
    let standard = Pipeline::new().segment(&img, &detector)?;
    println!(
        "Rectified to {}x{}, {} rows, {} id cells",
        standard.rectified_size.0,
        standard.rectified_size.1,
        standard.row_count,
        standard.cell_count()
    );
    for (i, row) in standard.cell_boxes.chunks(8).take(3).enumerate() {
        let xs: Vec<String> = row.iter().map(|b| format!("{}", b.x)).collect();
        println!("  row {}: y={} x=[{}]", i + 1, row[0].y, xs.join(", "));
    }

    // Example 2: Clean scan with a fixed threshold and only three anchors
    println!("\n=== Fixed Threshold, Fixed-Id Corners ===");
    let config = SegmentConfig::default()
        .with_binarize(BinarizePolicy::FixedThreshold { threshold: 200 })
        .with_corner_strategy(CornerStrategy::FixedId3);
    match Pipeline::new().with_config(config).segment(&img, &detector) {
        Ok(s) => println!("Found {} id cells", s.cell_count()),
        Err(e) => println!("Failed: {} (markers: {:?})", e, e.marker_count()),
    }

    // Example 3: Keep every box regardless of shape
    println!("\n=== Without Aspect Filter ===");
    let config = SegmentConfig::default().with_aspect_filter(false);
    let loose = Pipeline::new().with_config(config).segment(&img, &detector)?;
    let blank = loose.cells.iter().filter(|c| c.is_blank()).count();
    println!("Found {} id cells, {} blank", loose.cell_count(), blank);

    Ok(())
}
