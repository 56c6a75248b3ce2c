use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

use sheetids::{
    DigitClassifier, IdExtractor, MarkerFile, Pipeline, SegmentConfig, SegmentError,
    decode_image,
};

#[derive(Parser)]
#[command(name = "sheetids")]
#[command(about = "Read student ids from photographed attendance sheets")]
struct Cli {
    /// Input image files
    #[arg(value_name = "IMAGE", required = true)]
    images: Vec<PathBuf>,

    /// Marker detections as JSON, shared by all images
    /// (default: <IMAGE>.markers.json next to each image)
    #[arg(long, value_name = "FILE")]
    markers: Option<PathBuf>,

    /// Segmentation config as JSON
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Digit model (default: ~/.cache/sheetids/mnist.rten)
    #[arg(long, value_name = "FILE")]
    model: Option<PathBuf>,

    /// Skip classification and only report the cells found
    #[arg(long)]
    skip_classify: bool,

    /// Save debug outputs to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let config = match &args.config {
        Some(path) => SegmentConfig::from_file(path)?,
        None => SegmentConfig::default(),
    };

    // Loaded once and shared by every sheet
    let classifier: Option<Arc<dyn DigitClassifier>> = if args.skip_classify {
        None
    } else {
        Some(load_classifier(args.model.as_deref())?)
    };

    let mut jobs = Vec::with_capacity(args.images.len());
    for image_path in &args.images {
        let markers_path = match &args.markers {
            Some(path) => path.clone(),
            None => image_path.with_extension("markers.json"),
        };
        let mut pipeline = Pipeline::new().with_config(config.clone());
        if let Some(debug_dir) = &args.debug_out {
            let dir = debug_dir_for(debug_dir, image_path, args.images.len());
            pipeline = pipeline.with_debug(dir)?;
        }
        let detector = Arc::new(MarkerFile::load(&markers_path)?);
        let bytes = std::fs::read(image_path)?;
        let classifier = classifier.clone();
        let image_path = image_path.clone();

        jobs.push(tokio::task::spawn_blocking(move || {
            let outcome = match classifier {
                Some(classifier) => {
                    IdExtractor::new(pipeline, detector, classifier)
                        .extract(&bytes)
                        .map(Outcome::Ids)
                }
                None => decode_image(&bytes)
                    .and_then(|image| pipeline.segment(&image, detector.as_ref()))
                    .map(|s| Outcome::Cells {
                        markers: s.marker_count,
                        rows: s.row_count,
                        cells: s.cell_count(),
                    }),
            };
            (image_path, outcome)
        }));
    }

    let mut failures = 0;
    for job in jobs {
        let (image_path, outcome) = job.await?;
        match outcome {
            Ok(outcome) => report(&image_path, &outcome),
            Err(e) => {
                failures += 1;
                report_failure(&image_path, &e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} images failed", failures, args.images.len());
    }
    Ok(())
}

enum Outcome {
    Ids(sheetids::Extraction),
    Cells {
        markers: usize,
        rows: usize,
        cells: usize,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(feature = "classifier")]
fn load_classifier(model: Option<&Path>) -> anyhow::Result<Arc<dyn DigitClassifier>> {
    use sheetids::detection::classifier::RtenDigitClassifier;

    let path = match model {
        Some(path) => path.to_path_buf(),
        None => RtenDigitClassifier::default_model_path()?,
    };
    Ok(Arc::new(RtenDigitClassifier::load(path)?))
}

#[cfg(not(feature = "classifier"))]
fn load_classifier(_model: Option<&Path>) -> anyhow::Result<Arc<dyn DigitClassifier>> {
    anyhow::bail!("built without the `classifier` feature; rerun with --skip-classify")
}

/// One subdirectory per image when several are processed
fn debug_dir_for(root: &Path, image_path: &Path, image_count: usize) -> PathBuf {
    if image_count == 1 {
        return root.to_path_buf();
    }
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    root.join(stem)
}

fn report(image_path: &Path, outcome: &Outcome) {
    println!("\n=== {} ===", image_path.display());
    match outcome {
        Outcome::Ids(extraction) => {
            println!(
                "Markers: {}  Cells: {}  Ids: {}",
                extraction.marker_count,
                extraction.cell_count,
                extraction.ids.len()
            );
            for id in &extraction.ids {
                println!("  {}", id);
            }
        }
        Outcome::Cells {
            markers,
            rows,
            cells,
        } => {
            println!("Markers: {}  Rows: {}  Id cells: {}", markers, rows, cells);
        }
    }
}

/// Callers get a generic message; the detail goes to the log
fn report_failure(image_path: &Path, err: &SegmentError) {
    error!(
        image = %image_path.display(),
        markers = ?err.marker_count(),
        rows = ?err.row_count(),
        error = %err,
        cause = ?std::error::Error::source(err).map(|s| s.to_string()),
        "sheet processing failed"
    );
    println!("\n=== {} ===", image_path.display());
    println!(
        "Processing failed. Try uploading a high quality image with good lighting and angle."
    );
}
