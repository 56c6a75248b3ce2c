//! Service-facing entry points: bytes in, formatted ids out.

use image::DynamicImage;
use std::sync::Arc;
use tracing::{info, warn};

use crate::detection::classifier::DigitClassifier;
use crate::detection::markers::MarkerDetector;
use crate::error::{Result, SegmentError, SegmentErrorKind};
use crate::pipeline::{Pipeline, Segmentation};

/// Digits per student id
pub const ID_DIGITS: usize = 8;
/// Digits before the dash in a rendered id
const ID_PREFIX: usize = 2;

/// Decode uploaded bytes, before any pipeline work happens
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes)
        .map_err(|e| SegmentError::new(SegmentErrorKind::DecodeFailure(e)))
}

/// Render every complete group of eight digits as `DD-DDDDDD`.
/// A trailing partial group is dropped.
pub fn assemble_ids(digits: &[u8]) -> Vec<String> {
    digits
        .chunks_exact(ID_DIGITS)
        .map(|group| {
            let text: String = group.iter().map(|d| char::from(b'0' + d % 10)).collect();
            format!("{}-{}", &text[..ID_PREFIX], &text[ID_PREFIX..])
        })
        .collect()
}

/// Ids read from one sheet
#[derive(Debug, Clone)]
pub struct Extraction {
    pub ids: Vec<String>,
    pub digits: Vec<u8>,
    pub marker_count: usize,
    pub cell_count: usize,
}

/// Holds the pipeline and the shared collaborators for id extraction
#[derive(Clone)]
pub struct IdExtractor {
    pipeline: Pipeline,
    detector: Arc<dyn MarkerDetector>,
    classifier: Arc<dyn DigitClassifier>,
}

impl IdExtractor {
    pub fn new(
        pipeline: Pipeline,
        detector: Arc<dyn MarkerDetector>,
        classifier: Arc<dyn DigitClassifier>,
    ) -> Self {
        Self {
            pipeline,
            detector,
            classifier,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Decode, segment, check the sheet layout, classify and format
    pub fn extract(&self, bytes: &[u8]) -> Result<Extraction> {
        let image = decode_image(bytes)?;
        self.extract_image(&image)
    }

    pub fn extract_image(&self, image: &DynamicImage) -> Result<Extraction> {
        let segmentation = self.pipeline.segment(image, self.detector.as_ref())?;
        self.check_layout(&segmentation)?;

        let digits = self
            .classifier
            .classify(&segmentation.cells)
            .map_err(|e| classification_error(e.into(), &segmentation))?;
        if digits.len() != segmentation.cell_count() {
            return Err(classification_error(
                format!(
                    "classifier returned {} digits for {} cells",
                    digits.len(),
                    segmentation.cell_count()
                )
                .into(),
                &segmentation,
            ));
        }

        let ids = assemble_ids(&digits);
        info!(ids = ids.len(), "ids assembled");
        Ok(Extraction {
            ids,
            digits,
            marker_count: segmentation.marker_count,
            cell_count: segmentation.cell_count(),
        })
    }

    /// The classifier is only trusted when the grid produced exactly the
    /// expected number of cells.
    fn check_layout(&self, segmentation: &Segmentation) -> Result<()> {
        let expected = self.pipeline.config().expected_cells;
        let found = segmentation.cell_count();
        if found != expected {
            warn!(expected, found, "sheet layout mismatch");
            return Err(
                SegmentError::new(SegmentErrorKind::LayoutMismatch { expected, found })
                    .with_markers(segmentation.marker_count)
                    .with_rows(segmentation.row_count),
            );
        }
        Ok(())
    }
}

fn classification_error(
    cause: crate::error::BoxedError,
    segmentation: &Segmentation,
) -> SegmentError {
    SegmentError::new(SegmentErrorKind::Classification(cause))
        .with_markers(segmentation.marker_count)
        .with_rows(segmentation.row_count)
}

/// Extract ids from several uploads concurrently on the blocking pool.
/// Results come back in input order.
pub async fn extract_many(
    extractor: &IdExtractor,
    uploads: Vec<Vec<u8>>,
) -> Vec<Result<Extraction>> {
    let handles: Vec<_> = uploads
        .into_iter()
        .map(|bytes| {
            let extractor = extractor.clone();
            tokio::task::spawn_blocking(move || extractor.extract(&bytes))
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        let result = handle.await.unwrap_or_else(|e| {
            Err(SegmentError::new(SegmentErrorKind::TaskFailed(e.to_string())))
        });
        results.push(result);
    }
    results
}
