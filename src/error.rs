//! Failure types for the segmentation and id-extraction pipeline.
//!
//! Every structural failure aborts the call and carries the counts that were
//! known when it happened, so callers can report e.g. how many markers were
//! seen even though rectification never ran.

use thiserror::Error;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Counts gathered before a failure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub marker_count: Option<usize>,
    pub row_count: Option<usize>,
}

#[derive(Error, Debug)]
pub enum SegmentErrorKind {
    #[error("need {required} markers, found {found}")]
    InsufficientMarkers { required: usize, found: usize },

    #[error("anchor marker {id} not detected")]
    MissingAnchor { id: u32 },

    #[error("degenerate geometry: {reason}")]
    DegenerateGeometry { reason: String },

    #[error("no grid cells survived filtering")]
    EmptyGrid,

    #[error("input is not a decodable image")]
    DecodeFailure(#[source] image::ImageError),

    #[error("marker detection failed")]
    Detection(#[source] BoxedError),

    #[error("expected {expected} id cells, found {found}")]
    LayoutMismatch { expected: usize, found: usize },

    #[error("digit classification failed")]
    Classification(#[source] BoxedError),

    #[error("extraction task failed: {0}")]
    TaskFailed(String),

    #[error("failed to write debug output")]
    DebugOutput(#[source] BoxedError),
}

#[derive(Debug)]
pub struct SegmentError {
    pub kind: SegmentErrorKind,
    pub diagnostics: Diagnostics,
}

impl std::fmt::Display for SegmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.kind, f)
    }
}

// The kind is rendered by Display, so the chain continues at its cause.
impl std::error::Error for SegmentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.kind)
    }
}

impl SegmentError {
    pub fn new(kind: SegmentErrorKind) -> Self {
        Self {
            kind,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn with_markers(mut self, count: usize) -> Self {
        self.diagnostics.marker_count = Some(count);
        self
    }

    pub fn with_rows(mut self, count: usize) -> Self {
        self.diagnostics.row_count = Some(count);
        self
    }

    pub fn marker_count(&self) -> Option<usize> {
        self.diagnostics.marker_count
    }

    pub fn row_count(&self) -> Option<usize> {
        self.diagnostics.row_count
    }

    pub(crate) fn degenerate(reason: impl Into<String>) -> Self {
        Self::new(SegmentErrorKind::DegenerateGeometry {
            reason: reason.into(),
        })
    }
}

impl From<SegmentErrorKind> for SegmentError {
    fn from(kind: SegmentErrorKind) -> Self {
        Self::new(kind)
    }
}

pub type Result<T, E = SegmentError> = std::result::Result<T, E>;
