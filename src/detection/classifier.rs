use crate::models::CanonicalCell;

/// Maps canonical cells to digits.
///
/// Implementations are constructed once by the process entry point and
/// shared read-only across concurrent pipeline runs, hence `Send + Sync`.
/// The returned digits must be in the same order as `cells`, one per cell.
pub trait DigitClassifier: Send + Sync {
    fn classify(&self, cells: &[CanonicalCell]) -> anyhow::Result<Vec<u8>>;
}

impl<T: DigitClassifier + ?Sized> DigitClassifier for std::sync::Arc<T> {
    fn classify(&self, cells: &[CanonicalCell]) -> anyhow::Result<Vec<u8>> {
        (**self).classify(cells)
    }
}

/// Index of the largest score, ties resolved towards the lower digit
pub fn argmax(scores: &[f32]) -> Option<u8> {
    scores
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
        .map(|(i, _)| i as u8)
}

#[cfg(feature = "classifier")]
pub use self::rten_backend::{InputLayout, RtenDigitClassifier};

#[cfg(feature = "classifier")]
mod rten_backend {
    use super::{DigitClassifier, argmax};
    use crate::models::{CANONICAL_SIZE, CanonicalCell};
    use anyhow::Context;
    use rten::Model;
    use rten_tensor::prelude::*;
    use rten_tensor::NdTensor;
    use std::path::{Path, PathBuf};

    /// Tensor layout the model expects for a batch of cells
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub enum InputLayout {
        /// `[batch, 1, 28, 28]`
        #[default]
        Nchw,
        /// `[batch, 28, 28, 1]`, as exported from Keras
        Nhwc,
    }

    /// MNIST-style classifier running an `.rten` model
    pub struct RtenDigitClassifier {
        model: Model,
        layout: InputLayout,
        /// Multiplier applied to raw 0..=255 pixel values
        scale: f32,
    }

    impl RtenDigitClassifier {
        /// Default model location, `~/.cache/sheetids/mnist.rten`
        pub fn default_model_path() -> anyhow::Result<PathBuf> {
            let home_dir = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"))?;
            Ok(Path::new(&home_dir).join(".cache/sheetids/mnist.rten"))
        }

        pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
            let path = path.as_ref();
            if !path.exists() {
                anyhow::bail!("Digit model not found at {}", path.display());
            }
            let model = Model::load_file(path)
                .with_context(|| format!("Failed to load digit model {}", path.display()))?;
            Ok(Self {
                model,
                layout: InputLayout::default(),
                scale: 1.0 / 255.0,
            })
        }

        pub fn with_layout(mut self, layout: InputLayout) -> Self {
            self.layout = layout;
            self
        }

        pub fn with_scale(mut self, scale: f32) -> Self {
            self.scale = scale;
            self
        }

        fn batch_tensor(&self, cells: &[CanonicalCell]) -> NdTensor<f32, 4> {
            let side = CANONICAL_SIZE as usize;
            let data: Vec<f32> = cells
                .iter()
                .flat_map(|cell| cell.pixels().iter().map(|&p| p as f32 * self.scale))
                .collect();
            let shape = match self.layout {
                InputLayout::Nchw => [cells.len(), 1, side, side],
                InputLayout::Nhwc => [cells.len(), side, side, 1],
            };
            NdTensor::from_data(shape, data)
        }
    }

    impl DigitClassifier for RtenDigitClassifier {
        fn classify(&self, cells: &[CanonicalCell]) -> anyhow::Result<Vec<u8>> {
            if cells.is_empty() {
                return Ok(Vec::new());
            }
            let input = self.batch_tensor(cells);
            let output = self
                .model
                .run_one(input.view().into(), None)
                .context("Digit model inference failed")?;
            let scores: NdTensor<f32, 2> = output
                .try_into()
                .context("Digit model returned an unexpected output")?;

            let [rows, classes] = scores.shape();
            if rows != cells.len() || classes == 0 {
                anyhow::bail!(
                    "Digit model returned {}x{} scores for {} cells",
                    rows,
                    classes,
                    cells.len()
                );
            }
            scores
                .to_vec()
                .chunks(classes)
                .map(|row| argmax(row).context("Digit model returned no classes"))
                .collect()
        }
    }
}
