//! Model runners: the inference seam between tiled batches and a trained network.

use crate::error::{Result, TileMaskError};
use log::debug;
use ndarray::{s, Array4, ArrayView4, Axis};
use std::collections::BTreeMap;

/// Black-box inference over a `(N, T, T, C)` batch, returning `(N, T, T, 1)`.
pub trait ModelRunner {
    fn predict(&mut self, batch: ArrayView4<'_, f32>) -> Result<Array4<f32>>;
}

impl<M: ModelRunner + ?Sized> ModelRunner for Box<M> {
    fn predict(&mut self, batch: ArrayView4<'_, f32>) -> Result<Array4<f32>> {
        (**self).predict(batch)
    }
}

/// Per-epoch metric values recorded while a model was trained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingHistory {
    metrics: BTreeMap<String, Vec<f64>>,
}

impl TrainingHistory {
    pub fn record(&mut self, metric: &str, value: f64) {
        self.metrics.entry(metric.to_string()).or_default().push(value);
    }

    pub fn values(&self, metric: &str) -> &[f64] {
        self.metrics.get(metric).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn last(&self, metric: &str) -> Option<f64> {
        self.values(metric).last().copied()
    }

    pub fn epochs(&self) -> usize {
        self.metrics.values().map(Vec::len).max().unwrap_or(0)
    }
}

/// A model handle together with the name and history the caller tracks for it.
#[derive(Debug, Clone)]
pub struct NamedModel<M> {
    pub model: M,
    pub name: String,
    pub history: TrainingHistory,
}

impl<M> NamedModel<M> {
    pub fn new(model: M, name: impl Into<String>) -> Self {
        Self {
            model,
            name: name.into(),
            history: TrainingHistory::default(),
        }
    }
}

impl<M: ModelRunner> ModelRunner for NamedModel<M> {
    fn predict(&mut self, batch: ArrayView4<'_, f32>) -> Result<Array4<f32>> {
        debug!("Running model '{}' on {} tiles", self.name, batch.len_of(Axis(0)));
        self.model.predict(batch)
    }
}

/// Predicts `1.0` where one input channel exceeds a fixed threshold.
///
/// Useful for backscatter thresholding without a trained network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdRunner {
    pub channel: usize,
    pub threshold: f32,
}

impl ModelRunner for ThresholdRunner {
    fn predict(&mut self, batch: ArrayView4<'_, f32>) -> Result<Array4<f32>> {
        let (n, height, width, channels) = batch.dim();
        if self.channel >= channels {
            return Err(TileMaskError::Model(format!(
                "channel {} requested from a {}-channel batch",
                self.channel, channels
            )));
        }

        let mut output = Array4::<f32>::zeros((n, height, width, 1));
        let threshold = self.threshold;
        output
            .slice_mut(s![.., .., .., 0])
            .zip_mut_with(&batch.slice(s![.., .., .., self.channel]), |out, &value| {
                *out = if value > threshold { 1.0 } else { 0.0 };
            });
        Ok(output)
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxRunner;

#[cfg(feature = "onnx")]
mod onnx {
    use super::ModelRunner;
    use crate::error::{Result, TileMaskError};
    use log::{debug, info};
    use ndarray::{Array4, ArrayView4};
    use ort::session::Session;
    use std::path::Path;

    fn model_err(e: impl std::fmt::Display) -> TileMaskError {
        TileMaskError::Model(e.to_string())
    }

    /// ONNX Runtime session taking NHWC `f32` input.
    pub struct OnnxRunner {
        session: Session,
        input_name: String,
    }

    impl OnnxRunner {
        pub fn from_file(path: &Path, input_name: Option<&str>, num_threads: usize) -> Result<Self> {
            crate::io::ensure_exists(path)?;
            info!("Loading ONNX model: {}", path.display());

            let session = Session::builder()
                .map_err(model_err)?
                .with_intra_threads(num_threads)
                .map_err(model_err)?
                .commit_from_file(path)
                .map_err(model_err)?;

            let input_name = match input_name {
                Some(name) => name.to_string(),
                None => session
                    .inputs
                    .first()
                    .map(|input| input.name.clone())
                    .ok_or_else(|| TileMaskError::Model("model declares no inputs".to_string()))?,
            };
            debug!("Model input: {}", input_name);

            Ok(Self { session, input_name })
        }
    }

    impl ModelRunner for OnnxRunner {
        fn predict(&mut self, batch: ArrayView4<'_, f32>) -> Result<Array4<f32>> {
            let shape: Vec<usize> = batch.shape().to_vec();
            let data: Vec<f32> = batch.iter().copied().collect();
            let input = ort::value::Value::from_array((shape.as_slice(), data)).map_err(model_err)?;

            let outputs = self
                .session
                .run(ort::inputs![self.input_name.as_str() => input])
                .map_err(model_err)?;
            let (out_shape, out_data) = outputs[0].try_extract_tensor::<f32>().map_err(model_err)?;

            let dims: Vec<usize> = out_shape.iter().map(|&d| d as usize).collect();
            if dims.len() != 4 {
                return Err(TileMaskError::Model(format!("expected 4-D output, got {:?}", dims)));
            }
            let output = Array4::from_shape_vec((dims[0], dims[1], dims[2], dims[3]), out_data.to_vec())?;
            Ok(output)
        }
    }
}
