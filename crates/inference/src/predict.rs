//! Softmax prediction over a batch iterator.

use crate::{InferenceError, InferenceResult};
use burn::tensor::activation::softmax;
use burn::tensor::backend::Backend;
use burn_dataset::BatchIter;
use models::VitClassifier;

/// Row-major `(rows, cols)` class probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionArray {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

impl PredictionArray {
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> InferenceResult<Self> {
        if data.len() != rows * cols {
            return Err(InferenceError::Tensor(format!(
                "{} values cannot form a {rows}x{cols} array",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Index of the largest value per row; ties resolve to the lowest index.
    pub fn argmax(&self) -> Vec<usize> {
        (0..self.rows)
            .map(|i| {
                self.row(i)
                    .iter()
                    .enumerate()
                    .fold((0usize, f32::NEG_INFINITY), |best, (j, v)| {
                        if *v > best.1 {
                            (j, *v)
                        } else {
                            best
                        }
                    })
                    .0
            })
            .collect()
    }
}

/// Run `model` over every batch of one pass and collect softmax probabilities in
/// dataset order.
pub fn predict_probs<B: Backend>(
    model: &VitClassifier<B>,
    batches: &mut BatchIter,
    device: &B::Device,
) -> InferenceResult<PredictionArray> {
    batches.reset();
    let mut data = Vec::new();
    let mut rows = 0usize;
    let mut cols = 0usize;
    while let Some(batch) = batches.next_batch::<B>(device)? {
        let probs = softmax(model.forward(batch.images), 1);
        let [n, c] = probs.dims();
        rows += n;
        cols = c;
        let values = probs
            .into_data()
            .to_vec::<f32>()
            .map_err(|err| InferenceError::Tensor(format!("{err:?}")))?;
        data.extend(values);
    }
    if rows == 0 {
        return Err(InferenceError::Empty);
    }
    PredictionArray::new(rows, cols, data)
}
