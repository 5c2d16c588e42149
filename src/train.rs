

use crate::config::JsonTrain;
use crate::error::{EmbeddingError, Result};
use crate::model::SharedEmbedding;

use ndarray::prelude::*;
use ndarray::Zip;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::slice::Chunks;
use std::time::Instant;
use tracing::{debug, info};


/// (context, center) pairs laid out as one row of context indices per example.
/// CBOW rows hold a full window, skip-gram rows a single context token.
#[derive(Clone, Debug)]
pub struct TrainingPairs {
    sources: Array2<usize>,
    targets: Vec<usize>,
}

impl TrainingPairs {

    pub fn from_windows(sources: &[Vec<usize>], targets: &[usize]) -> Result<TrainingPairs> {

        if sources.len() != targets.len() {
            return Err(EmbeddingError::size_mismatch("sources and targets", sources.len(), targets.len()));
        }
        let width = sources.first().map_or(0, |w| w.len());
        let mut flat: Vec<usize> = Vec::with_capacity(sources.len() * width);
        for window in sources {
            if window.len() != width {
                return Err(EmbeddingError::DimensionMismatch { expected: width, actual: window.len() });
            }
            flat.extend_from_slice(window);
        }

        Ok(Self {
            sources: Array2::from_shape_vec((sources.len(), width), flat)?,
            targets: targets.to_vec(),
        })
    }

    pub fn from_single(sources: &[usize], targets: &[usize]) -> Result<TrainingPairs> {
        if sources.len() != targets.len() {
            return Err(EmbeddingError::size_mismatch("sources and targets", sources.len(), targets.len()));
        }
        Ok(Self {
            sources: Array2::from_shape_vec((sources.len(), 1), sources.to_vec())?,
            targets: targets.to_vec(),
        })
    }

    pub fn sources(&self) -> ArrayView2<'_, usize> {
        self.sources.view()
    }

    pub fn targets(&self) -> &[usize] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}


#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    Sgd,
    AdaGrad,
    Adam,
}

enum OptimizerState {
    Sgd,
    AdaGrad {
        accumulator: Array2<f32>,
    },
    Adam {
        m: Array2<f32>,
        v: Array2<f32>,
        t: i32,
    },
}

pub struct Optimizer {
    learning_rate: f32,
    state: OptimizerState,
}

impl Optimizer {

    const BETA1: f32 = 0.9;
    const BETA2: f32 = 0.999;
    const EPS: f32 = 1e-8;

    pub fn new(kind: OptimizerKind, learning_rate: f32, shape: (usize, usize)) -> Optimizer {
        let state = match kind {
            OptimizerKind::Sgd => OptimizerState::Sgd,
            // init to 1.0 makes the initial eta equal to the initial learning rate
            OptimizerKind::AdaGrad => OptimizerState::AdaGrad { accumulator: Array2::from_elem(shape, 1.0) },
            OptimizerKind::Adam => OptimizerState::Adam { m: Array2::zeros(shape), v: Array2::zeros(shape), t: 0 },
        };
        Self { learning_rate, state }
    }

    pub fn step(&mut self, weight: &mut Array2<f32>, grad: &Array2<f32>) {
        let lr = self.learning_rate;
        match &mut self.state {
            OptimizerState::Sgd => weight.scaled_add(-lr, grad),
            OptimizerState::AdaGrad { accumulator } => {
                Zip::from(weight).and(&mut *accumulator).and(grad).for_each(|w, acc, &g| {
                    *w -= lr * g / acc.sqrt();
                    *acc += g * g;
                });
            }
            OptimizerState::Adam { m, v, t } => {
                *t += 1;
                let bias1 = 1.0 - Self::BETA1.powi(*t);
                let bias2 = 1.0 - Self::BETA2.powi(*t);
                Zip::from(weight).and(&mut *m).and(&mut *v).and(grad).for_each(|w, m, v, &g| {
                    *m = Self::BETA1 * *m + (1.0 - Self::BETA1) * g;
                    *v = Self::BETA2 * *v + (1.0 - Self::BETA2) * g * g;
                    let m_hat = *m / bias1;
                    let v_hat = *v / bias2;
                    *w -= lr * m_hat / (v_hat.sqrt() + Self::EPS);
                });
            }
        }
    }
}


pub struct Trainer {
    optimizer: Optimizer,
    rng: ChaCha8Rng,
    n_epochs: usize,
    batch_size: usize,
}

impl Trainer {

    pub fn new(model: &SharedEmbedding, train_params: &JsonTrain) -> Trainer {
        Self {
            optimizer: Optimizer::new(
                train_params.optimizer,
                train_params.learning_rate,
                (model.vocab_size(), model.embed_dim()),
            ),
            rng: ChaCha8Rng::seed_from_u64(train_params.seed),
            n_epochs: train_params.n_epochs,
            batch_size: train_params.batch_size,
        }
    }

    fn do_training_epoch(&mut self, model: &mut SharedEmbedding, pairs: &TrainingPairs) -> Result<(f32, f32)> {

        let mut order = (0..pairs.len()).collect::<Vec<usize>>();
        order.shuffle(&mut self.rng);

        // last batch can be smaller than batch_size
        let chunks: Chunks<usize> = order.chunks(self.batch_size);
        let n_batches = chunks.len();

        let mut epoch_loss = 0.0;
        let mut batch_loss = 0.0;
        for (pp, chunk_indexes) in chunks.enumerate() {

            let x: Array2<usize> = pairs.sources.select(Axis(0), chunk_indexes);
            let y: Vec<usize> = chunk_indexes.iter().map(|i| pairs.targets[*i]).collect();

            let (loss, grad) = model.loss_and_gradient(&x.view(), &y)?;
            self.optimizer.step(model.weight_mut(), &grad);

            batch_loss = loss;
            epoch_loss += loss;
            if pp % 1000 == 0 && pp > 0 {
                debug!("batch {} / {}, loss: {}", pp, n_batches, epoch_loss / (pp + 1) as f32);
            }
        }

        Ok((batch_loss, epoch_loss / n_batches as f32))
    }

    /// Runs every epoch and returns the loss of the final batch of the final epoch.
    pub fn train(&mut self, model: &mut SharedEmbedding, pairs: &TrainingPairs) -> Result<f32> {

        if pairs.is_empty() {
            return Err(EmbeddingError::invalid_parameter("no training pairs"));
        }
        if self.batch_size == 0 {
            return Err(EmbeddingError::invalid_parameter("batch_size must be positive"));
        }
        if self.n_epochs == 0 {
            return Err(EmbeddingError::invalid_parameter("n_epochs must be positive"));
        }

        let mut loss = f32::NAN;
        for epoch in 0..self.n_epochs {
            let timer = Instant::now();
            let (last_loss, mean_loss) = self.do_training_epoch(model, pairs)?;
            loss = last_loss;
            info!(
                "{} epoch #{}: loss {:.4} (epoch mean {:.4}), took {} seconds",
                model.kind(), epoch, loss, mean_loss, timer.elapsed().as_secs()
            );
        }

        Ok(loss)
    }
}

pub fn train(model: &mut SharedEmbedding, pairs: &TrainingPairs, train_params: &JsonTrain) -> Result<f32> {
    Trainer::new(model, train_params).train(model, pairs)
}
