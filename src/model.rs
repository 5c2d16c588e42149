
// shared weight model used by both CBOW and skip-gram. The embedding lookup and the
// output projection are two views of the same `weight` buffer, so an update through one
// is an update through the other.

use crate::error::{EmbeddingError, Result};

use ndarray::prelude::*;
use ndarray_rand::RandomExt;
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_stats::QuantileExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// sums the embeddings of a whole context window before projecting
    Cbow,
    /// projects the embedding of a single context token
    SkipGram,
}

impl Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::Cbow => write!(f, "CBOW"),
            ModelKind::SkipGram => write!(f, "Skip-gram"),
        }
    }
}

/// Weight-tied NNLM without hidden layer: `logits = (sum of context embeddings) . W^T`.
/// The projection has no bias.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SharedEmbedding {
    kind: ModelKind,
    weight: Array2<f32>, // (vocab_size, embed_dim)
}

impl SharedEmbedding {

    pub fn new(kind: ModelKind, num_words: usize, embed_dim: usize, seed: u64) -> Result<SharedEmbedding> {
        if num_words == 0 || embed_dim == 0 {
            return Err(EmbeddingError::invalid_parameter("num_words and embed_dim must be positive"));
        }
        // N(0, 1) entries from the seeded generator
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let weight = Array::random_using((num_words, embed_dim), StandardNormal, &mut rng);
        Ok(Self { kind, weight })
    }

    pub fn from_weight(kind: ModelKind, weight: Array2<f32>) -> SharedEmbedding {
        Self { kind, weight }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn vocab_size(&self) -> usize {
        self.weight.nrows()
    }

    pub fn embed_dim(&self) -> usize {
        self.weight.ncols()
    }

    pub fn embedding(&self) -> ArrayView2<'_, f32> {
        self.weight.view()
    }

    /// Column `i` projects onto the logit of word `i`; it is row `i` of `embedding()`.
    pub fn projection(&self) -> ArrayView2<'_, f32> {
        self.weight.t()
    }

    pub(crate) fn weight_mut(&mut self) -> &mut Array2<f32> {
        &mut self.weight
    }

    pub fn into_weight(self) -> Array2<f32> {
        self.weight
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.vocab_size() {
            return Err(EmbeddingError::IndexOutOfRange { index, vocab_size: self.vocab_size() });
        }
        Ok(())
    }

    fn check_batch(&self, x: &ArrayView2<'_, usize>) -> Result<()> {
        if x.is_empty() {
            return Err(EmbeddingError::invalid_parameter("empty batch"));
        }
        if self.kind == ModelKind::SkipGram && x.ncols() != 1 {
            return Err(EmbeddingError::DimensionMismatch { expected: 1, actual: x.ncols() });
        }
        // safe, the batch is not empty
        let max_index = *x.max().map_err(|e| EmbeddingError::invalid_parameter(e.to_string()))?;
        self.check_index(max_index)
    }

    /// Hidden vectors of shape (batch, embed_dim). `x` is (batch, 1) for skip-gram and
    /// (batch, 2 * window_size) for CBOW, where the window embeddings are summed.
    pub fn embed(&self, x: &ArrayView2<'_, usize>) -> Result<Array2<f32>> {
        self.check_batch(x)?;
        let mut hidden: Array2<f32> = Array2::zeros((x.nrows(), self.embed_dim()));
        for (mut h, row) in hidden.axis_iter_mut(Axis(0)).zip(x.axis_iter(Axis(0))) {
            for &index in row {
                h += &self.weight.row(index);
            }
        }
        Ok(hidden)
    }

    pub fn forward(&self, x: &ArrayView2<'_, usize>) -> Result<Array2<f32>> {
        let hidden = self.embed(x)?;
        Ok(hidden.dot(&self.projection()))
    }

    /// Mean cross-entropy of the batch and its gradient with respect to the shared weight.
    /// The gradient collects both uses of the weight: the projection term `G^T . H` and the
    /// lookup term scattered back onto every context row.
    pub fn loss_and_gradient(&self, x: &ArrayView2<'_, usize>, y: &[usize]) -> Result<(f32, Array2<f32>)> {

        if x.nrows() != y.len() {
            return Err(EmbeddingError::size_mismatch("sources and targets", x.nrows(), y.len()));
        }
        for &target in y {
            self.check_index(target)?;
        }

        let hidden = self.embed(x)?;
        let mut probs = hidden.dot(&self.projection()); // logits for now
        let batch = y.len() as f32;

        // softmax cross-entropy, shifted by the row max for stability
        let mut loss = 0.0;
        for (mut row, &target) in probs.axis_iter_mut(Axis(0)).zip(y) {
            let max = row.fold(f32::NEG_INFINITY, |m, &z| m.max(z));
            let log_sum = max + row.mapv(|z| (z - max).exp()).sum().ln();
            loss += log_sum - row[target];
            row.mapv_inplace(|z| (z - log_sum).exp());
            row[target] -= 1.0;
        }
        let d_logits = probs / batch;

        // projection use
        let mut grad: Array2<f32> = d_logits.t().dot(&hidden);
        // lookup use
        let d_hidden = d_logits.dot(&self.weight);
        for (d_h, row) in d_hidden.axis_iter(Axis(0)).zip(x.axis_iter(Axis(0))) {
            for &index in row {
                grad.row_mut(index).scaled_add(1.0, &d_h);
            }
        }

        Ok((loss / batch, grad))
    }
}


#[cfg(test)]
mod tests {

    use super::*;
    use ndarray::array;

    #[test]
    fn lookup_and_projection_share_storage() {
        let model = SharedEmbedding::new(ModelKind::Cbow, 7, 3, 2022).unwrap();
        assert_eq!(model.embedding().shape(), &[7, 3]);
        assert_eq!(model.projection().shape(), &[3, 7]);
        assert_eq!(model.embedding().as_ptr(), model.projection().as_ptr());
        for i in 0..7 {
            assert_eq!(model.embedding().row(i), model.projection().column(i));
        }
    }

    #[test]
    fn seeded_initialization_is_reproducible() {
        let a = SharedEmbedding::new(ModelKind::SkipGram, 5, 4, 7).unwrap();
        let b = SharedEmbedding::new(ModelKind::SkipGram, 5, 4, 7).unwrap();
        let c = SharedEmbedding::new(ModelKind::SkipGram, 5, 4, 8).unwrap();
        assert_eq!(a.embedding(), b.embedding());
        assert_ne!(a.embedding(), c.embedding());
    }

    #[test]
    fn cbow_sums_context_and_skipgram_projects_single() {
        let weight = array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let cbow = SharedEmbedding::from_weight(ModelKind::Cbow, weight.clone());
        let logits = cbow.forward(&array![[1, 2]].view()).unwrap();
        // hidden = [1, 1], logits = W . hidden
        assert_eq!(logits, array![[0.0, 1.0, 1.0, 2.0]]);

        let skipgram = SharedEmbedding::from_weight(ModelKind::SkipGram, weight);
        let logits = skipgram.forward(&array![[3], [1]].view()).unwrap();
        assert_eq!(logits, array![[0.0, 1.0, 1.0, 2.0], [0.0, 1.0, 0.0, 1.0]]);

        assert!(matches!(
            skipgram.forward(&array![[1, 2]].view()),
            Err(EmbeddingError::DimensionMismatch { expected: 1, actual: 2 })
        ));
    }

    #[test]
    fn out_of_range_index_aborts() {
        let model = SharedEmbedding::new(ModelKind::Cbow, 4, 2, 0).unwrap();
        assert!(matches!(
            model.forward(&array![[1, 4]].view()),
            Err(EmbeddingError::IndexOutOfRange { index: 4, vocab_size: 4 })
        ));
        assert!(matches!(
            model.loss_and_gradient(&array![[1, 2]].view(), &[9]),
            Err(EmbeddingError::IndexOutOfRange { index: 9, .. })
        ));
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let model = SharedEmbedding::new(ModelKind::Cbow, 5, 3, 11).unwrap();
        let x = array![[1, 2], [3, 1]];
        let y = [4, 2];
        let (_, grad) = model.loss_and_gradient(&x.view(), &y).unwrap();

        let eps = 1e-2;
        for &(i, j) in &[(1, 0), (2, 2), (4, 1), (0, 0)] {
            let mut plus = model.clone();
            plus.weight_mut()[[i, j]] += eps;
            let mut minus = model.clone();
            minus.weight_mut()[[i, j]] -= eps;
            let (lp, _) = plus.loss_and_gradient(&x.view(), &y).unwrap();
            let (lm, _) = minus.loss_and_gradient(&x.view(), &y).unwrap();
            let numeric = (lp - lm) / (2.0 * eps);
            assert!((numeric - grad[[i, j]]).abs() < 1e-2, "({}, {}): {} vs {}", i, j, numeric, grad[[i, j]]);
        }
    }
}
