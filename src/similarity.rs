
use crate::error::{EmbeddingError, Result};
use crate::vocab::Vocab;

use ndarray::prelude::*;

// rows shorter than this are treated as having this norm
const NORM_EPS: f32 = 1e-12;

/// Indices of the `k` rows of `w` most cosine-similar to `vec`.
///
/// The `k + 1` best rows are ranked and the first one is dropped, on the assumption that
/// `vec` is itself a row of `w` and trivially matches itself. This is a positional
/// convention, not a check: when `vec` is not its own best match (an analogy vector for
/// instance) the true best match is the one that gets dropped.
pub fn top_k_similar(vec: &ArrayView1<'_, f32>, w: &ArrayView2<'_, f32>, k: usize) -> Result<Vec<usize>> {

    if vec.len() != w.ncols() {
        return Err(EmbeddingError::DimensionMismatch { expected: w.ncols(), actual: vec.len() });
    }
    if k >= w.nrows() {
        return Err(EmbeddingError::invalid_parameter(format!(
            "cannot select {} neighbours besides the best match among {} rows", k, w.nrows()
        )));
    }

    let query_norm = vec.dot(vec).sqrt();
    if query_norm == 0.0 {
        return Err(EmbeddingError::ZeroVector);
    }
    let query = vec.mapv(|a| a / query_norm);

    // normalized rows times the normalized query
    let norms = w.map_axis(Axis(1), |row| row.dot(&row).sqrt().max(NORM_EPS));
    let scores = w.dot(&query) / &norms;

    // sort by most similar in descending order, ties keep the lower index
    let mut indexed_scores: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    indexed_scores.sort_by(|(_i, s), (_j, t)| t.total_cmp(s));

    Ok(indexed_scores.iter().take(k + 1).skip(1).map(|(i, _)| *i).collect())
}

pub struct Similarity<'a> {
    w: ArrayView2<'a, f32>,
    vocab: &'a Vocab,
}

impl<'a> Similarity<'a> {

    pub fn new(w: ArrayView2<'a, f32>, vocab: &'a Vocab) -> Result<Similarity<'a>> {
        if w.nrows() != vocab.len() {
            return Err(EmbeddingError::size_mismatch("embedding rows and vocabulary", w.nrows(), vocab.len()));
        }
        Ok(Self { w, vocab })
    }

    pub fn extract_vec_from_word(&self, token: &str) -> Result<ArrayView1<'a, f32>> {
        let i = self.vocab.index_of(token)?;
        Ok(self.w.index_axis_move(Axis(0), i))
    }

    /// `emb(a) - emb(b) + emb(c)`
    pub fn extract_analogy_vec(&self, inputs: [&str; 3]) -> Result<Array1<f32>> {
        let a = self.extract_vec_from_word(inputs[0])?;
        let b = self.extract_vec_from_word(inputs[1])?;
        let c = self.extract_vec_from_word(inputs[2])?;
        Ok(&a - &b + &c)
    }

    fn to_words(&self, indices: Vec<usize>) -> Result<Vec<String>> {
        indices.into_iter().map(|i| self.vocab.word_of(i).map(str::to_string)).collect()
    }

    pub fn retrieve_similar_words(&self, word: &str, k: usize) -> Result<Vec<String>> {
        let vec = self.extract_vec_from_word(word)?;
        let top_k = top_k_similar(&vec, &self.w, k)?;
        self.to_words(top_k)
    }

    /// "a is to b as ? is to c", answered with the neighbours of `a - b + c`.
    pub fn word_analogy(&self, inputs: [&str; 3], k: usize) -> Result<Vec<String>> {
        let analogy = self.extract_analogy_vec(inputs)?;
        let top_k = top_k_similar(&analogy.view(), &self.w, k)?;
        self.to_words(top_k)
    }
}
