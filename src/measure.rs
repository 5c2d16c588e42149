
// bias measurements over (possibly multi-word) phrases

use crate::debias::project;
use crate::error::{EmbeddingError, Result};
use crate::subspace::BiasSubspace;
use crate::table::EmbeddingTable;

use ndarray::prelude::*;
use std::collections::HashSet;

#[derive(Clone, Debug, PartialEq)]
pub enum PhraseLookup {
    /// the phrase itself has a vector
    Whole(Array1<f64>),
    /// mean of the vectors of the space separated words of the phrase
    ByParts(Array1<f64>),
    /// this word of the phrase has no vector
    Missing(String),
}

impl PhraseLookup {
    pub fn into_vector(self) -> Result<Array1<f64>> {
        match self {
            PhraseLookup::Whole(vector) | PhraseLookup::ByParts(vector) => Ok(vector),
            PhraseLookup::Missing(word) => Err(EmbeddingError::UnknownWord(word)),
        }
    }
}

pub fn lookup_phrase(word_to_embedding: &EmbeddingTable, phrase: &str) -> PhraseLookup {

    if let Ok(vector) = word_to_embedding.get(phrase) {
        return PhraseLookup::Whole(vector.to_owned());
    }

    let mut sum: Array1<f64> = Array1::zeros(word_to_embedding.dim());
    let mut n = 0;
    for word in phrase.split_whitespace() {
        match word_to_embedding.get(word) {
            Ok(vector) => sum += &vector,
            Err(_) => return PhraseLookup::Missing(word.to_string()),
        }
        n += 1;
    }
    if n == 0 {
        return PhraseLookup::Missing(phrase.to_string());
    }
    PhraseLookup::ByParts(sum / n as f64)
}

pub fn compute_profession_embeddings(word_to_embedding: &EmbeddingTable, professions: &[String]) -> Result<EmbeddingTable> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut entries = Vec::with_capacity(professions.len());
    for profession in professions {
        if !seen.insert(profession.as_str()) {
            continue;
        }
        let vector = lookup_phrase(word_to_embedding, profession).into_vector()?;
        entries.push((profession.to_owned(), vector));
    }
    EmbeddingTable::from_entries(entries)
}

pub fn cosine_similarity(a: &ArrayView1<'_, f64>, b: &ArrayView1<'_, f64>) -> Result<f64> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch { expected: a.len(), actual: b.len() });
    }
    let norms = a.dot(a).sqrt() * b.dot(b).sqrt();
    if norms == 0.0 {
        return Err(EmbeddingError::ZeroVector);
    }
    Ok(a.dot(b) / norms)
}

/// The `k` words with the largest (`max_`) or smallest signed scalar projection onto the
/// bias direction, most extreme first. Ties keep the input order.
pub fn compute_extreme_words(
    words: &[String],
    word_to_embedding: &EmbeddingTable,
    gender_subspace: &BiasSubspace,
    k: usize,
    max_: bool,
) -> Result<Vec<String>> {

    let direction = gender_subspace.direction()?;
    let word_embeddings = compute_profession_embeddings(word_to_embedding, words)?;

    let mut projection_scalars: Vec<(&str, f64)> = Vec::with_capacity(word_embeddings.len());
    for (word, embedding) in word_embeddings.iter() {
        let (scalar, _) = project(&embedding, &direction)?;
        projection_scalars.push((word, scalar));
    }

    if max_ {
        projection_scalars.sort_by(|(_, a), (_, b)| b.total_cmp(a));
    } else {
        projection_scalars.sort_by(|(_, a), (_, b)| a.total_cmp(b));
    }

    Ok(projection_scalars.into_iter().take(k).map(|(w, _)| w.to_string()).collect())
}

/// DirectBias: mean of `|cos(w, g)|^c` over the words, with `g` the bias direction.
pub fn compute_direct_bias(
    words: &[String],
    word_to_embedding: &EmbeddingTable,
    gender_subspace: &BiasSubspace,
    c: f64,
) -> Result<f64> {

    let direction = gender_subspace.direction()?;
    let embeddings = compute_profession_embeddings(word_to_embedding, words)?;
    if embeddings.is_empty() {
        return Err(EmbeddingError::invalid_parameter("direct bias of an empty word list"));
    }

    let mut total = 0.0;
    for (_, embedding) in embeddings.iter() {
        total += cosine_similarity(&embedding, &direction)?.abs().powf(c);
    }
    Ok(total / embeddings.len() as f64)
}
