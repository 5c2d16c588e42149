
use crate::error::{EmbeddingError, Result};

use ndarray::prelude::*;
use std::collections::HashMap;

/// Immutable word -> vector table (pretrained GloVe vectors for instance).
/// Vectors are the rows of one matrix, words keep their insertion order.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingTable {
    w2i: HashMap<String, usize>,
    words: Vec<String>,
    vectors: Array2<f64>,
}

impl EmbeddingTable {

    /// Builds a table from `(word, vector)` entries. A repeated word keeps its last vector.
    pub fn from_entries<I>(entries: I) -> Result<EmbeddingTable>
    where
        I: IntoIterator<Item = (String, Array1<f64>)>,
    {
        let mut w2i: HashMap<String, usize> = HashMap::new();
        let mut words: Vec<String> = Vec::new();
        let mut rows: Vec<Array1<f64>> = Vec::new();
        let mut dim: Option<usize> = None;

        for (word, vector) in entries {
            let expected = *dim.get_or_insert(vector.len());
            if vector.len() != expected {
                return Err(EmbeddingError::DimensionMismatch { expected, actual: vector.len() });
            }
            match w2i.get(&word) {
                Some(&i) => rows[i] = vector,
                None => {
                    w2i.insert(word.clone(), words.len());
                    words.push(word);
                    rows.push(vector);
                }
            }
        }

        let dim = dim.unwrap_or(0);
        let mut vectors = Array2::zeros((rows.len(), dim));
        for (mut row, vector) in vectors.axis_iter_mut(Axis(0)).zip(&rows) {
            row.assign(vector);
        }

        Ok(Self { w2i, words, vectors })
    }

    pub(crate) fn with_vectors(&self, vectors: Array2<f64>) -> Result<EmbeddingTable> {
        if vectors.nrows() != self.words.len() {
            return Err(EmbeddingError::size_mismatch("table rows", self.words.len(), vectors.nrows()));
        }
        Ok(Self { w2i: self.w2i.clone(), words: self.words.clone(), vectors })
    }

    pub fn get(&self, word: &str) -> Result<ArrayView1<'_, f64>> {
        match self.w2i.get(word) {
            Some(i) => Ok(self.vectors.row(*i)),
            None => Err(EmbeddingError::unknown_word(word)),
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.w2i.contains_key(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn vectors(&self) -> ArrayView2<'_, f64> {
        self.vectors.view()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ArrayView1<'_, f64>)> {
        self.words.iter().map(String::as_str).zip(self.vectors.axis_iter(Axis(0)))
    }
}


#[cfg(test)]
mod tests {

    use super::*;
    use ndarray::array;

    #[test]
    fn lookup_keeps_order_and_rejects_unknown_words() {
        let table = EmbeddingTable::from_entries(vec![
            ("he".to_string(), array![1.0, 0.0]),
            ("she".to_string(), array![0.0, 1.0]),
            ("he".to_string(), array![2.0, 0.0]),
        ])
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.dim(), 2);
        assert_eq!(table.words(), &["he".to_string(), "she".to_string()]);
        assert_eq!(table.get("he").unwrap(), array![2.0, 0.0]);
        assert!(table.contains("she"));
        assert!(matches!(table.get("it"), Err(EmbeddingError::UnknownWord(w)) if w == "it"));

        let words: Vec<&str> = table.iter().map(|(w, _)| w).collect();
        assert_eq!(words, vec!["he", "she"]);
    }

    #[test]
    fn vectors_must_share_a_dimension() {
        let result = EmbeddingTable::from_entries(vec![
            ("a".to_string(), array![1.0, 0.0]),
            ("b".to_string(), array![1.0, 0.0, 3.0]),
        ]);
        assert!(matches!(result, Err(EmbeddingError::DimensionMismatch { expected: 2, actual: 3 })));
    }
}
