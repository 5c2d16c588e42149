
use crate::error::{EmbeddingError, Result};
use crate::subspace::{compute_gender_subspace, BiasSubspace};
use crate::table::EmbeddingTable;

use ndarray::prelude::*;
use tracing::info;

pub fn project(a: &ArrayView1<'_, f64>, b: &ArrayView1<'_, f64>) -> Result<(f64, Array1<f64>)> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch { expected: b.len(), actual: a.len() });
    }
    let bb = b.dot(b);
    if bb == 0.0 {
        return Err(EmbeddingError::ZeroVector);
    }
    let scalar = a.dot(b) / bb;
    Ok((scalar, b.mapv(|x| scalar * x)))
}

/// The embedding of `word` with its component along the bias direction removed.
/// The table is left untouched.
pub fn debias_word(
    word: &str,
    word_to_embedding: &EmbeddingTable,
    gender_subspace: &BiasSubspace,
) -> Result<Array1<f64>> {
    let direction = gender_subspace.direction()?;
    let word_embed = word_to_embedding.get(word)?;
    let (_, gender_vector) = project(&word_embed, &direction)?;
    Ok(&word_embed - &gender_vector)
}

pub fn debias_table(word_to_embedding: &EmbeddingTable, gender_subspace: &BiasSubspace) -> Result<EmbeddingTable> {
    let direction = gender_subspace.direction()?;
    if direction.len() != word_to_embedding.dim() {
        return Err(EmbeddingError::DimensionMismatch { expected: word_to_embedding.dim(), actual: direction.len() });
    }
    let bb = direction.dot(&direction);
    if bb == 0.0 {
        return Err(EmbeddingError::ZeroVector);
    }

    let vectors = word_to_embedding.vectors();
    // one scalar projection per word, shape (n_words, 1)
    let scalars = (vectors.dot(&direction) / bb).insert_axis(Axis(1));
    let debiased = &vectors - &(&scalars * &direction);
    word_to_embedding.with_vectors(debiased)
}

/// Hard-Debias: estimates the bias subspace from the attribute pairs and removes it from
/// every word of the table, returning a new table with the same words.
pub fn hard_debias(
    word_to_embedding: &EmbeddingTable,
    gender_attribute_words: &[(String, String)],
    n_components: usize,
) -> Result<EmbeddingTable> {
    let gender_subspace = compute_gender_subspace(word_to_embedding, gender_attribute_words, n_components)?;
    info!("debiasing {} words against a {}-component subspace", word_to_embedding.len(), n_components);
    debias_table(word_to_embedding, &gender_subspace)
}


#[cfg(test)]
mod tests {

    use super::*;
    use ndarray::array;

    fn table() -> EmbeddingTable {
        EmbeddingTable::from_entries(vec![
            ("man".to_string(), array![1.0, 0.5, 2.0]),
            ("woman".to_string(), array![-1.0, 0.5, 2.0]),
            ("doctor".to_string(), array![0.4, 1.0, -0.3]),
            ("nurse".to_string(), array![-0.7, 0.2, 0.9]),
        ])
        .unwrap()
    }

    fn gender_pairs() -> Vec<(String, String)> {
        vec![("man".to_string(), "woman".to_string())]
    }

    #[test]
    fn residual_is_orthogonal() {
        let a = array![3.0, -1.0, 2.0];
        let b = array![0.5, 2.0, -1.0];
        let (scalar, vector) = project(&a.view(), &b.view()).unwrap();
        assert!((scalar - (-2.5 / 5.25)).abs() < 1e-12);
        let residual = &a - &vector;
        assert!(residual.dot(&b).abs() < 1e-12);
    }

    #[test]
    fn zero_direction_is_a_domain_error() {
        let a = array![1.0, 2.0];
        let zero = array![0.0, 0.0];
        assert!(matches!(project(&a.view(), &zero.view()), Err(EmbeddingError::ZeroVector)));
    }

    #[test]
    fn debias_word_leaves_table_untouched() {
        let t = table();
        let subspace = compute_gender_subspace(&t, &gender_pairs(), 1).unwrap();
        let debiased = debias_word("doctor", &t, &subspace).unwrap();
        // the gender direction is the first axis
        assert!((debiased[0]).abs() < 1e-12);
        assert!((debiased[1] - 1.0).abs() < 1e-12);
        assert_eq!(t.get("doctor").unwrap(), array![0.4, 1.0, -0.3]);
        assert!(debias_word("surgeon", &t, &subspace).is_err());
    }

    #[test]
    fn hard_debias_keeps_keys_and_is_idempotent() {
        let t = table();
        let subspace = compute_gender_subspace(&t, &gender_pairs(), 1).unwrap();
        let direction = subspace.direction().unwrap();

        let once = hard_debias(&t, &gender_pairs(), 1).unwrap();
        assert_eq!(once.words(), t.words());
        for (word, vector) in once.iter() {
            let (scalar, _) = project(&vector, &direction).unwrap();
            assert!(scalar.abs() < 1e-12, "{} keeps {}", word, scalar);
            let single = debias_word(word, &t, &subspace).unwrap();
            assert!((&single - &vector).iter().all(|d| d.abs() < 1e-12));
        }

        let twice = debias_table(&once, &subspace).unwrap();
        for ((_, a), (_, b)) in once.iter().zip(twice.iter()) {
            assert!((&a - &b).iter().all(|d| d.abs() < 1e-12));
        }
    }

    #[test]
    fn multi_component_subspace_is_rejected() {
        let subspace = BiasSubspace::from_components(array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]).unwrap();
        assert!(debias_table(&table(), &subspace).is_err());
        assert!(debias_word("man", &table(), &subspace).is_err());
    }
}
