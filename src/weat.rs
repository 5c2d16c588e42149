
// Word Embedding Association Test.
//
// The p-value is exact: every way of splitting X u Y into two halves of size |X| is
// evaluated, C(|X| + |Y|, |X|) partitions in total. That count grows combinatorially,
// so target sets beyond a dozen words or so per side are impractical.

use crate::error::{EmbeddingError, Result};
use crate::measure::cosine_similarity;
use crate::table::EmbeddingTable;

use rayon::prelude::*;
use tracing::{debug, info};

/// Mean cosine similarity of `w` to `a` minus its mean cosine similarity to `b`.
pub fn weat_association(w: &str, a: &[String], b: &[String], word_to_embedding: &EmbeddingTable) -> Result<f64> {

    if a.is_empty() || b.is_empty() {
        return Err(EmbeddingError::invalid_parameter("attribute sets must not be empty"));
    }

    let w_embedding = word_to_embedding.get(w)?;
    let mean_cosine = |attributes: &[String]| -> Result<f64> {
        let mut total = 0.0;
        for attribute in attributes {
            total += cosine_similarity(&w_embedding, &word_to_embedding.get(attribute)?)?;
        }
        Ok(total / attributes.len() as f64)
    };

    Ok(mean_cosine(a)? - mean_cosine(b)?)
}

/// The WEAT test statistic: association summed over `x` minus association summed over `y`.
pub fn weat_differential_association(
    x: &[String],
    y: &[String],
    a: &[String],
    b: &[String],
    word_to_embedding: &EmbeddingTable,
) -> Result<f64> {
    let mut sx_ab = 0.0;
    for w in x {
        sx_ab += weat_association(w, a, b, word_to_embedding)?;
    }
    let mut sy_ab = 0.0;
    for w in y {
        sy_ab += weat_association(w, a, b, word_to_embedding)?;
    }
    Ok(sx_ab - sy_ab)
}

pub fn n_choose_k(n: usize, k: usize) -> Option<u64> {
    // None once the count leaves u64
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k);
    let mut result: u128 = 1;
    for i in 0..k {
        // exact at every step: the running value is C(n - k + i + 1, i + 1)
        result = result.checked_mul((n - k + i + 1) as u128)? / (i + 1) as u128;
        if result > u64::MAX as u128 {
            return None;
        }
    }
    Some(result as u64)
}

/// Every `k`-subset of `0..n` as sorted positions, in lexicographic order.
#[derive(Clone, Debug)]
pub struct Combinations {
    n: usize,
    indices: Vec<usize>,
    started: bool,
    done: bool,
}

impl Combinations {
    pub fn new(n: usize, k: usize) -> Combinations {
        Self { n, indices: (0..k).collect(), started: false, done: k > n }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(self.indices.clone());
        }

        // rightmost position that can still move right
        let k = self.indices.len();
        let mut i = k;
        loop {
            if i == 0 {
                self.done = true;
                return None;
            }
            i -= 1;
            if self.indices[i] != i + self.n - k {
                break;
            }
        }
        self.indices[i] += 1;
        for j in i + 1..k {
            self.indices[j] = self.indices[j - 1] + 1;
        }
        Some(self.indices.clone())
    }
}

pub fn compute_partitions(xy: &[String]) -> impl Iterator<Item = Vec<&str>> + '_ {
    Combinations::new(xy.len(), xy.len() / 2).map(move |c| c.iter().map(|i| xy[*i].as_str()).collect())
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PermutationTest {
    /// test statistic of the given (X, Y) split
    pub statistic: f64,
    /// fraction of partitions whose statistic is strictly greater
    pub p_value: f64,
    pub n_partitions: u64,
    pub n_exceeding: u64,
    /// partitions whose statistic equals the observed one, the observed split included
    pub n_ties: u64,
}

/// Runs the exact permutation test of the WEAT statistic.
///
/// Partitions are positions of `X u Y` (X first), so the complement of a half is taken
/// by position and a word repeated across the sets counts once per occurrence.
pub fn permutation_test(
    x: &[String],
    y: &[String],
    a: &[String],
    b: &[String],
    word_to_embedding: &EmbeddingTable,
) -> Result<PermutationTest> {

    if x.len() != y.len() {
        return Err(EmbeddingError::size_mismatch("target sets X and Y", x.len(), y.len()));
    }

    // every partition statistic is a signed sum of the same per-word associations
    let mut associations: Vec<f64> = Vec::with_capacity(x.len() + y.len());
    for w in x.iter().chain(y) {
        associations.push(weat_association(w, a, b, word_to_embedding)?);
    }

    let n = x.len();
    let m = associations.len();
    let n_partitions = n_choose_k(m, n).ok_or_else(|| {
        EmbeddingError::invalid_parameter(format!("too many partitions of {} target words", m))
    })?;
    info!("evaluating {} partitions of {} target words", n_partitions, m);

    let split_statistic = |chosen: &[usize]| -> f64 {
        let mut in_x = vec![false; m];
        let mut sx: f64 = 0.0;
        for &i in chosen {
            in_x[i] = true;
            sx += associations[i];
        }
        let mut sy: f64 = 0.0;
        for (i, assoc) in associations.iter().enumerate() {
            if !in_x[i] {
                sy += assoc;
            }
        }
        sx - sy
    };

    let first: Vec<usize> = (0..n).collect();
    let statistic = split_statistic(&first);

    let (n_exceeding, n_ties) = Combinations::new(m, n)
        .par_bridge()
        .map(|chosen| {
            let s_i = split_statistic(&chosen);
            ((s_i > statistic) as u64, (s_i == statistic) as u64)
        })
        .reduce(|| (0, 0), |(e1, t1), (e2, t2)| (e1 + e2, t1 + t2));

    let p_value = n_exceeding as f64 / n_partitions as f64;
    debug!("statistic {}, {} exceeding, {} ties", statistic, n_exceeding, n_ties);

    Ok(PermutationTest { statistic, p_value, n_partitions, n_exceeding, n_ties })
}

pub fn p_value_permutation_test(
    x: &[String],
    y: &[String],
    a: &[String],
    b: &[String],
    word_to_embedding: &EmbeddingTable,
) -> Result<f64> {
    Ok(permutation_test(x, y, a, b, word_to_embedding)?.p_value)
}
