
// bias subspace estimation: every (male, female) attribute pair is centered on its own
// mean, the centered vectors are pooled, and the principal components of the pool are
// the bias directions.
//
// PCA diagonalizes the covariance matrix with cyclic Jacobi rotations, so close
// eigenvalues still come out in the right order.

use crate::error::{EmbeddingError, Result};
use crate::table::EmbeddingTable;

use ndarray::prelude::*;
use tracing::debug;

const MAX_SWEEPS: usize = 100;
// off-diagonal mass relative to the whole matrix, both as sums of squares
const TOLERANCE: f64 = 1e-22;

/// Unit-norm bias directions, one per row, in decreasing order of explained variance.
#[derive(Clone, Debug)]
pub struct BiasSubspace {
    components: Array2<f64>,
    explained_variance: Array1<f64>,
}

impl BiasSubspace {

    pub fn from_components(mut components: Array2<f64>) -> Result<BiasSubspace> {
        for mut row in components.axis_iter_mut(Axis(0)) {
            let norm = row.dot(&row).sqrt();
            if norm == 0.0 {
                return Err(EmbeddingError::ZeroVector);
            }
            row /= norm;
        }
        let explained_variance = Array1::from_elem(components.nrows(), f64::NAN);
        Ok(Self { components, explained_variance })
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    pub fn dim(&self) -> usize {
        self.components.ncols()
    }

    pub fn components(&self) -> ArrayView2<'_, f64> {
        self.components.view()
    }

    /// Variance of the pooled vectors along each component (NaN for hand-made subspaces).
    pub fn explained_variance(&self) -> ArrayView1<'_, f64> {
        self.explained_variance.view()
    }

    /// The single bias direction. Projection and debiasing are only defined for a
    /// one-component subspace.
    pub fn direction(&self) -> Result<ArrayView1<'_, f64>> {
        if self.n_components() != 1 {
            return Err(EmbeddingError::invalid_parameter(format!(
                "a single bias direction is required, the subspace has {} components",
                self.n_components()
            )));
        }
        Ok(self.components.row(0))
    }
}

/// Top `n_components` principal directions of the rows of `data`, with the variance
/// each explains. The entry of largest magnitude of every direction is made positive.
pub fn pca(data: &ArrayView2<'_, f64>, n_components: usize) -> Result<(Array2<f64>, Array1<f64>)> {

    let (n_samples, dim) = data.dim();
    if n_components == 0 || n_components > n_samples.min(dim) {
        return Err(EmbeddingError::invalid_parameter(format!(
            "n_components must be between 1 and {}, got {}", n_samples.min(dim), n_components
        )));
    }

    // centering, then the sample covariance
    let mean = data.mean_axis(Axis(0)).ok_or_else(|| EmbeddingError::invalid_parameter("no samples"))?;
    let centered = data - &mean;
    let dof = (n_samples.max(2) - 1) as f64;
    let cov: Array2<f64> = centered.t().dot(&centered) / dof;

    let (eigenvalues, eigenvectors) = symmetric_eigen(cov)?;

    // decreasing variance, ties keep the lower index
    let mut order: Vec<usize> = (0..dim).collect();
    order.sort_by(|&i, &j| eigenvalues[j].total_cmp(&eigenvalues[i]));

    let mut components: Array2<f64> = Array2::zeros((n_components, dim));
    let mut variances: Array1<f64> = Array1::zeros(n_components);
    for (c, &i) in order.iter().take(n_components).enumerate() {
        let mut v = eigenvectors.column(i).to_owned();
        let (arg_max, _) = v
            .iter()
            .enumerate()
            .fold((0, 0.0_f64), |(im, m), (j, x)| if x.abs() > m { (j, x.abs()) } else { (im, m) });
        if v[arg_max] < 0.0 {
            v.mapv_inplace(|x| -x);
        }
        variances[c] = eigenvalues[i];
        components.row_mut(c).assign(&v);
    }

    Ok((components, variances))
}

// eigenvalues and eigenvectors (as columns) of a symmetric matrix
fn symmetric_eigen(mut a: Array2<f64>) -> Result<(Array1<f64>, Array2<f64>)> {

    let n = a.nrows();
    let mut v: Array2<f64> = Array2::eye(n);
    let total: f64 = a.iter().map(|x| x * x).sum();

    for sweep in 0..MAX_SWEEPS {
        let mut off = 0.0;
        for p in 0..n {
            for q in p + 1..n {
                off += 2.0 * a[[p, q]] * a[[p, q]];
            }
        }
        if off <= TOLERANCE * total {
            debug!("eigen decomposition converged after {} sweeps", sweep);
            return Ok((a.diag().to_owned(), v));
        }

        for p in 0..n {
            for q in p + 1..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                // rotation angle that zeroes a[p, q], smaller root for stability
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let (akp, akq) = (a[[k, p]], a[[k, q]]);
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[[p, k]], a[[q, k]]);
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                a[[p, q]] = 0.0;
                a[[q, p]] = 0.0;

                for k in 0..n {
                    let (vkp, vkq) = (v[[k, p]], v[[k, q]]);
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    Err(EmbeddingError::invalid_parameter(format!(
        "eigen decomposition did not converge within {} sweeps", MAX_SWEEPS
    )))
}

pub fn compute_gender_subspace(
    word_to_embedding: &EmbeddingTable,
    gender_attribute_words: &[(String, String)],
    n_components: usize,
) -> Result<BiasSubspace> {

    if gender_attribute_words.is_empty() {
        return Err(EmbeddingError::invalid_parameter("no gender attribute pairs"));
    }

    let mut pooled: Array2<f64> = Array2::zeros((2 * gender_attribute_words.len(), word_to_embedding.dim()));
    for (p, (male_word, female_word)) in gender_attribute_words.iter().enumerate() {
        let male_embedding = word_to_embedding.get(male_word)?;
        let female_embedding = word_to_embedding.get(female_word)?;
        let mean_embedding = (&male_embedding + &female_embedding) / 2.0;

        pooled.row_mut(2 * p).assign(&(&male_embedding - &mean_embedding));
        pooled.row_mut(2 * p + 1).assign(&(&female_embedding - &mean_embedding));
    }

    let (components, explained_variance) = pca(&pooled.view(), n_components)?;
    Ok(BiasSubspace { components, explained_variance })
}
