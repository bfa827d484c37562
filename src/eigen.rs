//! Eigendecomposition of general real square matrices.
//!
//! Eigenvalues come from the real Schur form. Eigenvalues that agree up to
//! rounding form a cluster; each cluster gets one SVD of `A - λI`, and its
//! members take the right-singular vectors with the smallest singular values
//! in turn, so `eigenvectors[i]` always belongs to `eigenvalues[i]`.
//!
//! JSON has no complex type, so every number leaves this module as a
//! [`ComplexPair`], serialized as `[re, im]`.

use nalgebra::{Complex, DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

const MAX_ITERATIONS: usize = 10_000;
/// Relative distance under which two eigenvalues count as the same one.
const CLUSTER_TOLERANCE: f64 = 1e-6;
/// Relative singular value under which a right-singular vector is a null vector.
const NULL_TOLERANCE: f64 = 1e-8;
/// Components smaller than this (relative) are reported as exact zeros.
const SNAP_TOLERANCE: f64 = 1e-12;

/// A complex number on the wire: `[real, imaginary]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexPair(pub f64, pub f64);

impl ComplexPair {
    pub fn re(self) -> f64 {
        self.0
    }

    pub fn im(self) -> f64 {
        self.1
    }

    fn snapped(z: Complex<f64>, tolerance: f64) -> Self {
        let snap = |x: f64| if x.abs() < tolerance { 0.0 } else { x };
        ComplexPair(snap(z.re), snap(z.im))
    }
}

/// Eigenpairs in matching order: `eigenvectors[i]` is the column vector for
/// `eigenvalues[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EigenResult {
    pub eigenvalues: Vec<ComplexPair>,
    pub eigenvectors: Vec<Vec<ComplexPair>>,
}

/// Check that `rows` is a non-empty square grid of finite numbers and return its size.
fn validate(rows: &[Vec<f64>]) -> Result<usize, AppError> {
    let n = rows.len();
    if n == 0 {
        return Err(AppError::invalid_matrix("Matrix is empty"));
    }
    for (i, row) in rows.iter().enumerate() {
        if row.len() != n {
            return Err(AppError::invalid_matrix(format!(
                "Matrix must be square: row {i} has {} entries, expected {n}",
                row.len()
            )));
        }
        if let Some(j) = row.iter().position(|x| !x.is_finite()) {
            return Err(AppError::invalid_matrix(format!(
                "Matrix entry ({i}, {j}) is not a finite number"
            )));
        }
    }
    Ok(n)
}

/// Compute all eigenpairs of the square matrix given as rows.
///
/// # Errors
/// `InvalidMatrix` for empty, ragged, non-square, or non-finite input, and
/// when an iteration fails to converge. Never returns partial results.
pub fn decompose(rows: &[Vec<f64>]) -> Result<EigenResult, AppError> {
    let n = validate(rows)?;
    let a = DMatrix::from_row_iterator(n, n, rows.iter().flatten().copied());
    let scale = magnitude(&a);

    if n == 1 {
        return Ok(EigenResult {
            eigenvalues: a
                .iter()
                .map(|&x| ComplexPair::snapped(Complex::new(x, 0.0), SNAP_TOLERANCE * scale))
                .collect(),
            eigenvectors: vec![vec![ComplexPair(1.0, 0.0)]],
        });
    }

    let schur = a
        .clone()
        .try_schur(f64::EPSILON, MAX_ITERATIONS)
        .ok_or_else(|| AppError::invalid_matrix("Eigenvalue iteration did not converge"))?;
    let eigenvalues: Vec<Complex<f64>> = schur.complex_eigenvalues().iter().copied().collect();

    let complex_a: DMatrix<Complex<f64>> = a.map(|x| Complex::new(x, 0.0));
    let mut eigenvectors: Vec<Option<Vec<ComplexPair>>> = vec![None; n];
    for members in clusters(&eigenvalues, CLUSTER_TOLERANCE * scale) {
        let vectors = eigenspace_basis(&complex_a, &eigenvalues, &members, scale)?;
        for (index, vector) in members.into_iter().zip(vectors) {
            if let Some(slot) = eigenvectors.get_mut(index) {
                *slot = Some(
                    vector
                        .iter()
                        .map(|&z| ComplexPair::snapped(z, SNAP_TOLERANCE))
                        .collect(),
                );
            }
        }
    }
    let eigenvectors = eigenvectors
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| AppError::invalid_matrix("Eigenvector computation returned no basis"))?;

    tracing::debug!(size = n, "Computed eigendecomposition");
    Ok(EigenResult {
        eigenvalues: eigenvalues
            .into_iter()
            .map(|z| ComplexPair::snapped(z, SNAP_TOLERANCE * scale))
            .collect(),
        eigenvectors,
    })
}

/// Largest absolute entry, or 1 for the zero matrix. Every tolerance is
/// relative to this.
fn magnitude(a: &DMatrix<f64>) -> f64 {
    let amax = a.amax();
    if amax > 0.0 {
        amax
    } else {
        1.0
    }
}

/// Group eigenvalue indices whose values lie within `tolerance` of a
/// cluster's first member. Indices keep their original order inside a group.
fn clusters(eigenvalues: &[Complex<f64>], tolerance: f64) -> Vec<Vec<usize>> {
    let mut assigned = vec![false; eigenvalues.len()];
    let mut groups = Vec::new();
    for (i, &lambda) in eigenvalues.iter().enumerate() {
        if assigned.get(i).copied().unwrap_or(true) {
            continue;
        }
        let members: Vec<usize> = eigenvalues
            .iter()
            .enumerate()
            .skip(i)
            .filter(|&(j, &mu)| {
                !assigned.get(j).copied().unwrap_or(true) && (mu - lambda).norm() <= tolerance
            })
            .map(|(j, _)| j)
            .collect();
        for &j in &members {
            if let Some(flag) = assigned.get_mut(j) {
                *flag = true;
            }
        }
        groups.push(members);
    }
    groups
}

/// One unit eigenvector per cluster member, from a single SVD of `a - λ̄I`
/// where `λ̄` is the cluster mean. The k-th member takes the k-th smallest
/// singular direction while that direction is still a null vector; a
/// defective cluster repeats the smallest one.
fn eigenspace_basis(
    a: &DMatrix<Complex<f64>>,
    eigenvalues: &[Complex<f64>],
    members: &[usize],
    scale: f64,
) -> Result<Vec<DVector<Complex<f64>>>, AppError> {
    let n = a.nrows();
    let sum: Complex<f64> = members
        .iter()
        .filter_map(|&i| eigenvalues.get(i).copied())
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = sum / members.len().max(1) as f64;

    let shifted = a - DMatrix::from_diagonal_element(n, n, mean);
    let svd = shifted
        .try_svd(false, true, f64::EPSILON, MAX_ITERATIONS)
        .ok_or_else(|| AppError::invalid_matrix("Eigenvector iteration did not converge"))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| AppError::invalid_matrix("Eigenvector computation returned no basis"))?;

    let mut ranked: Vec<(usize, f64)> = svd.singular_values.iter().copied().enumerate().collect();
    ranked.sort_by(|x, y| x.1.total_cmp(&y.1));
    let smallest = ranked
        .first()
        .map(|(index, _)| *index)
        .ok_or_else(|| AppError::invalid_matrix("Eigenvector computation returned no basis"))?;

    Ok((0..members.len())
        .map(|k| {
            let chosen = ranked
                .get(k)
                .filter(|(_, sigma)| *sigma <= NULL_TOLERANCE * scale)
                .map_or(smallest, |(index, _)| *index);
            normalize_phase(&v_t.row(chosen).adjoint())
        })
        .collect())
}

/// Scale to unit length and rotate so the largest component is real and positive.
fn normalize_phase(v: &DVector<Complex<f64>>) -> DVector<Complex<f64>> {
    let norm = v.norm();
    if norm == 0.0 {
        return v.clone();
    }
    let pivot = v
        .iter()
        .copied()
        .max_by(|x, y| x.norm().total_cmp(&y.norm()))
        .unwrap_or(Complex::new(1.0, 0.0));
    let rotation = pivot.conj() / (pivot.norm() * norm);
    v.map(|z| z * rotation)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn to_complex(pair: ComplexPair) -> Complex<f64> {
        Complex::new(pair.re(), pair.im())
    }

    /// ‖A v − λ v‖ for every returned pair.
    fn residuals(rows: &[Vec<f64>], result: &EigenResult) -> Vec<f64> {
        let n = rows.len();
        let a = DMatrix::from_row_iterator(n, n, rows.iter().flatten().map(|&x| Complex::new(x, 0.0)));
        result
            .eigenvalues
            .iter()
            .zip(&result.eigenvectors)
            .map(|(&lambda, vector)| {
                let v = DVector::from_iterator(n, vector.iter().map(|&p| to_complex(p)));
                (&a * &v - v.clone() * to_complex(lambda)).norm()
            })
            .collect()
    }

    #[test]
    fn test_diagonal_matrix_pairs_positionally() {
        let rows = vec![vec![2.0, 0.0], vec![0.0, 3.0]];
        let result = decompose(&rows).unwrap();

        assert_eq!(result.eigenvalues.len(), 2);
        assert_eq!(result.eigenvectors.len(), 2);
        for (value, vector) in result.eigenvalues.iter().zip(&result.eigenvectors) {
            assert_eq!(value.im(), 0.0);
            if (value.re() - 2.0).abs() < 1e-9 {
                assert_abs_diff_eq!(vector[0].re(), 1.0, epsilon = 1e-9);
                assert_abs_diff_eq!(vector[1].re(), 0.0, epsilon = 1e-9);
            } else {
                assert_abs_diff_eq!(value.re(), 3.0, epsilon = 1e-9);
                assert_abs_diff_eq!(vector[0].re(), 0.0, epsilon = 1e-9);
                assert_abs_diff_eq!(vector[1].re(), 1.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_rotation_has_imaginary_eigenvalues() {
        let rows = vec![vec![0.0, -1.0], vec![1.0, 0.0]];
        let result = decompose(&rows).unwrap();

        let mut imaginary: Vec<f64> = result.eigenvalues.iter().map(|v| v.im()).collect();
        imaginary.sort_by(f64::total_cmp);
        assert_abs_diff_eq!(imaginary[0], -1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(imaginary[1], 1.0, epsilon = 1e-9);
        for value in &result.eigenvalues {
            assert_abs_diff_eq!(value.re(), 0.0, epsilon = 1e-9);
        }
        for r in residuals(&rows, &result) {
            assert!(r < 1e-9, "residual {r}");
        }
    }

    #[test]
    fn test_general_matrix_residuals() {
        let rows = vec![
            vec![4.0, 1.0, 2.0],
            vec![0.5, 3.0, 1.0],
            vec![1.0, -2.0, 2.0],
        ];
        let result = decompose(&rows).unwrap();
        assert_eq!(result.eigenvalues.len(), 3);
        for vector in &result.eigenvectors {
            assert_eq!(vector.len(), 3);
            let norm: f64 = vector.iter().map(|p| to_complex(*p).norm_sqr()).sum();
            assert_abs_diff_eq!(norm, 1.0, epsilon = 1e-9);
        }
        for r in residuals(&rows, &result) {
            assert!(r < 1e-8, "residual {r}");
        }
    }

    #[test]
    fn test_repeated_eigenvalue_gets_independent_vectors() {
        let rows = vec![vec![5.0, 0.0], vec![0.0, 5.0]];
        let result = decompose(&rows).unwrap();
        let dot = inner(&result.eigenvectors[0], &result.eigenvectors[1]);
        assert!(dot < 1e-9, "eigenvectors should be orthogonal");
    }

    fn inner(u: &[ComplexPair], v: &[ComplexPair]) -> f64 {
        u.iter()
            .zip(v)
            .map(|(a, b)| to_complex(*a).conj() * to_complex(*b))
            .sum::<Complex<f64>>()
            .norm()
    }

    #[test]
    fn test_tiny_entries_keep_values_and_pairing() {
        let rows = vec![vec![1e-13, 0.0], vec![0.0, 2e-13]];
        let result = decompose(&rows).unwrap();
        let mut values: Vec<f64> = result.eigenvalues.iter().map(|v| v.re()).collect();
        values.sort_by(f64::total_cmp);
        assert_abs_diff_eq!(values[0], 1e-13, epsilon = 1e-20);
        assert_abs_diff_eq!(values[1], 2e-13, epsilon = 1e-20);

        let rows = vec![vec![1e-9, 0.0], vec![0.0, 3e-9]];
        let result = decompose(&rows).unwrap();
        for (value, vector) in result.eigenvalues.iter().zip(&result.eigenvectors) {
            let expected_axis = usize::from(value.re() > 2e-9);
            assert_abs_diff_eq!(vector[expected_axis].re(), 1.0, epsilon = 1e-9);
        }
        for r in residuals(&rows, &result) {
            assert!(r < 1e-18, "residual {r}");
        }
    }

    #[test]
    fn test_rounded_repeated_eigenvalue_spans_its_eigenspace() {
        // P · diag(2, 2, 3) · P⁻¹ has a two-dimensional eigenspace for 2.
        let p = DMatrix::from_row_slice(3, 3, &[1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 1.0]);
        let d = DMatrix::from_diagonal(&DVector::from_vec(vec![2.0, 2.0, 3.0]));
        let a = &p * d * p.clone().try_inverse().unwrap();
        let rows: Vec<Vec<f64>> = a.row_iter().map(|r| r.iter().copied().collect()).collect();

        let result = decompose(&rows).unwrap();
        for r in residuals(&rows, &result) {
            assert!(r < 1e-8, "residual {r}");
        }
        let twos: Vec<&Vec<ComplexPair>> = result
            .eigenvalues
            .iter()
            .zip(&result.eigenvectors)
            .filter(|(value, _)| (value.re() - 2.0).abs() < 1e-6)
            .map(|(_, vector)| vector)
            .collect();
        assert_eq!(twos.len(), 2);
        assert!(inner(twos[0], twos[1]) < 1e-6, "eigenvectors for 2 should be independent");
    }

    #[test]
    fn test_defective_matrix_still_returns_eigenvectors() {
        let rows = vec![vec![1.0, 1.0], vec![0.0, 1.0]];
        let result = decompose(&rows).unwrap();
        for r in residuals(&rows, &result) {
            assert!(r < 1e-6, "residual {r}");
        }
    }

    #[test]
    fn test_single_entry_matrix() {
        let result = decompose(&[vec![-4.5]]).unwrap();
        assert_eq!(result.eigenvalues, vec![ComplexPair(-4.5, 0.0)]);
        assert_eq!(result.eigenvectors, vec![vec![ComplexPair(1.0, 0.0)]]);
    }

    #[test]
    fn test_invalid_shapes_are_rejected() {
        let cases: Vec<Vec<Vec<f64>>> = vec![
            vec![],
            vec![vec![]],
            vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]],
            vec![vec![1.0, 2.0], vec![3.0]],
            vec![vec![1.0, f64::NAN], vec![0.0, 1.0]],
        ];
        for rows in cases {
            let err = decompose(&rows).unwrap_err();
            assert!(matches!(err, AppError::InvalidMatrix { .. }), "{rows:?}");
        }
    }

    #[test]
    fn test_wire_format_is_pairs() {
        let result = decompose(&[vec![0.0, -1.0], vec![1.0, 0.0]]).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        let first = json["eigenvalues"][0].as_array().unwrap();
        assert_eq!(first.len(), 2);
        assert_abs_diff_eq!(first[1].as_f64().unwrap().abs(), 1.0, epsilon = 1e-9);
        let component = json["eigenvectors"][0][0].as_array().unwrap();
        assert_eq!(component.len(), 2);
    }
}
