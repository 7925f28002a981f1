//! Dense linear-algebra kernels shared by every analysis stage.
//!
//! nalgebra supplies the matrix type and the elementwise operations; the
//! factorization kernels here are custom because the pipeline needs the
//! *full* `m×m` orthogonal factor (nalgebra's `QR` unpacks thin factors)
//! and rank decisions thresholded at the caller's `lin` tolerance.

use anyhow::{bail, Result};
use nalgebra::{DMatrix, DVector};

/// Pivot columns whose trailing norm falls below this are treated as
/// already eliminated and skipped.
const HOUSEHOLDER_SKIP: f64 = 1e-12;

/// Full Householder QR: `A = Q·R` with `Q` orthogonal `m×m` and `R` upper
/// triangular `m×n`.
///
/// The reflection sign is chosen to move the pivot away from zero, avoiding
/// cancellation in the Householder vector; every downstream rank, nullspace,
/// and orthogonality computation leans on this.
pub fn householder_qr(a: &DMatrix<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
    let (m, n) = a.shape();
    let mut r = a.clone();
    let mut q = DMatrix::<f64>::identity(m, m);
    if m == 0 || n == 0 {
        return (q, r);
    }

    let steps = (m - 1).min(n);
    let mut v = DVector::<f64>::zeros(m);
    for k in 0..steps {
        let len = m - k;
        let mut norm_sq = 0.0;
        for i in 0..len {
            let value = r[(k + i, k)];
            v[i] = value;
            norm_sq += value * value;
        }
        let alpha = norm_sq.sqrt();
        if alpha < HOUSEHOLDER_SKIP {
            continue;
        }

        // v = x + sign(x_0)·‖x‖·e_1, then normalized.
        let sign = if v[0] >= 0.0 { 1.0 } else { -1.0 };
        v[0] += sign * alpha;
        let mut v_norm_sq = 0.0;
        for i in 0..len {
            v_norm_sq += v[i] * v[i];
        }
        let v_norm = v_norm_sq.sqrt();
        if v_norm < HOUSEHOLDER_SKIP {
            continue;
        }
        for i in 0..len {
            v[i] /= v_norm;
        }

        // R[k.., k..] -= 2 v (vᵀ R)
        for j in k..n {
            let mut dot = 0.0;
            for i in 0..len {
                dot += v[i] * r[(k + i, j)];
            }
            for i in 0..len {
                r[(k + i, j)] -= 2.0 * v[i] * dot;
            }
        }
        // Q[.., k..] -= 2 (Q v) vᵀ, accumulating the reflection from the right.
        for i in 0..m {
            let mut dot = 0.0;
            for j in 0..len {
                dot += q[(i, k + j)] * v[j];
            }
            for j in 0..len {
                q[(i, k + j)] -= 2.0 * dot * v[j];
            }
        }
    }

    (q, r)
}

/// Number of diagonal entries of `r` exceeding `tol` in magnitude.
pub fn rank_from_r(r: &DMatrix<f64>, tol: f64) -> usize {
    let diag_len = r.nrows().min(r.ncols());
    (0..diag_len).filter(|&i| r[(i, i)].abs() > tol).count()
}

/// Numerical rank of `a`, thresholded at `tol`.
pub fn rank(a: &DMatrix<f64>, tol: f64) -> usize {
    let (_, r) = householder_qr(a);
    rank_from_r(&r, tol)
}

/// Orthonormal basis of `ker(a)` as an `n × (n - rank)` matrix, possibly
/// with zero columns.
///
/// Computed from the full QR of `aᵀ`: the trailing columns of its `Q` span
/// the kernel.
pub fn nullspace(a: &DMatrix<f64>, tol: f64) -> DMatrix<f64> {
    let at = a.transpose();
    let (q, r) = householder_qr(&at);
    let n = a.ncols();
    let rk = rank_from_r(&r, tol);
    q.columns(rk, n - rk).clone_owned()
}

/// Orthonormal basis for the column space of `a`: the first `min(m, n)`
/// columns of its `Q` factor.
///
/// This does NOT detect or drop dependent/near-zero input columns; when the
/// input is rank deficient, the trailing columns are an arbitrary
/// orthonormal completion. Callers wanting a rank-exact basis must
/// pre-filter (see [`orth_cols`] for the thresholded variant).
pub fn orth(a: &DMatrix<f64>) -> DMatrix<f64> {
    let (q, _) = householder_qr(a);
    let cols = a.nrows().min(a.ncols());
    q.columns(0, cols).clone_owned()
}

/// Rank-thresholded variant of [`orth`]: keeps only the leading `rank(a)`
/// columns of `Q`.
pub fn orth_cols(a: &DMatrix<f64>, tol: f64) -> DMatrix<f64> {
    let (q, r) = householder_qr(a);
    let rk = rank_from_r(&r, tol).min(a.nrows());
    q.columns(0, rk).clone_owned()
}

/// Dimension-checked product.
pub fn mul_checked(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if a.ncols() != b.nrows() {
        bail!(
            "Matrix product dimension mismatch: {}x{} * {}x{}.",
            a.nrows(),
            a.ncols(),
            b.nrows(),
            b.ncols()
        );
    }
    Ok(a * b)
}

/// Dimension-checked sum.
pub fn add_checked(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if a.shape() != b.shape() {
        bail!(
            "Matrix sum dimension mismatch: {}x{} + {}x{}.",
            a.nrows(),
            a.ncols(),
            b.nrows(),
            b.ncols()
        );
    }
    Ok(a + b)
}

/// Dimension-checked difference.
pub fn sub_checked(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if a.shape() != b.shape() {
        bail!(
            "Matrix difference dimension mismatch: {}x{} - {}x{}.",
            a.nrows(),
            a.ncols(),
            b.nrows(),
            b.ncols()
        );
    }
    Ok(a - b)
}

/// `‖Mᵀ M - I‖`, the deviation of `m`'s columns from orthonormality.
pub fn orthonormality_defect(m: &DMatrix<f64>) -> f64 {
    let gram = m.transpose() * m;
    let eye = DMatrix::<f64>::identity(gram.nrows(), gram.ncols());
    (gram - eye).norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    fn sample_matrix() -> DMatrix<f64> {
        DMatrix::from_row_slice(
            4,
            3,
            &[
                2.0, -1.0, 0.5, //
                1.0, 3.0, -2.0, //
                0.0, 1.5, 4.0, //
                -1.0, 0.5, 1.0,
            ],
        )
    }

    #[test]
    fn qr_reconstructs_input_with_orthogonal_q() {
        let a = sample_matrix();
        let (q, r) = householder_qr(&a);
        assert_eq!(q.shape(), (4, 4));
        assert_eq!(r.shape(), (4, 3));
        assert!((&q * &r - &a).norm() < 1e-12);
        assert!(orthonormality_defect(&q) < 1e-12);
        for i in 0..4 {
            for j in 0..3.min(i) {
                assert!(r[(i, j)].abs() < 1e-12, "R not upper triangular");
            }
        }
    }

    #[test]
    fn qr_handles_wide_and_degenerate_shapes() {
        let wide = DMatrix::from_row_slice(2, 4, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        let (q, r) = householder_qr(&wide);
        assert!((&q * &r - &wide).norm() < 1e-12);

        let empty = DMatrix::<f64>::zeros(3, 0);
        let (q, r) = householder_qr(&empty);
        assert_eq!(q.shape(), (3, 3));
        assert_eq!(r.shape(), (3, 0));
    }

    #[test]
    fn qr_of_zero_matrix_yields_identity_q() {
        let zero = DMatrix::<f64>::zeros(3, 2);
        let (q, r) = householder_qr(&zero);
        assert!((q - DMatrix::<f64>::identity(3, 3)).norm() < 1e-15);
        assert!(r.norm() < 1e-15);
    }

    #[test]
    fn rank_counts_significant_pivots() {
        let a = sample_matrix();
        assert_eq!(rank(&a, 1e-10), 3);

        // Third column = first + second: rank 2.
        let deficient = DMatrix::from_row_slice(
            3,
            3,
            &[1.0, 0.0, 1.0, 0.0, 1.0, 1.0, 2.0, 2.0, 4.0],
        );
        assert_eq!(rank(&deficient, 1e-10), 2);
    }

    #[test]
    fn nullspace_spans_kernel_with_orthonormal_columns() {
        let a = DMatrix::from_row_slice(1, 3, &[1.0, 1.0, 1.0]);
        let basis = nullspace(&a, 1e-10);
        assert_eq!(basis.shape(), (3, 2));
        assert!((&a * &basis).norm() < 1e-12);
        assert!(orthonormality_defect(&basis) < 1e-12);
    }

    #[test]
    fn nullspace_of_full_rank_matrix_is_trivial() {
        let a = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        let basis = nullspace(&a, 1e-10);
        assert_eq!(basis.shape(), (2, 0));
    }

    #[test]
    fn nullspace_of_empty_row_matrix_is_everything() {
        let a = DMatrix::<f64>::zeros(0, 4);
        let basis = nullspace(&a, 1e-10);
        assert_eq!(basis.shape(), (4, 4));
        assert!(orthonormality_defect(&basis) < 1e-12);
    }

    #[test]
    fn orth_returns_orthonormal_column_basis() {
        let a = sample_matrix();
        let basis = orth(&a);
        assert_eq!(basis.shape(), (4, 3));
        assert!(orthonormality_defect(&basis) < 1e-12);
        // Each column of A must be reproducible from the basis.
        let projected = &basis * (basis.transpose() * &a);
        assert!((projected - &a).norm() < 1e-11);
    }

    #[test]
    fn orth_cols_truncates_dependent_columns() {
        let mut a = sample_matrix();
        let dependent = a.column(0) + a.column(1);
        a.set_column(2, &dependent);
        assert_eq!(orth(&a).ncols(), 3);
        assert_eq!(orth_cols(&a, 1e-10).ncols(), 2);
    }

    #[test]
    fn checked_ops_reject_dimension_mismatch() {
        let a = DMatrix::<f64>::zeros(2, 3);
        let b = DMatrix::<f64>::zeros(2, 3);
        assert!(mul_checked(&a, &b).is_err());
        assert!(add_checked(&a, &b).is_ok());
        assert!(sub_checked(&a, &b.transpose()).is_err());
        assert!(mul_checked(&a, &b.transpose()).is_ok());
    }
}
