//! Gauge-basis construction: separating ambient rigid motions from the true
//! internal "rolling" freedom of the configuration.
//!
//! The roll space (kernel of the contact matrix) contains every
//! contact-preserving center motion, rigid motions included. The gauge basis
//! `Ug` is the part of the roll space left after projecting out the rigid
//! generators; the criticality test measures the reduced gradient against it.

use crate::diagram::CsDiagram;
use crate::linalg;
use crate::matrices;
use anyhow::{bail, Result};
use nalgebra::DMatrix;
use serde::Serialize;

/// Self-check residuals reported alongside the basis; all are expected near
/// zero when the constructions behave (see [`GaugeBasis::ug`] for the one
/// caveat).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GaugeResiduals {
    /// `‖A·U‖`: the roll basis really annihilates the contact constraints.
    pub a_u: f64,
    /// `‖UᵀU - I‖`: roll-basis orthonormality.
    pub u_ortho: f64,
    /// `‖WᵀW - I‖`: rigid-basis orthonormality.
    pub w_ortho: f64,
    /// `‖Ugᵀ·W‖`: gauge/rigid separation.
    pub ug_w: f64,
}

/// Orthonormal bases over the `2N`-dimensional center-motion space.
#[derive(Debug, Clone)]
pub struct GaugeBasis {
    /// Roll space: kernel of the contact matrix, `2N × d`.
    pub u: DMatrix<f64>,
    /// Rigid motions reachable inside the roll space, `2N × r`.
    pub w: DMatrix<f64>,
    /// Gauge directions: `orth((I - WWᵀ)·U)`, `2N × d`. The `orth` here is
    /// deliberately non-truncating, so `ug` always carries `d` columns even
    /// when the projected roll space is rank deficient; the trailing columns
    /// are then an arbitrary orthonormal completion and the `ug_w` residual
    /// records how far they stray from the rigid complement.
    pub ug: DMatrix<f64>,
    pub residuals: GaugeResiduals,
}

/// Infinitesimal generators of planar rigid motions, `2N × 3`: translation
/// in x, translation in y, and rotation about the origin (`J(c_k)` per
/// disk).
pub fn rigid_generators(diagram: &CsDiagram) -> DMatrix<f64> {
    let n = diagram.disks.len();
    let mut v = DMatrix::<f64>::zeros(2 * n, 3);
    for (k, disk) in diagram.disks.iter().enumerate() {
        v[(2 * k, 0)] = 1.0;
        v[(2 * k + 1, 1)] = 1.0;
        let c = disk.center.coords();
        v[(2 * k, 2)] = -c.y;
        v[(2 * k + 1, 2)] = c.x;
    }
    v
}

/// Builds the gauge basis from the contact matrix.
pub fn build(diagram: &CsDiagram, a: &DMatrix<f64>) -> Result<GaugeBasis> {
    let n2 = 2 * diagram.disks.len();
    if a.ncols() != n2 {
        bail!(
            "Contact matrix has {} columns for {} disks.",
            a.ncols(),
            diagram.disks.len()
        );
    }
    let lin = diagram.tolerances.lin;

    let u = matrices::roll_space(a, lin);
    let v = rigid_generators(diagram);

    // Rigid motions clipped to the roll space, then an orthonormal basis
    // with rank thresholding at lin.
    let v_roll = &u * (u.transpose() * &v);
    let w = linalg::orth_cols(&v_roll, lin);

    let p_perp = DMatrix::<f64>::identity(n2, n2) - &w * w.transpose();
    let ug = linalg::orth(&(&p_perp * &u));

    let residuals = GaugeResiduals {
        a_u: (a * &u).norm(),
        u_ortho: linalg::orthonormality_defect(&u),
        w_ortho: linalg::orthonormality_defect(&w),
        ug_w: (ug.transpose() * &w).norm(),
    };

    Ok(GaugeBasis {
        u,
        w,
        ug,
        residuals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::stadium;
    use crate::matrices::contact_matrix;

    #[test]
    fn rigid_generators_encode_translations_and_rotation() {
        let diagram = stadium();
        let v = rigid_generators(&diagram);
        assert_eq!(v.shape(), (4, 3));
        // Rotation about the origin moves disk 0 at (-1, 0) to (0, -1)
        // and disk 1 at (1, 0) to (0, 1).
        let rotation = v.column(2);
        assert!((rotation[0] - 0.0).abs() < 1e-15);
        assert!((rotation[1] - (-1.0)).abs() < 1e-15);
        assert!((rotation[2] - 0.0).abs() < 1e-15);
        assert!((rotation[3] - 1.0).abs() < 1e-15);
    }

    #[test]
    fn stadium_roll_space_is_entirely_rigid() {
        let diagram = stadium();
        let a = contact_matrix(&diagram).unwrap();
        let gauge = build(&diagram, &a).unwrap();
        // Two touching disks: 2N - rank(A) = 3 rolling directions, all of
        // them ambient rigid motions.
        assert_eq!(gauge.u.ncols(), 3);
        assert_eq!(gauge.w.ncols(), 3);
        assert_eq!(gauge.ug.ncols(), 3);
    }

    #[test]
    fn structural_residuals_vanish_for_the_stadium() {
        let diagram = stadium();
        let a = contact_matrix(&diagram).unwrap();
        let gauge = build(&diagram, &a).unwrap();
        let lin = diagram.tolerances.lin;
        assert!(gauge.residuals.a_u < lin);
        assert!(gauge.residuals.u_ortho < lin);
        assert!(gauge.residuals.w_ortho < lin);
    }

    #[test]
    fn rigid_basis_spans_the_projected_generators() {
        let diagram = stadium();
        let a = contact_matrix(&diagram).unwrap();
        let gauge = build(&diagram, &a).unwrap();
        let v = rigid_generators(&diagram);
        let v_roll = &gauge.u * (gauge.u.transpose() * &v);
        // W W^T acts as the identity on the projected generators.
        let reproduced = &gauge.w * (gauge.w.transpose() * &v_roll);
        assert!((reproduced - v_roll).norm() < 1e-10);
    }

    #[test]
    fn contact_free_diagram_keeps_internal_gauge_freedom() {
        // Remove the contact: the roll space becomes all of R^4 and exactly
        // one direction survives the rigid projection.
        let mut diagram = stadium();
        diagram.contacts.clear();
        let a = contact_matrix(&diagram).unwrap();
        let gauge = build(&diagram, &a).unwrap();
        assert_eq!(gauge.u.ncols(), 4);
        assert_eq!(gauge.w.ncols(), 3);
        assert_eq!(gauge.ug.ncols(), 4);
        let lin = diagram.tolerances.lin;
        assert!(gauge.residuals.a_u < lin);
        assert!(gauge.residuals.u_ortho < lin);
        assert!(gauge.residuals.w_ortho < lin);
    }

    #[test]
    fn mismatched_contact_matrix_is_rejected() {
        let diagram = stadium();
        let wrong = DMatrix::<f64>::zeros(1, 6);
        assert!(build(&diagram, &wrong).is_err());
    }
}
