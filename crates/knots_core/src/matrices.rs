//! Sparse-assembled constraint matrices of a validated diagram.
//!
//! The contact matrix `A` encodes "center distance between contacting disks
//! is stationary to first order"; the tangency matrix `Tc` encodes how each
//! tangency point moves with its disk's center. Both have a handful of
//! nonzero entries per row, so they are assembled as coordinate triplets and
//! densified for factorization.

use crate::diagram::CsDiagram;
use crate::linalg;
use anyhow::{bail, Result};
use nalgebra::{DMatrix, Vector2};
use nalgebra_sparse::CooMatrix;

/// The constraint operators of one diagram. `a` is
/// `|contacts| × 2N`, `tc` is `|tangencies| × 2N`, and `l` is the combined
/// block operator `[[A, 0], [Tc, I]]` used for rank/kernel diagnostics.
#[derive(Debug, Clone)]
pub struct ConstraintMatrices {
    pub a: DMatrix<f64>,
    pub tc: DMatrix<f64>,
    pub l: DMatrix<f64>,
}

/// Builds `A`, `Tc`, and `L` from the diagram and the canonical tangent
/// vectors computed by the validator.
pub fn build(diagram: &CsDiagram, tangents: &[Vector2<f64>]) -> Result<ConstraintMatrices> {
    if tangents.len() != diagram.tangencies.len() {
        bail!(
            "Tangent count mismatch: {} tangents for {} tangencies.",
            tangents.len(),
            diagram.tangencies.len()
        );
    }
    let a = contact_matrix(diagram)?;
    let tc = tangency_matrix(diagram, tangents);
    let l = combined_operator(&a, &tc);
    Ok(ConstraintMatrices { a, tc, l })
}

/// Row per contact `{i, j}`: the unit center-to-center vector in the `i`
/// block and its negation in the `j` block.
pub fn contact_matrix(diagram: &CsDiagram) -> Result<DMatrix<f64>> {
    let n = diagram.disks.len();
    let mut coo = CooMatrix::<f64>::new(diagram.contacts.len(), 2 * n);
    for (row, contact) in diagram.contacts.iter().enumerate() {
        let delta = diagram.disks[contact.a].center.coords()
            - diagram.disks[contact.b].center.coords();
        let dist = delta.norm();
        if dist < 1e-12 {
            bail!(
                "Contact {row} joins coincident disks {} and {}; its direction is undefined.",
                contact.a,
                contact.b
            );
        }
        let u = delta / dist;
        coo.push(row, 2 * contact.a, u.x);
        coo.push(row, 2 * contact.a + 1, u.y);
        coo.push(row, 2 * contact.b, -u.x);
        coo.push(row, 2 * contact.b + 1, -u.y);
    }
    Ok(dense_from_coo(&coo))
}

/// Row per tangency `α`: the tangent vector `t_α` in the block of the disk
/// carrying `α`.
pub fn tangency_matrix(diagram: &CsDiagram, tangents: &[Vector2<f64>]) -> DMatrix<f64> {
    let n = diagram.disks.len();
    let mut coo = CooMatrix::<f64>::new(diagram.tangencies.len(), 2 * n);
    for (row, tangency) in diagram.tangencies.iter().enumerate() {
        let t = tangents[row];
        coo.push(row, 2 * tangency.disk, t.x);
        coo.push(row, 2 * tangency.disk + 1, t.y);
    }
    dense_from_coo(&coo)
}

/// `[[A, 0], [Tc, I]]`: one operator over the stacked center-motion and
/// arc-length-multiplier unknowns.
fn combined_operator(a: &DMatrix<f64>, tc: &DMatrix<f64>) -> DMatrix<f64> {
    let contacts = a.nrows();
    let tangencies = tc.nrows();
    let centers = a.ncols();
    let mut l = DMatrix::<f64>::zeros(contacts + tangencies, centers + tangencies);
    l.view_mut((0, 0), (contacts, centers)).copy_from(a);
    l.view_mut((contacts, 0), (tangencies, centers)).copy_from(tc);
    l.view_mut((contacts, centers), (tangencies, tangencies))
        .copy_from(&DMatrix::<f64>::identity(tangencies, tangencies));
    l
}

/// Center motions preserving every contact distance to first order: the
/// nullspace of `A` at the `lin` threshold.
pub fn roll_space(a: &DMatrix<f64>, lin: f64) -> DMatrix<f64> {
    linalg::nullspace(a, lin)
}

fn dense_from_coo(coo: &CooMatrix<f64>) -> DMatrix<f64> {
    let mut dense = DMatrix::<f64>::zeros(coo.nrows(), coo.ncols());
    for (i, j, value) in coo.triplet_iter() {
        dense[(i, j)] += *value;
    }
    dense
}
