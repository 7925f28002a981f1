//! First variation of the curve's total length.
//!
//! `gc` holds the center-gradient (how length responds to disk motion) and
//! `gw` the angular gradient over the arc-length multipliers. Reduction
//! eliminates the angular unknowns through the tangency matrix, leaving a
//! pure center-space gradient.

use crate::diagram::CsDiagram;
use anyhow::{bail, Result};
use log::debug;
use nalgebra::{DMatrix, DVector, Vector2};

/// Raw gradient blocks: `gc` of length `2N`, `gw` of length `|tangencies|`.
#[derive(Debug, Clone)]
pub struct Functional {
    pub gc: DVector<f64>,
    pub gw: DVector<f64>,
}

/// Assembles the raw gradient from the diagram and the canonical tangents.
///
/// Each segment contributes the unit chord direction `∓v̂` to the endpoint
/// disks' center blocks and `∓⟨v̂, t⟩` to the endpoint angular entries; each
/// arc's length is exactly its multiplier difference, contributing `∓1`.
pub fn assemble(diagram: &CsDiagram, tangents: &[Vector2<f64>]) -> Result<Functional> {
    if tangents.len() != diagram.tangencies.len() {
        bail!(
            "Tangent count mismatch: {} tangents for {} tangencies.",
            tangents.len(),
            diagram.tangencies.len()
        );
    }

    let mut gc = DVector::<f64>::zeros(2 * diagram.disks.len());
    let mut gw = DVector::<f64>::zeros(diagram.tangencies.len());

    for (idx, segment) in diagram.segments.iter().enumerate() {
        let chord = diagram.tangencies[segment.to].point.coords()
            - diagram.tangencies[segment.from].point.coords();
        let length = chord.norm();
        if length < 1e-12 {
            // A zero-length chord has no defined direction and no length to
            // vary; it contributes nothing.
            debug!("segment {idx} has zero length; skipping its gradient contribution");
            continue;
        }
        let unit = chord / length;

        let k_from = diagram.tangencies[segment.from].disk;
        let k_to = diagram.tangencies[segment.to].disk;
        gc[2 * k_from] -= unit.x;
        gc[2 * k_from + 1] -= unit.y;
        gc[2 * k_to] += unit.x;
        gc[2 * k_to + 1] += unit.y;

        gw[segment.from] -= unit.dot(&tangents[segment.from]);
        gw[segment.to] += unit.dot(&tangents[segment.to]);
    }

    for arc in &diagram.arcs {
        gw[arc.from] -= 1.0;
        gw[arc.to] += 1.0;
    }

    Ok(Functional { gc, gw })
}

/// Eliminates the angular multipliers: `g_red = gc - Tcᵀ·gw`, a pure
/// center-space gradient of length `2N`.
pub fn reduce(functional: &Functional, tc: &DMatrix<f64>) -> Result<DVector<f64>> {
    if tc.nrows() != functional.gw.len() || tc.ncols() != functional.gc.len() {
        bail!(
            "Reduction dimension mismatch: Tc is {}x{}, gc has {}, gw has {}.",
            tc.nrows(),
            tc.ncols(),
            functional.gc.len(),
            functional.gw.len()
        );
    }
    Ok(&functional.gc - tc.transpose() * &functional.gw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::canonical_tangents;
    use crate::fixtures::stadium;
    use crate::matrices;

    #[test]
    fn stadium_angular_gradient_cancels_exactly() {
        let diagram = stadium();
        let tangents = canonical_tangents(&diagram);
        let functional = assemble(&diagram, &tangents).unwrap();
        // Segment and arc contributions cancel entry by entry.
        assert!(functional.gw.norm() < 1e-12);
    }

    #[test]
    fn stadium_center_gradient_pulls_disks_apart() {
        let diagram = stadium();
        let tangents = canonical_tangents(&diagram);
        let functional = assemble(&diagram, &tangents).unwrap();
        let expected = DVector::from_column_slice(&[-2.0, 0.0, 2.0, 0.0]);
        assert!((&functional.gc - expected).norm() < 1e-12);
    }

    #[test]
    fn stadium_reduced_gradient_equals_center_gradient() {
        let diagram = stadium();
        let tangents = canonical_tangents(&diagram);
        let functional = assemble(&diagram, &tangents).unwrap();
        let tc = matrices::tangency_matrix(&diagram, &tangents);
        let g_red = reduce(&functional, &tc).unwrap();
        // gw vanishes for the stadium, so reduction changes nothing.
        assert!((&g_red - &functional.gc).norm() < 1e-12);
        assert!((g_red.norm() - 8.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn zero_length_segment_contributes_nothing() {
        let mut diagram = stadium();
        // Collapse the bottom segment onto a single point.
        diagram.tangencies[1] = diagram.tangencies[0];
        let tangents = canonical_tangents(&diagram);
        let functional = assemble(&diagram, &tangents).unwrap();
        // Only the top segment contributes to gc now.
        let expected = DVector::from_column_slice(&[-1.0, 0.0, 1.0, 0.0]);
        assert!((&functional.gc - expected).norm() < 1e-12);
    }

    #[test]
    fn reduce_rejects_mismatched_tangency_matrix() {
        let diagram = stadium();
        let tangents = canonical_tangents(&diagram);
        let functional = assemble(&diagram, &tangents).unwrap();
        let wrong = DMatrix::<f64>::zeros(3, 4);
        assert!(reduce(&functional, &wrong).is_err());
    }
}
