//! The question the engine exists to answer: is the configuration a
//! stationary point of total curve length, modulo gauge freedom?
//!
//! The reduced gradient is projected onto the gauge basis; a configuration
//! is critical when the projected component is negligible relative to the
//! whole gradient. A second-variation quadratic form along a chosen gauge
//! direction is available as an optional stability probe.

use crate::diagram::CsDiagram;
use anyhow::{bail, Result};
use nalgebra::{DMatrix, DVector, Vector2};
use serde::Serialize;

/// Below this, the reduced gradient is considered to vanish outright and the
/// configuration is trivially critical.
pub const DEGENERATE_GRADIENT: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticalityResult {
    /// The gauge-space component `Ugᵀ·g_red`.
    pub r: Vec<f64>,
    pub norm_r: f64,
    pub norm_g_red: f64,
    /// `‖r‖ / ‖g_red‖`, defined as 0 for a degenerate gradient.
    pub ratio: f64,
    pub is_critical: bool,
    pub message: String,
}

/// Projects the reduced gradient onto the gauge basis and applies the ratio
/// test: critical iff `‖r‖ ≤ lin·‖g_red‖`, or unconditionally when the
/// gradient itself is degenerate.
pub fn test_criticality(
    ug: &DMatrix<f64>,
    g_red: &DVector<f64>,
    lin: f64,
) -> Result<CriticalityResult> {
    if ug.nrows() != g_red.len() {
        bail!(
            "Gauge basis has {} rows but the reduced gradient has {} entries.",
            ug.nrows(),
            g_red.len()
        );
    }

    let r = ug.transpose() * g_red;
    let norm_r = r.norm();
    let norm_g_red = g_red.norm();

    if norm_g_red < DEGENERATE_GRADIENT {
        return Ok(CriticalityResult {
            r: r.iter().copied().collect(),
            norm_r,
            norm_g_red,
            ratio: 0.0,
            is_critical: true,
            message: "Reduced gradient vanishes; configuration is trivially critical.".to_string(),
        });
    }

    let ratio = norm_r / norm_g_red;
    let is_critical = norm_r <= lin * norm_g_red;
    let message = if is_critical {
        format!("CRITICAL: gauge component ratio {ratio:.3e} within tolerance.")
    } else {
        format!("NOT CRITICAL: gauge component ratio {ratio:.3e} exceeds tolerance.")
    };
    Ok(CriticalityResult {
        r: r.iter().copied().collect(),
        norm_r,
        norm_g_red,
        ratio,
        is_critical,
        message,
    })
}

/// Discretized second variation of arc length along the gauge direction
/// `Ug·z`.
///
/// Centers move by `Δc = Ug·z`, the induced angular perturbation is
/// `ω = -Tc·Δc`, tangency points move by `Δp_α = Δc_{k(α)} + ω_α t_α`, and
/// each segment contributes the squared chord-transverse part of its
/// endpoint displacement difference, weighted by inverse chord length.
pub fn evaluate_quadratic(
    diagram: &CsDiagram,
    tangents: &[Vector2<f64>],
    tc: &DMatrix<f64>,
    ug: &DMatrix<f64>,
    z: &DVector<f64>,
) -> Result<f64> {
    if z.len() != ug.ncols() {
        bail!(
            "Gauge coordinate has {} entries but the basis has {} columns.",
            z.len(),
            ug.ncols()
        );
    }
    if tc.ncols() != ug.nrows() {
        bail!(
            "Tangency matrix has {} columns but the gauge basis has {} rows.",
            tc.ncols(),
            ug.nrows()
        );
    }

    let delta_c = ug * z;
    let omega = -(tc * &delta_c);

    let displacement = |alpha: usize| -> Vector2<f64> {
        let k = diagram.tangencies[alpha].disk;
        Vector2::new(delta_c[2 * k], delta_c[2 * k + 1]) + tangents[alpha] * omega[alpha]
    };

    let mut total = 0.0;
    for segment in &diagram.segments {
        let chord = diagram.tangencies[segment.to].point.coords()
            - diagram.tangencies[segment.from].point.coords();
        let length = chord.norm();
        if length < 1e-12 {
            continue;
        }
        let unit = chord / length;
        let diff = displacement(segment.to) - displacement(segment.from);
        let transverse = diff - unit * unit.dot(&diff);
        total += transverse.norm_squared() / length;
    }
    Ok(total)
}
