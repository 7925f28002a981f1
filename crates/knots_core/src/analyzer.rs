//! The orchestrator: sequences validation, matrix construction, functional
//! assembly, gauge construction, and the criticality test into one
//! aggregate report.
//!
//! Failure policy:
//! - structural failure (dangling indices, non-finite input) aborts
//!   immediately with an error report and no partial diagnostics;
//! - validation failures are collected, never fatal, but a failed cycle
//!   check gates off every linear-algebra stage;
//! - a computation error in any later stage degrades to the error-report
//!   shape instead of propagating.

use crate::checks::{self, CheckResult, CycleResult, Validation};
use crate::criticality::{self, CriticalityResult};
use crate::diagram::CsDiagram;
use crate::functional;
use crate::gauge::{self, GaugeResiduals};
use crate::linalg;
use crate::matrices;
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use thiserror::Error;

/// The two fatal failure kinds of the pipeline. Validation failures are not
/// errors; they live in the check lists of the report.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    #[error("structural error: {0}")]
    Structural(String),
    #[error("computation error: {0}")]
    Computation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiagramCounts {
    pub disks: usize,
    pub contacts: usize,
    pub tangencies: usize,
    pub segments: usize,
    pub arcs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatrixSummary {
    pub rows: usize,
    pub cols: usize,
    pub rank: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VectorSummary {
    pub len: usize,
    pub norm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GaugeSummary {
    pub roll_dim: usize,
    pub rigid_dim: usize,
    pub gauge_dim: usize,
    pub residuals: GaugeResiduals,
}

/// Everything downstream display needs, in one value. Fields past the
/// validation block are `None` whenever their stage did not run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub counts: DiagramCounts,
    pub metric_checks: Vec<CheckResult>,
    pub tangent_checks: Vec<CheckResult>,
    pub segment_checks: Vec<CheckResult>,
    pub arc_checks: Vec<CheckResult>,
    pub cycle: Option<CycleResult>,
    pub intersection_checks: Vec<CheckResult>,
    pub contact_matrix: Option<MatrixSummary>,
    pub tangency_matrix: Option<MatrixSummary>,
    pub combined_matrix: Option<MatrixSummary>,
    pub gc: Option<VectorSummary>,
    pub gw: Option<VectorSummary>,
    pub g_red: Option<VectorSummary>,
    pub gauge: Option<GaugeSummary>,
    pub criticality: Option<CriticalityResult>,
    pub quadratic_form: Option<f64>,
    /// Set on structural or computation failure; `None` otherwise.
    pub error: Option<String>,
}

impl AnalysisReport {
    fn empty(counts: DiagramCounts) -> Self {
        Self {
            counts,
            metric_checks: Vec::new(),
            tangent_checks: Vec::new(),
            segment_checks: Vec::new(),
            arc_checks: Vec::new(),
            cycle: None,
            intersection_checks: Vec::new(),
            contact_matrix: None,
            tangency_matrix: None,
            combined_matrix: None,
            gc: None,
            gw: None,
            g_red: None,
            gauge: None,
            criticality: None,
            quadratic_form: None,
            error: None,
        }
    }

    fn with_validation(mut self, validation: &Validation) -> Self {
        self.metric_checks = validation.metric.clone();
        self.tangent_checks = validation.tangent.clone();
        self.segment_checks = validation.segment.clone();
        self.arc_checks = validation.arc.clone();
        self.cycle = Some(validation.cycle.clone());
        self.intersection_checks = validation.intersections.clone();
        self
    }
}

fn counts_of(diagram: &CsDiagram) -> DiagramCounts {
    DiagramCounts {
        disks: diagram.disks.len(),
        contacts: diagram.contacts.len(),
        tangencies: diagram.tangencies.len(),
        segments: diagram.segments.len(),
        arcs: diagram.arcs.len(),
    }
}

/// Analyzes a diagram. Pure: no I/O, no shared state, fresh allocations per
/// call; re-running on an unmutated diagram reproduces the report exactly.
pub fn analyze(diagram: &CsDiagram) -> AnalysisReport {
    run(diagram, None)
}

/// Like [`analyze`], additionally evaluating the second-variation quadratic
/// form along the gauge coordinate `z` (length = gauge dimension).
pub fn analyze_with_quadratic(diagram: &CsDiagram, z: &[f64]) -> AnalysisReport {
    run(diagram, Some(z))
}

fn run(diagram: &CsDiagram, probe: Option<&[f64]>) -> AnalysisReport {
    let counts = counts_of(diagram);
    let mut report = AnalysisReport::empty(counts);

    if let Err(err) = diagram.check_structure() {
        let error = AnalysisError::Structural(err.to_string());
        warn!("{error}");
        report.error = Some(error.to_string());
        return report;
    }

    let validation = checks::validate(diagram);
    report = report.with_validation(&validation);

    if !validation.cycle.is_valid() {
        // The linear-algebra stages assume a consistent cycle topology;
        // geometric diagnostics are still worth returning.
        debug!("cycle check failed; skipping linear-algebra stages");
        return report;
    }

    match linear_stages(diagram, &validation, probe, &mut report) {
        Ok(()) => report,
        Err(error) => {
            warn!("{error}");
            report.error = Some(error.to_string());
            report
        }
    }
}

fn linear_stages(
    diagram: &CsDiagram,
    validation: &Validation,
    probe: Option<&[f64]>,
    report: &mut AnalysisReport,
) -> Result<(), AnalysisError> {
    let computation = |err: anyhow::Error| AnalysisError::Computation(err.to_string());
    let lin = diagram.tolerances.lin;

    let matrices = matrices::build(diagram, &validation.tangents).map_err(computation)?;
    report.contact_matrix = Some(summarize_matrix(&matrices.a, lin));
    report.tangency_matrix = Some(summarize_matrix(&matrices.tc, lin));
    report.combined_matrix = Some(summarize_matrix(&matrices.l, lin));

    let functional = functional::assemble(diagram, &validation.tangents).map_err(computation)?;
    let g_red = functional::reduce(&functional, &matrices.tc).map_err(computation)?;
    report.gc = Some(summarize_vector(&functional.gc));
    report.gw = Some(summarize_vector(&functional.gw));
    report.g_red = Some(summarize_vector(&g_red));

    let gauge = gauge::build(diagram, &matrices.a).map_err(computation)?;
    report.gauge = Some(GaugeSummary {
        roll_dim: gauge.u.ncols(),
        rigid_dim: gauge.w.ncols(),
        gauge_dim: gauge.ug.ncols(),
        residuals: gauge.residuals,
    });

    let verdict = criticality::test_criticality(&gauge.ug, &g_red, lin).map_err(computation)?;
    debug!("criticality: {}", verdict.message);
    report.criticality = Some(verdict);

    if let Some(z) = probe {
        let z = DVector::from_column_slice(z);
        let value =
            criticality::evaluate_quadratic(diagram, &validation.tangents, &matrices.tc, &gauge.ug, &z)
                .map_err(computation)?;
        report.quadratic_form = Some(value);
    }
    Ok(())
}

fn summarize_matrix(m: &DMatrix<f64>, lin: f64) -> MatrixSummary {
    MatrixSummary {
        rows: m.nrows(),
        cols: m.ncols(),
        rank: linalg::rank(m, lin),
    }
}

fn summarize_vector(v: &DVector<f64>) -> VectorSummary {
    VectorSummary {
        len: v.len(),
        norm: v.norm(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::CycleResult;
    use crate::diagram::{CsDiagram, Disk, Point, Tolerances};
    use crate::fixtures::stadium;

    #[test]
    fn stadium_analysis_reaches_a_verdict() {
        let report = analyze(&stadium());
        assert!(report.error.is_none());
        assert_eq!(
            report.counts,
            DiagramCounts {
                disks: 2,
                contacts: 1,
                tangencies: 4,
                segments: 2,
                arcs: 2,
            }
        );
        assert!(matches!(report.cycle, Some(CycleResult::Valid)));
        assert!(report
            .metric_checks
            .iter()
            .chain(&report.tangent_checks)
            .chain(&report.segment_checks)
            .chain(&report.arc_checks)
            .chain(&report.intersection_checks)
            .all(CheckResult::passed));

        let a = report.contact_matrix.unwrap();
        assert_eq!((a.rows, a.cols, a.rank), (1, 4, 1));
        let tc = report.tangency_matrix.unwrap();
        assert_eq!((tc.rows, tc.cols), (4, 4));
        let l = report.combined_matrix.unwrap();
        assert_eq!((l.rows, l.cols), (5, 8));

        let gauge = report.gauge.unwrap();
        assert_eq!(gauge.roll_dim, 3);
        assert_eq!(gauge.rigid_dim, 3);

        // Two freely movable touching disks are not length-stationary: the
        // gradient pulls them apart.
        let verdict = report.criticality.unwrap();
        assert!(!verdict.is_critical);
        assert!(verdict.ratio > 0.0 && verdict.ratio.is_finite());
        assert!((verdict.norm_g_red - 8.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn analysis_is_idempotent() {
        let diagram = stadium();
        let first = analyze(&diagram);
        let second = analyze(&diagram);
        assert_eq!(first, second);
        assert_eq!(
            first.criticality.as_ref().map(|c| c.ratio.to_bits()),
            second.criticality.as_ref().map(|c| c.ratio.to_bits())
        );
    }

    #[test]
    fn empty_diagram_skips_linear_algebra_without_error() {
        let diagram = CsDiagram {
            disks: vec![Disk {
                center: Point::new(0.0, 0.0),
            }],
            contacts: vec![],
            tangencies: vec![],
            segments: vec![],
            arcs: vec![],
            tolerances: Tolerances::default(),
        };
        let report = analyze(&diagram);
        assert!(report.error.is_none());
        match report.cycle {
            Some(CycleResult::Invalid { ref message }) => assert_eq!(message, "Empty diagram"),
            _ => panic!("expected the empty-diagram cycle failure"),
        }
        assert!(report.contact_matrix.is_none());
        assert!(report.g_red.is_none());
        assert!(report.criticality.is_none());
    }

    #[test]
    fn structural_failure_short_circuits_with_error_only() {
        let mut diagram = stadium();
        diagram.segments[0].to = 99;
        let report = analyze(&diagram);
        let error = report.error.expect("structural error expected");
        assert!(error.contains("structural error"), "{error}");
        assert!(report.metric_checks.is_empty());
        assert!(report.cycle.is_none());
    }

    #[test]
    fn computation_failure_degrades_to_error_report() {
        // Coincident contacting disks break the contact-direction
        // normalization after validation has already run.
        let mut diagram = stadium();
        diagram.disks[1].center = Point::new(-1.0, 0.0);
        diagram.tangencies[1].point = Point::new(-1.0, -1.0);
        diagram.tangencies[2].point = Point::new(-1.0, 1.0);
        let report = analyze(&diagram);
        let error = report.error.expect("computation error expected");
        assert!(error.contains("computation error"), "{error}");
        // Validation diagnostics are kept; linear-algebra fields are not.
        assert!(!report.metric_checks.is_empty());
        assert!(report.contact_matrix.is_none());
        assert!(report.criticality.is_none());
    }

    #[test]
    fn quadratic_probe_rides_the_gauge_basis() {
        let diagram = stadium();
        let gauge_dim = analyze(&diagram).gauge.unwrap().gauge_dim;
        let mut z = vec![0.0; gauge_dim];
        z[0] = 1.0;
        let report = analyze_with_quadratic(&diagram, &z);
        assert!(report.error.is_none());
        let value = report.quadratic_form.expect("quadratic value expected");
        assert!(value.is_finite());
        assert!(value >= 0.0);
    }

    #[test]
    fn wrong_probe_length_is_a_computation_error() {
        let diagram = stadium();
        let report = analyze_with_quadratic(&diagram, &[1.0]);
        let error = report.error.expect("probe length mismatch expected");
        assert!(error.contains("computation error"), "{error}");
    }
}
