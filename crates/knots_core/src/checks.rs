//! Diagram validation: metric residuals, canonical tangents, the
//! single-cycle combinatorial check, local segment/arc rules, and the
//! global self-intersection sweep.
//!
//! Every check always runs; failures are collected, never thrown. The one
//! consequence a failure has is downstream: the orchestrator refuses to run
//! the linear-algebra stages when the cycle check fails, because they assume
//! a consistent cycle topology.

use crate::diagram::{CsDiagram, CONTACT_DISTANCE, DISK_RADIUS};
use crate::geometry;
use log::debug;
use nalgebra::Vector2;
use serde::Serialize;
use std::f64::consts::TAU;

/// Outcome of a single named check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status")]
pub enum CheckOutcome {
    Pass { value: f64 },
    Fail { value: f64, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub outcome: CheckOutcome,
}

impl CheckResult {
    fn residual(name: String, value: f64, tol: f64, message: impl FnOnce() -> String) -> Self {
        let outcome = if value <= tol {
            CheckOutcome::Pass { value }
        } else {
            CheckOutcome::Fail {
                value,
                message: message(),
            }
        };
        Self { name, outcome }
    }

    pub fn passed(&self) -> bool {
        matches!(self.outcome, CheckOutcome::Pass { .. })
    }

    pub fn value(&self) -> f64 {
        match self.outcome {
            CheckOutcome::Pass { value } => value,
            CheckOutcome::Fail { value, .. } => value,
        }
    }
}

/// Result of the single-cycle combinatorial check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status")]
pub enum CycleResult {
    Valid,
    Invalid { message: String },
}

impl CycleResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, CycleResult::Valid)
    }
}

/// Everything the validator produces. The check lists are the diagnostics
/// channel (there is no global logging state); `tangents` feeds the
/// constraint-matrix and functional stages.
#[derive(Debug, Clone)]
pub struct Validation {
    pub metric: Vec<CheckResult>,
    pub tangent: Vec<CheckResult>,
    pub segment: Vec<CheckResult>,
    pub arc: Vec<CheckResult>,
    pub cycle: CycleResult,
    pub intersections: Vec<CheckResult>,
    /// Canonical outgoing tangent `J(p - c)` per tangency.
    pub tangents: Vec<Vector2<f64>>,
}

impl Validation {
    pub fn all_passed(&self) -> bool {
        self.cycle.is_valid()
            && self
                .metric
                .iter()
                .chain(&self.tangent)
                .chain(&self.segment)
                .chain(&self.arc)
                .chain(&self.intersections)
                .all(CheckResult::passed)
    }
}

/// Runs every validation check on `diagram`. Assumes
/// [`CsDiagram::check_structure`] has already passed; indices are trusted.
pub fn validate(diagram: &CsDiagram) -> Validation {
    let tangents = canonical_tangents(diagram);
    let validation = Validation {
        metric: metric_checks(diagram),
        tangent: tangent_checks(diagram),
        segment: segment_checks(diagram),
        arc: arc_checks(diagram),
        cycle: cycle_check(diagram),
        intersections: intersection_checks(diagram),
        tangents,
    };
    debug!(
        "validation finished: cycle={:?}, all_passed={}",
        validation.cycle,
        validation.all_passed()
    );
    validation
}

/// Canonical outgoing tangent at every tangency: the quarter-turn of the
/// outward normal, never the chord direction. This stays well defined even
/// for degenerate zero-length segments; arcs are traversed counter-clockwise
/// so the same vector serves both piece kinds.
pub fn canonical_tangents(diagram: &CsDiagram) -> Vec<Vector2<f64>> {
    (0..diagram.tangencies.len())
        .map(|alpha| geometry::rot90(diagram.tangency_normal(alpha)))
        .collect()
}

fn metric_checks(diagram: &CsDiagram) -> Vec<CheckResult> {
    let met = diagram.tolerances.met;
    let mut results = Vec::with_capacity(diagram.tangencies.len() + diagram.contacts.len());

    for (alpha, _) in diagram.tangencies.iter().enumerate() {
        let residual = (diagram.tangency_normal(alpha).norm() - DISK_RADIUS).abs();
        results.push(CheckResult::residual(
            format!("tangency {alpha} on boundary"),
            residual,
            met,
            || format!("Tangency {alpha} is off its disk boundary by {residual:.3e}."),
        ));
    }
    for (idx, contact) in diagram.contacts.iter().enumerate() {
        let spacing = (diagram.disks[contact.a].center.coords()
            - diagram.disks[contact.b].center.coords())
        .norm();
        let residual = (spacing - CONTACT_DISTANCE).abs();
        results.push(CheckResult::residual(
            format!("contact {idx} spacing"),
            residual,
            met,
            || {
                format!(
                    "Disks {} and {} are at distance {spacing:.6}, not {CONTACT_DISTANCE}.",
                    contact.a, contact.b
                )
            },
        ));
    }
    results
}

/// Side residuals: each segment chord must be orthogonal to the outward
/// normals at both of its endpoints, within the `lin` tolerance.
fn tangent_checks(diagram: &CsDiagram) -> Vec<CheckResult> {
    let lin = diagram.tolerances.lin;
    diagram
        .segments
        .iter()
        .enumerate()
        .map(|(idx, segment)| {
            let residual = chord_normal_residual(diagram, segment.from, segment.to);
            CheckResult::residual(
                format!("segment {idx} chord-normal residual"),
                residual,
                lin,
                || format!("Segment {idx} chord deviates from the tangent line by {residual:.3e}."),
            )
        })
        .collect()
}

fn chord_normal_residual(diagram: &CsDiagram, from: usize, to: usize) -> f64 {
    let chord =
        diagram.tangencies[to].point.coords() - diagram.tangencies[from].point.coords();
    let length = chord.norm();
    if length < 1e-12 {
        // Zero-length chord: direction undefined, orthogonality vacuous.
        return 0.0;
    }
    let unit = chord / length;
    let r_from = unit.dot(&diagram.tangency_normal(from)).abs();
    let r_to = unit.dot(&diagram.tangency_normal(to)).abs();
    r_from.max(r_to)
}

/// S1 (tangency within `geo`) and S2 (clearance of at least `1 - geo` from
/// every disk not at the segment's endpoints).
fn segment_checks(diagram: &CsDiagram) -> Vec<CheckResult> {
    let geo = diagram.tolerances.geo;
    let mut results = Vec::new();

    for (idx, segment) in diagram.segments.iter().enumerate() {
        let residual = chord_normal_residual(diagram, segment.from, segment.to);
        results.push(CheckResult::residual(
            format!("segment {idx} tangency (S1)"),
            residual,
            geo,
            || format!("Segment {idx} is not tangent to its endpoint disks ({residual:.3e})."),
        ));

        let a = diagram.tangencies[segment.from].point.coords();
        let b = diagram.tangencies[segment.to].point.coords();
        let endpoint_disks = [
            diagram.tangencies[segment.from].disk,
            diagram.tangencies[segment.to].disk,
        ];
        let clearance = diagram
            .disks
            .iter()
            .enumerate()
            .filter(|(k, _)| !endpoint_disks.contains(k))
            .map(|(_, disk)| geometry::segment_point_distance(a, b, disk.center.coords()))
            .fold(f64::INFINITY, f64::min);
        if clearance.is_finite() {
            let outcome = if clearance >= DISK_RADIUS - geo {
                CheckOutcome::Pass { value: clearance }
            } else {
                CheckOutcome::Fail {
                    value: clearance,
                    message: format!(
                        "Segment {idx} passes within {clearance:.6} of a non-endpoint disk."
                    ),
                }
            };
            results.push(CheckResult {
                name: format!("segment {idx} clearance (S2)"),
                outcome,
            });
        }
    }
    results
}

/// A1 (endpoints reference the stated disk) and A2 (the sweep lies strictly
/// inside `(0, 2π)`, thresholded at `lin`).
fn arc_checks(diagram: &CsDiagram) -> Vec<CheckResult> {
    let lin = diagram.tolerances.lin;
    let mut results = Vec::with_capacity(2 * diagram.arcs.len());

    for (idx, arc) in diagram.arcs.iter().enumerate() {
        let from_disk = diagram.tangencies[arc.from].disk;
        let to_disk = diagram.tangencies[arc.to].disk;
        let endpoints_match = from_disk == arc.disk && to_disk == arc.disk;
        results.push(CheckResult {
            name: format!("arc {idx} endpoint disks (A1)"),
            outcome: if endpoints_match {
                CheckOutcome::Pass { value: 0.0 }
            } else {
                CheckOutcome::Fail {
                    value: 1.0,
                    message: format!(
                        "Arc {idx} rides disk {} but its endpoints sit on disks {} and {}.",
                        arc.disk, from_disk, to_disk
                    ),
                }
            },
        });

        let sweep_ok = arc.delta_theta > lin && arc.delta_theta < TAU - lin;
        results.push(CheckResult {
            name: format!("arc {idx} sweep (A2)"),
            outcome: if sweep_ok {
                CheckOutcome::Pass {
                    value: arc.delta_theta,
                }
            } else {
                CheckOutcome::Fail {
                    value: arc.delta_theta,
                    message: format!(
                        "Arc {idx} sweep {:.6} lies outside ({lin:.1e}, 2π - {lin:.1e}).",
                        arc.delta_theta
                    ),
                }
            },
        });
    }
    results
}

/// Single-cycle check: segments and arcs together must form exactly one
/// simple directed cycle visiting every tangency once.
fn cycle_check(diagram: &CsDiagram) -> CycleResult {
    let n = diagram.tangencies.len();
    let piece_count = diagram.segments.len() + diagram.arcs.len();
    if piece_count == 0 {
        return CycleResult::Invalid {
            message: "Empty diagram".to_string(),
        };
    }

    let mut successor: Vec<Option<usize>> = vec![None; n];
    let hops = diagram
        .segments
        .iter()
        .map(|s| (s.from, s.to))
        .chain(diagram.arcs.iter().map(|a| (a.from, a.to)));
    for (from, to) in hops {
        if successor[from].is_some() {
            return CycleResult::Invalid {
                message: format!("Tangency {from} has more than one outgoing piece."),
            };
        }
        successor[from] = Some(to);
    }

    let covered = successor.iter().filter(|s| s.is_some()).count();
    if covered != n {
        return CycleResult::Invalid {
            message: format!("Successor map covers {covered} of {n} tangencies."),
        };
    }

    let mut visited = vec![false; n];
    let mut current = 0usize;
    for _ in 0..n {
        if visited[current] {
            return CycleResult::Invalid {
                message: format!("Walk revisits tangency {current} before closing the cycle."),
            };
        }
        visited[current] = true;
        match successor[current] {
            Some(next) => current = next,
            // Unreachable after the coverage check, but a broken invariant
            // should surface as a failed check, not a panic.
            None => {
                return CycleResult::Invalid {
                    message: format!("Tangency {current} has no outgoing piece."),
                }
            }
        }
    }
    if current != 0 {
        return CycleResult::Invalid {
            message: "Walk does not return to its start; pieces form more than one cycle."
                .to_string(),
        };
    }
    CycleResult::Valid
}

enum PieceGeom {
    Seg {
        a: Vector2<f64>,
        b: Vector2<f64>,
    },
    Arc {
        center: Vector2<f64>,
        theta_start: f64,
        dtheta: f64,
    },
}

struct Piece {
    label: String,
    from: usize,
    to: usize,
    geom: PieceGeom,
}

/// G1–G3: pairwise intersection tests over all non-adjacent piece pairs.
/// All violations are collected; a clean category gets one pass entry.
fn intersection_checks(diagram: &CsDiagram) -> Vec<CheckResult> {
    let eps = diagram.tolerances.geo;
    let pieces = collect_pieces(diagram);

    let mut results = Vec::new();
    let mut hits = [0usize; 3];
    for i in 0..pieces.len() {
        for j in i + 1..pieces.len() {
            let (p, q) = (&pieces[i], &pieces[j]);
            // Pieces sharing a tangency meet there by construction.
            if p.from == q.from || p.from == q.to || p.to == q.from || p.to == q.to {
                continue;
            }
            let (category, crossing) = match (&p.geom, &q.geom) {
                (PieceGeom::Seg { a: a1, b: b1 }, PieceGeom::Seg { a: a2, b: b2 }) => {
                    (0, geometry::segments_intersect(*a1, *b1, *a2, *b2, eps))
                }
                (
                    PieceGeom::Seg { a, b },
                    PieceGeom::Arc {
                        center,
                        theta_start,
                        dtheta,
                    },
                )
                | (
                    PieceGeom::Arc {
                        center,
                        theta_start,
                        dtheta,
                    },
                    PieceGeom::Seg { a, b },
                ) => (
                    1,
                    geometry::segment_arc_intersect(*a, *b, *center, *theta_start, *dtheta, eps),
                ),
                (
                    PieceGeom::Arc {
                        center: c1,
                        theta_start: s1,
                        dtheta: d1,
                    },
                    PieceGeom::Arc {
                        center: c2,
                        theta_start: s2,
                        dtheta: d2,
                    },
                ) => (2, geometry::arcs_intersect(*c1, *s1, *d1, *c2, *s2, *d2, eps)),
            };
            if crossing {
                hits[category] += 1;
                results.push(CheckResult {
                    name: format!("{} x {}", p.label, q.label),
                    outcome: CheckOutcome::Fail {
                        value: 1.0,
                        message: format!("{} and {} cross in their interiors.", p.label, q.label),
                    },
                });
            }
        }
    }

    for (category, name) in [
        "segment-segment crossings (G1)",
        "segment-arc crossings (G2)",
        "arc-arc crossings (G3)",
    ]
    .iter()
    .enumerate()
    {
        if hits[category] == 0 {
            results.push(CheckResult {
                name: (*name).to_string(),
                outcome: CheckOutcome::Pass { value: 0.0 },
            });
        }
    }
    results
}

fn collect_pieces(diagram: &CsDiagram) -> Vec<Piece> {
    let mut pieces = Vec::with_capacity(diagram.segments.len() + diagram.arcs.len());
    for (idx, segment) in diagram.segments.iter().enumerate() {
        pieces.push(Piece {
            label: format!("segment {idx}"),
            from: segment.from,
            to: segment.to,
            geom: PieceGeom::Seg {
                a: diagram.tangencies[segment.from].point.coords(),
                b: diagram.tangencies[segment.to].point.coords(),
            },
        });
    }
    for (idx, arc) in diagram.arcs.iter().enumerate() {
        let center = diagram.disks[arc.disk].center.coords();
        pieces.push(Piece {
            label: format!("arc {idx}"),
            from: arc.from,
            to: arc.to,
            geom: PieceGeom::Arc {
                center,
                theta_start: geometry::polar_angle(
                    diagram.tangencies[arc.from].point.coords() - center,
                ),
                dtheta: arc.delta_theta,
            },
        });
    }
    pieces
}
