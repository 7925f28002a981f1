pub mod analyzer;
pub mod checks;
pub mod criticality;
pub mod diagram;
pub mod functional;
pub mod gauge;
pub mod geometry;
pub mod linalg;
/// The `knots_core` crate is the analysis engine behind the Knots research
/// platform: it decides whether a CS diagram (a closed curve of tangent
/// segments and arcs wrapped around contacting unit disks) is a critical
/// point of the length functional.
///
/// Key components:
/// - **Diagram**: the immutable input value (disks, contacts, tangencies, pieces).
/// - **Checks**: metric, combinatorial, and self-intersection validation.
/// - **Matrices / Functional / Gauge**: constraint operators, the reduced
///   length gradient, and the gauge-free subspace basis.
/// - **Criticality**: the projected-gradient ratio test and the discrete
///   second-variation form.
/// - **Analyzer**: the orchestrator producing one aggregate [`analyzer::AnalysisReport`].
pub mod matrices;

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::diagram::{Arc, Contact, CsDiagram, Disk, Point, Segment, Tangency, Tolerances};
    use std::f64::consts::PI;

    /// Two unit disks touching at the origin, wrapped by a stadium curve:
    /// bottom and top tangent segments joined by half-circle arcs.
    pub fn stadium() -> CsDiagram {
        CsDiagram {
            disks: vec![
                Disk {
                    center: Point::new(-1.0, 0.0),
                },
                Disk {
                    center: Point::new(1.0, 0.0),
                },
            ],
            contacts: vec![Contact { a: 0, b: 1 }],
            tangencies: vec![
                // alpha, beta, gamma, delta
                Tangency {
                    disk: 0,
                    point: Point::new(-1.0, -1.0),
                },
                Tangency {
                    disk: 1,
                    point: Point::new(1.0, -1.0),
                },
                Tangency {
                    disk: 1,
                    point: Point::new(1.0, 1.0),
                },
                Tangency {
                    disk: 0,
                    point: Point::new(-1.0, 1.0),
                },
            ],
            segments: vec![Segment { from: 0, to: 1 }, Segment { from: 2, to: 3 }],
            arcs: vec![
                Arc {
                    from: 1,
                    to: 2,
                    disk: 1,
                    delta_theta: PI,
                },
                Arc {
                    from: 3,
                    to: 0,
                    disk: 0,
                    delta_theta: PI,
                },
            ],
            tolerances: Tolerances::default(),
        }
    }
}
