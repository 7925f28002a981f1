//! Input data model for the CS-diagram analysis engine.
//!
//! A CS diagram describes a closed planar curve built from straight tangent
//! segments and counter-clockwise circular arcs wrapping around a set of
//! mutually contacting unit disks. The diagram is produced by an external
//! converter (editor state → diagram), is immutable during analysis, and is
//! discarded once the report has been assembled.

use anyhow::{bail, Result};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Every disk in a CS diagram has this radius (protocol invariant).
pub const DISK_RADIUS: f64 = 1.0;

/// Distance between the centers of two contacting unit disks.
pub const CONTACT_DISTANCE: f64 = 2.0;

/// A 2D point at the serde boundary. Math code converts to `Vector2<f64>`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn coords(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

/// A unit disk. Only the center is stored; the radius is [`DISK_RADIUS`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Disk {
    pub center: Point,
}

/// An unordered pair of disk indices whose disks are meant to touch
/// (center distance [`CONTACT_DISTANCE`]). Contacts are declared by the
/// caller, never discovered by the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Contact {
    pub a: usize,
    pub b: usize,
}

/// A labeled point on the boundary of one disk. Tangencies are the vertices
/// of the closed curve and are identified by their index in
/// [`CsDiagram::tangencies`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Tangency {
    pub disk: usize,
    pub point: Point,
}

/// A straight curve piece from tangency `from` to tangency `to`, tangent to
/// both endpoint disks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Segment {
    pub from: usize,
    pub to: usize,
}

/// A curve piece riding counter-clockwise on the boundary of `disk` from
/// tangency `from` to tangency `to`, sweeping the angle `delta_theta`
/// (strictly inside `(0, 2π)`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Arc {
    pub from: usize,
    pub to: usize,
    pub disk: usize,
    pub delta_theta: f64,
}

/// Caller-supplied residual tolerances. These are configuration, not
/// constants: the engine never hardcodes them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Tolerances {
    /// Metric residuals: point-on-boundary and contact-distance checks.
    pub met: f64,
    /// Geometric residuals: orthogonality, clearance, intersections.
    pub geo: f64,
    /// Linear-algebra residuals: rank thresholds, basis orthogonality,
    /// criticality ratio.
    pub lin: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            met: 1e-4,
            geo: 1e-4,
            lin: 1e-6,
        }
    }
}

/// The full CS diagram: disks, declared contacts, tangencies, and the cyclic
/// sequence of segments and arcs, together with the analysis tolerances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsDiagram {
    pub disks: Vec<Disk>,
    pub contacts: Vec<Contact>,
    pub tangencies: Vec<Tangency>,
    pub segments: Vec<Segment>,
    pub arcs: Vec<Arc>,
    #[serde(default)]
    pub tolerances: Tolerances,
}

impl CsDiagram {
    /// Verifies referential integrity: every stored index resolves, contacts
    /// are not self-pairs, and every coordinate/angle is finite.
    ///
    /// This is the fatal gate of the pipeline. A diagram that fails here
    /// gets an error report with no partial diagnostics, because the
    /// geometric checks themselves would chase dangling indices.
    pub fn check_structure(&self) -> Result<()> {
        let n_disks = self.disks.len();
        let n_tangencies = self.tangencies.len();

        for (idx, disk) in self.disks.iter().enumerate() {
            if !disk.center.x.is_finite() || !disk.center.y.is_finite() {
                bail!("Disk {} has a non-finite center.", idx);
            }
        }
        for (idx, contact) in self.contacts.iter().enumerate() {
            if contact.a >= n_disks || contact.b >= n_disks {
                bail!(
                    "Contact {} references disk {}/{}, but only {} disks exist.",
                    idx,
                    contact.a,
                    contact.b,
                    n_disks
                );
            }
            if contact.a == contact.b {
                bail!("Contact {} pairs disk {} with itself.", idx, contact.a);
            }
        }
        for (idx, tangency) in self.tangencies.iter().enumerate() {
            if tangency.disk >= n_disks {
                bail!(
                    "Tangency {} references disk {}, but only {} disks exist.",
                    idx,
                    tangency.disk,
                    n_disks
                );
            }
            if !tangency.point.x.is_finite() || !tangency.point.y.is_finite() {
                bail!("Tangency {} has a non-finite point.", idx);
            }
        }
        for (idx, segment) in self.segments.iter().enumerate() {
            if segment.from >= n_tangencies || segment.to >= n_tangencies {
                bail!(
                    "Segment {} references tangency {}/{}, but only {} tangencies exist.",
                    idx,
                    segment.from,
                    segment.to,
                    n_tangencies
                );
            }
        }
        for (idx, arc) in self.arcs.iter().enumerate() {
            if arc.from >= n_tangencies || arc.to >= n_tangencies {
                bail!(
                    "Arc {} references tangency {}/{}, but only {} tangencies exist.",
                    idx,
                    arc.from,
                    arc.to,
                    n_tangencies
                );
            }
            if arc.disk >= n_disks {
                bail!(
                    "Arc {} references disk {}, but only {} disks exist.",
                    idx,
                    arc.disk,
                    n_disks
                );
            }
            if !arc.delta_theta.is_finite() {
                bail!("Arc {} has a non-finite angular increment.", idx);
            }
        }
        Ok(())
    }

    /// Center of the disk carrying tangency `alpha`.
    pub fn tangency_center(&self, alpha: usize) -> Vector2<f64> {
        self.disks[self.tangencies[alpha].disk].center.coords()
    }

    /// Outward normal at tangency `alpha`: the vector from the carrying
    /// disk's center to the tangency point (unit length up to the metric
    /// residual).
    pub fn tangency_normal(&self, alpha: usize) -> Vector2<f64> {
        self.tangencies[alpha].point.coords() - self.tangency_center(alpha)
    }
}
