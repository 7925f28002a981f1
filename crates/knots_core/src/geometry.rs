//! 2D geometric primitives for diagram validation.
//!
//! All curve pieces live on unit disks, so the arc predicates assume radius
//! one throughout. The intersection predicates use a strict-interior
//! convention: hits within a tolerance band of an interval endpoint are
//! ignored, so pieces meeting at a shared tangency never report as crossing
//! each other.

use nalgebra::Vector2;
use std::f64::consts::TAU;

/// Quarter-turn operator `J(x, y) = (-y, x)`.
pub fn rot90(v: Vector2<f64>) -> Vector2<f64> {
    Vector2::new(-v.y, v.x)
}

/// Wraps an angle into `[0, 2π)`.
pub fn wrap_angle(theta: f64) -> f64 {
    let wrapped = theta % TAU;
    if wrapped < 0.0 {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Polar angle of `v` in `[0, 2π)`.
pub fn polar_angle(v: Vector2<f64>) -> f64 {
    wrap_angle(v.y.atan2(v.x))
}

/// Counter-clockwise angular increment from `from` to `to` as seen from
/// `center`, in `[0, 2π)`.
pub fn delta_theta(from: Vector2<f64>, to: Vector2<f64>, center: Vector2<f64>) -> f64 {
    wrap_angle(polar_angle(to - center) - polar_angle(from - center))
}

/// Distance from point `p` to the closed segment `a..b`.
pub fn segment_point_distance(a: Vector2<f64>, b: Vector2<f64>, p: Vector2<f64>) -> f64 {
    let d = b - a;
    let len_sq = d.norm_squared();
    if len_sq < 1e-24 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&d) / len_sq).clamp(0.0, 1.0);
    (p - (a + d * t)).norm()
}

fn cross(a: Vector2<f64>, b: Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// True iff `theta` lies strictly inside the counter-clockwise interval
/// starting at `theta_start` of width `dtheta`, staying `eps` away from both
/// endpoints.
pub fn angle_strictly_inside(theta: f64, theta_start: f64, dtheta: f64, eps: f64) -> bool {
    let rel = wrap_angle(theta - theta_start);
    rel > eps && rel < dtheta - eps
}

/// Proper interior intersection of two segments.
///
/// Shared endpoints do not count (parameters must stay `eps` inside `(0, 1)`
/// on both segments); collinear overlap of more than `eps` of parameter
/// length does count.
pub fn segments_intersect(
    p1: Vector2<f64>,
    p2: Vector2<f64>,
    q1: Vector2<f64>,
    q2: Vector2<f64>,
    eps: f64,
) -> bool {
    let d1 = p2 - p1;
    let d2 = q2 - q1;
    let denom = cross(d1, d2);
    let scale = d1.norm() * d2.norm();
    if scale < 1e-24 {
        return false;
    }

    if denom.abs() > 1e-12 * scale {
        let w = q1 - p1;
        let t = cross(w, d2) / denom;
        let s = cross(w, d1) / denom;
        return t > eps && t < 1.0 - eps && s > eps && s < 1.0 - eps;
    }

    // Parallel. Only collinear segments can still overlap.
    if cross(d1, q1 - p1).abs() > 1e-12 * scale {
        return false;
    }
    let len_sq = d1.norm_squared();
    if len_sq < 1e-24 {
        return false;
    }
    let t_a = (q1 - p1).dot(&d1) / len_sq;
    let t_b = (q2 - p1).dot(&d1) / len_sq;
    let lo = t_a.min(t_b).max(0.0);
    let hi = t_a.max(t_b).min(1.0);
    hi - lo > eps
}

/// Proper interior intersection of a segment with a unit-circle arc.
///
/// Solves the line/circle quadratic and keeps roots strictly inside `(0, 1)`
/// on the segment and strictly inside the arc's angular interval.
pub fn segment_arc_intersect(
    p1: Vector2<f64>,
    p2: Vector2<f64>,
    center: Vector2<f64>,
    theta_start: f64,
    dtheta: f64,
    eps: f64,
) -> bool {
    let d = p2 - p1;
    let f = p1 - center;
    let a = d.norm_squared();
    if a < 1e-24 {
        return false;
    }
    let b = 2.0 * f.dot(&d);
    let c = f.norm_squared() - 1.0;
    let disc = b * b - 4.0 * a * c;
    if disc <= 0.0 {
        return false;
    }
    let sqrt_disc = disc.sqrt();
    for t in [(-b - sqrt_disc) / (2.0 * a), (-b + sqrt_disc) / (2.0 * a)] {
        if t <= eps || t >= 1.0 - eps {
            continue;
        }
        let theta = polar_angle(p1 + d * t - center);
        if angle_strictly_inside(theta, theta_start, dtheta, eps) {
            return true;
        }
    }
    false
}

/// Proper interior intersection of two unit-circle arcs.
///
/// Distinct centers use the circle-circle intersection formula; coincident
/// centers fall into a dedicated branch checking angular-interval overlap on
/// the shared circle.
pub fn arcs_intersect(
    c1: Vector2<f64>,
    start1: f64,
    dtheta1: f64,
    c2: Vector2<f64>,
    start2: f64,
    dtheta2: f64,
    eps: f64,
) -> bool {
    let dvec = c2 - c1;
    let dist = dvec.norm();

    if dist < 1e-12 {
        // Same circle: the arcs cross iff their angular interiors overlap.
        return circular_interval_overlap(start1, dtheta1, start2, dtheta2) > eps;
    }

    // Unit radii: intersection points exist only for center distance < 2,
    // at height h above the midpoint of the center chord.
    if dist >= 2.0 {
        return false;
    }
    let half = dist / 2.0;
    let h_sq = 1.0 - half * half;
    if h_sq <= 0.0 {
        return false;
    }
    let h = h_sq.sqrt();
    let u = dvec / dist;
    let mid = c1 + dvec * 0.5;
    let offset = rot90(u) * h;
    for p in [mid + offset, mid - offset] {
        let theta1 = polar_angle(p - c1);
        let theta2 = polar_angle(p - c2);
        if angle_strictly_inside(theta1, start1, dtheta1, eps)
            && angle_strictly_inside(theta2, start2, dtheta2, eps)
        {
            return true;
        }
    }
    false
}

/// Total angular overlap of two counter-clockwise intervals on a circle.
fn circular_interval_overlap(start1: f64, dtheta1: f64, start2: f64, dtheta2: f64) -> f64 {
    // Work in the frame of interval 1: it becomes [0, dtheta1], interval 2
    // becomes [rel, rel + dtheta2] and its wrapped copy one turn earlier.
    let rel = wrap_angle(start2 - start1);
    let mut overlap = 0.0;
    for lo2 in [rel, rel - TAU] {
        let hi2 = lo2 + dtheta2;
        let lo = lo2.max(0.0);
        let hi = hi2.min(dtheta1);
        if hi > lo {
            overlap += hi - lo;
        }
    }
    overlap
}
