//! Arc integration shared by the assembler and the follower.

use super::math::Vector3;

/// Position and orthonormal basis at a point of the track.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Frame {
    pub position: Vector3,
    pub direction: Vector3,
    pub up: Vector3,
    pub side: Vector3,
}

impl Default for Frame {
    fn default() -> Self {
        Frame {
            position: Vector3::ZERO,
            direction: Vector3::FORWARD,
            up: Vector3::UP,
            side: Vector3::RIGHT,
        }
    }
}

impl Frame {
    /// Frame at `position` heading along the horizontal unit vector `heading`
    /// (y ignored) with gradient `pitch` (rise per unit of run).
    pub fn from_heading(position: Vector3, heading: Vector3, pitch: f64) -> Frame {
        let h = Vector3::new(heading.x, 0.0, heading.z).normalize();
        let direction = Vector3::new(h.x, pitch, h.z).normalize();
        let side = Vector3::new(h.z, 0.0, -h.x);
        Frame {
            position: position,
            direction: direction,
            up: direction.cross(side),
            side: side,
        }
    }

    /// Horizontal unit vector of the direction of travel.
    pub fn heading(&self) -> Vector3 {
        Vector3::new(self.direction.x, 0.0, self.direction.z).normalize()
    }
}

/// Moves `db` along the track from `frame`. On a curve of signed `radius`
/// the horizontal chord is turned by half the arc angle and the frame by the
/// full angle; the vertical rise follows the slope of the direction.
pub fn advance(frame: &Frame, radius: f64, db: f64) -> Frame {
    if db == 0.0 {
        return *frame;
    }
    if radius == 0.0 {
        return Frame { position: frame.position + frame.direction * db, ..*frame };
    }

    let dir = frame.direction;
    let p = dir.y / (dir.x * dir.x + dir.z * dir.z).sqrt();
    let s = db / (1.0 + p * p).sqrt();
    let h = s * p;
    let b = s / radius.abs();
    let f = 2.0 * radius * radius * (1.0 - b.cos());
    let c = db.signum() * f.max(0.0).sqrt();
    let a = 0.5 * radius.signum() * b;

    let (cosa, sina) = (a.cos(), a.sin());
    let mut d = Vector3::new(dir.x, 0.0, dir.z).normalize();
    d = d.rotate(Vector3::DOWN, cosa, sina);
    let position = Vector3::new(frame.position.x + c * d.x, frame.position.y + h, frame.position.z + c * d.z);
    d = d.rotate(Vector3::DOWN, cosa, sina);
    let direction = Vector3::new(d.x, p, d.z).normalize();
    let side = frame.side.rotate(Vector3::DOWN, (2.0 * a).cos(), (2.0 * a).sin());
    Frame {
        position: position,
        direction: direction,
        up: direction.cross(side),
        side: side,
    }
}

/// Cubic Hermite blend of cant between two elements, `t` in [0, 1].
pub fn hermite(t: f64, c0: f64, m0: f64, c1: f64, m1: f64) -> f64 {
    let t2 = t * t;
    let t3 = t2 * t;
    (2.0 * t3 - 3.0 * t2 + 1.0) * c0 + (t3 - 2.0 * t2 + t) * m0 + (-2.0 * t3 + 3.0 * t2) * c1 + (t3 - t2) * m1
}
