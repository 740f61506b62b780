use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// Two-component vector, used for lateral/vertical offsets relative to a rail.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Vector2 { x, y }
    }

    pub const ZERO: Self = Self::new(0.0, 0.0);

    pub fn magnitude(self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn normalize(self) -> Self {
        let mag = self.magnitude();
        if mag < std::f64::EPSILON {
            return Self::ZERO;
        }
        Vector2::new(self.x / mag, self.y / mag)
    }

    /// Rotates the vector counter-clockwise by the angle given as (cos, sin).
    pub fn rotate(self, cos: f64, sin: f64) -> Self {
        Vector2::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }
}

/// World-space vector. The y axis points up, the initial direction of travel is +z.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Vector3 { x, y, z }
    }

    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const UP: Self = Self::new(0.0, 1.0, 0.0);
    pub const DOWN: Self = Self::new(0.0, -1.0, 0.0);
    pub const RIGHT: Self = Self::new(1.0, 0.0, 0.0);
    pub const FORWARD: Self = Self::new(0.0, 0.0, 1.0);

    pub fn magnitude(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn normalize(self) -> Self {
        let mag = self.magnitude();
        if mag < std::f64::EPSILON {
            return Self::ZERO;
        }
        self * (1.0 / mag)
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Rotates around a unit `axis` by the angle given as (cos, sin) (Rodrigues).
    pub fn rotate(self, axis: Vector3, cos: f64, sin: f64) -> Self {
        self * cos + axis.cross(self) * sin + axis * (axis.dot(self) * (1.0 - cos))
    }
}

impl Add for Vector3 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl AddAssign for Vector3 {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for Vector3 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f64> for Vector3 {
    type Output = Self;
    fn mul(self, scalar: f64) -> Self {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl Neg for Vector3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

#[test]
fn test_rotate_around_down() {
    use assert_approx_eq::assert_approx_eq;
    let half_pi = std::f64::consts::FRAC_PI_2;
    let v = Vector3::FORWARD.rotate(Vector3::DOWN, half_pi.cos(), half_pi.sin());
    assert_approx_eq!(v.x, -1.0);
    assert_approx_eq!(v.y, 0.0);
    assert_approx_eq!(v.z, 0.0);
}

#[test]
fn test_cross_is_right_handed() {
    let up = Vector3::FORWARD.cross(Vector3::RIGHT);
    assert_eq!(up, Vector3::UP);
}
