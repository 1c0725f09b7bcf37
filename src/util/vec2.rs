use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

/// Position or direction on the arena ground plane.
///
/// Headings follow the arena convention: angle 0 points toward -z and
/// angles grow clockwise when viewed from above, so a heading `a` maps to
/// the direction `(sin a, -cos a)`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub z: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, z: 0.0 };

    #[inline]
    pub fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    /// Unit vector pointing along `heading`
    #[inline]
    pub fn from_heading(heading: f32) -> Self {
        Self {
            x: heading.sin(),
            z: -heading.cos(),
        }
    }

    /// Heading of this vector; inverse of [`Vec2::from_heading`]
    #[inline]
    pub fn heading(&self) -> f32 {
        self.x.atan2(-self.z)
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.length_sq().sqrt()
    }

    #[inline]
    pub fn length_sq(&self) -> f32 {
        self.x * self.x + self.z * self.z
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 0.0 {
            Self {
                x: self.x / len,
                z: self.z / len,
            }
        } else {
            Self::ZERO
        }
    }

    #[inline]
    pub fn distance_to(&self, other: Vec2) -> f32 {
        (*self - other).length()
    }

    #[inline]
    pub fn distance_sq_to(&self, other: Vec2) -> f32 {
        (*self - other).length_sq()
    }

    pub fn lerp(&self, other: Vec2, t: f32) -> Self {
        *self + (other - *self) * t
    }

    /// Clamp both coordinates into `[-half, half]`
    pub fn clamp_to_square(&self, half: f32) -> Self {
        let half = half.max(0.0);
        Self {
            x: self.x.clamp(-half, half),
            z: self.z.clamp(-half, half),
        }
    }

    /// True when both coordinates lie within `[-half, half]`
    #[inline]
    pub fn within_square(&self, half: f32) -> bool {
        self.x.abs() <= half && self.z.abs() <= half
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.z.is_finite()
    }
}

/// Wrap an angle difference into `[-PI, PI]`.
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    // rem_euclid can land exactly on TAU for tiny negative inputs
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// Round to a fixed number of decimal places for the wire form
#[inline]
pub fn round_to(value: f32, decimals: i32) -> f32 {
    let factor = 10f32.powi(decimals);
    (value * factor).round() / factor
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            z: self.z + rhs.z,
        }
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            z: self.z - rhs.z,
        }
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self {
            x: self.x * rhs,
            z: self.z * rhs,
        }
    }
}

impl Mul<Vec2> for f32 {
    type Output = Vec2;
    fn mul(self, rhs: Vec2) -> Vec2 {
        rhs * self
    }
}

impl Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            z: -self.z,
        }
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.z += rhs.z;
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.z -= rhs.z;
    }
}

impl MulAssign<f32> for Vec2 {
    fn mul_assign(&mut self, rhs: f32) {
        self.x *= rhs;
        self.z *= rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_heading_zero_points_negative_z() {
        let dir = Vec2::from_heading(0.0);
        assert!(approx_eq(dir.x, 0.0));
        assert!(approx_eq(dir.z, -1.0));
    }

    #[test]
    fn test_heading_quarter_turn_points_positive_x() {
        let dir = Vec2::from_heading(PI / 2.0);
        assert!(approx_eq(dir.x, 1.0));
        assert!(approx_eq(dir.z, 0.0));
    }

    #[test]
    fn test_heading_inverse() {
        for heading in [-3.0, -1.2, 0.0, 0.4, 2.9] {
            assert!(approx_eq(Vec2::from_heading(heading).heading(), heading));
        }
    }

    #[test]
    fn test_normalize() {
        let v = Vec2::new(3.0, 4.0).normalize();
        assert!(approx_eq(v.length(), 1.0));
        assert_eq!(Vec2::ZERO.normalize(), Vec2::ZERO);
    }

    #[test]
    fn test_distance() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(3.0, 4.0);
        assert!(approx_eq(a.distance_to(b), 5.0));
        assert!(approx_eq(a.distance_sq_to(b), 25.0));
    }

    #[test]
    fn test_lerp_edges() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(10.0, -20.0);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        assert_eq!(a.lerp(b, 0.5), Vec2::new(5.0, -10.0));
    }

    #[test]
    fn test_clamp_to_square() {
        let v = Vec2::new(900.0, -1200.0).clamp_to_square(700.0);
        assert_eq!(v, Vec2::new(700.0, -700.0));
        assert!(v.within_square(700.0));
    }

    #[test]
    fn test_wrap_angle() {
        assert!(approx_eq(wrap_angle(0.5), 0.5));
        assert!(approx_eq(wrap_angle(TAU + 0.5), 0.5));
        assert!(approx_eq(wrap_angle(-TAU - 0.5), -0.5));
        // 6 radians the long way round is a short step backwards
        assert!(approx_eq(wrap_angle(6.0), 6.0 - TAU));
        assert!(wrap_angle(PI).abs() <= PI);
        assert!(wrap_angle(-PI).abs() <= PI);
    }

    #[test]
    fn test_round_to() {
        assert!(approx_eq(round_to(12.3456, 1), 12.3));
        assert!(approx_eq(round_to(-1.004, 2), -1.0));
        assert!(approx_eq(round_to(7.6, 0), 8.0));
    }

    #[test]
    fn test_operators() {
        let mut v = Vec2::new(1.0, 2.0);
        v += Vec2::new(1.0, 1.0);
        assert_eq!(v, Vec2::new(2.0, 3.0));
        v -= Vec2::new(2.0, 2.0);
        assert_eq!(v, Vec2::new(0.0, 1.0));
        v *= 3.0;
        assert_eq!(v, Vec2::new(0.0, 3.0));
        assert_eq!(-v, Vec2::new(0.0, -3.0));
        assert_eq!(2.0 * v, Vec2::new(0.0, 6.0));
    }
}
