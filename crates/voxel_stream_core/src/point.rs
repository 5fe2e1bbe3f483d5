use crate::Axis3;

use core::ops::{Add, AddAssign, Mul, Neg, Shl, Shr, Sub, SubAssign};
use num::{Integer, Zero};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// An N-dimensional point, which is usually just a primitive array.
///
/// ```
/// use voxel_stream_core::PointN;
///
/// let p1 = PointN([1, 2, 3]);
/// let p2 = PointN([3, 4, 5]);
///
/// assert_eq!(p1 + p2, PointN([4, 6, 8]));
/// assert_eq!(p1 - p2, PointN([-2, -2, -2]));
/// assert_eq!(p1 * 2, PointN([2, 4, 6]));
/// ```
///
/// There is also a partial order defined on points which says that a point A is greater than a point B if and only if all
/// of the components of point A are greater than point B. This is how extents check containment:
///
/// ```
/// use voxel_stream_core::PointN;
///
/// let min = PointN([0, 0, 0]);
/// let least_upper_bound = PointN([3, 3, 3]);
///
/// let p = PointN([0, 1, 2]);
/// assert!(min <= p && p < least_upper_bound);
/// ```
#[derive(Copy, Clone, Debug, Deserialize, Default, Eq, Hash, PartialEq, Serialize)]
pub struct PointN<N>(pub N);

/// A 3-dimensional point with scalar type `T`.
pub type Point3<T> = PointN<[T; 3]>;
/// A 3-dimensional point with scalar type `i32`.
pub type Point3i = PointN<[i32; 3]>;

impl<T> Point3<T>
where
    T: Copy,
{
    #[inline]
    pub fn x(&self) -> T {
        self.0[0]
    }

    #[inline]
    pub fn y(&self) -> T {
        self.0[1]
    }

    #[inline]
    pub fn z(&self) -> T {
        self.0[2]
    }

    #[inline]
    pub fn fill(value: T) -> Self {
        PointN([value; 3])
    }

    #[inline]
    pub fn axis_component(&self, axis: Axis3) -> T {
        self.0[axis.index()]
    }

    #[inline]
    pub fn axis_component_mut(&mut self, axis: Axis3) -> &mut T {
        &mut self.0[axis.index()]
    }

    #[inline]
    pub fn map_components_unary(&self, f: impl Fn(T) -> T) -> Self {
        PointN([f(self.x()), f(self.y()), f(self.z())])
    }

    #[inline]
    pub fn map_components_binary(&self, other: &Self, f: impl Fn(T, T) -> T) -> Self {
        PointN([
            f(self.x(), other.x()),
            f(self.y(), other.y()),
            f(self.z(), other.z()),
        ])
    }
}

impl Point3i {
    pub const ZERO: Self = PointN([0; 3]);
    pub const ONES: Self = PointN([1; 3]);
    pub const MIN: Self = PointN([i32::MIN; 3]);
    pub const MAX: Self = PointN([i32::MAX; 3]);

    /// Component-wise minimum.
    #[inline]
    pub fn meet(&self, other: Self) -> Self {
        self.map_components_binary(&other, |a, b| a.min(b))
    }

    /// Component-wise maximum.
    #[inline]
    pub fn join(&self, other: Self) -> Self {
        self.map_components_binary(&other, |a, b| a.max(b))
    }

    #[inline]
    pub fn abs(&self) -> Self {
        self.map_components_unary(|c| c.abs())
    }

    /// Floor division of each component, so that negative coordinates land in the cell below zero.
    #[inline]
    pub fn div_floor(&self, rhs: i32) -> Self {
        self.map_components_unary(|c| Integer::div_floor(&c, &rhs))
    }

    /// Rounds each component down to a multiple of `rhs`.
    #[inline]
    pub fn round_down_to_multiple(&self, rhs: i32) -> Self {
        self.div_floor(rhs) * rhs
    }

    #[inline]
    pub fn volume(&self) -> i32 {
        self.x() * self.y() * self.z()
    }
}

impl PartialOrd for Point3i {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self < other {
            Some(Ordering::Less)
        } else if self > other {
            Some(Ordering::Greater)
        } else if self.eq(other) {
            Some(Ordering::Equal)
        } else {
            None
        }
    }

    #[inline]
    fn lt(&self, other: &Self) -> bool {
        self.x() < other.x() && self.y() < other.y() && self.z() < other.z()
    }

    #[inline]
    fn gt(&self, other: &Self) -> bool {
        self.x() > other.x() && self.y() > other.y() && self.z() > other.z()
    }

    #[inline]
    fn le(&self, other: &Self) -> bool {
        self.x() <= other.x() && self.y() <= other.y() && self.z() <= other.z()
    }

    #[inline]
    fn ge(&self, other: &Self) -> bool {
        self.x() >= other.x() && self.y() >= other.y() && self.z() >= other.z()
    }
}

impl Zero for Point3i {
    #[inline]
    fn zero() -> Self {
        Self::ZERO
    }

    #[inline]
    fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl Add for Point3i {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        self.map_components_binary(&rhs, |a, b| a + b)
    }
}

impl Sub for Point3i {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        self.map_components_binary(&rhs, |a, b| a - b)
    }
}

impl Mul for Point3i {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        self.map_components_binary(&rhs, |a, b| a * b)
    }
}

impl Mul<i32> for Point3i {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: i32) -> Self {
        self.map_components_unary(|c| c * rhs)
    }
}

impl Mul<Point3i> for i32 {
    type Output = Point3i;

    #[inline]
    fn mul(self, rhs: Point3i) -> Point3i {
        rhs * self
    }
}

impl Neg for Point3i {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::ZERO - self
    }
}

impl AddAssign for Point3i {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Point3i {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

// Arithmetic shifts, i.e. floor division and multiplication by powers of two. These are how points move between LODs.

impl Shl<i32> for Point3i {
    type Output = Self;

    #[inline]
    fn shl(self, rhs: i32) -> Self {
        self.map_components_unary(|c| c << rhs)
    }
}

impl Shr<i32> for Point3i {
    type Output = Self;

    #[inline]
    fn shr(self, rhs: i32) -> Self {
        self.map_components_unary(|c| c >> rhs)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn shift_right_floors_negative_components() {
        assert_eq!(PointN([-1, -16, 17]) >> 4, PointN([-1, -1, 1]));
        assert_eq!(PointN([-1, 0, 1]) << 2, PointN([-4, 0, 4]));
    }

    #[test]
    fn div_floor_rounds_toward_negative_infinity() {
        assert_eq!(PointN([-1, 15, -17]).div_floor(16), PointN([-1, 0, -2]));
        assert_eq!(
            PointN([-1, 15, -17]).round_down_to_multiple(16),
            PointN([-16, 0, -32])
        );
    }

    #[test]
    fn partial_order_requires_all_components() {
        let a = PointN([0, 0, 0]);
        let b = PointN([1, 1, 0]);

        assert!(a <= b);
        assert!(!(a < b));
        assert_eq!(a.partial_cmp(&PointN([1, -1, 0])), None);
    }
}
