use crate::{Point3i, PointN};

use core::ops::{Add, AddAssign, Sub, SubAssign};
use itertools::iproduct;
use serde::{Deserialize, Serialize};

/// A 3-dimensional extent with scalar type `i32`.
pub type Extent3i = ExtentN<[i32; 3]>;

/// An N-dimensional extent. This is mathematically the Cartesian product of a half-closed interval `[a, b)` in each dimension.
/// You can also just think of it as an axis-aligned box with some shape and a minimum point. Every region of voxels that gets
/// queried, downloaded, or rendered is described by one of these.
#[derive(Debug, Deserialize, Eq, Serialize)]
pub struct ExtentN<N> {
    /// The least point contained in the extent.
    pub minimum: PointN<N>,
    /// The length of each dimension.
    pub shape: PointN<N>,
}

impl<N> Clone for ExtentN<N>
where
    PointN<N>: Clone,
{
    #[inline]
    fn clone(&self) -> Self {
        Self {
            minimum: self.minimum.clone(),
            shape: self.shape.clone(),
        }
    }
}
impl<N> Copy for ExtentN<N> where PointN<N>: Copy {}

impl<N> PartialEq for ExtentN<N>
where
    PointN<N>: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.minimum.eq(&other.minimum) && self.shape.eq(&other.shape)
    }
}

impl<N> ExtentN<N> {
    /// The default representation of an extent as the minimum point and shape.
    #[inline]
    pub fn from_min_and_shape(minimum: PointN<N>, shape: PointN<N>) -> Self {
        Self { minimum, shape }
    }
}

impl Extent3i {
    /// An alternative representation of an extent as the minimum point and least upper bound.
    #[inline]
    pub fn from_min_and_lub(minimum: Point3i, least_upper_bound: Point3i) -> Self {
        // We want to avoid negative shape components.
        let shape = (least_upper_bound - minimum).join(Point3i::ZERO);

        Self { minimum, shape }
    }

    /// An alternative representation of an integer extent as the minimum point and maximum point.
    #[inline]
    pub fn from_min_and_max(minimum: Point3i, max: Point3i) -> Self {
        Self::from_min_and_lub(minimum, max + Point3i::ONES)
    }

    /// The extent of the given `shape` whose minimum sits `shape / 2` below `center`.
    #[inline]
    pub fn from_center_and_shape(center: Point3i, shape: Point3i) -> Self {
        Self::from_min_and_shape(center - shape.div_floor(2), shape)
    }

    /// The least point `p` for which all points `q` in the extent satisfy `q < p`.
    #[inline]
    pub fn least_upper_bound(&self) -> Point3i {
        self.minimum + self.shape
    }

    /// The unique greatest point in the extent.
    #[inline]
    pub fn max(&self) -> Point3i {
        self.least_upper_bound() - Point3i::ONES
    }

    #[inline]
    pub fn volume(&self) -> i32 {
        self.shape.volume()
    }

    /// The number of points contained in the extent.
    #[inline]
    pub fn num_points(&self) -> usize {
        self.shape.join(Point3i::ZERO).volume() as usize
    }

    /// Returns `true` iff the number of points in the extent is 0.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_points() == 0
    }

    /// Translate the extent such that it has `new_min` as it's new minimum.
    #[inline]
    pub fn with_minimum(&self, new_min: Point3i) -> Self {
        Self::from_min_and_shape(new_min, self.shape)
    }

    /// Returns `true` iff the point `p` is contained in this extent.
    #[inline]
    pub fn contains(&self, p: Point3i) -> bool {
        self.minimum <= p && p < self.least_upper_bound()
    }

    /// The position of `p` in a row-major buffer holding one element per point of this extent. `p` must be contained in the
    /// extent.
    #[inline]
    pub fn index_of(&self, p: Point3i) -> usize {
        debug_assert!(self.contains(p));
        let local = p - self.minimum;

        (local.x() + self.shape.x() * (local.y() + self.shape.y() * local.z())) as usize
    }

    /// Returns the extent containing only the points in both `self` and `other`.
    #[inline]
    pub fn intersection(&self, other: &Self) -> Self {
        let minimum = self.minimum.join(other.minimum);
        let lub = self.least_upper_bound().meet(other.least_upper_bound());

        Self::from_min_and_lub(minimum, lub)
    }

    /// Returns `true` iff the intersection of `self` and `other` is equal to `self`.
    #[inline]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.intersection(other).eq(self)
    }

    /// The extent covering the same voxels at a level `shift` steps coarser, i.e. every coordinate floor-divided by
    /// `2^shift`.
    #[inline]
    pub fn downsample(&self, shift: i32) -> Self {
        Self::from_min_and_max(self.minimum >> shift, self.max() >> shift)
    }

    /// Iterate over all points in the extent in row-major order: X varies fastest, then Y, then Z.
    /// ```
    /// # use voxel_stream_core::prelude::*;
    /// #
    /// let extent = Extent3i::from_min_and_shape(PointN([0, 0, 0]), PointN([2, 2, 1]));
    /// let points = extent.iter_points().collect::<Vec<_>>();
    /// assert_eq!(points, vec![
    ///     PointN([0, 0, 0]), PointN([1, 0, 0]), PointN([0, 1, 0]), PointN([1, 1, 0])
    /// ]);
    /// ```
    #[inline]
    pub fn iter_points(&self) -> impl Iterator<Item = Point3i> {
        let min = self.minimum;
        let lub = self.least_upper_bound().join(min);

        iproduct!(min.z()..lub.z(), min.y()..lub.y(), min.x()..lub.x())
            .map(|(z, y, x)| PointN([x, y, z]))
    }
}

impl Add<Point3i> for Extent3i {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Point3i) -> Self::Output {
        Self::from_min_and_shape(self.minimum + rhs, self.shape)
    }
}

impl Sub<Point3i> for Extent3i {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Point3i) -> Self::Output {
        Self::from_min_and_shape(self.minimum - rhs, self.shape)
    }
}

impl AddAssign<Point3i> for Extent3i {
    #[inline]
    fn add_assign(&mut self, rhs: Point3i) {
        self.minimum += rhs;
    }
}

impl SubAssign<Point3i> for Extent3i {
    #[inline]
    fn sub_assign(&mut self, rhs: Point3i) {
        self.minimum -= rhs;
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

    use pretty_assertions::assert_eq;

    #[test]
    fn intersection_of_disjoint_extents_is_empty() {
        let a = Extent3i::from_min_and_shape(PointN([0; 3]), PointN([4; 3]));
        let b = Extent3i::from_min_and_shape(PointN([8; 3]), PointN([4; 3]));

        assert!(a.intersection(&b).is_empty());
        assert_eq!(a.intersection(&b).iter_points().count(), 0);
    }

    #[test]
    fn intersection_is_overlap() {
        let a = Extent3i::from_min_and_shape(PointN([0; 3]), PointN([4; 3]));
        let b = Extent3i::from_min_and_shape(PointN([2, -1, 3]), PointN([4; 3]));

        assert_eq!(
            a.intersection(&b),
            Extent3i::from_min_and_max(PointN([2, 0, 3]), PointN([3, 2, 3]))
        );
    }

    #[test]
    fn center_and_shape_puts_center_in_upper_half() {
        let e = Extent3i::from_center_and_shape(PointN([0, 0, 0]), PointN([4, 5, 1]));

        assert_eq!(e.minimum, PointN([-2, -2, 0]));
        assert!(e.contains(PointN([0, 0, 0])));
    }

    #[test]
    fn downsample_covers_every_coarse_voxel() {
        let e = Extent3i::from_min_and_max(PointN([-3, 0, 5]), PointN([2, 1, 8]));

        assert_eq!(
            e.downsample(2),
            Extent3i::from_min_and_max(PointN([-1, 0, 1]), PointN([0, 0, 2]))
        );
    }

    #[test]
    fn index_of_matches_iteration_order() {
        let e = Extent3i::from_min_and_shape(PointN([-1, 2, 0]), PointN([3, 2, 2]));

        for (i, p) in e.iter_points().enumerate() {
            assert_eq!(e.index_of(p), i);
        }
    }

    #[test]
    fn translation_moves_minimum_only() {
        let e = Extent3i::from_min_and_shape(PointN([1, 2, 3]), PointN([4, 5, 6]));

        assert_eq!((e + PointN([1, 1, 1])).minimum, PointN([2, 3, 4]));
        assert_eq!((e - PointN([1, 1, 1])).shape, e.shape);
    }
}
