//! The core data types for defining the 3D integer lattice that terrain is streamed on:
//! - `PointN`: an N-dimensional point, most importantly `Point3i`
//! - `ExtentN`: an N-dimensional extent, most importantly `Extent3i`
//! - `BoxFace`: the six faces a grid window can grow through

pub mod axis;
pub mod extent;
pub mod point;

pub use axis::{Axis3, BoxFace};
pub use extent::{Extent3i, ExtentN};
pub use point::{Point3, Point3i, PointN};

pub use num;

pub mod prelude {
    pub use super::{Axis3, BoxFace, Extent3i, ExtentN, Point3, Point3i, PointN};
}
