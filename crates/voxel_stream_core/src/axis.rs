use crate::{Point3i, PointN};

/// Either the X, Y, or Z axis.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Axis3 {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis3 {
    pub const ALL: [Axis3; 3] = [Axis3::X, Axis3::Y, Axis3::Z];

    /// The index for a point's component on this axis.
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn get_unit_vector(&self) -> Point3i {
        match self {
            Axis3::X => PointN([1, 0, 0]),
            Axis3::Y => PointN([0, 1, 0]),
            Axis3::Z => PointN([0, 0, 1]),
        }
    }
}

/// One of the six faces of an axis-aligned box. A grid grows or shrinks by one slice at a time through one of these faces.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BoxFace {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl BoxFace {
    /// Every face, ordered by axis with the positive face first.
    pub const ALL: [BoxFace; 6] = [
        BoxFace::PosX,
        BoxFace::NegX,
        BoxFace::PosY,
        BoxFace::NegY,
        BoxFace::PosZ,
        BoxFace::NegZ,
    ];

    pub fn new(axis: Axis3, sign: i32) -> Self {
        match (axis, sign >= 0) {
            (Axis3::X, true) => BoxFace::PosX,
            (Axis3::X, false) => BoxFace::NegX,
            (Axis3::Y, true) => BoxFace::PosY,
            (Axis3::Y, false) => BoxFace::NegY,
            (Axis3::Z, true) => BoxFace::PosZ,
            (Axis3::Z, false) => BoxFace::NegZ,
        }
    }

    pub fn axis(&self) -> Axis3 {
        match self {
            BoxFace::PosX | BoxFace::NegX => Axis3::X,
            BoxFace::PosY | BoxFace::NegY => Axis3::Y,
            BoxFace::PosZ | BoxFace::NegZ => Axis3::Z,
        }
    }

    pub fn sign(&self) -> i32 {
        match self {
            BoxFace::PosX | BoxFace::PosY | BoxFace::PosZ => 1,
            BoxFace::NegX | BoxFace::NegY | BoxFace::NegZ => -1,
        }
    }

    /// The outward normal of this face.
    pub fn normal(&self) -> Point3i {
        self.axis().get_unit_vector() * self.sign()
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
