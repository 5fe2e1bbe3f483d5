//! Procedural LOD0 voxel functions for feeding a `LoopbackPeer` in tests, benches and demos.

use voxel_stream_core::prelude::*;

pub const SOLID: u8 = 255;
pub const AIR: u8 = 0;

/// Solid below `height`, air at and above it.
pub fn flat_ground(height: i32) -> impl Fn(Point3i) -> u8 + Clone {
    move |p: Point3i| if p.y() < height { SOLID } else { AIR }
}

/// A solid ball of `radius` around `center`.
pub fn sphere(center: Point3i, radius: i32) -> impl Fn(Point3i) -> u8 + Clone {
    move |p: Point3i| {
        let d = p - center;
        if d.x() * d.x() + d.y() * d.y() + d.z() * d.z() < radius * radius {
            SOLID
        } else {
            AIR
        }
    }
}

/// Ground whose height is a triangle wave in X and Z, between 0 and `amplitude`, repeating every `period` voxels.
pub fn hills(amplitude: i32, period: i32) -> impl Fn(Point3i) -> u8 + Clone {
    let wave = move |t: i32| {
        let phase = t.rem_euclid(period);
        let half = period / 2;
        let rise = if phase < half { phase } else { period - phase };

        rise * amplitude / half.max(1)
    };

    move |p: Point3i| {
        let height = (wave(p.x()) + wave(p.z())) / 2;
        if p.y() < height {
            SOLID
        } else {
            AIR
        }
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
