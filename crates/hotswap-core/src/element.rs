//! Element ABI shared between the host and the swappable module
//!
//! The core treats each element as an opaque fixed-size record of three
//! `f32` components. The layout is `#[repr(C)]` so that it can cross the
//! `extern "C"` boundary by value.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Name of the symbol every module must export.
pub const ENTRY_SYMBOL: &str = "transform";

/// File stem of the module image, without prefix or extension.
pub const MODULE_STEM: &str = "logic";

/// Signature of the exported entry point.
pub type TransformFn = unsafe extern "C" fn(Vec3, f32) -> Vec3;

/// Per-element payload passed through the entry point
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const fn splat(v: f32) -> Self {
        Self::new(v, v, v)
    }

    /// Component-wise product
    pub fn mul_elem(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x * other.x, self.y * other.y, self.z * other.z)
    }

    /// Linear interpolation from `self` towards `to` by `t`
    pub fn lerp(self, t: f32, to: Vec3) -> Vec3 {
        self + (to - self) * t
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Vec3::new(x, y, z)
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}, {}, {}}}", self.x, self.y, self.z)
    }
}

/// Export a `fn(Vec3, f32) -> Vec3` as the module entry point
///
/// ```rust,ignore
/// fn scale(v: Vec3, w: f32) -> Vec3 { v * (2.0 * w) }
/// hotswap_core::declare_transform!(scale);
/// ```
#[macro_export]
macro_rules! declare_transform {
    ($transform_fn:path) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn transform(element: $crate::Vec3, weight: f32) -> $crate::Vec3 {
            $transform_fn(element, weight)
        }
    };
}
