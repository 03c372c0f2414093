//! Reference transform module
//!
//! Built as `cdylib` and deployed as `<base_dir>/logic.<ext>`; the host
//! picks up every rebuild without restarting.

use hotswap_core::{Vec3, declare_transform};

/// Per-axis scale applied at full weight
pub const SCALE: Vec3 = Vec3::new(6.0, 4.0, 15.0);

/// Blend from the input towards its scaled copy by `weight`
pub fn scale_blend(element: Vec3, weight: f32) -> Vec3 {
    element.lerp(weight, element.mul_elem(SCALE))
}

declare_transform!(scale_blend);
