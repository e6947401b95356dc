//! Coordinate system transformations between the source scene convention and
//! the X-Plane OBJ8 convention.
//!
//! The source scene is right-handed with Z up (Blender-style); X-Plane is
//! right-handed with Y up and Z pointing backward. Converting a vector swaps
//! the up axis into place and negates the horizontal axis that changes
//! handedness of the ground plane:
//!
//! - Source X (right) → X-Plane X (right)
//! - Source Z (up)    → X-Plane Y (up)
//! - Source Y (forward) → X-Plane −Z (forward)

use glam::DVec3;

/// Transform a vector from the source scene convention to X-Plane axes.
pub fn vec_to_xplane(v: DVec3) -> DVec3 {
    DVec3::new(v.x, v.z, -v.y)
}

/// Transform a vector from X-Plane axes back to the source scene convention.
pub fn vec_from_xplane(v: DVec3) -> DVec3 {
    DVec3::new(v.x, -v.z, v.y)
}
