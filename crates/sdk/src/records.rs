//! Host camera record type definitions
//!
//! These are opaque types representing records owned by the host process.
//! We never rely on their Rust-side layout; fields are reached through
//! offsets loaded from gamedata.

/// Opaque type for the host's game camera (the record passed to the update
/// and collision routines). Embeds a [`SceneCamera`].
#[repr(C)]
pub struct GameCamera {
    _opaque: [u8; 0],
}

/// Opaque type for the host's logical scene camera
/// Holds world position, look-at vector and the scene view matrix
#[repr(C)]
pub struct SceneCamera {
    _opaque: [u8; 0],
}

/// Opaque type for the host's render-side camera
/// Caches its own copy of the view matrix for render passes
#[repr(C)]
pub struct RenderCamera {
    _opaque: [u8; 0],
}

/// Opaque type for the host's camera manager singleton
#[repr(C)]
pub struct CameraManager {
    _opaque: [u8; 0],
}

/// Three packed single-precision floats, as the host stores vectors
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<[f32; 3]> for Vector3 {
    fn from(v: [f32; 3]) -> Self {
        Self {
            x: v[0],
            y: v[1],
            z: v[2],
        }
    }
}

impl From<Vector3> for [f32; 3] {
    fn from(v: Vector3) -> Self {
        [v.x, v.y, v.z]
    }
}

/// Sixteen packed floats, as the host stores 4x4 matrices
///
/// The host uses row vectors; its row-major storage is therefore bitwise
/// identical to a column-major matrix built for column vectors.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix4x4 {
    pub m: [f32; 16],
}

impl Default for Matrix4x4 {
    fn default() -> Self {
        let mut m = [0.0; 16];
        m[0] = 1.0;
        m[5] = 1.0;
        m[10] = 1.0;
        m[15] = 1.0;
        Self { m }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_type_sizes() {
        assert_eq!(std::mem::size_of::<Vector3>(), 12);
        assert_eq!(std::mem::size_of::<Matrix4x4>(), 64);
    }

    #[test]
    fn test_default_matrix_is_identity() {
        let m = Matrix4x4::default();
        assert_eq!(m.m[0], 1.0);
        assert_eq!(m.m[5], 1.0);
        assert_eq!(m.m[10], 1.0);
        assert_eq!(m.m[15], 1.0);
        assert_eq!(m.m.iter().filter(|v| **v == 0.0).count(), 12);
    }
}
