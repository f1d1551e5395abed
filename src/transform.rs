use nalgebra::{Matrix4, Point3, Rotation3, Translation3, Vector3};

/// Permutation of the three spatial axes applied to every position and
/// direction before it reaches the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisOrder([usize; 3]);

impl AxisOrder {
    pub const IDENTITY: Self = Self([0, 1, 2]);
    /// Swaps the second and third axes (container Y-up to Z-up).
    pub const SWAP_YZ: Self = Self([0, 2, 1]);

    pub fn from_swap(swap_secondary_axes: bool) -> Self {
        if swap_secondary_axes {
            Self::SWAP_YZ
        } else {
            Self::IDENTITY
        }
    }

    pub fn apply(&self, v: &Vector3<f32>) -> Vector3<f32> {
        Vector3::new(v[self.0[0]], v[self.0[1]], v[self.0[2]])
    }

    pub fn apply_array(&self, v: [f32; 3]) -> Vector3<f32> {
        self.apply(&Vector3::from(v))
    }
}

impl Default for AxisOrder {
    fn default() -> Self {
        Self::SWAP_YZ
    }
}

/// Local rotation for container Euler angles `[x, y, z]`.
///
/// A point is rotated about X first, then Z, then Y: `Ry * Rz * Rx`.
pub fn euler_xzy_rotation(rotation: [f32; 3]) -> Rotation3<f32> {
    let [x, y, z] = rotation;
    Rotation3::from_axis_angle(&Vector3::y_axis(), y)
        * Rotation3::from_axis_angle(&Vector3::z_axis(), z)
        * Rotation3::from_axis_angle(&Vector3::x_axis(), x)
}

/// `Translate(translation) * R` as a homogeneous matrix.
pub fn local_matrix(translation: &Vector3<f32>, rotation: &Rotation3<f32>) -> Matrix4<f32> {
    Translation3::from(*translation).to_homogeneous() * rotation.to_homogeneous()
}

pub fn transform_point(matrix: &Matrix4<f32>, point: &Vector3<f32>) -> Vector3<f32> {
    matrix.transform_point(&Point3::from(*point)).coords
}
