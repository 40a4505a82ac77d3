/// Model transforms for surfaces
use nalgebra::{Matrix4, Vector3};

/// Rotation state around three axes (in radians)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationState {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl RotationState {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Rotate by delta amounts (in radians)
    pub fn rotate(&mut self, dx: f32, dy: f32, dz: f32) {
        self.x += dx;
        self.y += dy;
        self.z += dz;
    }
}

impl Default for RotationState {
    fn default() -> Self {
        Self::zero()
    }
}

/// Transform builder for model matrices
pub struct Transform;

impl Transform {
    /// Rotation applied in order Z, Y, X
    pub fn rotation_matrix(rotation: &RotationState) -> Matrix4<f32> {
        let rx = Matrix4::new_rotation(Vector3::new(rotation.x, 0.0, 0.0));
        let ry = Matrix4::new_rotation(Vector3::new(0.0, rotation.y, 0.0));
        let rz = Matrix4::new_rotation(Vector3::new(0.0, 0.0, rotation.z));
        rz * ry * rx
    }

    pub fn translation_matrix(x: f32, y: f32, z: f32) -> Matrix4<f32> {
        Matrix4::new_translation(&Vector3::new(x, y, z))
    }

    pub fn scale_matrix(s: f32) -> Matrix4<f32> {
        Matrix4::new_scaling(s)
    }

    /// Model matrix that fits a surface spanning `[min, max]` on every axis
    /// into a cube of edge `target` centred on the origin, then rotates it
    pub fn fit_model_matrix(rotation: &RotationState, min: f32, max: f32, target: f32) -> Matrix4<f32> {
        let span = (max - min).max(f32::EPSILON);
        let center = 0.5 * (min + max);
        Self::rotation_matrix(rotation)
            * Self::scale_matrix(target / span)
            * Self::translation_matrix(-center, -center, -center)
    }

    pub fn mvp_matrix(
        model: &Matrix4<f32>,
        view: &Matrix4<f32>,
        projection: &Matrix4<f32>,
    ) -> Matrix4<f32> {
        projection * view * model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    #[test]
    fn test_rotation_state() {
        let mut state = RotationState::zero();
        state.rotate(0.1, 0.2, 0.3);
        assert_relative_eq!(state.x, 0.1);
        assert_relative_eq!(state.y, 0.2);
        assert_relative_eq!(state.z, 0.3);
    }

    #[test]
    fn test_identity_rotation() {
        let matrix = Transform::rotation_matrix(&RotationState::zero());
        assert_relative_eq!(matrix, Matrix4::identity());
    }

    #[test]
    fn test_fit_model_matrix_centres_domain() {
        let model = Transform::fit_model_matrix(&RotationState::zero(), 0.0, 9.0, 3.0);
        assert_relative_eq!(
            model.transform_point(&Point3::new(4.5, 4.5, 4.5)),
            Point3::origin(),
            epsilon = 1e-6
        );
        assert_relative_eq!(
            model.transform_point(&Point3::new(9.0, 9.0, 9.0)),
            Point3::new(1.5, 1.5, 1.5),
            epsilon = 1e-6
        );
    }
}
