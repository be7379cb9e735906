use nalgebra::Vector3;
use std::fmt;

/// Location, Euler rotation (radians) and scale of a scene object, relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub location: Vector3<f64>,
    pub rotation_euler: Vector3<f64>,
    pub scale: Vector3<f64>,
}

impl Transform {
    /// The identity transform: no offset, no rotation, unit scale.
    pub fn identity() -> Self {
        Self {
            location: Vector3::zeros(),
            rotation_euler: Vector3::zeros(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Creates a pure translation.
    ///
    /// # Arguments
    ///
    /// * `location` - The offset from the parent origin.
    pub fn at(location: Vector3<f64>) -> Self {
        Self {
            location,
            ..Self::identity()
        }
    }

    pub fn with_rotation(mut self, rotation_euler: Vector3<f64>) -> Self {
        self.rotation_euler = rotation_euler;
        self
    }

    pub fn with_scale(mut self, scale: Vector3<f64>) -> Self {
        self.scale = scale;
        self
    }

    /// Whether two transforms agree component-wise within `epsilon`.
    pub fn approx_eq(&self, other: &Transform, epsilon: f64) -> bool {
        (self.location - other.location).amax() <= epsilon
            && (self.rotation_euler - other.rotation_euler).amax() <= epsilon
            && (self.scale - other.scale).amax() <= epsilon
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let l = &self.location;
        let r = &self.rotation_euler;
        let s = &self.scale;
        write!(
            f,
            "loc ({:.3}, {:.3}, {:.3}) rot ({:.3}, {:.3}, {:.3}) scale ({:.3}, {:.3}, {:.3})",
            l.x, l.y, l.z, r.x, r.y, r.z, s.x, s.y, s.z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_identity() {
        let t = Transform::default();
        assert_eq!(t.location, Vector3::zeros());
        assert_eq!(t.scale, Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(t, Transform::identity());
    }

    #[test]
    fn approx_eq_tolerates_small_differences() {
        let a = Transform::at(Vector3::new(1.0, 2.0, 3.0));
        let b = Transform::at(Vector3::new(1.0, 2.0, 3.0 + 1e-9));
        let c = a.with_rotation(Vector3::new(0.0, 0.0, 0.5));
        assert!(a.approx_eq(&b, 1e-6));
        assert!(!a.approx_eq(&c, 1e-6));
        assert_eq!(
            a.to_string(),
            "loc (1.000, 2.000, 3.000) rot (0.000, 0.000, 0.000) scale (1.000, 1.000, 1.000)"
        );
    }
}
