//! Axis conventions and conversion matrices
//!
//! Canonical axes are right-handed Z-up. Conversion from a source convention
//! is a single 4x4 applied to all geometry; the label of the applied
//! transform is retained in the import report.

use glam::{DMat4, DVec3, DVec4};

use crate::geometry::polygon::Point3;

/// Up axis of a coordinate convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpAxis {
    #[default]
    ZUp,
    YUp,
}

/// Handedness of a coordinate convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Handedness {
    #[default]
    RightHanded,
    LeftHanded,
}

/// A full axis convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisConvention {
    pub up_axis: UpAxis,
    pub handedness: Handedness,
}

impl AxisConvention {
    pub fn label(&self) -> String {
        let up = match self.up_axis {
            UpAxis::ZUp => "Z_UP",
            UpAxis::YUp => "Y_UP",
        };
        let hand = match self.handedness {
            Handedness::RightHanded => "RIGHT_HANDED",
            Handedness::LeftHanded => "LEFT_HANDED",
        };
        format!("{}/{}", up, hand)
    }
}

/// Description of an applied conversion.
#[derive(Debug, Clone)]
pub struct AxisTransformReport {
    pub axis_transform_applied: String,
    pub matrix: DMat4,
}

impl AxisTransformReport {
    /// True when the conversion is the identity.
    pub fn is_identity(&self) -> bool {
        self.matrix.abs_diff_eq(DMat4::IDENTITY, 1e-12)
    }
}

/// Conversion matrix from `source` to `target` conventions.
pub fn axis_conversion_matrix(source: AxisConvention, target: AxisConvention) -> DMat4 {
    let mut m = DMat4::IDENTITY;
    if source.up_axis != target.up_axis {
        // Y-up <-> Z-up: rotate about +X by ∓90 degrees.
        let rot = match (source.up_axis, target.up_axis) {
            (UpAxis::YUp, UpAxis::ZUp) => DMat4::from_cols(
                DVec4::new(1.0, 0.0, 0.0, 0.0),
                DVec4::new(0.0, 0.0, 1.0, 0.0),
                DVec4::new(0.0, -1.0, 0.0, 0.0),
                DVec4::new(0.0, 0.0, 0.0, 1.0),
            ),
            (UpAxis::ZUp, UpAxis::YUp) => DMat4::from_cols(
                DVec4::new(1.0, 0.0, 0.0, 0.0),
                DVec4::new(0.0, 0.0, -1.0, 0.0),
                DVec4::new(0.0, 1.0, 0.0, 0.0),
                DVec4::new(0.0, 0.0, 0.0, 1.0),
            ),
            _ => DMat4::IDENTITY,
        };
        m = rot * m;
    }
    if source.handedness != target.handedness {
        // Mirror X to switch handedness.
        m = DMat4::from_scale(DVec3::new(-1.0, 1.0, 1.0)) * m;
    }
    m
}

/// Describe the conversion between two conventions.
pub fn describe_axis_conversion(
    source: AxisConvention,
    target: AxisConvention,
) -> AxisTransformReport {
    AxisTransformReport {
        axis_transform_applied: format!("{}->{}", source.label(), target.label()),
        matrix: axis_conversion_matrix(source, target),
    }
}

/// Apply a 4x4 conversion to a list of points.
pub fn apply_axis_conversion(points: &[Point3], matrix: &DMat4) -> Vec<Point3> {
    points
        .iter()
        .map(|&(x, y, z)| {
            let p = matrix.transform_point3(DVec3::new(x, y, z));
            (p.x, p.y, p.z)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_conversion() {
        let report = describe_axis_conversion(AxisConvention::default(), AxisConvention::default());
        assert!(report.is_identity());
        assert_eq!(
            report.axis_transform_applied,
            "Z_UP/RIGHT_HANDED->Z_UP/RIGHT_HANDED"
        );
    }

    #[test]
    fn test_y_up_to_z_up() {
        let source = AxisConvention {
            up_axis: UpAxis::YUp,
            handedness: Handedness::RightHanded,
        };
        let m = axis_conversion_matrix(source, AxisConvention::default());
        // Source "up" (0,1,0) lands on canonical up (0,0,1).
        let up = apply_axis_conversion(&[(0.0, 1.0, 0.0)], &m)[0];
        assert!((up.2 - 1.0).abs() < 1e-12);
        assert!(up.1.abs() < 1e-12);
    }

    #[test]
    fn test_handedness_flip_mirrors_x() {
        let source = AxisConvention {
            up_axis: UpAxis::ZUp,
            handedness: Handedness::LeftHanded,
        };
        let m = axis_conversion_matrix(source, AxisConvention::default());
        let p = apply_axis_conversion(&[(2.0, 1.0, 0.5)], &m)[0];
        assert!((p.0 + 2.0).abs() < 1e-12);
        assert!((p.1 - 1.0).abs() < 1e-12);
    }
}
