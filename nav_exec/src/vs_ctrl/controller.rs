//! Visual servoing control law

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Matrix2x6, Matrix6x2, Vector2};
use serde::{Serialize, Deserialize};

use util::maths::wrap_to_pi;

use super::{CameraModel, InvalidInputError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Feedback gain on the lateral feature error.
pub const LAMBDA_TRANSLATION: f64 = 10.0;

/// Feedback gain on the heading feature error.
pub const LAMBDA_HEADING: f64 = 3000.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Pose of the crop row as seen in the image.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseError {
    /// Lateral image coordinate of the row reference point (`x` feature)
    pub lateral: f64,

    /// Forward image coordinate of the row reference point (`y` feature)
    pub depth: f64,

    /// Heading of the row line in the image (`theta` feature)
    ///
    /// Units: radians
    pub heading: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PoseError {
    pub fn new(lateral: f64, depth: f64, heading: f64) -> Self {
        Self {
            lateral,
            depth,
            heading
        }
    }

    /// True if every component is finite.
    pub fn is_finite(&self) -> bool {
        self.lateral.is_finite() && self.depth.is_finite() && self.heading.is_finite()
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the angular velocity which drives the observed row pose onto the desired one.
///
/// The result is not limited in any way, a near singular yaw coupling can give very large
/// values which must be clamped by the caller. The result is always finite, observations which
/// overflow the control law are rejected.
///
/// Units: radians/second
pub fn compute_angular_velocity(
    cam: &CameraModel,
    desired: &PoseError,
    observed: &PoseError,
    desired_linear_vel_ms: f64
) -> Result<f64, InvalidInputError> {
    if !desired.is_finite() {
        return Err(InvalidInputError::NonFinitePose("desired", *desired))
    }
    if !observed.is_finite() {
        return Err(InvalidInputError::NonFinitePose("observed", *observed))
    }
    if !desired_linear_vel_ms.is_finite() {
        return Err(InvalidInputError::NonFiniteVelocity(desired_linear_vel_ms))
    }

    // Jacobian from robot controls to features, column 0 for forward velocity, column 1 for yaw
    // rate
    let jac = interaction_matrix(cam, observed) * robot_to_camera_transform(cam);
    let jac_vel: Vector2<f64> = jac.column(0).into_owned();
    let jac_ang: Vector2<f64> = jac.column(1).into_owned();

    let jac_ang_pinv = pseudo_inverse(&jac_ang);

    // Feature error
    let delta = Vector2::new(
        LAMBDA_TRANSLATION * (observed.lateral - desired.lateral),
        LAMBDA_HEADING * wrap_to_pi(observed.heading - desired.heading)
    );

    let omega = -jac_ang_pinv.dot(&(delta + jac_vel * desired_linear_vel_ms));

    // Finite but huge features can still overflow the Jacobian
    if !omega.is_finite() {
        return Err(InvalidInputError::NonFiniteCommand(*observed))
    }

    Ok(omega)
}

/// Rows of the image interaction matrix for the lateral feature and the heading feature.
///
/// Columns are the camera frame velocity components `[vx, vy, vz, wx, wy, wz]`.
pub fn interaction_matrix(cam: &CameraModel, pose: &PoseError) -> Matrix2x6<f64> {
    let x = pose.lateral;
    let y = pose.depth;
    let (sin_th, cos_th) = pose.heading.sin_cos();
    let (sin_phi, cos_phi) = cam.tilt_angle_rad().sin_cos();
    let dz = cam.height_offset_m();

    // Projection of the row reference point along the row direction
    let proj = y * sin_th + x * cos_th;

    Matrix2x6::from_row_slice(&[
        // Lateral feature
        (-sin_phi - y * cos_phi) / dz,
        0.0,
        x * (sin_phi + y * cos_phi) / dz,
        x * y,
        -1.0 - x * x,
        y,
        // Heading feature
        cos_phi * cos_th * cos_th / dz,
        cos_phi * cos_th * sin_th / dz,
        -(cos_phi * cos_th * proj) / dz,
        -proj * cos_th,
        -proj * sin_th,
        -1.0
    ])
}

/// Transform from the robot's `[forward velocity, yaw rate]` to the camera frame velocity
/// components.
pub fn robot_to_camera_transform(cam: &CameraModel) -> Matrix6x2<f64> {
    let (sin_phi, cos_phi) = cam.tilt_angle_rad().sin_cos();

    Matrix6x2::from_row_slice(&[
        0.0,        -cam.lateral_offset_m(),
        -sin_phi,   0.0,
        cos_phi,    0.0,
        0.0,        0.0,
        0.0,        -cos_phi,
        0.0,        -sin_phi
    ])
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Moore-Penrose pseudo-inverse of a single column, returned as a column.
///
/// A zero vector has a zero pseudo-inverse, as does one whose norm overflows.
fn pseudo_inverse(v: &Vector2<f64>) -> Vector2<f64> {
    let norm_sq = v.norm_squared();

    if norm_sq == 0.0 || !norm_sq.is_finite() {
        Vector2::zeros()
    }
    else {
        v / norm_sq
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::vs_ctrl::CameraParams;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol * (1.0 + a.abs().max(b.abs()))
    }

    fn default_cam() -> CameraModel {
        CameraModel::from_params(&CameraParams::default()).unwrap()
    }

    #[test]
    fn test_zero_error_zero_command() {
        let cams = [
            default_cam(),
            CameraModel::new(-0.5, 0.3, 0.8).unwrap(),
            CameraModel::new(0.2, -1.2, -2.0).unwrap(),
        ];
        let poses = [
            PoseError::new(0.0, 160.0, 0.0),
            PoseError::new(0.3, -0.2, 0.4),
            PoseError::new(-12.0, 5.0, -3.0),
        ];

        for cam in cams.iter() {
            for pose in poses.iter() {
                let omega = compute_angular_velocity(cam, pose, pose, 0.0).unwrap();
                assert_eq!(omega, 0.0, "cam {:?}, pose {:?}", cam, pose);
            }
        }
    }

    #[test]
    fn test_centred_row_with_forward_speed() {
        // A row centred in the image and aligned with the camera gives no forward coupling, so
        // the command stays zero whatever the forward speed.
        let pose = PoseError::new(0.0, 160.0, 0.0);
        let omega = compute_angular_velocity(&default_cam(), &pose, &pose, 0.2).unwrap();

        assert!(omega.abs() < 1e-12);
    }

    #[test]
    fn test_hand_computed_fixture() {
        // Untilted camera, one meter up, no lateral offset. For x = 0.5, y = 0, theta = 0 the
        // Jacobian reduces to
        //  jac_vel = [0, -0.5]
        //  jac_ang = [1 + x^2, 0] = [1.25, 0]
        let cam = CameraModel::new(0.0, 0.0, 1.0).unwrap();
        let desired = PoseError::new(0.0, 0.0, 0.0);
        let observed = PoseError::new(0.5, 0.0, 0.0);

        let jac = interaction_matrix(&cam, &observed) * robot_to_camera_transform(&cam);
        assert!(approx_eq(jac[(0, 0)], 0.0, 1e-12));
        assert!(approx_eq(jac[(1, 0)], -0.5, 1e-12));
        assert!(approx_eq(jac[(0, 1)], 1.25, 1e-12));
        assert!(approx_eq(jac[(1, 1)], 0.0, 1e-12));

        // delta = [10 * 0.5, 0], pinv = [1.25, 0] / 1.5625 = [0.8, 0]
        let omega = compute_angular_velocity(&cam, &desired, &observed, 0.0).unwrap();
        assert!(approx_eq(omega, -4.0, 1e-12));

        // The forward coupling only enters the heading row, which the pseudo-inverse ignores here
        let omega = compute_angular_velocity(&cam, &desired, &observed, 0.1).unwrap();
        assert!(approx_eq(omega, -4.0, 1e-12));

        // Combined lateral and heading error against the composed Jacobian
        let observed = PoseError::new(0.5, 0.0, 0.3);
        let jac = interaction_matrix(&cam, &observed) * robot_to_camera_transform(&cam);
        let jac_ang: Vector2<f64> = jac.column(1).into_owned();
        assert!(jac_ang[1].abs() > 1e-3);
        let expected = -(jac_ang[0] * LAMBDA_TRANSLATION * 0.5 + jac_ang[1] * LAMBDA_HEADING * 0.3) 
            / jac_ang.norm_squared();
        let omega = compute_angular_velocity(&cam, &desired, &observed, 0.0).unwrap();
        assert!(approx_eq(omega, expected, 1e-12));
    }

    #[test]
    fn test_heading_error_is_wrapped() {
        let cam = default_cam();
        let desired = PoseError::new(0.0, 160.0, 0.0);
        let a = PoseError::new(0.0, 160.0, 0.1);
        let b = PoseError::new(0.0, 160.0, 0.1 + 2.0 * std::f64::consts::PI);

        // The interaction matrix only sees sin/cos of the heading so both poses are the same
        let omega_a = compute_angular_velocity(&cam, &desired, &a, 0.0).unwrap();
        let omega_b = compute_angular_velocity(&cam, &desired, &b, 0.0).unwrap();
        assert!(approx_eq(omega_a, omega_b, 1e-9));
        assert!(omega_a != 0.0);
    }

    #[test]
    fn test_degenerate_coupling_does_not_fail() {
        assert_eq!(pseudo_inverse(&Vector2::zeros()), Vector2::zeros());

        let v = Vector2::new(3.0, -4.0);
        let pinv = pseudo_inverse(&v);
        assert!(approx_eq(pinv.dot(&v), 1.0, 1e-12));

        // Extreme feature values still give a finite, if useless, command
        let cam = default_cam();
        let observed = PoseError::new(1e6, -1e6, 3.0);
        let desired = PoseError::new(0.0, 160.0, 0.0);
        let omega = compute_angular_velocity(&cam, &desired, &observed, 0.2).unwrap();
        assert!(omega.is_finite());
    }

    #[test]
    fn test_overflowing_features() {
        let cam = default_cam();
        let desired = PoseError::new(0.0, 160.0, 0.0);

        // An overflowing coupling is dropped rather than giving inf/inf
        let v = Vector2::new(std::f64::INFINITY, 0.5);
        assert_eq!(pseudo_inverse(&v), Vector2::zeros());

        // Huge but representable
        let observed = PoseError::new(1e150, 0.0, 0.0);
        let omega = compute_angular_velocity(&cam, &desired, &observed, 0.3).unwrap();
        assert!(omega.is_finite());

        // 1 + x^2 overflows, nothing usable is left
        for observed in [
            PoseError::new(1e200, 0.0, 0.0),
            PoseError::new(-1e200, 160.0, 0.2),
            PoseError::new(1e200, 1e200, 0.0),
        ].iter() {
            for vel in [0.0, 0.3].iter() {
                assert!(matches!(
                    compute_angular_velocity(&cam, &desired, observed, *vel),
                    Err(InvalidInputError::NonFiniteCommand(_))
                ));
            }
        }
    }

    #[test]
    fn test_rejects_non_finite_input() {
        let cam = default_cam();
        let good = PoseError::new(0.0, 160.0, 0.0);
        let bad = PoseError::new(std::f64::NAN, 160.0, 0.0);

        assert!(matches!(
            compute_angular_velocity(&cam, &good, &bad, 0.1),
            Err(InvalidInputError::NonFinitePose("observed", _))
        ));
        assert!(matches!(
            compute_angular_velocity(&cam, &bad, &good, 0.1),
            Err(InvalidInputError::NonFinitePose("desired", _))
        ));
        assert!(matches!(
            compute_angular_velocity(&cam, &good, &good, std::f64::INFINITY),
            Err(InvalidInputError::NonFiniteVelocity(_))
        ));
    }
}
