//! View and projection matrices for the camera the host sends with each frame.
//!
//! The host works in a left-handed, y-up world with depth mapped to `0..1`. Matrices here act on
//! column vectors, so a world position reaches clip space as `projection * view * world * p`.
use crate::sys::{CameraData, ProjectionClipping};
use nalgebra::{Isometry3, Matrix4, Rotation3, Translation3, UnitQuaternion, Vector3};

/// Camera orientation: yaw about y, then pitch about x, then roll about z, all in degrees
fn orientation(camera: &CameraData) -> Rotation3<f32> {
    let (rx, ry, rz) = (camera.rx, camera.ry, camera.rz);
    let yaw = Rotation3::from_axis_angle(&Vector3::y_axis(), ry.to_radians());
    let pitch = Rotation3::from_axis_angle(&Vector3::x_axis(), -rx.to_radians());
    let roll = Rotation3::from_axis_angle(&Vector3::z_axis(), -rz.to_radians());
    yaw * pitch * roll
}

/// World to camera space
pub fn view_matrix(camera: &CameraData) -> Matrix4<f32> {
    let (x, y, z) = (camera.x, camera.y, camera.z);
    let pose = Isometry3::from_parts(
        Translation3::new(x, y, z),
        UnitQuaternion::from_rotation_matrix(&orientation(camera)),
    );
    pose.inverse().to_homogeneous()
}

/// Width and height of the image plane: at unit distance for perspective cameras, in world
/// units for orthographic ones
fn image_extent(camera: &CameraData) -> (f32, f32) {
    let (focal, sensor_x, sensor_y) = (camera.focal_length, camera.sensor_x, camera.sensor_y);
    let ortho_width = camera.ortho_width;
    if ortho_width > 0. {
        let aspect = sensor_x / sensor_y;
        let height = ortho_width / aspect;
        (aspect * height, height)
    } else {
        let fov_h = 2. * (0.5 / (focal / sensor_x)).atan();
        let fov_v = 2. * (0.5 / (focal / sensor_y)).atan();
        (2. * (0.5 * fov_h).tan(), 2. * (0.5 * fov_v).tan())
    }
}

/// Camera to clip space for the part of the frame `clipping` selects, including lens shift
pub fn projection_matrix(camera: &CameraData, clipping: &ProjectionClipping) -> Matrix4<f32> {
    let (width, height) = image_extent(camera);
    let (near, far) = (camera.near_z, camera.far_z);
    let (cx, cy) = (camera.cx, camera.cy);

    let l = (-0.5 + clipping.left) * width;
    let r = (-0.5 + clipping.right) * width;
    let t = (0.5 - clipping.top) * height;
    let b = (0.5 - clipping.bottom) * height;

    let projection = if camera.ortho_width > 0. {
        orthographic_off_center(l, r, b, t, near, far)
    } else {
        perspective_off_center(l * near, r * near, b * near, t * near, near, far)
    };

    Matrix4::new_translation(&Vector3::new(cx, cy, 0.)) * projection
}

fn perspective_off_center(l: f32, r: f32, b: f32, t: f32, near: f32, far: f32) -> Matrix4<f32> {
    let a11 = 2. * near / (r - l);
    let a22 = 2. * near / (t - b);
    let a13 = (l + r) / (l - r);
    let a23 = (t + b) / (b - t);
    let a33 = far / (far - near);
    let a34 = -near * far / (far - near);
    Matrix4::new(
        a11, 0.0, a13, 0.0, //
        0.0, a22, a23, 0.0, //
        0.0, 0.0, a33, a34, //
        0.0, 0.0, 1.0, 0.0, //
    )
}

fn orthographic_off_center(l: f32, r: f32, b: f32, t: f32, near: f32, far: f32) -> Matrix4<f32> {
    Matrix4::new(
        2. / (r - l), 0.0, 0.0, (l + r) / (l - r), //
        0.0, 2. / (t - b), 0.0, (t + b) / (b - t), //
        0.0, 0.0, 1. / (far - near), near / (near - far), //
        0.0, 0.0, 0.0, 1.0, //
    )
}
