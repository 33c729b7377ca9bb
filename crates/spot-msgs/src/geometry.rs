//! 几何基础类型
//!
//! 字段布局与 ROS 2 `geometry_msgs` 保持一致，数学运算统一委托给 `nalgebra`。

use nalgebra as na;

/// 自由空间中的向量（仅旋转作用于向量）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// 自由空间中的点
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// 四元数形式的姿态（x, y, z, w）
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    /// 单位旋转
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// 绕 Z 轴旋转 `yaw` 弧度
    pub fn from_yaw(yaw: f64) -> Self {
        na::UnitQuaternion::from_euler_angles(0.0, 0.0, yaw).into()
    }

    /// 转为单位四元数（自动归一化）
    pub fn to_unit(self) -> na::UnitQuaternion<f64> {
        na::UnitQuaternion::from_quaternion(na::Quaternion::new(self.w, self.x, self.y, self.z))
    }
}

impl From<na::UnitQuaternion<f64>> for Quaternion {
    fn from(q: na::UnitQuaternion<f64>) -> Self {
        // coords 顺序为 (i, j, k, w)
        let c = q.quaternion().coords;
        Self::new(c[0], c[1], c[2], c[3])
    }
}

/// 位置 + 姿态
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pose {
    pub position: Point,
    pub orientation: Quaternion,
}

/// ROS 风格的刚体变换（平移 + 旋转）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transform {
    pub translation: Vector3,
    pub rotation: Quaternion,
}

impl Transform {
    pub fn to_isometry(&self) -> na::Isometry3<f64> {
        let t = self.translation;
        na::Isometry3::from_parts(
            na::Translation3::new(t.x, t.y, t.z),
            self.rotation.to_unit(),
        )
    }
}

/// 机器人 SDK 侧的 SE(3) 位姿
///
/// 与 [`Transform`] 同构，单独成型是为了让 SDK 数据与话题数据在类型上可区分。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SE3Pose {
    pub position: Vector3,
    pub rotation: Quaternion,
}

impl SE3Pose {
    pub const IDENTITY: Self = Self {
        position: Vector3::new(0.0, 0.0, 0.0),
        rotation: Quaternion::IDENTITY,
    };

    pub fn new(position: Vector3, rotation: Quaternion) -> Self {
        Self { position, rotation }
    }

    /// 平面位姿（x, y, yaw）
    pub fn planar(x: f64, y: f64, yaw: f64) -> Self {
        Self::new(Vector3::new(x, y, 0.0), Quaternion::from_yaw(yaw))
    }

    pub fn to_isometry(&self) -> na::Isometry3<f64> {
        let p = self.position;
        na::Isometry3::from_parts(
            na::Translation3::new(p.x, p.y, p.z),
            self.rotation.to_unit(),
        )
    }

    pub fn from_isometry(iso: &na::Isometry3<f64>) -> Self {
        let t = iso.translation.vector;
        Self::new(Vector3::new(t[0], t[1], t[2]), iso.rotation.into())
    }

    /// 复合：`self * other`
    pub fn mult(&self, other: &SE3Pose) -> SE3Pose {
        Self::from_isometry(&(self.to_isometry() * other.to_isometry()))
    }

    pub fn inverse(&self) -> SE3Pose {
        Self::from_isometry(&self.to_isometry().inverse())
    }
}

impl From<SE3Pose> for Transform {
    fn from(pose: SE3Pose) -> Self {
        Transform {
            translation: pose.position,
            rotation: pose.rotation,
        }
    }
}

/// 将 `pose`（源帧）通过 `transform`（target_tform_source）变换到目标帧
pub fn do_transform_pose(pose: &Pose, transform: &Transform) -> Pose {
    let iso = transform.to_isometry();
    let p = pose.position;
    let moved = iso.transform_point(&na::Point3::new(p.x, p.y, p.z));
    let rotated = iso.rotation * pose.orientation.to_unit();

    Pose {
        position: Point::new(moved[0], moved[1], moved[2]),
        orientation: rotated.into(),
    }
}

/// 从四元数提取偏航角（ZYX 欧拉角中的 Z）
pub fn yaw_from_quaternion(q: &Quaternion) -> f64 {
    let (_roll, _pitch, yaw) = q.to_unit().euler_angles();
    yaw
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_identity_transform_keeps_pose() {
        let pose = Pose {
            position: Point::new(1.0, -2.0, 0.5),
            orientation: Quaternion::from_yaw(0.3),
        };
        let out = do_transform_pose(&pose, &Transform::default());
        assert!(approx(out.position.x, 1.0));
        assert!(approx(out.position.y, -2.0));
        assert!(approx(out.position.z, 0.5));
        assert!(approx(yaw_from_quaternion(&out.orientation), 0.3));
    }

    #[test]
    fn test_rotated_frame() {
        // base_link 相对 map 旋转了 90°：map 中 (1, 0) 在 base_link 中应为 (0, -1)
        let base_tform_map = Transform {
            translation: Vector3::default(),
            rotation: Quaternion::from_yaw(-FRAC_PI_2),
        };
        let goal = Pose {
            position: Point::new(1.0, 0.0, 0.0),
            orientation: Quaternion::IDENTITY,
        };
        let out = do_transform_pose(&goal, &base_tform_map);
        assert!(approx(out.position.x, 0.0));
        assert!(approx(out.position.y, -1.0));
        assert!(approx(yaw_from_quaternion(&out.orientation), -FRAC_PI_2));
    }

    #[test]
    fn test_translation_then_rotation() {
        let tf = Transform {
            translation: Vector3::new(2.0, 0.0, 0.0),
            rotation: Quaternion::from_yaw(FRAC_PI_2),
        };
        let pose = Pose {
            position: Point::new(1.0, 0.0, 0.0),
            orientation: Quaternion::IDENTITY,
        };
        let out = do_transform_pose(&pose, &tf);
        assert!(approx(out.position.x, 2.0));
        assert!(approx(out.position.y, 1.0));
    }

    #[test]
    fn test_se3_inverse_composes_to_identity() {
        let a = SE3Pose::planar(1.5, -0.5, 0.7);
        let id = a.mult(&a.inverse());
        assert!(approx(id.position.x, 0.0));
        assert!(approx(id.position.y, 0.0));
        assert!(approx(yaw_from_quaternion(&id.rotation), 0.0));
    }

    #[test]
    fn test_unnormalized_quaternion_is_normalized() {
        let q = Quaternion::new(0.0, 0.0, 2.0, 2.0);
        assert!(approx(yaw_from_quaternion(&q), FRAC_PI_2));
    }

    proptest! {
        #[test]
        fn prop_yaw_round_trips(yaw in -PI + 1e-6..PI - 1e-6) {
            let q = Quaternion::from_yaw(yaw);
            prop_assert!((yaw_from_quaternion(&q) - yaw).abs() < 1e-9);
        }

        #[test]
        fn prop_transform_preserves_distance(
            x in -10.0f64..10.0, y in -10.0f64..10.0,
            tx in -5.0f64..5.0, ty in -5.0f64..5.0, yaw in -3.0f64..3.0,
        ) {
            let tf = Transform {
                translation: Vector3::new(tx, ty, 0.0),
                rotation: Quaternion::from_yaw(yaw),
            };
            let origin = do_transform_pose(&Pose::default(), &tf);
            let pose = Pose { position: Point::new(x, y, 0.0), orientation: Quaternion::IDENTITY };
            let moved = do_transform_pose(&pose, &tf);
            let d0 = (x * x + y * y).sqrt();
            let dx = moved.position.x - origin.position.x;
            let dy = moved.position.y - origin.position.y;
            prop_assert!(((dx * dx + dy * dy).sqrt() - d0).abs() < 1e-9);
        }
    }
}
