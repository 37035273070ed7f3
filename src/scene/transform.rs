use std::ops::Mul;

use glam::{Quat, Vec3};

use crate::service::Pose;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_pose(pose: &Pose, scale: Vec3) -> Self {
        Self {
            position: pose.position,
            rotation: pose.rotation,
            scale,
        }
    }

    /// The anchor pose for this transform. Scale stays with the instance.
    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.rotation)
    }
}

impl Mul for Transform {
    type Output = Self;

    /// Applies `rhs` in the local space of `self`.
    fn mul(self, rhs: Self) -> Self::Output {
        Self {
            position: self.position + self.rotation * (self.scale * rhs.position),
            rotation: self.rotation * rhs.rotation,
            scale: self.scale * rhs.scale,
        }
    }
}
