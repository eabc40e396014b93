//! 位姿与夹爪类型
//!
//! 位置分量为无约束实数；夹爪宽度的钳位由执行器负责，本层不做裁剪。

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul};

/// 夹爪全开宽度（米），RG2 最大行程 110mm
pub const GRIPPER_OPEN: f64 = 0.11;

/// 夹爪全闭宽度（米）
pub const GRIPPER_CLOSED: f64 = 0.0;

/// 末端位置（x, y, z）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    /// 原点
    pub const ORIGIN: Position = Position::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// 与另一位置的欧氏距离
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// 分量逐个比较（容差 `eps`）
    pub fn approx_eq(&self, other: &Position, eps: f64) -> bool {
        (self.x - other.x).abs() <= eps
            && (self.y - other.y).abs() <= eps
            && (self.z - other.z).abs() <= eps
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Mul<f64> for Position {
    type Output = Position;

    fn mul(self, rhs: f64) -> Position {
        Position::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl From<(f64, f64, f64)> for Position {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Position::new(x, y, z)
    }
}

/// 末端姿态（rx, ry, rz）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotation {
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
}

impl Rotation {
    pub const fn new(rx: f64, ry: f64, rz: f64) -> Self {
        Self { rx, ry, rz }
    }
}

/// 目标位姿：必选位置 + 可选姿态
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Position,
    pub rotation: Option<Rotation>,
}

impl Pose {
    /// 仅位置的位姿
    pub const fn at(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: Position::new(x, y, z),
            rotation: None,
        }
    }

    /// 附加姿态
    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = Some(rotation);
        self
    }

    /// 平移后的新位姿（姿态保持不变）
    pub fn translated(&self, delta: Position) -> Self {
        Self {
            position: self.position + delta,
            rotation: self.rotation,
        }
    }
}

impl From<Position> for Pose {
    fn from(position: Position) -> Self {
        Self {
            position,
            rotation: None,
        }
    }
}

impl std::fmt::Display for Pose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let p = &self.position;
        write!(f, "({:.3}, {:.3}, {:.3})", p.x, p.y, p.z)?;
        if let Some(r) = &self.rotation {
            write!(f, " rot({:.3}, {:.3}, {:.3})", r.rx, r.ry, r.rz)?;
        }
        Ok(())
    }
}
