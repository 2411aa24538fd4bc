//! # Loomo Geometry
//!
//! 车道跟随所需的几何工具（无 I/O、无线程）
//!
//! ## 模块
//!
//! - `bezier`: 穿过所有节点的分段三次 Bezier 路径
//! - `lookup`: 像素坐标 ↔ 地平面距离查找表
//! - `path`: 最近邻节点排序，从特征像素构造路径
//!
//! ## 坐标系
//!
//! - **像素坐标**：原点在图像左上角，`y` 向下增长，640x480
//! - **地平面坐标**：原点在机器人处，单位厘米，`x` 向右，`y` 向前

pub mod bezier;
pub mod lookup;
pub mod path;

pub use bezier::BezierPath;
pub use lookup::{
    DistanceLookup, ErrorBounds, PIXEL_HEIGHT, PIXEL_HORIZON, PIXEL_WIDTH, euclidean,
};
pub use path::{KNOT_REACH_CM, fit_path, order_knots};

use thiserror::Error;

/// 地平面上的点（厘米）
pub type GroundPoint = nalgebra::Vector2<f64>;

/// 图像像素坐标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

impl PixelPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// 是否位于地平线以下（只有这些像素可以投影到地面）
    pub fn below_horizon(&self) -> bool {
        self.y >= PIXEL_HORIZON
    }
}

/// 图像中的矩形区域（`min` 包含，`max` 不包含）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    pub min: PixelPoint,
    pub max: PixelPoint,
}

impl PixelRect {
    pub const fn new(min: PixelPoint, max: PixelPoint) -> Self {
        Self { min, max }
    }

    /// 矩形中心点
    pub fn center(&self) -> PixelPoint {
        PixelPoint::new((self.min.x + self.max.x) / 2, (self.min.y + self.max.y) / 2)
    }

    pub fn area(&self) -> i32 {
        (self.max.x - self.min.x) * (self.max.y - self.min.y)
    }
}

/// 几何计算错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("Not enough knots: need at least {required}, got {actual}")]
    NotEnoughKnots { required: usize, actual: usize },

    #[error("Pixel ({x}, {y}) is outside the ground-plane lookup")]
    OutOfBounds { x: i32, y: i32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_rect_center_and_area() {
        let rect = PixelRect::new(PixelPoint::new(10, 20), PixelPoint::new(30, 60));
        assert_eq!(rect.center(), PixelPoint::new(20, 40));
        assert_eq!(rect.area(), 800);
    }

    #[test]
    fn test_below_horizon() {
        assert!(PixelPoint::new(0, PIXEL_HORIZON).below_horizon());
        assert!(!PixelPoint::new(0, PIXEL_HORIZON - 1).below_horizon());
    }

    #[test]
    fn test_geometry_error_display() {
        let err = GeometryError::NotEnoughKnots {
            required: 2,
            actual: 1,
        };
        assert_eq!(err.to_string(), "Not enough knots: need at least 2, got 1");

        let err = GeometryError::OutOfBounds { x: 5, y: 10 };
        assert!(err.to_string().contains("(5, 10)"));
    }
}
