//! 像素 ↔ 地平面距离查找表
//!
//! 摄像头固定在 60cm 高度，根据针孔模型把地平线以下的每个像素投影到地面。
//! 投影前先用经验公式修正镜头畸变：
//!
//! ```text
//! tX = x
//! tY = 0.005·x + 0.9·y + 49
//! ```
//!
//! 表在构造时一次性算好（`f32` 存储），之后只读，可以通过 `Arc` 在线程间共享。

use crate::{GeometryError, GroundPoint, PixelPoint};

/// 图像宽度（像素）
pub const PIXEL_WIDTH: i32 = 640;
/// 图像高度（像素）
pub const PIXEL_HEIGHT: i32 = 480;
/// 地平线所在行；此行以上的像素不对应地面
pub const PIXEL_HORIZON: i32 = 270;

/// 垂直视场半角（弧度）
const VERTICAL_ALPHA: f64 = 0.7086;
/// 水平视场半角（弧度）
const HORIZONTAL_BETA: f64 = 0.7854;
/// 摄像头离地高度（厘米）
const EYE_HEIGHT_CM: f64 = 60.0;

/// 地平线处的距离误差估计（厘米），到图像底部线性降为 0
const HORIZON_ERROR_CM: f64 = 5.0;

/// 反查时行/列交替搜索的最大轮数
const MAX_REFINEMENTS: usize = 8;

const ROWS: usize = (PIXEL_HEIGHT - PIXEL_HORIZON) as usize;
const COLUMNS: usize = PIXEL_WIDTH as usize;

/// 带误差范围的距离
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorBounds {
    pub nominal: GroundPoint,
    pub lower: GroundPoint,
    pub upper: GroundPoint,
}

/// 预计算的距离查找表
#[derive(Debug, Clone)]
pub struct DistanceLookup {
    x_distances: Vec<f32>,
    y_distances: Vec<f32>,
}

impl Default for DistanceLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl DistanceLookup {
    pub fn new() -> Self {
        let mut x_distances = vec![0.0; ROWS * COLUMNS];
        let mut y_distances = vec![0.0; ROWS * COLUMNS];

        for y in PIXEL_HORIZON..PIXEL_HEIGHT {
            for x in 0..PIXEL_WIDTH {
                let (dx, dy) = project(x, y);
                let i = index(x, y);
                x_distances[i] = dx as f32;
                y_distances[i] = dy as f32;
            }
        }

        Self {
            x_distances,
            y_distances,
        }
    }

    /// 像素是否在表内（图像范围内且不高于地平线）
    pub fn contains(x: i32, y: i32) -> bool {
        (0..PIXEL_WIDTH).contains(&x) && (PIXEL_HORIZON..PIXEL_HEIGHT).contains(&y)
    }

    /// 像素对应的地面位置（厘米）
    pub fn distance(&self, x: i32, y: i32) -> Result<GroundPoint, GeometryError> {
        if !Self::contains(x, y) {
            return Err(GeometryError::OutOfBounds { x, y });
        }
        let i = index(x, y);
        Ok(GroundPoint::new(
            self.x_distances[i] as f64,
            self.y_distances[i] as f64,
        ))
    }

    pub fn distance_at(&self, pixel: PixelPoint) -> Result<GroundPoint, GeometryError> {
        self.distance(pixel.x, pixel.y)
    }

    /// 距离及其误差范围
    ///
    /// 误差估计在地平线处为 5cm，在图像底部为 0，按行线性插值；
    /// 两个分量各自加减同一个误差。
    pub fn distance_with_error_bounds(&self, x: i32, y: i32) -> Result<ErrorBounds, GeometryError> {
        let nominal = self.distance(x, y)?;
        let slope = -HORIZON_ERROR_CM / (PIXEL_HEIGHT - PIXEL_HORIZON) as f64;
        let error = slope * (y - PIXEL_HORIZON) as f64 + HORIZON_ERROR_CM;
        let offset = GroundPoint::new(error, error);
        Ok(ErrorBounds {
            nominal,
            lower: nominal - offset,
            upper: nominal + offset,
        })
    }

    /// 像素到机器人的地面距离
    pub fn ground_distance(&self, pixel: PixelPoint) -> Result<f64, GeometryError> {
        Ok(self.distance_at(pixel)?.norm())
    }

    /// 两个像素在地面上的欧氏距离
    pub fn euclidean_between_pixels(
        &self,
        a: PixelPoint,
        b: PixelPoint,
    ) -> Result<f64, GeometryError> {
        Ok(euclidean(self.distance_at(a)?, self.distance_at(b)?))
    }

    /// 反查：地面位置 → 最接近的像素
    ///
    /// 行列交替二分搜索直到不动点。对表内任一像素的距离，
    /// 反查结果与原像素相差不超过 1 像素。表外的地面位置被夹到边界行/列。
    pub fn pixel(&self, ground: GroundPoint) -> PixelPoint {
        let mut x = PIXEL_WIDTH / 2;
        let mut y = self.search_row(ground.y, x);

        for _ in 0..MAX_REFINEMENTS {
            let next_x = self.search_column(ground.x, y);
            let next_y = self.search_row(ground.y, next_x);
            let settled = next_x == x && next_y == y;
            x = next_x;
            y = next_y;
            if settled {
                break;
            }
        }

        PixelPoint::new(x, y)
    }

    /// 在固定列上二分查找前向距离；行越大距离越小
    fn search_row(&self, target: f64, x: i32) -> i32 {
        let (mut start, mut end) = (PIXEL_HORIZON, PIXEL_HEIGHT);
        while end - start > 1 {
            let mid = start + (end - start) / 2;
            let comp = self.y_distances[index(x, mid)] as f64;
            if target > comp {
                end = mid;
            } else {
                start = mid;
            }
        }
        start
    }

    /// 在固定行上二分查找横向距离；列越大距离越大
    fn search_column(&self, target: f64, y: i32) -> i32 {
        let (mut start, mut end) = (0, PIXEL_WIDTH);
        while end - start > 1 {
            let mid = start + (end - start) / 2;
            let comp = self.x_distances[index(mid, y)] as f64;
            if target >= comp {
                start = mid;
            } else {
                end = mid;
            }
        }
        start
    }
}

/// 两个地面位置的欧氏距离
pub fn euclidean(a: GroundPoint, b: GroundPoint) -> f64 {
    (a - b).norm()
}

fn index(x: i32, y: i32) -> usize {
    (y - PIXEL_HORIZON) as usize * COLUMNS + x as usize
}

fn project(x: i32, y: i32) -> (f64, f64) {
    let t_x = x as f64;
    let t_y = 0.005 * x as f64 + 0.9 * y as f64 + 49.0;

    let half_height = PIXEL_HEIGHT as f64 / 2.0;
    let half_width = PIXEL_WIDTH as f64 / 2.0;

    let v = t_y - half_height;
    let v_tan = v * VERTICAL_ALPHA.tan() / half_height;
    let dy = EYE_HEIGHT_CM / v_tan;

    let width = HORIZONTAL_BETA.tan() * EYE_HEIGHT_CM / v_tan;
    let dx = (t_x - half_width) / half_width * width;

    (dx, dy)
}
