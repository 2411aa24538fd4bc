//! 从特征像素构造车道路径
//!
//! 特征先投影到地面，再从起点出发按最近邻依次串联成节点序列。
//! 相邻节点超过 `reach` 的特征被视为不属于本车道，直接截断。

use crate::{
    BezierPath, DistanceLookup, GeometryError, GroundPoint, PixelPoint, lookup::euclidean,
};

/// 默认节点间最大间距（厘米）
pub const KNOT_REACH_CM: f64 = 200.0;

/// 最近邻搜索的初始上限（厘米）
const SEARCH_LIMIT_CM: f64 = 500.0;

/// 最近邻排序
///
/// 返回的节点以 `start` 开头。地平线以上的像素被忽略。
pub fn order_knots(
    pixels: &[PixelPoint],
    start: GroundPoint,
    reach: f64,
    lookup: &DistanceLookup,
) -> Vec<GroundPoint> {
    let mut candidates: Vec<GroundPoint> = pixels
        .iter()
        .filter_map(|p| lookup.distance_at(*p).ok())
        .collect();

    let mut knots = Vec::with_capacity(candidates.len() + 1);
    knots.push(start);

    let mut current = start;
    while let Some((i, distance)) = nearest(current, &candidates) {
        if distance > reach {
            break;
        }
        current = candidates.swap_remove(i);
        knots.push(current);
    }

    knots
}

/// 排序后拟合 Bezier 路径
///
/// 没有任何特征落在 `reach` 内时只剩起点，返回 `NotEnoughKnots`。
pub fn fit_path(
    pixels: &[PixelPoint],
    start: GroundPoint,
    reach: f64,
    lookup: &DistanceLookup,
) -> Result<BezierPath, GeometryError> {
    BezierPath::new(&order_knots(pixels, start, reach, lookup))
}

fn nearest(from: GroundPoint, candidates: &[GroundPoint]) -> Option<(usize, f64)> {
    let mut best = None;
    let mut best_distance = SEARCH_LIMIT_CM;
    for (i, candidate) in candidates.iter().enumerate() {
        let distance = euclidean(from, *candidate);
        if distance < best_distance {
            best_distance = distance;
            best = Some(i);
        }
    }
    best.map(|i| (i, best_distance))
}
