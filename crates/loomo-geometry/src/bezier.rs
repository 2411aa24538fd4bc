//! 分段三次 Bezier 路径
//!
//! 给定有序节点，构造一条穿过全部节点、一阶导数连续的分段三次曲线。
//!
//! # 算法
//!
//! 每段 `i` 由节点 `K[i]`、`K[i+1]` 和两个控制点 `P1[i]`、`P2[i]` 组成：
//!
//! ```text
//! B(t) = (1-t)³·K[i] + 3(1-t)²t·P1[i] + 3(1-t)t²·P2[i] + t³·K[i+1]
//! ```
//!
//! 一阶/二阶导数连续性给出关于 `P1` 的三对角线性方程组：
//!
//! ```text
//! 2·P1[0]            +   P1[1]   = K[0] + 2·K[1]
//! P1[i-1] + 4·P1[i]  +   P1[i+1] = 4·K[i] + 2·K[i+1]
//! 2·P1[n-2]          + 7·P1[n-1] = 8·K[n-1] + K[n]
//! ```
//!
//! 然后 `P2[i] = 2·K[i+1] - P1[i+1]`。
//!
//! 末尾节点会被重复一次，使边界条件落在这个虚拟节点上（开放路径），
//! 虚拟段在求解后丢弃。

use crate::{GeometryError, GroundPoint};

/// 穿过节点的 Bezier 路径（构造后不可变）
#[derive(Debug, Clone, PartialEq)]
pub struct BezierPath {
    knots: Vec<GroundPoint>,
    control_points: Vec<[GroundPoint; 2]>,
}

impl BezierPath {
    /// 构造路径
    ///
    /// # 错误
    ///
    /// 节点少于 2 个时返回 `GeometryError::NotEnoughKnots`。
    pub fn new(knots: &[GroundPoint]) -> Result<Self, GeometryError> {
        if knots.len() < 2 {
            return Err(GeometryError::NotEnoughKnots {
                required: 2,
                actual: knots.len(),
            });
        }

        let mut extended = knots.to_vec();
        extended.push(knots[knots.len() - 1]);

        // 方程数 = 段数（含虚拟段），至少为 2
        let n = extended.len() - 1;
        let mut sub = vec![1.0; n];
        let mut diag = vec![4.0; n];
        diag[0] = 2.0;
        sub[n - 1] = 2.0;
        diag[n - 1] = 7.0;

        let mut rhs = vec![GroundPoint::zeros(); n];
        rhs[0] = extended[0] + extended[1] * 2.0;
        for i in 1..n - 1 {
            rhs[i] = (extended[i] * 2.0 + extended[i + 1]) * 2.0;
        }
        rhs[n - 1] = extended[n - 1] * 8.0 + extended[n];

        let first = solve_tridiagonal(&sub, &diag, &rhs);

        let segments = knots.len() - 1;
        let control_points = (0..segments)
            .map(|i| [first[i], extended[i + 1] * 2.0 - first[i + 1]])
            .collect();

        Ok(Self {
            knots: knots.to_vec(),
            control_points,
        })
    }

    /// 在 `t ∈ [0, 1]` 处取点
    ///
    /// `t` 按段数缩放后截断得到段索引，余数作为段内参数。
    /// 超出范围的 `t` 会被截断到端点。
    pub fn point(&self, t: f64) -> GroundPoint {
        let segments = self.control_points.len();
        let scaled = segments as f64 * t.clamp(0.0, 1.0);
        let i = (scaled as usize).min(segments - 1);
        let local = scaled - i as f64;

        let inv = 1.0 - local;
        let a0 = inv * inv * inv;
        let a1 = 3.0 * inv * inv * local;
        let a2 = 3.0 * inv * local * local;
        let a3 = local * local * local;

        let [c0, c1] = self.control_points[i];
        self.knots[i] * a0 + c0 * a1 + c1 * a2 + self.knots[i + 1] * a3
    }

    pub fn knots(&self) -> &[GroundPoint] {
        &self.knots
    }

    pub fn control_points(&self) -> &[[GroundPoint; 2]] {
        &self.control_points
    }

    /// 段数（节点数 - 1）
    pub fn segments(&self) -> usize {
        self.control_points.len()
    }
}

/// 三对角方程组（上对角线恒为 1）
///
/// 前向消元 + 回代（Thomas 算法）。
fn solve_tridiagonal(sub: &[f64], diag: &[f64], rhs: &[GroundPoint]) -> Vec<GroundPoint> {
    let n = diag.len();
    let mut c = vec![0.0; n];
    let mut d = vec![GroundPoint::zeros(); n];

    c[0] = 1.0 / diag[0];
    d[0] = rhs[0] / diag[0];
    for i in 1..n {
        let m = diag[i] - sub[i] * c[i - 1];
        c[i] = 1.0 / m;
        d[i] = (rhs[i] - d[i - 1] * sub[i]) / m;
    }

    let mut x = vec![GroundPoint::zeros(); n];
    x[n - 1] = d[n - 1];
    for i in (0..n - 1).rev() {
        x[i] = d[i] - x[i + 1] * c[i];
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn p(x: f64, y: f64) -> GroundPoint {
        GroundPoint::new(x, y)
    }

    #[test]
    fn test_rejects_single_knot() {
        let err = BezierPath::new(&[p(0.0, 0.0)]).unwrap_err();
        assert_eq!(
            err,
            GeometryError::NotEnoughKnots {
                required: 2,
                actual: 1
            }
        );
        assert!(BezierPath::new(&[]).is_err());
    }

    #[test]
    fn test_two_knots_endpoints() {
        let path = BezierPath::new(&[p(-40.0, 0.0), p(-30.0, 80.0)]).unwrap();
        assert_eq!(path.segments(), 1);
        assert_abs_diff_eq!(path.point(0.0), p(-40.0, 0.0), epsilon = 1e-9);
        assert_abs_diff_eq!(path.point(1.0), p(-30.0, 80.0), epsilon = 1e-9);
    }

    #[test]
    fn test_passes_through_every_knot() {
        let knots = [
            p(0.0, 0.0),
            p(0.5, 1.5),
            p(1.0, 1.0),
            p(1.5, 0.5),
            p(2.0, 0.5),
        ];
        let path = BezierPath::new(&knots).unwrap();
        let segments = path.segments() as f64;
        for (i, knot) in knots.iter().enumerate() {
            assert_abs_diff_eq!(path.point(i as f64 / segments), *knot, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_first_derivative_continuous_at_interior_knots() {
        let knots = [p(0.0, 0.0), p(10.0, 30.0), p(-5.0, 60.0), p(20.0, 90.0)];
        let path = BezierPath::new(&knots).unwrap();
        let cps = path.control_points();
        for i in 1..path.segments() {
            // 左段末端切线 3(K[i] - P2[i-1])，右段起点切线 3(P1[i] - K[i])
            let left = knots[i] - cps[i - 1][1];
            let right = cps[i][0] - knots[i];
            assert_abs_diff_eq!(left, right, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_out_of_range_t_is_clamped() {
        let path = BezierPath::new(&[p(0.0, 0.0), p(10.0, 10.0), p(20.0, 0.0)]).unwrap();
        assert_eq!(path.point(-0.5), path.point(0.0));
        assert_eq!(path.point(1.5), path.point(1.0));
    }

    #[test]
    fn test_tridiagonal_solver() {
        // [2 1 0; 1 4 1; 0 2 7] x = rhs，解为 (1,1),(2,-1),(3,0)
        let sub = [0.0, 1.0, 2.0];
        let diag = [2.0, 4.0, 7.0];
        let rhs = [p(4.0, 1.0), p(12.0, -3.0), p(25.0, -2.0)];
        let x = solve_tridiagonal(&sub, &diag, &rhs);
        assert_abs_diff_eq!(x[0], p(1.0, 1.0), epsilon = 1e-12);
        assert_abs_diff_eq!(x[1], p(2.0, -1.0), epsilon = 1e-12);
        assert_abs_diff_eq!(x[2], p(3.0, 0.0), epsilon = 1e-12);
    }
}
