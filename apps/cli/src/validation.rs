//! 输入验证

use anyhow::Result;
use loomo_ai::AiConfig;

/// 手动速度命令的验证器
pub struct VelocityValidator {
    max_linear: f32,
    max_angular: f32,
}

impl VelocityValidator {
    pub fn new(max_linear: f32, max_angular: f32) -> Self {
        Self {
            max_linear,
            max_angular,
        }
    }

    /// 使用运动 AI 的速度上限
    pub fn from_config(config: &AiConfig) -> Self {
        Self::new(config.max_linear_velocity, config.max_angular_velocity)
    }

    /// 验证一对速度
    ///
    /// # 错误
    /// 非有限值或超出上限
    pub fn validate(&self, linear: f32, angular: f32) -> Result<()> {
        check("linear", linear, self.max_linear)?;
        check("angular", angular, self.max_angular)
    }
}

fn check(name: &str, value: f32, limit: f32) -> Result<()> {
    if !value.is_finite() {
        anyhow::bail!("{name} velocity must be finite, got {value}");
    }
    if value.abs() > limit {
        anyhow::bail!("{name} velocity {value:.3} exceeds limit {limit:.3}");
    }
    Ok(())
}

/// 验证位姿坐标
pub fn validate_pose(x: f32, y: f32) -> Result<()> {
    if !x.is_finite() || !y.is_finite() {
        anyhow::bail!("pose must be finite, got ({x}, {y})");
    }
    Ok(())
}
