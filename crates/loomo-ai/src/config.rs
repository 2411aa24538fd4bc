//! 运动 AI 配置

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 运动 AI 配置
///
/// 速度单位与控制通道一致（线速度 m/s，角速度 rad/s），距离单位为厘米。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// 最大线速度
    pub max_linear_velocity: f32,
    /// 最大角速度
    pub max_angular_velocity: f32,
    /// 同一个标志需要连续出现的次数（严格大于）
    pub sign_confidence_threshold: u32,
    /// 标志触发距离（厘米）
    pub sign_trigger_distance_cm: f64,
    /// 路径相邻节点最大间距（厘米）
    pub knot_reach_cm: f64,
    /// 掉头结束时最近标记的最大距离（厘米）
    pub uturn_reach_cm: f64,
    /// 掉头时的原地角速度
    pub uturn_velocity: f32,
    /// 只看到一侧标记时的搜索速度
    pub search_velocity: f32,
    /// Stop 状态完全停车的时长（毫秒）
    pub stop_active_ms: u64,
    /// Stop 状态的总时长（毫秒），到期后回到车道跟随
    pub stop_cooldown_ms: u64,
    /// 路径采样的最远参数位置（0..=1）
    pub lookahead: f64,
    /// 每条路径的采样点数
    pub sample_count: usize,
    /// 摄像头相对机器人中心的横向偏移（厘米）
    pub camera_offset_cm: f64,
    /// 左右路径起点到中心线的距离（厘米）
    pub lane_offset_cm: f64,
    /// 横向偏差超过该值时角速度直接取满
    pub saturation_threshold_cm: f64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            max_linear_velocity: 0.4,
            max_angular_velocity: 0.4,
            sign_confidence_threshold: 10,
            sign_trigger_distance_cm: 100.0,
            knot_reach_cm: loomo_geometry::KNOT_REACH_CM,
            uturn_reach_cm: 150.0,
            uturn_velocity: 0.2,
            search_velocity: 0.1,
            stop_active_ms: 5_000,
            stop_cooldown_ms: 10_000,
            lookahead: 0.5,
            sample_count: 10,
            camera_offset_cm: -8.0,
            lane_offset_cm: 40.0,
            saturation_threshold_cm: 50.0,
        }
    }
}

impl AiConfig {
    pub fn stop_active(&self) -> Duration {
        Duration::from_millis(self.stop_active_ms)
    }

    pub fn stop_cooldown(&self) -> Duration {
        Duration::from_millis(self.stop_cooldown_ms)
    }
}
